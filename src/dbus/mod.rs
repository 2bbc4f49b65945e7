// Network Profiles - NetworkManager D-Bus Adapter
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # NetworkManager D-Bus Adapter
//!
//! Implements the service traits of [`crate::service`] against
//! `org.freedesktop.NetworkManager` on the system bus:
//!
//! - **client**: [`NmDbusClient`], the [`crate::service::NetworkService`]
//! - **objects**: device and active-connection handles
//! - **convert**: settings encoding between [`crate::models::Profile`] and
//!   the `a{sa{sv}}` dictionaries NetworkManager exchanges

mod client;
mod convert;
mod objects;

pub use client::NmDbusClient;
pub use convert::{decode_profile, encode_profile, overlay_settings, RawSettings};
pub use objects::{NmActiveConnection, NmDevice};

use crate::models::{ServiceError, MANAGER_ERROR_DOMAIN};

/// Well-known bus name of NetworkManager.
pub const NM_SERVICE: &str = "org.freedesktop.NetworkManager";
/// Object path of the manager.
pub const NM_PATH: &str = "/org/freedesktop/NetworkManager";
/// Object path of the settings service.
pub const NM_SETTINGS_PATH: &str = "/org/freedesktop/NetworkManager/Settings";

pub const NM_MANAGER_INTERFACE: &str = "org.freedesktop.NetworkManager";
pub const NM_SETTINGS_INTERFACE: &str = "org.freedesktop.NetworkManager.Settings";
pub const NM_SETTINGS_CONNECTION_INTERFACE: &str =
    "org.freedesktop.NetworkManager.Settings.Connection";
pub const NM_DEVICE_INTERFACE: &str = "org.freedesktop.NetworkManager.Device";
pub const NM_ACTIVE_CONNECTION_INTERFACE: &str =
    "org.freedesktop.NetworkManager.Connection.Active";

/// Path NetworkManager uses for "no object".
pub const NO_OBJECT_PATH: &str = "/";

/// Manager error names, indexed by their numeric code.
const MANAGER_ERROR_NAMES: &[&str] = &[
    "Failed",
    "PermissionDenied",
    "UnknownConnection",
    "UnknownDevice",
    "ConnectionNotAvailable",
    "ConnectionNotActive",
    "ConnectionAlreadyActive",
    "DependencyFailed",
    "AlreadyAsleepOrAwake",
    "AlreadyEnabledOrDisabled",
    "UnknownLogLevel",
    "UnknownLogDomain",
    "InvalidArguments",
    "MissingPlugin",
];

/// Numeric manager error code for a D-Bus error name, if it belongs to the
/// manager family.
pub fn manager_error_code(error_name: &str) -> Option<i32> {
    let suffix = error_name.strip_prefix("org.freedesktop.NetworkManager.")?;
    MANAGER_ERROR_NAMES
        .iter()
        .position(|name| *name == suffix)
        .and_then(|code| i32::try_from(code).ok())
}

/// Classify a D-Bus method error reply.
pub fn method_error(error_name: &str, message: Option<&str>) -> ServiceError {
    let message = message.unwrap_or_default();
    match manager_error_code(error_name) {
        Some(code) => ServiceError::from_parts(MANAGER_ERROR_DOMAIN, code, message),
        None => ServiceError::Manager {
            domain: error_name.to_string(),
            code: 0,
            message: message.to_string(),
        },
    }
}

/// Convert a zbus failure into a service error.
pub fn service_error(err: zbus::Error) -> ServiceError {
    match &err {
        zbus::Error::MethodError(name, message, _) => {
            method_error(name.as_str(), message.as_deref())
        }
        _ => ServiceError::Transport(err.to_string()),
    }
}
