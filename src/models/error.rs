// Network Profiles - Error Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared error types.
//!
//! [`Error`] is what the public API returns. [`ServiceError`] is what the
//! configuration-service collaborator returns; the activation state machine
//! classifies it into retry, cancellation or fatal buckets.

use thiserror::Error;

/// Result type alias for Network Profiles operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error domain used by NetworkManager for manager-level failures.
pub const MANAGER_ERROR_DOMAIN: &str = "nm-manager-error-quark";

/// Manager error code reported when a connection cannot be activated on a
/// device that is not ready yet.
pub const MANAGER_ERROR_UNAVAILABLE_CODE: i32 = 2;

/// Message fragment that accompanies the transient "not available" failure.
pub const UNAVAILABLE_MESSAGE_MARKER: &str = "is not available on the device";

/// Main error type for Network Profiles operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================
    // Profile Errors
    // ========================================
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    // ========================================
    // Action Errors
    // ========================================
    #[error("Action failed: {action} - {reason}")]
    ActionFailed { action: String, reason: String },

    #[error("Action timed out: {0}")]
    ActionTimeout(String),

    #[error("Action canceled")]
    Canceled,

    // ========================================
    // D-Bus Errors
    // ========================================
    #[error("D-Bus error: {0}")]
    Dbus(String),

    #[error("NetworkManager D-Bus error: {0}")]
    NetworkManagerDbus(String),

    #[error("D-Bus connection failed: {0}")]
    DbusConnectionFailed(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    // ========================================
    // Storage Errors
    // ========================================
    #[error("Failed to read configuration: {0}")]
    ConfigReadFailed(String),

    #[error("Failed to write configuration: {0}")]
    ConfigWriteFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseFailed(String),

    // ========================================
    // System Errors
    // ========================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================
    // Generic Errors
    // ========================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new action failed error.
    pub fn action_failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ActionFailed {
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error came from an external cancellation or timeout.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled | Self::ActionTimeout(_))
    }
}

// Convert from zbus errors
impl From<zbus::Error> for Error {
    fn from(err: zbus::Error) -> Self {
        Error::Dbus(err.to_string())
    }
}

// Convert from toml parse errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

// Convert from toml serialize errors
impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigWriteFailed(err.to_string())
    }
}

impl From<ServiceError> for Error {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Cancelled => Error::Canceled,
            ServiceError::NotFound(what) => Error::ProfileNotFound(what),
            other => Error::NetworkManagerDbus(other.to_string()),
        }
    }
}

/// Failure reported by the configuration service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The device is momentarily not ready to accept the activation.
    #[error("{message} ({domain}, code {code})")]
    Unavailable {
        domain: String,
        code: i32,
        message: String,
    },

    /// Any other structured failure from the service.
    #[error("{message} ({domain}, code {code})")]
    Manager {
        domain: String,
        code: i32,
        message: String,
    },

    /// The call was aborted through its cancellation token.
    #[error("Operation was cancelled")]
    Cancelled,

    /// A lookup found nothing.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Bus or transport level failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    /// Build a structured service error, recognizing the transient
    /// "not available" signature. Domain, code and message must all match.
    pub fn from_parts(domain: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        let domain = domain.into();
        let message = message.into();
        if domain == MANAGER_ERROR_DOMAIN
            && code == MANAGER_ERROR_UNAVAILABLE_CODE
            && message.contains(UNAVAILABLE_MESSAGE_MARKER)
        {
            Self::Unavailable {
                domain,
                code,
                message,
            }
        } else {
            Self::Manager {
                domain,
                code,
                message,
            }
        }
    }

    /// Check if this error is the retriable "not available" condition.
    pub fn is_transient_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Check if this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<zbus::Error> for ServiceError {
    fn from(err: zbus::Error) -> Self {
        ServiceError::Transport(err.to_string())
    }
}
