// Network Profiles - Shared Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Shared Models
//!
//! Plain data used across the crate:
//!
//! - **Profile**: Connection profiles and their setting fragments
//! - **State**: Device and active-connection state enumerations
//! - **Config**: Application configuration
//! - **Error**: Shared error types

pub mod config;
pub mod error;
pub mod profile;
pub mod state;

// Re-export main types for convenience
pub use config::{ActivationConfig, AppConfig, RetryConfig};
pub use error::{
    Error, Result, ServiceError, MANAGER_ERROR_DOMAIN, MANAGER_ERROR_UNAVAILABLE_CODE,
    UNAVAILABLE_MESSAGE_MARKER,
};
pub use profile::{AutoconnectSlaves, Profile, Setting, SettingConnection, SettingValue};
pub use state::{ActiveConnectionState, DeviceState, StateReason};

/// Configuration directory name (under XDG_CONFIG_HOME).
pub const CONFIG_DIR_NAME: &str = "network-profiles";
