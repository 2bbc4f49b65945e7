// Network Profiles - Library Root
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Network Profiles
//!
//! Connection profile lifecycle on top of NetworkManager: create, import,
//! update, commit and activate profiles, with activation confirmed through
//! state-change notifications and transient "device not ready" failures
//! retried automatically.
//!
//! ```no_run
//! use std::sync::Arc;
//! use network_profiles::connection::{ConnectionProfile, Context};
//! use network_profiles::dbus::NmDbusClient;
//! use network_profiles::service::NetworkService;
//!
//! # async fn example() -> network_profiles::models::Result<()> {
//! let client: Arc<dyn NetworkService> = Arc::new(NmDbusClient::connect().await?);
//! let ctx = Context::new(client);
//! let profile = ConnectionProfile::new(&ctx);
//! profile.activate(None, Some("eth0".to_string()));
//! ctx.run(None).await
//! # }
//! ```

pub mod connection;
pub mod dbus;
pub mod event_loop;
pub mod models;
pub mod service;

#[cfg(test)]
mod testing;

pub use connection::{ActiveConnection, ConnectionProfile, ConnectionSetting, Context};
pub use event_loop::{Cancellable, EventLoop};
pub use models::{Error, Profile, Result};

/// Human-readable application name.
pub const APP_NAME: &str = "Network Profiles";

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
