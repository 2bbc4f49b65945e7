// Network Profiles - Configuration Service Contract
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Traits describing the network-configuration service.
//!
//! The activation workflow only talks to the service through these traits.
//! [`crate::dbus::NmDbusClient`] implements them over the system bus.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::models::{ActiveConnectionState, DeviceState, Profile, ServiceError, StateReason};

/// Result type for service calls.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Shared handle to a device.
pub type DeviceRef = Arc<dyn NetworkDevice>;

/// Shared handle to an active connection.
pub type ActiveConnectionRef = Arc<dyn ActiveConnectionObject>;

/// Identifies one state-change subscription on an active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A state-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub state: ActiveConnectionState,
    pub reason: StateReason,
}

/// Receiving end of a state-change subscription.
#[derive(Debug)]
pub struct StateSubscription {
    pub id: SubscriptionId,
    pub receiver: mpsc::UnboundedReceiver<StateChange>,
}

/// The network-configuration service.
#[async_trait]
pub trait NetworkService: Send + Sync {
    /// Submit a new profile. `persist` selects disk over memory-only storage.
    /// Returns the stored profile, or `None` if the service reported no object.
    async fn add_connection(&self, profile: &Profile, persist: bool)
        -> ServiceResult<Option<Profile>>;

    /// Write in-place changes of an existing profile.
    async fn commit_changes(&self, profile: &Profile, persist: bool) -> ServiceResult<bool>;

    /// Activate a profile on a device. Either side may be omitted and the
    /// service picks a match.
    async fn activate_connection(
        &self,
        profile: Option<&Profile>,
        device: Option<&dyn NetworkDevice>,
    ) -> ServiceResult<Option<ActiveConnectionRef>>;

    /// Look up a stored profile by its connection name.
    async fn get_connection_by_id(&self, id: &str) -> ServiceResult<Option<Profile>>;

    /// Look up a device by interface name.
    async fn device_by_iface(&self, iface: &str) -> ServiceResult<Option<DeviceRef>>;
}

/// A network device known to the service.
#[async_trait]
pub trait NetworkDevice: Send + Sync + fmt::Debug {
    /// Interface name.
    fn iface(&self) -> &str;

    /// Device state at the time of the lookup.
    fn state(&self) -> DeviceState;

    /// Service-side identifier of the device.
    fn object_path(&self) -> &str;

    /// The device's current active connection, if any.
    async fn active_connection(&self) -> ServiceResult<Option<ActiveConnectionRef>>;
}

/// A live activation instance.
///
/// State accessors return the latest value the object has observed; the
/// object updates it before delivering each notification.
pub trait ActiveConnectionObject: Send + Sync + fmt::Debug {
    fn state(&self) -> ActiveConnectionState;

    fn state_reason(&self) -> StateReason;

    /// Interface the connection is applied to.
    fn devname(&self) -> Option<String>;

    /// The profile backing this activation.
    fn connection(&self) -> Option<Profile>;

    /// Start receiving state-change notifications.
    fn subscribe_state_changed(&self) -> StateSubscription;

    /// Stop a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}
