// Network Profiles - NetworkManager Objects
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Device and active-connection handles backed by bus objects.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, warn};
use zbus::zvariant::OwnedObjectPath;
use zbus::{Connection, Proxy};

use super::convert::{decode_profile, RawSettings};
use super::{
    service_error, NM_ACTIVE_CONNECTION_INTERFACE, NM_DEVICE_INTERFACE, NM_SERVICE,
    NM_SETTINGS_CONNECTION_INTERFACE, NO_OBJECT_PATH,
};
use crate::models::{ActiveConnectionState, DeviceState, Profile, StateReason};
use crate::service::{
    ActiveConnectionObject, ActiveConnectionRef, NetworkDevice, ServiceResult, StateChange,
    StateSubscription, SubscriptionId,
};

pub(super) async fn proxy(
    conn: &Connection,
    path: &str,
    interface: &'static str,
) -> ServiceResult<Proxy<'static>> {
    Proxy::new(conn, NM_SERVICE, path.to_string(), interface)
        .await
        .map_err(service_error)
}

/// Read a stored profile and tag it with its object path.
pub(super) async fn read_profile(conn: &Connection, path: &str) -> ServiceResult<Profile> {
    let settings = proxy(conn, path, NM_SETTINGS_CONNECTION_INTERFACE).await?;
    let raw: RawSettings = settings
        .call("GetSettings", &())
        .await
        .map_err(service_error)?;
    Ok(decode_profile(&raw).with_remote_id(path))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Device
// ============================================================================

/// A device, with its state as of the lookup.
pub struct NmDevice {
    conn: Connection,
    path: String,
    iface: String,
    state: DeviceState,
}

impl NmDevice {
    /// Load the device at `path`.
    pub async fn load(conn: &Connection, path: &str) -> ServiceResult<Self> {
        let device = proxy(conn, path, NM_DEVICE_INTERFACE).await?;
        let iface: String = device
            .get_property("Interface")
            .await
            .map_err(service_error)?;
        let state: u32 = device.get_property("State").await.map_err(service_error)?;
        Ok(Self {
            conn: conn.clone(),
            path: path.to_string(),
            iface,
            state: DeviceState::from(state),
        })
    }
}

impl fmt::Debug for NmDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NmDevice")
            .field("path", &self.path)
            .field("iface", &self.iface)
            .field("state", &self.state)
            .finish()
    }
}

#[async_trait]
impl NetworkDevice for NmDevice {
    fn iface(&self) -> &str {
        &self.iface
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    fn object_path(&self) -> &str {
        &self.path
    }

    async fn active_connection(&self) -> ServiceResult<Option<ActiveConnectionRef>> {
        let device = proxy(&self.conn, &self.path, NM_DEVICE_INTERFACE).await?;
        let active: OwnedObjectPath = device
            .get_property("ActiveConnection")
            .await
            .map_err(service_error)?;
        if active.as_str() == NO_OBJECT_PATH {
            return Ok(None);
        }
        let active = NmActiveConnection::load(&self.conn, active.as_str()).await?;
        Ok(Some(Arc::new(active)))
    }
}

// ============================================================================
// Active Connection
// ============================================================================

type StateCache = Arc<Mutex<(ActiveConnectionState, StateReason)>>;

/// A live activation.
///
/// Each subscription runs a task forwarding `StateChanged` signals. The task
/// updates the cached state before delivering, and is aborted on unsubscribe.
pub struct NmActiveConnection {
    proxy: Proxy<'static>,
    path: String,
    devname: Option<String>,
    profile: Option<Profile>,
    state: StateCache,
    forwarders: Mutex<HashMap<u64, JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl NmActiveConnection {
    /// Load the active connection at `path` with its device and profile.
    pub async fn load(conn: &Connection, path: &str) -> ServiceResult<Self> {
        let active = proxy(conn, path, NM_ACTIVE_CONNECTION_INTERFACE).await?;
        let state: u32 = active.get_property("State").await.map_err(service_error)?;

        let devices: Vec<OwnedObjectPath> = active
            .get_property("Devices")
            .await
            .map_err(service_error)?;
        let devname = match devices.first() {
            Some(device) => {
                let device = proxy(conn, device.as_str(), NM_DEVICE_INTERFACE).await?;
                Some(
                    device
                        .get_property::<String>("Interface")
                        .await
                        .map_err(service_error)?,
                )
            }
            None => None,
        };

        let settings: OwnedObjectPath = active
            .get_property("Connection")
            .await
            .map_err(service_error)?;
        let profile = if settings.as_str() == NO_OBJECT_PATH {
            None
        } else {
            Some(read_profile(conn, settings.as_str()).await?)
        };

        Ok(Self {
            proxy: active,
            path: path.to_string(),
            devname,
            profile,
            state: Arc::new(Mutex::new((
                ActiveConnectionState::from(state),
                StateReason::None,
            ))),
            forwarders: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn object_path(&self) -> &str {
        &self.path
    }

    fn spawn_forwarder(
        &self,
        sender: mpsc::UnboundedSender<StateChange>,
    ) -> JoinHandle<()> {
        let proxy = self.proxy.clone();
        let cache = Arc::clone(&self.state);
        let path = self.path.clone();

        tokio::spawn(async move {
            let mut stream = match proxy.receive_signal("StateChanged").await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to subscribe to state changes of {}: {}", path, e);
                    return;
                }
            };

            // A transition may have landed before the match rule was in place.
            if let Ok(raw) = proxy.get_property::<u32>("State").await {
                let state = ActiveConnectionState::from(raw);
                let change = {
                    let mut cached = lock(&cache);
                    if cached.0 == state {
                        None
                    } else {
                        cached.0 = state;
                        Some(StateChange {
                            state,
                            reason: cached.1,
                        })
                    }
                };
                if let Some(change) = change {
                    if sender.send(change).is_err() {
                        return;
                    }
                }
            }

            while let Some(message) = stream.next().await {
                let (state, reason) = match message.body().deserialize::<(u32, u32)>() {
                    Ok(body) => body,
                    Err(e) => {
                        debug!("Ignoring malformed StateChanged on {}: {}", path, e);
                        continue;
                    }
                };
                let change = StateChange {
                    state: ActiveConnectionState::from(state),
                    reason: StateReason::from(reason),
                };
                *lock(&cache) = (change.state, change.reason);
                if sender.send(change).is_err() {
                    break;
                }
            }
            debug!("State change stream of {} ended", path);
        })
    }
}

impl fmt::Debug for NmActiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NmActiveConnection")
            .field("path", &self.path)
            .field("devname", &self.devname)
            .field("state", &*lock(&self.state))
            .finish()
    }
}

impl ActiveConnectionObject for NmActiveConnection {
    fn state(&self) -> ActiveConnectionState {
        lock(&self.state).0
    }

    fn state_reason(&self) -> StateReason {
        lock(&self.state).1
    }

    fn devname(&self) -> Option<String> {
        self.devname.clone()
    }

    fn connection(&self) -> Option<Profile> {
        self.profile.clone()
    }

    fn subscribe_state_changed(&self) -> StateSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = self.spawn_forwarder(sender);
        lock(&self.forwarders).insert(id, handle);
        StateSubscription {
            id: SubscriptionId(id),
            receiver,
        }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(handle) = lock(&self.forwarders).remove(&id.0) {
            handle.abort();
        }
    }
}

impl Drop for NmActiveConnection {
    fn drop(&mut self) {
        for (_, handle) in lock(&self.forwarders).drain() {
            handle.abort();
        }
    }
}
