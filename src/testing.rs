// Network Profiles - Test Doubles
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! In-memory configuration service used by unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

use crate::models::{ActiveConnectionState, DeviceState, Profile, ServiceError, StateReason};
use crate::service::{
    ActiveConnectionObject, ActiveConnectionRef, DeviceRef, NetworkDevice, NetworkService,
    ServiceResult, StateChange, StateSubscription, SubscriptionId,
};

/// Active connection whose state is driven by the test.
#[derive(Debug)]
pub struct FakeActiveConnection {
    devname: String,
    profile: Option<Profile>,
    state: Mutex<(ActiveConnectionState, StateReason)>,
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<StateChange>>>,
    next_id: AtomicU64,
    unsubscribe_calls: AtomicUsize,
    subscribed: Notify,
}

impl FakeActiveConnection {
    pub fn new(devname: &str, state: ActiveConnectionState) -> Self {
        Self {
            devname: devname.to_string(),
            profile: None,
            state: Mutex::new((state, StateReason::None)),
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            unsubscribe_calls: AtomicUsize::new(0),
            subscribed: Notify::new(),
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Change the state without notifying subscribers.
    pub fn set_state(&self, state: ActiveConnectionState, reason: StateReason) {
        *self.state.lock().expect("fake state mutex") = (state, reason);
    }

    /// Change the state and notify every subscriber.
    pub fn emit(&self, state: ActiveConnectionState, reason: StateReason) {
        self.set_state(state, reason);
        for sender in self.subscribers.lock().expect("fake subscribers mutex").values() {
            let _ = sender.send(StateChange { state, reason });
        }
    }

    /// Drop every subscriber channel, as if the bus went away.
    pub fn close(&self) {
        self.subscribers.lock().expect("fake subscribers mutex").clear();
    }

    /// Resolves after the next subscription is registered.
    pub async fn wait_for_subscriber(&self) {
        self.subscribed.notified().await;
    }

    pub fn live_subscriptions(&self) -> usize {
        self.subscribers.lock().expect("fake subscribers mutex").len()
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }
}

impl ActiveConnectionObject for FakeActiveConnection {
    fn state(&self) -> ActiveConnectionState {
        self.state.lock().expect("fake state mutex").0
    }

    fn state_reason(&self) -> StateReason {
        self.state.lock().expect("fake state mutex").1
    }

    fn devname(&self) -> Option<String> {
        Some(self.devname.clone())
    }

    fn connection(&self) -> Option<Profile> {
        self.profile.clone()
    }

    fn subscribe_state_changed(&self) -> StateSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("fake subscribers mutex")
            .insert(id, sender);
        self.subscribed.notify_one();
        StateSubscription {
            id: SubscriptionId(id),
            receiver,
        }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .lock()
            .expect("fake subscribers mutex")
            .remove(&id.0);
    }
}

/// Device with a settable active connection.
#[derive(Debug)]
pub struct FakeDevice {
    iface: String,
    path: String,
    active: Mutex<Option<ActiveConnectionRef>>,
    stalled: bool,
}

impl FakeDevice {
    pub fn new(iface: &str) -> Self {
        Self {
            iface: iface.to_string(),
            path: format!("/fake/devices/{iface}"),
            active: Mutex::new(None),
            stalled: false,
        }
    }

    /// Active-connection reads never resolve.
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn with_active_connection(self, active: ActiveConnectionRef) -> Self {
        *self.active.lock().expect("fake device mutex") = Some(active);
        self
    }
}

#[async_trait]
impl NetworkDevice for FakeDevice {
    fn iface(&self) -> &str {
        &self.iface
    }

    fn state(&self) -> DeviceState {
        if self.active.lock().expect("fake device mutex").is_some() {
            DeviceState::Activated
        } else {
            DeviceState::Disconnected
        }
    }

    fn object_path(&self) -> &str {
        &self.path
    }

    async fn active_connection(&self) -> ServiceResult<Option<ActiveConnectionRef>> {
        if self.stalled {
            return std::future::pending().await;
        }
        Ok(self.active.lock().expect("fake device mutex").clone())
    }
}

/// Arguments of one recorded activation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateCall {
    pub profile: Option<Profile>,
    pub device: Option<String>,
}

/// Scripted configuration service.
#[derive(Default)]
pub struct FakeService {
    connections: Mutex<HashMap<String, Profile>>,
    devices: Mutex<HashMap<String, DeviceRef>>,
    activate_results: Mutex<VecDeque<ServiceResult<Option<ActiveConnectionRef>>>>,
    add_results: Mutex<VecDeque<ServiceResult<Option<Profile>>>>,
    commit_results: Mutex<VecDeque<ServiceResult<bool>>>,
    activate_calls: Mutex<Vec<ActivateCall>>,
    add_calls: Mutex<Vec<(Profile, bool)>>,
    commit_calls: Mutex<Vec<(Profile, bool)>>,
    stalled_lookups: AtomicBool,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_connection(&self, id: &str, profile: Profile) {
        self.connections
            .lock()
            .expect("fake service mutex")
            .insert(id.to_string(), profile);
    }

    pub fn insert_device(&self, device: DeviceRef) {
        self.devices
            .lock()
            .expect("fake service mutex")
            .insert(device.iface().to_string(), device);
    }

    /// Make connection lookups by name never resolve.
    pub fn stall_lookups(&self) {
        self.stalled_lookups.store(true, Ordering::SeqCst);
    }

    pub fn push_activate_result(&self, result: ServiceResult<Option<ActiveConnectionRef>>) {
        self.activate_results
            .lock()
            .expect("fake service mutex")
            .push_back(result);
    }

    pub fn push_add_result(&self, result: ServiceResult<Option<Profile>>) {
        self.add_results
            .lock()
            .expect("fake service mutex")
            .push_back(result);
    }

    pub fn push_commit_result(&self, result: ServiceResult<bool>) {
        self.commit_results
            .lock()
            .expect("fake service mutex")
            .push_back(result);
    }

    pub fn activate_calls(&self) -> Vec<ActivateCall> {
        self.activate_calls.lock().expect("fake service mutex").clone()
    }

    pub fn add_calls(&self) -> Vec<(Profile, bool)> {
        self.add_calls.lock().expect("fake service mutex").clone()
    }

    pub fn commit_calls(&self) -> Vec<(Profile, bool)> {
        self.commit_calls.lock().expect("fake service mutex").clone()
    }

    fn unscripted(call: &str) -> ServiceError {
        ServiceError::Transport(format!("no scripted result for {call}"))
    }
}

#[async_trait]
impl NetworkService for FakeService {
    async fn add_connection(
        &self,
        profile: &Profile,
        persist: bool,
    ) -> ServiceResult<Option<Profile>> {
        self.add_calls
            .lock()
            .expect("fake service mutex")
            .push((profile.clone(), persist));
        self.add_results
            .lock()
            .expect("fake service mutex")
            .pop_front()
            .unwrap_or_else(|| Ok(Some(profile.clone().with_remote_id("/fake/settings/1"))))
    }

    async fn commit_changes(&self, profile: &Profile, persist: bool) -> ServiceResult<bool> {
        self.commit_calls
            .lock()
            .expect("fake service mutex")
            .push((profile.clone(), persist));
        self.commit_results
            .lock()
            .expect("fake service mutex")
            .pop_front()
            .unwrap_or(Ok(true))
    }

    async fn activate_connection(
        &self,
        profile: Option<&Profile>,
        device: Option<&dyn NetworkDevice>,
    ) -> ServiceResult<Option<ActiveConnectionRef>> {
        self.activate_calls
            .lock()
            .expect("fake service mutex")
            .push(ActivateCall {
                profile: profile.cloned(),
                device: device.map(|d| d.iface().to_string()),
            });
        self.activate_results
            .lock()
            .expect("fake service mutex")
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("activate_connection")))
    }

    async fn get_connection_by_id(&self, id: &str) -> ServiceResult<Option<Profile>> {
        if self.stalled_lookups.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        Ok(self
            .connections
            .lock()
            .expect("fake service mutex")
            .get(id)
            .cloned())
    }

    async fn device_by_iface(&self, iface: &str) -> ServiceResult<Option<DeviceRef>> {
        Ok(self
            .devices
            .lock()
            .expect("fake service mutex")
            .get(iface)
            .cloned())
    }
}

/// Shorthand for an `Arc`'d fake active connection.
pub fn active(devname: &str, state: ActiveConnectionState) -> Arc<FakeActiveConnection> {
    Arc::new(FakeActiveConnection::new(devname, state))
}
