// Network Profiles - Connection Profile Workflows
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Create, import, update, commit and activate a connection profile.
//!
//! `add`, `commit` and `activate` do not perform any work themselves: they
//! queue an action on the context's event loop. The action signals success,
//! retry or failure back to the loop when its service call resolves.
//!
//! Activation runs as one action that may be re-issued:
//!
//! 1. Resolve the profile (by id, by device, or the one already loaded)
//! 2. If the device is already activating a connection, wait for it
//! 3. Otherwise request activation
//! 4. Wait until the active connection is activated or gives up

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::{ActiveConnection, Context};
use crate::models::{Error, Profile, Result, Setting};
use crate::service::{ActiveConnectionRef, DeviceRef, ServiceResult};

#[derive(Debug, Default)]
struct ProfileState {
    profile: Option<Profile>,
    device: Option<DeviceRef>,
    con_id: Option<String>,
}

enum WaitOutcome {
    Active,
    Failed,
    Closed,
    Canceled,
}

/// A connection profile bound to a workflow context.
///
/// Cloning is cheap and clones share the same profile.
#[derive(Clone)]
pub struct ConnectionProfile {
    ctx: Context,
    state: Arc<Mutex<ProfileState>>,
}

impl ConnectionProfile {
    /// Create an empty profile handle.
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            state: Arc::new(Mutex::new(ProfileState::default())),
        }
    }

    /// Wrap an existing profile.
    pub fn with_profile(ctx: &Context, profile: Profile) -> Self {
        let this = Self::new(ctx);
        this.lock().profile = Some(profile);
        this
    }

    /// Await a service call under a fresh token of the context's loop.
    async fn guarded<T, F>(&self, call: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        let event_loop = self.ctx.event_loop();
        let cancellable = event_loop.new_cancellable();
        let result = cancellable.run(call).await;
        event_loop.drop_cancellable(cancellable);
        result
    }

    fn lock(&self) -> MutexGuard<'_, ProfileState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Connection profile state poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Build a fresh profile from an ordered sequence of setting fragments.
    pub fn create(&self, settings: impl IntoIterator<Item = Setting>) {
        self.lock().profile = Some(Profile::from_settings(settings));
    }

    /// Load the profile backing the device's active connection. The profile
    /// is left empty when the device has no active connection.
    pub async fn import_by_device(&self, device: &DeviceRef) -> Result<()> {
        {
            let mut state = self.lock();
            state.profile = None;
            state.device = Some(device.clone());
        }
        if let Some(active) = self.guarded(device.active_connection()).await? {
            self.lock().profile = active.connection();
        }
        Ok(())
    }

    /// Load a stored profile by connection name.
    pub async fn import_by_id(&self, con_id: &str) -> Result<()> {
        {
            let mut state = self.lock();
            state.profile = None;
            if con_id.is_empty() {
                return Ok(());
            }
            state.con_id = Some(con_id.to_string());
        }
        let profile = self
            .guarded(self.ctx.service().get_connection_by_id(con_id))
            .await?;
        if profile.is_none() {
            debug!("No connection profile named {}", con_id);
        }
        self.lock().profile = profile;
        Ok(())
    }

    /// Replace this profile's settings with another's.
    pub fn update(&self, other: &ConnectionProfile) -> Result<()> {
        let source = other
            .profile()
            .ok_or_else(|| Error::InvalidProfile("source profile is empty".to_string()))?;
        let mut state = self.lock();
        let target = state
            .profile
            .as_mut()
            .ok_or_else(|| Error::InvalidProfile("no profile loaded to update".to_string()))?;
        target.replace_settings_from(&source);
        Ok(())
    }

    /// Queue submission of this profile as a new connection.
    pub fn add(&self, persist: bool) {
        let this = self.clone();
        self.ctx.event_loop().push_action("add-connection", move || {
            let this = this.clone();
            async move { this.add_connection(persist).await }
        });
    }

    /// Queue an in-place commit of this profile.
    pub fn commit(&self, persist: bool, device: Option<DeviceRef>) {
        let this = self.clone();
        self.ctx.event_loop().push_action("commit-changes", move || {
            let this = this.clone();
            let device = device.clone();
            async move { this.commit_changes(persist, device).await }
        });
    }

    /// Queue activation of this profile. See the module docs for the steps.
    pub fn activate(&self, device: Option<DeviceRef>, connection_id: Option<String>) {
        let this = self.clone();
        self.ctx.event_loop().push_action("activate-connection", move || {
            let this = this.clone();
            let device = device.clone();
            let connection_id = connection_id.clone();
            async move { this.safe_activate(device, connection_id).await }
        });
    }

    /// Snapshot of the current profile.
    pub fn profile(&self) -> Option<Profile> {
        self.lock().profile.clone()
    }

    /// Interface name bound to the current profile.
    pub fn devname(&self) -> Option<String> {
        self.lock()
            .profile
            .as_ref()
            .and_then(|p| p.interface_name().map(str::to_string))
    }

    // ========================================================================
    // Actions
    // ========================================================================

    async fn add_connection(&self, persist: bool) {
        let event_loop = self.ctx.event_loop();
        let Some(profile) = self.profile() else {
            event_loop.quit("Connection adding failed: error=no profile loaded");
            return;
        };

        let result = self
            .guarded(self.ctx.service().add_connection(&profile, persist))
            .await;

        match result {
            Err(e) if event_loop.is_action_canceled(&e) => {
                debug!("Connection adding canceled: error={}", e);
            }
            Err(e) => event_loop.quit(format!("Connection adding failed: error={}", e)),
            Ok(None) => event_loop.quit("Connection adding failed: error=unknown"),
            Ok(Some(added)) => {
                debug!(
                    "Connection adding succeeded: dev={}",
                    added.interface_name().unwrap_or("-")
                );
                self.lock().profile = Some(added);
                event_loop.execute_next_action();
            }
        }
    }

    async fn commit_changes(&self, persist: bool, device: Option<DeviceRef>) {
        let event_loop = self.ctx.event_loop();
        let Some(profile) = self.profile() else {
            event_loop.quit("Connection update failed: error=no profile loaded");
            return;
        };

        let result = self
            .guarded(self.ctx.service().commit_changes(&profile, persist))
            .await;

        let devname = profile.interface_name().unwrap_or("-");
        match result {
            Err(e) if event_loop.is_action_canceled(&e) => {
                debug!("Connection update aborted: error={}", e);
            }
            Err(e) => {
                let dev = device
                    .as_ref()
                    .map(|d| format!("{}/{}", d.iface(), d.state()))
                    .unwrap_or_else(|| "unknown".to_string());
                event_loop.quit(format!("Connection update failed: error={}, dev={}", e, dev));
            }
            Ok(true) => {
                debug!("Connection update succeeded: dev={}", devname);
                event_loop.execute_next_action();
            }
            Ok(false) => {
                event_loop.quit(format!(
                    "Connection update failed: dev={}, error=unknown",
                    devname
                ));
            }
        }
    }

    async fn safe_activate(&self, device: Option<DeviceRef>, connection_id: Option<String>) {
        let event_loop = self.ctx.event_loop();
        let resolved = if let Some(id) = connection_id.as_deref() {
            self.import_by_id(id).await
        } else if let Some(dev) = &device {
            self.import_by_device(dev).await
        } else if self.profile().is_none() {
            event_loop.quit("Missing base properties: profile=None, id=None, dev=None");
            return;
        } else {
            Ok(())
        };

        if let Err(e) = resolved {
            let (act_type, act_object) = self.activation_metadata();
            if e.is_canceled() {
                debug!("Profile lookup canceled on {} {}", act_type, act_object);
            } else {
                event_loop.quit(format!(
                    "Connection activation failed on {} {}: error={}",
                    act_type, act_object, e
                ));
            }
            return;
        }

        let profile = self.profile();
        if profile.is_none() && device.is_none() {
            let (act_type, act_object) = self.activation_metadata();
            event_loop.quit(format!(
                "Connection activation failed on {} {}: error=no matching profile",
                act_type, act_object
            ));
            return;
        }

        if let Some(dev) = &device {
            match self.guarded(dev.active_connection()).await {
                Ok(Some(active)) => {
                    let ac = ActiveConnection::new(active);
                    if ac.is_activating() {
                        debug!(
                            "Connection activation in progress: dev={}, state={}",
                            ac.devname().unwrap_or_default(),
                            ac.state()
                        );
                        self.wait_for_active_connection(ac).await;
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) if event_loop.is_action_canceled(&e) => {
                    debug!("Active connection lookup canceled on {}", dev.iface());
                    return;
                }
                Err(e) => debug!("Could not read active connection of {}: {}", dev.iface(), e),
            }
        }

        let result = self
            .guarded(
                self.ctx
                    .service()
                    .activate_connection(profile.as_ref(), device.as_deref()),
            )
            .await;

        self.on_activation_result(result).await;
    }

    async fn on_activation_result(&self, result: ServiceResult<Option<ActiveConnectionRef>>) {
        let event_loop = self.ctx.event_loop();
        let active = match result {
            Ok(Some(active)) => active,
            Ok(None) => {
                let (act_type, act_object) = self.activation_metadata();
                event_loop.quit(format!(
                    "Connection activation failed on {} {}: error=unknown",
                    act_type, act_object
                ));
                return;
            }
            Err(e) => {
                let (act_type, act_object) = self.activation_metadata();
                if event_loop.is_action_canceled(&e) {
                    debug!(
                        "Connection activation canceled on {} {}: error={}",
                        act_type, act_object, e
                    );
                } else if e.is_transient_unavailable() {
                    warn!(
                        "Connection unavailable on {} {}, retrying",
                        act_type, act_object
                    );
                    event_loop.execute_last_action();
                } else {
                    event_loop.quit(format!(
                        "Connection activation failed on {} {}: error={}",
                        act_type, act_object, e
                    ));
                }
                return;
            }
        };

        let ac = ActiveConnection::new(active);
        debug!(
            "Connection activation initiated: dev={}, con-state={}",
            ac.devname().unwrap_or_default(),
            ac.state()
        );
        if ac.is_active() {
            event_loop.execute_next_action();
        } else if ac.is_activating() {
            self.wait_for_active_connection(ac).await;
        } else {
            event_loop.quit(format!(
                "Connection activation failed on {}: reason={}",
                ac.devname().unwrap_or_else(|| "unknown".to_string()),
                ac.reason()
            ));
        }
    }

    async fn wait_for_active_connection(&self, mut ac: ActiveConnection) {
        let event_loop = self.ctx.event_loop();
        let cancellable = event_loop.new_cancellable();
        let mut changes = ac.subscribe();

        let outcome = loop {
            ac.refresh_state();
            if ac.is_active() {
                break WaitOutcome::Active;
            }
            if !ac.is_activating() {
                break WaitOutcome::Failed;
            }
            let change = tokio::select! {
                biased;
                _ = cancellable.cancelled() => None,
                change = changes.recv() => Some(change),
            };
            match change {
                None => break WaitOutcome::Canceled,
                Some(None) => break WaitOutcome::Closed,
                Some(Some(change)) => debug!(
                    "Connection state changed: dev={}, state={}, reason={}",
                    ac.devname().unwrap_or_default(),
                    change.state,
                    change.reason
                ),
            }
        };

        ac.release_subscriptions();
        event_loop.drop_cancellable(cancellable);

        let devname = ac.devname().unwrap_or_else(|| "unknown".to_string());
        match outcome {
            WaitOutcome::Active => {
                debug!(
                    "Connection activation succeeded: dev={}, con-state={}",
                    devname,
                    ac.state()
                );
                event_loop.execute_next_action();
            }
            WaitOutcome::Failed => event_loop.quit(format!(
                "Connection activation failed on {}: reason={}",
                devname,
                ac.reason()
            )),
            WaitOutcome::Closed => event_loop.quit(format!(
                "Connection activation failed on {}: error=state notifications stopped",
                devname
            )),
            WaitOutcome::Canceled => {
                debug!("Waiting for activation on {} canceled", devname);
            }
        }
    }

    fn activation_metadata(&self) -> (&'static str, String) {
        let state = self.lock();
        if let Some(device) = &state.device {
            ("device", device.iface().to_string())
        } else if let Some(con_id) = &state.con_id {
            ("connection_id", con_id.clone())
        } else {
            ("unknown", "unknown".to_string())
        }
    }
}
