// Network Profiles - Active Connection View
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Read-only projection of a live activation.

use tokio::sync::mpsc;
use tracing::debug;

use crate::models::{ActiveConnectionState, StateReason};
use crate::service::{ActiveConnectionRef, StateChange, SubscriptionId};

/// Snapshot of an active connection plus the subscriptions registered on it.
///
/// Every subscription taken through [`ActiveConnection::subscribe`] is
/// released once, either by [`ActiveConnection::release_subscriptions`] or
/// when the view is dropped.
#[derive(Debug)]
pub struct ActiveConnection {
    inner: ActiveConnectionRef,
    state: ActiveConnectionState,
    reason: StateReason,
    handlers: Vec<SubscriptionId>,
}

impl ActiveConnection {
    pub fn new(inner: ActiveConnectionRef) -> Self {
        let state = inner.state();
        let reason = inner.state_reason();
        Self {
            inner,
            state,
            reason,
            handlers: Vec::new(),
        }
    }

    /// Re-read the state from the underlying object.
    pub fn refresh_state(&mut self) {
        self.state = self.inner.state();
        self.reason = self.inner.state_reason();
    }

    pub fn state(&self) -> ActiveConnectionState {
        self.state
    }

    pub fn is_activating(&self) -> bool {
        self.state == ActiveConnectionState::Activating
    }

    pub fn is_active(&self) -> bool {
        self.state == ActiveConnectionState::Activated
    }

    /// Failure cause, combining the terminal state and the reported reason.
    pub fn reason(&self) -> String {
        format!("{} ({})", self.state, self.reason)
    }

    pub fn devname(&self) -> Option<String> {
        self.inner.devname()
    }

    /// Underlying object.
    pub fn nm_active_connection(&self) -> &ActiveConnectionRef {
        &self.inner
    }

    /// Register for state-change notifications.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StateChange> {
        let subscription = self.inner.subscribe_state_changed();
        self.handlers.push(subscription.id);
        subscription.receiver
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.handlers.len()
    }

    /// Release every registered subscription.
    pub fn release_subscriptions(&mut self) {
        for id in self.handlers.drain(..) {
            self.inner.unsubscribe(id);
        }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        if !self.handlers.is_empty() {
            debug!(
                "Releasing {} dangling state subscription(s) on {}",
                self.handlers.len(),
                self.devname().unwrap_or_default()
            );
            self.release_subscriptions();
        }
    }
}
