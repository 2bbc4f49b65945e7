// Network Profiles - Connection Workflows
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Profile workflows driven through an [`EventLoop`].
//!
//! A [`Context`] bundles the configuration service with the event loop of one
//! workflow. Every [`ConnectionProfile`] built from the same context queues
//! its actions on the same loop, so a caller can chain several steps (add,
//! then activate, ...) and await them with [`Context::run`].

mod active;
mod profile;
mod setting;

pub use active::ActiveConnection;
pub use profile::ConnectionProfile;
pub use setting::ConnectionSetting;

use std::sync::Arc;
use std::time::Duration;

use crate::event_loop::EventLoop;
use crate::models::{ActivationConfig, Result};
use crate::service::NetworkService;

/// Service client plus the event loop of one workflow.
#[derive(Clone)]
pub struct Context {
    service: Arc<dyn NetworkService>,
    event_loop: Arc<EventLoop>,
}

impl Context {
    /// Create a context with a default event loop.
    pub fn new(service: Arc<dyn NetworkService>) -> Self {
        Self::with_event_loop(service, Arc::new(EventLoop::new()))
    }

    /// Create a context whose loop follows the configured retry policy.
    pub fn from_config(service: Arc<dyn NetworkService>, config: &ActivationConfig) -> Self {
        Self::with_event_loop(service, Arc::new(EventLoop::with_retry(config.retry.clone())))
    }

    pub fn with_event_loop(service: Arc<dyn NetworkService>, event_loop: Arc<EventLoop>) -> Self {
        Self {
            service,
            event_loop,
        }
    }

    pub fn service(&self) -> &Arc<dyn NetworkService> {
        &self.service
    }

    pub fn event_loop(&self) -> &Arc<EventLoop> {
        &self.event_loop
    }

    /// Run every queued action, optionally bounded by a deadline.
    pub async fn run(&self, timeout: Option<Duration>) -> Result<()> {
        match timeout {
            Some(timeout) => self.event_loop.run_with_timeout(timeout).await,
            None => self.event_loop.run().await,
        }
    }
}
