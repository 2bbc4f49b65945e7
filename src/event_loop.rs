// Network Profiles - Action Event Loop
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Single-flow scheduler for asynchronous profile actions.
//!
//! The loop owns a FIFO queue of [`PendingAction`]s and runs exactly one at a
//! time. An action never advances the queue by returning; it must signal its
//! outcome through the loop before it returns:
//!
//! - [`EventLoop::execute_next_action`]: the step succeeded, dispatch the next
//! - [`EventLoop::execute_last_action`]: re-issue the same action (transient failure)
//! - [`EventLoop::quit`]: fatal failure, abandon the queue
//!
//! An action that returns without signalling is only legitimate when the loop
//! was canceled externally (watchdog timeout or [`EventLoop::cancel`]).
//!
//! Every asynchronous call an action issues is bound to a [`Cancellable`]
//! derived from the loop's root token, so canceling the loop resolves every
//! outstanding call with [`ServiceError::Cancelled`].

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::models::{Error, Result, RetryConfig, ServiceError};
use crate::service::ServiceResult;

/// Boxed future produced by one invocation of an action.
pub type ActionFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A queued, re-invocable unit of work.
///
/// The closure captures every argument it needs, so re-invoking it issues the
/// identical call again.
#[derive(Clone)]
pub struct PendingAction {
    name: String,
    call: Arc<dyn Fn() -> ActionFuture + Send + Sync>,
}

impl PendingAction {
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            call: Arc::new(move || Box::pin(action()) as ActionFuture),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self) -> ActionFuture {
        (self.call)()
    }
}

impl fmt::Debug for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Cancellation token scoped to one asynchronous call.
///
/// Obtained from [`EventLoop::new_cancellable`] and handed back by value to
/// [`EventLoop::drop_cancellable`], so it can be released only once.
#[derive(Debug)]
pub struct Cancellable {
    id: u64,
    token: CancellationToken,
}

impl Cancellable {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the token is canceled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Drive a service call, resolving with [`ServiceError::Cancelled`] as
    /// soon as the token is canceled.
    pub async fn run<T, F>(&self, call: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ServiceError::Cancelled),
            result = call => result,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Next,
    Retry,
    Quit,
}

#[derive(Debug, Default)]
struct LoopState {
    queue: VecDeque<PendingAction>,
    current: Option<PendingAction>,
    directive: Option<Directive>,
    error: Option<String>,
    cancellables: HashSet<u64>,
    next_cancellable_id: u64,
    retries: u32,
    finished: bool,
}

/// Action queue and cancellation registry for one workflow.
#[derive(Debug)]
pub struct EventLoop {
    state: Mutex<LoopState>,
    root: CancellationToken,
    retry: RetryConfig,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Create a loop that retries transient failures without limit or delay.
    pub fn new() -> Self {
        Self::with_retry(RetryConfig::default())
    }

    /// Create a loop with an explicit retry policy.
    pub fn with_retry(retry: RetryConfig) -> Self {
        Self {
            state: Mutex::new(LoopState::default()),
            root: CancellationToken::new(),
            retry,
        }
    }

    /// Lock the loop state, recovering from poison if needed.
    fn lock(&self) -> MutexGuard<'_, LoopState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Event loop state poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    // ========================================================================
    // Queue
    // ========================================================================

    /// Enqueue an action. Actions run in FIFO order once [`EventLoop::run`]
    /// is awaited; the first one starts immediately.
    pub fn push_action<F, Fut>(&self, name: impl Into<String>, action: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action = PendingAction::new(name, action);
        let mut state = self.lock();
        if state.finished || state.error.is_some() {
            warn!("Event loop is terminal, dropping action {}", action.name());
            return;
        }
        debug!("Queued action {} ({} pending)", action.name(), state.queue.len() + 1);
        state.queue.push_back(action);
    }

    /// Signal that the in-flight action succeeded.
    pub fn execute_next_action(&self) {
        self.signal(Directive::Next);
    }

    /// Re-issue the in-flight action with the same arguments.
    pub fn execute_last_action(&self) {
        self.signal(Directive::Retry);
    }

    fn signal(&self, directive: Directive) {
        let mut state = self.lock();
        if state.finished || state.error.is_some() {
            debug!("Ignoring {:?}: event loop is terminal", directive);
            return;
        }
        let Some(current) = state.current.as_ref() else {
            debug!("Ignoring {:?}: no action in flight", directive);
            return;
        };
        if let Some(previous) = state.directive {
            debug!(
                "Action {} already signalled {:?}, now {:?}",
                current.name(),
                previous,
                directive
            );
        }
        state.directive = Some(directive);
    }

    /// Record a fatal failure and abandon all queued work.
    ///
    /// The first message wins; later calls are logged and ignored.
    pub fn quit(&self, message: impl Into<String>) {
        let message = message.into();
        let mut state = self.lock();
        if let Some(first) = state.error.as_ref() {
            debug!("Ignoring failure after '{}': {}", first, message);
            return;
        }
        error!("{}", message);
        state.error = Some(message);
        state.directive = Some(Directive::Quit);
        state.queue.clear();
    }

    /// First fatal message, if any.
    pub fn error_message(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Number of actions waiting behind the in-flight one.
    pub fn pending_actions(&self) -> usize {
        self.lock().queue.len()
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Allocate a token for one asynchronous call.
    pub fn new_cancellable(&self) -> Cancellable {
        let mut state = self.lock();
        let id = state.next_cancellable_id;
        state.next_cancellable_id += 1;
        state.cancellables.insert(id);
        Cancellable {
            id,
            token: self.root.child_token(),
        }
    }

    /// Release a token once its call has resolved.
    pub fn drop_cancellable(&self, cancellable: Cancellable) {
        if !self.lock().cancellables.remove(&cancellable.id) {
            warn!("Releasing unknown cancellable {}", cancellable.id);
        }
    }

    /// Number of tokens currently allocated.
    pub fn live_cancellables(&self) -> usize {
        self.lock().cancellables.len()
    }

    /// Check whether a failed call was aborted through its token.
    pub fn is_action_canceled(&self, err: &ServiceError) -> bool {
        err.is_cancelled()
    }

    /// Cancel every outstanding call.
    pub fn cancel(&self) {
        debug!("Canceling event loop");
        self.root.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.root.is_cancelled()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Run queued actions until the queue drains, an action quits, or the
    /// loop is canceled.
    pub async fn run(&self) -> Result<()> {
        let mut next = self.begin()?;
        while let Some(action) = next {
            debug!("Executing action {}", action.name());
            action.invoke().await;
            next = self.complete(&action).await?;
        }
        debug!("Action queue drained");
        Ok(())
    }

    /// Run with a deadline. When it passes, every outstanding call is
    /// canceled and the in-flight action is allowed to observe that before
    /// the timeout is reported.
    pub async fn run_with_timeout(&self, timeout: Duration) -> Result<()> {
        let run = self.run();
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => return result,
            _ = tokio::time::sleep(timeout) => {}
        }

        warn!("Action queue did not finish within {:?}, canceling", timeout);
        self.cancel();
        match run.await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("Action queue stopped after timeout: {}", e);
                Err(Error::ActionTimeout(format!("no result after {:?}", timeout)))
            }
        }
    }

    fn begin(&self) -> Result<Option<PendingAction>> {
        let mut state = self.lock();
        if let Some(message) = state.error.clone() {
            state.finished = true;
            return Err(Error::action_failed("event-loop", message));
        }
        if self.root.is_cancelled() {
            state.finished = true;
            return Err(Error::Canceled);
        }
        Ok(Self::dispatch(&mut state))
    }

    fn dispatch(state: &mut LoopState) -> Option<PendingAction> {
        state.retries = 0;
        state.directive = None;
        state.current = state.queue.pop_front();
        if state.current.is_none() {
            state.finished = true;
        }
        state.current.clone()
    }

    fn finish(state: &mut LoopState) {
        state.current = None;
        state.directive = None;
        state.finished = true;
        state.queue.clear();
    }

    async fn complete(&self, action: &PendingAction) -> Result<Option<PendingAction>> {
        let attempt = {
            let mut state = self.lock();
            match state.directive.take() {
                Some(Directive::Next) => {
                    debug!("Action {} succeeded", action.name());
                    return Ok(Self::dispatch(&mut state));
                }
                Some(Directive::Quit) => {
                    let reason = state.error.clone().unwrap_or_default();
                    Self::finish(&mut state);
                    return Err(Error::action_failed(action.name(), reason));
                }
                Some(Directive::Retry) => {
                    state.retries += 1;
                    if let Some(max) = self.retry.max_unavailable_retries {
                        if state.retries > max {
                            let message = format!(
                                "Action {} still failing after {} retries",
                                action.name(),
                                max
                            );
                            error!("{}", message);
                            state.error.get_or_insert_with(|| message.clone());
                            Self::finish(&mut state);
                            return Err(Error::action_failed(action.name(), message));
                        }
                    }
                    state.retries
                }
                None => {
                    Self::finish(&mut state);
                    if self.root.is_cancelled() {
                        debug!("Action {} ended by cancellation", action.name());
                        return Err(Error::Canceled);
                    }
                    return Err(Error::Internal(format!(
                        "Action {} finished without reporting an outcome",
                        action.name()
                    )));
                }
            }
        };

        let delay = self.retry.delay();
        if !delay.is_zero() {
            tokio::select! {
                _ = self.root.cancelled() => {
                    Self::finish(&mut self.lock());
                    return Err(Error::Canceled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
        debug!("Retrying action {} (retry {})", action.name(), attempt);
        Ok(Some(action.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn record(log: &Arc<Mutex<Vec<String>>>, entry: &str) {
        log.lock().expect("log mutex").push(entry.to_string());
    }

    #[tokio::test]
    async fn test_actions_run_in_order() {
        let event_loop = Arc::new(EventLoop::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let el = event_loop.clone();
            let log = log.clone();
            event_loop.push_action(name, move || {
                let el = el.clone();
                let log = log.clone();
                async move {
                    record(&log, name);
                    el.execute_next_action();
                }
            });
        }
        assert_eq!(event_loop.pending_actions(), 3);

        event_loop.run().await.expect("queue should drain");
        assert_eq!(*log.lock().expect("log mutex"), vec!["first", "second", "third"]);
        assert_eq!(event_loop.pending_actions(), 0);
    }

    #[tokio::test]
    async fn test_execute_next_action_is_idempotent() {
        let event_loop = Arc::new(EventLoop::new());
        // Nothing in flight yet, must not consume anything.
        event_loop.execute_next_action();

        let runs = Arc::new(AtomicU32::new(0));
        for name in ["a", "b"] {
            let el = event_loop.clone();
            let runs = runs.clone();
            event_loop.push_action(name, move || {
                let el = el.clone();
                let runs = runs.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    el.execute_next_action();
                    el.execute_next_action();
                }
            });
        }

        event_loop.run().await.expect("queue should drain");
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        event_loop.execute_next_action();
        assert!(event_loop.error_message().is_none());
    }

    #[tokio::test]
    async fn test_quit_first_message_wins() {
        let event_loop = Arc::new(EventLoop::new());
        let later_ran = Arc::new(AtomicU32::new(0));

        let el = event_loop.clone();
        event_loop.push_action("failing", move || {
            let el = el.clone();
            async move {
                el.quit("first failure");
                el.quit("second failure");
            }
        });
        let el = event_loop.clone();
        let counter = later_ran.clone();
        event_loop.push_action("never", move || {
            let el = el.clone();
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                el.execute_next_action();
            }
        });

        let err = event_loop.run().await.expect_err("queue should fail");
        match err {
            Error::ActionFailed { action, reason } => {
                assert_eq!(action, "failing");
                assert_eq!(reason, "first failure");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(later_ran.load(Ordering::SeqCst), 0);
        assert_eq!(event_loop.error_message().as_deref(), Some("first failure"));
    }

    #[tokio::test]
    async fn test_execute_last_action_reinvokes_same_action() {
        let event_loop = Arc::new(EventLoop::new());
        let attempts = Arc::new(AtomicU32::new(0));

        let el = event_loop.clone();
        let counter = attempts.clone();
        event_loop.push_action("flaky", move || {
            let el = el.clone();
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    el.execute_last_action();
                } else {
                    el.execute_next_action();
                }
            }
        });

        event_loop.run().await.expect("retries should succeed");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_cap_is_fatal() {
        let event_loop = Arc::new(EventLoop::with_retry(RetryConfig {
            max_unavailable_retries: Some(2),
            retry_delay_ms: 0,
        }));
        let attempts = Arc::new(AtomicU32::new(0));

        let el = event_loop.clone();
        let counter = attempts.clone();
        event_loop.push_action("always-unavailable", move || {
            let el = el.clone();
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                el.execute_last_action();
            }
        });

        let err = event_loop.run().await.expect_err("retry cap should fail");
        assert!(matches!(err, Error::ActionFailed { .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_for_delay() {
        let event_loop = Arc::new(EventLoop::with_retry(RetryConfig {
            max_unavailable_retries: None,
            retry_delay_ms: 500,
        }));
        let attempts = Arc::new(AtomicU32::new(0));

        let el = event_loop.clone();
        let counter = attempts.clone();
        event_loop.push_action("flaky", move || {
            let el = el.clone();
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    el.execute_last_action();
                } else {
                    el.execute_next_action();
                }
            }
        });

        let started = tokio::time::Instant::now();
        event_loop.run().await.expect("retry should succeed");
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_silent_action_is_internal_error() {
        let event_loop = EventLoop::new();
        event_loop.push_action("silent", || async {});

        let err = event_loop.run().await.expect_err("silent action should fail");
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_cancellation_is_not_fatal() {
        let event_loop = Arc::new(EventLoop::new());
        let el = event_loop.clone();
        event_loop.push_action("blocked", move || {
            let el = el.clone();
            async move {
                let cancellable = el.new_cancellable();
                el.cancel();
                let result = cancellable
                    .run(std::future::pending::<ServiceResult<()>>())
                    .await;
                el.drop_cancellable(cancellable);
                let err = result.expect_err("call should be canceled");
                assert!(el.is_action_canceled(&err));
            }
        });

        let err = event_loop.run().await.expect_err("loop should report cancellation");
        assert!(matches!(err, Error::Canceled));
        assert!(event_loop.error_message().is_none());
        assert_eq!(event_loop.live_cancellables(), 0);
    }

    #[test]
    fn test_cancellables_are_released_individually() {
        let event_loop = EventLoop::new();
        let first = event_loop.new_cancellable();
        let second = event_loop.new_cancellable();
        assert_ne!(first.id(), second.id());
        assert_eq!(event_loop.live_cancellables(), 2);

        event_loop.drop_cancellable(first);
        assert_eq!(event_loop.live_cancellables(), 1);
        assert!(!second.is_cancelled());

        event_loop.cancel();
        assert!(second.is_cancelled());
        event_loop.drop_cancellable(second);
        assert_eq!(event_loop.live_cancellables(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_outstanding_calls() {
        let event_loop = Arc::new(EventLoop::new());
        let el = event_loop.clone();
        event_loop.push_action("hanging", move || {
            let el = el.clone();
            async move {
                let cancellable = el.new_cancellable();
                let result = cancellable
                    .run(std::future::pending::<ServiceResult<()>>())
                    .await;
                el.drop_cancellable(cancellable);
                if let Err(e) = result {
                    if !el.is_action_canceled(&e) {
                        el.quit(e.to_string());
                    }
                }
            }
        });

        let err = event_loop
            .run_with_timeout(Duration::from_secs(5))
            .await
            .expect_err("loop should time out");
        assert!(matches!(err, Error::ActionTimeout(_)));
        assert!(event_loop.is_canceled());
        assert_eq!(event_loop.live_cancellables(), 0);
        assert!(event_loop.error_message().is_none());
    }

    #[tokio::test]
    async fn test_push_after_quit_is_dropped() {
        let event_loop = EventLoop::new();
        event_loop.quit("fatal");
        event_loop.push_action("late", || async {});
        assert_eq!(event_loop.pending_actions(), 0);
        assert!(event_loop.run().await.is_err());
    }
}
