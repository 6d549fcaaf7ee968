//! Deterministic test harness for reducers and effect handlers.
//!
//! [`TestStore`] runs the same reduce/mutate pipeline as [`Store`](crate::Store),
//! but actions produced by effects are queued instead of dispatched. A test
//! acknowledges each one with [`receive`](TestStore::receive), in order, and
//! fails if anything is left unasserted.
//!
//! # Feature Flag
//!
//! This module is only available with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! ripple = { version = "0.1", features = ["testing"] }
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use ripple::testing::TestStore;
//!
//! #[tokio::test]
//! async fn test_load_profile() {
//!     let mut store = TestStore::new(ProfileReducer, FakeProfiles::new(), Profile::default());
//!
//!     store
//!         .send_expecting(ProfileAction::Load, |s| s.is_loading = true)
//!         .await
//!         .unwrap();
//!     store
//!         .receive_expecting(ProfileAction::Loaded("X".into()), |s| {
//!             s.name = Some("X".into());
//!             s.is_loading = false;
//!         })
//!         .await
//!         .unwrap();
//!
//!     store.finish().await.unwrap();
//! }
//! ```
//!
//! # Configuration
//!
//! The wait for pending effects is bounded by [`TestStoreConfig::timeout`]
//! (default 1s). After a `send` that started effects, the harness also sleeps
//! for [`TestStoreConfig::grace_period`] (default 10ms) so effects that resolve
//! immediately have queued their actions. Both can be overridden from the
//! environment with [`TestStoreConfig::from_env`].

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use pretty_assertions::Comparison;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::effect::{run_handler, EffectHandler, NoEffects};
use crate::reducer::{self, NoEffect, Reducer};

const TIMEOUT_ENV: &str = "RIPPLE_TEST_TIMEOUT_MS";
const GRACE_ENV: &str = "RIPPLE_TEST_GRACE_MS";

// =============================================================================
// Errors
// =============================================================================

/// An assertion made through a [`TestStore`] did not hold.
///
/// Every variant carries the source location of the failing call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TestStoreError {
    /// State after an action differs from the expected state.
    #[error("state mismatch at {location}\n{diff}")]
    StateMismatch {
        /// Expected (left) vs actual (right) state.
        diff: String,
        location: &'static Location<'static>,
    },

    /// The next received action is not the expected one.
    #[error("unexpected action at {location}: expected {expected}, received {actual}")]
    UnexpectedAction {
        expected: String,
        actual: String,
        location: &'static Location<'static>,
    },

    /// An action was expected but none was received.
    #[error("missing action at {location}: expected {expected}, but no action was received")]
    MissingAction {
        expected: String,
        location: &'static Location<'static>,
    },

    /// Pending effects did not finish in time.
    #[error("timed out at {location} after {duration:?} with {pending} effect(s) still running")]
    Timeout {
        duration: Duration,
        pending: usize,
        location: &'static Location<'static>,
    },

    /// Actions were received but never asserted.
    #[error("{} unhandled action(s) at {location}: {}", .actions.len(), .actions.join(", "))]
    UnhandledActions {
        actions: Vec<String>,
        location: &'static Location<'static>,
    },
}

impl TestStoreError {
    /// Where the failing assertion was made.
    pub fn location(&self) -> &'static Location<'static> {
        match self {
            Self::StateMismatch { location, .. }
            | Self::UnexpectedAction { location, .. }
            | Self::MissingAction { location, .. }
            | Self::Timeout { location, .. }
            | Self::UnhandledActions { location, .. } => location,
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Timing configuration for a [`TestStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestStoreConfig {
    /// Upper bound on waiting for pending effects.
    pub timeout: Duration,
    /// Pause after a `send` that started effects.
    pub grace_period: Duration,
}

impl Default for TestStoreConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            grace_period: Duration::from_millis(10),
        }
    }
}

impl TestStoreConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Load overrides from `RIPPLE_TEST_TIMEOUT_MS` and `RIPPLE_TEST_GRACE_MS`.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            config.timeout = parse_millis(TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = lookup(GRACE_ENV) {
            config.grace_period = parse_millis(GRACE_ENV, &raw)?;
        }
        Ok(config)
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration> {
    let millis: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be a whole number of milliseconds, got {:?}", key, raw))?;
    Ok(Duration::from_millis(millis))
}

// =============================================================================
// TestStore
// =============================================================================

type Received<A> = Arc<Mutex<VecDeque<A>>>;

fn lock<A>(queue: &Mutex<VecDeque<A>>) -> MutexGuard<'_, VecDeque<A>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A store for tests that queues effect output for explicit assertion.
///
/// Owns its state directly; there is no dispatch loop. Effects run on real
/// Tokio tasks, so the harness must be driven from inside a runtime.
pub struct TestStore<R: Reducer, H> {
    reducer: R,
    handler: Arc<H>,
    state: R::State,
    received: Received<R::Action>,
    pending: VecDeque<JoinHandle<()>>,
    failures: Vec<TestStoreError>,
    config: TestStoreConfig,
}

impl<R, H> TestStore<R, H>
where
    R: Reducer,
    H: EffectHandler<R::Effect, R::Action>,
{
    pub fn new(reducer: R, handler: H, state: R::State) -> Self {
        Self {
            reducer,
            handler: Arc::new(handler),
            state,
            received: Arc::new(Mutex::new(VecDeque::new())),
            pending: VecDeque::new(),
            failures: Vec::new(),
            config: TestStoreConfig::default(),
        }
    }

    pub fn with_default_state(reducer: R, handler: H) -> Self
    where
        R::State: Default,
    {
        Self::new(reducer, handler, R::State::default())
    }

    /// Replace the timing configuration.
    pub fn with_config(mut self, config: TestStoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Dispatch an action. Fails only if a previous wait timed out the harness.
    #[track_caller]
    pub fn send(
        &mut self,
        action: R::Action,
    ) -> impl Future<Output = Result<(), TestStoreError>> + '_ {
        let location = Location::caller();
        self.send_at(action, None::<fn(&mut R::State)>, location)
    }

    /// Dispatch an action and check the resulting state.
    ///
    /// `expected` is applied to a copy of the state from before the action;
    /// the result must equal the state after it.
    #[track_caller]
    pub fn send_expecting<'a, F>(
        &'a mut self,
        action: R::Action,
        expected: F,
    ) -> impl Future<Output = Result<(), TestStoreError>> + 'a
    where
        F: FnOnce(&mut R::State) + 'a,
    {
        let location = Location::caller();
        self.send_at(action, Some(expected), location)
    }

    /// Wait for pending effects, then pop and check the next received action.
    #[track_caller]
    pub fn receive(
        &mut self,
        expected: R::Action,
    ) -> impl Future<Output = Result<(), TestStoreError>> + '_ {
        let location = Location::caller();
        self.receive_at(expected, None::<fn(&mut R::State)>, location)
    }

    /// Like [`receive`](Self::receive), also checking the state after
    /// reducing the received action.
    #[track_caller]
    pub fn receive_expecting<'a, F>(
        &'a mut self,
        expected: R::Action,
        expected_state: F,
    ) -> impl Future<Output = Result<(), TestStoreError>> + 'a
    where
        F: FnOnce(&mut R::State) + 'a,
    {
        let location = Location::caller();
        self.receive_at(expected, Some(expected_state), location)
    }

    /// Wait for pending effects and fail if any received action is unasserted.
    ///
    /// Unasserted actions are discarded, so a second call succeeds.
    #[track_caller]
    pub fn assert_no_more_actions(
        &mut self,
    ) -> impl Future<Output = Result<(), TestStoreError>> + '_ {
        let location = Location::caller();
        self.assert_no_more_actions_at(location)
    }

    /// Wait for every pending effect without consuming any received action.
    #[track_caller]
    pub fn wait_for_effects(&mut self) -> impl Future<Output = Result<(), TestStoreError>> + '_ {
        let location = Location::caller();
        self.wait_for_pending(location)
    }

    /// End the test: assert no more actions, then report the first failure
    /// recorded during the test, if any.
    #[track_caller]
    pub fn finish(&mut self) -> impl Future<Output = Result<(), TestStoreError>> + '_ {
        let location = Location::caller();
        async move {
            self.assert_no_more_actions_at(location).await?;
            match self.failures.first() {
                Some(first) => Err(first.clone()),
                None => Ok(()),
            }
        }
    }

    // -------------------------------------------------------------------------

    async fn send_at<F>(
        &mut self,
        action: R::Action,
        expected: Option<F>,
        location: &'static Location<'static>,
    ) -> Result<(), TestStoreError>
    where
        F: FnOnce(&mut R::State),
    {
        let (started, checked) = self.reduce(&action, expected, location);
        if started > 0 {
            tokio::time::sleep(self.config.grace_period).await;
        }
        checked
    }

    async fn receive_at<F>(
        &mut self,
        expected: R::Action,
        expected_state: Option<F>,
        location: &'static Location<'static>,
    ) -> Result<(), TestStoreError>
    where
        F: FnOnce(&mut R::State),
    {
        self.wait_for_pending(location).await?;

        let next = lock(&self.received).pop_front();
        let Some(actual) = next else {
            return self.fail(TestStoreError::MissingAction {
                expected: format!("{:?}", expected),
                location,
            });
        };

        if actual != expected {
            return self.fail(TestStoreError::UnexpectedAction {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", actual),
                location,
            });
        }

        let (started, checked) = self.reduce(&actual, expected_state, location);
        if started > 0 {
            tokio::time::sleep(self.config.grace_period).await;
        }
        checked
    }

    async fn assert_no_more_actions_at(
        &mut self,
        location: &'static Location<'static>,
    ) -> Result<(), TestStoreError> {
        self.wait_for_pending(location).await?;

        let leftover: Vec<String> = lock(&self.received)
            .drain(..)
            .map(|action| format!("{:?}", action))
            .collect();
        if leftover.is_empty() {
            return Ok(());
        }
        self.fail(TestStoreError::UnhandledActions {
            actions: leftover,
            location,
        })
    }

    /// Reduce `action` against harness state, start its effects and verify
    /// `expected`.
    ///
    /// Returns the number of effects started alongside the state check, so
    /// callers apply the grace period even when the check failed.
    fn reduce<F>(
        &mut self,
        action: &R::Action,
        expected: Option<F>,
        location: &'static Location<'static>,
    ) -> (usize, Result<(), TestStoreError>)
    where
        F: FnOnce(&mut R::State),
    {
        let before = expected.as_ref().map(|_| self.state.clone());
        let effects = reducer::apply(&self.reducer, &mut self.state, action);
        let started = effects.len();

        debug!(?action, effects = started, "test store reduced action");
        for effect in effects {
            self.spawn_effect(effect);
        }

        if let (Some(mut expected_state), Some(expected)) = (before, expected) {
            expected(&mut expected_state);
            if expected_state != self.state {
                let diff = Comparison::new(&expected_state, &self.state).to_string();
                return (
                    started,
                    self.fail(TestStoreError::StateMismatch { diff, location }),
                );
            }
        }
        (started, Ok(()))
    }

    fn spawn_effect(&mut self, effect: R::Effect) {
        let handler = self.handler.clone();
        let received = self.received.clone();

        self.pending.push_back(tokio::spawn(async move {
            let mut actions = run_handler(handler.as_ref(), effect).await.into_stream();
            while let Some(action) = actions.next().await {
                lock(&received).push_back(action);
            }
        }));
    }

    /// Wait for every currently pending task. On timeout, abort all of them.
    async fn wait_for_pending(
        &mut self,
        location: &'static Location<'static>,
    ) -> Result<(), TestStoreError> {
        let deadline = Instant::now() + self.config.timeout;

        while let Some(task) = self.pending.front_mut() {
            let joined = tokio::time::timeout_at(deadline, task).await;
            match joined {
                Ok(joined) => {
                    self.pending.pop_front();
                    if let Err(err) = joined {
                        if err.is_panic() {
                            error!(error = %err, "effect task panicked in test store");
                        }
                    }
                }
                Err(_) => {
                    let pending = self.cancel_effects();
                    return self.fail(TestStoreError::Timeout {
                        duration: self.config.timeout,
                        pending,
                        location,
                    });
                }
            }
        }
        Ok(())
    }

    fn fail<T>(&mut self, err: TestStoreError) -> Result<T, TestStoreError> {
        warn!(error = %err, "test store assertion failed");
        self.failures.push(err.clone());
        Err(err)
    }
}

impl<R, H> TestStore<R, H>
where
    R: Reducer,
{
    /// Current harness state.
    pub fn state(&self) -> &R::State {
        &self.state
    }

    /// Number of received actions not yet asserted.
    pub fn received_len(&self) -> usize {
        lock(&self.received).len()
    }

    /// Snapshot of the received actions not yet asserted, oldest first.
    pub fn received_actions(&self) -> Vec<R::Action> {
        lock(&self.received).iter().cloned().collect()
    }

    /// Number of effect tasks started and not yet awaited.
    pub fn pending_effects(&self) -> usize {
        self.pending.iter().filter(|task| !task.is_finished()).count()
    }

    /// Discard every received action without asserting it.
    pub fn skip_received_actions(&mut self) -> Vec<R::Action> {
        let skipped: Vec<_> = lock(&self.received).drain(..).collect();
        if !skipped.is_empty() {
            debug!(skipped = skipped.len(), "skipped received actions");
        }
        skipped
    }

    /// Abort every pending effect. Returns how many were still running.
    pub fn cancel_effects(&mut self) -> usize {
        let mut running = 0;
        for task in self.pending.drain(..) {
            if !task.is_finished() {
                running += 1;
            }
            task.abort();
        }
        running
    }

    pub fn config(&self) -> &TestStoreConfig {
        &self.config
    }

    /// Every assertion failure recorded so far.
    pub fn failures(&self) -> &[TestStoreError] {
        &self.failures
    }
}

impl<R> TestStore<R, NoEffects>
where
    R: Reducer<Effect = NoEffect>,
{
    pub fn without_effects(reducer: R, state: R::State) -> Self {
        Self::new(reducer, NoEffects, state)
    }
}

impl<R: Reducer, H> Drop for TestStore<R, H> {
    fn drop(&mut self) {
        for task in self.pending.drain(..) {
            task.abort();
        }

        let leftover = lock(&self.received).len();
        if leftover > 0 && !std::thread::panicking() {
            warn!(
                unhandled = leftover,
                "test store dropped with received actions that were never asserted"
            );
        }
    }
}

impl<R: Reducer, H> fmt::Debug for TestStore<R, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestStore")
            .field("state", &self.state)
            .field("received", &lock(&self.received).len())
            .field("pending", &self.pending.len())
            .field("failures", &self.failures.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{init_tracing, FeedAction, FeedEffects, FeedReducer, FeedState};

    fn feed_store() -> TestStore<FeedReducer, FeedEffects> {
        init_tracing();
        TestStore::new(FeedReducer, FeedEffects::new("X"), FeedState::default())
    }

    fn watch(count: u32) -> FeedAction {
        FeedAction::Watch {
            count,
            every: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_load_then_receive() {
        let mut store = feed_store();

        store
            .send_expecting(FeedAction::Load, |s| s.is_loading = true)
            .await
            .unwrap();
        store
            .receive_expecting(FeedAction::Loaded("X".into()), |s| {
                s.value = Some("X".into());
                s.is_loading = false;
            })
            .await
            .unwrap();
        store.assert_no_more_actions().await.unwrap();

        assert!(store.failures().is_empty());
        store.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_unasserted_action_fails() {
        let mut store = feed_store();
        store.send(FeedAction::Load).await.unwrap();

        let err = store.assert_no_more_actions().await.unwrap_err();
        match err {
            TestStoreError::UnhandledActions { actions, .. } => {
                assert_eq!(actions, vec![r#"Loaded("X")"#.to_string()]);
            }
            other => panic!("Expected UnhandledActions, got {:?}", other),
        }

        // Leftovers were discarded with the failure
        store.assert_no_more_actions().await.unwrap();
        assert_eq!(store.failures().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_actions_received_in_order() {
        let mut store = feed_store();
        store.send(watch(3)).await.unwrap();

        for n in 0..3 {
            store
                .receive_expecting(FeedAction::Tick(n), |s| s.ticks.push(n))
                .await
                .unwrap();
        }
        store.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_receive_fails() {
        let mut store = feed_store();
        store.send(watch(3)).await.unwrap();

        let err = store.receive(FeedAction::Tick(1)).await.unwrap_err();
        assert_eq!(
            err,
            TestStoreError::UnexpectedAction {
                expected: "Tick(1)".into(),
                actual: "Tick(0)".into(),
                location: err.location(),
            }
        );

        store.receive(FeedAction::Tick(1)).await.unwrap();
        store.receive(FeedAction::Tick(2)).await.unwrap();
        store.assert_no_more_actions().await.unwrap();

        assert!(store.finish().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_action() {
        let mut store = feed_store();
        store.send(FeedAction::Increment).await.unwrap();

        let err = store
            .receive(FeedAction::Loaded("X".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TestStoreError::MissingAction { ref expected, .. } if expected == r#"Loaded("X")"#
        ));
    }

    #[tokio::test]
    async fn test_state_mismatch_reports_diff_and_location() {
        let mut store = feed_store();

        let line = line!() + 1;
        let result = store.send_expecting(FeedAction::Increment, |s| s.count = 2).await;
        let err = result.unwrap_err();

        match &err {
            TestStoreError::StateMismatch { diff, location } => {
                assert!(diff.contains("count"));
                assert!(location.file().ends_with("testing.rs"));
                assert_eq!(location.line(), line);
            }
            other => panic!("Expected StateMismatch, got {:?}", other),
        }

        // Harness state follows the reducer, not the expectation
        assert_eq!(store.state().count, 1);
        assert_eq!(store.failures(), &[err.clone()]);
        assert_eq!(store.finish().await.unwrap_err(), err);
    }

    #[tokio::test]
    async fn test_receive_state_mismatch() {
        let mut store = feed_store();
        store.send(FeedAction::Load).await.unwrap();

        let line = line!() + 2;
        let result = store
            .receive_expecting(FeedAction::Loaded("X".into()), |s| s.value = Some("Y".into()))
            .await;
        let err = result.unwrap_err();

        match &err {
            TestStoreError::StateMismatch { diff, location } => {
                assert!(diff.contains(r#""Y""#));
                assert!(diff.contains(r#""X""#));
                assert!(location.file().ends_with("testing.rs"));
                assert!(location.line() == line || location.line() == line - 1);
            }
            other => panic!("Expected StateMismatch, got {:?}", other),
        }

        // The received action was consumed and reduced
        assert_eq!(store.received_len(), 0);
        assert_eq!(store.state().value.as_deref(), Some("X"));
        assert!(!store.state().is_loading);
        assert_eq!(store.failures(), &[err]);
    }

    #[tokio::test]
    async fn test_state_mismatch_still_waits_grace_period() {
        let mut store = feed_store()
            .with_config(TestStoreConfig::default().with_grace_period(Duration::from_millis(100)));

        let result = store
            .send_expecting(FeedAction::Load, |s| s.is_loading = false)
            .await;
        assert!(matches!(result, Err(TestStoreError::StateMismatch { .. })));

        // The effect resolved within the grace period despite the failed check
        assert_eq!(store.received_len(), 1);
        assert_eq!(store.pending_effects(), 0);
        store.receive(FeedAction::Loaded("X".into())).await.unwrap();
        store.assert_no_more_actions().await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_aborts_pending_effects() {
        let mut store = feed_store()
            .with_config(TestStoreConfig::default().with_timeout(Duration::from_millis(50)));

        store.send(FeedAction::Hang).await.unwrap();
        assert_eq!(store.pending_effects(), 1);

        let err = store
            .receive(FeedAction::Loaded("late".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TestStoreError::Timeout { pending: 1, duration, .. } if duration == Duration::from_millis(50)
        ));
        assert_eq!(store.pending_effects(), 0);

        // Still usable
        store
            .send_expecting(FeedAction::Increment, |s| s.count = 1)
            .await
            .unwrap();
        store.assert_no_more_actions().await.unwrap();
    }

    #[tokio::test]
    async fn test_none_outcome_queues_nothing() {
        let mut store = feed_store();
        store.send(FeedAction::Silent).await.unwrap();

        store.wait_for_effects().await.unwrap();
        assert_eq!(store.received_len(), 0);
        store.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_effect_queues_nothing() {
        let mut store = feed_store();
        store.send(FeedAction::Explode).await.unwrap();
        store.finish().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_effects_received_in_queue_order() {
        let mut store = feed_store();
        store
            .send_expecting(FeedAction::FetchBoth, |s| s.is_loading = true)
            .await
            .unwrap();

        store.wait_for_effects().await.unwrap();
        let arrived = store.received_actions();
        assert_eq!(arrived.len(), 2);

        for action in arrived {
            store.receive(action).await.unwrap();
        }

        let mut sources = store.state().sources.clone();
        sources.sort();
        assert_eq!(sources, vec!["left".to_string(), "right".to_string()]);
        assert!(!store.state().is_loading);
        store.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_effect_chain_through_receive() {
        let mut store = feed_store();
        store
            .send_expecting(FeedAction::Countdown(2), |s| s.count = 2)
            .await
            .unwrap();
        store
            .receive_expecting(FeedAction::Countdown(1), |s| s.count = 1)
            .await
            .unwrap();
        store
            .receive_expecting(FeedAction::Countdown(0), |s| s.count = 0)
            .await
            .unwrap();
        store.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_skip_received_actions() {
        let mut store = feed_store();
        store.send(watch(2)).await.unwrap();
        store.wait_for_effects().await.unwrap();

        let skipped = store.skip_received_actions();
        assert_eq!(skipped, vec![FeedAction::Tick(0), FeedAction::Tick(1)]);
        assert!(store.state().ticks.is_empty());
        store.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_effects() {
        let mut store = feed_store();
        store.send(FeedAction::Hang).await.unwrap();

        assert_eq!(store.cancel_effects(), 1);
        store.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_without_effects_skips_grace_period() {
        let mut store = feed_store().with_config(
            TestStoreConfig::default().with_grace_period(Duration::from_secs(5)),
        );

        tokio::time::timeout(Duration::from_secs(1), store.send(FeedAction::Increment))
            .await
            .expect("send without effects should not wait")
            .unwrap();
    }

    #[test]
    fn test_config_defaults() {
        let config = TestStoreConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.grace_period, Duration::from_millis(10));
    }

    #[test]
    fn test_config_from_lookup() {
        let config = TestStoreConfig::from_lookup(|key| match key {
            TIMEOUT_ENV => Some("2500".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.grace_period, Duration::from_millis(10));

        let err = TestStoreConfig::from_lookup(|key| match key {
            GRACE_ENV => Some("soon".into()),
            _ => None,
        })
        .unwrap_err();
        assert!(err.to_string().contains(GRACE_ENV));
    }

    #[test]
    fn test_error_display() {
        let location = Location::caller();
        let err = TestStoreError::UnhandledActions {
            actions: vec!["Tick(0)".into(), "Tick(1)".into()],
            location,
        };
        let message = err.to_string();
        assert!(message.starts_with("2 unhandled action(s)"));
        assert!(message.contains("Tick(0), Tick(1)"));
    }
}
