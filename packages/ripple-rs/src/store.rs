//! The store: a serialized dispatch loop around one state value.
//!
//! ```text
//! send(action)
//!     │
//!     ▼  (state lock held)
//! Reducer.reduce(&state, &action) ─► mutations ─► Reducer.mutate(&mut state, m) ...
//!     │                                              │
//!     ▼                                   subscribers notified
//! effects ─► TaskRegistry.register
//!     │
//!     ▼  (lock released)
//! spawn ─► EffectHandler.handle
//!                    │
//!                    ▼
//!       EffectOutcome::Single/Stream
//!                    │
//!                    └──► send(follow-up action) ...
//! ```
//!
//! # Serialization
//!
//! State lives in a `tokio::sync::watch` channel. Every dispatch runs reduce
//! and all mutations inside a single `send_if_modified`, so the mutations of
//! one action are never interleaved with another dispatch, and subscribers
//! see each action's result exactly once.
//!
//! # Re-entrancy
//!
//! Follow-up actions are dispatched from the effect task that produced them,
//! never from inside the caller's `send`. Long action chains therefore do not
//! grow the stack.
//!
//! # Cancellation
//!
//! Every effect task owns a `CancellationToken`. The token is raced against
//! the handler and against each stream element, and re-checked under the
//! state lock before a follow-up action is applied. New effects are registered
//! under the same lock, and cancellation takes it too, so once
//! [`Store::cancel_all_effects`] returns, no action from a previously started
//! effect, or from anything that effect led to, reaches the reducer.

use std::borrow::Cow;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use smallvec::SmallVec;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::effect::{panic_message, run_handler, EffectHandler, NoEffects};
use crate::error::RippleError;
use crate::outcome::EffectOutcome;
use crate::reducer::{self, NoEffect, Reducer};
use crate::registry::{TaskGuard, TaskId, TaskRegistry};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name used in log fields.
    pub name: Cow<'static, str>,
    /// Runtime that effect tasks are spawned on.
    ///
    /// When `None`, the runtime of the calling context is used.
    pub runtime: Option<Handle>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("store"),
            runtime: None,
        }
    }
}

impl StoreConfig {
    /// Create a config with a specific store name.
    pub fn with_name(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

// =============================================================================
// Store
// =============================================================================

struct Inner<R: Reducer, H> {
    reducer: R,
    handler: Arc<H>,
    state: watch::Sender<R::State>,
    registry: Arc<TaskRegistry>,
    config: StoreConfig,
}

/// A state container driven by a [`Reducer`] and an [`EffectHandler`].
///
/// The store exclusively owns its state. Dropping it cancels every in-flight
/// effect.
///
/// # Example
///
/// ```ignore
/// let store = Store::new(ProfileReducer, ProfileEffects::new(client), Profile::default());
///
/// store.send(ProfileAction::Load);
/// assert!(store.with_state(|s| s.is_loading));
///
/// store.settled().await;
/// assert!(store.with_state(|s| s.profile.is_some()));
/// ```
pub struct Store<R: Reducer, H> {
    inner: Arc<Inner<R, H>>,
}

impl<R, H> Store<R, H>
where
    R: Reducer,
    H: EffectHandler<R::Effect, R::Action>,
{
    /// Create a store with an explicit initial state.
    pub fn new(reducer: R, handler: H, state: R::State) -> Self {
        StoreBuilder::new(reducer, handler, state).build()
    }

    /// Create a store whose initial state is `State::default()`.
    pub fn with_default_state(reducer: R, handler: H) -> Self
    where
        R::State: Default,
    {
        Self::new(reducer, handler, R::State::default())
    }

    /// Start building a store with custom configuration.
    pub fn builder(reducer: R, handler: H, state: R::State) -> StoreBuilder<R, H> {
        StoreBuilder::new(reducer, handler, state)
    }

    /// Dispatch an action.
    ///
    /// Runs the reducer, applies every returned mutation, notifies
    /// subscribers, then starts one task per returned effect. Never fails;
    /// effect failures come back as actions.
    pub fn send(&self, action: R::Action) {
        Inner::dispatch(&self.inner, action, None);
    }

    /// A clone of the current state.
    pub fn state(&self) -> R::State {
        self.inner.state.borrow().clone()
    }

    /// Read the current state without cloning it.
    ///
    /// The state lock is held while `f` runs: do not call [`send`](Self::send)
    /// from inside `f`.
    pub fn with_state<T>(&self, f: impl FnOnce(&R::State) -> T) -> T {
        f(&self.inner.state.borrow())
    }

    /// Subscribe to state changes.
    ///
    /// The receiver is marked changed after every dispatched action.
    pub fn subscribe(&self) -> watch::Receiver<R::State> {
        self.inner.state.subscribe()
    }

    /// Cancel every in-flight effect. Returns how many were cancelled.
    ///
    /// Waits for a dispatch already in progress to finish, so once this
    /// returns nothing started before the call can reach the reducer. Takes
    /// the state lock, so do not call it from inside
    /// [`with_state`](Self::with_state). The store stays usable; effects from
    /// later actions run normally.
    pub fn cancel_all_effects(&self) -> usize {
        let cancelled = self.inner.under_state_lock(TaskRegistry::cancel_all);
        if cancelled > 0 {
            info!(store = %self.inner.config.name, cancelled, "cancelled in-flight effects");
        }
        cancelled
    }

    /// Cancel every in-flight effect and refuse to start new ones.
    ///
    /// Actions sent afterwards still update state, but their effects are
    /// rejected. Called automatically on drop.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.inner.under_state_lock(TaskRegistry::close);
        info!(store = %self.inner.config.name, cancelled, "store shut down");
        cancelled
    }

    /// True once [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.inner.registry.is_closed()
    }

    /// Number of in-flight effect tasks.
    pub fn in_flight(&self) -> usize {
        self.inner.registry.len()
    }

    /// Wait until no effect is in flight.
    ///
    /// Effects started by follow-up actions count too: a chain of effects
    /// settles only when its last link finishes. Never returns while an
    /// endless stream is running.
    pub async fn settled(&self) {
        self.inner.registry.wait_idle().await;
    }

    /// Like [`settled`](Self::settled), with an upper bound.
    pub async fn settled_timeout(&self, duration: Duration) -> Result<(), RippleError> {
        match tokio::time::timeout(duration, self.settled()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(RippleError::Timeout {
                duration,
                in_flight: self.in_flight(),
            }),
        }
    }

    /// The store's name, as used in logs.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }
}

impl<R> Store<R, NoEffects>
where
    R: Reducer<Effect = NoEffect>,
{
    /// Create a store for a reducer that never requests effects.
    pub fn without_effects(reducer: R, state: R::State) -> Self {
        Self::new(reducer, NoEffects, state)
    }
}

impl<R: Reducer, H> Drop for Store<R, H> {
    fn drop(&mut self) {
        let cancelled = self.inner.under_state_lock(TaskRegistry::close);
        if cancelled > 0 {
            debug!(store = %self.inner.config.name, cancelled, "store dropped with effects in flight");
        }
    }
}

impl<R: Reducer, H> fmt::Debug for Store<R, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.config.name)
            .field("state", &*self.inner.state.borrow())
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Dispatch
// =============================================================================

impl<R: Reducer, H> Inner<R, H> {
    /// Run `f` on the registry while holding the state lock.
    ///
    /// Serializes cancellation with dispatch: a reduction in progress either
    /// completes first (and its effects are cancelled by `f`) or sees the
    /// cancelled token and is dropped.
    fn under_state_lock(&self, f: impl FnOnce(&TaskRegistry) -> usize) -> usize {
        let mut result = 0;
        self.state.send_if_modified(|_| {
            result = f(&self.registry);
            false
        });
        result
    }
}

impl<R, H> Inner<R, H>
where
    R: Reducer,
    H: EffectHandler<R::Effect, R::Action>,
{
    /// Reduce, mutate and start effects for one action.
    ///
    /// `origin` is the token of the effect that produced the action, if any.
    /// Returns `false` when the action was dropped because that effect was
    /// cancelled.
    fn dispatch(this: &Arc<Self>, action: R::Action, origin: Option<&CancellationToken>) -> bool {
        let runtime = this.runtime();
        let mut started: SmallVec<[StartedEffect<R::Effect>; 2]> = SmallVec::new();
        let mut applied = false;

        this.state.send_if_modified(|state| {
            // Checked under the state lock so cancel_all_effects is a hard barrier
            if origin.is_some_and(|token| token.is_cancelled()) {
                return false;
            }
            let effects = reducer::apply(&this.reducer, state, &action);
            // Registered before the lock is released, so a cancel that runs
            // after this dispatch also reaches the effects it started
            started.extend(
                effects
                    .into_iter()
                    .filter_map(|effect| this.register_effect(effect, runtime.is_some())),
            );
            applied = true;
            true
        });

        if !applied {
            debug!(store = %this.config.name, ?action, "dropped action from cancelled effect");
            return false;
        }

        debug!(
            store = %this.config.name,
            ?action,
            effects = started.len(),
            "dispatched action"
        );

        if let Some(runtime) = runtime {
            for effect in started {
                Self::spawn_effect(this, &runtime, effect);
            }
        }
        true
    }

    fn runtime(&self) -> Option<Handle> {
        self.config
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    fn register_effect(
        &self,
        effect: R::Effect,
        has_runtime: bool,
    ) -> Option<StartedEffect<R::Effect>> {
        if !has_runtime {
            let err = RippleError::NoRuntime {
                effect: std::any::type_name::<R::Effect>(),
            };
            error!(store = %self.config.name, error = %err, ?effect, "effect dropped");
            return None;
        }

        let task_id = TaskId::new();
        let token = CancellationToken::new();

        // Registered before spawn, so the task can never finish unregistered
        if let Err(err) = self.registry.register(task_id, token.clone()) {
            warn!(store = %self.config.name, error = %err, ?effect, "effect rejected");
            return None;
        }

        Some(StartedEffect {
            effect,
            task_id,
            token,
        })
    }

    fn spawn_effect(this: &Arc<Self>, runtime: &Handle, started: StartedEffect<R::Effect>) {
        let StartedEffect {
            effect,
            task_id,
            token,
        } = started;

        trace!(store = %this.config.name, %task_id, ?effect, "starting effect");

        let guard = TaskGuard::new(this.registry.clone(), task_id);
        let handler = this.handler.clone();
        let store = Arc::downgrade(this);

        runtime.spawn(Self::run_effect(store, handler, effect, token, guard, task_id));
    }

    async fn run_effect(
        store: Weak<Self>,
        handler: Arc<H>,
        effect: R::Effect,
        token: CancellationToken,
        _guard: TaskGuard,
        task_id: TaskId,
    ) {
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(%task_id, "effect cancelled before completion");
                return;
            }
            outcome = run_handler(handler.as_ref(), effect) => outcome,
        };

        match outcome {
            EffectOutcome::None => {}
            EffectOutcome::Single(action) => {
                Self::deliver(&store, action, &token);
            }
            EffectOutcome::Stream(mut stream) => loop {
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(%task_id, "effect stream cancelled");
                        break;
                    }
                    next = AssertUnwindSafe(stream.next()).catch_unwind() => next,
                };

                match next {
                    Ok(Some(action)) => {
                        if !Self::deliver(&store, action, &token) {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(panic_info) => {
                        error!(
                            %task_id,
                            panic = %panic_message(&panic_info),
                            "effect stream panicked"
                        );
                        break;
                    }
                }
            },
        }
    }

    /// Feed a follow-up action back into the store, if it still exists.
    fn deliver(store: &Weak<Self>, action: R::Action, token: &CancellationToken) -> bool {
        match store.upgrade() {
            Some(inner) => Self::dispatch(&inner, action, Some(token)),
            None => false,
        }
    }
}

/// An effect registered under the state lock, waiting to be spawned.
struct StartedEffect<E> {
    effect: E,
    task_id: TaskId,
    token: CancellationToken,
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for a [`Store`] with non-default configuration.
///
/// ```ignore
/// let store = Store::builder(FeedReducer, FeedEffects::new(client), FeedState::default())
///     .with_name("feed")
///     .with_runtime(runtime.handle().clone())
///     .build();
/// ```
pub struct StoreBuilder<R: Reducer, H> {
    reducer: R,
    handler: H,
    state: R::State,
    config: StoreConfig,
}

impl<R, H> StoreBuilder<R, H>
where
    R: Reducer,
    H: EffectHandler<R::Effect, R::Action>,
{
    /// Start a builder from a reducer, handler and initial state.
    pub fn new(reducer: R, handler: H, state: R::State) -> Self {
        Self {
            reducer,
            handler,
            state,
            config: StoreConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the name used in logs.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Spawn effects on a specific runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.config.runtime = Some(runtime);
        self
    }

    /// Build the store.
    pub fn build(self) -> Store<R, H> {
        let (state, _) = watch::channel(self.state);
        Store {
            inner: Arc::new(Inner {
                reducer: self.reducer,
                handler: Arc::new(self.handler),
                state,
                registry: Arc::new(TaskRegistry::new()),
                config: self.config,
            }),
        }
    }
}
