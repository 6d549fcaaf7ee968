//! Task registry for in-flight effects.
//!
//! Every effect a store starts is registered here under a fresh [`TaskId`]
//! together with its [`CancellationToken`]. The registry is the only piece of
//! state shared between the store's dispatch path and effect tasks running on
//! arbitrary workers, so it carries its own mutex, independent of the state
//! lock.
//!
//! # Lifecycle
//!
//! ```text
//! register(id) ──► running ──► TaskGuard dropped ──► remove(id)
//!                     │
//!                     └─► cancel_all() / close() ──► token cancelled, entry drained
//! ```
//!
//! Removal is idempotent: a task that finishes after `cancel_all` drained it
//! finds nothing to remove.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::RippleError;

/// Identifier for one effect-handling task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct RegistryState {
    tasks: HashMap<TaskId, CancellationToken>,
    /// Set on teardown. Later registrations are rejected.
    closed: bool,
}

/// Concurrency-safe tracker of in-flight effect tasks.
#[derive(Default)]
pub struct TaskRegistry {
    state: Mutex<RegistryState>,
    /// Fires whenever the registry drains to empty.
    idle: Notify,
}

impl TaskRegistry {
    /// Create an empty, open registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("task registry mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Register a task under `id`.
    ///
    /// Fails with [`RippleError::RegistryClosed`] once the registry has been
    /// closed; the token is cancelled in that case so the caller's task stops
    /// at its first suspension point instead of running unmanaged.
    pub fn register(&self, id: TaskId, token: CancellationToken) -> Result<(), RippleError> {
        let mut state = self.lock();
        if state.closed {
            token.cancel();
            return Err(RippleError::RegistryClosed { task_id: id });
        }
        state.tasks.insert(id, token);
        Ok(())
    }

    /// Remove a task after it finished on its own.
    ///
    /// Returns `false` if the task was not registered, e.g. because
    /// `cancel_all` already drained it.
    pub fn remove(&self, id: TaskId) -> bool {
        let (removed, now_empty) = {
            let mut state = self.lock();
            let removed = state.tasks.remove(&id).is_some();
            (removed, state.tasks.is_empty())
        };
        if removed && now_empty {
            self.idle.notify_waiters();
        }
        removed
    }

    /// Cancel every registered task and clear the registry.
    ///
    /// Drain and cancel happen under one lock, so a concurrent `register`
    /// lands either before (and is cancelled here) or after (and survives).
    /// Returns the number of tasks cancelled.
    pub fn cancel_all(&self) -> usize {
        let cancelled = {
            let mut state = self.lock();
            Self::drain(&mut state)
        };
        self.idle.notify_waiters();
        cancelled
    }

    /// Cancel everything and reject all future registrations.
    pub fn close(&self) -> usize {
        let cancelled = {
            let mut state = self.lock();
            state.closed = true;
            Self::drain(&mut state)
        };
        self.idle.notify_waiters();
        cancelled
    }

    fn drain(state: &mut RegistryState) -> usize {
        let count = state.tasks.len();
        for (id, token) in state.tasks.drain() {
            debug!(task_id = %id, "cancelling effect task");
            token.cancel();
        }
        count
    }

    /// True once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    /// True when no task is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    /// True if `id` is currently registered.
    pub fn contains(&self, id: TaskId) -> bool {
        self.lock().tasks.contains_key(&id)
    }

    /// Wait until no task is registered.
    ///
    /// Returns immediately if the registry is already empty.
    pub async fn wait_idle(&self) {
        loop {
            // Register for notification BEFORE checking
            let notified = self.idle.notified();

            if self.is_empty() {
                return;
            }

            notified.await;
        }
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("TaskRegistry")
            .field("in_flight", &state.tasks.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// RAII guard that deregisters a task when its future is dropped.
///
/// Natural completion, unwinding and runtime shutdown all end in exactly one
/// `remove` call.
pub(crate) struct TaskGuard {
    registry: Arc<TaskRegistry>,
    id: TaskId,
}

impl TaskGuard {
    pub(crate) fn new(registry: Arc<TaskRegistry>, id: TaskId) -> Self {
        Self { registry, id }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
