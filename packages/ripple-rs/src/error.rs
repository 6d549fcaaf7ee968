//! Structured error types for the ripple runtime.
//!
//! Reducers, mutations and effect handlers never fail from the runtime's point
//! of view: a handler that can fail translates the failure into an action.
//! `RippleError` therefore only covers runtime plumbing, such as a store that
//! has already been torn down or a wait that did not settle in time.
//!
//! Test harness failures live in [`crate::testing::TestStoreError`].

use std::time::Duration;

use thiserror::Error;

use crate::registry::TaskId;

/// Structured error type for ripple runtime operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RippleError {
    /// A task was registered after the registry was closed by teardown.
    #[error("task registry is closed, rejected task {task_id}")]
    RegistryClosed {
        /// The task that was rejected (and cancelled).
        task_id: TaskId,
    },

    /// No Tokio runtime was available to run an effect.
    #[error("no tokio runtime available to run effect {effect}")]
    NoRuntime {
        /// Type name of the effect request that could not start.
        effect: &'static str,
    },

    /// In-flight effects did not finish within the allotted time.
    #[error("effects still in flight after {duration:?} ({in_flight} remaining)")]
    Timeout {
        /// How long we waited.
        duration: Duration,
        /// Number of tasks still registered when the wait gave up.
        in_flight: usize,
    },
}
