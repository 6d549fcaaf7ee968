//! # Ripple
//!
//! A unidirectional state container where reducers decide, mutations apply,
//! and effects feed actions back.
//!
//! ## Core Concepts
//!
//! Ripple separates **deciding** from **doing**:
//! - [`Reducer::reduce`] = Decision (pure: state + action -> mutations + effects)
//! - [`Reducer::mutate`] = Application (pure, atomic state edits)
//! - [`EffectHandler`] = IO (async, returns an [`EffectOutcome`] of follow-up actions)
//!
//! ## Architecture
//!
//! ```text
//! UI / caller
//!     │
//!     ▼ send(action)
//! Store ─────────────────────────────────────────┐
//!     │                                          │
//!     ├─► reduce(&state, &action)                │
//!     │       │                                  │
//!     │       ├─► mutations ─► mutate(&mut state)│
//!     │       │                    │             │
//!     │       │              subscribers notified│
//!     │       │                                  │
//!     │       └─► effects ─► TaskRegistry        │
//!     │                          │               │
//!     │                          ▼               │
//!     │                 EffectHandler.handle()   │
//!     │                          │               │
//!     │           None / Single / Stream ────────┘
//!     │
//!     └─► scope(select, embed) ─► Scoped child view
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Reducers are pure** - No IO, no async, every domain failure is an action
//! 2. **Mutations are atomic** - All mutations of one action apply before anyone observes state
//! 3. **Effects never touch state** - Requests carry snapshots, results come back as actions
//! 4. **Streams stay ordered** - Actions from one stream are dispatched in yield order
//! 5. **Cancellation is a barrier** - After `cancel_all_effects`, no earlier effect delivers
//! 6. **No orphans** - Dropping a store cancels everything it started
//!
//! ## Example
//!
//! ```ignore
//! use ripple::{async_trait, EffectHandler, EffectOutcome, Reducer, Reduction, Store};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Profile {
//!     name: Option<String>,
//!     is_loading: bool,
//! }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum ProfileAction {
//!     Load,
//!     Loaded(String),
//! }
//!
//! #[derive(Debug)]
//! enum ProfileMutation {
//!     SetLoading(bool),
//!     SetName(String),
//! }
//!
//! #[derive(Debug)]
//! enum ProfileEffect {
//!     Fetch,
//! }
//!
//! struct ProfileReducer;
//!
//! impl Reducer for ProfileReducer {
//!     type State = Profile;
//!     type Action = ProfileAction;
//!     type Mutation = ProfileMutation;
//!     type Effect = ProfileEffect;
//!
//!     fn reduce(&self, _state: &Profile, action: &ProfileAction) -> Reduction<ProfileMutation, ProfileEffect> {
//!         match action {
//!             ProfileAction::Load => Reduction::mutation(ProfileMutation::SetLoading(true))
//!                 .with_effect(ProfileEffect::Fetch),
//!             ProfileAction::Loaded(name) => Reduction::mutation(ProfileMutation::SetName(name.clone()))
//!                 .with_mutation(ProfileMutation::SetLoading(false)),
//!         }
//!     }
//!
//!     fn mutate(&self, state: &mut Profile, mutation: ProfileMutation) {
//!         match mutation {
//!             ProfileMutation::SetLoading(loading) => state.is_loading = loading,
//!             ProfileMutation::SetName(name) => state.name = Some(name),
//!         }
//!     }
//! }
//!
//! struct ProfileEffects {
//!     client: Arc<ProfileClient>,
//! }
//!
//! #[async_trait]
//! impl EffectHandler<ProfileEffect, ProfileAction> for ProfileEffects {
//!     async fn handle(&self, effect: ProfileEffect) -> EffectOutcome<ProfileAction> {
//!         match effect {
//!             ProfileEffect::Fetch => match self.client.fetch_name().await {
//!                 Ok(name) => EffectOutcome::single(ProfileAction::Loaded(name)),
//!                 Err(_) => EffectOutcome::none(),
//!             },
//!         }
//!     }
//! }
//!
//! let store = Store::with_default_state(ProfileReducer, ProfileEffects { client });
//! store.send(ProfileAction::Load);
//! store.settled().await;
//! ```

// Core modules
mod effect;
mod error;
mod outcome;
mod reducer;
mod registry;
mod scope;
mod store;

// Testing utilities (available with "testing" feature or in tests)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod test_fixtures;


// Re-exports
pub use effect::{handler_fn, EffectHandler, FnHandler, NoEffects};
pub use error::RippleError;
pub use outcome::{ActionStream, EffectOutcome};
pub use reducer::{fold, NoEffect, Reducer, Reduction};
pub use registry::{TaskId, TaskRegistry};
pub use scope::{Scoped, StoreView};
pub use store::{Store, StoreBuilder, StoreConfig};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
