//! Effect handler trait and helpers.
//!
//! Effect handlers are the IO layer of ripple. They receive an effect request
//! and return an [`EffectOutcome`] describing which actions follow.
//!
//! # Key Properties
//!
//! - **No state access**: requests carry everything the handler needs
//! - **Failures become actions**: a handler that can fail returns a
//!   failure-tagged action instead of an error
//! - **Injected dependencies**: clients and services live on the handler value
//! - **Panics are contained**: a panicking handler is logged and treated as
//!   [`EffectOutcome::None`]

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::error;

use crate::outcome::EffectOutcome;
use crate::reducer::NoEffect;

/// Handles effect requests of type `E`, producing actions of type `A`.
///
/// # Example
///
/// ```ignore
/// struct ProfileEffects {
///     client: Arc<ProfileClient>,
/// }
///
/// #[async_trait]
/// impl EffectHandler<ProfileEffect, ProfileAction> for ProfileEffects {
///     async fn handle(&self, effect: ProfileEffect) -> EffectOutcome<ProfileAction> {
///         match effect {
///             ProfileEffect::Fetch { id } => match self.client.fetch(id).await {
///                 Ok(profile) => EffectOutcome::single(ProfileAction::Loaded(profile)),
///                 Err(e) => EffectOutcome::single(ProfileAction::LoadFailed(e.to_string())),
///             },
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait EffectHandler<E, A>: Send + Sync + 'static
where
    E: Send + 'static,
    A: Send + 'static,
{
    /// Perform the work for one effect request.
    ///
    /// Runs on its own task, concurrently with other effects. Must resolve
    /// eventually or be cancellable at its suspension points.
    async fn handle(&self, effect: E) -> EffectOutcome<A>;
}

#[async_trait]
impl<E, A, H> EffectHandler<E, A> for Arc<H>
where
    E: Send + 'static,
    A: Send + 'static,
    H: EffectHandler<E, A> + ?Sized,
{
    async fn handle(&self, effect: E) -> EffectOutcome<A> {
        (**self).handle(effect).await
    }
}

/// Handler for reducers whose effect type is [`NoEffect`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffects;

#[async_trait]
impl<A: Send + 'static> EffectHandler<NoEffect, A> for NoEffects {
    async fn handle(&self, effect: NoEffect) -> EffectOutcome<A> {
        match effect {}
    }
}

/// Effect handler backed by an async closure.
///
/// Created by [`handler_fn`].
#[derive(Clone)]
pub struct FnHandler<F> {
    f: F,
}

/// Build an effect handler from an async closure.
///
/// ```ignore
/// let handler = handler_fn(|effect: FetchEffect| async move {
///     EffectOutcome::single(Action::Loaded(effect.id))
/// });
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F> {
    FnHandler { f }
}

#[async_trait]
impl<E, A, F, Fut> EffectHandler<E, A> for FnHandler<F>
where
    E: Send + 'static,
    A: Send + 'static,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = EffectOutcome<A>> + Send + 'static,
{
    async fn handle(&self, effect: E) -> EffectOutcome<A> {
        (self.f)(effect).await
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Run a handler, converting a panic into [`EffectOutcome::None`].
pub(crate) async fn run_handler<H, E, A>(handler: &H, effect: E) -> EffectOutcome<A>
where
    H: EffectHandler<E, A> + ?Sized,
    E: Send + 'static,
    A: Send + 'static,
{
    match AssertUnwindSafe(handler.handle(effect)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic_info) => {
            error!(
                effect = std::any::type_name::<E>(),
                panic = %panic_message(&panic_info),
                "effect handler panicked"
            );
            EffectOutcome::None
        }
    }
}

pub(crate) fn panic_message(panic_info: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
