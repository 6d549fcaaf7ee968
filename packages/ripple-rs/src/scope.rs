//! Scoped projections onto part of a store.
//!
//! A [`Scoped`] view lets a child component work with its own state and
//! action types while the parent store stays the single owner of state.
//! Reads go through the parent on every call; sends are wrapped and forwarded.
//!
//! ```ignore
//! let settings = store.scope(
//!     |app: &AppState| app.settings.clone(),
//!     AppAction::Settings,
//! );
//!
//! settings.send(SettingsAction::ToggleDarkMode);
//! assert!(settings.with_state(|s| s.dark_mode));
//! ```

use std::fmt;

use crate::effect::EffectHandler;
use crate::reducer::Reducer;
use crate::store::Store;

/// Read and dispatch access to a state container.
pub trait StoreView {
    /// State visible through this view.
    type State;
    /// Actions accepted by this view.
    type Action;

    /// Run `f` against the current state.
    fn with_state<T>(&self, f: impl FnOnce(&Self::State) -> T) -> T;

    /// Dispatch an action.
    fn send(&self, action: Self::Action);

    /// A clone of the current state.
    fn state(&self) -> Self::State
    where
        Self::State: Clone,
    {
        self.with_state(Clone::clone)
    }

    /// Project this view onto a child state and action type.
    ///
    /// `select` runs on every read, so the child never sees stale state.
    /// `embed` wraps each child action before it reaches this view.
    fn scope<'a, S, A>(
        &'a self,
        select: impl Fn(&Self::State) -> S + Send + Sync + 'a,
        embed: impl Fn(A) -> Self::Action + Send + Sync + 'a,
    ) -> Scoped<'a, Self, S, A>
    where
        Self: Sized,
    {
        Scoped {
            parent: self,
            select: Box::new(select),
            embed: Box::new(embed),
        }
    }
}

impl<R, H> StoreView for Store<R, H>
where
    R: Reducer,
    H: EffectHandler<R::Effect, R::Action>,
{
    type State = R::State;
    type Action = R::Action;

    fn with_state<T>(&self, f: impl FnOnce(&R::State) -> T) -> T {
        Store::with_state(self, f)
    }

    fn send(&self, action: R::Action) {
        Store::send(self, action)
    }
}

type Selector<'a, P, S> = Box<dyn Fn(&P) -> S + Send + Sync + 'a>;
type Embedder<'a, A, P> = Box<dyn Fn(A) -> P + Send + Sync + 'a>;

/// A child view borrowed from a parent [`StoreView`].
///
/// Holds no state of its own.
pub struct Scoped<'a, P: StoreView, S, A> {
    parent: &'a P,
    select: Selector<'a, P::State, S>,
    embed: Embedder<'a, A, P::Action>,
}

impl<P: StoreView, S, A> StoreView for Scoped<'_, P, S, A> {
    type State = S;
    type Action = A;

    fn with_state<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        let child = self.parent.with_state(|parent| (self.select)(parent));
        f(&child)
    }

    fn send(&self, action: A) {
        self.parent.send((self.embed)(action));
    }
}

impl<P: StoreView, S, A> fmt::Debug for Scoped<'_, P, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("state", &std::any::type_name::<S>())
            .field("action", &std::any::type_name::<A>())
            .finish_non_exhaustive()
    }
}
