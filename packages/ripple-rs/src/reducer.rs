//! Reducer trait: the pure decision and mutation layer.
//!
//! A reducer looks at the current state and an action and returns a
//! [`Reduction`]: the mutations to apply and the effects to start. Applying a
//! mutation is a separate, equally pure step.
//!
//! # Key Properties
//!
//! - **Pure decisions**: `reduce` takes `&State`, no IO, no async
//! - **Mutations are data**: the same mutation can come from many actions
//! - **Effects are requests**: they carry data, never a handle to state
//! - **Total**: domain failures are actions or mutations, not errors

use std::fmt::Debug;

use smallvec::SmallVec;

/// Inline capacity for a reduction's mutation and effect lists.
///
/// Most actions produce zero, one or two of each.
const INLINE: usize = 2;

/// A reducer decides how the state changes and which effects run.
///
/// # Example
///
/// ```ignore
/// use ripple::{NoEffect, Reducer, Reduction};
///
/// #[derive(Debug, Clone, Default, PartialEq)]
/// struct Counter {
///     count: i64,
/// }
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum CounterAction {
///     Increment,
///     Decrement,
/// }
///
/// #[derive(Debug)]
/// enum CounterMutation {
///     SetCount(i64),
/// }
///
/// struct CounterReducer;
///
/// impl Reducer for CounterReducer {
///     type State = Counter;
///     type Action = CounterAction;
///     type Mutation = CounterMutation;
///     type Effect = NoEffect;
///
///     fn reduce(&self, state: &Counter, action: &CounterAction) -> Reduction<CounterMutation, NoEffect> {
///         match action {
///             CounterAction::Increment => Reduction::mutation(CounterMutation::SetCount(state.count + 1)),
///             CounterAction::Decrement => Reduction::mutation(CounterMutation::SetCount(state.count - 1)),
///         }
///     }
///
///     fn mutate(&self, state: &mut Counter, mutation: CounterMutation) {
///         match mutation {
///             CounterMutation::SetCount(count) => state.count = count,
///         }
///     }
/// }
/// ```
pub trait Reducer: Send + Sync + 'static {
    /// The state this reducer owns.
    type State: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// Every event the feature responds to, external or effect-originated.
    type Action: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// An atomic state edit.
    type Mutation: Debug + Send + 'static;

    /// A request for asynchronous work.
    type Effect: Debug + Send + 'static;

    /// Decide the mutations and effects for an action.
    ///
    /// # Guarantees
    ///
    /// - Called synchronously (no async)
    /// - Called serially (never concurrently for one store)
    /// - Mutations are applied in the returned order before any effect starts
    fn reduce(
        &self,
        state: &Self::State,
        action: &Self::Action,
    ) -> Reduction<Self::Mutation, Self::Effect>;

    /// Apply one mutation to the state in place.
    fn mutate(&self, state: &mut Self::State, mutation: Self::Mutation);
}

/// The output of [`Reducer::reduce`]: ordered mutations and ordered effects.
#[derive(Debug)]
pub struct Reduction<M, E> {
    /// Mutations, applied left to right.
    pub mutations: SmallVec<[M; INLINE]>,
    /// Effects, started after every mutation has been applied.
    pub effects: SmallVec<[E; INLINE]>,
}

impl<M, E> Reduction<M, E> {
    /// A reduction that changes nothing and starts nothing.
    pub fn none() -> Self {
        Self {
            mutations: SmallVec::new(),
            effects: SmallVec::new(),
        }
    }

    /// A reduction with a single mutation.
    pub fn mutation(mutation: M) -> Self {
        Self::none().with_mutation(mutation)
    }

    /// A reduction with a single effect.
    pub fn effect(effect: E) -> Self {
        Self::none().with_effect(effect)
    }

    /// Build a reduction from explicit lists.
    pub fn new(
        mutations: impl IntoIterator<Item = M>,
        effects: impl IntoIterator<Item = E>,
    ) -> Self {
        Self {
            mutations: mutations.into_iter().collect(),
            effects: effects.into_iter().collect(),
        }
    }

    /// Append a mutation.
    pub fn with_mutation(mut self, mutation: M) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// Append an effect.
    pub fn with_effect(mut self, effect: E) -> Self {
        self.effects.push(effect);
        self
    }

    /// True when there is nothing to apply and nothing to start.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.effects.is_empty()
    }
}

impl<M, E> Default for Reduction<M, E> {
    fn default() -> Self {
        Self::none()
    }
}

/// Run `reduce` and apply every mutation, returning the effects.
///
/// Shared by the store and the test harness so both pipelines stay identical.
pub(crate) fn apply<R: Reducer>(
    reducer: &R,
    state: &mut R::State,
    action: &R::Action,
) -> SmallVec<[R::Effect; INLINE]> {
    let Reduction { mutations, effects } = reducer.reduce(state, action);
    for mutation in mutations {
        reducer.mutate(state, mutation);
    }
    effects
}

/// Fold a sequence of actions over a state, discarding effects.
///
/// This is the synchronous reference semantics of a store: with no effects in
/// flight, sending the same actions one by one ends in the same state.
pub fn fold<R, I>(reducer: &R, mut state: R::State, actions: I) -> R::State
where
    R: Reducer,
    I: IntoIterator<Item = R::Action>,
{
    for action in actions {
        apply(reducer, &mut state, &action);
    }
    state
}

/// The effect type of a reducer that never requests effects.
///
/// Uninhabited, so a `Reduction<_, NoEffect>` can only carry mutations. Pair it
/// with [`NoEffects`](crate::NoEffects) as the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoEffect {}
