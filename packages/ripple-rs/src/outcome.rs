//! Effect outcomes: what an effect hands back to the store.
//!
//! An outcome is one of three things:
//! - [`EffectOutcome::None`]: nothing follows
//! - [`EffectOutcome::Single`]: exactly one follow-up action
//! - [`EffectOutcome::Stream`]: an ordered, lazy, possibly endless sequence
//!
//! Streams are consumed once. The store checks for cancellation between
//! elements, so a stream that waits on a timer or a socket can be stopped at
//! its next suspension point.

use std::fmt;
use std::future::Future;

use futures::stream::{self, BoxStream, Stream, StreamExt};

/// A boxed, sendable stream of follow-up actions.
pub type ActionStream<A> = BoxStream<'static, A>;

/// The result of handling one effect request.
pub enum EffectOutcome<A> {
    /// No follow-up action.
    None,
    /// One follow-up action.
    Single(A),
    /// Follow-up actions delivered in the order the stream yields them.
    Stream(ActionStream<A>),
}

impl<A: Send + 'static> EffectOutcome<A> {
    /// No follow-up action.
    pub fn none() -> Self {
        EffectOutcome::None
    }

    /// Exactly one follow-up action.
    pub fn single(action: A) -> Self {
        EffectOutcome::Single(action)
    }

    /// Follow-up actions from an arbitrary stream.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = A> + Send + 'static,
    {
        EffectOutcome::Stream(stream.boxed())
    }

    /// A fixed, ordered list of actions emitted as a stream.
    ///
    /// Equivalent to yielding each action in turn and then closing the stream.
    pub fn sequence<I>(actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        I::IntoIter: Send + 'static,
    {
        EffectOutcome::Stream(stream::iter(actions).boxed())
    }

    /// One action produced by a future, resolved when the store consumes it.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = A> + Send + 'static,
    {
        EffectOutcome::Stream(stream::once(future).boxed())
    }

    /// Transform the carried action type.
    ///
    /// Identity on `None` and applied lazily to every element of a `Stream`.
    /// A `Single` action already exists, so `f` is applied to it right away,
    /// exactly once. For a pure, total `f` this is indistinguishable from
    /// applying it when the store consumes the outcome, and the outcome stays
    /// a `Single`.
    pub fn map<B, F>(self, f: F) -> EffectOutcome<B>
    where
        B: Send + 'static,
        F: Fn(A) -> B + Send + 'static,
    {
        match self {
            EffectOutcome::None => EffectOutcome::None,
            EffectOutcome::Single(action) => EffectOutcome::Single(f(action)),
            EffectOutcome::Stream(stream) => EffectOutcome::Stream(stream.map(f).boxed()),
        }
    }

    /// True for [`EffectOutcome::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, EffectOutcome::None)
    }

    /// Convert into a stream, regardless of variant.
    ///
    /// `None` becomes an empty stream and `Single` a one-element stream.
    pub fn into_stream(self) -> ActionStream<A> {
        match self {
            EffectOutcome::None => stream::empty().boxed(),
            EffectOutcome::Single(action) => stream::once(async move { action }).boxed(),
            EffectOutcome::Stream(stream) => stream,
        }
    }
}

impl<A: Send + 'static> From<Option<A>> for EffectOutcome<A> {
    fn from(action: Option<A>) -> Self {
        match action {
            Some(action) => EffectOutcome::Single(action),
            None => EffectOutcome::None,
        }
    }
}

impl<A: fmt::Debug> fmt::Debug for EffectOutcome<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectOutcome::None => f.write_str("None"),
            EffectOutcome::Single(action) => f.debug_tuple("Single").field(action).finish(),
            EffectOutcome::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}
