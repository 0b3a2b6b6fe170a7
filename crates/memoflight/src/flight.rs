// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The shared in-flight operation and the future handed to callers.

use std::{
    any::Any,
    fmt::{self, Debug},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures_util::future::{BoxFuture, Ready, Shared};

/// The shared handle every caller of a pending key polls.
pub(crate) type Flight<V, E> = Shared<BoxFuture<'static, Outcome<V, E>>>;

/// What one producer invocation ended with. Cloned into every attached caller.
#[derive(Clone, Debug)]
pub(crate) enum Outcome<V, E> {
    Value(V),
    Failed(E),
    Panicked(Arc<str>),
}

impl<V, E> Outcome<V, E> {
    /// Turns the outcome into the caller's result, re-raising a producer panic.
    fn into_result(self) -> Result<V, E> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Failed(error) => Err(error),
            Self::Panicked(message) => std::panic::resume_unwind(Box::new(message.to_string())),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> Arc<str> {
    if let Some(message) = payload.downcast_ref::<&str>() {
        Arc::from(*message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        Arc::from(message.as_str())
    } else {
        Arc::from("producer panicked")
    }
}

/// Future returned by [`MemoCache::resolve`](crate::MemoCache::resolve).
///
/// Resolves to the cached value on a hit, or to the outcome of the operation this
/// call started or attached to. Dropping it detaches only this caller; the shared
/// operation keeps its place in the cache for the other callers.
///
/// # Panics
///
/// If the producer panicked, the panic is re-raised in every caller that awaits
/// the operation.
#[must_use = "futures do nothing unless polled"]
pub struct Resolve<V, E> {
    state: State<V, E>,
}

enum State<V, E> {
    Hit(Ready<V>),
    Joined(Flight<V, E>),
}

impl<V, E> Resolve<V, E> {
    pub(crate) fn hit(value: V) -> Self {
        Self {
            state: State::Hit(futures_util::future::ready(value)),
        }
    }

    pub(crate) fn joined(flight: Flight<V, E>) -> Self {
        Self {
            state: State::Joined(flight),
        }
    }

    /// Returns `true` if this call was answered from a stored value.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self.state, State::Hit(_))
    }
}

impl<V, E> Future for Resolve<V, E>
where
    V: Clone,
    E: Clone,
{
    type Output = Result<V, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Hit(ready) => Pin::new(ready).poll(cx).map(Ok),
            State::Joined(flight) => Pin::new(flight).poll(cx).map(Outcome::into_result),
        }
    }
}

impl<V, E> Debug for Resolve<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolve").field("hit", &self.is_hit()).finish_non_exhaustive()
    }
}
