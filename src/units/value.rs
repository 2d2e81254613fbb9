//! # Eventual-or-ready values.
//!
//! [`Value`] is the tagged union every unit computation produces: either a value that
//! is already available ([`Value::Ready`]) or one that will be ([`Value::Pending`]).
//! Composition code matches on the tag explicitly instead of probing for futures.
//!
//! [`Eventual`] is the pending half. It is:
//! - **eager**: the underlying future is spawned on tokio when the eventual is created,
//!   so it makes progress whether or not anybody polls it;
//! - **shared**: cloning is cheap and every clone resolves to a clone of the same output.
//!
//! An eventual can be *abandoned* (its producer decided not to yield a value, e.g. a
//! race-aborted chain). Awaiting an abandoned eventual never completes.
//!
//! ## Example
//! ```rust
//! use progkit::Value;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let v = Value::pending(async { 20 }).map(|n| n + 1);
//! assert!(v.is_pending());
//! assert_eq!(v.resolve().await, 21);
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

/// Bound for anything a unit produces: cloneable and shareable across tasks.
pub trait Output: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Output for T {}

/// A shared, eagerly driven future output.
pub struct Eventual<T> {
    inner: Shared<BoxFuture<'static, Option<T>>>,
    // set once this handle observed abandonment; `Shared` must not be polled again
    abandoned: bool,
}

impl<T: Output> Eventual<T> {
    /// Spawns `fut` on the current tokio runtime and returns a shared handle to its output.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::spawn_optional(async move { Some(fut.await) })
    }

    /// Like [`spawn`](Self::spawn), but `None` abandons the eventual.
    pub(crate) fn spawn_optional<F>(fut: F) -> Self
    where
        F: Future<Output = Option<T>> + Send + 'static,
    {
        let join = tokio::spawn(fut);
        let inner = async move {
            match join.await {
                Ok(out) => out,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_cancelled) => None,
            }
        }
        .boxed()
        .shared();
        Self {
            inner,
            abandoned: false,
        }
    }

    /// Returns the output if the eventual already settled with a value.
    pub fn peek(&self) -> Option<&T> {
        if self.abandoned {
            return None;
        }
        self.inner.peek().and_then(Option::as_ref)
    }

    /// Returns `true` once the producer finished, with or without a value.
    pub fn is_settled(&self) -> bool {
        self.abandoned || self.inner.peek().is_some()
    }
}

impl<T: Output> Future for Eventual<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        if this.abandoned {
            return Poll::Pending;
        }
        match this.inner.poll_unpin(cx) {
            Poll::Ready(Some(v)) => Poll::Ready(v),
            // abandoned: stays pending for good
            Poll::Ready(None) => {
                this.abandoned = true;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T: Output> Clone for Eventual<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            abandoned: self.abandoned,
        }
    }
}

impl<T> fmt::Debug for Eventual<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Eventual(..)")
    }
}

/// Output of a unit computation: ready now, or eventually.
#[derive(Debug)]
pub enum Value<T> {
    /// Already available.
    Ready(T),
    /// Will be available once the eventual resolves.
    Pending(Eventual<T>),
}

impl<T: Output> Value<T> {
    /// Wraps an available value.
    pub fn ready(value: T) -> Self {
        Value::Ready(value)
    }

    /// Spawns `fut` and wraps its eventual output.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Value::Pending(Eventual::spawn(fut))
    }

    /// Returns `true` for [`Value::Pending`].
    pub fn is_pending(&self) -> bool {
        matches!(self, Value::Pending(_))
    }

    /// Returns `true` for [`Value::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, Value::Ready(_))
    }

    /// Returns the value if it is available without waiting.
    pub fn now(&self) -> Option<&T> {
        match self {
            Value::Ready(v) => Some(v),
            Value::Pending(e) => e.peek(),
        }
    }

    /// Waits for the value.
    pub async fn resolve(self) -> T {
        match self {
            Value::Ready(v) => v,
            Value::Pending(e) => e.await,
        }
    }

    /// Applies `f` to the value, after it resolves when pending.
    pub fn map<U, F>(self, f: F) -> Value<U>
    where
        U: Output,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Value::Ready(v) => Value::Ready(f(v)),
            Value::Pending(e) => Value::pending(async move { f(e.await) }),
        }
    }
}

impl<T: Output> Clone for Value<T> {
    fn clone(&self) -> Self {
        match self {
            Value::Ready(v) => Value::Ready(v.clone()),
            Value::Pending(e) => Value::Pending(e.clone()),
        }
    }
}

impl<T> From<T> for Value<T> {
    fn from(value: T) -> Self {
        Value::Ready(value)
    }
}
