//! # Outcome of releasing a unit.
//!
//! [`Unit::stop`](crate::Unit::stop) returns a [`Release`]:
//!
//! - [`Release::Retained`]: the unit is still referenced (or the call was refcount
//!   drift); nothing was torn down.
//! - [`Release::Released`]: teardown ran or is scheduled. The value resolves to the
//!   exit output, or to `None` when there is no exit function, when a later `start`
//!   aborted a deferred teardown, or when the exit itself yielded nothing.

use super::value::{Output, Value};

/// Result of a `stop` call.
#[derive(Debug)]
pub enum Release<X> {
    /// The unit stays active; no teardown happened.
    Retained,
    /// Teardown ran or is pending.
    Released(Value<Option<X>>),
}

impl<X: Output> Release<X> {
    /// Returns `true` if no teardown was triggered.
    pub fn is_retained(&self) -> bool {
        matches!(self, Release::Retained)
    }

    /// Returns `true` if teardown is still in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, Release::Released(v) if v.is_pending())
    }

    /// Returns the exit output if it is known without waiting.
    ///
    /// `Some(None)` means the release settled without an exit output.
    pub fn now(&self) -> Option<Option<&X>> {
        match self {
            Release::Retained => Some(None),
            Release::Released(v) => v.now().map(Option::as_ref),
        }
    }

    /// Flattens into the value form used by exit functions.
    pub fn into_value(self) -> Value<Option<X>> {
        match self {
            Release::Retained => Value::Ready(None),
            Release::Released(v) => v,
        }
    }

    /// Waits for teardown to finish and returns the exit output.
    pub async fn settle(self) -> Option<X> {
        self.into_value().resolve().await
    }
}

impl<X: Output> Clone for Release<X> {
    fn clone(&self) -> Self {
        match self {
            Release::Retained => Release::Retained,
            Release::Released(v) => Release::Released(v.clone()),
        }
    }
}
