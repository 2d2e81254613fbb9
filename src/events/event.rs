//! # Lifecycle events emitted by units and the context.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Activation events**: a consumer claimed a unit, the computation ran
//! - **Teardown events**: release, deferral, abort, exit
//! - **Diagnostic events**: refcount drift, race-aborted chains, subscriber trouble
//!
//! The [`Event`] struct carries additional metadata such as timestamps, unit name,
//! reference count and teardown delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use progkit::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TeardownScheduled)
//!     .with_unit("fetchTodos")
//!     .with_ref_count(0)
//!     .with_delay(Duration::from_millis(250));
//!
//! assert_eq!(ev.kind, EventKind::TeardownScheduled);
//! assert_eq!(ev.unit.as_deref(), Some("fetchTodos"));
//! assert_eq!(ev.delay_ms, Some(250));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `unit`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `unit`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Activation ===
    /// A consumer called `start`.
    ///
    /// Sets:
    /// - `unit`, `unit_id`
    /// - `ref_count`: count after the increment
    UnitStarting,

    /// The wrapped computation was invoked (first start of a cycle, or forced).
    ///
    /// Sets:
    /// - `unit`, `unit_id`
    ComputationInvoked,

    // === Teardown ===
    /// A consumer called `stop` and the unit is still referenced.
    ///
    /// Sets:
    /// - `unit`, `unit_id`
    /// - `ref_count`: count after the decrement
    UnitReleased,

    /// The last reference was released and teardown waits for the unit timeout.
    ///
    /// Sets:
    /// - `unit`, `unit_id`
    /// - `delay_ms`: configured teardown timeout
    TeardownScheduled,

    /// A pending teardown was abandoned because the unit was started again.
    ///
    /// Sets:
    /// - `unit`, `unit_id`
    /// - `ref_count`: count at the time of the abort
    TeardownAborted,

    /// Teardown was handed to the idle scheduler.
    ///
    /// Sets:
    /// - `unit`, `unit_id`
    IdleDeferred,

    /// Teardown ran: cache cleared, unit left the active stack, exit invoked.
    ///
    /// Sets:
    /// - `unit`, `unit_id`
    /// - `forced`: whether the stop was forced
    UnitStopped,

    /// The unit was hard-reset by owning infrastructure.
    ///
    /// Sets:
    /// - `unit`, `unit_id`
    /// - `ref_count`: outstanding references discarded by the reset
    UnitReset,

    // === Task runners ===
    /// A task started by a unit finished successfully or after cancellation.
    ///
    /// Sets:
    /// - `unit`: task name
    /// - `reason`: `"ok"` or `"canceled"`
    TaskStopped,

    /// A task started by a unit failed.
    ///
    /// Sets:
    /// - `unit`: task name
    /// - `reason`: error message
    TaskFailed,

    /// A task exceeded its deadline and was cancelled (always followed by `TaskFailed`).
    ///
    /// Sets:
    /// - `unit`: task name
    /// - `delay_ms`: the deadline
    TaskTimeout,

    // === Diagnostics ===
    /// `stop` was called on a unit without outstanding references.
    ///
    /// Sets:
    /// - `unit`, `unit_id`
    RefcountDrift,

    /// A chain continuation was abandoned: the composed unit was released while
    /// the parent's result was still pending.
    ///
    /// Sets:
    /// - `unit`: the composed unit name
    RaceAborted,

    /// The context was shut down; all registries were cleared.
    ContextShutdown,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the unit (or subscriber), if applicable.
    pub unit: Option<Arc<str>>,
    /// Identity of the unit, if applicable.
    pub unit_id: Option<u64>,
    /// Reference count observed when the event was emitted.
    pub ref_count: Option<u32>,
    /// Teardown delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Whether a teardown was forced.
    pub forced: Option<bool>,
    /// Human-readable reason (overflow details, panic info, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            unit: None,
            unit_id: None,
            ref_count: None,
            delay_ms: None,
            forced: None,
            reason: None,
        }
    }

    /// Attaches a unit (or subscriber) name.
    #[inline]
    pub fn with_unit(mut self, unit: impl Into<Arc<str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Attaches a unit identity.
    #[inline]
    pub fn with_unit_id(mut self, id: u64) -> Self {
        self.unit_id = Some(id);
        self
    }

    /// Attaches the observed reference count.
    #[inline]
    pub fn with_ref_count(mut self, n: u32) -> Self {
        self.ref_count = Some(n);
        self
    }

    /// Attaches a teardown delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches the `forced` flag of a teardown.
    #[inline]
    pub fn with_forced(mut self, forced: bool) -> Self {
        self.forced = Some(forced);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_unit(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_unit(subscriber)
            .with_reason(info)
    }

    /// Returns `true` for diagnostics that point at caller bookkeeping problems.
    #[inline]
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self.kind,
            EventKind::RefcountDrift
                | EventKind::RaceAborted
                | EventKind::SubscriberOverflow
                | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::UnitStarting);
        let b = Event::new(EventKind::UnitStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_is_clamped_to_u32() {
        let ev = Event::new(EventKind::TeardownScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn diagnostics_are_flagged() {
        assert!(Event::new(EventKind::RefcountDrift).is_diagnostic());
        assert!(Event::subscriber_overflow("log", "full").is_diagnostic());
        assert!(!Event::new(EventKind::UnitStopped).is_diagnostic());
    }
}
