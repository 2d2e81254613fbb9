//! # LogWriter: tracing-backed event printer
//!
//! A minimal subscriber that renders incoming [`Event`]s through `tracing`.
//! Diagnostics (refcount drift, race aborts, subscriber trouble) go out at `WARN`,
//! teardown at `INFO`, everything else at `DEBUG`. [`LogWriter::diagnostics`] keeps
//! only the `WARN` class, which suits production contexts.
//!
//! ## Example output
//! ```text
//! DEBUG progkit: [starting] unit="fetchTodos" refs=1
//! DEBUG progkit: [invoked] unit="fetchTodos"
//! DEBUG progkit: [teardown-scheduled] unit="fetchTodos" delay_ms=250
//!  INFO progkit: [stopped] unit="fetchTodos" forced=false
//!  WARN progkit: [refcount-drift] unit="fetchTodos"
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter {
    diagnostics_only: bool,
}

impl LogWriter {
    /// Construct a new [`LogWriter`] that writes every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a [`LogWriter`] that writes diagnostics only (drift, race aborts,
    /// subscriber trouble).
    #[must_use]
    pub fn diagnostics() -> Self {
        Self {
            diagnostics_only: true,
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let unit = e.unit.as_deref().unwrap_or("?");
        match e.kind {
            EventKind::UnitStarting => {
                tracing::debug!(target: "progkit", "[starting] unit={unit:?} refs={:?}", e.ref_count);
            }
            EventKind::ComputationInvoked => {
                tracing::debug!(target: "progkit", "[invoked] unit={unit:?}");
            }
            EventKind::UnitReleased => {
                tracing::debug!(target: "progkit", "[released] unit={unit:?} refs={:?}", e.ref_count);
            }
            EventKind::TeardownScheduled => {
                tracing::debug!(target: "progkit", "[teardown-scheduled] unit={unit:?} delay_ms={:?}", e.delay_ms);
            }
            EventKind::TeardownAborted => {
                tracing::debug!(target: "progkit", "[teardown-aborted] unit={unit:?} refs={:?}", e.ref_count);
            }
            EventKind::IdleDeferred => {
                tracing::debug!(target: "progkit", "[idle-deferred] unit={unit:?}");
            }
            EventKind::UnitStopped => {
                tracing::info!(target: "progkit", "[stopped] unit={unit:?} forced={}", e.forced.unwrap_or(false));
            }
            EventKind::UnitReset => {
                tracing::info!(target: "progkit", "[reset] unit={unit:?} discarded_refs={:?}", e.ref_count);
            }
            EventKind::ContextShutdown => {
                tracing::info!(target: "progkit", "[context-shutdown]");
            }
            EventKind::TaskStopped => {
                tracing::debug!(target: "progkit", "[task-stopped] task={unit:?} reason={:?}", e.reason);
            }
            EventKind::TaskFailed => {
                tracing::warn!(
                    target: "progkit",
                    "[task-failed] task={unit:?} err={}",
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
            EventKind::TaskTimeout => {
                tracing::warn!(target: "progkit", "[task-timeout] task={unit:?} timeout_ms={:?}", e.delay_ms);
            }
            EventKind::RefcountDrift => {
                tracing::warn!(target: "progkit", "[refcount-drift] unit={unit:?}");
            }
            EventKind::RaceAborted => {
                tracing::warn!(target: "progkit", "[race-aborted] unit={unit:?}");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "progkit", "[subscriber-overflow] subscriber={unit} reason={:?}", e.reason);
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(
                    target: "progkit",
                    "[subscriber-panicked] subscriber={unit} info={}",
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }

    fn accepts(&self, event: &Event) -> bool {
        !self.diagnostics_only || event.is_diagnostic()
    }
}
