//! # Subscriber trait
//!
//! [`Subscribe`] is how an application observes unit lifecycles without touching the
//! units themselves: register implementations with
//! [`ContextBuilder::with_subscribers`](crate::ContextBuilder::with_subscribers) and the
//! context's [`SubscriberSet`](crate::SubscriberSet) feeds them every accepted event.
//!
//! A subscriber is free to be slow. It has its own queue and worker, so a unit's
//! `start`/`stop` never waits on it; what does not fit in the queue is dropped and
//! reported as `SubscriberOverflow`.
//!
//! ## Example
//! ```rust
//! use progkit::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct DriftAlarm;
//!
//! #[async_trait]
//! impl Subscribe for DriftAlarm {
//!     async fn on_event(&self, ev: &Event) {
//!         // page somebody about `ev.unit`
//!         let _ = ev;
//!     }
//!     fn name(&self) -> &'static str { "drift-alarm" }
//!     fn accepts(&self, ev: &Event) -> bool { ev.kind == EventKind::RefcountDrift }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of lifecycle events published by a [`Context`](crate::Context).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Runs on this subscriber's worker task.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Filters events before they are queued; rejected events never count as overflow.
    fn accepts(&self, _event: &Event) -> bool {
        true
    }

    /// Queue size for this subscriber. `None` uses the context's `bus_capacity`.
    fn queue_capacity(&self) -> Option<usize> {
        None
    }
}
