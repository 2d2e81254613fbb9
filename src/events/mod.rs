//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by units, the registry and
//! subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Unit::start/stop/reset`, chain continuations,
//!   `Context::shutdown`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the `SubscriberSet` pump that feeds each subscriber's queue,
//!   plus any receiver obtained from [`Context::subscribe`](crate::Context::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
