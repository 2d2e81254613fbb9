//! # Event subscribers for progkit.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! a built-in [`LogWriter`] (feature `logging`) for lifecycle events broadcast
//! through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Unit::start/stop/reset ── publish(Event) ──► Bus ──► SubscriberSet pump
//!                                                           │ accepts?
//!                                                           ▼
//!                                                 ┌─────────┼─────────┐
//!                                                 ▼         ▼         ▼
//!                                              LogWriter  Metrics   Custom
//! ```

mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
mod log;

pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;

#[cfg(feature = "logging")]
pub use log::LogWriter;
