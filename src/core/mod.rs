//! Runtime core: configuration, context and registries.
//!
//! - [`Config`]: startup-time settings (production flag, bus capacity, idle mode, default timeout)
//! - [`Context`] / [`ContextBuilder`]: owns the registries, the event bus and the idle scheduler
//! - [`Snapshot`] / [`UnitInfo`]: read-only introspection of the active stack and name cache

mod config;
mod context;
mod registry;

pub use config::Config;
pub use context::{Context, ContextBuilder};
pub use registry::{Snapshot, UnitInfo};

pub(crate) use registry::Inspect;
