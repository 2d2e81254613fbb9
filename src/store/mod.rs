//! State-container collaborator.
//!
//! A unit can own a slice of a state container for as long as it is active:
//! [`reduce`] attaches a named reducer on start and detaches it on teardown,
//! [`dispatch`] sends an action when started, [`with_store`] and [`select`] run
//! arbitrary reads against the store.
//!
//! [`MemoryStore`] is the bundled in-memory implementation.

mod memory;
mod units;

pub use memory::{MemoryStore, Reducer};
pub use units::{dispatch, reduce, select, with_store};

use crate::units::Output;

/// A state container with reducers that can be attached and detached by name.
pub trait Store: Send + Sync + 'static {
    /// Per-slice state.
    type State: Output;
    /// Action accepted by [`dispatch`](Store::dispatch).
    type Action: Output;

    /// Attaches `reducer` under `name`. No-op when the name is already attached.
    fn attach_reducer(&self, name: &str, reducer: Reducer<Self::State, Self::Action>);

    /// Detaches the reducer under `name`, keeping its last state for a later attach.
    fn detach_reducer(&self, name: &str);

    /// Runs every attached reducer over `action`.
    fn dispatch(&self, action: Self::Action);
}
