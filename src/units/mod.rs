//! Units and their composition.
//!
//! ## Contents
//! - [`Unit`] the reference-counted lazy computation, with [`Lease`] for RAII claims
//! - [`Value`] / [`Eventual`] ready-or-pending outputs
//! - [`Release`] what `stop` returns
//! - [`UnitBuilder`] / [`Name`] construction and naming
//! - composition methods on [`Unit`]: `map`, `map_value`, `chain`, `and_then`
//! - free combinators: [`combine`], [`combine_all`], [`once`], [`map_once`], [`delay`]

mod builder;
mod combinators;
mod compose;
mod release;
mod unit;
mod value;

pub use builder::{Name, UnitBuilder};
pub use combinators::{Combine, combine, combine_all, delay, map_once, once};
pub use release::Release;
pub use unit::{Lease, Unit, UnitId};
pub use value::{Eventual, Output, Value};
