//! Teardown and idle-scheduling policies.
//!
//! This module groups the knobs that control **when** a released unit is torn down.
//!
//! ## Contents
//! - [`TeardownPolicy`] immediate vs timeout-deferred teardown, plus the
//!   [`UnitState`] machine it drives
//! - [`IdleScheduler`] capability used to run non-forced teardown in the host's
//!   next idle window, with [`InlineIdle`] (synchronous fallback) and
//!   [`YieldIdle`] (tokio cooperative yield) implementations
//!
//! ## Quick wiring
//! ```text
//! Unit::stop(force)
//!   └─► TeardownPolicy::on_release(remaining, force)
//!         ├─ Keep        → stay Active
//!         ├─ Defer(d)    → PendingTeardown, timer(d) → exit_with(idle)
//!         └─ ExitNow     → exit_with(idle unless forced)
//!                              └─► IdleScheduler::schedule_when_idle(job)
//! ```
//!
//! ## Defaults
//! - timeout `0s` → `TeardownPolicy::Immediate`.
//! - `IdleMode::Inline`: idle jobs run synchronously inside `stop`.

mod idle;
mod teardown;

pub use idle::{IdleHandle, IdleJob, IdleMode, IdleScheduler, InlineIdle, YieldIdle};
pub use teardown::{TeardownPolicy, UnitState};

pub(crate) use teardown::TeardownStep;
