//! # Teardown policy for released units.
//!
//! [`TeardownPolicy`] decides what happens when a consumer releases a unit.
//!
//! - [`TeardownPolicy::Immediate`] the last release tears the unit down right away
//!   (still subject to idle deferral unless forced).
//! - [`TeardownPolicy::Delayed`] the last release schedules teardown after a timeout;
//!   a `start` within that window cancels it.
//!
//! ## State machine
//! ```text
//!            start                 stop (last ref, Delayed)
//! Dormant ───────────► Active ─────────────────────────────► PendingTeardown
//!    ▲                  │  ▲                                     │   │
//!    │   stop (last ref,│  └──────────── start ──────────────────┘   │
//!    │   Immediate)     │                                            │
//!    └──────────────────┴─────────────── timer fired ────────────────┘
//!
//! reset: Active | PendingTeardown ──► Dormant
//! ```
//!
//! A forced stop always tears down, even with outstanding references.

use std::time::Duration;

/// Lifecycle state of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitState {
    /// No cached output, no references.
    Dormant,
    /// Computation invoked and referenced by at least one consumer.
    Active,
    /// No references left, cached output kept until a deferred teardown fires.
    PendingTeardown,
}

impl UnitState {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            UnitState::Dormant => "dormant",
            UnitState::Active => "active",
            UnitState::PendingTeardown => "pending_teardown",
        }
    }
}

/// Policy controlling when a fully released unit is torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TeardownPolicy {
    /// Tear down on the last release (default).
    #[default]
    Immediate,
    /// Tear down after the given delay unless the unit is started again.
    Delayed(Duration),
}

/// Outcome of a release, computed by [`TeardownPolicy::on_release`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TeardownStep {
    /// References remain; nothing to do.
    Keep,
    /// Run the exit path now.
    ExitNow,
    /// Schedule the exit path after the delay.
    Defer(Duration),
}

impl TeardownPolicy {
    /// Builds the policy from a unit timeout: `0s` means [`TeardownPolicy::Immediate`].
    pub fn from_timeout(timeout: Duration) -> Self {
        if timeout.is_zero() {
            TeardownPolicy::Immediate
        } else {
            TeardownPolicy::Delayed(timeout)
        }
    }

    /// Returns the teardown timeout (`0s` for immediate teardown).
    pub fn timeout(&self) -> Duration {
        match self {
            TeardownPolicy::Immediate => Duration::ZERO,
            TeardownPolicy::Delayed(d) => *d,
        }
    }

    /// Decides the next step after a release left `remaining` references.
    pub(crate) fn on_release(&self, remaining: u32, force: bool) -> TeardownStep {
        if force {
            return TeardownStep::ExitNow;
        }
        if remaining > 0 {
            return TeardownStep::Keep;
        }
        match self {
            TeardownPolicy::Immediate => TeardownStep::ExitNow,
            TeardownPolicy::Delayed(d) => TeardownStep::Defer(*d),
        }
    }
}
