//! # Idle scheduling capability.
//!
//! Non-forced teardown does not run inside the release that triggered it; it is handed
//! to an [`IdleScheduler`] so that teardown work lands in the host's next idle window
//! instead of in the middle of active work.
//!
//! - [`InlineIdle`]: synchronous fallback: the job runs before `schedule_when_idle`
//!   returns. Teardown is then observable as soon as `stop` returns.
//! - [`YieldIdle`]: spawns the job on tokio after a few cooperative yields, so
//!   already-runnable tasks go first. Requires a tokio runtime.
//!
//! Every scheduled job can be cancelled through its [`IdleHandle`]; cancellation after
//! the job has run is a no-op.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// A unit of deferred work.
pub type IdleJob = Box<dyn FnOnce() + Send + 'static>;

/// Capability for running work when the host is idle.
///
/// A job whose handle was cancelled before it ran must be dropped without running;
/// releases waiting on it resolve once it is dropped.
pub trait IdleScheduler: Send + Sync + 'static {
    /// Schedules `job` for the next idle window and returns a handle that cancels it.
    fn schedule_when_idle(&self, job: IdleJob) -> IdleHandle;
}

/// Cancellation handle for a scheduled idle job.
#[derive(Clone, Debug, Default)]
pub struct IdleHandle {
    token: CancellationToken,
}

impl IdleHandle {
    /// Creates a handle bound to `token`; cancelling the handle cancels the token.
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Prevents the job from running if it has not run yet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Synchronous fallback: runs the job immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineIdle;

impl IdleScheduler for InlineIdle {
    fn schedule_when_idle(&self, job: IdleJob) -> IdleHandle {
        job();
        IdleHandle::default()
    }
}

/// Tokio-backed scheduler: yields `yields` times, then runs the job unless cancelled.
#[derive(Clone, Copy, Debug)]
pub struct YieldIdle {
    yields: u32,
}

impl YieldIdle {
    /// Creates a scheduler that yields `yields` times before running a job (min 1).
    pub fn new(yields: u32) -> Self {
        Self {
            yields: yields.max(1),
        }
    }
}

impl Default for YieldIdle {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdleScheduler for YieldIdle {
    fn schedule_when_idle(&self, job: IdleJob) -> IdleHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let yields = self.yields;

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = async {
                    for _ in 0..yields {
                        tokio::task::yield_now().await;
                    }
                } => {
                    if !cancelled.is_cancelled() {
                        job();
                    }
                }
            }
        });

        IdleHandle::new(token)
    }
}

/// Selects the idle scheduler a [`Context`](crate::Context) builds by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IdleMode {
    /// [`InlineIdle`]: teardown completes before `stop` returns.
    #[default]
    Inline,
    /// [`YieldIdle`] with the given number of cooperative yields.
    Yield(u32),
}

impl IdleMode {
    /// Builds the scheduler for this mode.
    pub fn scheduler(&self) -> Arc<dyn IdleScheduler> {
        match self {
            IdleMode::Inline => Arc::new(InlineIdle),
            IdleMode::Yield(n) => Arc::new(YieldIdle::new(*n)),
        }
    }
}
