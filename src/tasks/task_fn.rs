//! # Closure-backed task
//!
//! [`TaskFn`] turns `Fn(CancellationToken) -> Future` into a [`Task`]. Every start of
//! the owning `task(name)` unit calls the closure once and gets a fresh future, so the
//! closure is a factory for runs, not a run itself. State that must survive across
//! runs goes into captured `Arc`s.
//!
//! The task counts its runs, which is what tells a restart of the unit apart from a
//! cached start.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use progkit::{TaskFn, TaskError};
//! use std::time::Duration;
//!
//! let spec = TaskFn::spec("heartbeat", |token: CancellationToken| async move {
//!     token.cancelled().await;
//!     Err(TaskError::Canceled)
//! })
//! .with_teardown(Duration::from_millis(500));
//!
//! assert_eq!(spec.name(), "heartbeat");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::spec::TaskSpec;
use super::task::Task;
use crate::error::TaskError;

/// Task whose runs are produced by a closure.
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    make_run: F,
    runs: AtomicU64,
}

impl<F> TaskFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, make_run: F) -> Self {
        Self {
            name: name.into(),
            make_run,
            runs: AtomicU64::new(0),
        }
    }

    /// Creates the task behind a shared handle, ready for [`TaskSpec::new`].
    pub fn arc(name: impl Into<Cow<'static, str>>, make_run: F) -> Arc<Self> {
        Arc::new(Self::new(name, make_run))
    }

    /// Number of runs started so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }
}

impl<F, Fut> TaskFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    /// Shorthand for a [`TaskSpec`] with default teardown and no deadline.
    pub fn spec(name: impl Into<Cow<'static, str>>, make_run: F) -> TaskSpec {
        TaskSpec::new(Self::arc(name, make_run))
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, token: CancellationToken) -> Result<(), TaskError> {
        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(target: "progkit", task = %self.name, run, "task run");
        (self.make_run)(token).await
    }
}

impl<F> fmt::Debug for TaskFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFn")
            .field("name", &self.name)
            .field("runs", &self.runs())
            .finish_non_exhaustive()
    }
}
