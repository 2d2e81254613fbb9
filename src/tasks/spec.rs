//! # Task specification.
//!
//! [`TaskSpec`] bundles a task with the settings of the unit that runs it:
//! - `teardown`: the unit timeout, i.e. how long the task survives its last `stop`
//! - `deadline`: optional limit on a single run; `None` or zero runs unbounded

use std::time::Duration;

use super::task::TaskRef;

/// Specification for running a task inside a unit.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use progkit::{TaskError, TaskFn, TaskRef, TaskSpec};
///
/// let sync: TaskRef = TaskFn::arc("sync", |_t: CancellationToken| async { Ok::<(), TaskError>(()) });
/// let spec = TaskSpec::new(sync)
///     .with_teardown(Duration::from_millis(500))
///     .with_deadline(Duration::from_secs(30));
///
/// assert_eq!(spec.name(), "sync");
/// assert_eq!(spec.deadline(), Some(Duration::from_secs(30)));
/// ```
#[derive(Clone)]
pub struct TaskSpec {
    task: TaskRef,
    teardown: Duration,
    deadline: Option<Duration>,
}

impl TaskSpec {
    /// Runs `task` with immediate teardown and no deadline.
    pub fn new(task: TaskRef) -> Self {
        Self {
            task,
            teardown: Duration::ZERO,
            deadline: None,
        }
    }

    /// Keeps the task running for `timeout` after the unit's last `stop`.
    pub fn with_teardown(mut self, timeout: Duration) -> Self {
        self.teardown = timeout;
        self
    }

    /// Cancels a run that takes longer than `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline).filter(|d| !d.is_zero());
        self
    }

    /// Returns the task.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Returns the task name.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Returns the unit timeout.
    pub fn teardown(&self) -> Duration {
        self.teardown
    }

    /// Returns the per-run deadline.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

impl From<TaskRef> for TaskSpec {
    fn from(task: TaskRef) -> Self {
        Self::new(task)
    }
}

impl std::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("task", &self.name())
            .field("teardown", &self.teardown)
            .field("deadline", &self.deadline)
            .finish()
    }
}
