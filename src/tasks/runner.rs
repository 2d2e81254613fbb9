//! # Units that run external tasks.
//!
//! [`run_task`] wraps a [`TaskSpec`] in a unit: starting the unit spawns one run of
//! the task with a fresh cancellation token, tearing it down cancels that token.
//! The unit output is a [`TaskHandle`]; its completion is an eventual that every
//! consumer can await. [`task_completion`] derives a unit whose output *is* that
//! completion.
//!
//! ## Run flow
//! ```text
//! start ─► token = ctx.child_token()
//!       └► spawn run_once(task, token, deadline)
//!             Ok(()) | Err(Canceled)   ─► publish TaskStopped
//!             Err(Fail | Fatal)        ─► publish TaskFailed
//!             deadline exceeded        ─► cancel token, publish TaskTimeout + TaskFailed
//!
//! stop (last claim, after the unit timeout) ─► token.cancel()
//!                                          ─► release resolves to the task result
//! ```
//!
//! The token is a child of the context token, so [`Context::shutdown`] cancels every
//! running task as well.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::spec::TaskSpec;
use super::task::Task;
use crate::core::Context;
use crate::error::{ConfigError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::units::{Eventual, Unit, Value};

/// Outcome of a single task run.
pub type TaskResult = Result<(), TaskError>;

/// Handle to a running task: cancellation plus an awaitable completion.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    name: Arc<str>,
    token: CancellationToken,
    completion: Eventual<TaskResult>,
}

impl TaskHandle {
    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests cooperative cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns `true` once the run finished.
    pub fn is_finished(&self) -> bool {
        self.completion.is_settled()
    }

    /// Shared completion of the run.
    pub fn completion(&self) -> &Eventual<TaskResult> {
        &self.completion
    }

    /// Waits for the run to finish.
    pub async fn join(&self) -> TaskResult {
        self.completion.clone().await
    }
}

/// A unit that runs `spec`'s task while active (`task(name)`).
///
/// Teardown cancels the run and its release resolves to the run's result.
/// Starting the unit requires a tokio runtime.
pub fn run_task(
    ctx: &Context,
    spec: impl Into<TaskSpec>,
) -> Result<Unit<TaskHandle, TaskResult>, ConfigError> {
    let spec = spec.into();
    let name: Arc<str> = Arc::from(spec.name());
    let bus = ctx.bus().clone();
    let parent = ctx.clone();
    let runner = spec.clone();

    ctx.unit(format!("task({name})"))
        .with_timeout(spec.teardown())
        .build_with_exit(
            move || {
                let token = parent.child_token();
                let task = Arc::clone(runner.task());
                let deadline = runner.deadline();
                let bus = bus.clone();
                let child = token.clone();
                let completion = Eventual::spawn(async move {
                    run_once(task.as_ref(), &child, deadline, &bus).await
                });
                Value::ready(TaskHandle {
                    name: Arc::clone(&name),
                    token,
                    completion,
                })
            },
            |out: Value<TaskHandle>, _forced: bool| match out {
                Value::Ready(handle) => {
                    handle.cancel();
                    Value::Pending(handle.completion)
                }
                Value::Pending(handle) => Value::pending(async move {
                    let handle = handle.await;
                    handle.cancel();
                    handle.join().await
                }),
            },
        )
}

/// A unit whose output is the completion of the task run by `unit` (`taskCompletion(name)`).
///
/// Starting it starts `unit`; teardown releases `unit`.
pub fn task_completion(
    unit: &Unit<TaskHandle, TaskResult>,
) -> Result<Unit<TaskResult, TaskResult>, ConfigError> {
    let starter = unit.clone();
    let releaser = unit.clone();

    unit.context()
        .unit(format!("taskCompletion({})", unit.name()))
        .with_timeout(unit.timeout())
        .build_raw(
            Arc::new(move || match starter.start() {
                Value::Ready(handle) => Value::Pending(handle.completion),
                Value::Pending(handle) => Value::pending(async move { handle.await.join().await }),
            }),
            Some(Arc::new(move |_: Value<TaskResult>, forced: bool| {
                releaser.stop_with(forced).into_value()
            })),
        )
}

/// Executes one run of `task`, publishing its terminal event to `bus`.
///
/// Exactly one of `TaskStopped`/`TaskFailed` is published per run; `Canceled` counts
/// as a graceful stop. A deadline hit also publishes `TaskTimeout` first.
pub(crate) async fn run_once<T: Task + ?Sized>(
    task: &T,
    token: &CancellationToken,
    deadline: Option<Duration>,
    bus: &Bus,
) -> TaskResult {
    let res = if let Some(dur) = deadline.filter(|d| *d > Duration::ZERO) {
        match time::timeout(dur, task.run(token.clone())).await {
            Ok(r) => r,
            Err(_elapsed) => {
                token.cancel();
                bus.publish(
                    Event::new(EventKind::TaskTimeout)
                        .with_unit(task.name())
                        .with_delay(dur),
                );
                Err(TaskError::Timeout { timeout: dur })
            }
        }
    } else {
        task.run(token.clone()).await
    };

    match &res {
        Ok(()) => publish_stopped(bus, task.name(), "ok"),
        Err(TaskError::Canceled) => publish_stopped(bus, task.name(), "canceled"),
        Err(e) => {
            tracing::debug!(target: "progkit", task = task.name(), error = %e, "task failed");
            bus.publish(
                Event::new(EventKind::TaskFailed)
                    .with_unit(task.name())
                    .with_reason(e.as_message()),
            );
        }
    }
    res
}

fn publish_stopped(bus: &Bus, name: &str, reason: &'static str) {
    bus.publish(
        Event::new(EventKind::TaskStopped)
            .with_unit(name)
            .with_reason(reason),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::policies::UnitState;
    use crate::tasks::{TaskFn, TaskRef};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn until_cancelled(runs: Arc<AtomicUsize>) -> TaskRef {
        TaskFn::arc("poll", move |token: CancellationToken| {
            runs.fetch_add(1, Ordering::SeqCst);
            async move {
                token.cancelled().await;
                Err(TaskError::Canceled)
            }
        })
    }

    #[tokio::test]
    async fn stop_cancels_the_task() {
        let ctx = Context::new(Config::development());
        let runs = Arc::new(AtomicUsize::new(0));
        let unit = run_task(&ctx, until_cancelled(runs.clone())).unwrap();
        assert_eq!(unit.name(), "task(poll)");

        let handle = unit.start().resolve().await;
        unit.start();
        // let the spawned run get polled
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!handle.is_cancelled());

        assert!(unit.stop().is_retained());
        let result = unit.stop().settle().await;
        assert_eq!(result, Some(Err(TaskError::Canceled)));
        assert!(handle.is_cancelled());
        assert_eq!(unit.state(), UnitState::Dormant);
    }

    #[tokio::test]
    async fn completion_unit_exposes_the_result() {
        let ctx = Context::new(Config::development());
        let task: TaskRef = TaskFn::arc("once", |_t: CancellationToken| async {
            Err(TaskError::Fail {
                error: "boom".into(),
            })
        });
        let unit = run_task(&ctx, task).unwrap();
        let done = task_completion(&unit).unwrap();
        assert_eq!(done.name(), "taskCompletion(task(once))");

        let mut events = ctx.subscribe();
        let result = done.start().resolve().await;
        assert_eq!(result.unwrap_err().as_label(), "task_failed");
        assert_eq!(unit.ref_count(), 1);

        let failed = loop {
            let ev = events.recv().await.unwrap();
            if ev.kind == EventKind::TaskFailed {
                break ev;
            }
        };
        assert_eq!(failed.reason.as_deref(), Some("error: boom"));

        done.stop();
        assert_eq!(unit.state(), UnitState::Dormant);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_the_run() {
        let ctx = Context::new(Config::development());
        let runs = Arc::new(AtomicUsize::new(0));
        let spec = TaskSpec::new(until_cancelled(runs)).with_deadline(Duration::from_millis(30));
        let unit = run_task(&ctx, spec).unwrap();

        let handle = unit.start().resolve().await;
        assert_eq!(
            handle.join().await,
            Err(TaskError::Timeout {
                timeout: Duration::from_millis(30)
            })
        );
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_timeout_keeps_the_task_alive() {
        let ctx = Context::new(Config::development());
        let runs = Arc::new(AtomicUsize::new(0));
        let spec = TaskSpec::new(until_cancelled(runs.clone())).with_teardown(Duration::from_millis(50));
        let unit = run_task(&ctx, spec).unwrap();

        let handle = unit.start().resolve().await;
        let release = unit.stop();
        time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_cancelled());

        unit.start();
        assert_eq!(release.settle().await, None);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!handle.is_cancelled());
    }

    #[tokio::test]
    async fn context_shutdown_cancels_tasks() {
        let ctx = Context::new(Config::development());
        let runs = Arc::new(AtomicUsize::new(0));
        let unit = run_task(&ctx, until_cancelled(runs)).unwrap();

        let handle = unit.start().resolve().await;
        ctx.shutdown().await;
        assert!(handle.is_cancelled());
        assert_eq!(handle.join().await, Err(TaskError::Canceled));
    }
}
