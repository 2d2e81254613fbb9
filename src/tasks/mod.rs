//! # Task-runner collaborator.
//!
//! - [`Task`]: trait for async cancelable jobs
//! - [`TaskFn`]: closure-backed implementation
//! - [`TaskRef`]: shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskSpec`]: task plus unit timeout and per-run deadline
//! - [`run_task`] / [`task_completion`]: units that run a task and expose its result

mod runner;
mod spec;
mod task;
mod task_fn;

pub use runner::{TaskHandle, TaskResult, run_task, task_completion};
pub use spec::TaskSpec;
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
