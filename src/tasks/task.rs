//! # Task abstraction.
//!
//! A [`Task`] is an external long-running job that a unit starts and cancels.
//! It receives a [`CancellationToken`] that is cancelled when the owning unit is
//! torn down and should stop cooperatively once it fires.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancelable job.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use progkit::{Task, TaskError};
///
/// struct Poller;
///
/// #[async_trait]
/// impl Task for Poller {
///     fn name(&self) -> &str { "poller" }
///
///     async fn run(&self, token: CancellationToken) -> Result<(), TaskError> {
///         token.cancelled().await;
///         Err(TaskError::Canceled)
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Executes the task until completion or cancellation.
    ///
    /// Return `Err(TaskError::Canceled)` (or `Ok(())`) after observing cancellation.
    async fn run(&self, token: CancellationToken) -> Result<(), TaskError>;
}
