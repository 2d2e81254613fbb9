//! Error types used by progkit units and task runners.
//!
//! This module defines two error enums:
//!
//! - [`ConfigError`]: raised while *constructing* units (bad or conflicting names).
//! - [`TaskError`]: outcomes of externally spawned tasks (see [`run_task`](crate::run_task)).
//!
//! Lifecycle mechanics (refcount drift, race-aborted chains, aborted teardowns) are
//! never errors: they are reported as [`Event`](crate::Event)s and `tracing` diagnostics.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced while building units.
///
/// Only raised when [`Config::validates_names`](crate::Config::validates_names) is on,
/// i.e. outside production configurations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A unit was constructed without a name.
    ///
    /// Names are required for diagnostics and for name-based deduplication.
    #[error("unit must have a name (derived from: {parent:?})")]
    MissingName {
        /// Name of the parent unit when the unit was derived by a combinator.
        parent: Option<String>,
    },

    /// A unit with the same name but different output/exit types is already cached.
    #[error("unit name {name:?} is already taken by a unit of another type")]
    NameConflict {
        /// The conflicting name.
        name: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use progkit::ConfigError;
    ///
    /// let err = ConfigError::MissingName { parent: None };
    /// assert_eq!(err.as_label(), "config_missing_name");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::MissingName { .. } => "config_missing_name",
            ConfigError::NameConflict { .. } => "config_name_conflict",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ConfigError::MissingName { parent: Some(p) } => {
                format!("missing name for unit derived from {p}")
            }
            ConfigError::MissingName { parent: None } => "missing unit name".to_string(),
            ConfigError::NameConflict { name } => format!("name conflict: {name}"),
        }
    }
}

/// # Errors produced by task execution.
///
/// Outcomes of tasks started through [`run_task`](crate::run_task). The type is
/// `Clone` so that a single completion can be observed by every consumer of the unit.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task execution exceeded its timeout duration.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable fatal error.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task was cancelled because its unit was stopped.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use progkit::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TaskError::Fatal { error } => format!("fatal: {error}"),
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Returns `true` when the task ended because its unit was stopped.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            ConfigError::NameConflict { name: "x".into() }.as_label(),
            "config_name_conflict"
        );
        assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
        assert_eq!(
            TaskError::Fail { error: "boom".into() }.as_label(),
            "task_failed"
        );
    }

    #[test]
    fn messages_carry_details() {
        let err = ConfigError::MissingName {
            parent: Some("fetch".into()),
        };
        assert_eq!(err.as_message(), "missing name for unit derived from fetch");
        assert_eq!(
            TaskError::Fatal { error: "nope".into() }.to_string(),
            "fatal error: nope"
        );
        assert!(TaskError::Canceled.is_canceled());
    }
}
