//! Scheduler errors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a worker instead of a result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct WorkerFailure {
    pub message: String,
}

impl WorkerFailure {
    /// Create a new failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Scheduler errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Task submitted to a category without a configured pool.
    #[error("Unknown task category: {0}")]
    UnknownCategory(String),

    /// A configured pool has no worker implementation.
    #[error("No worker registered for category: {0}")]
    MissingWorker(String),

    /// A configured pool has zero slots.
    #[error("Pool for category '{0}' has no workers")]
    EmptyPool(String),

    /// The configuration could not be parsed.
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    /// The worker reported a failure.
    #[error("Worker failed: {0}")]
    WorkerFailed(#[from] WorkerFailure),

    /// No result arrived within the task timeout.
    #[error("No result within {0:?}")]
    Timeout(Duration),

    /// The worker's result does not have the expected shape.
    #[error("Invalid worker result: {0}")]
    InvalidResult(#[from] serde_json::Error),

    /// The scheduler has shut down.
    #[error("Scheduler is shut down")]
    Closed,
}
