//! Messages exchanged between callers, the dispatcher and worker slots.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use benchview_core::TransactionId;

use crate::WorkerFailure;

/// A unit of work as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    /// Name of a pool configured at startup.
    pub category: String,

    /// Opaque payload handed to the worker.
    pub data: Value,
}

impl TaskMessage {
    /// Create a new TaskMessage.
    pub fn new(category: impl Into<String>, data: Value) -> Self {
        Self {
            category: category.into(),
            data,
        }
    }
}

/// Work handed to one worker slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub transaction: TransactionId,
    pub data: Value,
}

/// A worker's answer; `transaction` is echoed from the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub transaction: TransactionId,
    pub result: Result<Value, WorkerFailure>,
}
