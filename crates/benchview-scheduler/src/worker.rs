//! Worker implementations run by the pool slots.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use benchview_core::StatValue;

use crate::{WorkerFailure, STATS_CATEGORY};

/// A background computation for one task category.
///
/// Each slot of a pool calls `run` for one task at a time; different slots
/// call it concurrently.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Compute the result for one task payload.
    async fn run(&self, data: Value) -> Result<Value, WorkerFailure>;
}

/// Payload of a `stats` task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRequest {
    pub values: Vec<Option<f64>>,
}

/// Computes [`StatValue`]s on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsWorker;

#[async_trait]
impl Worker for StatsWorker {
    async fn run(&self, data: Value) -> Result<Value, WorkerFailure> {
        let request: StatsRequest = serde_json::from_value(data)
            .map_err(|e| WorkerFailure::new(format!("Invalid stats request: {e}")))?;
        trace!(values = request.values.len(), "Computing statistics");

        let stats = tokio::task::spawn_blocking(move || StatValue::from_values(&request.values))
            .await
            .map_err(|e| WorkerFailure::new(format!("Statistics computation aborted: {e}")))?;

        serde_json::to_value(stats).map_err(|e| WorkerFailure::new(e.to_string()))
    }
}

/// Workers for the categories of the default configuration.
pub fn default_workers() -> HashMap<String, Arc<dyn Worker>> {
    let mut workers: HashMap<String, Arc<dyn Worker>> = HashMap::new();
    workers.insert(STATS_CATEGORY.to_string(), Arc::new(StatsWorker));
    workers
}
