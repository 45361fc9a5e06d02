//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SchedulerError;

/// Category of the built-in statistics worker.
pub const STATS_CATEGORY: &str = "stats";

/// Default pool size of the statistics category.
pub const DEFAULT_STATS_WORKERS: usize = 8;

const DEFAULT_TASK_TIMEOUT_MS: u64 = 60_000;

/// One worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Category name tasks are submitted under.
    pub category: String,

    /// Number of parallel worker slots.
    pub workers: usize,
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Worker pools, one per category.
    #[serde(default)]
    pub pools: Vec<PoolConfig>,

    /// How long a caller waits for a result before giving up.
    /// `None` waits forever.
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: Option<u64>,
}

fn default_task_timeout_ms() -> Option<u64> {
    Some(DEFAULT_TASK_TIMEOUT_MS)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pools: vec![PoolConfig {
                category: STATS_CATEGORY.to_string(),
                workers: DEFAULT_STATS_WORKERS,
            }],
            task_timeout_ms: default_task_timeout_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Configuration without any pool.
    pub fn empty() -> Self {
        Self {
            pools: Vec::new(),
            task_timeout_ms: default_task_timeout_ms(),
        }
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, SchedulerError> {
        serde_json::from_str(json).map_err(|e| SchedulerError::InvalidConfig(e.to_string()))
    }

    /// Builder method to add or resize a pool.
    pub fn with_pool(mut self, category: impl Into<String>, workers: usize) -> Self {
        let category = category.into();
        match self.pools.iter_mut().find(|p| p.category == category) {
            Some(pool) => pool.workers = workers,
            None => self.pools.push(PoolConfig { category, workers }),
        }
        self
    }

    /// Builder method to set the task timeout.
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// The task timeout as a duration.
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_stats_pool() {
        let config = SchedulerConfig::default();
        assert_eq!(config.pools.len(), 1);
        assert_eq!(config.pools[0].category, STATS_CATEGORY);
        assert_eq!(config.pools[0].workers, 8);
        assert_eq!(config.task_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_with_pool_resizes_existing() {
        let config = SchedulerConfig::default()
            .with_pool(STATS_CATEGORY, 2)
            .with_pool("render", 1)
            .with_task_timeout(None);
        assert_eq!(config.pools[0].workers, 2);
        assert_eq!(config.pools[1].category, "render");
        assert!(config.task_timeout().is_none());
    }

    #[test]
    fn test_from_json() {
        let config =
            SchedulerConfig::from_json(r#"{"pools": [{"category": "stats", "workers": 4}]}"#)
                .unwrap();
        assert_eq!(config.pools[0].workers, 4);
        assert_eq!(config.task_timeout_ms, Some(60_000));

        let config = SchedulerConfig::from_json(r#"{"task_timeout_ms": null}"#).unwrap();
        assert!(config.pools.is_empty());
        assert!(config.task_timeout().is_none());

        assert!(matches!(
            SchedulerConfig::from_json("{\"pools\": 3}"),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }
}
