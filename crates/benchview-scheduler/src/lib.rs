//! BenchView Task Scheduler
//!
//! Runs categorised units of background computation on bounded worker
//! pools without blocking the caller. Tasks are admitted in FIFO order per
//! category; each admitted task gets a transaction id that correlates the
//! worker's answer with the waiting caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use benchview_scheduler::{default_workers, Scheduler, SchedulerConfig};
//!
//! async fn mean_of(values: Vec<Option<f64>>) -> Result<Option<f64>, Box<dyn std::error::Error>> {
//!     let scheduler = Scheduler::start(SchedulerConfig::default(), default_workers())?;
//!     let stats = scheduler.compute_stats(values)?.stats().await?;
//!     scheduler.shutdown().await;
//!     Ok(stats.avg)
//! }
//! ```

mod config;
mod error;
mod protocol;
mod scheduler;
mod worker;

pub use config::{PoolConfig, SchedulerConfig, DEFAULT_STATS_WORKERS, STATS_CATEGORY};
pub use error::{SchedulerError, WorkerFailure};
pub use protocol::{TaskMessage, WorkerRequest, WorkerResponse};
pub use scheduler::{current_slot, Scheduler, SchedulerSnapshot, TaskHandle};
pub use worker::{default_workers, StatsRequest, StatsWorker, Worker};
