//! # Location Refresh
//!
//! Background refresh of cached locations from the external data source.
//!
//! Tasks are queued by priority tier (critical, then normal, then
//! background) and FIFO within a tier. At most `max_concurrent` tasks run at
//! once. A failed attempt is requeued after the tier's backoff delay until
//! its retries are exhausted, then the task is marked failed. Successful
//! fetches are written to the cache under `location:{id}`.

pub mod config;
pub mod scheduler;
pub mod source;
pub mod task;

pub use config::SchedulerConfig;
pub use scheduler::{RefreshScheduler, RefreshStats};
pub use source::LocationSource;
pub use task::{RefreshPriority, RefreshStatus, RefreshTarget, RefreshTask};
