//! Configuration for the refresh scheduler

use super::task::RefreshPriority;
use crate::error::{LocationError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum tasks in flight at once
    pub max_concurrent: usize,

    /// Backoff before requeue, indexed by attempt; length is the retry limit
    pub critical_retry_delays: Vec<Duration>,
    pub normal_retry_delays: Vec<Duration>,
    pub background_retry_delays: Vec<Duration>,

    /// Used when an attempt has no entry in its tier's table
    pub fallback_retry_delay: Duration,

    /// Drain the queue whenever a task is enqueued or finishes.
    /// When false, callers drive the queue with `process_queue`.
    pub auto_process: bool,

    /// Interval of the periodic background refresh-all
    pub periodic_interval: Duration,

    /// TTL for records written by the scheduler; `None` uses the cache default
    pub cache_ttl: Option<Duration>,

    /// Completed and failed tasks kept for inspection; older ones are retired
    pub finished_task_retention: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            critical_retry_delays: secs(&[1, 2, 5]),
            normal_retry_delays: secs(&[2, 5, 10]),
            background_retry_delays: secs(&[5, 15, 30]),
            fallback_retry_delay: Duration::from_secs(30),
            auto_process: true,
            periodic_interval: Duration::from_secs(15 * 60),
            cache_ttl: None,
            finished_task_retention: 100,
        }
    }
}

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_secs).collect()
}

impl SchedulerConfig {
    /// Same delay table for every tier
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.critical_retry_delays = delays.clone();
        self.normal_retry_delays = delays.clone();
        self.background_retry_delays = delays;
        self
    }

    pub fn retry_delays(&self, priority: RefreshPriority) -> &[Duration] {
        match priority {
            RefreshPriority::Critical => &self.critical_retry_delays,
            RefreshPriority::Normal => &self.normal_retry_delays,
            RefreshPriority::Background => &self.background_retry_delays,
        }
    }

    /// Requeues allowed for a tier
    pub fn max_retries(&self, priority: RefreshPriority) -> u32 {
        self.retry_delays(priority).len() as u32
    }

    /// Delay before the requeue following failed attempt number `attempt` (1-based)
    pub fn retry_delay(&self, priority: RefreshPriority, attempt: u32) -> Duration {
        (attempt as usize)
            .checked_sub(1)
            .and_then(|index| self.retry_delays(priority).get(index))
            .copied()
            .unwrap_or(self.fallback_retry_delay)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(LocationError::ConfigError(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }

        if self.periodic_interval.is_zero() {
            return Err(LocationError::ConfigError(
                "periodic_interval must be greater than 0".to_string(),
            ));
        }

        if self.finished_task_retention == 0 {
            return Err(LocationError::ConfigError(
                "finished_task_retention must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
