use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Priority tier of a refresh task. Lower tiers are dequeued first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPriority {
    /// User-triggered, preempts everything else
    Critical,
    #[default]
    Normal,
    /// Periodic sweeps
    Background,
}

impl RefreshPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshPriority::Critical => "critical",
            RefreshPriority::Normal => "normal",
            RefreshPriority::Background => "background",
        }
    }
}

impl fmt::Display for RefreshPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl RefreshStatus {
    /// Completed and failed tasks never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, RefreshStatus::Completed | RefreshStatus::Failed)
    }
}

/// What a refresh task fetches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "ids", rename_all = "snake_case")]
pub enum RefreshTarget {
    /// One location
    Location(String),
    /// Several locations, fetched one after another in a single task slot
    Locations(Vec<String>),
    /// Every location, in one collection fetch
    All,
}

impl RefreshTarget {
    /// True if this is a single-location task for `location_id`
    pub fn targets(&self, location_id: &str) -> bool {
        matches!(self, RefreshTarget::Location(id) if id == location_id)
    }
}

impl fmt::Display for RefreshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshTarget::Location(id) => write!(f, "location {}", id),
            RefreshTarget::Locations(ids) => write!(f, "{} locations", ids.len()),
            RefreshTarget::All => write!(f, "all locations"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTask {
    pub id: String,
    pub target: RefreshTarget,
    pub priority: RefreshPriority,
    pub status: RefreshStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Failed attempts so far
    pub retry_count: u32,
    /// Requeues allowed before the task is marked failed
    pub max_retries: u32,
    pub last_error: Option<String>,
}

impl RefreshTask {
    pub fn new(target: RefreshTarget, priority: RefreshPriority, max_retries: u32) -> Self {
        Self {
            id: format!("refresh-{}", Uuid::new_v4().simple()),
            target,
            priority,
            status: RefreshStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries,
            last_error: None,
        }
    }

    pub fn start(&mut self) {
        self.status = RefreshStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = RefreshStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Record a failed attempt. Returns true if the task may be requeued.
    pub fn record_failure(&mut self, error: impl Into<String>) -> bool {
        self.retry_count += 1;
        self.last_error = Some(error.into());

        if self.retry_count <= self.max_retries {
            self.status = RefreshStatus::Pending;
            true
        } else {
            self.status = RefreshStatus::Failed;
            self.completed_at = Some(Utc::now());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(RefreshPriority::Critical < RefreshPriority::Normal);
        assert!(RefreshPriority::Normal < RefreshPriority::Background);
        assert_eq!(RefreshPriority::default(), RefreshPriority::Normal);
    }

    #[test]
    fn test_task_lifecycle() {
        let mut task = RefreshTask::new(
            RefreshTarget::Location("loc-1".to_string()),
            RefreshPriority::Normal,
            3,
        );
        assert!(task.id.starts_with("refresh-"));
        assert_eq!(task.status, RefreshStatus::Pending);

        task.start();
        assert_eq!(task.status, RefreshStatus::InProgress);
        assert!(task.started_at.is_some());

        task.complete();
        assert!(task.status.is_terminal());
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_record_failure_exhausts_retries() {
        let mut task = RefreshTask::new(RefreshTarget::All, RefreshPriority::Background, 3);

        for _ in 0..3 {
            assert!(task.record_failure("boom"));
            assert_eq!(task.status, RefreshStatus::Pending);
        }

        assert!(!task.record_failure("boom"));
        assert_eq!(task.status, RefreshStatus::Failed);
        assert_eq!(task.retry_count, 4);
        assert_eq!(task.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_target_matching() {
        let target = RefreshTarget::Location("loc-1".to_string());
        assert!(target.targets("loc-1"));
        assert!(!target.targets("loc-2"));
        assert!(!RefreshTarget::Locations(vec!["loc-1".to_string()]).targets("loc-1"));
        assert_eq!(RefreshTarget::All.to_string(), "all locations");
    }
}
