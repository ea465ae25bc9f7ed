//! Priority-ordered refresh queue with bounded concurrency and backoff

use super::{
    config::SchedulerConfig,
    source::LocationSource,
    task::{RefreshPriority, RefreshStatus, RefreshTarget, RefreshTask},
};
use crate::cache::{keys::location_key, LocationCache, SetOptions};
use crate::location::Location;
use crate::validation::LocationValidator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshStats {
    /// Tasks that reached a terminal state
    pub total_refreshes: u64,
    pub successful_refreshes: u64,
    pub failed_refreshes: u64,
    /// Running average over successful tasks
    pub avg_refresh_time_ms: f64,
    pub active_refreshes: usize,
    pub queued_refreshes: usize,
    /// Finished tasks still available through `task`
    pub retained_finished: usize,
}

/// Refreshes cached locations from a [`LocationSource`].
///
/// Cloning is cheap and every clone drives the same queue. Enqueue
/// operations spawn onto the current Tokio runtime when `auto_process`
/// is enabled, so they must be called from within one.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    config: SchedulerConfig,
    source: Arc<dyn LocationSource>,
    cache: Arc<LocationCache<Location>>,
    validator: Option<Arc<LocationValidator>>,
    state: Mutex<SchedulerState>,
    /// Signalled whenever a task finishes an attempt or is cancelled
    finished: Notify,
}

#[derive(Default)]
struct SchedulerState {
    tasks: HashMap<String, RefreshTask>,
    queue: VecDeque<String>,
    active: usize,
    successful: u64,
    failed: u64,
    avg_refresh_ms: f64,
}

impl SchedulerState {
    /// Insert before the first queued task of a lower tier
    fn enqueue(&mut self, task_id: String, priority: RefreshPriority) {
        let position = self
            .queue
            .iter()
            .position(|queued| {
                self.tasks
                    .get(queued)
                    .is_some_and(|task| task.priority > priority)
            })
            .unwrap_or(self.queue.len());

        self.queue.insert(position, task_id);
    }

    /// Drop the oldest finished tasks beyond `keep`; returns how many went
    fn retire_finished(&mut self, keep: usize) -> usize {
        let mut finished: Vec<(DateTime<Utc>, String)> = self
            .tasks
            .values()
            .filter(|task| task.status.is_terminal())
            .map(|task| (task.completed_at.unwrap_or(task.created_at), task.id.clone()))
            .collect();

        let excess = finished.len().saturating_sub(keep);
        if excess == 0 {
            return 0;
        }

        finished.sort();
        for (_, task_id) in finished.into_iter().take(excess) {
            self.tasks.remove(&task_id);
        }
        excess
    }

    fn record_duration(&mut self, elapsed_ms: f64) {
        if self.successful == 1 {
            self.avg_refresh_ms = elapsed_ms;
        } else {
            self.avg_refresh_ms = (self.avg_refresh_ms * (self.successful - 1) as f64
                + elapsed_ms)
                / self.successful as f64;
        }
    }
}

impl RefreshScheduler {
    pub fn new(
        config: SchedulerConfig,
        source: Arc<dyn LocationSource>,
        cache: Arc<LocationCache<Location>>,
    ) -> Self {
        Self::build(config, source, cache, None)
    }

    /// Fetched records failing validation are skipped instead of cached
    pub fn with_validator(
        config: SchedulerConfig,
        source: Arc<dyn LocationSource>,
        cache: Arc<LocationCache<Location>>,
        validator: Arc<LocationValidator>,
    ) -> Self {
        Self::build(config, source, cache, Some(validator))
    }

    fn build(
        config: SchedulerConfig,
        source: Arc<dyn LocationSource>,
        cache: Arc<LocationCache<Location>>,
        validator: Option<Arc<LocationValidator>>,
    ) -> Self {
        info!(
            "Initializing refresh scheduler (max concurrent: {}, auto process: {})",
            config.max_concurrent, config.auto_process
        );

        Self {
            inner: Arc::new(SchedulerInner {
                config,
                source,
                cache,
                validator,
                state: Mutex::new(SchedulerState::default()),
                finished: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Refresh a single location
    pub fn refresh_location(&self, location_id: impl Into<String>, priority: RefreshPriority) -> String {
        self.enqueue(RefreshTarget::Location(location_id.into()), priority)
    }

    /// Refresh several locations in one task slot, fetched sequentially
    pub fn refresh_locations(&self, location_ids: Vec<String>, priority: RefreshPriority) -> String {
        self.enqueue(RefreshTarget::Locations(location_ids), priority)
    }

    /// Refresh every location with one collection fetch
    pub fn refresh_all_locations(&self, priority: RefreshPriority) -> String {
        self.enqueue(RefreshTarget::All, priority)
    }

    /// Cancel pending tasks for the location, then enqueue it as critical.
    ///
    /// Tasks already in progress are left to finish.
    pub fn force_refresh(&self, location_id: impl Into<String>) -> String {
        let location_id = location_id.into();

        let cancelled = self.cancel_location_tasks(&location_id);
        if cancelled > 0 {
            info!(
                "Cancelled {} pending refresh tasks for location {}",
                cancelled, location_id
            );
            self.inner.finished.notify_waiters();
        }

        self.refresh_location(location_id, RefreshPriority::Critical)
    }

    /// One normal-priority batch task; `None` when there is nothing to refresh
    pub fn prefresh_popular(&self, location_ids: &[String]) -> Option<String> {
        if location_ids.is_empty() {
            return None;
        }
        Some(self.refresh_locations(location_ids.to_vec(), RefreshPriority::Normal))
    }

    /// Force-refresh each location; returns the new task ids
    pub fn emergency_refresh(&self, location_ids: &[String]) -> Vec<String> {
        warn!("Emergency refresh requested for {} locations", location_ids.len());

        location_ids
            .iter()
            .map(|location_id| self.force_refresh(location_id.clone()))
            .collect()
    }

    /// Enqueue a background refresh of all locations every `periodic_interval`.
    /// Abort the handle to stop.
    pub fn schedule_periodic_refresh(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        let interval = self.inner.config.periodic_interval;

        info!("Scheduling periodic location refresh every {:?}", interval);

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                scheduler.refresh_all_locations(RefreshPriority::Background);
            }
        })
    }

    pub fn get_stats(&self) -> RefreshStats {
        let state = self.state();

        RefreshStats {
            total_refreshes: state.successful + state.failed,
            successful_refreshes: state.successful,
            failed_refreshes: state.failed,
            avg_refresh_time_ms: state.avg_refresh_ms,
            active_refreshes: state.active,
            queued_refreshes: state.queue.len(),
            retained_finished: state
                .tasks
                .values()
                .filter(|task| task.status.is_terminal())
                .count(),
        }
    }

    /// Snapshot of a task
    pub fn task(&self, task_id: &str) -> Option<RefreshTask> {
        self.state().tasks.get(task_id).cloned()
    }

    /// Wait until the task completes or fails.
    ///
    /// Returns `None` if the task is unknown, or was cancelled or pruned
    /// while waiting.
    pub async fn wait_for_task(&self, task_id: &str) -> Option<RefreshTask> {
        loop {
            let notified = self.inner.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.state();
                match state.tasks.get(task_id) {
                    None => return None,
                    Some(task) if task.status.is_terminal() => return Some(task.clone()),
                    Some(_) => {}
                }
            }

            notified.await;
        }
    }

    /// Drop completed and failed tasks; returns how many were removed.
    ///
    /// Finished tasks beyond `finished_task_retention` are retired on their
    /// own; this clears the rest.
    pub fn prune_finished(&self) -> usize {
        let mut state = self.state();

        let before = state.tasks.len();
        state.tasks.retain(|_, task| !task.status.is_terminal());
        let pruned = before - state.tasks.len();

        debug!("Pruned {} finished refresh tasks", pruned);
        pruned
    }

    /// Start queued tasks from the head while below the concurrency budget
    pub fn process_queue(&self) {
        let mut state = self.state();

        while state.active < self.inner.config.max_concurrent {
            let Some(task_id) = state.queue.pop_front() else {
                break;
            };
            let Some(task) = state.tasks.get_mut(&task_id) else {
                continue;
            };

            task.start();
            let snapshot = task.clone();
            state.active += 1;

            debug!(
                "Starting refresh task {} ({}, {})",
                snapshot.id, snapshot.target, snapshot.priority
            );

            let scheduler = self.clone();
            tokio::spawn(async move { scheduler.execute(snapshot).await });
        }
    }

    fn enqueue(&self, target: RefreshTarget, priority: RefreshPriority) -> String {
        let task = RefreshTask::new(target, priority, self.inner.config.max_retries(priority));
        let task_id = task.id.clone();

        info!(
            "Refresh task created: {} ({}, priority {})",
            task_id, task.target, priority
        );

        {
            let mut state = self.state();
            state.tasks.insert(task_id.clone(), task);
            state.enqueue(task_id.clone(), priority);
        }

        if self.inner.config.auto_process {
            self.process_queue();
        }

        task_id
    }

    /// Remove pending single-location tasks for `location_id`, queued or backing off
    fn cancel_location_tasks(&self, location_id: &str) -> usize {
        let mut state = self.state();

        let cancelled: Vec<String> = state
            .tasks
            .values()
            .filter(|task| task.status == RefreshStatus::Pending && task.target.targets(location_id))
            .map(|task| task.id.clone())
            .collect();

        for task_id in &cancelled {
            state.tasks.remove(task_id);
        }
        state.queue.retain(|queued| !cancelled.contains(queued));

        cancelled.len()
    }

    /// Put a task back on the queue after its backoff; cancelled tasks are skipped
    fn requeue(&self, task_id: String) {
        {
            let mut state = self.state();
            let Some(priority) = state
                .tasks
                .get(&task_id)
                .filter(|task| task.status == RefreshStatus::Pending)
                .map(|task| task.priority)
            else {
                debug!("Skipping requeue of cancelled refresh task {}", task_id);
                return;
            };
            state.enqueue(task_id, priority);
        }

        if self.inner.config.auto_process {
            self.process_queue();
        }
    }

    async fn execute(self, task: RefreshTask) {
        let started = Instant::now();
        let outcome = self.run_target(&task.target).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        {
            let mut state = self.state();
            state.active = state.active.saturating_sub(1);

            match outcome {
                Ok(written) => {
                    if let Some(entry) = state.tasks.get_mut(&task.id) {
                        entry.complete();
                    }
                    state.successful += 1;
                    state.record_duration(elapsed_ms);

                    info!(
                        "Refresh task {} completed in {:.1}ms ({} records cached)",
                        task.id, elapsed_ms, written
                    );
                }
                Err(e) => self.handle_failure(&mut state, &task.id, format!("{:#}", e)),
            }

            let retired = state.retire_finished(self.inner.config.finished_task_retention);
            if retired > 0 {
                debug!("Retired {} finished refresh tasks", retired);
            }
        }

        self.inner.finished.notify_waiters();

        if self.inner.config.auto_process {
            self.process_queue();
        }
    }

    fn handle_failure(&self, state: &mut SchedulerState, task_id: &str, message: String) {
        let Some(task) = state.tasks.get_mut(task_id) else {
            return;
        };

        if task.record_failure(message.clone()) {
            let delay = self
                .inner
                .config
                .retry_delay(task.priority, task.retry_count);

            warn!(
                "Refresh task {} failed (attempt {}/{}), retrying after {:?}: {}",
                task_id,
                task.retry_count,
                task.max_retries + 1,
                delay,
                message
            );

            let scheduler = self.clone();
            let task_id = task_id.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                scheduler.requeue(task_id);
            });
        } else {
            error!(
                "Refresh task {} failed permanently after {} attempts: {}",
                task_id, task.retry_count, message
            );
            state.failed += 1;
        }
    }

    /// Fetch the target and cache accepted records; returns how many were cached
    async fn run_target(&self, target: &RefreshTarget) -> anyhow::Result<usize> {
        let source = &self.inner.source;

        match target {
            RefreshTarget::Location(location_id) => {
                let location = source.fetch_location(location_id).await?;
                Ok(usize::from(self.store(location).await))
            }
            RefreshTarget::Locations(location_ids) => {
                let mut written = 0;
                for location_id in location_ids {
                    let location = source.fetch_location(location_id).await?;
                    written += usize::from(self.store(location).await);
                }
                Ok(written)
            }
            RefreshTarget::All => {
                let locations = source.fetch_all_locations().await?;
                let mut written = 0;
                for location in locations {
                    written += usize::from(self.store(location).await);
                }
                Ok(written)
            }
        }
    }

    async fn store(&self, location: Location) -> bool {
        if let Some(validator) = &self.inner.validator {
            let result = validator.validate_location(&location);
            if !result.is_valid {
                warn!(
                    "Skipping invalid location {} ({} validation errors)",
                    location.id,
                    result.errors.len()
                );
                return false;
            }
        }

        let options = SetOptions {
            ttl: self.inner.config.cache_ttl,
            priority: None,
        };
        self.inner
            .cache
            .set(location_key(&location.id), location, options)
            .await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct MockSource {
        calls: Mutex<Vec<String>>,
        failures_left: AtomicU32,
    }

    impl MockSource {
        fn new() -> Arc<Self> {
            Self::failing(0)
        }

        fn failing(times: u32) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                failures_left: AtomicU32::new(times),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(call.to_string());
            let should_fail = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if should_fail {
                anyhow::bail!("network request failed");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LocationSource for MockSource {
        async fn fetch_location(&self, id: &str) -> anyhow::Result<Location> {
            self.record(id)?;
            Ok(Location::new(id))
        }

        async fn fetch_all_locations(&self) -> anyhow::Result<Vec<Location>> {
            self.record("*")?;
            Ok(vec![Location::new("a"), Location::new("b")])
        }
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig::default().with_retry_delays(vec![Duration::from_millis(5); 3])
    }

    fn scheduler(config: SchedulerConfig, source: Arc<MockSource>) -> RefreshScheduler {
        let cache = Arc::new(LocationCache::new(CacheConfig::default()));
        RefreshScheduler::new(config, source, cache)
    }

    async fn wait(scheduler: &RefreshScheduler, task_id: &str) -> RefreshTask {
        tokio::time::timeout(Duration::from_secs(5), scheduler.wait_for_task(task_id))
            .await
            .expect("task did not finish in time")
            .expect("task disappeared")
    }

    #[tokio::test]
    async fn test_critical_starts_before_background() {
        let source = MockSource::new();
        let config = SchedulerConfig {
            max_concurrent: 1,
            auto_process: false,
            ..fast_config()
        };
        let scheduler = scheduler(config, source.clone());

        let background = scheduler.refresh_location("bg", RefreshPriority::Background);
        let critical = scheduler.refresh_location("crit", RefreshPriority::Critical);
        assert_eq!(scheduler.get_stats().queued_refreshes, 2);

        scheduler.process_queue();
        wait(&scheduler, &critical).await;
        scheduler.process_queue();
        wait(&scheduler, &background).await;

        assert_eq!(source.calls(), vec!["crit", "bg"]);
    }

    #[tokio::test]
    async fn test_fifo_within_tier() {
        let source = MockSource::new();
        let config = SchedulerConfig {
            max_concurrent: 1,
            auto_process: false,
            ..fast_config()
        };
        let scheduler = scheduler(config, source.clone());

        let ids: Vec<String> = ["n1", "n2", "n3"]
            .iter()
            .map(|id| scheduler.refresh_location(*id, RefreshPriority::Normal))
            .collect();

        for id in &ids {
            scheduler.process_queue();
            wait(&scheduler, id).await;
        }

        assert_eq!(source.calls(), vec!["n1", "n2", "n3"]);
    }

    #[tokio::test]
    async fn test_success_writes_cache() {
        let source = MockSource::new();
        let cache = Arc::new(LocationCache::new(CacheConfig::default()));
        let scheduler = RefreshScheduler::new(fast_config(), source, cache.clone());

        let task_id = scheduler.refresh_location("loc-1", RefreshPriority::Normal);
        let task = wait(&scheduler, &task_id).await;

        assert_eq!(task.status, RefreshStatus::Completed);
        assert!(cache.has("location:loc-1").await);

        let stats = scheduler.get_stats();
        assert_eq!(stats.successful_refreshes, 1);
        assert_eq!(stats.total_refreshes, 1);
        assert_eq!(stats.active_refreshes, 0);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let source = MockSource::failing(2);
        let scheduler = scheduler(fast_config(), source.clone());

        let task_id = scheduler.refresh_location("loc-1", RefreshPriority::Critical);
        let task = wait(&scheduler, &task_id).await;

        assert_eq!(task.status, RefreshStatus::Completed);
        assert_eq!(task.retry_count, 2);
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_always_failing_task_exhausts_retries() {
        let source = MockSource::failing(u32::MAX);
        let scheduler = scheduler(fast_config(), source.clone());

        let task_id = scheduler.refresh_location("loc-1", RefreshPriority::Normal);
        let task = wait(&scheduler, &task_id).await;

        assert_eq!(task.status, RefreshStatus::Failed);
        assert_eq!(task.retry_count, task.max_retries + 1);
        assert_eq!(source.calls().len(), 4);
        assert!(task.last_error.unwrap().contains("network request failed"));

        let stats = scheduler.get_stats();
        assert_eq!(stats.failed_refreshes, 1);
        assert_eq!(stats.successful_refreshes, 0);
    }

    #[tokio::test]
    async fn test_batch_fetches_sequentially_in_one_task() {
        let source = MockSource::new();
        let scheduler = scheduler(fast_config(), source.clone());

        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let task_id = scheduler.refresh_locations(ids, RefreshPriority::Normal);
        wait(&scheduler, &task_id).await;

        assert_eq!(source.calls(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.get_stats().successful_refreshes, 1);
    }

    #[tokio::test]
    async fn test_refresh_all_caches_every_record() {
        let source = MockSource::new();
        let cache = Arc::new(LocationCache::new(CacheConfig::default()));
        let scheduler = RefreshScheduler::new(fast_config(), source.clone(), cache.clone());

        let task_id = scheduler.refresh_all_locations(RefreshPriority::Background);
        wait(&scheduler, &task_id).await;

        assert_eq!(source.calls(), vec!["*"]);
        assert!(cache.has("location:a").await);
        assert!(cache.has("location:b").await);
    }

    #[tokio::test]
    async fn test_force_refresh_cancels_pending() {
        let source = MockSource::new();
        let config = SchedulerConfig {
            auto_process: false,
            ..fast_config()
        };
        let scheduler = scheduler(config, source.clone());

        let stale = scheduler.refresh_location("loc-1", RefreshPriority::Background);
        let other = scheduler.refresh_location("loc-2", RefreshPriority::Background);
        let forced = scheduler.force_refresh("loc-1");

        assert!(scheduler.task(&stale).is_none());
        assert!(scheduler.wait_for_task(&stale).await.is_none());
        assert_eq!(scheduler.get_stats().queued_refreshes, 2);

        let task = scheduler.task(&forced).unwrap();
        assert_eq!(task.priority, RefreshPriority::Critical);

        scheduler.process_queue();
        wait(&scheduler, &forced).await;
        wait(&scheduler, &other).await;
        assert_eq!(source.calls(), vec!["loc-1", "loc-2"]);
    }

    #[tokio::test]
    async fn test_prefresh_and_emergency_refresh() {
        let source = MockSource::new();
        let config = SchedulerConfig {
            auto_process: false,
            ..fast_config()
        };
        let scheduler = scheduler(config, source);

        assert!(scheduler.prefresh_popular(&[]).is_none());
        let batch = scheduler
            .prefresh_popular(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(
            scheduler.task(&batch).unwrap().priority,
            RefreshPriority::Normal
        );

        let ids = scheduler.emergency_refresh(&["x".to_string(), "y".to_string()]);
        assert_eq!(ids.len(), 2);
        for id in &ids {
            assert_eq!(
                scheduler.task(id).unwrap().priority,
                RefreshPriority::Critical
            );
        }
    }

    #[tokio::test]
    async fn test_prune_finished() {
        let source = MockSource::new();
        let scheduler = scheduler(fast_config(), source);

        let task_id = scheduler.refresh_location("loc-1", RefreshPriority::Normal);
        wait(&scheduler, &task_id).await;

        assert_eq!(scheduler.prune_finished(), 1);
        assert!(scheduler.task(&task_id).is_none());
    }

    #[tokio::test]
    async fn test_finished_tasks_are_retired_beyond_retention() {
        let source = MockSource::failing(4);
        let config = SchedulerConfig {
            max_concurrent: 1,
            finished_task_retention: 2,
            ..fast_config()
        };
        let scheduler = scheduler(config, source);

        // First task exhausts its retries and fails permanently
        let mut ids = vec![scheduler.refresh_location("loc-0", RefreshPriority::Normal)];
        let first = wait(&scheduler, &ids[0]).await;
        assert_eq!(first.status, RefreshStatus::Failed);

        for i in 1..5 {
            let task_id = scheduler.refresh_location(format!("loc-{}", i), RefreshPriority::Normal);
            wait(&scheduler, &task_id).await;
            ids.push(task_id);
        }

        let stats = scheduler.get_stats();
        assert_eq!(stats.total_refreshes, 5);
        assert_eq!(stats.retained_finished, 2);

        for task_id in &ids[..3] {
            assert!(scheduler.task(task_id).is_none());
        }
        for task_id in &ids[3..] {
            assert!(scheduler.task(task_id).is_some());
        }
    }
}
