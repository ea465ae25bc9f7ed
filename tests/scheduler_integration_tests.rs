//! Integration tests for the refresh scheduler
//!
//! Exercises the scheduler against an in-memory source:
//! - Concurrency bound under load
//! - Retry with backoff until the source recovers
//! - Validation gate in front of the cache
//! - Periodic background refresh

mod common;

use common::{valid_location, InMemorySource};
use location_reliability::{
    CacheConfig, Location, LocationCache, LocationValidator, RefreshPriority, RefreshScheduler,
    RefreshStatus, RefreshTask, SchedulerConfig,
};
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> SchedulerConfig {
    SchedulerConfig::default().with_retry_delays(vec![Duration::from_millis(10); 3])
}

fn location_cache() -> Arc<LocationCache<Location>> {
    Arc::new(LocationCache::new(CacheConfig::default()))
}

async fn wait(scheduler: &RefreshScheduler, task_id: &str) -> RefreshTask {
    tokio::time::timeout(Duration::from_secs(5), scheduler.wait_for_task(task_id))
        .await
        .expect("refresh did not finish in time")
        .expect("refresh task vanished")
}

#[tokio::test]
async fn test_concurrency_never_exceeds_budget() {
    let ids: Vec<String> = (0..8).map(|i| format!("loc-{}", i)).collect();
    let source = Arc::new(InMemorySource::with_locations(
        ids.iter().map(|id| valid_location(id)),
    ));
    source.set_latency(Duration::from_millis(30));

    let config = SchedulerConfig {
        max_concurrent: 2,
        ..fast_config()
    };
    let cache = location_cache();
    let scheduler = RefreshScheduler::new(config, source.clone(), cache.clone());

    let task_ids: Vec<String> = ids
        .iter()
        .map(|id| scheduler.refresh_location(id.clone(), RefreshPriority::Normal))
        .collect();

    let stats = scheduler.get_stats();
    assert_eq!(stats.active_refreshes, 2);
    assert_eq!(stats.queued_refreshes, 6);

    for task_id in &task_ids {
        assert_eq!(wait(&scheduler, task_id).await.status, RefreshStatus::Completed);
    }

    assert_eq!(source.peak_in_flight(), 2);
    assert_eq!(cache.len().await, 8);

    let stats = scheduler.get_stats();
    assert_eq!(stats.successful_refreshes, 8);
    assert_eq!(stats.active_refreshes, 0);
    assert_eq!(stats.queued_refreshes, 0);
    assert!(stats.avg_refresh_time_ms >= 30.0);
}

#[tokio::test]
async fn test_retries_until_source_recovers() {
    let source = Arc::new(InMemorySource::with_locations([valid_location("loc-1")]));
    source.fail_with("503 Service Unavailable", 2);

    let cache = location_cache();
    let scheduler = RefreshScheduler::new(fast_config(), source.clone(), cache.clone());

    let task_id = scheduler.refresh_location("loc-1", RefreshPriority::Critical);
    let task = wait(&scheduler, &task_id).await;

    assert_eq!(task.status, RefreshStatus::Completed);
    assert_eq!(task.retry_count, 2);
    assert_eq!(source.calls(), vec!["loc-1", "loc-1", "loc-1"]);
    assert!(cache.has("location:loc-1").await);
}

#[tokio::test]
async fn test_exhausted_retries_leave_cache_untouched() {
    let source = Arc::new(InMemorySource::with_locations([valid_location("loc-1")]));
    source.fail_with("connection refused", u32::MAX);

    let cache = location_cache();
    let scheduler = RefreshScheduler::new(fast_config(), source.clone(), cache.clone());

    let task_id = scheduler.refresh_location("loc-1", RefreshPriority::Background);
    let task = wait(&scheduler, &task_id).await;

    assert_eq!(task.status, RefreshStatus::Failed);
    assert_eq!(task.last_error.as_deref(), Some("connection refused"));
    assert_eq!(source.calls().len(), 4);
    assert!(!cache.has("location:loc-1").await);
    assert_eq!(scheduler.get_stats().failed_refreshes, 1);
}

#[tokio::test]
async fn test_invalid_records_are_not_cached() {
    let source = Arc::new(InMemorySource::with_locations([
        valid_location("good"),
        Location::new("bare"),
    ]));

    let cache = location_cache();
    let scheduler = RefreshScheduler::with_validator(
        fast_config(),
        source,
        cache.clone(),
        Arc::new(LocationValidator::new()),
    );

    let task_id = scheduler.refresh_all_locations(RefreshPriority::Normal);
    let task = wait(&scheduler, &task_id).await;

    // Skipping a record does not fail the refresh
    assert_eq!(task.status, RefreshStatus::Completed);
    assert!(cache.has("location:good").await);
    assert!(!cache.has("location:bare").await);
}

#[tokio::test]
async fn test_refresh_uses_configured_cache_ttl() {
    let source = Arc::new(InMemorySource::with_locations([valid_location("loc-1")]));
    let config = SchedulerConfig {
        cache_ttl: Some(Duration::from_millis(50)),
        ..fast_config()
    };
    let cache = location_cache();
    let scheduler = RefreshScheduler::new(config, source, cache.clone());

    let task_id = scheduler.refresh_location("loc-1", RefreshPriority::Normal);
    wait(&scheduler, &task_id).await;
    assert!(cache.has("location:loc-1").await);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!cache.has("location:loc-1").await);
}

#[tokio::test]
async fn test_periodic_refresh_enqueues_full_refresh() {
    let source = Arc::new(InMemorySource::with_locations([
        valid_location("a"),
        valid_location("b"),
    ]));
    let config = SchedulerConfig {
        periodic_interval: Duration::from_millis(40),
        ..fast_config()
    };
    let cache = location_cache();
    let scheduler = RefreshScheduler::new(config, source.clone(), cache.clone());

    let handle = scheduler.schedule_periodic_refresh();
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.abort();

    let calls = source.calls();
    assert!(calls.len() >= 2, "expected repeated refreshes, got {:?}", calls);
    assert!(calls.iter().all(|call| call == "*"));
    assert_eq!(cache.len().await, 2);
}
