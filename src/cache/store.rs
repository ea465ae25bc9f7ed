//! Main cache store with usefulness-scored eviction and TTL expiry

use crate::cache::{
    config::CacheConfig,
    entry::CacheEntry,
    eviction::{EvictionEvent, EvictionReason},
    types::{hit_rate, CacheKey, CacheStats, SetOptions, WarmUpReport, WarmUpTask},
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// In-memory cache for location data
///
/// - Thread-safe async access via a single `RwLock`
/// - TTL expiry, lazily on read and periodically via [`start_auto_cleanup`]
/// - Size and entry-count budgets enforced by evicting the least useful entry
/// - Never fails: absence and expiry are both `None`
pub struct LocationCache<T> {
    /// Cache configuration
    pub(crate) config: CacheConfig,

    /// Internal storage
    store: RwLock<CacheStore<T>>,
}

/// Internal cache storage
struct CacheStore<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
    current_size_bytes: usize,
    hit_count: u64,
    miss_count: u64,
    eviction_count: u64,
    avg_access_latency: Duration,
    next_sequence: u64,
}

impl<T> CacheStore<T> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(key)?;
        self.current_size_bytes = self.current_size_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    /// Lowest usefulness score; ties go to the oldest insertion
    fn least_useful_key(&self, now: DateTime<Utc>) -> Option<CacheKey> {
        self.entries
            .values()
            .min_by(|a, b| {
                a.usefulness_score_at(now)
                    .total_cmp(&b.usefulness_score_at(now))
                    .then(a.sequence.cmp(&b.sequence))
            })
            .map(|entry| entry.key.clone())
    }

    fn record_hit(&mut self, latency: Duration) {
        self.hit_count += 1;
        if self.hit_count == 1 {
            self.avg_access_latency = latency;
        } else {
            let previous = self.avg_access_latency.as_secs_f64() * (self.hit_count - 1) as f64;
            self.avg_access_latency =
                Duration::from_secs_f64((previous + latency.as_secs_f64()) / self.hit_count as f64);
        }
    }
}

impl<T> LocationCache<T>
where
    T: Clone + Serialize + Send + Sync + 'static,
{
    /// Create a new cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        info!("Initializing location cache with config: {:?}", config);

        let store = CacheStore {
            entries: HashMap::new(),
            current_size_bytes: 0,
            hit_count: 0,
            miss_count: 0,
            eviction_count: 0,
            avg_access_latency: Duration::ZERO,
            next_sequence: 0,
        };

        Self {
            config,
            store: RwLock::new(store),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &str) -> Option<T> {
        let started = Instant::now();
        let mut store = self.store.write().await;
        let now = Utc::now();

        let expired = match store.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                debug!("Cache miss: {}", key);
                store.miss_count += 1;
                return None;
            }
        };

        if expired {
            debug!("Cache entry expired: {}", key);
            store.remove(key);
            store.miss_count += 1;
            store.eviction_count += 1;
            return None;
        }

        let entry = store.entries.get_mut(key)?;
        entry.mark_accessed();
        let access_count = entry.access_count;
        let data = entry.data.clone();
        store.record_hit(started.elapsed());

        debug!("Cache hit: {} (access count {})", key, access_count);
        Some(data)
    }

    /// Insert a value, evicting the least useful entries if budgets require it.
    ///
    /// A zero TTL uses the configured default and a priority below 1 becomes 1.
    pub async fn set(&self, key: impl Into<CacheKey>, data: T, options: SetOptions) {
        let key = key.into();
        let size = approximate_size(&data);
        let ttl = options
            .ttl
            .filter(|ttl| !ttl.is_zero())
            .or_else(|| self.config.ttl_with_jitter());
        let priority = options.priority.filter(|priority| *priority > 0).unwrap_or(1);

        if size > self.config.max_size_bytes {
            warn!(
                "Refusing to cache {}: {} bytes exceeds the {} byte budget",
                key, size, self.config.max_size_bytes
            );
            return;
        }

        let mut store = self.store.write().await;

        // Replacing an entry releases its space before reserving
        if store.remove(&key).is_some() {
            debug!("Replacing cache entry: {}", key);
        }

        self.reserve_space(&mut store, size);

        let sequence = store.next_sequence;
        store.next_sequence += 1;
        store
            .entries
            .insert(key.clone(), CacheEntry::new(key.clone(), data, size, priority, ttl, sequence));
        store.current_size_bytes += size;

        debug!("Cache set: {} ({} bytes, ttl {:?})", key, size, ttl);
    }

    /// Remove a specific entry; true if it was present
    pub async fn delete(&self, key: &str) -> bool {
        let mut store = self.store.write().await;
        let removed = store.remove(key).is_some();
        if removed {
            debug!("Cache entry deleted: {}", key);
        }
        removed
    }

    /// Check if a live entry exists (without counting a read)
    pub async fn has(&self, key: &str) -> bool {
        let store = self.store.read().await;
        store
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Clear all entries from the cache
    pub async fn clear(&self) {
        let mut store = self.store.write().await;

        let count = store.entries.len();
        store.entries.clear();
        store.current_size_bytes = 0;

        info!("Cleared {} entries from cache", count);
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;

        CacheStats {
            total_entries: store.entries.len(),
            total_size_bytes: store.current_size_bytes,
            hit_count: store.hit_count,
            miss_count: store.miss_count,
            hit_rate: hit_rate(store.hit_count, store.miss_count),
            eviction_count: store.eviction_count,
            avg_access_latency: store.avg_access_latency,
        }
    }

    /// Get number of entries in cache
    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    /// Check if cache is empty
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.entries.is_empty()
    }

    /// Get current cache size in bytes
    pub async fn size_bytes(&self) -> usize {
        self.store.read().await.current_size_bytes
    }

    /// Run all fetchers concurrently and cache each success.
    ///
    /// Tasks are started highest priority first. A failing fetcher is logged
    /// and reported; it never aborts the others.
    pub async fn warm_up(&self, mut tasks: Vec<WarmUpTask<T>>) -> WarmUpReport {
        info!("Starting cache warm-up with {} tasks", tasks.len());

        tasks.sort_by(|a, b| b.priority.cmp(&a.priority));

        let outcomes = join_all(tasks.into_iter().map(|task| async move {
            let WarmUpTask {
                key,
                priority,
                fetcher,
            } = task;

            match fetcher.await {
                Ok(data) => {
                    self.set(key.clone(), data, SetOptions::priority(priority)).await;
                    debug!("Cache warm-up task completed: {} (priority {})", key, priority);
                    Ok(key)
                }
                Err(e) => {
                    error!("Cache warm-up task failed for {}: {}", key, e);
                    Err((key, e.to_string()))
                }
            }
        }))
        .await;

        let mut report = WarmUpReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(key) => report.loaded.push(key),
                Err(failure) => report.failed.push(failure),
            }
        }

        info!(
            "Cache warm-up completed: {} loaded, {} failed",
            report.loaded.len(),
            report.failed.len()
        );
        report
    }

    /// Fetch and cache every key that is not already live in the cache
    pub async fn prefetch<I, K, F, Fut>(&self, keys: I, fetcher: F) -> WarmUpReport
    where
        I: IntoIterator<Item = K>,
        K: Into<CacheKey>,
        F: Fn(CacheKey) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let fetcher = &fetcher;

        let outcomes = join_all(keys.into_iter().map(Into::into).map(|key: CacheKey| async move {
            if self.has(&key).await {
                return PrefetchOutcome::Skipped(key);
            }

            match fetcher(key.clone()).await {
                Ok(data) => {
                    self.set(key.clone(), data, SetOptions::default()).await;
                    PrefetchOutcome::Loaded(key)
                }
                Err(e) => {
                    error!("Prefetch failed for {}: {}", key, e);
                    PrefetchOutcome::Failed(key, e.to_string())
                }
            }
        }))
        .await;

        let mut report = WarmUpReport::default();
        for outcome in outcomes {
            match outcome {
                PrefetchOutcome::Loaded(key) => report.loaded.push(key),
                PrefetchOutcome::Skipped(key) => report.skipped.push(key),
                PrefetchOutcome::Failed(key, message) => report.failed.push((key, message)),
            }
        }
        report
    }

    /// Live keys, optionally filtered by a pattern, sorted
    pub async fn keys(&self, pattern: Option<&Regex>) -> Vec<CacheKey> {
        let store = self.store.read().await;
        let now = Utc::now();

        let mut keys: Vec<CacheKey> = store
            .entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .filter(|entry| pattern.map_or(true, |p| p.is_match(&entry.key)))
            .map(|entry| entry.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Live entries with the highest access counts, most accessed first
    pub async fn most_accessed(&self, limit: usize) -> Vec<(CacheKey, u64)> {
        let store = self.store.read().await;
        let now = Utc::now();

        let mut entries: Vec<&CacheEntry<T>> = store
            .entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .collect();
        entries.sort_by(|a, b| {
            b.access_count
                .cmp(&a.access_count)
                .then(a.sequence.cmp(&b.sequence))
        });

        entries
            .into_iter()
            .take(limit)
            .map(|entry| (entry.key.clone(), entry.access_count))
            .collect()
    }

    /// Keys of live entries that expire within the given window
    pub async fn expiring_entries(&self, within: Duration) -> Vec<CacheKey> {
        let store = self.store.read().await;

        let mut keys: Vec<CacheKey> = store
            .entries
            .values()
            .filter(|entry| {
                entry
                    .time_until_expiration()
                    .is_some_and(|remaining| remaining <= within)
            })
            .map(|entry| entry.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Extend the TTL of the given keys; returns how many were extended.
    /// Missing keys, expired entries and entries without a TTL are skipped.
    pub async fn extend_ttl<S: AsRef<str>>(&self, keys: &[S], additional: Duration) -> usize {
        let mut store = self.store.write().await;
        let now = Utc::now();

        let extended = keys
            .iter()
            .filter(|key| {
                store
                    .entries
                    .get_mut(key.as_ref())
                    .filter(|entry| !entry.is_expired_at(now))
                    .is_some_and(|entry| entry.extend_ttl(additional))
            })
            .count();

        info!("TTL extended by {:?} for {} entries", additional, extended);
        extended
    }

    /// Trim the least useful entries once utilization passes the threshold.
    /// Returns the number of entries removed.
    pub async fn optimize(&self) -> usize {
        let mut store = self.store.write().await;

        let utilization = store.current_size_bytes as f64 / self.config.max_size_bytes as f64;
        if utilization <= self.config.optimize_utilization_threshold {
            debug!("Cache optimization skipped at {:.2} utilization", utilization);
            return 0;
        }

        let now = Utc::now();
        let mut scored: Vec<(f64, u64, CacheKey)> = store
            .entries
            .values()
            .map(|entry| (entry.usefulness_score_at(now), entry.sequence, entry.key.clone()))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let remove_count = (scored.len() as f64 * self.config.optimize_fraction).floor() as usize;
        let removed: Vec<CacheKey> = scored
            .into_iter()
            .take(remove_count)
            .map(|(_, _, key)| key)
            .collect();

        for key in &removed {
            store.remove(key);
        }
        store.eviction_count += removed.len() as u64;

        let event = EvictionEvent::new(EvictionReason::Optimized, removed);
        info!(
            "Cache optimized: removed {} entries at {:.2} utilization",
            event.len(),
            utilization
        );
        event.len()
    }

    /// Remove all expired entries
    pub async fn cleanup_expired(&self) -> Option<EvictionEvent> {
        let mut store = self.store.write().await;
        let now = Utc::now();

        let expired_keys: Vec<CacheKey> = store
            .entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect();

        if expired_keys.is_empty() {
            return None;
        }

        for key in &expired_keys {
            store.remove(key);
        }
        store.eviction_count += expired_keys.len() as u64;

        info!("Expired cache entries cleaned: {}", expired_keys.len());
        Some(EvictionEvent::new(EvictionReason::Expired, expired_keys))
    }

    /// Evict least useful entries until `needed` bytes and one more entry fit
    fn reserve_space(&self, store: &mut CacheStore<T>, needed: usize) {
        let now = Utc::now();

        loop {
            let reason = if store.entries.len() >= self.config.max_entries {
                EvictionReason::EntryLimit
            } else if store.current_size_bytes + needed > self.config.max_size_bytes {
                EvictionReason::SizeLimit
            } else {
                break;
            };

            let Some(key) = store.least_useful_key(now) else {
                break;
            };

            store.remove(&key);
            store.eviction_count += 1;
            debug!("Evicted cache entry {} ({})", key, reason);
        }
    }
}

enum PrefetchOutcome {
    Loaded(CacheKey),
    Skipped(CacheKey),
    Failed(CacheKey, String),
}

/// Approximate serialized size of a value
fn approximate_size<T: Serialize>(data: &T) -> usize {
    match serde_json::to_vec(data) {
        Ok(bytes) => bytes.len(),
        Err(e) => {
            warn!("Could not serialize cache value for sizing: {}", e);
            std::mem::size_of::<T>()
        }
    }
}

/// Background task for automatic expiry sweeps
pub async fn start_auto_cleanup<T>(cache: Arc<LocationCache<T>>)
where
    T: Clone + Serialize + Send + Sync + 'static,
{
    let interval = cache.config.cleanup_interval;

    info!("Starting automatic cache cleanup task (interval: {:?})", interval);

    loop {
        tokio::time::sleep(interval).await;

        if let Some(event) = cache.cleanup_expired().await {
            debug!("Auto cleanup removed {} entries", event.len());
        }
    }
}
