//! Core type definitions for the cache system

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Cache key type
pub type CacheKey = String;

/// Snapshot of cache performance counters
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CacheStats {
    /// Number of entries currently stored (expired-but-unswept included)
    pub total_entries: usize,

    /// Sum of approximate entry sizes in bytes
    pub total_size_bytes: usize,

    /// Total number of cache hits
    pub hit_count: u64,

    /// Total number of cache misses (absent or expired)
    pub miss_count: u64,

    /// `hit_count / (hit_count + miss_count) * 100`, or 0 with no reads
    pub hit_rate: f64,

    /// Entries removed by expiry, size pressure or optimization
    pub eviction_count: u64,

    /// Running average latency of successful reads
    pub avg_access_latency: Duration,
}

impl CacheStats {
    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        if self.hit_count + self.miss_count == 0 {
            0.0
        } else {
            100.0 - self.hit_rate
        }
    }
}

pub(crate) fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        (hits as f64 / total as f64) * 100.0
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, size: {} bytes, evictions: {} }}",
            self.hit_count,
            self.miss_count,
            self.hit_rate,
            self.total_entries,
            self.total_size_bytes,
            self.eviction_count
        )
    }
}

/// Per-write options for `LocationCache::set`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Overrides the configured default TTL; zero keeps the default
    pub ttl: Option<Duration>,
    /// Defaults to 1, as do values below 1
    pub priority: Option<i32>,
}

impl SetOptions {
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            priority: None,
        }
    }

    pub fn priority(priority: i32) -> Self {
        Self {
            ttl: None,
            priority: Some(priority),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// A deferred fetch used to populate the cache during warm-up
pub struct WarmUpTask<T> {
    pub key: CacheKey,
    pub priority: i32,
    pub(crate) fetcher: BoxFuture<'static, anyhow::Result<T>>,
}

impl<T> WarmUpTask<T> {
    pub fn new<F>(key: impl Into<CacheKey>, priority: i32, fetcher: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            key: key.into(),
            priority,
            fetcher: Box::pin(fetcher),
        }
    }
}

impl<T> fmt::Debug for WarmUpTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmUpTask")
            .field("key", &self.key)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Outcome of a warm-up or prefetch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmUpReport {
    /// Keys written to the cache
    pub loaded: Vec<CacheKey>,
    /// Keys whose fetcher failed, with the error message
    pub failed: Vec<(CacheKey, String)>,
    /// Keys skipped because they were already cached
    pub skipped: Vec<CacheKey>,
}

impl WarmUpReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
