//! Cache entry bookkeeping and the usefulness score used for eviction

use chrono::{DateTime, Utc};
use std::time::Duration;

/// A cached value with access metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cache key
    pub key: String,

    /// The cached value
    pub data: T,

    /// When the entry was written
    pub created_at: DateTime<Utc>,

    /// Last read (or write) time
    pub last_accessed_at: DateTime<Utc>,

    /// Number of reads, counting the initial write as one
    pub access_count: u64,

    /// Approximate serialized size of `data`
    pub size_bytes: usize,

    /// Caller-assigned priority; multiplies the usefulness score
    pub priority: i32,

    /// Time-to-live from `created_at`; `None` never expires
    pub ttl: Option<Duration>,

    /// Monotonic insertion sequence, used to break score ties (oldest first)
    pub(crate) sequence: u64,
}

impl<T> CacheEntry<T> {
    /// Create a new entry
    pub fn new(
        key: String,
        data: T,
        size_bytes: usize,
        priority: i32,
        ttl: Option<Duration>,
        sequence: u64,
    ) -> Self {
        let now = Utc::now();

        Self {
            key,
            data,
            created_at: now,
            last_accessed_at: now,
            access_count: 1,
            size_bytes,
            priority,
            ttl,
            sequence,
        }
    }

    /// Expiry instant, if the entry has a TTL
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(self.ttl?).ok()?;
        self.created_at.checked_add_signed(ttl)
    }

    /// Check if the entry has expired as of `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| now > expires_at)
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Time left before expiry; `None` if expired or without TTL
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let remaining = self.expires_at()? - Utc::now();
        remaining.to_std().ok().filter(|d| !d.is_zero())
    }

    /// Mark the entry as accessed (updates access time and count)
    pub fn mark_accessed(&mut self) {
        self.last_accessed_at = Utc::now();
        self.access_count += 1;
    }

    /// Extend the TTL; expired entries and entries without a TTL are left alone
    pub fn extend_ttl(&mut self, extension: Duration) -> bool {
        if self.is_expired() {
            return false;
        }

        match self.ttl.as_mut() {
            Some(ttl) => {
                *ttl += extension;
                true
            }
            None => false,
        }
    }

    /// Usefulness score as of `now`; lower scores are evicted first.
    ///
    /// `(access_frequency * priority) / recency`, where access frequency is
    /// accesses per minute of age and recency is minutes since last access,
    /// both denominators floored at one minute.
    pub fn usefulness_score_at(&self, now: DateTime<Utc>) -> f64 {
        let age_minutes = minutes_between(self.created_at, now).max(1.0);
        let recency_minutes = minutes_between(self.last_accessed_at, now).max(1.0);
        let access_frequency = self.access_count as f64 / age_minutes;

        (access_frequency * self.priority as f64) / recency_minutes
    }

    /// Usefulness score as of now
    pub fn usefulness_score(&self) -> f64 {
        self.usefulness_score_at(Utc::now())
    }
}

fn minutes_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds().max(0) as f64 / 60_000.0
}
