//! Configuration for the location cache

use crate::error::{LocationError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the location cache
///
/// Defaults match what the booking portal runs with:
/// - 15 minute TTL for location records
/// - 50 MB byte budget, 1000 entries
/// - expired entries swept every 5 minutes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without one.
    /// `None` means entries stored without an explicit TTL never expire.
    pub default_ttl: Option<Duration>,

    /// Maximum number of entries in the cache
    pub max_entries: usize,

    /// Maximum total approximate serialized size in bytes
    pub max_size_bytes: usize,

    /// TTL jitter factor (0.0 - 1.0), applied to `default_ttl` only
    pub ttl_jitter: f64,

    /// Interval for the background expiry sweep
    pub cleanup_interval: Duration,

    /// Utilization (0.0 - 1.0) above which `optimize` trims entries
    pub optimize_utilization_threshold: f64,

    /// Fraction of entries (0.0 - 1.0) `optimize` removes
    pub optimize_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Some(Duration::from_secs(15 * 60)),
            max_entries: 1_000,
            max_size_bytes: 50 * 1024 * 1024,
            ttl_jitter: 0.0,
            cleanup_interval: Duration::from_secs(5 * 60),
            optimize_utilization_threshold: 0.8,
            optimize_fraction: 0.1,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(LocationError::ConfigError(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        if self.max_size_bytes == 0 {
            return Err(LocationError::ConfigError(
                "max_size_bytes must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(LocationError::ConfigError(
                "ttl_jitter must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.optimize_utilization_threshold) {
            return Err(LocationError::ConfigError(
                "optimize_utilization_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.optimize_fraction) {
            return Err(LocationError::ConfigError(
                "optimize_fraction must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.cleanup_interval.is_zero() {
            return Err(LocationError::ConfigError(
                "cleanup_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Default TTL with jitter applied, if a default TTL is configured
    pub fn ttl_with_jitter(&self) -> Option<Duration> {
        let ttl = self.default_ttl?;
        if self.ttl_jitter == 0.0 {
            return Some(ttl);
        }

        let base_secs = ttl.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(1.0);

        Some(Duration::from_secs_f64(final_secs))
    }

    /// Small cache for tests and memory-constrained processes
    pub fn small() -> Self {
        Self {
            max_entries: 100,
            max_size_bytes: 1024 * 1024,
            ..Default::default()
        }
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    default_ttl: Option<Option<Duration>>,
    max_entries: Option<usize>,
    max_size_bytes: Option<usize>,
    ttl_jitter: Option<f64>,
    cleanup_interval: Option<Duration>,
    optimize_utilization_threshold: Option<f64>,
    optimize_fraction: Option<f64>,
}

impl CacheConfigBuilder {
    /// Set default TTL for cache entries
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(Some(ttl));
        self
    }

    /// Entries stored without an explicit TTL never expire
    pub fn no_default_ttl(mut self) -> Self {
        self.default_ttl = Some(None);
        self
    }

    /// Set maximum number of cache entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Set maximum cache size in bytes
    pub fn max_size_bytes(mut self, size: usize) -> Self {
        self.max_size_bytes = Some(size);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Set cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Set the utilization above which `optimize` trims entries
    pub fn optimize_utilization_threshold(mut self, threshold: f64) -> Self {
        self.optimize_utilization_threshold = Some(threshold);
        self
    }

    /// Set the fraction of entries `optimize` removes
    pub fn optimize_fraction(mut self, fraction: f64) -> Self {
        self.optimize_fraction = Some(fraction);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            default_ttl: self.default_ttl.unwrap_or(defaults.default_ttl),
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            max_size_bytes: self.max_size_bytes.unwrap_or(defaults.max_size_bytes),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
            optimize_utilization_threshold: self
                .optimize_utilization_threshold
                .unwrap_or(defaults.optimize_utilization_threshold),
            optimize_fraction: self
                .optimize_fraction
                .unwrap_or(defaults.optimize_fraction),
        }
    }
}
