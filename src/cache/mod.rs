//! # Location Cache
//!
//! In-memory keyed store for location records with TTL expiry and
//! usefulness-based eviction.
//!
//! ## Features
//!
//! - **TTL Expiration**: per-entry TTL, lazily removed on read and swept in the background
//! - **Usefulness Eviction**: entries scored by access frequency, priority and recency;
//!   the lowest score goes first when the byte budget or entry cap is hit
//! - **Warm-up and Prefetch**: concurrent population from caller-supplied fetchers
//! - **Maintenance**: TTL extension, expiring-entry listing and utilization-driven trimming
//!
//! ## Example
//!
//! ```rust
//! use location_reliability::cache::{keys, CacheConfig, LocationCache, SetOptions};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = CacheConfig::builder()
//!     .default_ttl(Duration::from_secs(15 * 60))
//!     .max_entries(1_000)
//!     .build();
//!
//! let cache: LocationCache<String> = LocationCache::new(config);
//!
//! cache.set(keys::location_key("loc-1"), "record".to_string(), SetOptions::priority(2)).await;
//!
//! if let Some(value) = cache.get(&keys::location_key("loc-1")).await {
//!     println!("Cache hit: {}", value);
//! }
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod eviction;
pub mod keys;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::CacheEntry;
pub use eviction::{EvictionEvent, EvictionReason};
pub use store::{start_auto_cleanup, LocationCache};
pub use types::{CacheKey, CacheStats, SetOptions, WarmUpReport, WarmUpTask};
