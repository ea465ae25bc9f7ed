//! Why entries leave the cache
//!
//! Explicit `delete`/`clear` calls are not evictions and are not counted here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason an entry was evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvictionReason {
    /// TTL elapsed (lazy removal on read, or background sweep)
    Expired,

    /// Byte budget would be exceeded by a new entry
    SizeLimit,

    /// Entry cap reached
    EntryLimit,

    /// Removed by `optimize` as part of the least useful fraction
    Optimized,
}

impl std::fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionReason::Expired => write!(f, "TTL expired"),
            EvictionReason::SizeLimit => write!(f, "cache size limit reached"),
            EvictionReason::EntryLimit => write!(f, "cache entry limit reached"),
            EvictionReason::Optimized => write!(f, "low usefulness score"),
        }
    }
}

/// A batch of keys evicted together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionEvent {
    /// Reason for eviction
    pub reason: EvictionReason,

    /// When the eviction occurred
    pub timestamp: DateTime<Utc>,

    /// Keys that were evicted
    pub keys: Vec<String>,
}

impl EvictionEvent {
    /// Create a new eviction event
    pub fn new(reason: EvictionReason, keys: Vec<String>) -> Self {
        Self {
            reason,
            timestamp: Utc::now(),
            keys,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_reason_display() {
        assert_eq!(EvictionReason::Expired.to_string(), "TTL expired");
        assert!(EvictionReason::SizeLimit.to_string().contains("size"));
    }

    #[test]
    fn test_eviction_event() {
        let event = EvictionEvent::new(
            EvictionReason::Optimized,
            vec!["location:1".to_string(), "location:2".to_string()],
        );

        assert_eq!(event.len(), 2);
        assert!(!event.is_empty());
        assert_eq!(event.reason, EvictionReason::Optimized);
    }
}
