//! # Location Reliability
//!
//! Resilient access to establishment (clinic/hospital) location records
//! served by an unreliable, high-latency data source.
//!
//! ## Components
//!
//! - [`cache`]: TTL and budget bounded in-memory store with usefulness-scored
//!   eviction, warm-up and prefetch
//! - [`refresh`]: priority queue of refresh tasks with bounded concurrency
//!   and per-priority backoff, writing fetched records into the cache
//! - [`validation`]: field, cross-field and business rules for candidate records
//! - [`recovery`]: error classification, recovery strategies, history and
//!   pattern detection
//!
//! [`LocationReliability`] wires them together around one [`LocationSource`].
//!
//! ## Example
//!
//! ```no_run
//! use location_reliability::{Location, LocationReliability, LocationSource, ReliabilityConfig};
//! use std::sync::Arc;
//!
//! struct Backend;
//!
//! #[async_trait::async_trait]
//! impl LocationSource for Backend {
//!     async fn fetch_location(&self, id: &str) -> anyhow::Result<Location> {
//!         anyhow::bail!("503 Service Unavailable while fetching {}", id)
//!     }
//!
//!     async fn fetch_all_locations(&self) -> anyhow::Result<Vec<Location>> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reliability = LocationReliability::new(ReliabilityConfig::from_env()?, Arc::new(Backend))?;
//!     let _background = reliability.start_background();
//!
//!     match reliability.get_location("loc-1").await.location() {
//!         Some(location) => println!("Location: {:?}", location.name),
//!         None => println!("Location unavailable"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod location;
pub mod recovery;
pub mod refresh;
pub mod reliability;
pub mod validation;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheEntry, CacheKey, CacheStats, EvictionEvent,
    EvictionReason, LocationCache, SetOptions, WarmUpReport, WarmUpTask,
};
pub use config::ReliabilityConfig;
pub use error::{LocationError, Result};
pub use location::{
    CoordinatePrecision, Coordinates, Facility, FacilityType, Location, LocationStatus,
    OperatingHours, WeeklySchedule,
};
pub use recovery::{
    ErrorClassification, ErrorClassifier, ErrorContext, ErrorHandler, ErrorHandlerConfig,
    ErrorSeverity, ErrorStats, ErrorType, RecoveryResult, RecoveryStrategy,
};
pub use refresh::{
    LocationSource, RefreshPriority, RefreshScheduler, RefreshStats, RefreshStatus, RefreshTask,
    SchedulerConfig,
};
pub use reliability::{BackgroundTasks, LocationLookup, LocationReliability};
pub use validation::{LocationValidator, Severity, ValidationError, ValidationResult, ValidationRule};
