//! Composition root wiring the cache, scheduler, validator and error handler

use crate::cache::{
    keys::location_key, start_auto_cleanup, LocationCache, SetOptions, WarmUpReport, WarmUpTask,
};
use crate::config::ReliabilityConfig;
use crate::error::{LocationError, Result};
use crate::location::Location;
use crate::recovery::{ErrorContext, ErrorHandler, RecoveryResult};
use crate::refresh::{LocationSource, RefreshScheduler};
use crate::validation::{format_validation_errors, LocationValidator};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of [`LocationReliability::get_location`]
#[derive(Debug, Clone, PartialEq)]
pub enum LocationLookup {
    /// Served from the cache
    Cached(Location),
    /// Fetched from the source, validated and cached
    Fetched(Location),
    /// The fetch failed and the error handler produced stand-in data
    Recovered {
        location: Location,
        recovery: RecoveryResult,
    },
    /// The fetch failed and nothing could be recovered
    Unavailable(RecoveryResult),
}

impl LocationLookup {
    pub fn location(&self) -> Option<&Location> {
        match self {
            LocationLookup::Cached(location)
            | LocationLookup::Fetched(location)
            | LocationLookup::Recovered { location, .. } => Some(location),
            LocationLookup::Unavailable(_) => None,
        }
    }

    pub fn into_location(self) -> Option<Location> {
        match self {
            LocationLookup::Cached(location)
            | LocationLookup::Fetched(location)
            | LocationLookup::Recovered { location, .. } => Some(location),
            LocationLookup::Unavailable(_) => None,
        }
    }
}

/// Handles of the spawned maintenance loops; aborted on drop
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn shutdown(self) {
        info!("Stopping {} background tasks", self.handles.len());
        // Drop aborts the handles
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Location data access made resilient against an unreliable source
pub struct LocationReliability {
    config: ReliabilityConfig,
    source: Arc<dyn LocationSource>,
    cache: Arc<LocationCache<Location>>,
    validator: Arc<LocationValidator>,
    scheduler: RefreshScheduler,
    errors: Arc<ErrorHandler>,
}

impl LocationReliability {
    pub fn new(config: ReliabilityConfig, source: Arc<dyn LocationSource>) -> Result<Self> {
        Self::with_validator(config, source, LocationValidator::new())
    }

    /// Build with a validator carrying custom rules
    pub fn with_validator(
        config: ReliabilityConfig,
        source: Arc<dyn LocationSource>,
        validator: LocationValidator,
    ) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(LocationCache::new(config.cache.clone()));
        let validator = Arc::new(validator);
        let scheduler = RefreshScheduler::with_validator(
            config.scheduler.clone(),
            source.clone(),
            cache.clone(),
            validator.clone(),
        );
        let errors = Arc::new(ErrorHandler::with_config(
            config.error_handler.clone(),
            cache.clone(),
        ));

        info!("Location reliability layer initialized");

        Ok(Self {
            config,
            source,
            cache,
            validator,
            scheduler,
            errors,
        })
    }

    pub fn config(&self) -> &ReliabilityConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<LocationCache<Location>> {
        &self.cache
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    pub fn validator(&self) -> &Arc<LocationValidator> {
        &self.validator
    }

    pub fn error_handler(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    /// Read a location: cache first, then the source, then error recovery
    pub async fn get_location(&self, location_id: &str) -> LocationLookup {
        let key = location_key(location_id);

        if let Some(location) = self.cache.get(&key).await {
            return LocationLookup::Cached(location);
        }

        debug!("Location {} not cached, fetching from source", location_id);

        let outcome = match self.source.fetch_location(location_id).await {
            Ok(location) => accept(&self.validator, location),
            Err(e) => Err(e.context(LocationError::SourceError {
                operation: "get_location".to_string(),
                message: format!("location {}", location_id),
            })),
        };

        match outcome {
            Ok(location) => {
                self.cache
                    .set(key, location.clone(), SetOptions::default())
                    .await;
                self.errors.record_success("get_location").await;
                LocationLookup::Fetched(location)
            }
            Err(e) => {
                let context = ErrorContext::new("get_location").with_location(location_id);
                let recovery = self.errors.handle_error(&e, context).await;

                match recovery.fallback_data.clone() {
                    Some(location) => LocationLookup::Recovered { location, recovery },
                    None => LocationLookup::Unavailable(recovery),
                }
            }
        }
    }

    /// Populate the cache for the given ids; failures are reported as cache errors
    pub async fn warm_up_locations(&self, location_ids: &[String], priority: i32) -> WarmUpReport {
        let tasks = location_ids
            .iter()
            .map(|location_id| {
                let source = self.source.clone();
                let validator = self.validator.clone();
                let key = location_key(location_id);
                let location_id = location_id.clone();
                WarmUpTask::new(key, priority, async move {
                    let location = source.fetch_location(&location_id).await?;
                    accept(&validator, location)
                })
            })
            .collect();

        let report = self.cache.warm_up(tasks).await;

        for (key, message) in &report.failed {
            let context = ErrorContext::new("warm_up").with_location(key.trim_start_matches("location:"));
            self.errors.report_cache_error(message, context).await;
        }

        report
    }

    /// Spawn the cache sweep and the periodic refresh
    pub fn start_background(&self) -> BackgroundTasks {
        let cleanup = tokio::spawn(start_auto_cleanup(self.cache.clone()));
        let refresh = self.scheduler.schedule_periodic_refresh();

        BackgroundTasks {
            handles: vec![cleanup, refresh],
        }
    }
}

/// Pass the record through when it has no error-severity problems
fn accept(validator: &LocationValidator, location: Location) -> anyhow::Result<Location> {
    let result = validator.validate_location(&location);
    if result.is_valid {
        return Ok(location);
    }

    let problems = format_validation_errors(&result.errors).join("; ");
    warn!("Fetched location {} failed validation: {}", location.id, problems);
    Err(LocationError::ValidationError(format!("location {}: {}", location.id, problems)).into())
}
