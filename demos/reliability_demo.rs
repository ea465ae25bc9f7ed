//! Location Reliability Demo Application
//!
//! Runs the reliability layer against a simulated flaky backend and walks
//! through cached reads, warm-up, scheduled refreshes, validation and
//! error recovery.
//!
//! Usage:
//!   cargo run --example reliability_demo
//!
//! Environment variables (a `.env` file is honoured):
//!   RUST_LOG                        - log filter (default: location_reliability=info)
//!   LOCATION_CACHE_TTL_SECS         - default cache TTL (default: 900)
//!   LOCATION_REFRESH_MAX_CONCURRENT - refresh concurrency (default: 3)

use async_trait::async_trait;
use location_reliability::{
    CoordinatePrecision, Coordinates, Location, LocationLookup, LocationReliability,
    LocationSource, OperatingHours, RefreshPriority, ReliabilityConfig, WeeklySchedule,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Backend that answers slowly and fails every fourth request
struct FlakyBackend {
    records: HashMap<String, Location>,
    requests: AtomicU64,
}

impl FlakyBackend {
    fn new() -> Self {
        let records = [
            ("hosp-centro", "Hospital Central", "Avenida Paulista, 1000 - Bela Vista, São Paulo"),
            ("clin-norte", "Clínica Norte", "Rua Voluntários da Pátria, 500 - Santana, São Paulo"),
            ("clin-sul", "Clínica Sul", "Avenida Santo Amaro, 2000 - Brooklin, São Paulo"),
        ]
        .into_iter()
        .map(|(id, name, address)| (id.to_string(), sample_location(id, name, address)))
        .collect();

        Self {
            records,
            requests: AtomicU64::new(0),
        }
    }

    async fn simulate_request(&self) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_millis(50)).await;

        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if request % 4 == 0 {
            anyhow::bail!("503 Service Unavailable (request {})", request);
        }
        Ok(())
    }
}

#[async_trait]
impl LocationSource for FlakyBackend {
    async fn fetch_location(&self, id: &str) -> anyhow::Result<Location> {
        self.simulate_request().await?;

        if id == "clin-legado" {
            // A record missing required fields
            return Ok(Location::new(id));
        }

        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Location {} not found (404)", id))
    }

    async fn fetch_all_locations(&self) -> anyhow::Result<Vec<Location>> {
        self.simulate_request().await?;
        Ok(self.records.values().cloned().collect())
    }
}

fn sample_location(id: &str, name: &str, address: &str) -> Location {
    Location {
        name: Some(name.to_string()),
        full_address: Some(address.to_string()),
        city: Some("São Paulo".to_string()),
        state: Some("SP".to_string()),
        postal_code: Some("01310-100".to_string()),
        phone: Some("(11) 3333-4444".to_string()),
        coordinates: Some(Coordinates::new(-23.56, -46.65, CoordinatePrecision::Approximate)),
        operating_hours: Some(WeeklySchedule::every_day(OperatingHours::open("07:00", "19:00"))),
        status: Some("ativo".to_string()),
        ..Location::new(id)
    }
}

fn describe(id: &str, lookup: &LocationLookup) {
    match lookup {
        LocationLookup::Cached(location) => {
            info!("✓ {} served from cache: {:?}", id, location.name)
        }
        LocationLookup::Fetched(location) => {
            info!("✓ {} fetched from backend: {:?}", id, location.name)
        }
        LocationLookup::Recovered { location, recovery } => info!(
            "~ {} recovered via {}: {:?} ({})",
            id, recovery.strategy, location.name, recovery.user_message
        ),
        LocationLookup::Unavailable(recovery) => info!(
            "✗ {} unavailable ({}): {}",
            id, recovery.strategy, recovery.user_message
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "location_reliability=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Location Reliability Demo ===");

    let config = ReliabilityConfig::from_env()?;
    let reliability = LocationReliability::new(config, Arc::new(FlakyBackend::new()))?;
    let background = reliability.start_background();

    info!("\n--- Warm-up ---");
    let popular = vec!["hosp-centro".to_string(), "clin-norte".to_string()];
    let report = reliability.warm_up_locations(&popular, 5).await;
    info!(
        "Warm-up loaded {} locations, {} failed",
        report.loaded.len(),
        report.failed.len()
    );

    info!("\n--- Reads ---");
    for id in ["hosp-centro", "clin-sul", "clin-sul", "clin-legado", "clin-fantasma"] {
        let lookup = reliability.get_location(id).await;
        describe(id, &lookup);
    }

    info!("\n--- Scheduled refresh ---");
    let scheduler = reliability.scheduler();
    let task_id = scheduler.refresh_all_locations(RefreshPriority::Normal);
    let emergency = scheduler.emergency_refresh(&["clin-norte".to_string()]);

    for id in std::iter::once(&task_id).chain(emergency.iter()) {
        if let Some(task) = scheduler.wait_for_task(id).await {
            info!(
                "Task {} ({}) finished as {:?} after {} retries",
                task.id, task.target, task.status, task.retry_count
            );
        }
    }
    info!("Refresh stats: {:?}", scheduler.get_stats());

    info!("\n--- Validation ---");
    let result = reliability
        .validator()
        .validate_location(&Location::new("clin-legado"));
    info!("Valid: {}", result.is_valid);
    for error in &result.errors {
        info!("  {} [{:?}]", error, error.severity);
    }

    info!("\n--- Error statistics ---");
    let stats = reliability.error_handler().get_error_stats().await;
    info!(
        "{} errors over {} operations ({:.1}%), {} recovered",
        stats.total_errors, stats.total_operations, stats.error_rate, stats.successful_recoveries
    );
    for (error_type, count) in &stats.errors_by_type {
        info!("  {}: {}", error_type, count);
    }
    match reliability.error_handler().detect_error_patterns().await {
        Some(pattern) => info!("Pattern: {} → {}", pattern.pattern, pattern.recommendation),
        None => info!("No error pattern detected"),
    }

    info!("\n--- Cache ---");
    info!("{}", reliability.cache().stats().await);
    for (key, count) in reliability.cache().most_accessed(3).await {
        info!("  {} accessed {} times", key, count);
    }

    background.shutdown();
    info!("\n=== Demo Complete ===");

    Ok(())
}
