//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use location_reliability::{
    CoordinatePrecision, Coordinates, Location, LocationSource, OperatingHours, WeeklySchedule,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory data source that records every call
#[derive(Default)]
pub struct InMemorySource {
    records: Mutex<HashMap<String, Location>>,
    calls: Mutex<Vec<String>>,
    /// Failure message and how many more calls should fail
    failure: Mutex<Option<(String, u32)>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locations(locations: impl IntoIterator<Item = Location>) -> Self {
        let source = Self::new();
        for location in locations {
            source.insert(location);
        }
        source
    }

    pub fn insert(&self, location: Location) {
        self.records
            .lock()
            .unwrap()
            .insert(location.id.clone(), location);
    }

    /// Fail the next `times` calls with `message`
    pub fn fail_with(&self, message: &str, times: u32) {
        *self.failure.lock().unwrap() = Some((message.to_string(), times));
    }

    /// Delay every fetch by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Highest number of fetches observed running at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn record_call(&self, call: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(call.to_string());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut failure = self.failure.lock().unwrap();
        if let Some((message, remaining)) = failure.as_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                anyhow::bail!("{}", message);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LocationSource for InMemorySource {
    async fn fetch_location(&self, id: &str) -> anyhow::Result<Location> {
        self.record_call(id).await?;
        self.records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Location {} not found", id))
    }

    async fn fetch_all_locations(&self) -> anyhow::Result<Vec<Location>> {
        self.record_call("*").await?;
        let mut locations: Vec<Location> = self.records.lock().unwrap().values().cloned().collect();
        locations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(locations)
    }
}

/// A well-formed record that passes validation without errors
pub fn valid_location(id: &str) -> Location {
    Location {
        name: Some("Hospital Teste".to_string()),
        full_address: Some("Avenida Paulista, 1000 - Bela Vista, São Paulo".to_string()),
        city: Some("São Paulo".to_string()),
        state: Some("SP".to_string()),
        postal_code: Some("01310-100".to_string()),
        phone: Some("(11) 1234-5678".to_string()),
        email: Some("contato@hospitalteste.com.br".to_string()),
        coordinates: Some(Coordinates::new(-23.55, -46.63, CoordinatePrecision::Exact)),
        operating_hours: Some(WeeklySchedule::every_day(OperatingHours::open(
            "08:00", "18:00",
        ))),
        status: Some("ativo".to_string()),
        ..Location::new(id)
    }
}
