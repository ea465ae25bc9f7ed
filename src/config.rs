//! Aggregate configuration with environment overrides
//!
//! Recognised variables (a `.env` file is loaded first if present):
//!
//! - `LOCATION_CACHE_MAX_BYTES`, `LOCATION_CACHE_MAX_ENTRIES`
//! - `LOCATION_CACHE_TTL_SECS` (`0` disables the default TTL)
//! - `LOCATION_CACHE_CLEANUP_SECS`
//! - `LOCATION_REFRESH_MAX_CONCURRENT`, `LOCATION_REFRESH_INTERVAL_SECS`
//! - `LOCATION_ERROR_HISTORY`

use crate::cache::CacheConfig;
use crate::error::{LocationError, Result};
use crate::recovery::ErrorHandlerConfig;
use crate::refresh::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub error_handler: ErrorHandlerConfig,
}

impl ReliabilityConfig {
    /// Defaults overridden from the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bytes) = parse_var(&lookup, "LOCATION_CACHE_MAX_BYTES")? {
            config.cache.max_size_bytes = bytes;
        }
        if let Some(entries) = parse_var(&lookup, "LOCATION_CACHE_MAX_ENTRIES")? {
            config.cache.max_entries = entries;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "LOCATION_CACHE_TTL_SECS")? {
            config.cache.default_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var(&lookup, "LOCATION_CACHE_CLEANUP_SECS")? {
            config.cache.cleanup_interval = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var(&lookup, "LOCATION_REFRESH_MAX_CONCURRENT")? {
            config.scheduler.max_concurrent = max;
        }
        if let Some(secs) = parse_var(&lookup, "LOCATION_REFRESH_INTERVAL_SECS")? {
            config.scheduler.periodic_interval = Duration::from_secs(secs);
        }
        if let Some(history) = parse_var(&lookup, "LOCATION_ERROR_HISTORY")? {
            config.error_handler.max_history = history;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.scheduler.validate()?;
        self.error_handler.validate()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| LocationError::ConfigError(format!("{}={:?}: {}", key, raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = ReliabilityConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.cache.max_entries, 1_000);
        assert_eq!(config.scheduler.max_concurrent, 3);
        assert_eq!(config.error_handler.max_history, 1_000);
    }

    #[test]
    fn test_overrides() {
        let config = ReliabilityConfig::from_lookup(lookup(&[
            ("LOCATION_CACHE_MAX_BYTES", "1048576"),
            ("LOCATION_CACHE_MAX_ENTRIES", "250"),
            ("LOCATION_CACHE_TTL_SECS", "0"),
            ("LOCATION_REFRESH_MAX_CONCURRENT", " 5 "),
            ("LOCATION_REFRESH_INTERVAL_SECS", "60"),
            ("LOCATION_ERROR_HISTORY", "100"),
        ]))
        .unwrap();

        assert_eq!(config.cache.max_size_bytes, 1_048_576);
        assert_eq!(config.cache.max_entries, 250);
        assert_eq!(config.cache.default_ttl, None);
        assert_eq!(config.scheduler.max_concurrent, 5);
        assert_eq!(config.scheduler.periodic_interval, Duration::from_secs(60));
        assert_eq!(config.error_handler.max_history, 100);
    }

    #[test]
    fn test_unparsable_value_is_config_error() {
        let result =
            ReliabilityConfig::from_lookup(lookup(&[("LOCATION_CACHE_MAX_ENTRIES", "lots")]));

        match result {
            Err(LocationError::ConfigError(message)) => {
                assert!(message.contains("LOCATION_CACHE_MAX_ENTRIES"))
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_value_fails_validation() {
        let result =
            ReliabilityConfig::from_lookup(lookup(&[("LOCATION_REFRESH_MAX_CONCURRENT", "0")]));
        assert!(matches!(result, Err(LocationError::ConfigError(_))));
    }
}
