//! Error handler: classification, recovery, history and pattern detection

use super::classify::{ErrorClassification, ErrorClassifier, ErrorSeverity, ErrorType, RecoveryStrategy};
use super::context::ErrorContext;
use crate::cache::{keys::location_key, LocationCache};
use crate::error::{LocationError, Result};
use crate::location::Location;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlerConfig {
    /// History entries kept; oldest are dropped first
    pub max_history: usize,
    /// Most recent entries inspected for patterns
    pub pattern_window: usize,
    /// History needed before patterns are reported
    pub pattern_min_history: usize,
    /// A type occurring more often than this in the window is a pattern
    pub dominant_type_threshold: usize,
    /// Error rate (percent) above which a pattern is reported
    pub error_rate_threshold: f64,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            max_history: 1000,
            pattern_window: 20,
            pattern_min_history: 10,
            dominant_type_threshold: 10,
            error_rate_threshold: 25.0,
        }
    }
}

impl ErrorHandlerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_history == 0 {
            return Err(LocationError::ConfigError(
                "max_history must be greater than 0".to_string(),
            ));
        }

        if self.pattern_window == 0 {
            return Err(LocationError::ConfigError(
                "pattern_window must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// A handled error as kept in history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord<D = ()> {
    pub error: String,
    pub context: ErrorContext<D>,
    pub classification: ErrorClassification,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    pub total_errors: u64,
    pub errors_by_type: HashMap<ErrorType, u64>,
    pub errors_by_severity: HashMap<ErrorSeverity, u64>,
    pub recovery_attempts: u64,
    pub successful_recoveries: u64,
    /// Handled errors plus recorded successes
    pub total_operations: u64,
    /// `total_errors / total_operations * 100`
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub success: bool,
    pub strategy: RecoveryStrategy,
    pub user_message: String,
    pub technical_details: Option<String>,
    pub fallback_data: Option<Location>,
}

impl RecoveryResult {
    fn failed(strategy: RecoveryStrategy, user_message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            success: false,
            strategy,
            user_message: user_message.into(),
            technical_details: Some(details.into()),
            fallback_data: None,
        }
    }

    fn recovered(strategy: RecoveryStrategy, user_message: impl Into<String>, fallback: Option<Location>) -> Self {
        Self {
            success: true,
            strategy,
            user_message: user_message.into(),
            technical_details: None,
            fallback_data: fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub pattern: String,
    pub recommendation: String,
}

struct HandlerState<D> {
    history: VecDeque<ErrorRecord<D>>,
    stats: ErrorStats,
}

impl<D> HandlerState<D> {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            stats: ErrorStats::default(),
        }
    }

    fn record(&mut self, record: ErrorRecord<D>, max_history: usize) {
        let stats = &mut self.stats;
        stats.total_operations += 1;
        stats.total_errors += 1;
        *stats
            .errors_by_type
            .entry(record.classification.error_type)
            .or_default() += 1;
        *stats
            .errors_by_severity
            .entry(record.classification.severity)
            .or_default() += 1;

        self.history.push_back(record);
        while self.history.len() > max_history {
            self.history.pop_front();
        }
    }

    fn error_rate(&self) -> f64 {
        if self.stats.total_operations == 0 {
            0.0
        } else {
            self.stats.total_errors as f64 / self.stats.total_operations as f64 * 100.0
        }
    }
}

/// Routes failures through classification and recovery.
///
/// Never fails itself: every call yields a [`RecoveryResult`].
pub struct ErrorHandler<D = ()> {
    config: ErrorHandlerConfig,
    classifier: ErrorClassifier,
    cache: Arc<LocationCache<Location>>,
    state: RwLock<HandlerState<D>>,
}

impl ErrorHandler<()> {
    pub fn new(cache: Arc<LocationCache<Location>>) -> Self {
        Self::with_config(ErrorHandlerConfig::default(), cache)
    }
}

impl<D> ErrorHandler<D>
where
    D: Clone + Send + Sync,
{
    pub fn with_config(config: ErrorHandlerConfig, cache: Arc<LocationCache<Location>>) -> Self {
        Self {
            config,
            classifier: ErrorClassifier::default(),
            cache,
            state: RwLock::new(HandlerState::new()),
        }
    }

    /// Replace the classification table
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Classify the error, attempt recovery and record the outcome
    pub async fn handle_error(&self, err: &anyhow::Error, context: ErrorContext<D>) -> RecoveryResult {
        let classification = self.classifier.classify(err);

        error!(
            "Location error in {} ({}): {}",
            context.operation, classification.error_type, classification.technical_message
        );

        let result = self.attempt_recovery(err, &context, &classification).await;

        if result.success {
            info!(
                "Error recovery successful for {} via {}",
                context.operation, result.strategy
            );
        } else {
            warn!(
                "Error recovery failed for {} via {}",
                context.operation, result.strategy
            );
        }

        let record = ErrorRecord {
            error: format!("{:#}", err),
            context,
            classification,
            timestamp: Utc::now(),
        };

        let mut state = self.state.write().await;
        state.record(record, self.config.max_history);
        state.stats.recovery_attempts += 1;
        if result.success {
            state.stats.successful_recoveries += 1;
        }

        result
    }

    /// Record a failure from cache code as `cache_error`; no recovery is attempted
    pub async fn report_cache_error(&self, message: &str, context: ErrorContext<D>) -> ErrorClassification {
        let classification = self.classifier.cache_error(message);

        warn!("Cache error in {}: {}", context.operation, message);

        let record = ErrorRecord {
            error: message.to_string(),
            context,
            classification: classification.clone(),
            timestamp: Utc::now(),
        };
        self.state
            .write()
            .await
            .record(record, self.config.max_history);

        classification
    }

    /// Count an operation that completed without error
    pub async fn record_success(&self, operation: &str) {
        debug!("Operation succeeded: {}", operation);
        self.state.write().await.stats.total_operations += 1;
    }

    pub async fn get_error_stats(&self) -> ErrorStats {
        let state = self.state.read().await;

        ErrorStats {
            error_rate: state.error_rate(),
            ..state.stats.clone()
        }
    }

    /// Up to `limit` most recent records, oldest first
    pub async fn recent_errors(&self, limit: usize) -> Vec<ErrorRecord<D>> {
        let state = self.state.read().await;
        let skip = state.history.len().saturating_sub(limit);
        state.history.iter().skip(skip).cloned().collect()
    }

    /// Drop all history and reset statistics
    pub async fn clear_error_history(&self) {
        let mut state = self.state.write().await;
        state.history.clear();
        state.stats = ErrorStats::default();
        info!("Error history cleared");
    }

    /// Look for a dominant error type or an elevated error rate
    pub async fn detect_error_patterns(&self) -> Option<ErrorPattern> {
        let state = self.state.read().await;

        if state.history.len() < self.config.pattern_min_history {
            return None;
        }

        let window_start = state.history.len().saturating_sub(self.config.pattern_window);
        let mut counts: Vec<(ErrorType, usize)> = Vec::new();
        for record in state.history.iter().skip(window_start) {
            let error_type = record.classification.error_type;
            match counts.iter_mut().find(|(t, _)| *t == error_type) {
                Some((_, count)) => *count += 1,
                None => counts.push((error_type, 1)),
            }
        }

        // Ties go to the type seen first
        let dominant = counts
            .iter()
            .fold(None::<(ErrorType, usize)>, |best, &(t, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((t, count)),
            });

        if let Some((error_type, count)) = dominant {
            if count > self.config.dominant_type_threshold {
                return Some(ErrorPattern {
                    pattern: format!("Repeated {} errors", error_type),
                    recommendation: error_type.pattern_recommendation().to_string(),
                });
            }
        }

        let error_rate = state.error_rate();
        if error_rate > self.config.error_rate_threshold {
            return Some(ErrorPattern {
                pattern: format!("High error rate: {:.1}%", error_rate),
                recommendation: "Investigate system health and network connectivity".to_string(),
            });
        }

        None
    }

    async fn attempt_recovery(
        &self,
        err: &anyhow::Error,
        context: &ErrorContext<D>,
        classification: &ErrorClassification,
    ) -> RecoveryResult {
        match classification.strategy {
            RecoveryStrategy::Retry => RecoveryResult::failed(
                RecoveryStrategy::Retry,
                "Problema de conexão detectado. Tente novamente em alguns instantes.",
                format!("Retry suggested for: {:#}", err),
            ),

            RecoveryStrategy::FallbackCache => {
                let cached = match &context.location_id {
                    Some(location_id) => self.cache.get(&location_key(location_id)).await,
                    None => None,
                };

                match cached {
                    Some(location) => RecoveryResult::recovered(
                        RecoveryStrategy::FallbackCache,
                        "Usando dados salvos localmente.",
                        Some(location),
                    ),
                    None => RecoveryResult::failed(
                        RecoveryStrategy::FallbackCache,
                        "Nenhum dado em cache disponível.",
                        "No cached data found",
                    ),
                }
            }

            RecoveryStrategy::FallbackDefault => {
                let location_id = context.location_id.as_deref().unwrap_or("unknown");
                RecoveryResult::recovered(
                    RecoveryStrategy::FallbackDefault,
                    "Usando informações básicas do local.",
                    Some(Location::placeholder(location_id)),
                )
            }

            RecoveryStrategy::UserActionRequired => RecoveryResult::failed(
                RecoveryStrategy::UserActionRequired,
                classification.user_message.clone(),
                classification.technical_message.clone(),
            ),

            RecoveryStrategy::Escalate => {
                error!(
                    "Critical error escalated in {} (location: {:?}, user: {:?}): {:?}",
                    context.operation, context.location_id, context.user_id, err
                );
                RecoveryResult::failed(
                    RecoveryStrategy::Escalate,
                    "Erro crítico reportado. Nossa equipe foi notificada.",
                    "Error escalated to monitoring system",
                )
            }

            RecoveryStrategy::Ignore => RecoveryResult {
                technical_details: Some("Error ignored by policy".to_string()),
                ..RecoveryResult::recovered(
                    RecoveryStrategy::Ignore,
                    "Erro ignorado conforme configuração.",
                    None,
                )
            },
        }
    }
}
