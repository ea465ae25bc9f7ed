//! Error taxonomy and the rule table that maps failures onto it

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    NetworkError,
    ValidationError,
    NotFoundError,
    PermissionError,
    ServiceUnavailable,
    TimeoutError,
    DataCorruption,
    /// Only produced by explicit reports from cache code
    CacheError,
    UnknownError,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::NetworkError => "network_error",
            ErrorType::ValidationError => "validation_error",
            ErrorType::NotFoundError => "not_found_error",
            ErrorType::PermissionError => "permission_error",
            ErrorType::ServiceUnavailable => "service_unavailable",
            ErrorType::TimeoutError => "timeout_error",
            ErrorType::DataCorruption => "data_corruption",
            ErrorType::CacheError => "cache_error",
            ErrorType::UnknownError => "unknown_error",
        }
    }

    /// Remediation hint when this type dominates recent history
    pub fn pattern_recommendation(&self) -> &'static str {
        match self {
            ErrorType::NetworkError => "Verificar conectividade de rede e status dos serviços",
            ErrorType::ValidationError => "Revisar validação de dados de entrada",
            ErrorType::NotFoundError => "Verificar integridade dos dados de localização",
            ErrorType::PermissionError => "Revisar configurações de permissão e autenticação",
            ErrorType::ServiceUnavailable => "Verificar status dos serviços externos",
            ErrorType::TimeoutError => "Otimizar performance das consultas",
            ErrorType::DataCorruption => "Verificar integridade do banco de dados",
            ErrorType::CacheError => "Limpar e reconfigurar sistema de cache",
            ErrorType::UnknownError => "Investigar logs detalhados para identificar causa",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Suggest resubmitting; the handler never retries itself
    Retry,
    /// Serve `location:{id}` from the cache
    FallbackCache,
    /// Serve a placeholder record
    FallbackDefault,
    UserActionRequired,
    /// Log at error level for operators
    Escalate,
    Ignore,
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryStrategy::Retry => "retry",
            RecoveryStrategy::FallbackCache => "fallback_cache",
            RecoveryStrategy::FallbackDefault => "fallback_default",
            RecoveryStrategy::UserActionRequired => "user_action_required",
            RecoveryStrategy::Escalate => "escalate",
            RecoveryStrategy::Ignore => "ignore",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub error_type: ErrorType,
    pub severity: ErrorSeverity,
    pub is_recoverable: bool,
    pub strategy: RecoveryStrategy,
    /// Localized text safe to show to end users
    pub user_message: String,
    pub technical_message: String,
}

/// One row of the classification table.
///
/// Matches when any message marker occurs in the lower-cased error message
/// or any detail marker occurs in the lower-cased debug rendering.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub error_type: ErrorType,
    pub severity: ErrorSeverity,
    pub strategy: RecoveryStrategy,
    pub is_recoverable: bool,
    pub user_message: String,
    /// Prefix of the technical message
    pub label: String,
    pub message_markers: Vec<String>,
    pub detail_markers: Vec<String>,
}

impl ClassificationRule {
    pub fn new(error_type: ErrorType, severity: ErrorSeverity, strategy: RecoveryStrategy) -> Self {
        Self {
            error_type,
            severity,
            strategy,
            is_recoverable: true,
            user_message: String::new(),
            label: error_type.to_string(),
            message_markers: Vec::new(),
            detail_markers: Vec::new(),
        }
    }

    pub fn recoverable(mut self, is_recoverable: bool) -> Self {
        self.is_recoverable = is_recoverable;
        self
    }

    pub fn user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = message.into();
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Markers are lower-cased on registration
    pub fn matching(mut self, markers: &[&str]) -> Self {
        self.message_markers
            .extend(markers.iter().map(|m| m.to_lowercase()));
        self
    }

    pub fn matching_detail(mut self, markers: &[&str]) -> Self {
        self.detail_markers
            .extend(markers.iter().map(|m| m.to_lowercase()));
        self
    }

    /// Both inputs must already be lower-cased
    pub fn matches(&self, message: &str, detail: &str) -> bool {
        self.message_markers.iter().any(|m| message.contains(m.as_str()))
            || self.detail_markers.iter().any(|m| detail.contains(m.as_str()))
    }

    pub fn classification(&self, raw_message: &str) -> ErrorClassification {
        ErrorClassification {
            error_type: self.error_type,
            severity: self.severity,
            is_recoverable: self.is_recoverable,
            strategy: self.strategy,
            user_message: self.user_message.clone(),
            technical_message: format!("{}: {}", self.label, raw_message),
        }
    }
}

/// Ordered rule table; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
    fallback: ClassificationRule,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            rules: builtin_rules(),
            fallback: ClassificationRule::new(
                ErrorType::UnknownError,
                ErrorSeverity::Medium,
                RecoveryStrategy::Retry,
            )
            .user_message("Erro inesperado. Tentando novamente...")
            .label("Unknown error"),
        }
    }
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule ahead of every existing one
    pub fn with_rule(mut self, rule: ClassificationRule) -> Self {
        self.rules.insert(0, rule);
        self
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify from the rendered message and the full debug rendering
    pub fn classify_parts(&self, message: &str, detail: &str) -> ErrorClassification {
        let message_lower = message.to_lowercase();
        let detail_lower = detail.to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.matches(&message_lower, &detail_lower))
            .unwrap_or(&self.fallback)
            .classification(message)
    }

    pub fn classify(&self, error: &anyhow::Error) -> ErrorClassification {
        self.classify_parts(&format!("{:#}", error), &format!("{:?}", error))
    }

    pub fn is_recoverable(&self, error: &anyhow::Error) -> bool {
        self.classify(error).is_recoverable
    }

    pub fn user_message(&self, error: &anyhow::Error) -> String {
        self.classify(error).user_message
    }

    /// Classification for failures reported by cache code
    pub fn cache_error(&self, message: &str) -> ErrorClassification {
        ClassificationRule::new(
            ErrorType::CacheError,
            ErrorSeverity::Medium,
            RecoveryStrategy::Ignore,
        )
        .user_message("Erro no cache local. Os dados serão recarregados.")
        .label("Cache error")
        .classification(message)
    }
}

fn builtin_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::new(
            ErrorType::NetworkError,
            ErrorSeverity::Medium,
            RecoveryStrategy::Retry,
        )
        .user_message("Problema de conexão. Tentando novamente...")
        .label("Network error")
        .matching(&["network", "fetch", "connection", "timeout"]),
        ClassificationRule::new(
            ErrorType::NotFoundError,
            ErrorSeverity::Low,
            RecoveryStrategy::UserActionRequired,
        )
        .recoverable(false)
        .user_message("Local não encontrado. Verifique se o local ainda está disponível.")
        .label("Resource not found")
        .matching(&["not found", "404"])
        .matching_detail(&["pgrst116"]),
        ClassificationRule::new(
            ErrorType::PermissionError,
            ErrorSeverity::High,
            RecoveryStrategy::Escalate,
        )
        .recoverable(false)
        .user_message("Você não tem permissão para acessar este local.")
        .label("Permission denied")
        .matching(&["permission", "unauthorized", "forbidden"])
        .matching_detail(&["pgrst301"]),
        ClassificationRule::new(
            ErrorType::ValidationError,
            ErrorSeverity::Low,
            RecoveryStrategy::UserActionRequired,
        )
        .user_message("Dados inválidos. Verifique as informações fornecidas.")
        .label("Validation error")
        .matching(&["validation", "invalid", "formato"]),
        ClassificationRule::new(
            ErrorType::ServiceUnavailable,
            ErrorSeverity::High,
            RecoveryStrategy::FallbackCache,
        )
        .user_message("Serviço temporariamente indisponível. Usando dados em cache.")
        .label("Service unavailable")
        .matching(&["service unavailable", "502", "503", "504"]),
        ClassificationRule::new(
            ErrorType::TimeoutError,
            ErrorSeverity::Medium,
            RecoveryStrategy::Retry,
        )
        .user_message("Operação demorou muito para responder. Tentando novamente...")
        .label("Timeout error")
        .matching(&["timeout", "timed out"]),
        ClassificationRule::new(
            ErrorType::DataCorruption,
            ErrorSeverity::High,
            RecoveryStrategy::FallbackDefault,
        )
        .user_message("Dados corrompidos detectados. Usando valores padrão.")
        .label("Data corruption")
        .matching(&["corrupt", "malformed", "parse"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn classify(message: &str) -> ErrorClassification {
        ErrorClassifier::new().classify(&anyhow!(message.to_string()))
    }

    #[test]
    fn test_builtin_classifications() {
        let network = classify("Network request failed");
        assert_eq!(network.error_type, ErrorType::NetworkError);
        assert_eq!(network.strategy, RecoveryStrategy::Retry);

        let not_found = classify("Location not found");
        assert_eq!(not_found.error_type, ErrorType::NotFoundError);
        assert_eq!(not_found.strategy, RecoveryStrategy::UserActionRequired);
        assert!(!not_found.is_recoverable);

        assert_eq!(classify("403 Forbidden").error_type, ErrorType::PermissionError);
        assert_eq!(classify("Invalid CEP").error_type, ErrorType::ValidationError);
        assert_eq!(
            classify("HTTP 503 Service Unavailable").strategy,
            RecoveryStrategy::FallbackCache
        );
        assert_eq!(classify("request timed out").error_type, ErrorType::TimeoutError);
        assert_eq!(classify("malformed JSON").strategy, RecoveryStrategy::FallbackDefault);
        assert_eq!(classify("something odd").error_type, ErrorType::UnknownError);
    }

    #[test]
    fn test_first_match_wins() {
        // "timeout" is listed under network errors before the timeout rule
        assert_eq!(classify("Gateway timeout").error_type, ErrorType::NetworkError);
        // "fetch" beats "not found"
        assert_eq!(classify("fetch failed: not found").error_type, ErrorType::NetworkError);
    }

    #[test]
    fn test_detail_markers() {
        let classifier = ErrorClassifier::new();
        let classification =
            classifier.classify_parts("row lookup failed", "PostgrestError { code: \"PGRST116\" }");
        assert_eq!(classification.error_type, ErrorType::NotFoundError);
    }

    #[test]
    fn test_classification_is_deterministic() {
        assert_eq!(classify("Network request failed"), classify("Network request failed"));
    }

    #[test]
    fn test_context_chain_is_classified() {
        let error = anyhow!("connection reset").context("loading location loc-1");
        let classification = ErrorClassifier::new().classify(&error);

        assert_eq!(classification.error_type, ErrorType::NetworkError);
        assert_eq!(
            classification.technical_message,
            "Network error: loading location loc-1: connection reset"
        );
    }

    #[test]
    fn test_custom_rule_takes_precedence() {
        let classifier = ErrorClassifier::new().with_rule(
            ClassificationRule::new(
                ErrorType::NetworkError,
                ErrorSeverity::Low,
                RecoveryStrategy::Ignore,
            )
            .matching(&["aborted by client"]),
        );

        let classification = classifier.classify(&anyhow!("fetch aborted by client"));
        assert_eq!(classification.strategy, RecoveryStrategy::Ignore);
    }

    #[test]
    fn test_helpers() {
        let classifier = ErrorClassifier::new();
        assert!(classifier.is_recoverable(&anyhow!("network down")));
        assert!(!classifier.is_recoverable(&anyhow!("unauthorized")));
        assert_eq!(
            classifier.user_message(&anyhow!("not found")),
            "Local não encontrado. Verifique se o local ainda está disponível."
        );

        let cache = classifier.cache_error("warm-up failed");
        assert_eq!(cache.error_type, ErrorType::CacheError);
        assert_eq!(cache.technical_message, "Cache error: warm-up failed");
    }
}
