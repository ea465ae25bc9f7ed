use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Only `Error` makes a record invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A rule violation, reported against the field's wire name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Violations of every severity
    pub errors: Vec<ValidationError>,
    /// Consistency notes and rules that failed to run
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub(crate) fn from_parts(errors: Vec<ValidationError>, warnings: Vec<String>) -> Self {
        let is_valid = !errors.iter().any(|e| e.severity == Severity::Error);
        Self {
            is_valid,
            errors,
            warnings,
        }
    }

    /// Entries with the given severity
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.severity == severity)
    }

    /// Entries reported against `field`
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.errors.iter().filter(move |e| e.field == field)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStats {
    pub total_rules: usize,
    pub rules_by_field: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_ignores_warnings_and_info() {
        let result = ValidationResult::from_parts(
            vec![
                ValidationError::new("telefone", "bad phone", Severity::Warning),
                ValidationError::new("facilidades", "bad facility", Severity::Info),
            ],
            vec![],
        );
        assert!(result.is_valid);

        let result = ValidationResult::from_parts(
            vec![ValidationError::new("cidade", "missing", Severity::Error)],
            vec![],
        );
        assert!(!result.is_valid);
        assert_eq!(result.with_severity(Severity::Error).count(), 1);
        assert_eq!(result.for_field("cidade").count(), 1);
    }

    #[test]
    fn test_severity_serialization() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}
