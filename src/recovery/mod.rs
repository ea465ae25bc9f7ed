//! # Error Recovery
//!
//! Maps arbitrary failures onto a fixed taxonomy with a table of substring
//! rules, runs the recovery strategy attached to the matching entry, and
//! keeps a bounded history for statistics and pattern detection.
//!
//! | type                  | severity | strategy               |
//! |-----------------------|----------|------------------------|
//! | `network_error`       | medium   | `retry`                |
//! | `not_found_error`     | low      | `user_action_required` |
//! | `permission_error`    | high     | `escalate`             |
//! | `validation_error`    | low      | `user_action_required` |
//! | `service_unavailable` | high     | `fallback_cache`       |
//! | `timeout_error`       | medium   | `retry`                |
//! | `data_corruption`     | high     | `fallback_default`     |
//! | `unknown_error`       | medium   | `retry`                |
//!
//! `cache_error` has no matching rule; it is recorded through
//! [`ErrorHandler::report_cache_error`].

pub mod classify;
pub mod context;
pub mod handler;

pub use classify::{
    ClassificationRule, ErrorClassification, ErrorClassifier, ErrorSeverity, ErrorType,
    RecoveryStrategy,
};
pub use context::ErrorContext;
pub use handler::{ErrorHandler, ErrorHandlerConfig, ErrorPattern, ErrorRecord, ErrorStats, RecoveryResult};
