//! # Location Validation
//!
//! Rule engine for candidate location records. A record is checked in order
//! for required fields, per-field rules (all of them, no short-circuit),
//! cross-field consistency, business rules and finally data freshness.
//! Only `error` severity entries make a record invalid.
//!
//! ```rust
//! use location_reliability::location::Location;
//! use location_reliability::validation::{LocationValidator, Severity};
//!
//! let validator = LocationValidator::new();
//! let result = validator.validate_location(&Location::new("loc-1"));
//!
//! assert!(!result.is_valid);
//! assert!(result.for_field("cidade").any(|e| e.severity == Severity::Error));
//! ```

pub mod rules;
pub mod types;
pub mod validator;

pub use rules::{format_validation_errors, validate_cep, validate_email, validate_phone, ValidationRule};
pub use types::{RuleStats, Severity, ValidationError, ValidationResult};
pub use validator::LocationValidator;
