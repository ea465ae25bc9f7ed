//! Field rules and the format checks they are built from

use super::types::{Severity, ValidationError};
use crate::location::{
    CoordinatePrecision, Coordinates, Facility, FacilityType, Location, LocationStatus,
    OperatingHours, WeeklySchedule,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(\d{2}\)\s\d{4,5}-\d{4}$").expect("Invalid phone regex"));

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex"));

static CEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}-?\d{3}$").expect("Invalid CEP regex"));

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]?[0-9]|2[0-3]):[0-5][0-9]$").expect("Invalid time regex"));

type RuleCheck = dyn Fn(&Location) -> Result<bool, String> + Send + Sync;

/// A single check on one field of a location.
///
/// The check returns `Ok(false)` on a violation and `Err` when it could not
/// run at all; the validator reports the latter as a warning.
pub struct ValidationRule {
    pub name: String,
    /// Wire name of the field the rule reports against
    pub field: String,
    pub message: String,
    pub severity: Severity,
    check: Box<RuleCheck>,
}

impl ValidationRule {
    pub fn new<F>(
        name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        check: F,
    ) -> Self
    where
        F: Fn(&Location) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            field: field.into(),
            message: message.into(),
            severity,
            check: Box::new(check),
        }
    }

    /// Infallible variant of [`ValidationRule::new`]
    pub fn simple<F>(
        name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        check: F,
    ) -> Self
    where
        F: Fn(&Location) -> bool + Send + Sync + 'static,
    {
        Self::new(name, field, message, severity, move |location| Ok(check(location)))
    }

    pub fn check(&self, location: &Location) -> Result<bool, String> {
        (self.check)(location)
    }

    pub(crate) fn violation(&self) -> ValidationError {
        ValidationError::new(self.field.clone(), self.message.clone(), self.severity)
    }
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

/// Phone in `(DD) DDDD-DDDD` or `(DD) DDDDD-DDDD`; absent is fine
pub fn validate_phone(phone: Option<&str>) -> bool {
    phone.map_or(true, |p| p.is_empty() || PHONE_RE.is_match(p))
}

pub fn validate_email(email: Option<&str>) -> bool {
    email.map_or(true, |e| e.is_empty() || EMAIL_RE.is_match(e))
}

/// CEP as five plus three digits, hyphen optional
pub fn validate_cep(cep: Option<&str>) -> bool {
    cep.map_or(true, |c| c.is_empty() || CEP_RE.is_match(c))
}

/// `field: message` per entry, for display
pub fn format_validation_errors(errors: &[ValidationError]) -> Vec<String> {
    errors.iter().map(ToString::to_string).collect()
}

pub(crate) fn validate_coordinates(coordinates: &Coordinates) -> bool {
    (-90.0..=90.0).contains(&coordinates.lat)
        && (-180.0..=180.0).contains(&coordinates.lng)
        && coordinates.precision.parse::<CoordinatePrecision>().is_ok()
}

pub(crate) fn validate_operating_hours(schedule: &WeeklySchedule) -> bool {
    schedule.days().all(|(_, hours)| validate_day_hours(hours))
}

fn validate_day_hours(hours: &OperatingHours) -> bool {
    if hours.closed {
        return true;
    }

    match (minutes_of_day(&hours.opens_at), minutes_of_day(&hours.closes_at)) {
        (Some(opens), Some(closes)) => opens < closes,
        _ => false,
    }
}

/// `HH:MM` (24h) to minutes since midnight
fn minutes_of_day(time: &str) -> Option<u32> {
    if !TIME_RE.is_match(time) {
        return None;
    }
    let (hours, minutes) = time.split_once(':')?;
    Some(hours.parse::<u32>().ok()? * 60 + minutes.parse::<u32>().ok()?)
}

pub(crate) fn validate_facilities(facilities: &[Facility]) -> bool {
    facilities.iter().all(|facility| {
        facility.facility_type.parse::<FacilityType>().is_ok() && facility.available.is_some()
    })
}

/// Rules every validator starts with
pub(crate) fn builtin_rules() -> Vec<ValidationRule> {
    vec![
        ValidationRule::simple(
            "required_string",
            "nome_local",
            "Nome do local deve ter pelo menos 2 caracteres",
            Severity::Error,
            |l| l.name.as_deref().map_or(true, |v| v.trim().chars().count() >= 2),
        ),
        ValidationRule::simple(
            "required_address",
            "endereco_completo",
            "Endereço deve ter pelo menos 10 caracteres",
            Severity::Error,
            |l| {
                l.full_address
                    .as_deref()
                    .map_or(true, |v| v.trim().chars().count() >= 10)
            },
        ),
        ValidationRule::simple(
            "phone_format",
            "telefone",
            "Telefone deve estar no formato (XX) XXXXX-XXXX",
            Severity::Warning,
            |l| validate_phone(l.phone.as_deref()),
        ),
        ValidationRule::simple(
            "email_format",
            "email",
            "Email deve ter formato válido",
            Severity::Warning,
            |l| validate_email(l.email.as_deref()),
        ),
        ValidationRule::simple(
            "cep_format",
            "cep",
            "CEP deve estar no formato XXXXX-XXX",
            Severity::Warning,
            |l| validate_cep(l.postal_code.as_deref()),
        ),
        ValidationRule::simple(
            "coordinates_format",
            "coordenadas",
            "Coordenadas devem ter latitude e longitude válidas",
            Severity::Warning,
            |l| l.coordinates.as_ref().map_or(true, validate_coordinates),
        ),
        ValidationRule::simple(
            "operating_hours",
            "horario_funcionamento",
            "Horários de funcionamento devem ter formato válido",
            Severity::Warning,
            |l| l.operating_hours.as_ref().map_or(true, validate_operating_hours),
        ),
        ValidationRule::simple(
            "facilities_format",
            "facilidades",
            "Facilidades devem ter formato válido",
            Severity::Info,
            |l| l.facilities.as_deref().map_or(true, validate_facilities),
        ),
        ValidationRule::simple(
            "valid_status",
            "status",
            "Status deve ser: ativo, temporariamente_fechado ou manutencao",
            Severity::Error,
            |l| {
                l.status
                    .as_deref()
                    .map_or(true, |s| s.is_empty() || s.parse::<LocationStatus>().is_ok())
            },
        ),
    ]
}
