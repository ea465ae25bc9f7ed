//! Location validator: required fields, field rules, cross-field and business checks

use super::rules::{builtin_rules, ValidationRule};
use super::types::{RuleStats, Severity, ValidationError, ValidationResult};
use crate::location::{Location, LocationStatus};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

const REQUIRED_FIELDS: [&str; 4] = ["nome_local", "endereco_completo", "cidade", "estado"];

const STALE_UPDATE_DAYS: i64 = 30;
const STALE_VERIFICATION_DAYS: i64 = 90;

/// Validates candidate location records.
///
/// Stateless apart from its rule set; validation never fails, every problem
/// is reported in the returned [`ValidationResult`].
#[derive(Debug)]
pub struct LocationValidator {
    rules: Vec<ValidationRule>,
}

impl Default for LocationValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationValidator {
    /// Validator with the built-in rule set
    pub fn new() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }

    /// Register an additional rule
    pub fn add_rule(&mut self, rule: ValidationRule) {
        info!(
            "Custom validation rule added: {} on {}",
            rule.name, rule.field
        );
        self.rules.push(rule);
    }

    pub fn rule_stats(&self) -> RuleStats {
        let mut stats = RuleStats {
            total_rules: self.rules.len(),
            ..Default::default()
        };
        for rule in &self.rules {
            *stats.rules_by_field.entry(rule.field.clone()).or_default() += 1;
        }
        stats
    }

    /// Validate a complete candidate record
    pub fn validate_location(&self, location: &Location) -> ValidationResult {
        self.validate_location_at(location, Utc::now())
    }

    /// Validate as of `now`, which only affects the staleness warnings
    pub fn validate_location_at(&self, location: &Location, now: DateTime<Utc>) -> ValidationResult {
        debug!("Starting location validation: {}", location.id);

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for field in REQUIRED_FIELDS {
            if is_blank(required_value(location, field)) {
                errors.push(ValidationError::new(
                    field,
                    format!("Campo obrigatório não preenchido: {}", display_name(field)),
                    Severity::Error,
                ));
            }
        }

        for rule in &self.rules {
            match rule.check(location) {
                Ok(true) => {}
                Ok(false) => errors.push(rule.violation()),
                Err(e) => {
                    error!(
                        "Validation rule {} on {} failed to execute: {}",
                        rule.name, rule.field, e
                    );
                    warnings.push(format!(
                        "Erro na validação do campo {}: {}",
                        rule.field, rule.name
                    ));
                }
            }
        }

        errors.extend(cross_field_checks(location));
        errors.extend(business_checks(location));
        warnings.extend(consistency_warnings(location, now));

        let result = ValidationResult::from_parts(errors, warnings);

        debug!(
            "Location validation completed: {} (valid: {}, errors: {}, warnings: {})",
            location.id,
            result.is_valid,
            result.errors.len(),
            result.warnings.len()
        );
        result
    }

    /// Run only the rules registered for `field`
    pub fn validate_field(&self, field: &str, location: &Location) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for rule in self.rules.iter().filter(|rule| rule.field == field) {
            match rule.check(location) {
                Ok(true) => {}
                Ok(false) => errors.push(rule.violation()),
                Err(e) => {
                    error!("Field validation {} on {} failed: {}", rule.name, field, e);
                    warnings.push(format!("Erro na validação: {}", rule.name));
                }
            }
        }

        ValidationResult::from_parts(errors, warnings)
    }
}

fn required_value<'a>(location: &'a Location, field: &str) -> Option<&'a str> {
    match field {
        "nome_local" => location.name.as_deref(),
        "endereco_completo" => location.full_address.as_deref(),
        "cidade" => location.city.as_deref(),
        "estado" => location.state.as_deref(),
        _ => None,
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn display_name(field: &str) -> &str {
    match field {
        "nome_local" => "Nome do Local",
        "endereco_completo" => "Endereço Completo",
        "cidade" => "Cidade",
        "estado" => "Estado",
        "cep" => "CEP",
        "telefone" => "Telefone",
        "email" => "Email",
        "status" => "Status",
        "coordenadas" => "Coordenadas",
        "horario_funcionamento" => "Horário de Funcionamento",
        "facilidades" => "Facilidades",
        other => other,
    }
}

fn cross_field_checks(location: &Location) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    match location.parsed_status() {
        Some(LocationStatus::TemporarilyClosed) if is_blank(location.closure_reason.as_deref()) => {
            errors.push(ValidationError::new(
                "motivo_fechamento",
                "Local fechado deve ter motivo especificado",
                Severity::Warning,
            ));
        }
        Some(LocationStatus::Maintenance) if is_blank(location.reopening_estimate.as_deref()) => {
            errors.push(ValidationError::new(
                "previsao_reabertura",
                "Local em manutenção deve ter previsão de reabertura",
                Severity::Info,
            ));
        }
        _ => {}
    }

    if let (Some(address), Some(city), Some(_)) = (
        non_blank(&location.full_address),
        non_blank(&location.city),
        non_blank(&location.state),
    ) {
        if !address.to_lowercase().contains(&city.to_lowercase()) {
            errors.push(ValidationError::new(
                "endereco_completo",
                "Endereço deve conter o nome da cidade",
                Severity::Warning,
            ));
        }
    }

    errors
}

fn business_checks(location: &Location) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let has_contact = [&location.phone, &location.whatsapp, &location.email]
        .into_iter()
        .any(|channel| non_blank(channel).is_some());

    if !has_contact {
        errors.push(ValidationError::new(
            "telefone",
            "Local deve ter pelo menos uma forma de contato (telefone, WhatsApp ou email)",
            Severity::Warning,
        ));
    }

    if let Some(schedule) = &location.operating_hours {
        if !schedule.days().any(|(_, hours)| !hours.closed) {
            errors.push(ValidationError::new(
                "horario_funcionamento",
                "Local deve ter pelo menos um dia de funcionamento",
                Severity::Warning,
            ));
        }
    }

    errors
}

fn consistency_warnings(location: &Location, now: DateTime<Utc>) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(updated) = location.last_updated {
        let days = (now - updated).num_days();
        if days > STALE_UPDATE_DAYS {
            warnings.push(format!("Dados não atualizados há {} dias", days));
        }
    }

    if let Some(verified) = location.verified_at {
        let days = (now - verified).num_days();
        if days > STALE_VERIFICATION_DAYS {
            warnings.push(format!("Dados não verificados há {} dias", days));
        }
    }

    let mut missing = Vec::new();
    if location.coordinates.is_none() {
        missing.push("coordenadas");
    }
    if non_blank(&location.website).is_none() {
        missing.push("website");
    }
    if location.facilities.is_none() {
        missing.push("facilidades");
    }
    if !missing.is_empty() {
        warnings.push(format!(
            "Campos opcionais importantes não preenchidos: {}",
            missing.join(", ")
        ));
    }

    warnings
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
