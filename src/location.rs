//! Location record model
//!
//! Mirrors the establishment records served by the data source. Field names on
//! the wire are the source's own (`nome_local`, `cidade`, ...); the Rust fields
//! are English. Everything but `id` is optional so partially filled candidates
//! can go through validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operational status of an establishment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationStatus {
    #[serde(rename = "ativo")]
    Active,
    #[serde(rename = "temporariamente_fechado")]
    TemporarilyClosed,
    #[serde(rename = "manutencao")]
    Maintenance,
}

impl LocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationStatus::Active => "ativo",
            LocationStatus::TemporarilyClosed => "temporariamente_fechado",
            LocationStatus::Maintenance => "manutencao",
        }
    }
}

impl fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ativo" => Ok(LocationStatus::Active),
            "temporariamente_fechado" => Ok(LocationStatus::TemporarilyClosed),
            "manutencao" => Ok(LocationStatus::Maintenance),
            other => Err(format!("unknown location status: {}", other)),
        }
    }
}

/// Facility kinds an establishment may advertise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacilityType {
    #[serde(rename = "estacionamento")]
    Parking,
    #[serde(rename = "acessibilidade")]
    Accessibility,
    #[serde(rename = "farmacia")]
    Pharmacy,
    #[serde(rename = "laboratorio")]
    Laboratory,
    #[serde(rename = "wifi")]
    Wifi,
    #[serde(rename = "ar_condicionado")]
    AirConditioning,
    #[serde(rename = "elevador")]
    Elevator,
    #[serde(rename = "cafe")]
    Cafe,
    #[serde(rename = "banheiro_adaptado")]
    AccessibleRestroom,
    #[serde(rename = "sala_espera_criancas")]
    ChildrenWaitingRoom,
}

impl FacilityType {
    pub const ALL: [FacilityType; 10] = [
        FacilityType::Parking,
        FacilityType::Accessibility,
        FacilityType::Pharmacy,
        FacilityType::Laboratory,
        FacilityType::Wifi,
        FacilityType::AirConditioning,
        FacilityType::Elevator,
        FacilityType::Cafe,
        FacilityType::AccessibleRestroom,
        FacilityType::ChildrenWaitingRoom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityType::Parking => "estacionamento",
            FacilityType::Accessibility => "acessibilidade",
            FacilityType::Pharmacy => "farmacia",
            FacilityType::Laboratory => "laboratorio",
            FacilityType::Wifi => "wifi",
            FacilityType::AirConditioning => "ar_condicionado",
            FacilityType::Elevator => "elevador",
            FacilityType::Cafe => "cafe",
            FacilityType::AccessibleRestroom => "banheiro_adaptado",
            FacilityType::ChildrenWaitingRoom => "sala_espera_criancas",
        }
    }
}

impl FromStr for FacilityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FacilityType::ALL
            .iter()
            .copied()
            .find(|facility| facility.as_str() == s)
            .ok_or_else(|| format!("unknown facility type: {}", s))
    }
}

/// Precision tag attached to coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatePrecision {
    #[serde(rename = "exata")]
    Exact,
    #[serde(rename = "aproximada")]
    Approximate,
}

impl FromStr for CoordinatePrecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exata" => Ok(CoordinatePrecision::Exact),
            "aproximada" => Ok(CoordinatePrecision::Approximate),
            other => Err(format!("unknown coordinate precision: {}", other)),
        }
    }
}

/// Geographic position of an establishment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
    /// Raw precision tag (`exata` | `aproximada`)
    #[serde(rename = "precisao")]
    pub precision: String,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64, precision: CoordinatePrecision) -> Self {
        let precision = match precision {
            CoordinatePrecision::Exact => "exata",
            CoordinatePrecision::Approximate => "aproximada",
        };
        Self {
            lat,
            lng,
            precision: precision.to_string(),
        }
    }
}

/// A facility entry; `facility_type` is kept raw so unknown kinds can be reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    #[serde(rename = "type")]
    pub facility_type: String,
    pub available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
}

impl Facility {
    pub fn new(facility_type: FacilityType, available: bool) -> Self {
        Self {
            facility_type: facility_type.as_str().to_string(),
            available: Some(available),
            details: None,
            cost: None,
        }
    }
}

/// Opening hours for a single weekday
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    #[serde(rename = "abertura")]
    pub opens_at: String,
    #[serde(rename = "fechamento")]
    pub closes_at: String,
    #[serde(rename = "fechado", default)]
    pub closed: bool,
}

impl OperatingHours {
    pub fn open(opens_at: impl Into<String>, closes_at: impl Into<String>) -> Self {
        Self {
            opens_at: opens_at.into(),
            closes_at: closes_at.into(),
            closed: false,
        }
    }

    pub fn closed() -> Self {
        Self {
            opens_at: String::new(),
            closes_at: String::new(),
            closed: true,
        }
    }
}

/// Weekly opening hours, keyed by Portuguese weekday names on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    #[serde(rename = "segunda", default, skip_serializing_if = "Option::is_none")]
    pub monday: Option<OperatingHours>,
    #[serde(rename = "terca", default, skip_serializing_if = "Option::is_none")]
    pub tuesday: Option<OperatingHours>,
    #[serde(rename = "quarta", default, skip_serializing_if = "Option::is_none")]
    pub wednesday: Option<OperatingHours>,
    #[serde(rename = "quinta", default, skip_serializing_if = "Option::is_none")]
    pub thursday: Option<OperatingHours>,
    #[serde(rename = "sexta", default, skip_serializing_if = "Option::is_none")]
    pub friday: Option<OperatingHours>,
    #[serde(rename = "sabado", default, skip_serializing_if = "Option::is_none")]
    pub saturday: Option<OperatingHours>,
    #[serde(rename = "domingo", default, skip_serializing_if = "Option::is_none")]
    pub sunday: Option<OperatingHours>,
}

impl WeeklySchedule {
    /// Same hours on every day of the week
    pub fn every_day(hours: OperatingHours) -> Self {
        Self {
            monday: Some(hours.clone()),
            tuesday: Some(hours.clone()),
            wednesday: Some(hours.clone()),
            thursday: Some(hours.clone()),
            friday: Some(hours.clone()),
            saturday: Some(hours.clone()),
            sunday: Some(hours),
        }
    }

    /// Present days paired with their wire name, Monday first
    pub fn days(&self) -> impl Iterator<Item = (&'static str, &OperatingHours)> {
        [
            ("segunda", self.monday.as_ref()),
            ("terca", self.tuesday.as_ref()),
            ("quarta", self.wednesday.as_ref()),
            ("quinta", self.thursday.as_ref()),
            ("sexta", self.friday.as_ref()),
            ("sabado", self.saturday.as_ref()),
            ("domingo", self.sunday.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, hours)| hours.map(|h| (name, h)))
    }
}

/// An establishment (clinic/hospital) record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,

    // Basic info
    #[serde(rename = "nome_local", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "endereco_completo", default, skip_serializing_if = "Option::is_none")]
    pub full_address: Option<String>,
    #[serde(rename = "bairro", default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(rename = "cidade", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "cep", default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    // Contact
    #[serde(rename = "telefone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    // Geography, schedule, facilities
    #[serde(rename = "coordenadas", default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(rename = "horario_funcionamento", default, skip_serializing_if = "Option::is_none")]
    pub operating_hours: Option<WeeklySchedule>,
    #[serde(rename = "facilidades", default, skip_serializing_if = "Option::is_none")]
    pub facilities: Option<Vec<Facility>>,

    // Status
    /// Raw status string (`ativo` | `temporariamente_fechado` | `manutencao`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "motivo_fechamento", default, skip_serializing_if = "Option::is_none")]
    pub closure_reason: Option<String>,
    #[serde(rename = "previsao_reabertura", default, skip_serializing_if = "Option::is_none")]
    pub reopening_estimate: Option<String>,

    // Metadata
    #[serde(rename = "ultima_atualizacao", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(rename = "verificado_em", default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(rename = "fonte_dados", default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,

    // Additional info
    #[serde(rename = "descricao", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "instrucoes_acesso", default, skip_serializing_if = "Option::is_none")]
    pub access_instructions: Option<String>,
    #[serde(rename = "observacoes_especiais", default, skip_serializing_if = "Option::is_none")]
    pub special_notes: Option<String>,
}

impl Location {
    /// Create an otherwise empty record with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Minimal stand-in used when real data is unavailable or corrupted
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some("Local Indisponível".to_string()),
            full_address: Some("Endereço não disponível".to_string()),
            status: Some(LocationStatus::TemporarilyClosed.as_str().to_string()),
            closure_reason: Some("Dados temporariamente indisponíveis".to_string()),
            ..Default::default()
        }
    }

    /// Parsed status, if present and recognised
    pub fn parsed_status(&self) -> Option<LocationStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    /// Parse a record from the data source's JSON representation
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to the data source's JSON representation
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [
            LocationStatus::Active,
            LocationStatus::TemporarilyClosed,
            LocationStatus::Maintenance,
        ] {
            assert_eq!(status.as_str().parse::<LocationStatus>(), Ok(status));
        }
        assert!("fechado".parse::<LocationStatus>().is_err());
    }

    #[test]
    fn test_facility_type_parse() {
        assert_eq!("wifi".parse::<FacilityType>(), Ok(FacilityType::Wifi));
        assert_eq!(
            "sala_espera_criancas".parse::<FacilityType>(),
            Ok(FacilityType::ChildrenWaitingRoom)
        );
        assert!("piscina".parse::<FacilityType>().is_err());
    }

    #[test]
    fn test_wire_names() {
        let mut location = Location::new("loc-1");
        location.name = Some("Clínica Central".to_string());
        location.city = Some("Campinas".to_string());
        location.coordinates = Some(Coordinates::new(-22.9, -47.06, CoordinatePrecision::Exact));

        let json = location.to_json().unwrap();
        assert!(json.contains("\"nome_local\":\"Clínica Central\""));
        assert!(json.contains("\"cidade\":\"Campinas\""));
        assert!(json.contains("\"precisao\":\"exata\""));
        assert!(!json.contains("telefone"));
    }

    #[test]
    fn test_from_json_keeps_unknown_status_raw() {
        let json = r#"{
            "id": "loc-2",
            "nome_local": "Posto de Saúde",
            "status": "desativado",
            "horario_funcionamento": {
                "segunda": { "abertura": "07:00", "fechamento": "17:00", "fechado": false },
                "domingo": { "abertura": "", "fechamento": "", "fechado": true }
            },
            "facilidades": [{ "type": "wifi", "available": true }]
        }"#;

        let location = Location::from_json(json).unwrap();
        assert_eq!(location.status.as_deref(), Some("desativado"));
        assert_eq!(location.parsed_status(), None);

        let schedule = location.operating_hours.unwrap();
        let days: Vec<_> = schedule.days().map(|(name, _)| name).collect();
        assert_eq!(days, vec!["segunda", "domingo"]);
    }

    #[test]
    fn test_placeholder() {
        let placeholder = Location::placeholder("loc-9");
        assert_eq!(placeholder.id, "loc-9");
        assert_eq!(placeholder.parsed_status(), Some(LocationStatus::TemporarilyClosed));
        assert!(placeholder.closure_reason.is_some());
    }
}
