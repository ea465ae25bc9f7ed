//! Cache key conventions for location data

use super::types::CacheKey;

/// Key for a single location record
pub fn location_key(location_id: &str) -> CacheKey {
    format!("location:{}", location_id)
}

/// Key for a location listing; `None` is the unfiltered list
pub fn location_list_key(params: Option<&serde_json::Value>) -> CacheKey {
    match params {
        Some(params) => format!("locations:{}", params),
        None => "locations:all".to_string(),
    }
}

/// Key for a location's time slots on a given date
pub fn location_time_slots_key(location_id: &str, date: &str) -> CacheKey {
    format!("location:{}:timeslots:{}", location_id, date)
}

/// Key for a location's status
pub fn location_status_key(location_id: &str) -> CacheKey {
    format!("location:{}:status", location_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_keys() {
        assert_eq!(location_key("test-location-1"), "location:test-location-1");
        assert_eq!(
            location_time_slots_key("test-location-1", "2024-01-15"),
            "location:test-location-1:timeslots:2024-01-15"
        );
        assert_eq!(
            location_status_key("test-location-1"),
            "location:test-location-1:status"
        );
    }

    #[test]
    fn test_location_list_key() {
        assert_eq!(location_list_key(None), "locations:all");

        let params = serde_json::json!({ "cidade": "Recife" });
        assert_eq!(location_list_key(Some(&params)), r#"locations:{"cidade":"Recife"}"#);
    }
}
