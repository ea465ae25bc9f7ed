use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an error happened, supplied at the handling call site.
///
/// `D` carries call-site specific data; most callers use `()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext<D = ()> {
    pub operation: String,
    pub location_id: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub additional_data: Option<D>,
}

impl ErrorContext<()> {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            location_id: None,
            user_id: None,
            timestamp: Utc::now(),
            additional_data: None,
        }
    }
}

impl<D> ErrorContext<D> {
    pub fn with_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach call-site data, changing the payload type
    pub fn with_data<E>(self, data: E) -> ErrorContext<E> {
        ErrorContext {
            operation: self.operation,
            location_id: self.location_id,
            user_id: self.user_id,
            timestamp: self.timestamp,
            additional_data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Request {
        attempt: u32,
    }

    #[test]
    fn test_context_builder() {
        let context = ErrorContext::new("fetch_location")
            .with_location("loc-1")
            .with_user("user-7")
            .with_data(Request { attempt: 2 });

        assert_eq!(context.operation, "fetch_location");
        assert_eq!(context.location_id.as_deref(), Some("loc-1"));
        assert_eq!(context.user_id.as_deref(), Some("user-7"));
        assert_eq!(context.additional_data, Some(Request { attempt: 2 }));
    }
}
