// API request/response models (DTOs)

use serde::{Deserialize, Serialize};

/// Query string of `POST /read`. Kept as text so a malformed id reaches the
/// handler instead of being rejected by the extractor.
#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    #[serde(rename = "productId")]
    pub product_id: Option<String>,
}

impl ReadQuery {
    pub fn parsed_id(&self) -> Option<i64> {
        self.product_id.as_deref()?.trim().parse().ok()
    }
}

/// `{ "message": ... }` body used for failures.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `{ "message": "Success", "data": ... }` envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            message: "Success".to_string(),
            data,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_query_accepts_only_numeric_ids() {
        let q = |v: Option<&str>| ReadQuery {
            product_id: v.map(str::to_string),
        };
        assert_eq!(q(Some("881234")).parsed_id(), Some(881234));
        assert_eq!(q(Some(" 42 ")).parsed_id(), Some(42));
        assert_eq!(q(Some("abc")).parsed_id(), None);
        assert_eq!(q(Some("")).parsed_id(), None);
        assert_eq!(q(None).parsed_id(), None);
    }

    #[test]
    fn success_envelope_shape() {
        let body = serde_json::to_value(DataResponse::success(vec![1, 2])).unwrap();
        assert_eq!(body, serde_json::json!({"message": "Success", "data": [1, 2]}));
    }
}
