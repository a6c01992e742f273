use serde::{Deserialize, Serialize};

/// Body of `POST /api/qr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrRequest {
    pub text: String,
}

/// Success body: the encoded image as a `data:image/png;base64,...` URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrResponse {
    #[serde(rename = "qrCode")]
    pub qr_code: String,
}

/// Failure body. The message strings are part of the wire contract:
/// `"Text is required"` for validation failures, `"Failed to generate QR
/// code"` for encoder failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub const ERROR_TEXT_REQUIRED: &str = "Text is required";
pub const ERROR_GENERATION_FAILED: &str = "Failed to generate QR code";

impl ErrorBody {
    pub fn text_required() -> Self {
        Self {
            error: ERROR_TEXT_REQUIRED.to_string(),
        }
    }

    pub fn generation_failed() -> Self {
        Self {
            error: ERROR_GENERATION_FAILED.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_body_uses_camel_case_key() {
        let body = QrResponse {
            qr_code: "data:image/png;base64,AAAA".to_string(),
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["qrCode"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn error_bodies_match_wire_contract() {
        let json = serde_json::to_value(ErrorBody::text_required()).expect("serialize");
        assert_eq!(json["error"], "Text is required");

        let json = serde_json::to_value(ErrorBody::generation_failed()).expect("serialize");
        assert_eq!(json["error"], "Failed to generate QR code");
    }
}
