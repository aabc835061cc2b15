use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body the backend attaches to non-success responses (`{"error": "..."}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl BackendErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            message: None,
        }
    }

    /// The most specific human-readable text the body carries.
    pub fn text(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Error)]
#[error("backend rejected request ({status}): {message}")]
pub struct BackendRejection {
    pub status: u16,
    pub message: String,
}

impl BackendRejection {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn from_body(status: u16, body: &BackendErrorBody) -> Self {
        let message = body
            .text()
            .map(str::to_string)
            .unwrap_or_else(|| format!("server error {status}"));
        Self { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_field_wins_over_message() {
        let body: BackendErrorBody =
            serde_json::from_str(r#"{"error":"disk full","message":"ignored"}"#).expect("body");
        assert_eq!(body.text(), Some("disk full"));
    }

    #[test]
    fn blank_body_falls_back_to_status_text() {
        let body: BackendErrorBody = serde_json::from_str(r#"{"error":"  "}"#).expect("body");
        let rejection = BackendRejection::from_body(500, &body);
        assert_eq!(rejection.message, "server error 500");
    }
}
