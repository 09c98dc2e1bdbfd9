//! Error types for the Quay client

use serde::Deserialize;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl ClientError {
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Build an API error from a response body, unwrapping `{"error": ...}` when present
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.to_string());
        Self::api_error(status, message)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Duplicate task or registration, or a conflicting pipeline reference
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_body_unwraps_error_field() {
        let err = ClientError::from_body(409, r#"{"error": "task a already exists"}"#);
        assert!(err.is_conflict());
        assert!(err.is_client_error());
        assert_eq!(
            err.to_string(),
            "API error (status 409): task a already exists"
        );
    }

    #[test]
    fn test_from_body_keeps_plain_text() {
        let err = ClientError::from_body(502, "Bad Gateway");
        assert!(err.is_server_error());
        assert!(!err.is_not_found());
        assert!(matches!(err, ClientError::ApiError { ref message, .. } if message == "Bad Gateway"));
    }
}
