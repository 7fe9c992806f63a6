//! Error taxonomy for session and API operations.
//!
//! Every failure in the connect path is terminal for that call and leaves
//! the session untouched. Nothing here retries.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// The server name did not resolve to any address.
    #[error("Could not resolve host '{host}'")]
    Resolution {
        host: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The TCP reachability probe failed or timed out.
    #[error("Port {port} on {host} is unreachable (no connection within {timeout:?})")]
    PortUnreachable {
        host: String,
        port: u16,
        timeout: Duration,
    },

    #[error("Unsupported protocol '{0}', expected http or https")]
    InvalidProtocol(String),

    #[error("Port must be between 1 and 65535")]
    InvalidPort,

    /// Transport failure or non-2xx response from the token endpoint.
    /// `message` carries the remote status description.
    #[error("Token request to {uri} failed: {message}")]
    TokenRequest {
        uri: String,
        status: Option<StatusCode>,
        message: String,
    },

    /// 2xx token response without one of the required fields.
    #[error("Token response is missing required fields: {}", .missing.join(", "))]
    IncompleteToken { missing: Vec<&'static str> },

    #[error("Invalid token response from {uri}: {message}")]
    InvalidTokenResponse { uri: String, message: String },

    #[error("Not connected - call connect first")]
    NotConnected,

    #[error("Session expired at {expiry} and no credentials were retained - reconnect required")]
    SessionExpired { expiry: DateTime<Utc> },

    #[error("API error {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl SessionError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        SessionError::Api {
            status,
            body: Self::truncate_body(body),
        }
    }

    /// Build a `TokenRequest` error for a rejected token POST.
    pub(crate) fn token_rejected(uri: &str, status: StatusCode, body: &str) -> Self {
        let body = Self::truncate_body(body);
        let message = if body.trim().is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, body)
        };
        SessionError::TokenRequest {
            uri: uri.to_string(),
            status: Some(status),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_body_is_kept() {
        assert_eq!(SessionError::truncate_body("oops"), "oops");
    }

    #[test]
    fn long_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = SessionError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated, 520 total bytes"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY_LENGTH);
        // Must not panic on a multi-byte boundary.
        let truncated = SessionError::truncate_body(&body);
        assert!(truncated.contains("truncated"));
    }

    #[test]
    fn token_rejection_includes_status_and_uri() {
        let err = SessionError::token_rejected(
            "https://nms.example:9644/api/v1/token",
            StatusCode::UNAUTHORIZED,
            r#"{"error":"invalid_grant"}"#,
        );
        let msg = err.to_string();
        assert!(msg.contains("https://nms.example:9644/api/v1/token"));
        assert!(msg.contains("401 Unauthorized"));
        assert!(msg.contains("invalid_grant"));
    }

    #[test]
    fn token_rejection_with_empty_body_uses_status_text() {
        let err = SessionError::token_rejected("http://h:1/t", StatusCode::BAD_GATEWAY, "");
        match err {
            SessionError::TokenRequest { message, status, .. } => {
                assert_eq!(message, "502 Bad Gateway");
                assert_eq!(status, Some(StatusCode::BAD_GATEWAY));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn incomplete_token_lists_missing_fields() {
        let err = SessionError::IncompleteToken {
            missing: vec!["access_token", "expires_in"],
        };
        assert_eq!(
            err.to_string(),
            "Token response is missing required fields: access_token, expires_in"
        );
    }

    #[test]
    fn api_error_from_status_truncates() {
        let body = "y".repeat(1000);
        match SessionError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            SessionError::Api { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(body.len() < 600);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SessionError>();
    }
}
