//! Model gateway error types

use thiserror::Error;

/// Gateway error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::InvalidRequest, message)
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Stream, message)
    }

    /// Classify a non-2xx HTTP response
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = error_detail(body);
        match status {
            401 | 403 => Self::auth(format!("Authentication failed ({status}): {detail}")),
            429 => Self::rate_limit(format!("Rate limited: {detail}")),
            400..=499 => Self::invalid_request(format!("Request rejected ({status}): {detail}")),
            500..=599 => Self::server_error(format!("Server error ({status}): {detail}")),
            _ => Self::new(
                LlmErrorKind::Unknown,
                format!("Unexpected status {status}: {detail}"),
            ),
        }
    }
}

/// Pull `error.message` out of an OpenAI-style error body, else the raw body
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Where in the request lifecycle the failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Connection failures, timeouts
    Network,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Authentication failed (401, 403) or no key configured
    Auth,
    /// Bad request (other 4xx)
    InvalidRequest,
    /// The body broke off or could not be decoded mid-stream
    Stream,
    Unknown,
}

impl LlmErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::ServerError => "server_error",
            Self::Auth => "auth",
            Self::InvalidRequest => "invalid_request",
            Self::Stream => "stream",
            Self::Unknown => "unknown",
        }
    }
}
