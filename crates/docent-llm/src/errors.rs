//! LLM client errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of an API error, from the wire `error.type` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// Malformed or invalid request.
    InvalidRequest,
    /// Missing or bad API key.
    Authentication,
    /// Key lacks permission for the resource.
    Permission,
    /// Unknown model or endpoint.
    NotFound,
    /// Request body exceeds the size limit.
    RequestTooLarge,
    /// Too many requests.
    RateLimit,
    /// Internal server error.
    Api,
    /// Server temporarily overloaded.
    Overloaded,
    /// Anything else.
    Unknown,
}

impl ApiErrorKind {
    /// Parse the wire `error.type` string.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "invalid_request_error" => Self::InvalidRequest,
            "authentication_error" => Self::Authentication,
            "permission_error" => Self::Permission,
            "not_found_error" => Self::NotFound,
            "request_too_large" => Self::RequestTooLarge,
            "rate_limit_error" => Self::RateLimit,
            "api_error" => Self::Api,
            "overloaded_error" => Self::Overloaded,
            _ => Self::Unknown,
        }
    }

    /// Best guess from the HTTP status when the body carries no type.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::Permission,
            404 => Self::NotFound,
            413 => Self::RequestTooLarge,
            429 => Self::RateLimit,
            529 => Self::Overloaded,
            500..=599 => Self::Api,
            _ => Self::Unknown,
        }
    }

    /// Wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request_error",
            Self::Authentication => "authentication_error",
            Self::Permission => "permission_error",
            Self::NotFound => "not_found_error",
            Self::RequestTooLarge => "request_too_large",
            Self::RateLimit => "rate_limit_error",
            Self::Api => "api_error",
            Self::Overloaded => "overloaded_error",
            Self::Unknown => "unknown_error",
        }
    }

    /// Whether a later retry may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Api | Self::Overloaded)
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error returned by the model API.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    /// Error category.
    pub kind: ApiErrorKind,
    /// HTTP status. `None` for errors delivered inside the event stream.
    pub status: Option<u16>,
    /// Human-readable message.
    pub message: String,
    /// Server-suggested delay before retrying.
    pub retry_after_ms: Option<u64>,
}

impl ApiError {
    /// Whether a later retry may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable() || self.status.is_some_and(|s| s == 429 || s >= 500)
    }
}

/// Errors from an [`LlmClient`](crate::LlmClient).
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response or in-stream error event.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Stream broke or ended without a terminal event.
    #[error("stream error: {message}")]
    Stream {
        /// Error description.
        message: String,
    },

    /// Request serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The caller cancelled generation.
    #[error("generation cancelled")]
    Cancelled,

    /// Missing or unusable credentials.
    #[error("auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },
}

impl LlmError {
    /// Shorthand for [`LlmError::Stream`].
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LlmError>;
