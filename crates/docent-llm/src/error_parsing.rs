//! API error response parsing.
//!
//! Handles the standard envelope `{"type":"error","error":{"type":"...","message":"..."}}`
//! and falls back to the raw body for anything else.

use serde_json::Value;

use crate::errors::{ApiError, ApiErrorKind};

/// Parse a non-2xx response body into an [`ApiError`].
pub fn parse_api_error(body: &str, status: u16, retry_after_ms: Option<u64>) -> ApiError {
    let fallback_kind = ApiErrorKind::from_status(status);

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = json["error"]["message"].as_str() {
            let kind = json["error"]["type"]
                .as_str()
                .map_or(fallback_kind, ApiErrorKind::from_wire);
            return ApiError {
                kind,
                status: Some(status),
                message: msg.to_string(),
                retry_after_ms,
            };
        }
        if let Some(msg) = json["message"].as_str() {
            return ApiError {
                kind: fallback_kind,
                status: Some(status),
                message: msg.to_string(),
                retry_after_ms,
            };
        }
    }

    ApiError {
        kind: fallback_kind,
        status: Some(status),
        message: format!("HTTP {status}: {body}"),
        retry_after_ms,
    }
}

/// Parse a `retry-after` header value given in seconds.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| (s * 1000.0) as u64)
}
