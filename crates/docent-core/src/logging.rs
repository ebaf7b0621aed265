//! Tracing subscriber setup for binaries.
//!
//! Library crates only emit `tracing` events; the binary installs the
//! subscriber once at startup. Output goes to stderr so stdout stays free
//! for streamed answers.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Subscriber initialization failure.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The configured level is not a valid filter directive.
    #[error("invalid log filter '{filter}': {message}")]
    InvalidFilter {
        /// Offending directive.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Build the filter: `RUST_LOG` wins, otherwise `default_level`.
pub fn build_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_level).map_err(|e| LoggingError::InvalidFilter {
        filter: default_level.to_owned(),
        message: e.to_string(),
    })
}

/// Install the global `fmt` subscriber, optionally as JSON lines.
pub fn init_subscriber(default_level: &str, json: bool) -> Result<(), LoggingError> {
    let filter = build_filter(default_level)?;
    let result = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    };
    result.map_err(|e| LoggingError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn rejects_garbage_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = build_filter("docent=[[").unwrap_err();
        assert_matches!(err, LoggingError::InvalidFilter { .. });
    }

    #[test]
    fn accepts_plain_level() {
        assert!(build_filter("debug").is_ok());
    }
}
