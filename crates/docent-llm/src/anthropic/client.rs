//! Anthropic Messages API client implementing [`LlmClient`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use super::stream_handler::sse_to_event_stream;
use super::types::{API_VERSION, AnthropicConfig, AnthropicRequest};
use crate::client::{LlmClient, LlmEventStream, LlmRequest};
use crate::error_parsing::{parse_api_error, parse_retry_after};
use crate::errors::{LlmError, Result};
use crate::sse::parse_sse_lines;

/// Streaming client for `POST /v1/messages`.
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: reqwest::Client,
}

impl AnthropicClient {
    /// Create a client. Fails when the API key is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Auth {
                message: "API key is empty".into(),
            });
        }
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            config,
            client: builder.build()?,
        })
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        let _ = headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| LlmError::Auth {
                message: format!("invalid API key header: {e}"),
            })?,
        );
        Ok(headers)
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    #[instrument(skip_all, fields(model = %request.model, messages = request.messages.len()))]
    async fn stream(&self, request: &LlmRequest, cancel: CancellationToken) -> Result<LlmEventStream> {
        let body = AnthropicRequest::from(request);
        let headers = self.build_headers()?;
        debug!(max_tokens = body.max_tokens, has_system = body.system.is_some(), "sending request");

        let send = self.client.post(self.url()).headers(headers).json(&body).send();
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(LlmError::Cancelled),
            response = send => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = response.text().await.unwrap_or_default();
            let err = parse_api_error(&text, status.as_u16(), retry_after);
            error!(
                status = status.as_u16(),
                kind = %err.kind,
                retryable = err.is_retryable(),
                "model API error"
            );
            return Err(LlmError::Api(err));
        }

        let lines = parse_sse_lines(response.bytes_stream());
        Ok(sse_to_event_stream(lines, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LlmMessage;

    fn client() -> AnthropicClient {
        AnthropicClient::new(AnthropicConfig::new("test-key")).unwrap()
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = AnthropicClient::new(AnthropicConfig::new("  ")).err().unwrap();
        assert!(matches!(err, LlmError::Auth { .. }));
    }

    #[test]
    fn headers_carry_key_and_version() {
        let headers = client().build_headers().unwrap();
        assert_eq!(headers["x-api-key"], "test-key");
        assert_eq!(headers["anthropic-version"], API_VERSION);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn url_tolerates_trailing_slash() {
        let mut config = AnthropicConfig::new("k");
        config.base_url = "http://localhost:9999/".into();
        let c = AnthropicClient::new(config).unwrap();
        assert_eq!(c.url(), "http://localhost:9999/v1/messages");
    }

    #[test]
    fn body_is_built_from_request() {
        let req = LlmRequest {
            model: "m".into(),
            max_tokens: 10,
            system: None,
            messages: vec![LlmMessage::user("q")],
        };
        let body = AnthropicRequest::from(&req);
        assert!(body.stream);
        assert_eq!(body.messages.len(), 1);
    }
}
