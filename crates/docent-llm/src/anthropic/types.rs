//! Anthropic Messages API wire types.

use serde::{Deserialize, Serialize};

use crate::client::{LlmMessage, LlmRequest};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// `anthropic-version` header value.
pub const API_VERSION: &str = "2023-06-01";

/// Client configuration.
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// API key sent as `x-api-key`.
    pub api_key: String,
    /// Base URL without the `/v1/messages` path.
    pub base_url: String,
    /// Whole-request timeout in seconds; `None` disables it.
    pub timeout_secs: Option<u64>,
}

impl AnthropicConfig {
    /// Config with the default base URL and no timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
        }
    }
}

/// Request body of `POST /v1/messages`.
#[derive(Debug, Serialize)]
pub struct AnthropicRequest<'a> {
    /// Model ID.
    pub model: &'a str,
    /// Generation cap.
    pub max_tokens: u32,
    /// Conversation.
    pub messages: &'a [LlmMessage],
    /// System prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    /// Always `true`.
    pub stream: bool,
}

impl<'a> From<&'a LlmRequest> for AnthropicRequest<'a> {
    fn from(req: &'a LlmRequest) -> Self {
        Self {
            model: &req.model,
            max_tokens: req.max_tokens,
            messages: &req.messages,
            system: req.system.as_deref(),
            stream: true,
        }
    }
}

/// Token usage block.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SseUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Generated tokens.
    #[serde(default)]
    pub output_tokens: u64,
}

/// `message` of a `message_start` event.
#[derive(Clone, Debug, Deserialize)]
pub struct SseMessage {
    /// Usage so far.
    #[serde(default)]
    pub usage: SseUsage,
}

/// `delta` of a `content_block_delta` event.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseDelta {
    /// Answer text.
    TextDelta {
        /// Fragment.
        text: String,
    },
    /// Thinking, tool input or signature deltas; ignored.
    #[serde(other)]
    Other,
}

/// `delta` of a `message_delta` event.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SseMessageDelta {
    /// Final stop reason.
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Error payload of an in-stream `error` event.
#[derive(Clone, Debug, Deserialize)]
pub struct SseError {
    /// Wire error type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Message.
    pub message: String,
}

/// One SSE payload.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicSseEvent {
    /// Start of the response.
    MessageStart {
        /// Message envelope.
        message: SseMessage,
    },
    /// Content block opened.
    ContentBlockStart {
        /// Block index.
        #[serde(default)]
        index: usize,
    },
    /// Content block fragment.
    ContentBlockDelta {
        /// Block index.
        #[serde(default)]
        index: usize,
        /// Fragment.
        delta: SseDelta,
    },
    /// Content block closed.
    ContentBlockStop {
        /// Block index.
        #[serde(default)]
        index: usize,
    },
    /// Stop reason and output usage.
    MessageDelta {
        /// Delta fields.
        #[serde(default)]
        delta: SseMessageDelta,
        /// Usage update.
        #[serde(default)]
        usage: SseUsage,
    },
    /// End of the response.
    MessageStop,
    /// Keep-alive.
    Ping,
    /// Server-side failure mid-stream.
    Error {
        /// Error payload.
        error: SseError,
    },
    /// Event types this client does not know.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn request_serializes_wire_fields() {
        let req = LlmRequest {
            model: "m".into(),
            max_tokens: 64,
            system: Some("be brief".into()),
            messages: vec![LlmMessage::user("hi")],
        };
        let json = serde_json::to_value(AnthropicRequest::from(&req)).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(json["stream"], true);
        assert_eq!(json["system"], "be brief");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn request_omits_absent_system() {
        let req = LlmRequest {
            model: "m".into(),
            max_tokens: 1,
            system: None,
            messages: vec![],
        };
        let json = serde_json::to_value(AnthropicRequest::from(&req)).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn parses_text_delta() {
        let ev: AnthropicSseEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        )
        .unwrap();
        assert_matches!(
            ev,
            AnthropicSseEvent::ContentBlockDelta { delta: SseDelta::TextDelta { ref text }, .. } if text == "Hi"
        );
    }

    #[test]
    fn non_text_delta_is_other() {
        let ev: AnthropicSseEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{"}}"#,
        )
        .unwrap();
        assert_matches!(
            ev,
            AnthropicSseEvent::ContentBlockDelta {
                delta: SseDelta::Other,
                ..
            }
        );
    }

    #[test]
    fn parses_message_delta() {
        let ev: AnthropicSseEvent = serde_json::from_str(
            r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens","stop_sequence":null},"usage":{"output_tokens":15}}"#,
        )
        .unwrap();
        assert_matches!(
            ev,
            AnthropicSseEvent::MessageDelta { ref delta, ref usage }
                if delta.stop_reason.as_deref() == Some("max_tokens") && usage.output_tokens == 15
        );
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let ev: AnthropicSseEvent =
            serde_json::from_str(r#"{"type":"brand_new_event","x":1}"#).unwrap();
        assert_matches!(ev, AnthropicSseEvent::Unknown);
    }

    #[test]
    fn parses_error_event() {
        let ev: AnthropicSseEvent = serde_json::from_str(
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )
        .unwrap();
        assert_matches!(ev, AnthropicSseEvent::Error { ref error } if error.kind == "overloaded_error");
    }
}
