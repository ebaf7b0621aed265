//! The LLM streaming seam.

use std::pin::Pin;

use async_trait::async_trait;
use docent_core::{StopReason, TokenUsage};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::Result;

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human.
    User,
    /// The model.
    Assistant,
}

/// One `{role, content}` entry of the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    /// Author.
    pub role: Role,
    /// Plain-text content.
    pub content: String,
}

impl LlmMessage {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A complete generation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmRequest {
    /// Model ID.
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Conversation, oldest first, ending with the user turn.
    pub messages: Vec<LlmMessage>,
}

/// Normalized streaming event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmEvent {
    /// Generation accepted; prompt size known.
    MessageStart {
        /// Prompt tokens.
        input_tokens: u64,
    },
    /// Incremental answer text.
    TextDelta {
        /// Text fragment.
        text: String,
    },
    /// Generation finished. Always the last event of a successful stream.
    Done {
        /// Why generation stopped.
        stop_reason: StopReason,
        /// Final usage.
        usage: TokenUsage,
    },
}

/// Boxed stream of [`LlmEvent`]s.
pub type LlmEventStream = Pin<Box<dyn Stream<Item = Result<LlmEvent>> + Send>>;

/// Streaming language model client.
///
/// A successful stream yields at most one `MessageStart`, any number of
/// `TextDelta`s and then exactly one `Done`, or ends with an error. When
/// `cancel` fires the stream yields [`LlmError::Cancelled`](crate::LlmError::Cancelled)
/// and the underlying request is dropped.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Start generating.
    async fn stream(&self, request: &LlmRequest, cancel: CancellationToken) -> Result<LlmEventStream>;
}
