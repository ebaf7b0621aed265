//! Transcript messages, stop reasons and token usage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;
use crate::ids::MessageId;
use crate::models::DocumentContext;

// ─────────────────────────────────────────────────────────────────────────────
// StopReason / TokenUsage
// ─────────────────────────────────────────────────────────────────────────────

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of the answer.
    EndTurn,
    /// `max_tokens` reached.
    MaxTokens,
    /// A configured stop sequence was emitted.
    StopSequence,
    /// The model wants to call a tool.
    ToolUse,
    /// Long-running turn paused by the server.
    PauseTurn,
    /// The model declined to answer.
    Refusal,
}

impl StopReason {
    /// Wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EndTurn => "end_turn",
            Self::MaxTokens => "max_tokens",
            Self::StopSequence => "stop_sequence",
            Self::ToolUse => "tool_use",
            Self::PauseTurn => "pause_turn",
            Self::Refusal => "refusal",
        }
    }
}

/// Input/output token counts reported by the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Generated tokens.
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Add another usage record into this one.
    pub fn accumulate(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    /// Input plus output.
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChatMessage
// ─────────────────────────────────────────────────────────────────────────────

/// Result tag of a transcript entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MessageOutcome {
    /// Normal message.
    #[default]
    Ok,
    /// Synthetic message standing in for a failed turn.
    Failed {
        /// Failure category.
        kind: ErrorKind,
    },
}

/// One transcript entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message ID.
    pub id: MessageId,
    /// Text; grows while streaming.
    pub text: String,
    /// Authored by the user.
    pub is_user: bool,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Contexts the answer was grounded on. Always empty for user messages.
    pub contexts: Vec<DocumentContext>,
    /// Tokens are still arriving.
    pub is_streaming: bool,
    /// The stream finished normally.
    pub streaming_complete: bool,
    /// Result tag.
    #[serde(default)]
    pub outcome: MessageOutcome,
    /// Stop reason of a finished assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

impl ChatMessage {
    fn base(text: String, is_user: bool) -> Self {
        Self {
            id: MessageId::new(),
            text,
            is_user,
            timestamp: Utc::now(),
            contexts: Vec::new(),
            is_streaming: false,
            streaming_complete: false,
            outcome: MessageOutcome::Ok,
            stop_reason: None,
        }
    }

    /// A user-authored message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::base(text.into(), true)
    }

    /// An empty assistant message about to receive streamed text.
    pub fn assistant_placeholder() -> Self {
        let mut m = Self::base(String::new(), false);
        m.is_streaming = true;
        m
    }

    /// A synthetic assistant-side message describing a failed turn.
    pub fn failure(kind: ErrorKind, text: impl Into<String>) -> Self {
        let mut m = Self::base(text.into(), false);
        m.outcome = MessageOutcome::Failed { kind };
        m
    }

    /// Append streamed text.
    pub fn append_delta(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    /// Mark a streamed message as finished.
    pub fn finalize(&mut self, stop_reason: StopReason, contexts: Vec<DocumentContext>) {
        self.is_streaming = false;
        self.streaming_complete = true;
        self.stop_reason = Some(stop_reason);
        self.contexts = contexts;
    }

    /// Whether this entry stands in for a failed turn.
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, MessageOutcome::Failed { .. })
    }
}
