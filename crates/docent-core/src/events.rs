//! Event types for turn processing.
//!
//! Two event families:
//!
//! - **[`TurnEvent`]**: what the caller of `submit_turn` receives, in order:
//!   zero or more `PartialText`, then exactly one `Done` or `Error`.
//! - **[`SessionEvent`]**: lifecycle notifications broadcast to observers
//!   (turn start, phase transitions, completion, failure).
//!
//! Neither family is persisted.

use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;
use crate::ids::TurnId;
use crate::messages::{StopReason, TokenUsage};

// ─────────────────────────────────────────────────────────────────────────────
// TurnEvent
// ─────────────────────────────────────────────────────────────────────────────

/// One item of a turn's output stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Incremental answer text.
    PartialText {
        /// Text fragment.
        delta: String,
    },
    /// The turn failed; no further events follow.
    Error {
        /// Failure category.
        kind: ErrorKind,
        /// User-facing description.
        message: String,
    },
    /// The answer finished; no further events follow.
    Done {
        /// Why generation stopped.
        #[serde(rename = "stopReason")]
        stop_reason: StopReason,
        /// Token usage reported by the model.
        usage: TokenUsage,
    },
}

impl TurnEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TurnPhase
// ─────────────────────────────────────────────────────────────────────────────

/// Per-turn state machine.
///
/// `Idle → BuildingContext → AwaitingModel → Streaming → Complete`, with
/// any state able to move to `Failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// No turn in progress.
    #[default]
    Idle,
    /// Running the context pipeline.
    BuildingContext,
    /// Prompt sent, waiting for the first token.
    AwaitingModel,
    /// Tokens arriving.
    Streaming,
    /// Finished normally.
    Complete,
    /// Aborted by an error or cancellation.
    Failed,
}

impl TurnPhase {
    /// Whether a generation is in flight or about to be.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::BuildingContext | Self::AwaitingModel | Self::Streaming
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: TurnPhase) -> bool {
        use TurnPhase::{AwaitingModel, BuildingContext, Complete, Failed, Idle, Streaming};
        match (self, next) {
            (Idle | Complete | Failed, BuildingContext)
            | (BuildingContext, AwaitingModel)
            | (AwaitingModel, Streaming)
            | (Streaming | AwaitingModel, Complete) => true,
            (from, Failed) => from != Idle,
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Common fields for all session events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Session this event belongs to.
    pub session_id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a new base event with the current UTC timestamp.
    #[must_use]
    pub fn now(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Lifecycle notification broadcast to observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A turn was accepted.
    TurnStarted {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Turn ID.
        #[serde(rename = "turnId")]
        turn_id: TurnId,
    },
    /// The turn moved to another phase.
    PhaseChanged {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Turn ID.
        #[serde(rename = "turnId")]
        turn_id: TurnId,
        /// New phase.
        phase: TurnPhase,
    },
    /// The turn finished normally.
    TurnCompleted {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Turn ID.
        #[serde(rename = "turnId")]
        turn_id: TurnId,
        /// Why generation stopped.
        #[serde(rename = "stopReason")]
        stop_reason: StopReason,
        /// Token usage of this turn.
        usage: TokenUsage,
    },
    /// The turn failed or was cancelled.
    TurnFailed {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Turn ID.
        #[serde(rename = "turnId")]
        turn_id: TurnId,
        /// Failure category.
        kind: ErrorKind,
        /// User-facing description.
        message: String,
    },
}

impl SessionEvent {
    /// Session the event belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            Self::TurnStarted { base, .. }
            | Self::PhaseChanged { base, .. }
            | Self::TurnCompleted { base, .. }
            | Self::TurnFailed { base, .. } => &base.session_id,
        }
    }

    /// Turn the event belongs to.
    pub fn turn_id(&self) -> &TurnId {
        match self {
            Self::TurnStarted { turn_id, .. }
            | Self::PhaseChanged { turn_id, .. }
            | Self::TurnCompleted { turn_id, .. }
            | Self::TurnFailed { turn_id, .. } => turn_id,
        }
    }

    /// Snake-case discriminator.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TurnStarted { .. } => "turn_started",
            Self::PhaseChanged { .. } => "phase_changed",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::TurnFailed { .. } => "turn_failed",
        }
    }
}
