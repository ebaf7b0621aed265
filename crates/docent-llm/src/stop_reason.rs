//! Stop reason mapping.

use docent_core::StopReason;
use tracing::warn;

/// Map a wire `stop_reason` to [`StopReason`].
///
/// `None` and unrecognized values map to `EndTurn`; unknown values are
/// logged so new server-side reasons do not go unnoticed.
pub fn map_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        Some("tool_use") => StopReason::ToolUse,
        Some("pause_turn") => StopReason::PauseTurn,
        Some("refusal") => StopReason::Refusal,
        Some("end_turn") | None => StopReason::EndTurn,
        Some(other) => {
            warn!(stop_reason = other, "unknown stop reason, treating as end_turn");
            StopReason::EndTurn
        }
    }
}
