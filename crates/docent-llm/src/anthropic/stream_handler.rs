//! Anthropic SSE stream handler.
//!
//! Converts raw SSE payloads into normalized [`LlmEvent`]s. Usage and the
//! stop reason arrive on `message_start` / `message_delta` and are carried
//! in [`StreamState`] until `message_stop` produces the final `Done`.

use docent_core::TokenUsage;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::types::{AnthropicSseEvent, SseDelta};
use crate::client::{LlmEvent, LlmEventStream};
use crate::errors::{ApiError, ApiErrorKind, LlmError, Result};
use crate::stop_reason::map_stop_reason;

/// State accumulated across SSE events.
#[derive(Clone, Debug, Default)]
pub struct StreamState {
    /// Prompt tokens from `message_start`.
    pub input_tokens: u64,
    /// Output tokens from `message_delta`.
    pub output_tokens: u64,
    /// Raw stop reason from `message_delta`.
    pub stop_reason: Option<String>,
    /// `message_stop` has been seen.
    pub finished: bool,
}

/// Process one SSE event. Returns the normalized event to emit, if any.
pub fn process_sse_event(event: AnthropicSseEvent, state: &mut StreamState) -> Result<Option<LlmEvent>> {
    match event {
        AnthropicSseEvent::MessageStart { message } => {
            state.input_tokens = message.usage.input_tokens;
            debug!(input_tokens = state.input_tokens, "message_start");
            Ok(Some(LlmEvent::MessageStart {
                input_tokens: state.input_tokens,
            }))
        }
        AnthropicSseEvent::ContentBlockDelta {
            delta: SseDelta::TextDelta { text },
            ..
        } => Ok(Some(LlmEvent::TextDelta { text })),
        AnthropicSseEvent::MessageDelta { delta, usage } => {
            if delta.stop_reason.is_some() {
                state.stop_reason = delta.stop_reason;
            }
            state.output_tokens = usage.output_tokens;
            Ok(None)
        }
        AnthropicSseEvent::MessageStop => {
            state.finished = true;
            Ok(Some(LlmEvent::Done {
                stop_reason: map_stop_reason(state.stop_reason.as_deref()),
                usage: TokenUsage {
                    input_tokens: state.input_tokens,
                    output_tokens: state.output_tokens,
                },
            }))
        }
        AnthropicSseEvent::Error { error } => Err(LlmError::Api(ApiError {
            kind: ApiErrorKind::from_wire(&error.kind),
            status: None,
            message: error.message,
            retry_after_ms: None,
        })),
        AnthropicSseEvent::ContentBlockDelta { .. }
        | AnthropicSseEvent::ContentBlockStart { .. }
        | AnthropicSseEvent::ContentBlockStop { .. }
        | AnthropicSseEvent::Ping
        | AnthropicSseEvent::Unknown => Ok(None),
    }
}

/// Turn a stream of SSE payloads into an [`LlmEventStream`].
///
/// Ends after `Done`, after the first error, or when `cancel` fires. A
/// payload stream that ends before `message_stop` yields a stream error.
/// Unparseable payloads are logged and skipped.
pub fn sse_to_event_stream<S>(lines: S, cancel: CancellationToken) -> LlmEventStream
where
    S: Stream<Item = Result<String>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut lines = Box::pin(lines);
        let mut state = StreamState::default();
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                next = lines.next() => Some(next),
            };
            let Some(next) = next else {
                yield Err(LlmError::Cancelled);
                return;
            };
            let line = match next {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    yield Err(e);
                    return;
                }
                None => {
                    yield Err(LlmError::stream("stream ended before message_stop"));
                    return;
                }
            };
            let event: AnthropicSseEvent = match serde_json::from_str(&line) {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "failed to parse SSE event");
                    continue;
                }
            };
            match process_sse_event(event, &mut state) {
                Ok(Some(ev)) => {
                    let done = matches!(ev, LlmEvent::Done { .. });
                    yield Ok(ev);
                    if done {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    })
}
