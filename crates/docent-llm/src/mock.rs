//! Scriptable [`LlmClient`] for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docent_core::{StopReason, TokenUsage};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::client::{LlmClient, LlmEvent, LlmEventStream, LlmRequest};
use crate::errors::{ApiError, LlmError, Result};

#[derive(Clone)]
struct Script {
    deltas: Vec<String>,
    stop_reason: StopReason,
    usage: TokenUsage,
    fail_before_stream: Option<ApiError>,
    fail_after: Option<(usize, String)>,
    delay: Option<Duration>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            deltas: vec!["ok".to_string()],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 1,
            },
            fail_before_stream: None,
            fail_after: None,
            delay: None,
        }
    }
}

/// Test double streaming scripted text.
///
/// Every call records its request, then yields `MessageStart`, one
/// `TextDelta` per scripted delta (sleeping `delay` before each) and
/// `Done`. Failures can be injected before the stream opens or after a
/// number of deltas. Honours the cancellation token between deltas.
#[derive(Default)]
pub struct MockLlmClient {
    script: Mutex<Script>,
    calls: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    /// Mock answering `"ok"` with `end_turn`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the streamed deltas.
    #[must_use]
    pub fn with_deltas<I, S>(self, deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.lock().deltas = deltas.into_iter().map(Into::into).collect();
        self
    }

    /// Script the stop reason.
    #[must_use]
    pub fn with_stop_reason(self, reason: StopReason) -> Self {
        self.script.lock().stop_reason = reason;
        self
    }

    /// Script the reported usage.
    #[must_use]
    pub fn with_usage(self, usage: TokenUsage) -> Self {
        self.script.lock().usage = usage;
        self
    }

    /// Fail every call before the stream opens.
    pub fn fail_with(&self, err: ApiError) {
        self.script.lock().fail_before_stream = Some(err);
    }

    /// Break every stream with a stream error after `after` deltas.
    pub fn fail_mid_stream(&self, after: usize, message: impl Into<String>) {
        self.script.lock().fail_after = Some((after, message.into()));
    }

    /// Sleep before each delta.
    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().delay = Some(delay);
    }

    /// Calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<LlmRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn stream(&self, request: &LlmRequest, cancel: CancellationToken) -> Result<LlmEventStream> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let script = self.script.lock().clone();
        if let Some(err) = script.fail_before_stream {
            return Err(LlmError::Api(err));
        }

        Ok(Box::pin(async_stream::stream! {
            yield Ok(LlmEvent::MessageStart { input_tokens: script.usage.input_tokens });
            for (i, delta) in script.deltas.into_iter().enumerate() {
                if let Some((after, ref message)) = script.fail_after {
                    if i == after {
                        yield Err(LlmError::stream(message.clone()));
                        return;
                    }
                }
                if let Some(d) = script.delay {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {}
                        () = tokio::time::sleep(d) => {}
                    }
                }
                if cancel.is_cancelled() {
                    yield Err(LlmError::Cancelled);
                    return;
                }
                yield Ok(LlmEvent::TextDelta { text: delta });
            }
            if let Some((_, message)) = script.fail_after {
                yield Err(LlmError::stream(message));
                return;
            }
            yield Ok(LlmEvent::Done { stop_reason: script.stop_reason, usage: script.usage });
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LlmMessage;
    use assert_matches::assert_matches;
    use futures::StreamExt;

    fn request() -> LlmRequest {
        LlmRequest {
            model: "mock".into(),
            max_tokens: 16,
            system: None,
            messages: vec![LlmMessage::user("hi")],
        }
    }

    async fn run(mock: &MockLlmClient, cancel: CancellationToken) -> Vec<Result<LlmEvent>> {
        mock.stream(&request(), cancel).await.unwrap().collect().await
    }

    #[tokio::test]
    async fn streams_scripted_deltas() {
        let mock = MockLlmClient::new()
            .with_deltas(["a", "b"])
            .with_stop_reason(StopReason::MaxTokens);
        let events = run(&mock, CancellationToken::new()).await;
        assert_eq!(events.len(), 4);
        assert_matches!(&events[1], Ok(LlmEvent::TextDelta { text }) if text == "a");
        assert_matches!(
            events[3],
            Ok(LlmEvent::Done {
                stop_reason: StopReason::MaxTokens,
                ..
            })
        );
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.last_request().unwrap().messages[0].content, "hi");
    }

    #[tokio::test]
    async fn fails_before_stream() {
        let mock = MockLlmClient::new();
        mock.fail_with(ApiError {
            kind: crate::errors::ApiErrorKind::Overloaded,
            status: Some(529),
            message: "busy".into(),
            retry_after_ms: None,
        });
        let err = mock.stream(&request(), CancellationToken::new()).await.err().unwrap();
        assert_matches!(err, LlmError::Api(_));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn fails_mid_stream() {
        let mock = MockLlmClient::new().with_deltas(["a", "b", "c"]);
        mock.fail_mid_stream(1, "reset");
        let events = run(&mock, CancellationToken::new()).await;
        assert_eq!(events.len(), 3);
        assert_matches!(events[2], Err(LlmError::Stream { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_between_deltas() {
        let mock = MockLlmClient::new().with_deltas(["a", "b"]);
        mock.set_delay(Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let mut stream = mock.stream(&request(), cancel.clone()).await.unwrap();
        assert_matches!(stream.next().await, Some(Ok(LlmEvent::MessageStart { .. })));
        cancel.cancel();
        assert_matches!(stream.next().await, Some(Err(LlmError::Cancelled)));
        assert!(stream.next().await.is_none());
    }
}
