//! One turn, from queueing to the terminal event.
//!
//! ```text
//! wait for turn_lock ─► BuildingContext ─► AwaitingModel ─► Streaming ─► Complete
//!         │                   │                 │               │
//!         └──── cancelled ────┴───── error ─────┴───────────────┴──► Failed
//! ```
//!
//! The builder works on a copy of the session bundle, so a failed build
//! leaves the session bundle as the previous turn left it. Only the built
//! contexts are written back; the active document stays whatever the
//! session holds by then. The model is called only after the build
//! succeeded and the token is still live.

use std::sync::Arc;

use docent_core::events::BaseEvent;
use docent_core::{
    ChatMessage, ErrorKind, MessageId, SessionEvent, TurnEvent, TurnFailure, TurnId, TurnPhase,
};
use docent_llm::{LlmClient, LlmError, LlmEvent, LlmMessage, LlmRequest};
use futures::StreamExt;
use metrics::{counter, gauge};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::orchestrator::event_emitter::EventEmitter;
use crate::orchestrator::orchestrator::OrchestratorConfig;
use crate::orchestrator::session::{SessionHandle, SessionState};
use crate::pipeline::message_builder::{Attachment, MessageBuilder, TurnInput};

/// Everything a spawned turn needs.
pub(crate) struct TurnRunner {
    pub(crate) session: Arc<SessionHandle>,
    pub(crate) turn_id: TurnId,
    pub(crate) text: String,
    pub(crate) attachments: Vec<Attachment>,
    pub(crate) builder: Arc<MessageBuilder>,
    pub(crate) llm: Arc<dyn LlmClient>,
    pub(crate) config: Arc<OrchestratorConfig>,
    pub(crate) emitter: Arc<EventEmitter>,
    pub(crate) turn_semaphore: Arc<Semaphore>,
    pub(crate) cancel: CancellationToken,
    pub(crate) tx: mpsc::UnboundedSender<TurnEvent>,
}

impl TurnRunner {
    /// Drive the turn to its end, then release its slot.
    #[instrument(skip_all, fields(session_id = %self.session.id, turn_id = %self.turn_id))]
    pub(crate) async fn run(self) {
        let outcome = match self.drive().await {
            Ok(()) => "completed",
            Err(ErrorKind::Cancelled) => "cancelled",
            Err(_) => "failed",
        };
        counter!("docent_turns_total", "outcome" => outcome).increment(1);

        let _ = self.session.release(&self.turn_id);
        let in_flight = self
            .config
            .max_concurrent_turns
            .saturating_sub(self.turn_semaphore.available_permits());
        #[allow(clippy::cast_precision_loss)]
        gauge!("docent_turns_active").set(in_flight as f64);
        debug!(outcome, "turn finished");
    }

    async fn drive(&self) -> Result<(), ErrorKind> {
        let _turn_guard = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                self.report(ErrorKind::Cancelled, "turn cancelled before it started");
                return Err(ErrorKind::Cancelled);
            }
            guard = self.session.turn_lock.lock() => guard,
        };

        let (history, mut working, input) = {
            let mut state = self.session.state.lock();
            let history = state.model_history();
            let mut working = state.bundle.clone();
            working.reset();
            let input = TurnInput {
                text: self.text.clone(),
                attachments: self.attachments.clone(),
                active_document_id: working.active_document_id().map(str::to_owned),
            };
            state.messages.push(ChatMessage::user(self.text.clone()));
            self.set_phase(&mut state, TurnPhase::BuildingContext);
            (history, working, input)
        };

        let built = match self.builder.build(&mut working, &input, &self.cancel).await {
            Ok(built) => built,
            Err(e) => return Err(self.fail(None, e.kind(), e.to_string())),
        };
        if self.cancel.is_cancelled() {
            return Err(self.fail(None, ErrorKind::Cancelled, "turn cancelled".into()));
        }

        let placeholder = ChatMessage::assistant_placeholder();
        let placeholder_id = placeholder.id.clone();
        {
            let mut state = self.session.state.lock();
            state.bundle.reset();
            for context in working.contexts() {
                let _ = state.bundle.add(context.clone());
            }
            state.messages.push(placeholder);
            self.set_phase(&mut state, TurnPhase::AwaitingModel);
        }
        debug!(
            contexts = built.contexts.len(),
            tokens = built.used_tokens,
            history = history.len(),
            "prompt ready"
        );

        let mut messages = history;
        messages.push(LlmMessage::user(built.prompt));
        let request = LlmRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: self.config.system_prompt.clone(),
            messages,
        };

        let opened = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(LlmError::Cancelled),
            result = self.llm.stream(&request, self.cancel.clone()) => result,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail_llm(&placeholder_id, &e)),
        };

        let mut streaming = false;
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Some(Err(LlmError::Cancelled)),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(LlmEvent::MessageStart { input_tokens })) => {
                    debug!(input_tokens, "model accepted prompt");
                }
                Some(Ok(LlmEvent::TextDelta { text })) => {
                    {
                        let mut state = self.session.state.lock();
                        if !streaming {
                            streaming = true;
                            self.set_phase(&mut state, TurnPhase::Streaming);
                        }
                        if let Some(message) = state.message_mut(&placeholder_id) {
                            message.append_delta(&text);
                        }
                    }
                    let _ = self.tx.send(TurnEvent::PartialText { delta: text });
                }
                Some(Ok(LlmEvent::Done { stop_reason, usage })) => {
                    {
                        let mut state = self.session.state.lock();
                        if let Some(message) = state.message_mut(&placeholder_id) {
                            message.finalize(stop_reason, built.contexts.clone());
                        }
                        state.usage.accumulate(usage);
                        self.set_phase(&mut state, TurnPhase::Complete);
                    }
                    let _ = self.emitter.emit(SessionEvent::TurnCompleted {
                        base: BaseEvent::now(self.session.id.as_str()),
                        turn_id: self.turn_id.clone(),
                        stop_reason,
                        usage,
                    });
                    let _ = self.tx.send(TurnEvent::Done { stop_reason, usage });
                    info!(
                        stop_reason = stop_reason.as_str(),
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "turn complete"
                    );
                    return Ok(());
                }
                Some(Err(e)) => return Err(self.fail_llm(&placeholder_id, &e)),
                None => {
                    return Err(self.fail(
                        Some(&placeholder_id),
                        ErrorKind::Streaming,
                        "model stream ended without a stop reason".into(),
                    ));
                }
            }
        }
    }

    fn fail_llm(&self, placeholder: &MessageId, error: &LlmError) -> ErrorKind {
        let kind = match error {
            LlmError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Streaming,
        };
        self.fail(Some(placeholder), kind, error.to_string())
    }

    /// Record a failure on the session and end the stream.
    ///
    /// The placeholder, if any, is dropped. A failure entry replaces it
    /// unless the turn was cancelled.
    fn fail(&self, placeholder: Option<&MessageId>, kind: ErrorKind, message: String) -> ErrorKind {
        {
            let mut state = self.session.state.lock();
            if let Some(id) = placeholder {
                state.remove_message(id);
            }
            if kind != ErrorKind::Cancelled {
                state.messages.push(ChatMessage::failure(kind, message.clone()));
            }
            state.last_error = Some(TurnFailure::new(kind, message.clone()));
            self.set_phase(&mut state, TurnPhase::Failed);
        }
        self.report(kind, &message);
        kind
    }

    fn report(&self, kind: ErrorKind, message: &str) {
        warn!(kind = kind.as_str(), message, "turn failed");
        let _ = self.emitter.emit(SessionEvent::TurnFailed {
            base: BaseEvent::now(self.session.id.as_str()),
            turn_id: self.turn_id.clone(),
            kind,
            message: message.to_owned(),
        });
        let _ = self.tx.send(TurnEvent::Error {
            kind,
            message: message.to_owned(),
        });
    }

    fn set_phase(&self, state: &mut SessionState, phase: TurnPhase) {
        if !state.phase.can_transition_to(phase) {
            warn!(from = ?state.phase, to = ?phase, "unexpected phase transition");
        }
        state.phase = phase;
        let _ = self.emitter.emit(SessionEvent::PhaseChanged {
            base: BaseEvent::now(self.session.id.as_str()),
            turn_id: self.turn_id.clone(),
            phase,
        });
    }
}
