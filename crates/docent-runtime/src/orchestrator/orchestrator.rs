//! Orchestrator: multi-session turn coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use docent_core::events::BaseEvent;
use docent_core::text::{preview, squash_whitespace};
use docent_core::{
    ChatContextBundle, ChatMessage, SessionEvent, SessionId, TokenUsage, TurnFailure, TurnId,
    TurnPhase,
};
use docent_llm::LlmClient;
use docent_settings::DocentSettings;
use metrics::gauge;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::errors::RuntimeError;
use crate::orchestrator::event_emitter::EventEmitter;
use crate::orchestrator::session::{ActiveTurn, SessionHandle};
use crate::orchestrator::turn_runner::TurnRunner;
use crate::orchestrator::turn_stream::TurnStream;
use crate::pipeline::message_builder::{Attachment, MessageBuilder};

/// Characters of the user text shown in logs.
const QUERY_PREVIEW_CHARS: usize = 80;

/// Request parameters shared by every turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Model ID.
    pub model: String,
    /// `max_tokens` of every request.
    pub max_tokens: u32,
    /// System prompt, if any.
    pub system_prompt: Option<String>,
    /// Generations allowed in flight across all sessions.
    pub max_concurrent_turns: usize,
}

impl OrchestratorConfig {
    /// Take the `llm` and `session` sections of the settings.
    pub fn from_settings(settings: &DocentSettings) -> Self {
        let prompt = settings.llm.system_prompt.trim();
        Self {
            model: settings.llm.model.clone(),
            max_tokens: settings.llm.max_tokens,
            system_prompt: (!prompt.is_empty()).then(|| prompt.to_string()),
            max_concurrent_turns: settings.session.max_concurrent_turns.max(1),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_settings(&DocentSettings::default())
    }
}

/// Owns every session and runs their turns.
///
/// Turns of one session run one after another; turns of different
/// sessions run in parallel up to `max_concurrent_turns`. Submitting a turn
/// cancels the session's in-flight turn first.
pub struct Orchestrator {
    builder: Arc<MessageBuilder>,
    llm: Arc<dyn LlmClient>,
    config: Arc<OrchestratorConfig>,
    emitter: Arc<EventEmitter>,
    /// Limits generations in flight across all sessions.
    turn_semaphore: Arc<Semaphore>,
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
}

impl Orchestrator {
    /// Create an orchestrator over shared pipeline and model clients.
    pub fn new(
        builder: Arc<MessageBuilder>,
        llm: Arc<dyn LlmClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            builder,
            llm,
            turn_semaphore: Arc::new(Semaphore::new(config.max_concurrent_turns)),
            config: Arc::new(config),
            emitter: Arc::new(EventEmitter::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Turn parameters.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Receiver for lifecycle events of every session.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.emitter.subscribe()
    }

    /// Open a new, empty session.
    pub fn create_session(&self) -> SessionId {
        let id = SessionId::new();
        let handle = Arc::new(SessionHandle::new(id.clone()));
        let _ = self.sessions.lock().insert(id.as_str().to_owned(), handle);
        info!(session_id = %id, "session created");
        id
    }

    /// Close a session, cancelling its in-flight turn.
    #[instrument(skip(self))]
    pub fn end_session(&self, session_id: &str) -> Result<(), RuntimeError> {
        let handle = self
            .sessions
            .lock()
            .remove(session_id)
            .ok_or_else(|| RuntimeError::UnknownSession(session_id.to_owned()))?;
        if let Some(turn_id) = handle.cancel_active() {
            debug!(%turn_id, "in-flight turn cancelled");
        }
        self.update_active_gauge();
        info!("session ended");
        Ok(())
    }

    /// Point the session at the document currently open, or at none.
    pub fn set_active_document(
        &self,
        session_id: &str,
        document_id: Option<String>,
    ) -> Result<(), RuntimeError> {
        let handle = self.session(session_id)?;
        handle.state.lock().bundle.set_active_document(document_id);
        Ok(())
    }

    /// Submit a user turn.
    ///
    /// Any in-flight turn of the session is cancelled before the new one is
    /// admitted. Fails with [`RuntimeError::ServerBusy`] when every
    /// generation slot is taken.
    #[instrument(skip(self, text, attachments), fields(attachments = attachments.len()))]
    pub fn submit_turn(
        &self,
        session_id: &str,
        text: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Result<TurnStream, RuntimeError> {
        let session = self.session(session_id)?;
        if let Some(previous) = session.cancel_active() {
            info!(%previous, "superseding in-flight turn");
        }

        let permit = Arc::clone(&self.turn_semaphore)
            .try_acquire_owned()
            .map_err(|_| RuntimeError::ServerBusy {
                max: self.config.max_concurrent_turns,
            })?;
        let turn_id = TurnId::new();
        let cancel = CancellationToken::new();
        *session.active.lock() = Some(ActiveTurn {
            turn_id: turn_id.clone(),
            cancel: cancel.clone(),
            _permit: permit,
        });
        self.update_active_gauge();

        let _ = self.emitter.emit(SessionEvent::TurnStarted {
            base: BaseEvent::now(session_id),
            turn_id: turn_id.clone(),
        });
        let text: String = text.into();
        info!(
            %turn_id,
            query = %preview(&squash_whitespace(&text), QUERY_PREVIEW_CHARS),
            "turn started"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let runner = TurnRunner {
            session,
            turn_id: turn_id.clone(),
            text,
            attachments,
            builder: Arc::clone(&self.builder),
            llm: Arc::clone(&self.llm),
            config: Arc::clone(&self.config),
            emitter: Arc::clone(&self.emitter),
            turn_semaphore: Arc::clone(&self.turn_semaphore),
            cancel: cancel.clone(),
            tx,
        };
        let _handle = tokio::spawn(runner.run());
        Ok(TurnStream::new(turn_id, cancel, rx))
    }

    /// Cancel the session's in-flight turn. Returns whether there was one.
    #[instrument(skip(self))]
    pub fn cancel_turn(&self, session_id: &str) -> Result<bool, RuntimeError> {
        let handle = self.session(session_id)?;
        let cancelled = handle.cancel_active().is_some();
        if cancelled {
            warn!("turn cancel requested");
            self.update_active_gauge();
        }
        Ok(cancelled)
    }

    /// Transcript, oldest first.
    pub fn transcript(&self, session_id: &str) -> Result<Vec<ChatMessage>, RuntimeError> {
        Ok(self.session(session_id)?.state.lock().messages.clone())
    }

    /// Most recent turn failure.
    pub fn last_error(&self, session_id: &str) -> Result<Option<TurnFailure>, RuntimeError> {
        Ok(self.session(session_id)?.state.lock().last_error.clone())
    }

    /// Token usage summed over completed turns.
    pub fn token_usage(&self, session_id: &str) -> Result<TokenUsage, RuntimeError> {
        Ok(self.session(session_id)?.state.lock().usage)
    }

    /// Phase of the latest turn.
    pub fn phase(&self, session_id: &str) -> Result<TurnPhase, RuntimeError> {
        Ok(self.session(session_id)?.state.lock().phase)
    }

    /// Snapshot of the session bundle.
    pub fn bundle(&self, session_id: &str) -> Result<ChatContextBundle, RuntimeError> {
        Ok(self.session(session_id)?.state.lock().bundle.clone())
    }

    /// Open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Turns holding a generation slot.
    pub fn active_turn_count(&self) -> usize {
        self.config
            .max_concurrent_turns
            .saturating_sub(self.turn_semaphore.available_permits())
    }

    /// Cancel every turn and close every session.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        let sessions: Vec<Arc<SessionHandle>> =
            self.sessions.lock().drain().map(|(_, h)| h).collect();
        let mut cancelled = 0usize;
        for handle in &sessions {
            if handle.cancel_active().is_some() {
                cancelled += 1;
            }
        }
        self.update_active_gauge();
        info!(sessions = sessions.len(), cancelled, "orchestrator shut down");
    }

    fn session(&self, session_id: &str) -> Result<Arc<SessionHandle>, RuntimeError> {
        self.sessions
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownSession(session_id.to_owned()))
    }

    fn update_active_gauge(&self) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("docent_turns_active").set(self.active_turn_count() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::cache::ContextCache;
    use crate::context::service::ContextService;
    use crate::context::source::DocumentCatalog;
    use crate::pipeline::message_builder::BuilderConfig;
    use assert_matches::assert_matches;
    use docent_core::{ErrorKind, TurnEvent};
    use docent_llm::MockLlmClient;
    use docent_retrieval::MockRetrievalClient;
    use std::time::Duration;

    fn orchestrator(llm: Arc<MockLlmClient>, max: usize) -> Orchestrator {
        let builder = MessageBuilder::new(
            Arc::new(DocumentCatalog::new()),
            Arc::new(ContextService::new(Arc::new(ContextCache::new(
                Duration::from_secs(60),
            )))),
            Arc::new(MockRetrievalClient::new()),
            BuilderConfig::default(),
        );
        let config = OrchestratorConfig {
            max_concurrent_turns: max,
            ..OrchestratorConfig::default()
        };
        Orchestrator::new(Arc::new(builder), llm, config)
    }

    #[test]
    fn config_from_settings() {
        let mut settings = DocentSettings::default();
        settings.llm.system_prompt = "   ".into();
        settings.session.max_concurrent_turns = 0;
        let config = OrchestratorConfig::from_settings(&settings);
        assert_eq!(config.system_prompt, None);
        assert_eq!(config.max_concurrent_turns, 1);
        assert_eq!(config.max_tokens, 1024);
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let orch = orchestrator(Arc::new(MockLlmClient::new()), 2);
        assert_matches!(
            orch.submit_turn("nope", "hi", vec![]),
            Err(RuntimeError::UnknownSession(id)) if id == "nope"
        );
        assert_matches!(orch.transcript("nope"), Err(RuntimeError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn simple_turn_completes() {
        let llm = Arc::new(MockLlmClient::new().with_deltas(["Hel", "lo"]));
        let orch = orchestrator(Arc::clone(&llm), 2);
        let session = orch.create_session();

        let events = orch
            .submit_turn(session.as_str(), "hi", vec![])
            .unwrap()
            .collect_events()
            .await;
        assert_eq!(events.len(), 3);
        assert_matches!(events.last(), Some(TurnEvent::Done { .. }));

        let transcript = orch.transcript(session.as_str()).unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].text, "Hello");
        assert!(transcript[1].streaming_complete);
        assert_eq!(orch.phase(session.as_str()).unwrap(), TurnPhase::Complete);
        assert_eq!(orch.token_usage(session.as_str()).unwrap().output_tokens, 1);
        assert_eq!(
            llm.last_request().unwrap().messages[0].content,
            "User Query: hi"
        );
    }

    #[tokio::test]
    async fn stream_failure_replaces_placeholder() {
        let llm = Arc::new(MockLlmClient::new().with_deltas(["a", "b"]));
        llm.fail_mid_stream(1, "connection reset");
        let orch = orchestrator(llm, 2);
        let session = orch.create_session();

        let events = orch
            .submit_turn(session.as_str(), "hi", vec![])
            .unwrap()
            .collect_events()
            .await;
        assert_matches!(
            events.last(),
            Some(TurnEvent::Error {
                kind: ErrorKind::Streaming,
                ..
            })
        );
        let transcript = orch.transcript(session.as_str()).unwrap();
        assert_eq!(transcript.len(), 2);
        assert!(transcript[1].is_failure());
        assert_eq!(
            orch.last_error(session.as_str()).unwrap().unwrap().kind,
            ErrorKind::Streaming
        );
        assert_eq!(orch.phase(session.as_str()).unwrap(), TurnPhase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn end_session_cancels_turn() {
        let llm = Arc::new(MockLlmClient::new().with_deltas(["a", "b"]));
        llm.set_delay(Duration::from_secs(30));
        let orch = orchestrator(llm, 2);
        let session = orch.create_session();

        let stream = orch.submit_turn(session.as_str(), "hi", vec![]).unwrap();
        assert_eq!(orch.active_turn_count(), 1);
        orch.end_session(session.as_str()).unwrap();
        assert!(stream.is_cancelled());
        assert_eq!(orch.active_turn_count(), 0);
        assert_eq!(orch.session_count(), 0);

        let events = stream.collect_events().await;
        assert_matches!(
            events.last(),
            Some(TurnEvent::Error {
                kind: ErrorKind::Cancelled,
                ..
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_exhausted_returns_server_busy() {
        let llm = Arc::new(MockLlmClient::new());
        llm.set_delay(Duration::from_secs(30));
        let orch = orchestrator(llm, 1);
        let a = orch.create_session();
        let b = orch.create_session();

        let _first = orch.submit_turn(a.as_str(), "one", vec![]).unwrap();
        let err = orch.submit_turn(b.as_str(), "two", vec![]).err().unwrap();
        assert_matches!(err, RuntimeError::ServerBusy { max: 1 });
        assert_eq!(err.category(), "server_busy");
    }

    #[tokio::test]
    async fn active_document_lands_in_bundle() {
        let orch = orchestrator(Arc::new(MockLlmClient::new()), 1);
        let session = orch.create_session();
        orch.set_active_document(session.as_str(), Some("report".into()))
            .unwrap();
        assert_eq!(
            orch.bundle(session.as_str()).unwrap().active_document_id(),
            Some("report")
        );
    }

    #[tokio::test]
    async fn shutdown_closes_sessions() {
        let orch = orchestrator(Arc::new(MockLlmClient::new()), 1);
        let _ = orch.create_session();
        let _ = orch.create_session();
        orch.shutdown();
        assert_eq!(orch.session_count(), 0);
    }
}
