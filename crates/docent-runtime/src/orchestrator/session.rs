//! Per-session state.
//!
//! Each session owns one `turn_lock` that serializes turns, a short-lived
//! `state` mutex over its bundle and transcript, and the slot of its
//! in-flight turn. Sessions share nothing with each other.

use docent_core::{
    ChatContextBundle, ChatMessage, MessageId, MessageOutcome, SessionId, TokenUsage, TurnFailure,
    TurnId, TurnPhase,
};
use docent_llm::LlmMessage;
use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;

/// The turn currently allowed to generate for a session.
pub(crate) struct ActiveTurn {
    pub(crate) turn_id: TurnId,
    pub(crate) cancel: CancellationToken,
    /// Released when the turn leaves the slot.
    pub(crate) _permit: OwnedSemaphorePermit,
}

/// Mutable session data, guarded by [`SessionHandle::state`].
pub(crate) struct SessionState {
    pub(crate) bundle: ChatContextBundle,
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) last_error: Option<TurnFailure>,
    pub(crate) usage: TokenUsage,
    pub(crate) phase: TurnPhase,
}

impl SessionState {
    fn new(id: SessionId) -> Self {
        Self {
            bundle: ChatContextBundle::new(id),
            messages: Vec::new(),
            last_error: None,
            usage: TokenUsage::default(),
            phase: TurnPhase::Idle,
        }
    }

    /// Completed exchanges as model messages, oldest first.
    ///
    /// A user message is included only together with the finished,
    /// successful assistant reply that directly follows it. Failure
    /// entries and their user messages never reach the model.
    pub(crate) fn model_history(&self) -> Vec<LlmMessage> {
        let mut history = Vec::new();
        for pair in self.messages.windows(2) {
            let (user, reply) = (&pair[0], &pair[1]);
            if user.is_user
                && !reply.is_user
                && reply.outcome == MessageOutcome::Ok
                && reply.streaming_complete
            {
                history.push(LlmMessage::user(user.text.clone()));
                history.push(LlmMessage::assistant(reply.text.clone()));
            }
        }
        history
    }

    /// Mutable access to a transcript entry by ID.
    pub(crate) fn message_mut(&mut self, id: &MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| &m.id == id)
    }

    /// Drop a transcript entry by ID.
    pub(crate) fn remove_message(&mut self, id: &MessageId) {
        self.messages.retain(|m| &m.id != id);
    }
}

/// One live session.
pub(crate) struct SessionHandle {
    pub(crate) id: SessionId,
    /// Held by a turn from start to finish.
    pub(crate) turn_lock: tokio::sync::Mutex<()>,
    pub(crate) state: parking_lot::Mutex<SessionState>,
    pub(crate) active: parking_lot::Mutex<Option<ActiveTurn>>,
}

impl SessionHandle {
    pub(crate) fn new(id: SessionId) -> Self {
        Self {
            state: parking_lot::Mutex::new(SessionState::new(id.clone())),
            id,
            turn_lock: tokio::sync::Mutex::new(()),
            active: parking_lot::Mutex::new(None),
        }
    }

    /// Cancel the in-flight turn, if any, and release its slot.
    pub(crate) fn cancel_active(&self) -> Option<TurnId> {
        let previous = self.active.lock().take()?;
        previous.cancel.cancel();
        Some(previous.turn_id)
    }

    /// Release the slot if `turn_id` still owns it.
    pub(crate) fn release(&self, turn_id: &TurnId) -> bool {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|a| &a.turn_id == turn_id) {
            *active = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::{ErrorKind, StopReason};

    fn finished(text: &str) -> ChatMessage {
        let mut m = ChatMessage::assistant_placeholder();
        m.append_delta(text);
        m.finalize(StopReason::EndTurn, vec![]);
        m
    }

    #[test]
    fn history_pairs_completed_exchanges() {
        let mut state = SessionState::new(SessionId::from("s"));
        state.messages.push(ChatMessage::user("q1"));
        state.messages.push(finished("a1"));
        state.messages.push(ChatMessage::user("q2"));
        state.messages.push(finished("a2"));

        let history = state.model_history();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
    }

    #[test]
    fn history_skips_failed_turns() {
        let mut state = SessionState::new(SessionId::from("s"));
        state.messages.push(ChatMessage::user("q1"));
        state
            .messages
            .push(ChatMessage::failure(ErrorKind::Retrieval, "search timed out"));
        state.messages.push(ChatMessage::user("q2"));
        state.messages.push(finished("a2"));

        let history = state.model_history();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q2", "a2"]);
    }

    #[test]
    fn history_skips_unfinished_reply() {
        let mut state = SessionState::new(SessionId::from("s"));
        state.messages.push(ChatMessage::user("q1"));
        let mut partial = ChatMessage::assistant_placeholder();
        partial.append_delta("half");
        state.messages.push(partial);
        assert!(state.model_history().is_empty());
    }

    #[test]
    fn remove_message_by_id() {
        let mut state = SessionState::new(SessionId::from("s"));
        let placeholder = ChatMessage::assistant_placeholder();
        let id = placeholder.id.clone();
        state.messages.push(ChatMessage::user("q"));
        state.messages.push(placeholder);
        state.message_mut(&id).unwrap().append_delta("x");
        assert_eq!(state.messages[1].text, "x");
        state.remove_message(&id);
        assert_eq!(state.messages.len(), 1);
    }

    #[tokio::test]
    async fn release_only_for_owner() {
        let handle = SessionHandle::new(SessionId::from("s"));
        let permit = std::sync::Arc::new(tokio::sync::Semaphore::new(1))
            .try_acquire_owned()
            .unwrap();
        let cancel = CancellationToken::new();
        *handle.active.lock() = Some(ActiveTurn {
            turn_id: TurnId::from("t1"),
            cancel: cancel.clone(),
            _permit: permit,
        });
        assert!(!handle.release(&TurnId::from("t0")));
        assert_eq!(handle.cancel_active(), Some(TurnId::from("t1")));
        assert!(cancel.is_cancelled());
        assert!(!handle.release(&TurnId::from("t1")));
    }
}
