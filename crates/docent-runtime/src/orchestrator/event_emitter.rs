//! Broadcast-based emitter for [`SessionEvent`]s.

use std::sync::atomic::{AtomicU64, Ordering};

use docent_core::SessionEvent;
use tokio::sync::broadcast;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of session lifecycle events to observers.
///
/// `emit` never awaits. A receiver that falls more than `capacity` events
/// behind sees `RecvError::Lagged` instead of slowing the sender.
pub struct EventEmitter {
    tx: broadcast::Sender<SessionEvent>,
    emit_count: AtomicU64,
}

impl EventEmitter {
    /// Emitter with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Emitter with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Send to every subscriber. Returns how many received it.
    pub fn emit(&self, event: SessionEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Receiver for every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Events emitted so far, received or not.
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::events::BaseEvent;
    use docent_core::TurnId;

    fn started(session: &str) -> SessionEvent {
        SessionEvent::TurnStarted {
            base: BaseEvent::now(session),
            turn_id: TurnId::from("t1"),
        }
    }

    #[test]
    fn emit_without_subscribers_still_counts() {
        let emitter = EventEmitter::new();
        assert_eq!(emitter.emit(started("s1")), 0);
        assert_eq!(emitter.emit_count(), 1);
    }

    #[tokio::test]
    async fn subscribers_each_receive() {
        let emitter = EventEmitter::new();
        let mut rx1 = emitter.subscribe();
        let mut rx2 = emitter.subscribe();
        assert_eq!(emitter.subscriber_count(), 2);

        assert_eq!(emitter.emit(started("s1")), 2);
        assert_eq!(rx1.recv().await.unwrap().session_id(), "s1");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "turn_started");
    }

    #[tokio::test]
    async fn slow_receiver_lags() {
        let emitter = EventEmitter::with_capacity(2);
        let mut rx = emitter.subscribe();
        for s in ["s1", "s2", "s3"] {
            let _ = emitter.emit(started(s));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().session_id(), "s2");
    }
}
