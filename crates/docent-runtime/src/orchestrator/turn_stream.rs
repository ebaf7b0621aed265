//! Caller-facing stream of one turn.

use std::pin::Pin;
use std::task::{Context, Poll};

use docent_core::{TurnEvent, TurnId};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

/// Events of a submitted turn: zero or more `PartialText`, then exactly one
/// `Done` or `Error`, then end of stream.
///
/// Dropping the stream does not cancel the turn; call [`TurnStream::cancel`].
#[derive(Debug)]
pub struct TurnStream {
    turn_id: TurnId,
    cancel: CancellationToken,
    inner: UnboundedReceiverStream<TurnEvent>,
}

impl TurnStream {
    pub(crate) fn new(
        turn_id: TurnId,
        cancel: CancellationToken,
        rx: mpsc::UnboundedReceiver<TurnEvent>,
    ) -> Self {
        Self {
            turn_id,
            cancel,
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// ID of the turn.
    pub fn turn_id(&self) -> &TurnId {
        &self.turn_id
    }

    /// Abort the turn. The stream then ends with `Error { kind: Cancelled }`
    /// unless a terminal event was already sent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drain the stream, returning every event.
    pub async fn collect_events(self) -> Vec<TurnEvent> {
        self.collect().await
    }
}

impl Stream for TurnStream {
    type Item = TurnEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TurnEvent>> {
        self.inner.poll_next_unpin(cx)
    }
}
