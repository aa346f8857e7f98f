//! Outward events
//!
//! The relay emits human-readable status strings and structured message
//! updates to an external listener (UI, telemetry). Delivery is
//! fire-and-forget: the channel is bounded, a full or closed channel drops
//! the event, and no backpressure ever reaches the relay core.

use tokio::sync::mpsc;
use tracing::trace;

use crate::actor::sessions::SessionState;
use crate::message::{Message, NodeId};

/// How a message copy changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageChange {
    /// Created locally on this node.
    Created,
    /// Relayed onward to peers.
    Relayed,
    /// Confirmed uploaded to the durable store.
    Delivered,
    /// Dropped because the hop limit was exceeded.
    HopLimitReached,
}

/// Structured update for one message copy.
#[derive(Debug, Clone)]
pub struct MessageUpdate {
    pub message: Message,
    pub change: MessageChange,
}

/// Snapshot of one peer session, for diagnostics.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub peer: NodeId,
    pub state: SessionState,
    pub queued: usize,
}

/// An event for the external listener.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Human-readable status line.
    Status(String),
    /// A message copy changed state on this node.
    Message(MessageUpdate),
    /// Periodic session-table diagnostics.
    Sessions(Vec<SessionInfo>),
}

/// Fire-and-forget sender for [`RelayEvent`]s.
#[derive(Clone)]
pub(crate) struct EventSender {
    tx: mpsc::Sender<RelayEvent>,
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::Sender<RelayEvent>) -> Self {
        Self { tx }
    }

    fn emit(&self, event: RelayEvent) {
        if let Err(e) = self.tx.try_send(event) {
            trace!(error = %e, "event listener missed an event");
        }
    }

    pub(crate) fn status(&self, line: impl Into<String>) {
        self.emit(RelayEvent::Status(line.into()));
    }

    pub(crate) fn message(&self, message: Message, change: MessageChange) {
        self.emit(RelayEvent::Message(MessageUpdate { message, change }));
    }

    pub(crate) fn sessions(&self, sessions: Vec<SessionInfo>) {
        self.emit(RelayEvent::Sessions(sessions));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn test_message() -> Message {
        Message::new(
            &"node-a".to_string(),
            "alice",
            "hi".to_string(),
            MessageKind::Chat,
            None,
        )
    }

    #[test]
    fn test_events_arrive_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender.status("first");
        sender.message(test_message(), MessageChange::Created);

        match rx.try_recv().unwrap() {
            RelayEvent::Status(s) => assert_eq!(s, "first"),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.try_recv().unwrap() {
            RelayEvent::Message(update) => assert_eq!(update.change, MessageChange::Created),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_full_channel_drops_without_panic() {
        let (tx, _rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        sender.status("kept");
        // Channel is full now; these are dropped silently
        sender.status("dropped");
        sender.status("dropped too");
    }

    #[test]
    fn test_closed_channel_is_a_noop() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        sender.status("nobody listening");
    }
}
