//! Message model
//!
//! A message is an immutable value; every relay hop produces a new copy via
//! [`Message::next_hop`] instead of mutating in place, so multiple in-flight
//! copies of the same logical message along diverging paths can be reasoned
//! about independently. The `id` is assigned once at creation and shared by
//! all copies.

use serde::{Deserialize, Serialize};

use crate::data::current_timestamp;

/// Identity of a node in the mesh.
pub type NodeId = String;

/// Globally unique message identifier, assigned at creation.
pub type MessageId = String;

/// Maximum number of relay hops before a copy is dropped.
pub const MAX_HOPS: u8 = 5;

/// What kind of message this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain chat text.
    Chat,
    /// Emergency alert, may carry an encrypted location blob.
    Alert,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Chat => write!(f, "chat"),
            MessageKind::Alert => write!(f, "alert"),
        }
    }
}

/// Delivery status of a message copy.
///
/// `Delivered` and `HopLimitReached` are terminal: no copy produced after
/// either state may be relayed further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    InTransit,
    Delivered,
    HopLimitReached,
}

impl MessageStatus {
    /// Whether this status ends the message's relay lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Delivered | MessageStatus::HopLimitReached)
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::InTransit => write!(f, "in-transit"),
            MessageStatus::Delivered => write!(f, "delivered"),
            MessageStatus::HopLimitReached => write!(f, "hop-limit-reached"),
        }
    }
}

/// A store-and-forward message copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Globally unique id, immutable across all copies.
    pub id: MessageId,
    /// Message body.
    pub content: String,
    /// Node that created the message.
    pub sender_id: NodeId,
    /// Human-readable name of the creator.
    pub sender_name: String,
    /// Creation time (unix seconds).
    pub timestamp: i64,
    /// Number of relay hops this copy has taken.
    pub hop_count: u8,
    /// Nodes this copy has passed through. A node id appears at most once.
    pub visited: Vec<NodeId>,
    /// Whether some node confirmed upload to the durable store.
    pub delivered: bool,
    /// Message kind.
    pub kind: MessageKind,
    /// Relay status.
    pub status: MessageStatus,
    /// Node that uploaded the message, once delivered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivering_node: Option<NodeId>,
    /// Opaque encrypted location blob. Encryption lives outside this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_location: Option<String>,
}

impl Message {
    /// Create a new message at its origin node.
    ///
    /// Hop count starts at 0 and the visited list contains only the origin.
    pub fn new(
        origin: &NodeId,
        origin_name: &str,
        content: String,
        kind: MessageKind,
        encrypted_location: Option<String>,
    ) -> Self {
        Self {
            id: new_message_id(),
            content,
            sender_id: origin.clone(),
            sender_name: origin_name.to_string(),
            timestamp: current_timestamp(),
            hop_count: 0,
            visited: vec![origin.clone()],
            delivered: false,
            kind,
            status: MessageStatus::InTransit,
            delivering_node: None,
            encrypted_location: None,
        }
        .with_location(encrypted_location)
    }

    fn with_location(mut self, encrypted_location: Option<String>) -> Self {
        self.encrypted_location = encrypted_location;
        self
    }

    /// Produce the next copy for a relay hop at `node`.
    ///
    /// Increments the hop count, appends `node` to the visited list (never
    /// twice), and recomputes the status: the copy becomes terminal when the
    /// new hop count strictly exceeds `max_hops` ([`MAX_HOPS`] under the
    /// default policy). A copy that leaves a node at exactly the maximum is
    /// still forwardable; its successors are not.
    pub fn next_hop(&self, node: &NodeId, max_hops: u8) -> Message {
        let mut copy = self.clone();
        copy.hop_count = copy.hop_count.saturating_add(1);
        if !copy.visited.iter().any(|n| n == node) {
            copy.visited.push(node.clone());
        }
        if copy.hop_count > max_hops && !copy.delivered {
            copy.status = MessageStatus::HopLimitReached;
        }
        copy
    }

    /// Mark this copy as delivered by `node`.
    pub fn mark_delivered(&mut self, node: &NodeId) {
        self.delivered = true;
        self.status = MessageStatus::Delivered;
        self.delivering_node = Some(node.clone());
    }

    /// Whether `node` already appears in the visited list.
    pub fn has_visited(&self, node: &NodeId) -> bool {
        self.visited.iter().any(|n| n == node)
    }

    /// Whether this copy may never be relayed again.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Short id prefix for logging.
    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(8);
        &self.id[..end]
    }
}

/// Generate a fresh message id: 16 random bytes, hex encoded.
pub fn new_message_id() -> MessageId {
    use rand::{rngs::OsRng, Rng};
    let mut bytes = [0u8; 16];
    OsRng.fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u8) -> NodeId {
        format!("node-{}", n)
    }

    fn new_test_message(origin: u8) -> Message {
        Message::new(
            &node(origin),
            "tester",
            "hello".to_string(),
            MessageKind::Chat,
            None,
        )
    }

    #[test]
    fn test_new_message_starts_at_origin() {
        let msg = new_test_message(1);
        assert_eq!(msg.hop_count, 0);
        assert_eq!(msg.visited, vec![node(1)]);
        assert_eq!(msg.status, MessageStatus::InTransit);
        assert!(!msg.delivered);
        assert!(msg.delivering_node.is_none());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = new_test_message(1);
        let b = new_test_message(1);
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 32); // 16 bytes hex
    }

    #[test]
    fn test_next_hop_increments_and_appends() {
        let msg = new_test_message(1);
        let copy = msg.next_hop(&node(2), MAX_HOPS);
        assert_eq!(copy.hop_count, 1);
        assert_eq!(copy.visited, vec![node(1), node(2)]);
        assert_eq!(copy.status, MessageStatus::InTransit);
        // Original is untouched
        assert_eq!(msg.hop_count, 0);
        assert_eq!(msg.visited.len(), 1);
    }

    #[test]
    fn test_next_hop_never_duplicates_visited() {
        let msg = new_test_message(1);
        let copy = msg.next_hop(&node(2), MAX_HOPS).next_hop(&node(2), MAX_HOPS);
        assert_eq!(copy.visited.iter().filter(|n| **n == node(2)).count(), 1);
        assert_eq!(copy.hop_count, 2);
    }

    #[test]
    fn test_hop_count_non_decreasing_along_path() {
        let mut msg = new_test_message(1);
        let mut last = msg.hop_count;
        for i in 2..8 {
            msg = msg.next_hop(&node(i), MAX_HOPS);
            assert!(msg.hop_count >= last);
            last = msg.hop_count;
        }
    }

    #[test]
    fn test_copy_at_exact_max_is_not_terminal() {
        let mut msg = new_test_message(1);
        for i in 2..=6 {
            msg = msg.next_hop(&node(i), MAX_HOPS);
        }
        // 5 hops: exactly at the maximum, still forwardable
        assert_eq!(msg.hop_count, MAX_HOPS);
        assert_eq!(msg.status, MessageStatus::InTransit);
    }

    #[test]
    fn test_copy_past_max_is_terminal() {
        let mut msg = new_test_message(1);
        for i in 2..=7 {
            msg = msg.next_hop(&node(i), MAX_HOPS);
        }
        assert_eq!(msg.hop_count, MAX_HOPS + 1);
        assert_eq!(msg.status, MessageStatus::HopLimitReached);
        assert!(msg.is_terminal());
    }

    #[test]
    fn test_raised_limit_extends_the_range() {
        let mut msg = new_test_message(1);
        for i in 2..=8 {
            msg = msg.next_hop(&node(i), 7);
        }
        // 7 hops under a limit of 7: still forwardable
        assert_eq!(msg.hop_count, 7);
        assert_eq!(msg.status, MessageStatus::InTransit);

        let over = msg.next_hop(&node(9), 7);
        assert_eq!(over.status, MessageStatus::HopLimitReached);
    }

    #[test]
    fn test_mark_delivered_is_terminal() {
        let mut msg = new_test_message(1);
        msg.mark_delivered(&node(9));
        assert!(msg.delivered);
        assert_eq!(msg.status, MessageStatus::Delivered);
        assert_eq!(msg.delivering_node, Some(node(9)));
        assert!(msg.is_terminal());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(MessageStatus::InTransit.to_string(), "in-transit");
        assert_eq!(MessageStatus::Delivered.to_string(), "delivered");
        assert_eq!(MessageStatus::HopLimitReached.to_string(), "hop-limit-reached");
    }

    #[test]
    fn test_has_visited() {
        let msg = new_test_message(1).next_hop(&node(2), MAX_HOPS);
        assert!(msg.has_visited(&node(1)));
        assert!(msg.has_visited(&node(2)));
        assert!(!msg.has_visited(&node(3)));
    }
}
