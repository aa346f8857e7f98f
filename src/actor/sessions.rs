//! Per-peer session state
//!
//! Each known peer has a session walking `Initiated → Accepted → Ready`,
//! with `Failed` reachable from the first two. A disconnected peer has no
//! session at all: loss removes the entry and discards its pending queue.
//! Queued messages are not redistributed elsewhere.
//!
//! `Ready` is only reached after a settle delay following `Accepted`,
//! because the underlying link handshake is not guaranteed instantaneous.
//! Settle timers carry the session's epoch; a session recreated in the
//! meantime has a newer epoch and the stale timer is ignored.

use std::collections::{HashMap, VecDeque};

use crate::message::{Message, NodeId};
use crate::relay::events::SessionInfo;

/// Connection state of a peer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection requested (outgoing or incoming), link not up yet.
    Initiated,
    /// Link established, waiting out the settle delay.
    Accepted,
    /// Settled; payload sends are allowed.
    Ready,
    /// Connect or accept failed.
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Initiated => write!(f, "initiated"),
            SessionState::Accepted => write!(f, "accepted"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// One peer session.
#[derive(Debug)]
pub struct Session {
    pub peer: NodeId,
    pub state: SessionState,
    pub epoch: u64,
    pub pending: VecDeque<Message>,
}

/// Table of live peer sessions.
pub struct SessionTable {
    sessions: HashMap<NodeId, Session>,
    next_epoch: u64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_epoch: 0,
        }
    }

    /// Create (or reset) a session for a discovered peer.
    ///
    /// Resetting bumps the epoch so settle timers for the old incarnation
    /// cannot promote the new one.
    pub fn initiate(&mut self, peer: &NodeId) -> u64 {
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        self.sessions.insert(
            peer.clone(),
            Session {
                peer: peer.clone(),
                state: SessionState::Initiated,
                epoch,
                pending: VecDeque::new(),
            },
        );
        epoch
    }

    /// Link established: move to `Accepted`. Returns the epoch the settle
    /// timer must carry, or None if the peer has no initiated session.
    pub fn mark_accepted(&mut self, peer: &NodeId) -> Option<u64> {
        let session = self.sessions.get_mut(peer)?;
        match session.state {
            SessionState::Initiated | SessionState::Failed => {
                session.state = SessionState::Accepted;
                Some(session.epoch)
            }
            SessionState::Accepted | SessionState::Ready => Some(session.epoch),
        }
    }

    /// Settle timer fired: promote to `Ready` if still the same incarnation
    /// in the `Accepted` state.
    pub fn mark_ready(&mut self, peer: &NodeId, epoch: u64) -> bool {
        match self.sessions.get_mut(peer) {
            Some(session) if session.epoch == epoch && session.state == SessionState::Accepted => {
                session.state = SessionState::Ready;
                true
            }
            _ => false,
        }
    }

    /// Connect/accept failed. Only valid from `Initiated`/`Accepted`.
    pub fn mark_failed(&mut self, peer: &NodeId) -> bool {
        match self.sessions.get_mut(peer) {
            Some(session)
                if matches!(
                    session.state,
                    SessionState::Initiated | SessionState::Accepted
                ) =>
            {
                session.state = SessionState::Failed;
                true
            }
            _ => false,
        }
    }

    /// Peer disconnected or lost: drop the session and its queue.
    pub fn remove(&mut self, peer: &NodeId) -> Option<Session> {
        self.sessions.remove(peer)
    }

    pub fn state(&self, peer: &NodeId) -> Option<SessionState> {
        self.sessions.get(peer).map(|s| s.state)
    }

    pub fn contains(&self, peer: &NodeId) -> bool {
        self.sessions.contains_key(peer)
    }

    /// Queue a message for a peer whose session is not ready.
    pub fn queue(&mut self, peer: &NodeId, message: Message) -> bool {
        match self.sessions.get_mut(peer) {
            Some(session) => {
                session.pending.push_back(message);
                true
            }
            None => false,
        }
    }

    /// Take the peer's queued messages in arrival order.
    pub fn drain_queue(&mut self, peer: &NodeId) -> Vec<Message> {
        match self.sessions.get_mut(peer) {
            Some(session) => session.pending.drain(..).collect(),
            None => Vec::new(),
        }
    }

    pub fn queued_count(&self, peer: &NodeId) -> usize {
        self.sessions.get(peer).map_or(0, |s| s.pending.len())
    }

    /// Peers whose sessions are `Ready`, except `except`.
    pub fn ready_peers(&self, except: Option<&NodeId>) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self
            .sessions
            .values()
            .filter(|s| s.state == SessionState::Ready)
            .filter(|s| except.map_or(true, |e| &s.peer != e))
            .map(|s| s.peer.clone())
            .collect();
        peers.sort();
        peers
    }

    /// Peers with an established link (`Accepted` or `Ready`).
    pub fn connected_peers(&self) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self
            .sessions
            .values()
            .filter(|s| matches!(s.state, SessionState::Accepted | SessionState::Ready))
            .map(|s| s.peer.clone())
            .collect();
        peers.sort();
        peers
    }

    /// Peers whose connection is still being initiated.
    pub fn initiated_peers(&self) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self
            .sessions
            .values()
            .filter(|s| s.state == SessionState::Initiated)
            .map(|s| s.peer.clone())
            .collect();
        peers.sort();
        peers
    }

    /// Diagnostics snapshot of the whole table.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .values()
            .map(|s| SessionInfo {
                peer: s.peer.clone(),
                state: s.state,
                queued: s.pending.len(),
            })
            .collect();
        infos.sort_by(|a, b| a.peer.cmp(&b.peer));
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn peer(n: u8) -> NodeId {
        format!("peer-{}", n)
    }

    fn test_message(content: &str) -> Message {
        Message::new(
            &"origin".to_string(),
            "tester",
            content.to_string(),
            MessageKind::Chat,
            None,
        )
    }

    #[test]
    fn test_lifecycle_to_ready() {
        let mut table = SessionTable::new();
        let epoch = table.initiate(&peer(1));
        assert_eq!(table.state(&peer(1)), Some(SessionState::Initiated));

        assert_eq!(table.mark_accepted(&peer(1)), Some(epoch));
        assert_eq!(table.state(&peer(1)), Some(SessionState::Accepted));

        assert!(table.mark_ready(&peer(1), epoch));
        assert_eq!(table.state(&peer(1)), Some(SessionState::Ready));
    }

    #[test]
    fn test_ready_requires_accepted_state() {
        let mut table = SessionTable::new();
        let epoch = table.initiate(&peer(1));
        // Not accepted yet: settle timer must not promote
        assert!(!table.mark_ready(&peer(1), epoch));
        assert_eq!(table.state(&peer(1)), Some(SessionState::Initiated));
    }

    #[test]
    fn test_stale_epoch_cannot_promote_new_incarnation() {
        let mut table = SessionTable::new();
        let old_epoch = table.initiate(&peer(1));
        table.mark_accepted(&peer(1));

        // Peer reconnects: session recreated with a newer epoch
        let new_epoch = table.initiate(&peer(1));
        table.mark_accepted(&peer(1));
        assert_ne!(old_epoch, new_epoch);

        assert!(!table.mark_ready(&peer(1), old_epoch));
        assert_eq!(table.state(&peer(1)), Some(SessionState::Accepted));
        assert!(table.mark_ready(&peer(1), new_epoch));
    }

    #[test]
    fn test_failed_only_from_initiated_or_accepted() {
        let mut table = SessionTable::new();
        let epoch = table.initiate(&peer(1));
        assert!(table.mark_failed(&peer(1)));
        assert_eq!(table.state(&peer(1)), Some(SessionState::Failed));

        // Ready sessions do not fail; they disconnect
        let epoch2 = table.initiate(&peer(2));
        table.mark_accepted(&peer(2));
        table.mark_ready(&peer(2), epoch2);
        assert!(!table.mark_failed(&peer(2)));

        let _ = epoch;
    }

    #[test]
    fn test_remove_discards_queue() {
        let mut table = SessionTable::new();
        table.initiate(&peer(1));
        table.queue(&peer(1), test_message("one"));
        table.queue(&peer(1), test_message("two"));
        assert_eq!(table.queued_count(&peer(1)), 2);

        let session = table.remove(&peer(1)).unwrap();
        assert_eq!(session.pending.len(), 2);
        assert!(!table.contains(&peer(1)));
        // Gone for good: nothing to drain
        assert!(table.drain_queue(&peer(1)).is_empty());
    }

    #[test]
    fn test_drain_queue_preserves_arrival_order() {
        let mut table = SessionTable::new();
        table.initiate(&peer(1));
        table.queue(&peer(1), test_message("first"));
        table.queue(&peer(1), test_message("second"));
        table.queue(&peer(1), test_message("third"));

        let drained = table.drain_queue(&peer(1));
        let contents: Vec<&str> = drained.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(table.queued_count(&peer(1)), 0);
    }

    #[test]
    fn test_ready_peers_excludes_sender() {
        let mut table = SessionTable::new();
        for n in 1..=3 {
            let e = table.initiate(&peer(n));
            table.mark_accepted(&peer(n));
            table.mark_ready(&peer(n), e);
        }
        table.initiate(&peer(4)); // not ready

        let all = table.ready_peers(None);
        assert_eq!(all, vec![peer(1), peer(2), peer(3)]);

        let without_two = table.ready_peers(Some(&peer(2)));
        assert_eq!(without_two, vec![peer(1), peer(3)]);
    }

    #[test]
    fn test_connected_vs_initiated_peers() {
        let mut table = SessionTable::new();
        table.initiate(&peer(1));

        let e2 = table.initiate(&peer(2));
        table.mark_accepted(&peer(2));

        let e3 = table.initiate(&peer(3));
        table.mark_accepted(&peer(3));
        table.mark_ready(&peer(3), e3);

        assert_eq!(table.connected_peers(), vec![peer(2), peer(3)]);
        assert_eq!(table.initiated_peers(), vec![peer(1)]);
        let _ = e2;
    }

    #[test]
    fn test_snapshot() {
        let mut table = SessionTable::new();
        table.initiate(&peer(2));
        table.initiate(&peer(1));
        table.queue(&peer(1), test_message("held"));

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].peer, peer(1));
        assert_eq!(snapshot[0].queued, 1);
        assert_eq!(snapshot[1].peer, peer(2));
        assert_eq!(snapshot[1].queued, 0);
    }
}
