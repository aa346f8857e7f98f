//! Relay decisions
//!
//! Every message copy that enters the node, locally published or received
//! from a peer, goes through the same pipeline: suppress duplicates, stamp
//! the local hop, then either hand the copy to the gateway (when this node
//! has connectivity), drop it (delivered or over the hop limit), or persist
//! it and forward to ready peers.
//!
//! Forwarding is flood-style: no routing tables, no acknowledgements. The
//! hop limit, the dedup cache and the visited list together bound how far a
//! copy can travel.

use tracing::{debug, info, trace, warn};

use crate::message::{Message, MessageStatus, NodeId};
use crate::relay::events::MessageChange;

use super::MeshActor;

impl MeshActor {
    /// A locally created message enters the relay.
    pub(crate) async fn handle_publish(&mut self, message: Message) {
        info!(message_id = %message.short_id(), kind = %message.kind, "message published");
        self.dedup.mark_seen(&message.id);
        self.persist_pending(&message).await;
        self.events.message(message.clone(), MessageChange::Created);

        if self.connectivity {
            let gateway = self.gateway.clone();
            let copy = message.clone();
            self.spawn_upload(async move {
                gateway.upload(&copy).await;
            });
        }

        // Deliberate redundancy: every peer with an established link gets
        // the copy now, even before its session settles, so a missed ready
        // transition cannot strand the message. Duplicate arrivals are
        // suppressed by the receiver's dedup cache.
        let connected = self.sessions.connected_peers();
        for peer in &connected {
            self.transmit(peer, message.clone(), 0);
        }
        for peer in self.sessions.initiated_peers() {
            self.sessions.queue(&peer, message.clone());
        }

        self.events.status(format!(
            "message {} created, sent to {} peers",
            message.short_id(),
            connected.len()
        ));
    }

    /// A message copy arrived from a peer.
    pub(crate) async fn handle_incoming(&mut self, from: &NodeId, message: Message) {
        if self.dedup.has_seen(&message.id) {
            trace!(message_id = %message.short_id(), from = %from, "duplicate suppressed");
            return;
        }
        self.dedup.mark_seen(&message.id);

        // Our own id on the path means this copy looped back to us over a
        // link we already served; the dedup cache usually catches this
        // first, but the visited list survives our cache going stale.
        if message.has_visited(&self.node_id) {
            debug!(message_id = %message.short_id(), from = %from,
                "copy looped back, dropping");
            return;
        }

        let copy = message.next_hop(&self.node_id, self.max_hops);
        trace!(message_id = %copy.short_id(), from = %from, hops = copy.hop_count,
            "message received");

        if copy.status == MessageStatus::HopLimitReached {
            info!(message_id = %copy.short_id(), hops = copy.hop_count,
                "hop limit exceeded, dropping");
            self.events.status(format!(
                "message {} dropped, hop limit exceeded",
                copy.short_id()
            ));
            self.events.message(copy, MessageChange::HopLimitReached);
            return;
        }

        if copy.delivered {
            // Someone already uploaded it; nothing left to do but clear any
            // local responsibility we still carry for this id
            let db = self.db.lock().await;
            if let Err(e) = crate::data::pending::remove_pending(&db, &copy.id) {
                warn!(message_id = %copy.short_id(), error = %e,
                    "failed to clear pending record for delivered copy");
            }
            trace!(message_id = %copy.short_id(), "delivered copy, not relaying");
            return;
        }

        if self.connectivity {
            // Gateway election is local: we have connectivity and hold the
            // copy, so we deliver it instead of relaying further
            self.persist_pending(&copy).await;
            self.events
                .status(format!("acting as gateway for {}", copy.short_id()));
            let gateway = self.gateway.clone();
            self.spawn_upload(async move {
                gateway.upload(&copy).await;
            });
            return;
        }

        // Hold the copy until some gateway confirms delivery, and pass it
        // along to everyone ready except whoever just sent it
        self.persist_pending(&copy).await;
        let peers = self.sessions.ready_peers(Some(from));
        if peers.is_empty() {
            debug!(message_id = %copy.short_id(), "no forward targets, holding locally");
            self.events
                .status(format!("holding message {}", copy.short_id()));
            return;
        }

        debug!(message_id = %copy.short_id(), peers = peers.len(), "relaying");
        for peer in &peers {
            self.transmit(peer, copy.clone(), 0);
        }
        self.events.status(format!(
            "relayed message {} to {} peers",
            copy.short_id(),
            peers.len()
        ));
        self.events.message(copy, MessageChange::Relayed);
    }
}
