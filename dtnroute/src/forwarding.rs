//! Forwarding primitives.
//!
//! Building blocks routing strategies compose into a per-tick policy. Every
//! helper stops at the first transfer the peer accepts.

use tracing::debug;

use crate::error::SimError;
use crate::network::Network;
use crate::time::Timestamp;
use crate::types::{LinkId, MessageId, NodeAddr, ReceiveCode};

impl Network {
    /// Offer buffered message `id` from `sender` over `link`.
    ///
    /// A sender that is already transferring, or a link that is not ready,
    /// answers busy without asking the peer. On "old" from the final
    /// destination the local copy is deleted when `delete_delivered` is set.
    pub fn start_transfer(
        &mut self,
        sender: NodeAddr,
        id: &str,
        link: LinkId,
        now: Timestamp,
    ) -> Result<ReceiveCode, SimError> {
        let s = self.index(sender)?;
        if self.nodes[s].router.is_transferring(&self.links) {
            return Ok(ReceiveCode::TryLaterBusy);
        }
        let l = self.links.link(link)?;
        if !l.is_ready_for_transfer() {
            return Ok(ReceiveCode::TryLaterBusy);
        }
        let peer = l.other(sender);
        let p = self.index(peer)?;

        let msg = self.nodes[s]
            .router
            .base()
            .message(id)
            .ok_or_else(|| SimError::NoSuchMessage {
                node: sender,
                id: id.to_owned(),
            })?
            .replicate();

        if !self.nodes[s].router.policy().accept_sending(sender, peer, &msg) {
            return Ok(ReceiveCode::DeniedPolicy);
        }

        let to = msg.to();
        let code = self.nodes[p].router.receive_message(
            msg.clone(),
            sender,
            &self.links,
            now,
            &mut self.listeners,
        )?;

        if code.is_ok() {
            debug!(from = %sender, to = %peer, id, %now, "transfer started");
            self.links.link_mut(link)?.begin(sender, msg, now);
            self.nodes[s].router.add_sending(link);
        } else if code == ReceiveCode::DeniedOld && self.nodes[s].router.delete_delivered() && to == peer {
            // The destination already has it
            self.nodes[s]
                .router
                .base_mut()
                .delete_message(id, false, &mut self.listeners)?;
        }
        Ok(code)
    }

    /// Buffered messages paired with the links leading straight to their destination.
    pub fn messages_for_connected(&self, addr: NodeAddr) -> Result<Vec<(MessageId, LinkId)>, SimError> {
        let router = self.router(addr)?;
        let mut pairs = Vec::new();
        for m in router.base().messages() {
            for &link in router.connections() {
                if self.links.get(link).is_some_and(|l| l.other(addr) == m.to()) {
                    pairs.push((m.id().to_owned(), link));
                }
            }
        }
        Ok(pairs)
    }

    /// Try each pair in order until one transfer starts.
    pub fn try_messages_for_connected(
        &mut self,
        addr: NodeAddr,
        pairs: &[(MessageId, LinkId)],
        now: Timestamp,
    ) -> Result<Option<(MessageId, LinkId)>, SimError> {
        for (id, link) in pairs {
            if !self.router(addr)?.base().has_message(id) {
                continue;
            }
            if self.start_transfer(addr, id, *link, now)?.is_ok() {
                return Ok(Some((id.clone(), *link)));
            }
        }
        Ok(None)
    }

    /// Ask `peer` to send something destined to the other end of `link`.
    pub fn request_deliverable_messages(
        &mut self,
        peer: NodeAddr,
        link: LinkId,
        now: Timestamp,
    ) -> Result<bool, SimError> {
        if self.is_transferring(peer)? {
            return Ok(false);
        }
        let other = self.links.link(link)?.other(peer);
        let ids: Vec<MessageId> = self
            .router(peer)?
            .base()
            .messages()
            .filter(|m| m.to() == other)
            .map(|m| m.id().to_owned())
            .collect();
        for id in ids {
            if !self.router(peer)?.base().has_message(&id) {
                continue;
            }
            if self.start_transfer(peer, &id, link, now)?.is_ok() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Offer `ids` over one link in order. Stops at the first acceptance or
    /// when the peer answers busy.
    pub fn try_all_messages(
        &mut self,
        addr: NodeAddr,
        link: LinkId,
        ids: &[MessageId],
        now: Timestamp,
    ) -> Result<Option<MessageId>, SimError> {
        for id in ids {
            if !self.router(addr)?.base().has_message(id) {
                continue;
            }
            let code = self.start_transfer(addr, id, link, now)?;
            if code.is_ok() {
                return Ok(Some(id.clone()));
            }
            if code.is_busy() {
                return Ok(None);
            }
        }
        Ok(None)
    }

    /// Offer every message over every link, messages outer and links inner.
    ///
    /// A link that answers busy is skipped for the remaining messages.
    pub fn try_messages_to_connections(
        &mut self,
        addr: NodeAddr,
        ids: &[MessageId],
        links: &[LinkId],
        now: Timestamp,
    ) -> Result<Option<LinkId>, SimError> {
        let mut busy = vec![false; links.len()];
        for id in ids {
            for (i, &link) in links.iter().enumerate() {
                if busy[i] || !self.router(addr)?.base().has_message(id) {
                    continue;
                }
                let code = self.start_transfer(addr, id, link, now)?;
                if code.is_ok() {
                    return Ok(Some(link));
                }
                busy[i] = code.is_busy();
            }
        }
        Ok(None)
    }

    /// All buffered messages in queue order against all links.
    pub fn try_all_messages_to_all_connections(
        &mut self,
        addr: NodeAddr,
        now: Timestamp,
    ) -> Result<Option<LinkId>, SimError> {
        let router = self.router(addr)?;
        if router.connections().is_empty() || router.base().message_count() == 0 {
            return Ok(None);
        }
        let links = router.connections().to_vec();
        let base = router.base();
        let mut ids = base.message_ids();
        base.sort_by_queue_mode(&mut ids, now, |id| {
            base.message(id).map_or(Timestamp::ZERO, |m| m.received())
        });
        self.try_messages_to_connections(addr, &ids, &links, now)
    }

    /// Deliver to directly connected destinations, else pull from neighbors.
    pub fn exchange_deliverable_messages(
        &mut self,
        addr: NodeAddr,
        now: Timestamp,
    ) -> Result<Option<LinkId>, SimError> {
        let connections = self.router(addr)?.connections().to_vec();
        if connections.is_empty() {
            return Ok(None);
        }

        let mut pairs = self.messages_for_connected(addr)?;
        let base = self.router(addr)?.base();
        base.sort_by_queue_mode(&mut pairs, now, |(id, _)| {
            base.message(id).map_or(Timestamp::ZERO, |m| m.received())
        });
        if let Some((_, link)) = self.try_messages_for_connected(addr, &pairs, now)? {
            return Ok(Some(link));
        }

        for link in connections {
            let Some(peer) = self.links.get(link).map(|l| l.other(addr)) else {
                continue;
            };
            if self.request_deliverable_messages(peer, link, now)? {
                return Ok(Some(link));
            }
        }
        Ok(None)
    }
}
