//! Links between nodes and the table that owns them.
//!
//! A link carries at most one message at a time. A completed transfer is
//! never committed by the link itself: the sending node's update must
//! finalize or abort it explicitly.

use hashbrown::HashMap;
use std::collections::BTreeMap;

use crate::error::SimError;
use crate::message::Message;
use crate::time::{Duration, Timestamp};
use crate::types::{LinkId, NodeAddr};

/// Message in flight on a link.
#[derive(Debug, Clone)]
pub struct Transfer {
    /// Sending endpoint.
    pub from: NodeAddr,
    /// The receiver's copy of the message.
    pub message: Message,
    pub started: Timestamp,
    /// Time the last byte arrives.
    pub done_at: Timestamp,
}

/// Constant bit-rate link between two nodes.
#[derive(Debug, Clone)]
pub struct Link {
    id: LinkId,
    a: NodeAddr,
    b: NodeAddr,
    initiator: NodeAddr,
    up: bool,
    /// Bytes per second.
    speed: u64,
    transfer: Option<Transfer>,
    bytes_transferred: u64,
}

impl Link {
    pub fn new(id: LinkId, a: NodeAddr, b: NodeAddr, initiator: NodeAddr, speed: u64) -> Self {
        Self {
            id,
            a,
            b,
            initiator,
            up: true,
            speed: speed.max(1),
            transfer: None,
            bytes_transferred: 0,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn endpoints(&self) -> (NodeAddr, NodeAddr) {
        (self.a, self.b)
    }

    pub fn speed(&self) -> u64 {
        self.speed
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Up and not carrying a transfer.
    pub fn is_ready_for_transfer(&self) -> bool {
        self.up && self.transfer.is_none()
    }

    /// True when nothing is in flight or the in-flight message has fully arrived.
    pub fn is_message_transferred(&self, now: Timestamp) -> bool {
        self.transfer.as_ref().map_or(true, |t| now >= t.done_at)
    }

    pub fn transfer(&self) -> Option<&Transfer> {
        self.transfer.as_ref()
    }

    pub fn current_message(&self) -> Option<&Message> {
        self.transfer.as_ref().map(|t| &t.message)
    }

    /// The endpoint opposite to `node`.
    pub fn other(&self, node: NodeAddr) -> NodeAddr {
        if node == self.a {
            self.b
        } else {
            self.a
        }
    }

    pub fn connects(&self, node: NodeAddr) -> bool {
        node == self.a || node == self.b
    }

    pub fn is_initiated_by(&self, node: NodeAddr) -> bool {
        self.initiator == node
    }

    /// Total bytes committed or partially sent over this link.
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Time needed to push `size` bytes, rounded up to whole milliseconds.
    pub fn transfer_time(&self, size: u64) -> Duration {
        let ms = (u128::from(size) * 1000).div_ceil(u128::from(self.speed));
        Duration::from_millis(u64::try_from(ms).unwrap_or(u64::MAX))
    }

    /// Put `message` in flight from `from`. The caller checks readiness.
    pub fn begin(&mut self, from: NodeAddr, message: Message, now: Timestamp) {
        let done_at = now.saturating_add(self.transfer_time(message.size()));
        self.transfer = Some(Transfer {
            from,
            message,
            started: now,
            done_at,
        });
    }

    /// Bytes still to be sent at `now`.
    pub fn remaining_bytes(&self, now: Timestamp) -> u64 {
        let Some(t) = &self.transfer else {
            return 0;
        };
        let left_ms = t.done_at.saturating_since(now).as_millis();
        let left = (u128::from(left_ms) * u128::from(self.speed)).div_ceil(1000);
        u64::try_from(left).unwrap_or(u64::MAX).min(t.message.size())
    }

    /// Clear the in-flight transfer as completed.
    pub fn finish(&mut self) -> Result<Transfer, SimError> {
        let transfer = self.transfer.take().ok_or(SimError::NoTransfer(self.id))?;
        self.bytes_transferred += transfer.message.size();
        Ok(transfer)
    }

    /// Clear the in-flight transfer as aborted, returning it and the unsent byte count.
    pub fn abort(&mut self, now: Timestamp) -> Result<(Transfer, u64), SimError> {
        let remaining = self.remaining_bytes(now);
        let transfer = self.transfer.take().ok_or(SimError::NoTransfer(self.id))?;
        self.bytes_transferred += transfer.message.size() - remaining;
        Ok((transfer, remaining))
    }

    pub(crate) fn set_down(&mut self) {
        self.up = false;
    }
}

/// All live links, plus down links whose transfer has not been aborted yet.
#[derive(Debug, Default)]
pub struct LinkTable {
    links: BTreeMap<LinkId, Link>,
    /// Up links by canonical endpoint pair.
    by_pair: HashMap<(NodeAddr, NodeAddr), LinkId>,
    next_id: u64,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new up link. Returns the existing id if the pair is already linked.
    pub fn insert(&mut self, a: NodeAddr, b: NodeAddr, initiator: NodeAddr, speed: u64) -> (LinkId, bool) {
        let pair = canonical_pair(a, b);
        if let Some(&id) = self.by_pair.get(&pair) {
            return (id, false);
        }
        let id = LinkId(self.next_id);
        self.next_id += 1;
        self.links.insert(id, Link::new(id, a, b, initiator, speed));
        self.by_pair.insert(pair, id);
        (id, true)
    }

    /// Id of the up link between `a` and `b`, if any.
    pub fn between(&self, a: NodeAddr, b: NodeAddr) -> Option<LinkId> {
        self.by_pair.get(&canonical_pair(a, b)).copied()
    }

    pub fn get(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn get_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.links.get_mut(&id)
    }

    /// Like [`get`](Self::get) but a missing link is a bookkeeping error.
    pub fn link(&self, id: LinkId) -> Result<&Link, SimError> {
        self.links.get(&id).ok_or(SimError::NoSuchLink(id))
    }

    pub fn link_mut(&mut self, id: LinkId) -> Result<&mut Link, SimError> {
        self.links.get_mut(&id).ok_or(SimError::NoSuchLink(id))
    }

    /// Take a link down. An idle link is removed at once; a busy one stays
    /// until its transfer is aborted.
    pub fn mark_down(&mut self, id: LinkId) -> Option<&Link> {
        let link = self.links.get_mut(&id)?;
        link.set_down();
        self.by_pair.remove(&canonical_pair(link.a, link.b));
        if link.transfer.is_none() {
            self.links.remove(&id);
            return None;
        }
        self.links.get(&id)
    }

    /// Remove a down link once it carries nothing.
    pub fn prune(&mut self, id: LinkId) {
        if self
            .links
            .get(&id)
            .is_some_and(|l| !l.is_up() && l.transfer.is_none())
        {
            self.links.remove(&id);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Number of up links.
    pub fn up_count(&self) -> usize {
        self.by_pair.len()
    }

    pub fn reset(&mut self) {
        self.links.clear();
        self.by_pair.clear();
        self.next_id = 0;
    }
}

/// Canonical pair ordering for consistent link storage.
fn canonical_pair(a: NodeAddr, b: NodeAddr) -> (NodeAddr, NodeAddr) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
