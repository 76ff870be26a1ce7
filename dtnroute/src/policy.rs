//! Transfer accept policies.
//!
//! A policy is consulted by the sender before offering a message and by the
//! receiver during admission. The default accepts everything.

use hashbrown::HashSet;

use crate::message::Message;
use crate::types::NodeAddr;

/// Accept/deny decision for message transfers.
pub trait AcceptPolicy {
    /// May `from` offer `msg` to `to`?
    fn accept_sending(&self, _from: NodeAddr, _to: NodeAddr, _msg: &Message) -> bool {
        true
    }

    /// May `to` receive `msg` from `from`?
    fn accept_receiving(&self, _from: NodeAddr, _to: NodeAddr, _msg: &Message) -> bool {
        true
    }
}

/// Accepts every transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AcceptPolicy for AllowAll {}

/// Address-list policy on the message's origin and destination.
///
/// Each list is optional; an absent list allows any address.
#[derive(Debug, Clone, Default)]
pub struct AddressPolicy {
    send_from: Option<HashSet<NodeAddr>>,
    send_to: Option<HashSet<NodeAddr>>,
    receive_from: Option<HashSet<NodeAddr>>,
    receive_to: Option<HashSet<NodeAddr>>,
}

impl AddressPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only send messages that originate at one of `addrs`.
    pub fn with_send_from(mut self, addrs: impl IntoIterator<Item = NodeAddr>) -> Self {
        self.send_from = Some(addrs.into_iter().collect());
        self
    }

    /// Only send messages destined to one of `addrs`.
    pub fn with_send_to(mut self, addrs: impl IntoIterator<Item = NodeAddr>) -> Self {
        self.send_to = Some(addrs.into_iter().collect());
        self
    }

    /// Only receive messages that originate at one of `addrs`.
    pub fn with_receive_from(mut self, addrs: impl IntoIterator<Item = NodeAddr>) -> Self {
        self.receive_from = Some(addrs.into_iter().collect());
        self
    }

    /// Only receive messages destined to one of `addrs`.
    pub fn with_receive_to(mut self, addrs: impl IntoIterator<Item = NodeAddr>) -> Self {
        self.receive_to = Some(addrs.into_iter().collect());
        self
    }

    fn allows(list: &Option<HashSet<NodeAddr>>, addr: NodeAddr) -> bool {
        list.as_ref().map_or(true, |set| set.contains(&addr))
    }
}

impl AcceptPolicy for AddressPolicy {
    fn accept_sending(&self, _from: NodeAddr, _to: NodeAddr, msg: &Message) -> bool {
        Self::allows(&self.send_from, msg.from()) && Self::allows(&self.send_to, msg.to())
    }

    fn accept_receiving(&self, _from: NodeAddr, _to: NodeAddr, msg: &Message) -> bool {
        Self::allows(&self.receive_from, msg.from()) && Self::allows(&self.receive_to, msg.to())
    }
}
