//! Router base engine.
//!
//! Per-node message storage and bookkeeping. A router keeps four disjoint
//! views of the messages it knows about:
//!
//! - `incoming`: partial receives, keyed by message id and sender
//! - `messages`: the forwarding buffer, bounded by the configured capacity
//! - `delivered`: messages that reached this node as final recipient
//! - `blacklisted`: ids an application dropped, so peers stop offering them
//!
//! Admission control lives in [`ActiveRouter`](crate::ActiveRouter); the
//! base engine accepts everything it is offered.

use core::cmp::Ordering;
use core::fmt;
use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::application::{AppEvent, AppHost, Application, Applications};
use crate::config::{QueueMode, RouterConfig};
use crate::error::SimError;
use crate::listener::Listeners;
use crate::message::Message;
use crate::time::Timestamp;
use crate::types::{MessageId, NodeAddr, ReceiveCode};

/// Result of completing a receive.
#[derive(Debug)]
pub struct Delivery {
    /// The message after the application pipeline.
    pub message: Message,
    /// First arrival at its final recipient.
    pub first_delivery: bool,
    /// Messages applications asked the host to create.
    pub created: Vec<Message>,
    /// Events applications reported.
    pub events: Vec<AppEvent>,
}

pub struct MessageRouter {
    addr: NodeAddr,
    config: RouterConfig,
    incoming: HashMap<(MessageId, NodeAddr), Message>,
    /// Ordered by id so eviction ties and iteration are deterministic.
    messages: BTreeMap<MessageId, Message>,
    occupancy: u64,
    delivered: HashMap<MessageId, Message>,
    blacklisted: HashSet<MessageId>,
    applications: Applications,
}

impl fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRouter")
            .field("addr", &self.addr)
            .field("messages", &self.messages.len())
            .field("incoming", &self.incoming.len())
            .field("delivered", &self.delivered.len())
            .field("blacklisted", &self.blacklisted.len())
            .field("applications", &self.applications.len())
            .finish()
    }
}

impl MessageRouter {
    pub fn new(addr: NodeAddr, config: RouterConfig) -> Self {
        Self {
            addr,
            config,
            incoming: HashMap::new(),
            messages: BTreeMap::new(),
            occupancy: 0,
            delivered: HashMap::new(),
            blacklisted: HashSet::new(),
            applications: Applications::default(),
        }
    }

    pub fn addr(&self) -> NodeAddr {
        self.addr
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    // ========================================================================
    // Buffer queries
    // ========================================================================

    pub fn has_message(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    /// Buffered messages in id order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    /// Snapshot of buffered ids, for loops that may delete.
    pub fn message_ids(&self) -> Vec<MessageId> {
        self.messages.keys().cloned().collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn incoming_count(&self) -> usize {
        self.incoming.len()
    }

    pub fn is_incoming(&self, id: &str, from: NodeAddr) -> bool {
        self.incoming.contains_key(&(id.to_owned(), from))
    }

    pub fn is_delivered(&self, id: &str) -> bool {
        self.delivered.contains_key(id)
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    pub fn is_blacklisted(&self, id: &str) -> bool {
        self.blacklisted.contains(id)
    }

    /// Capacity in bytes, `None` if unbounded.
    pub fn buffer_size(&self) -> Option<u64> {
        self.config.buffer_size
    }

    /// Bytes held by buffered messages.
    pub fn occupancy(&self) -> u64 {
        self.occupancy
    }

    /// Free space in bytes. Negative when over capacity, `i64::MAX` if unbounded.
    pub fn free_buffer_size(&self) -> i64 {
        match self.config.buffer_size {
            None => i64::MAX,
            Some(capacity) => to_signed(capacity).saturating_sub(to_signed(self.occupancy)),
        }
    }

    // ========================================================================
    // Message lifecycle
    // ========================================================================

    /// Create a message at this node, stamping the configured TTL.
    pub fn create_new_message(&mut self, mut msg: Message, listeners: &mut Listeners) {
        msg.set_ttl(self.config.msg_ttl);
        trace!(node = %self.addr, id = %msg.id(), size = msg.size(), "created message");
        self.add_to_messages(msg, true, listeners);
    }

    /// Start receiving `msg` from `from`. The base engine always accepts.
    pub fn receive_message(&mut self, mut msg: Message, from: NodeAddr, listeners: &mut Listeners) -> ReceiveCode {
        msg.add_node_on_path(self.addr);
        listeners.transfer_started(&msg, from, self.addr);
        self.incoming.insert((msg.id().to_owned(), from), msg);
        ReceiveCode::Ok
    }

    /// Complete a receive: run the application pipeline and file the result.
    pub fn message_transferred(
        &mut self,
        id: &str,
        from: NodeAddr,
        now: Timestamp,
        listeners: &mut Listeners,
    ) -> Result<Delivery, SimError> {
        let mut incoming = self
            .incoming
            .remove(&(id.to_owned(), from))
            .ok_or_else(|| SimError::NoSuchIncoming {
                node: self.addr,
                id: id.to_owned(),
                from,
            })?;
        incoming.set_received(now);

        let mut host = AppHost::new(self.addr, now);
        let (message, dropped) = if self.applications.is_empty() {
            (incoming, false)
        } else {
            match self.applications.run_pipeline(incoming.clone(), &mut host) {
                Some(out) => (out, false),
                None => (incoming, true),
            }
        };

        let final_recipient = message.to() == self.addr;
        let first_delivery = final_recipient && !self.is_delivered(message.id());

        if !final_recipient && !dropped {
            self.add_to_messages(message.clone(), false, listeners);
        } else if first_delivery {
            self.delivered.insert(id.to_owned(), message.clone());
        } else if dropped {
            trace!(node = %self.addr, id, "blacklisted message");
            self.blacklisted.insert(id.to_owned());
        }

        listeners.transferred(&message, from, self.addr, first_delivery);

        let (created, events) = host.into_parts();
        Ok(Delivery {
            message,
            first_delivery,
            created,
            events,
        })
    }

    /// Drop a partial receive.
    pub fn message_aborted(
        &mut self,
        id: &str,
        from: NodeAddr,
        bytes_remaining: u64,
        listeners: &mut Listeners,
    ) -> Result<(), SimError> {
        let incoming = self
            .incoming
            .remove(&(id.to_owned(), from))
            .ok_or_else(|| SimError::NoSuchIncoming {
                node: self.addr,
                id: id.to_owned(),
                from,
            })?;
        trace!(node = %self.addr, id, %from, bytes_remaining, "receive aborted");
        listeners.transfer_aborted(&incoming, from, self.addr);
        Ok(())
    }

    /// Remove a buffered message. `drop` distinguishes eviction/expiry from removal after delivery.
    pub fn delete_message(&mut self, id: &str, drop: bool, listeners: &mut Listeners) -> Result<Message, SimError> {
        let removed = self.remove_from_messages(id).ok_or_else(|| SimError::NoSuchMessage {
            node: self.addr,
            id: id.to_owned(),
        })?;
        trace!(node = %self.addr, id, drop, "deleted message");
        listeners.deleted(&removed, self.addr, drop);
        Ok(removed)
    }

    fn add_to_messages(&mut self, msg: Message, new_message: bool, listeners: &mut Listeners) {
        if new_message {
            listeners.new_message(&msg);
        }
        self.occupancy += msg.size();
        if let Some(old) = self.messages.insert(msg.id().to_owned(), msg) {
            self.occupancy -= old.size();
        }
    }

    fn remove_from_messages(&mut self, id: &str) -> Option<Message> {
        let msg = self.messages.remove(id)?;
        self.occupancy -= msg.size();
        Some(msg)
    }

    // ========================================================================
    // Queue ordering
    // ========================================================================

    /// Order `items` by the configured queue mode.
    ///
    /// Random mode shuffles with a generator seeded from the whole-second
    /// clock, so repeated calls within the same second agree. FIFO sorts by
    /// receive time, keeping the input order on ties.
    pub fn sort_by_queue_mode<T>(&self, items: &mut [T], now: Timestamp, received: impl Fn(&T) -> Timestamp) {
        match self.config.queue_mode {
            QueueMode::Random => {
                let mut rng = ChaCha8Rng::seed_from_u64(now.as_secs() as u64);
                items.shuffle(&mut rng);
            }
            QueueMode::Fifo => items.sort_by_key(|item| received(item)),
        }
    }

    /// Pairwise form of [`sort_by_queue_mode`](Self::sort_by_queue_mode).
    ///
    /// Random mode orders by a hash of the message id: arbitrary but stable.
    pub fn compare_by_queue_mode(&self, a: &Message, b: &Message) -> Ordering {
        match self.config.queue_mode {
            QueueMode::Random => identity_hash(a.id()).cmp(&identity_hash(b.id())),
            QueueMode::Fifo => a.received().cmp(&b.received()),
        }
    }

    // ========================================================================
    // Applications
    // ========================================================================

    pub fn add_application(&mut self, app: Box<dyn Application>) {
        self.applications.add(app);
    }

    pub fn application_count(&self) -> usize {
        self.applications.len()
    }

    /// Run every application's per-tick update.
    pub fn update_applications(&mut self, now: Timestamp) -> (Vec<Message>, Vec<AppEvent>) {
        let mut host = AppHost::new(self.addr, now);
        self.applications.update(&mut host);
        host.into_parts()
    }

    // ========================================================================
    // Reporting and reset
    // ========================================================================

    pub fn routing_info(&self) -> RoutingInfo {
        let mut info = RoutingInfo::new(format!(
            "{} with {} message(s)",
            self.addr,
            self.messages.len()
        ));

        let mut incoming = RoutingInfo::new(format!("{} incoming message(s)", self.incoming.len()));
        let mut keys: Vec<_> = self.incoming.keys().collect();
        keys.sort();
        for (id, from) in keys {
            incoming.add(RoutingInfo::new(format!("{} from {}", id, from)));
        }

        let mut delivered = RoutingInfo::new(format!("{} delivered message(s)", self.delivered.len()));
        let mut done: Vec<_> = self.delivered.values().collect();
        done.sort_by(|a, b| a.id().cmp(b.id()));
        for m in done {
            delivered.add(RoutingInfo::new(format!("{} path:{:?}", m.id(), m.path())));
        }

        info.add(incoming);
        info.add(delivered);
        info
    }

    /// Forget all messages. Applications stay attached.
    pub fn reset(&mut self) {
        self.incoming.clear();
        self.messages.clear();
        self.occupancy = 0;
        self.delivered.clear();
        self.blacklisted.clear();
    }

    pub(crate) fn replicate_applications(&self, other: &mut MessageRouter) {
        other.applications = self.applications.replicate();
    }
}

/// Human-readable tree snapshot of a router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingInfo {
    text: String,
    children: Vec<RoutingInfo>,
}

impl RoutingInfo {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            children: Vec::new(),
        }
    }

    pub fn add(&mut self, child: RoutingInfo) {
        self.children.push(child);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[RoutingInfo] {
        &self.children
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.text, indent = depth * 2)?;
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for RoutingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

/// FNV-1a over the id bytes.
fn identity_hash(id: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    id.bytes()
        .fold(OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(PRIME))
}

fn to_signed(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
