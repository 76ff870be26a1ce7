//! Active transfer engine.
//!
//! Wraps the [`MessageRouter`] with admission control, buffer eviction,
//! TTL sweeps and energy gating. Operations that need to see link state take
//! the shared [`LinkTable`]; operations that touch two nodes at once live on
//! [`Network`](crate::Network).

use std::rc::Rc;

use tracing::{debug, trace};

use crate::application::AppEvent;
use crate::bus::ModuleBus;
use crate::config::RouterConfig;
use crate::energy::{EnergyModel, RadioState};
use crate::error::SimError;
use crate::link::{Link, LinkTable};
use crate::listener::Listeners;
use crate::message::Message;
use crate::policy::{AcceptPolicy, AllowAll};
use crate::router::{Delivery, MessageRouter, RoutingInfo};
use crate::time::{Duration, Timestamp};
use crate::types::{LinkId, MessageId, NodeAddr, ReceiveCode};

pub struct ActiveRouter {
    base: MessageRouter,
    /// Links this node is currently sending on.
    sending: Vec<LinkId>,
    /// Up links of this node, in connection order.
    connections: Vec<LinkId>,
    last_ttl_check: Timestamp,
    policy: Rc<dyn AcceptPolicy>,
    energy: Option<EnergyModel>,
}

impl core::fmt::Debug for ActiveRouter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActiveRouter")
            .field("base", &self.base)
            .field("sending", &self.sending)
            .field("connections", &self.connections)
            .field("energy", &self.energy.as_ref().map(EnergyModel::energy))
            .finish()
    }
}

impl ActiveRouter {
    pub fn new(addr: NodeAddr, config: RouterConfig) -> Self {
        Self {
            base: MessageRouter::new(addr, config),
            sending: Vec::with_capacity(1),
            connections: Vec::new(),
            last_ttl_check: Timestamp::ZERO,
            policy: Rc::new(AllowAll),
            energy: None,
        }
    }

    pub fn with_policy(mut self, policy: Rc<dyn AcceptPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_energy(mut self, energy: EnergyModel) -> Self {
        self.energy = Some(energy);
        self
    }

    /// Copy for another node: same settings and fresh applications, no state.
    pub fn replicate(&self, addr: NodeAddr) -> Self {
        let mut copy = ActiveRouter::new(addr, self.base.config().clone());
        self.base.replicate_applications(&mut copy.base);
        copy.policy = Rc::clone(&self.policy);
        copy.energy = self.energy.as_ref().map(|e| {
            let mut e = e.clone();
            e.reset();
            e
        });
        copy
    }

    pub fn base(&self) -> &MessageRouter {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut MessageRouter {
        &mut self.base
    }

    pub fn addr(&self) -> NodeAddr {
        self.base.addr()
    }

    pub fn policy(&self) -> &dyn AcceptPolicy {
        self.policy.as_ref()
    }

    pub fn connections(&self) -> &[LinkId] {
        &self.connections
    }

    pub fn sending(&self) -> &[LinkId] {
        &self.sending
    }

    pub fn energy(&self) -> Option<&EnergyModel> {
        self.energy.as_ref()
    }

    pub fn delete_delivered(&self) -> bool {
        self.base.config().delete_delivered
    }

    pub(crate) fn add_connection(&mut self, link: LinkId) {
        if !self.connections.contains(&link) {
            self.connections.push(link);
        }
    }

    pub(crate) fn remove_connection(&mut self, link: LinkId) {
        self.connections.retain(|&l| l != link);
    }

    pub(crate) fn add_sending(&mut self, link: LinkId) {
        self.sending.push(link);
    }

    pub(crate) fn take_sending(&mut self) -> Vec<LinkId> {
        core::mem::take(&mut self.sending)
    }

    /// Restore the scanned sending set, keeping any links added meanwhile.
    pub(crate) fn restore_sending(&mut self, mut kept: Vec<LinkId>) {
        kept.append(&mut self.sending);
        self.sending = kept;
    }

    // ========================================================================
    // Busy state
    // ========================================================================

    /// True while sending, or while any of this node's links is not ready.
    ///
    /// A link being negotiated by the peer counts too, so a node takes part
    /// in at most one transfer at a time.
    pub fn is_transferring(&self, links: &LinkTable) -> bool {
        if !self.sending.is_empty() {
            return true;
        }
        self.connections
            .iter()
            .any(|&id| links.get(id).is_some_and(|l| !l.is_ready_for_transfer()))
    }

    /// True if `id` is in flight on one of the sending links.
    pub fn is_sending(&self, id: &str, links: &LinkTable) -> bool {
        self.sending.iter().any(|&link| {
            links
                .get(link)
                .and_then(Link::current_message)
                .is_some_and(|m| m.id() == id)
        })
    }

    /// Something to send and someone to send it to.
    pub fn can_start_transfer(&self) -> bool {
        self.base.message_count() > 0 && !self.connections.is_empty()
    }

    pub fn has_energy(&self) -> bool {
        self.energy.as_ref().map_or(true, |e| !e.is_depleted())
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Decide whether to take `msg` from `from`. First matching rule wins.
    pub fn check_receiving(
        &mut self,
        msg: &Message,
        from: NodeAddr,
        links: &LinkTable,
        now: Timestamp,
        listeners: &mut Listeners,
    ) -> Result<ReceiveCode, SimError> {
        let addr = self.addr();
        let code = if self.is_transferring(links) {
            ReceiveCode::TryLaterBusy
        } else if self.base.has_message(msg.id())
            || self.base.is_delivered(msg.id())
            || self.base.is_blacklisted(msg.id())
        {
            ReceiveCode::DeniedOld
        } else if msg.is_expired(now) && msg.to() != addr {
            ReceiveCode::DeniedTtl
        } else if !self.has_energy() {
            ReceiveCode::DeniedLowResources
        } else if !self.policy.accept_receiving(from, addr, msg) {
            ReceiveCode::DeniedPolicy
        } else if !self.make_room_for_message(msg.size(), links, listeners)? {
            ReceiveCode::DeniedNoSpace
        } else {
            ReceiveCode::Ok
        };
        trace!(node = %addr, id = %msg.id(), %from, %code, "admission");
        Ok(code)
    }

    /// Admission control, then the base receive.
    pub fn receive_message(
        &mut self,
        msg: Message,
        from: NodeAddr,
        links: &LinkTable,
        now: Timestamp,
        listeners: &mut Listeners,
    ) -> Result<ReceiveCode, SimError> {
        let code = self.check_receiving(&msg, from, links, now, listeners)?;
        if !code.is_ok() {
            return Ok(code);
        }
        Ok(self.base.receive_message(msg, from, listeners))
    }

    // ========================================================================
    // Buffer management
    // ========================================================================

    /// Evict oldest-received messages not being sent until `size` bytes fit.
    ///
    /// Fails at once if `size` exceeds the capacity. Evictions made before
    /// running out of candidates stay committed even when the call fails.
    pub fn make_room_for_message(
        &mut self,
        size: u64,
        links: &LinkTable,
        listeners: &mut Listeners,
    ) -> Result<bool, SimError> {
        let Some(capacity) = self.base.buffer_size() else {
            return Ok(true);
        };
        if size > capacity {
            return Ok(false);
        }

        let needed = i64::try_from(size).unwrap_or(i64::MAX);
        while self.base.free_buffer_size() < needed {
            let Some(id) = self.next_message_to_remove(true, links) else {
                return Ok(false);
            };
            trace!(node = %self.addr(), %id, "evicting");
            self.base.delete_message(&id, true, listeners)?;
        }
        Ok(true)
    }

    /// Oldest buffered message by receive time, optionally skipping ones in flight.
    pub fn next_message_to_remove(&self, exclude_sending: bool, links: &LinkTable) -> Option<MessageId> {
        let mut oldest: Option<&Message> = None;
        for m in self.base.messages() {
            if exclude_sending && self.is_sending(m.id(), links) {
                continue;
            }
            if oldest.map_or(true, |o| o.received() > m.received()) {
                oldest = Some(m);
            }
        }
        oldest.map(|m| m.id().to_owned())
    }

    /// Create a message locally after best-effort eviction.
    ///
    /// Creation succeeds even when eviction cannot free enough space, which
    /// leaves the buffer over capacity until the next update reclaims it.
    pub fn create_new_message(
        &mut self,
        msg: Message,
        links: &LinkTable,
        listeners: &mut Listeners,
    ) -> Result<(), SimError> {
        self.make_room_for_message(msg.size(), links, listeners)?;
        self.base.create_new_message(msg, listeners);
        Ok(())
    }

    /// Drop every buffered message whose TTL ran out. Returns how many.
    pub fn drop_expired_messages(&mut self, now: Timestamp, listeners: &mut Listeners) -> Result<usize, SimError> {
        let expired: Vec<MessageId> = self
            .base
            .messages()
            .filter(|m| m.is_expired(now))
            .map(|m| m.id().to_owned())
            .collect();
        for id in &expired {
            self.base.delete_message(id, true, listeners)?;
        }
        if !expired.is_empty() {
            debug!(node = %self.addr(), count = expired.len(), "dropped expired messages");
        }
        Ok(expired.len())
    }

    /// Run the TTL sweep if idle and the sweep interval has elapsed.
    pub fn maybe_drop_expired(&mut self, now: Timestamp, listeners: &mut Listeners) -> Result<(), SimError> {
        let interval: Duration = self.base.config().ttl_check_interval;
        if self.sending.is_empty() && Duration::between(self.last_ttl_check, now) >= interval {
            self.drop_expired_messages(now, listeners)?;
            self.last_ttl_check = now;
        }
        Ok(())
    }

    /// Evict down to capacity if a creation left the buffer overfull.
    pub fn reclaim_slack(&mut self, links: &LinkTable, listeners: &mut Listeners) -> Result<(), SimError> {
        if self.base.free_buffer_size() < 0 {
            self.make_room_for_message(0, links, listeners)?;
        }
        Ok(())
    }

    // ========================================================================
    // Completion and hooks
    // ========================================================================

    /// Complete a receive, then answer requests and apply application output.
    ///
    /// A request that arrives again while its response is still buffered
    /// does not create a second response. The buffered copy keeps its
    /// creation time and TTL.
    pub fn message_transferred(
        &mut self,
        id: &str,
        from: NodeAddr,
        links: &LinkTable,
        now: Timestamp,
        listeners: &mut Listeners,
    ) -> Result<Message, SimError> {
        let Delivery {
            message,
            created,
            events,
            ..
        } = self.base.message_transferred(id, from, now, listeners)?;

        if message.to() == self.addr() && message.response_size() > 0 {
            let response = Message::response_to(&message, now);
            if !self.base.has_message(response.id()) {
                debug!(node = %self.addr(), id = %response.id(), "creating response");
                self.create_new_message(response, links, listeners)?;
            }
        }

        self.apply_app_output(created, events, links, listeners)?;
        Ok(message)
    }

    /// Run application updates and apply what they produced.
    pub fn update_applications(
        &mut self,
        links: &LinkTable,
        now: Timestamp,
        listeners: &mut Listeners,
    ) -> Result<(), SimError> {
        let (created, events) = self.base.update_applications(now);
        self.apply_app_output(created, events, links, listeners)
    }

    fn apply_app_output(
        &mut self,
        created: Vec<Message>,
        events: Vec<AppEvent>,
        links: &LinkTable,
        listeners: &mut Listeners,
    ) -> Result<(), SimError> {
        let addr = self.addr();
        for event in &events {
            listeners.app_event(event, addr);
        }
        for msg in created {
            self.create_new_message(msg, links, listeners)?;
        }
        Ok(())
    }

    /// A link of this node changed state.
    ///
    /// Answering a neighbor that discovered us costs discovery energy.
    pub fn changed_connection(&mut self, up: bool, initiator: NodeAddr, bus: &mut ModuleBus, now: Timestamp) {
        let addr = self.addr();
        if let Some(energy) = &mut self.energy {
            if up && initiator != addr {
                energy.reduce_discovery_energy(bus, now);
            }
        }
    }

    /// Advance the energy model, if any.
    pub fn update_energy(&mut self, radio: RadioState, bus: &mut ModuleBus, now: Timestamp) {
        if let Some(energy) = &mut self.energy {
            energy.update(radio, bus, now);
        }
    }

    pub fn routing_info(&self) -> RoutingInfo {
        let mut info = self.base.routing_info();
        info.add(RoutingInfo::new(format!(
            "{} connection(s)",
            self.connections.len()
        )));
        if let Some(energy) = &self.energy {
            info.add(RoutingInfo::new(format!("Energy level: {:.2}", energy.energy())));
        }
        info
    }

    pub fn reset(&mut self) {
        self.base.reset();
        self.sending.clear();
        self.connections.clear();
        self.last_ttl_check = Timestamp::ZERO;
        if let Some(energy) = &mut self.energy {
            energy.reset();
        }
    }
}
