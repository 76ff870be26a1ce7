//! All routers, all links and the observers, owned together.
//!
//! Anything that touches two nodes at once (finalizing or aborting a
//! transfer, opening a link) goes through [`Network`], which keeps the
//! borrows disjoint: routers, links and listeners are separate fields.

use tracing::debug;

use crate::active::ActiveRouter;
use crate::bus::ModuleBus;
use crate::config::InterfaceConfig;
use crate::energy::RadioState;
use crate::error::SimError;
use crate::link::LinkTable;
use crate::listener::Listeners;
use crate::message::Message;
use crate::router::RoutingInfo;
use crate::strategy::RoutingStrategy;
use crate::time::Timestamp;
use crate::types::{LinkId, NodeAddr};

/// One node: router, routing strategy, radio interface and module bus.
pub struct Node {
    pub(crate) router: ActiveRouter,
    /// Taken out while the node updates so the strategy can borrow the network.
    pub(crate) strategy: Option<Box<dyn RoutingStrategy>>,
    interface: InterfaceConfig,
    pub(crate) bus: ModuleBus,
}

impl Node {
    pub fn router(&self) -> &ActiveRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut ActiveRouter {
        &mut self.router
    }

    pub fn interface(&self) -> &InterfaceConfig {
        &self.interface
    }

    pub fn bus(&self) -> &ModuleBus {
        &self.bus
    }

    pub fn strategy_name(&self) -> Option<&'static str> {
        self.strategy.as_ref().map(|s| s.name())
    }
}

impl core::fmt::Debug for Node {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node")
            .field("router", &self.router)
            .field("strategy", &self.strategy_name())
            .field("interface", &self.interface)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Network {
    pub(crate) nodes: Vec<Node>,
    pub(crate) links: LinkTable,
    pub(crate) listeners: Listeners,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node whose router is a fresh copy of `prototype`.
    ///
    /// A network holds at most [`NodeAddr::LIMIT`] nodes.
    pub fn add_node(
        &mut self,
        prototype: &ActiveRouter,
        strategy: Box<dyn RoutingStrategy>,
        interface: InterfaceConfig,
    ) -> NodeAddr {
        debug_assert!(self.nodes.len() < NodeAddr::LIMIT);
        let addr = NodeAddr::from_index(self.nodes.len());
        self.nodes.push(Node {
            router: prototype.replicate(addr),
            strategy: Some(strategy),
            interface,
            bus: ModuleBus::new(),
        });
        addr
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn addrs(&self) -> impl Iterator<Item = NodeAddr> {
        (0..self.nodes.len()).map(NodeAddr::from_index)
    }

    pub(crate) fn index(&self, addr: NodeAddr) -> Result<usize, SimError> {
        if addr.index() < self.nodes.len() {
            Ok(addr.index())
        } else {
            Err(SimError::NoSuchNode {
                addr,
                count: self.nodes.len(),
            })
        }
    }

    pub fn node(&self, addr: NodeAddr) -> Result<&Node, SimError> {
        let i = self.index(addr)?;
        Ok(&self.nodes[i])
    }

    pub fn node_mut(&mut self, addr: NodeAddr) -> Result<&mut Node, SimError> {
        let i = self.index(addr)?;
        Ok(&mut self.nodes[i])
    }

    pub fn router(&self, addr: NodeAddr) -> Result<&ActiveRouter, SimError> {
        Ok(&self.node(addr)?.router)
    }

    pub fn links(&self) -> &LinkTable {
        &self.links
    }

    pub fn listeners_mut(&mut self) -> &mut Listeners {
        &mut self.listeners
    }

    pub fn is_transferring(&self, addr: NodeAddr) -> Result<bool, SimError> {
        Ok(self.router(addr)?.is_transferring(&self.links))
    }

    pub fn routing_info(&self, addr: NodeAddr) -> Result<RoutingInfo, SimError> {
        Ok(self.router(addr)?.routing_info())
    }

    // ========================================================================
    // Links
    // ========================================================================

    /// Open a link between `a` and `b`. Returns `None` if they are already linked.
    ///
    /// A node cannot link to itself.
    pub fn connect(
        &mut self,
        a: NodeAddr,
        b: NodeAddr,
        initiator: NodeAddr,
        now: Timestamp,
    ) -> Result<Option<LinkId>, SimError> {
        let ia = self.index(a)?;
        let ib = self.index(b)?;
        if ia == ib {
            return Err(SimError::SelfLink(a));
        }
        let speed = self.nodes[ia]
            .interface
            .speed
            .min(self.nodes[ib].interface.speed);
        let (id, created) = self.links.insert(a, b, initiator, speed);
        if !created {
            return Ok(None);
        }

        debug!(%a, %b, link = %id, %now, "link up");
        self.listeners.connected(a, b);
        for i in [ia, ib] {
            let node = &mut self.nodes[i];
            node.router.add_connection(id);
            node.router.changed_connection(true, initiator, &mut node.bus, now);
        }
        Ok(Some(id))
    }

    /// Take down the link between `a` and `b`. Returns `false` if there was none.
    ///
    /// A transfer in flight is left for the sender's next update to abort.
    pub fn disconnect(&mut self, a: NodeAddr, b: NodeAddr, now: Timestamp) -> Result<bool, SimError> {
        let ia = self.index(a)?;
        let ib = self.index(b)?;
        let Some(id) = self.links.between(a, b) else {
            return Ok(false);
        };
        let initiator = {
            let link = self.links.link(id)?;
            if link.is_initiated_by(a) {
                a
            } else {
                b
            }
        };
        self.links.mark_down(id);

        debug!(%a, %b, link = %id, %now, "link down");
        self.listeners.disconnected(a, b);
        for i in [ia, ib] {
            let node = &mut self.nodes[i];
            node.router.remove_connection(id);
            node.router.changed_connection(false, initiator, &mut node.bus, now);
        }
        Ok(true)
    }

    /// Commit a completed transfer to the receiver.
    pub fn finalize_transfer(&mut self, id: LinkId, now: Timestamp) -> Result<(), SimError> {
        let link = self.links.link_mut(id)?;
        let transfer = link.finish()?;
        let to = link.other(transfer.from);
        let r = self.index(to)?;
        debug!(from = %transfer.from, %to, id = %transfer.message.id(), %now, "transfer done");
        self.nodes[r].router.message_transferred(
            transfer.message.id(),
            transfer.from,
            &self.links,
            now,
            &mut self.listeners,
        )?;
        Ok(())
    }

    /// Cancel an in-flight transfer without committing it.
    pub fn abort_transfer(&mut self, id: LinkId, now: Timestamp) -> Result<(), SimError> {
        let link = self.links.link_mut(id)?;
        let (transfer, remaining) = link.abort(now)?;
        let to = link.other(transfer.from);
        let r = self.index(to)?;
        debug!(from = %transfer.from, %to, id = %transfer.message.id(), remaining, "transfer aborted");
        self.nodes[r].router.base_mut().message_aborted(
            transfer.message.id(),
            transfer.from,
            remaining,
            &mut self.listeners,
        )?;
        self.links.prune(id);
        Ok(())
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Create a message at `from` (after best-effort eviction).
    pub fn create_message(&mut self, msg: Message) -> Result<(), SimError> {
        let i = self.index(msg.from())?;
        self.nodes[i]
            .router
            .create_new_message(msg, &self.links, &mut self.listeners)
    }

    pub fn delete_message(&mut self, host: NodeAddr, id: &str, drop: bool) -> Result<Message, SimError> {
        let i = self.index(host)?;
        self.nodes[i]
            .router
            .base_mut()
            .delete_message(id, drop, &mut self.listeners)
    }

    // ========================================================================
    // Per-tick update
    // ========================================================================

    /// Run one router update for `addr`.
    ///
    /// Order: application updates, sending-link scan (finalize finished,
    /// abort broken), reclaim over-capacity slack, TTL sweep when idle,
    /// energy, then the routing strategy.
    pub fn update_node(&mut self, addr: NodeAddr, now: Timestamp) -> Result<(), SimError> {
        let i = self.index(addr)?;
        let mut strategy = self.nodes[i].strategy.take();
        let result = self.update_node_with(i, addr, strategy.as_deref_mut(), now);
        self.nodes[i].strategy = strategy;
        result
    }

    fn update_node_with(
        &mut self,
        i: usize,
        addr: NodeAddr,
        mut strategy: Option<&mut (dyn RoutingStrategy + 'static)>,
        now: Timestamp,
    ) -> Result<(), SimError> {
        self.nodes[i]
            .router
            .update_applications(&self.links, now, &mut self.listeners)?;

        let sending = self.nodes[i].router.take_sending();
        let mut kept = Vec::with_capacity(sending.len());
        for id in sending {
            let Some(link) = self.links.get(id) else {
                continue;
            };
            let in_flight = link.transfer().is_some();
            if link.is_message_transferred(now) {
                if in_flight {
                    if let Some(s) = strategy.as_deref_mut() {
                        s.transfer_done(self, addr, id, now)?;
                    }
                    self.finalize_transfer(id, now)?;
                }
            } else if !link.is_up() {
                if let Some(s) = strategy.as_deref_mut() {
                    s.transfer_aborted(self, addr, id, now)?;
                }
                self.abort_transfer(id, now)?;
            } else {
                kept.push(id);
                continue;
            }
            self.links.prune(id);
        }
        self.nodes[i].router.restore_sending(kept);

        let radio = self.radio_state(i);
        let node = &mut self.nodes[i];
        node.router.reclaim_slack(&self.links, &mut self.listeners)?;
        node.router.maybe_drop_expired(now, &mut self.listeners)?;
        node.router.update_energy(radio, &mut node.bus, now);

        if let Some(s) = strategy {
            s.update(self, addr, now)?;
        }
        Ok(())
    }

    fn radio_state(&self, i: usize) -> RadioState {
        let node = &self.nodes[i];
        let transferring = node
            .router
            .connections()
            .iter()
            .chain(node.router.sending())
            .any(|&id| self.links.get(id).is_some_and(|l| l.transfer().is_some()));
        RadioState {
            transferring,
            scanning: true,
            range: node.interface.range,
        }
    }

    /// Clear all messages, links and bus state. Nodes and observers stay.
    pub fn reset(&mut self) {
        self.links.reset();
        for node in &mut self.nodes {
            node.router.reset();
            node.bus.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::listener::{ConnectionListener, MessageListener};
    use crate::strategy::DirectDelivery;
    use crate::time::Duration;
    use crate::types::ReceiveCode;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        events: Vec<String>,
    }

    impl MessageListener for Log {
        fn transfer_started(&mut self, msg: &Message, from: NodeAddr, to: NodeAddr) {
            self.events.push(format!("start {} {}->{}", msg.id(), from, to));
        }

        fn transfer_aborted(&mut self, msg: &Message, from: NodeAddr, to: NodeAddr) {
            self.events.push(format!("abort {} {}->{}", msg.id(), from, to));
        }

        fn transferred(&mut self, msg: &Message, from: NodeAddr, to: NodeAddr, first: bool) {
            self.events.push(format!("done {} {}->{} {}", msg.id(), from, to, first));
        }
    }

    impl ConnectionListener for Log {
        fn connected(&mut self, a: NodeAddr, b: NodeAddr) {
            self.events.push(format!("up {}-{}", a, b));
        }

        fn disconnected(&mut self, a: NodeAddr, b: NodeAddr) {
            self.events.push(format!("down {}-{}", a, b));
        }
    }

    /// Nodes with 100 B/s links and no routing logic of their own beyond
    /// direct delivery.
    fn network(n: usize) -> (Network, Rc<RefCell<Log>>) {
        let mut net = Network::new();
        let proto = ActiveRouter::new(NodeAddr(0), RouterConfig::default());
        let iface = InterfaceConfig::default().with_speed(100);
        for _ in 0..n {
            net.add_node(&proto, Box::new(DirectDelivery), iface);
        }
        let log = Rc::new(RefCell::new(Log::default()));
        net.listeners_mut().add_message_listener(log.clone());
        net.listeners_mut().add_connection_listener(log.clone());
        (net, log)
    }

    const A: NodeAddr = NodeAddr(0);
    const B: NodeAddr = NodeAddr(1);
    const C: NodeAddr = NodeAddr(2);

    #[test]
    fn test_unknown_node_is_fatal() {
        let (mut net, _) = network(2);
        assert_eq!(
            net.update_node(NodeAddr(5), Timestamp::ZERO),
            Err(SimError::NoSuchNode {
                addr: NodeAddr(5),
                count: 2
            })
        );
        assert!(net.connect(A, NodeAddr(9), A, Timestamp::ZERO).is_err());
    }

    #[test]
    fn test_connect_is_idempotent() {
        let (mut net, log) = network(2);
        let id = net.connect(A, B, A, Timestamp::ZERO).unwrap();
        assert!(id.is_some());
        assert_eq!(net.connect(B, A, B, Timestamp::ZERO).unwrap(), None);
        assert_eq!(net.router(A).unwrap().connections().len(), 1);
        assert_eq!(net.router(B).unwrap().connections().len(), 1);
        assert_eq!(log.borrow().events, vec!["up n0-n1"]);

        assert!(net.disconnect(A, B, Timestamp::ZERO).unwrap());
        assert!(!net.disconnect(A, B, Timestamp::ZERO).unwrap());
        assert!(net.router(A).unwrap().connections().is_empty());
    }

    #[test]
    fn test_self_link_is_rejected() {
        let (mut net, log) = network(2);
        assert_eq!(net.connect(B, B, B, Timestamp::ZERO), Err(SimError::SelfLink(B)));
        assert_eq!(net.links().iter().count(), 0);
        assert!(net.router(B).unwrap().connections().is_empty());
        assert!(log.borrow().events.is_empty());
    }

    #[test]
    fn test_transfer_completes_on_update() {
        let (mut net, log) = network(2);
        net.create_message(Message::new(A, B, "M", 200, Timestamp::ZERO))
            .unwrap();
        let link = net.connect(A, B, A, Timestamp::ZERO).unwrap().unwrap();

        assert_eq!(
            net.start_transfer(A, "M", link, Timestamp::ZERO).unwrap(),
            ReceiveCode::Ok
        );
        assert!(net.is_transferring(A).unwrap());
        assert!(net.is_transferring(B).unwrap());
        assert!(net.router(B).unwrap().base().is_incoming("M", A));

        // 200 bytes at 100 B/s: still in flight after 1 s
        net.update_node(A, Timestamp::from_secs(1)).unwrap();
        assert_eq!(net.router(A).unwrap().sending(), &[link]);

        net.update_node(A, Timestamp::from_secs(2)).unwrap();
        assert!(net.router(A).unwrap().sending().is_empty());
        assert!(net.router(B).unwrap().base().is_delivered("M"));
        assert!(!net.is_transferring(B).unwrap());
        assert_eq!(net.links().get(link).unwrap().bytes_transferred(), 200);
        assert!(log.borrow().events.contains(&"done M n0->n1 true".to_owned()));
    }

    #[test]
    fn test_link_down_aborts_transfer() {
        let (mut net, log) = network(2);
        net.create_message(Message::new(A, C, "M", 300, Timestamp::ZERO))
            .unwrap();
        let link = net.connect(A, B, A, Timestamp::ZERO).unwrap().unwrap();
        assert!(net.start_transfer(A, "M", link, Timestamp::ZERO).unwrap().is_ok());

        net.disconnect(A, B, Timestamp::from_secs(1)).unwrap();
        // The busy link outlives the disconnect until the sender notices
        assert!(net.links().get(link).is_some());

        net.update_node(A, Timestamp::from_secs(1)).unwrap();
        assert!(net.router(A).unwrap().sending().is_empty());
        assert!(net.router(A).unwrap().base().has_message("M"));
        assert_eq!(net.router(B).unwrap().base().incoming_count(), 0);
        assert!(!net.router(B).unwrap().base().has_message("M"));
        assert!(net.links().get(link).is_none());
        assert_eq!(
            log.borrow().events.last().map(String::as_str),
            Some("abort M n0->n1")
        );
    }

    #[test]
    fn test_energy_discovery_charged_to_non_initiator() {
        use crate::config::EnergyConfig;
        use crate::energy::EnergyModel;

        let mut net = Network::new();
        let energy = EnergyModel::new(EnergyConfig::default().with_initial_energy(10.0));
        let proto = ActiveRouter::new(NodeAddr(0), RouterConfig::default()).with_energy(energy);
        for _ in 0..2 {
            net.add_node(&proto, Box::new(DirectDelivery), InterfaceConfig::default());
        }
        net.connect(A, B, A, Timestamp::from_secs(1)).unwrap();

        let level = |net: &Network, n| net.router(n).unwrap().energy().unwrap().energy();
        assert_eq!(level(&net, A), 10.0);
        assert!((level(&net, B) - 9.9).abs() < 1e-9);
        assert!(net.node(B).unwrap().bus().get(crate::bus::ENERGY_VALUE).is_some());
    }

    #[test]
    fn test_ttl_sweep_waits_for_idle() {
        let mut net = Network::new();
        let proto = ActiveRouter::new(
            NodeAddr(0),
            RouterConfig::default().with_msg_ttl(Duration::from_secs(30)),
        );
        for _ in 0..3 {
            net.add_node(&proto, Box::new(DirectDelivery), InterfaceConfig::default().with_speed(1));
        }
        net.create_message(Message::new(A, C, "M", 1000, Timestamp::ZERO))
            .unwrap();
        net.create_message(Message::new(A, C, "N", 10, Timestamp::ZERO))
            .unwrap();
        let link = net.connect(A, B, A, Timestamp::ZERO).unwrap().unwrap();
        net.start_transfer(A, "M", link, Timestamp::ZERO).unwrap();

        // Sending, so no sweep even though both messages expired
        net.update_node(A, Timestamp::from_secs(60)).unwrap();
        assert!(net.router(A).unwrap().base().has_message("N"));

        net.disconnect(A, B, Timestamp::from_secs(61)).unwrap();
        net.update_node(A, Timestamp::from_secs(61)).unwrap();
        assert_eq!(net.router(A).unwrap().base().message_count(), 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let (mut net, _) = network(2);
        net.create_message(Message::new(A, B, "M", 10, Timestamp::ZERO))
            .unwrap();
        net.connect(A, B, A, Timestamp::ZERO).unwrap();
        net.reset();
        assert_eq!(net.links().up_count(), 0);
        assert_eq!(net.router(A).unwrap().base().message_count(), 0);
        assert!(net.router(A).unwrap().connections().is_empty());
        assert_eq!(net.len(), 2);
    }
}
