#![forbid(unsafe_code)]
//! dtnroute - Store-carry-forward routing engine for delay-tolerant networks
//!
//! Nodes buffer messages and hand copies to whichever peers they meet. A
//! [`Network`] owns every node's router together with the shared link table,
//! so a single node update can look at its peers and start transfers to them.
//!
//! # Key Properties
//!
//! - Each link carries at most one transfer at a time
//! - A sender runs at most one outgoing transfer at a time
//! - Buffers evict oldest-first, never a message that is being sent
//! - Every ordering decision is derived from the simulated clock, so runs
//!   with the same inputs produce the same event sequence
//!
//! # Example
//!
//! ```
//! use dtnroute::{ActiveRouter, InterfaceConfig, Message, Network, NodeAddr, RouterConfig, Timestamp};
//!
//! let mut net = Network::new();
//! let proto = ActiveRouter::new(NodeAddr(0), RouterConfig::default());
//! let a = net.add_node(&proto, Box::new(dtnroute::Epidemic), InterfaceConfig::default());
//! let b = net.add_node(&proto, Box::new(dtnroute::Epidemic), InterfaceConfig::default());
//!
//! net.create_message(Message::new(a, b, "M1", 1_000, Timestamp::ZERO)).unwrap();
//! net.connect(a, b, a, Timestamp::ZERO).unwrap();
//!
//! net.update_node(a, Timestamp::ZERO).unwrap();
//! net.update_node(a, Timestamp::from_secs(1)).unwrap();
//! assert!(net.router(b).unwrap().base().is_delivered("M1"));
//! ```
//!
//! # Module Structure
//!
//! - [`types`] - Node addresses, link ids and receive codes
//! - [`message`] - The message record
//! - [`link`] - Links, transfers and the link table
//! - [`router`] - Buffer bookkeeping and the application pipeline
//! - [`active`] - Admission, eviction and TTL sweeps
//! - [`network`] - Nodes, connections and the per-node update
//! - [`forwarding`] - Transfer primitives used by strategies
//! - [`strategy`] - Routing strategies and their registry
//! - [`energy`] - Battery model
//! - [`time`] - Timestamp and Duration types

pub mod active;
pub mod application;
pub mod bus;
pub mod config;
pub mod energy;
pub mod error;
pub mod forwarding;
pub mod link;
pub mod listener;
pub mod message;
pub mod network;
pub mod policy;
pub mod router;
pub mod strategy;
pub mod time;
pub mod types;

// Re-export main types at crate root
pub use active::ActiveRouter;
pub use application::{AppEvent, AppHost, Application};
pub use bus::{ModuleBus, ENERGY_VALUE};
pub use config::{EnergyConfig, InterfaceConfig, QueueMode, RouterConfig};
pub use energy::{EnergyModel, RadioState};
pub use error::{ConfigError, SimError};
pub use link::{Link, LinkTable, Transfer};
pub use listener::{ApplicationListener, ConnectionListener, Listeners, MessageListener};
pub use message::Message;
pub use network::{Network, Node};
pub use policy::{AcceptPolicy, AddressPolicy, AllowAll};
pub use router::{Delivery, MessageRouter, RoutingInfo};
pub use strategy::{strategy_by_name, DirectDelivery, Epidemic, RoutingStrategy, STRATEGIES};
pub use time::{Duration, Timestamp};
pub use types::{LinkId, MessageId, NodeAddr, ReceiveCode, RESPONSE_PREFIX};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_hop_relay() {
        let mut net = Network::new();
        let proto = ActiveRouter::new(NodeAddr(0), RouterConfig::default());
        let a = net.add_node(&proto, Box::new(Epidemic), InterfaceConfig::default());
        let b = net.add_node(&proto, Box::new(Epidemic), InterfaceConfig::default());
        let c = net.add_node(&proto, Box::new(Epidemic), InterfaceConfig::default());

        net.create_message(Message::new(a, c, "M1", 500, Timestamp::ZERO))
            .unwrap();
        net.connect(a, b, a, Timestamp::ZERO).unwrap();
        net.update_node(a, Timestamp::ZERO).unwrap();
        net.update_node(a, Timestamp::from_secs(1)).unwrap();
        assert!(net.router(b).unwrap().base().has_message("M1"));

        net.disconnect(a, b, Timestamp::from_secs(2)).unwrap();
        net.connect(b, c, b, Timestamp::from_secs(2)).unwrap();
        net.update_node(b, Timestamp::from_secs(2)).unwrap();
        net.update_node(b, Timestamp::from_secs(3)).unwrap();

        let router = net.router(c).unwrap();
        assert!(router.base().is_delivered("M1"));
        assert_eq!(router.base().message_count(), 0);
    }

    #[test]
    fn test_unknown_node() {
        let net = Network::new();
        assert_eq!(
            net.router(NodeAddr(3)).err(),
            Some(SimError::NoSuchNode {
                addr: NodeAddr(3),
                count: 0
            })
        );
    }
}
