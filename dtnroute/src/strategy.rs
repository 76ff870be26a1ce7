//! Routing strategies and their static registry.
//!
//! A strategy runs at the end of every node update and decides what to send
//! using the forwarding primitives on [`Network`]. It also receives the
//! transfer-done and transfer-aborted hooks for links the node sends on.

use crate::error::{ConfigError, SimError};
use crate::network::Network;
use crate::time::Timestamp;
use crate::types::{LinkId, NodeAddr};

/// Per-node routing policy.
pub trait RoutingStrategy {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Decide what to send. Called after the node's bookkeeping for the tick.
    fn update(&mut self, net: &mut Network, addr: NodeAddr, now: Timestamp) -> Result<(), SimError>;

    /// A transfer on `link` completed; called before it is finalized.
    fn transfer_done(
        &mut self,
        _net: &mut Network,
        _addr: NodeAddr,
        _link: LinkId,
        _now: Timestamp,
    ) -> Result<(), SimError> {
        Ok(())
    }

    /// `link` went down mid-transfer; called before the transfer is aborted.
    fn transfer_aborted(
        &mut self,
        _net: &mut Network,
        _addr: NodeAddr,
        _link: LinkId,
        _now: Timestamp,
    ) -> Result<(), SimError> {
        Ok(())
    }

    /// Fresh copy for another node.
    fn replicate(&self) -> Box<dyn RoutingStrategy>;
}

/// Only hands messages to their final recipient.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDelivery;

impl RoutingStrategy for DirectDelivery {
    fn name(&self) -> &'static str {
        "DirectDelivery"
    }

    fn update(&mut self, net: &mut Network, addr: NodeAddr, now: Timestamp) -> Result<(), SimError> {
        let router = net.router(addr)?;
        if router.is_transferring(net.links()) || !router.can_start_transfer() {
            return Ok(());
        }
        net.exchange_deliverable_messages(addr, now)?;
        Ok(())
    }

    fn replicate(&self) -> Box<dyn RoutingStrategy> {
        Box::new(*self)
    }
}

/// Delivers first, then floods anything a neighbor will take.
#[derive(Debug, Clone, Copy, Default)]
pub struct Epidemic;

impl RoutingStrategy for Epidemic {
    fn name(&self) -> &'static str {
        "Epidemic"
    }

    fn update(&mut self, net: &mut Network, addr: NodeAddr, now: Timestamp) -> Result<(), SimError> {
        let router = net.router(addr)?;
        if router.is_transferring(net.links()) || !router.can_start_transfer() {
            return Ok(());
        }
        if net.exchange_deliverable_messages(addr, now)?.is_some() {
            return Ok(());
        }
        net.try_all_messages_to_all_connections(addr, now)?;
        Ok(())
    }

    fn replicate(&self) -> Box<dyn RoutingStrategy> {
        Box::new(*self)
    }
}

/// Names accepted by [`strategy_by_name`].
pub const STRATEGIES: &[&str] = &["DirectDelivery", "Epidemic"];

/// Resolve a strategy name once at configuration time.
pub fn strategy_by_name(name: &str) -> Result<Box<dyn RoutingStrategy>, ConfigError> {
    match name {
        "DirectDelivery" => Ok(Box::new(DirectDelivery)),
        "Epidemic" => Ok(Box::new(Epidemic)),
        other => Err(ConfigError::UnknownRouter(other.to_owned())),
    }
}
