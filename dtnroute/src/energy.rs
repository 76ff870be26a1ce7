//! Energy model hook.
//!
//! Energy decays while the radio transmits and while it scans, and a fixed
//! amount is charged when answering a newly discovered neighbor. Nothing is
//! consumed before the warm-up time. The level never drops below zero and is
//! published on the node's [`ModuleBus`] under [`ENERGY_VALUE`].

use crate::bus::{ModuleBus, ENERGY_VALUE};
use crate::config::EnergyConfig;
use crate::time::{Duration, Timestamp};

/// Radio activity sampled once per router update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioState {
    /// Some link of the node is carrying a transfer.
    pub transferring: bool,
    /// The interface scanned for neighbors this round.
    pub scanning: bool,
    /// Transmit range in metres.
    pub range: f64,
}

#[derive(Debug, Clone)]
pub struct EnergyModel {
    config: EnergyConfig,
    energy: f64,
    last_update: Timestamp,
    warmup_end: Timestamp,
}

impl EnergyModel {
    pub fn new(config: EnergyConfig) -> Self {
        Self {
            energy: config.initial_energy,
            last_update: Timestamp::ZERO,
            warmup_end: Timestamp::ZERO.saturating_add(config.warmup),
            config,
        }
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn is_depleted(&self) -> bool {
        self.energy <= 0.0
    }

    /// Charge the cost of answering a neighbor's scan.
    pub fn reduce_discovery_energy(&mut self, bus: &mut ModuleBus, now: Timestamp) {
        self.reduce(self.config.scan_response_energy, bus, now);
    }

    /// Advance the model to `now`.
    pub fn update(&mut self, radio: RadioState, bus: &mut ModuleBus, now: Timestamp) {
        if !bus.contains(ENERGY_VALUE) {
            bus.update_property(ENERGY_VALUE, self.energy);
        }

        let delta = Duration::between(self.last_update, now).as_secs_f64();
        if now > self.last_update && radio.transferring {
            self.reduce(delta * self.config.transmit_energy, bus, now);
        }
        self.last_update = now;

        if radio.scanning && radio.range > 0.0 {
            // Scanning costs at most one second's worth per round
            self.reduce(self.config.scan_energy * delta.min(1.0), bus, now);
        }
    }

    fn reduce(&mut self, amount: f64, bus: &mut ModuleBus, now: Timestamp) {
        if now < self.warmup_end {
            return;
        }
        self.energy = (self.energy - amount).max(0.0);
        bus.update_property(ENERGY_VALUE, self.energy);
    }

    pub fn reset(&mut self) {
        self.energy = self.config.initial_energy;
        self.last_update = Timestamp::ZERO;
    }
}
