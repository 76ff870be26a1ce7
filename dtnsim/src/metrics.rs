//! Message statistics collected during a run.

use std::fmt;

use dtnroute::{ConnectionListener, Message, MessageListener, NodeAddr, Timestamp};

/// Counts message lifecycle events. Register it on the network's listeners.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageStats {
    /// Messages created, responses included.
    pub created: u64,
    /// Transfers started.
    pub started: u64,
    /// Transfers completed.
    pub relayed: u64,
    /// Transfers aborted.
    pub aborted: u64,
    /// Buffered copies dropped (eviction, expiry, drop events).
    pub dropped: u64,
    /// Buffered copies removed for other reasons.
    pub removed: u64,
    /// First deliveries to the final recipient.
    pub delivered: u64,
    /// First deliveries of response messages.
    pub responses_delivered: u64,
    /// Links that came up.
    pub contacts: u64,
    /// Creation-to-delivery time of each delivery, in seconds.
    pub latencies: Vec<f64>,
    /// Hop count of each delivery.
    pub hop_counts: Vec<usize>,
}

impl MessageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered over created, 0 when nothing was created.
    pub fn delivery_probability(&self) -> f64 {
        if self.created == 0 {
            return 0.0;
        }
        self.delivered as f64 / self.created as f64
    }

    /// Extra relays per delivered message.
    pub fn overhead_ratio(&self) -> Option<f64> {
        if self.delivered == 0 {
            return None;
        }
        Some((self.relayed as f64 - self.delivered as f64) / self.delivered as f64)
    }

    pub fn average_latency(&self) -> Option<f64> {
        average(self.latencies.iter().copied())
    }

    pub fn average_hop_count(&self) -> Option<f64> {
        average(self.hop_counts.iter().map(|&h| h as f64))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn average(values: impl ExactSizeIterator<Item = f64>) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    Some(values.sum::<f64>() / n as f64)
}

impl MessageListener for MessageStats {
    fn new_message(&mut self, _msg: &Message) {
        self.created += 1;
    }

    fn transfer_started(&mut self, _msg: &Message, _from: NodeAddr, _to: NodeAddr) {
        self.started += 1;
    }

    fn transfer_aborted(&mut self, _msg: &Message, _from: NodeAddr, _to: NodeAddr) {
        self.aborted += 1;
    }

    fn transferred(&mut self, msg: &Message, _from: NodeAddr, _to: NodeAddr, first_delivery: bool) {
        self.relayed += 1;
        if !first_delivery {
            return;
        }
        self.delivered += 1;
        if msg.is_response() {
            self.responses_delivered += 1;
        }
        let latency = msg.received().saturating_since(msg.created());
        self.latencies.push(latency.as_secs_f64());
        self.hop_counts.push(msg.hop_count());
    }

    fn deleted(&mut self, _msg: &Message, _node: NodeAddr, drop: bool) {
        if drop {
            self.dropped += 1;
        } else {
            self.removed += 1;
        }
    }
}

impl ConnectionListener for MessageStats {
    fn connected(&mut self, _a: NodeAddr, _b: NodeAddr) {
        self.contacts += 1;
    }
}

impl fmt::Display for MessageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "created: {}", self.created)?;
        writeln!(f, "started: {}", self.started)?;
        writeln!(f, "relayed: {}", self.relayed)?;
        writeln!(f, "aborted: {}", self.aborted)?;
        writeln!(f, "dropped: {}", self.dropped)?;
        writeln!(f, "removed: {}", self.removed)?;
        writeln!(f, "delivered: {}", self.delivered)?;
        writeln!(f, "contacts: {}", self.contacts)?;
        writeln!(f, "delivery_prob: {:.4}", self.delivery_probability())?;
        match self.overhead_ratio() {
            Some(ratio) => writeln!(f, "overhead_ratio: {ratio:.4}")?,
            None => writeln!(f, "overhead_ratio: NaN")?,
        }
        match self.average_latency() {
            Some(latency) => writeln!(f, "latency_avg: {latency:.4}")?,
            None => writeln!(f, "latency_avg: NaN")?,
        }
        match self.average_hop_count() {
            Some(hops) => write!(f, "hopcount_avg: {hops:.4}"),
            None => write!(f, "hopcount_avg: NaN"),
        }
    }
}

/// Result of running a simulation.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Run index within a batch, 0 for a single run.
    pub run: u32,
    /// Final simulation time.
    pub end_time: Timestamp,
    /// Ticks completed.
    pub ticks: u64,
    /// Whether the run was cancelled before its end time.
    pub cancelled: bool,
    /// Collected message statistics.
    pub stats: MessageStats,
}

impl SimulationResult {
    pub fn delivery_probability(&self) -> f64 {
        self.stats.delivery_probability()
    }
}
