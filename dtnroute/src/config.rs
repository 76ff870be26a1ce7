//! Runtime configuration for routers, interfaces and energy models.
//!
//! Each struct has sane defaults, `with_*` builder methods and a
//! `validate()` that the scenario builder calls before the kernel starts.
//!
//! # Defaults
//!
//! | Setting | Default | Meaning |
//! |---------|--------:|---------|
//! | `buffer_size` | unbounded | Bytes of buffer space per node |
//! | `msg_ttl` | infinite | TTL stamped onto locally created messages |
//! | `queue_mode` | `Random` | Order messages are tried against links |
//! | `delete_delivered` | `false` | Drop local copy when destination says it has it |
//! | `ttl_check_interval` | 60 s | Minimum gap between TTL sweeps |
//! | `range` | 10 m | Interface transmit range |
//! | `speed` | 250 kB/s | Interface transmit speed |
//!
//! # Example
//!
//! ```
//! use dtnroute::{Duration, QueueMode, RouterConfig};
//!
//! let config = RouterConfig::default()
//!     .with_buffer_size(5_000_000)
//!     .with_msg_ttl(Duration::from_mins(300))
//!     .with_queue_mode(QueueMode::Fifo);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::ConfigError;
use crate::time::Duration;

/// Default minimum gap between TTL sweeps.
pub const DEFAULT_TTL_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Order in which buffered messages are offered to links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// Clock-seeded shuffle for lists, identity-keyed order for pairs.
    #[default]
    Random,
    /// Oldest receive time first.
    Fifo,
}

impl QueueMode {
    /// Parse a mode name (`"random"`/`"fifo"` or the numeric `1`/`2`).
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "random" | "1" => Ok(QueueMode::Random),
            "fifo" | "2" => Ok(QueueMode::Fifo),
            other => Err(ConfigError::Invalid {
                name: "queue_mode",
                reason: format!("unknown mode {:?}", other),
            }),
        }
    }
}

/// Per-node router settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    /// Buffer capacity in bytes, `None` for unbounded.
    pub buffer_size: Option<u64>,
    /// TTL given to locally created messages, `None` for infinite.
    pub msg_ttl: Option<Duration>,
    /// Queue ordering for forwarding attempts.
    pub queue_mode: QueueMode,
    /// Delete the local copy when the final destination answers "old".
    pub delete_delivered: bool,
    /// Minimum gap between TTL sweeps.
    pub ttl_check_interval: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            buffer_size: None,
            msg_ttl: None,
            queue_mode: QueueMode::default(),
            delete_delivered: false,
            ttl_check_interval: DEFAULT_TTL_CHECK_INTERVAL,
        }
    }
}

impl RouterConfig {
    pub fn with_buffer_size(mut self, bytes: u64) -> Self {
        self.buffer_size = Some(bytes);
        self
    }

    pub fn with_msg_ttl(mut self, ttl: Duration) -> Self {
        self.msg_ttl = Some(ttl);
        self
    }

    pub fn with_queue_mode(mut self, mode: QueueMode) -> Self {
        self.queue_mode = mode;
        self
    }

    pub fn with_delete_delivered(mut self, enabled: bool) -> Self {
        self.delete_delivered = enabled;
        self
    }

    pub fn with_ttl_check_interval(mut self, interval: Duration) -> Self {
        self.ttl_check_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.msg_ttl == Some(Duration::ZERO) {
            return Err(ConfigError::NotPositive("msg_ttl"));
        }
        if self.ttl_check_interval == Duration::ZERO {
            return Err(ConfigError::NotPositive("ttl_check_interval"));
        }
        Ok(())
    }
}

/// Radio interface settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterfaceConfig {
    /// Transmit range in metres.
    pub range: f64,
    /// Transmit speed in bytes per second.
    pub speed: u64,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            range: 10.0,
            speed: 250_000,
        }
    }
}

impl InterfaceConfig {
    pub fn with_range(mut self, range: f64) -> Self {
        self.range = range;
        self
    }

    pub fn with_speed(mut self, speed: u64) -> Self {
        self.speed = speed;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.range.is_finite() || self.range < 0.0 {
            return Err(ConfigError::Invalid {
                name: "range",
                reason: format!("{} is not a non-negative distance", self.range),
            });
        }
        if self.speed == 0 {
            return Err(ConfigError::NotPositive("speed"));
        }
        Ok(())
    }
}

/// Energy model settings. Energy units are arbitrary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyConfig {
    /// Starting energy.
    pub initial_energy: f64,
    /// Cost per second of scanning for neighbors.
    pub scan_energy: f64,
    /// Cost per second of transmitting.
    pub transmit_energy: f64,
    /// Cost of answering a scan from a newly discovered neighbor.
    pub scan_response_energy: f64,
    /// No energy is consumed before this much run time has passed.
    pub warmup: Duration,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            initial_energy: 5000.0,
            scan_energy: 0.1,
            transmit_energy: 0.2,
            scan_response_energy: 0.1,
            warmup: Duration::ZERO,
        }
    }
}

impl EnergyConfig {
    pub fn with_initial_energy(mut self, energy: f64) -> Self {
        self.initial_energy = energy;
        self
    }

    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            ("initial_energy", self.initial_energy),
            ("scan_energy", self.scan_energy),
            ("transmit_energy", self.transmit_energy),
            ("scan_response_energy", self.scan_response_energy),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    name,
                    reason: format!("{} is not a finite non-negative amount", value),
                });
            }
        }
        Ok(())
    }
}
