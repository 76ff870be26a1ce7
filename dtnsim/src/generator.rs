//! Seeded message generator.
//!
//! Creates messages between random hosts at random intervals. Sizes and
//! intervals are drawn from half-open ranges `[min, max)`; equal bounds give a
//! fixed value.

use std::ops::Range;

use dtnroute::{ConfigError, Duration, NodeAddr, Timestamp};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::event::{EventSource, ExternalEvent};

/// Settings for a [`MessageGenerator`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Prefix of generated ids; the first message is `<prefix>1`.
    pub prefix: String,
    /// Message size range in bytes.
    pub size: (u64, u64),
    /// Gap between two messages.
    pub interval: (Duration, Duration),
    /// Source addresses.
    pub hosts: Range<u32>,
    /// Destination addresses, `None` to reuse `hosts`.
    pub to_hosts: Option<Range<u32>>,
    /// Only create messages inside this window.
    pub window: Option<(Timestamp, Timestamp)>,
    /// Requested response size, 0 for one-way messages.
    pub response_size: u64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            prefix: "M".into(),
            size: (500_000, 1_000_000),
            interval: (Duration::from_secs(25), Duration::from_secs(35)),
            hosts: 0..2,
            to_hosts: None,
            window: None,
            response_size: 0,
            seed: 0,
        }
    }
}

impl GeneratorConfig {
    pub fn new(hosts: Range<u32>) -> Self {
        Self {
            hosts,
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_size(mut self, min: u64, max: u64) -> Self {
        self.size = (min, max);
        self
    }

    pub fn with_interval(mut self, min: Duration, max: Duration) -> Self {
        self.interval = (min, max);
        self
    }

    pub fn with_to_hosts(mut self, to_hosts: Range<u32>) -> Self {
        self.to_hosts = Some(to_hosts);
        self
    }

    pub fn with_window(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.window = Some((start, end));
        self
    }

    pub fn with_response_size(mut self, size: u64) -> Self {
        self.response_size = size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn to_range(&self) -> Range<u32> {
        self.to_hosts.clone().unwrap_or_else(|| self.hosts.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size.0 > self.size.1 {
            return Err(invalid("size", "min is larger than max"));
        }
        if self.interval.0 > self.interval.1 {
            return Err(invalid("interval", "min is larger than max"));
        }
        if self.interval.1 == Duration::ZERO {
            return Err(ConfigError::NotPositive("interval"));
        }
        if self.hosts.is_empty() {
            return Err(invalid("hosts", "empty address range"));
        }
        let to = self.to_range();
        if to.is_empty() {
            return Err(invalid("to_hosts", "empty address range"));
        }
        if self.hosts.len() == 1 && to.len() == 1 && self.hosts.start == to.start {
            return Err(invalid("to_hosts", "the only destination is the only source"));
        }
        if let Some((start, end)) = self.window {
            if start > end {
                return Err(invalid("window", "start is after end"));
            }
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_owned(),
    }
}

/// External source of message-creation events.
#[derive(Debug, Clone)]
pub struct MessageGenerator {
    config: GeneratorConfig,
    rng: ChaCha8Rng,
    next_time: Timestamp,
    counter: u64,
}

impl MessageGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut generator = Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            next_time: Timestamp::MAX,
            counter: 0,
            config,
        };
        generator.rewind();
        Ok(generator)
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn rewind(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.counter = 0;
        let start = self.config.window.map_or(Timestamp::ZERO, |(start, _)| start);
        self.next_time = start + self.draw_interval();
    }

    fn draw_interval(&mut self) -> Duration {
        let (min, max) = self.config.interval;
        if min == max {
            return min;
        }
        Duration::from_millis(self.rng.gen_range(min.as_millis()..max.as_millis()))
    }

    fn draw_size(&mut self) -> u64 {
        let (min, max) = self.config.size;
        if min == max {
            return min;
        }
        self.rng.gen_range(min..max)
    }

    fn draw_addr(&mut self, range: &Range<u32>) -> NodeAddr {
        if range.len() <= 1 {
            return NodeAddr(range.start);
        }
        NodeAddr(self.rng.gen_range(range.clone()))
    }
}

impl EventSource for MessageGenerator {
    fn next_event_time(&self) -> Timestamp {
        self.next_time
    }

    fn next_event(&mut self) -> Option<ExternalEvent> {
        if self.next_time == Timestamp::MAX {
            return None;
        }

        let hosts = self.config.hosts.clone();
        let to_hosts = self.config.to_range();
        let from = self.draw_addr(&hosts);
        let mut to = self.draw_addr(&to_hosts);
        while to == from {
            to = self.draw_addr(&to_hosts);
        }
        let size = self.draw_size();
        self.counter += 1;
        let event = ExternalEvent::CreateMessage {
            from,
            to,
            id: format!("{}{}", self.config.prefix, self.counter),
            size,
            response_size: self.config.response_size,
        };

        self.next_time = self.next_time + self.draw_interval();
        if let Some((_, end)) = self.config.window {
            if self.next_time > end {
                self.next_time = Timestamp::MAX;
            }
        }
        Some(event)
    }

    fn reset(&mut self) {
        self.rewind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(generator: &mut MessageGenerator, limit: usize) -> Vec<(Timestamp, ExternalEvent)> {
        let mut out = Vec::new();
        while out.len() < limit && generator.next_event_time() != Timestamp::MAX {
            let time = generator.next_event_time();
            out.push((time, generator.next_event().unwrap()));
        }
        out
    }

    #[test]
    fn test_fixed_interval_and_ids() {
        let config = GeneratorConfig::new(0..4)
            .with_interval(Duration::from_secs(10), Duration::from_secs(10))
            .with_size(100, 100)
            .with_prefix("X");
        let mut generator = MessageGenerator::new(config).unwrap();
        let events = drain(&mut generator, 3);

        let times: Vec<_> = events.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            times,
            vec![
                Timestamp::from_secs(10),
                Timestamp::from_secs(20),
                Timestamp::from_secs(30)
            ]
        );
        for (i, (_, event)) in events.iter().enumerate() {
            let ExternalEvent::CreateMessage { from, to, id, size, .. } = event else {
                panic!("unexpected event {event:?}");
            };
            assert_eq!(id, &format!("X{}", i + 1));
            assert_eq!(*size, 100);
            assert_ne!(from, to);
            assert!(from.0 < 4 && to.0 < 4);
        }
    }

    #[test]
    fn test_window_ends_generation() {
        let config = GeneratorConfig::new(0..2)
            .with_interval(Duration::from_secs(5), Duration::from_secs(5))
            .with_window(Timestamp::from_secs(100), Timestamp::from_secs(120));
        let mut generator = MessageGenerator::new(config).unwrap();
        let events = drain(&mut generator, 100);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].0, Timestamp::from_secs(105));
        assert_eq!(generator.next_event(), None);
    }

    #[test]
    fn test_seeded_and_resettable() {
        let config = GeneratorConfig::new(0..10)
            .with_to_hosts(10..20)
            .with_size(10, 1000)
            .with_seed(7);
        let mut a = MessageGenerator::new(config.clone()).unwrap();
        let mut b = MessageGenerator::new(config).unwrap();
        let first = drain(&mut a, 20);
        assert_eq!(first, drain(&mut b, 20));

        for (_, event) in &first {
            let ExternalEvent::CreateMessage { from, to, size, .. } = event else {
                panic!("unexpected event {event:?}");
            };
            assert!((0..10).contains(&from.0));
            assert!((10..20).contains(&to.0));
            assert!((10..1000).contains(size));
        }

        a.reset();
        assert_eq!(first, drain(&mut a, 20));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(GeneratorConfig::new(0..0).validate().is_err());
        assert!(GeneratorConfig::new(3..4).validate().is_err());
        assert!(GeneratorConfig::new(0..4).with_size(10, 5).validate().is_err());
        assert_eq!(
            GeneratorConfig::new(0..4)
                .with_interval(Duration::ZERO, Duration::ZERO)
                .validate(),
            Err(ConfigError::NotPositive("interval"))
        );
        assert!(GeneratorConfig::new(3..4).with_to_hosts(0..1).validate().is_ok());
    }
}
