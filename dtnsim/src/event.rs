//! External events and the event sources the kernel merges.

use std::collections::{BTreeMap, BTreeSet};

use dtnroute::{Message, MessageId, Network, NodeAddr, SimError, Timestamp};
use tracing::debug;

/// An event that applies itself to the network when processed.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalEvent {
    /// Open a link; `from` is the initiator.
    ConnectionUp { from: NodeAddr, to: NodeAddr },
    /// Take a link down.
    ConnectionDown { from: NodeAddr, to: NodeAddr },
    /// Create a message at `from`.
    CreateMessage {
        from: NodeAddr,
        to: NodeAddr,
        id: MessageId,
        size: u64,
        response_size: u64,
    },
    /// Delete one buffered message, or all of them when `id` is `None`.
    DeleteMessage {
        host: NodeAddr,
        id: Option<MessageId>,
        drop: bool,
    },
    /// No effect of its own; the kernel runs an update pass after it.
    Update,
}

impl ExternalEvent {
    pub fn create_message(from: NodeAddr, to: NodeAddr, id: impl Into<MessageId>, size: u64) -> Self {
        ExternalEvent::CreateMessage {
            from,
            to,
            id: id.into(),
            size,
            response_size: 0,
        }
    }

    /// Apply the event at `now`.
    pub fn process(self, net: &mut Network, now: Timestamp) -> Result<(), SimError> {
        debug!(event = ?self, %now, "processing event");
        match self {
            ExternalEvent::ConnectionUp { from, to } => {
                net.connect(from, to, from, now)?;
            }
            ExternalEvent::ConnectionDown { from, to } => {
                net.disconnect(from, to, now)?;
            }
            ExternalEvent::CreateMessage {
                from,
                to,
                id,
                size,
                response_size,
            } => {
                let mut msg = Message::new(from, to, id, size, now);
                msg.set_response_size(response_size);
                net.create_message(msg)?;
            }
            ExternalEvent::DeleteMessage { host, id, drop } => {
                let ids = match id {
                    Some(id) => vec![id],
                    None => net.router(host)?.base().message_ids(),
                };
                for id in ids {
                    net.delete_message(host, &id, drop)?;
                }
            }
            ExternalEvent::Update => {}
        }
        Ok(())
    }
}

/// A time-ordered supply of external events.
///
/// Sources report [`Timestamp::MAX`] once exhausted. A source that needs to
/// load data ahead of time must have it ready before the reported time, or
/// report itself exhausted; the kernel never waits.
pub trait EventSource {
    /// Time of the next event.
    fn next_event_time(&self) -> Timestamp;

    /// Take the next event. Only called when `next_event_time` is due.
    fn next_event(&mut self) -> Option<ExternalEvent>;

    /// Rewind for a fresh run.
    fn reset(&mut self) {}
}

/// In-memory event list, e.g. a pre-parsed trace.
///
/// Events at the same time come out in insertion order. The original list is
/// kept so [`EventSource::reset`] can replay it.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    /// Keyed by time, then by push count.
    pending: BTreeMap<(Timestamp, u64), ExternalEvent>,
    script: Vec<(Timestamp, ExternalEvent)>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: Timestamp, event: ExternalEvent) {
        let pushed = self.script.len() as u64;
        self.pending.insert((time, pushed), event.clone());
        self.script.push((time, event));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl FromIterator<(Timestamp, ExternalEvent)> for EventQueue {
    fn from_iter<I: IntoIterator<Item = (Timestamp, ExternalEvent)>>(iter: I) -> Self {
        let mut queue = EventQueue::new();
        for (time, event) in iter {
            queue.push(time, event);
        }
        queue
    }
}

impl EventSource for EventQueue {
    fn next_event_time(&self) -> Timestamp {
        self.pending.first_key_value().map_or(Timestamp::MAX, |(&(time, _), _)| time)
    }

    fn next_event(&mut self) -> Option<ExternalEvent> {
        self.pending.pop_first().map(|(_, event)| event)
    }

    fn reset(&mut self) {
        self.pending = self
            .script
            .iter()
            .enumerate()
            .map(|(pushed, (time, event))| ((*time, pushed as u64), event.clone()))
            .collect();
    }
}

/// Extra update passes requested at specific times.
///
/// This is the kernel's own source; duplicate times collapse into one.
#[derive(Debug, Clone, Default)]
pub struct ScheduledUpdates {
    times: BTreeSet<Timestamp>,
}

impl ScheduledUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_update(&mut self, time: Timestamp) {
        self.times.insert(time);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

impl EventSource for ScheduledUpdates {
    fn next_event_time(&self) -> Timestamp {
        self.times.first().copied().unwrap_or(Timestamp::MAX)
    }

    fn next_event(&mut self) -> Option<ExternalEvent> {
        self.times.pop_first().map(|_| ExternalEvent::Update)
    }

    fn reset(&mut self) {
        self.times.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtnroute::{ActiveRouter, Epidemic, InterfaceConfig, RouterConfig};

    fn network(count: usize) -> Network {
        let mut net = Network::new();
        let proto = ActiveRouter::new(NodeAddr(0), RouterConfig::default());
        for _ in 0..count {
            net.add_node(&proto, Box::new(Epidemic), InterfaceConfig::default());
        }
        net
    }

    #[test]
    fn test_events_pop_in_time_order() {
        let up = ExternalEvent::ConnectionUp {
            from: NodeAddr(0),
            to: NodeAddr(1),
        };
        let create = ExternalEvent::create_message(NodeAddr(0), NodeAddr(1), "M", 10);
        let down = ExternalEvent::ConnectionDown {
            from: NodeAddr(1),
            to: NodeAddr(0),
        };
        let mut queue = EventQueue::new();
        queue.push(Timestamp::from_millis(2_500), down.clone());
        queue.push(Timestamp::from_millis(1_200), create.clone());
        queue.push(Timestamp::from_millis(300), up.clone());

        assert_eq!(queue.next_event_time(), Timestamp::from_millis(300));
        assert_eq!(queue.next_event(), Some(up));
        assert_eq!(queue.next_event_time(), Timestamp::from_millis(1_200));
        assert_eq!(queue.next_event(), Some(create));
        assert_eq!(queue.next_event(), Some(down));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_same_time_sequence_ordering() {
        let mut queue = EventQueue::new();
        queue.push(Timestamp::from_secs(10), ExternalEvent::create_message(NodeAddr(0), NodeAddr(1), "a", 1));
        queue.push(Timestamp::from_secs(10), ExternalEvent::create_message(NodeAddr(0), NodeAddr(1), "b", 1));
        queue.push(Timestamp::from_secs(3), ExternalEvent::Update);

        assert_eq!(queue.next_event_time(), Timestamp::from_secs(3));
        assert_eq!(queue.next_event(), Some(ExternalEvent::Update));
        assert_eq!(
            queue.next_event(),
            Some(ExternalEvent::create_message(NodeAddr(0), NodeAddr(1), "a", 1))
        );
        assert_eq!(
            queue.next_event(),
            Some(ExternalEvent::create_message(NodeAddr(0), NodeAddr(1), "b", 1))
        );
        assert_eq!(queue.next_event_time(), Timestamp::MAX);
        assert_eq!(queue.next_event(), None);
    }

    #[test]
    fn test_queue_reset_replays() {
        let mut queue: EventQueue = [
            (Timestamp::from_secs(1), ExternalEvent::Update),
            (Timestamp::from_secs(2), ExternalEvent::Update),
        ]
        .into_iter()
        .collect();
        queue.next_event();
        queue.next_event();
        assert!(queue.is_empty());

        queue.reset();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next_event_time(), Timestamp::from_secs(1));
    }

    #[test]
    fn test_scheduled_updates_collapse() {
        let mut updates = ScheduledUpdates::new();
        updates.add_update(Timestamp::from_secs(4));
        updates.add_update(Timestamp::from_secs(2));
        updates.add_update(Timestamp::from_secs(4));
        assert_eq!(updates.len(), 2);

        assert_eq!(updates.next_event_time(), Timestamp::from_secs(2));
        assert_eq!(updates.next_event(), Some(ExternalEvent::Update));
        assert_eq!(updates.next_event_time(), Timestamp::from_secs(4));
        updates.next_event();
        assert_eq!(updates.next_event_time(), Timestamp::MAX);
    }

    #[test]
    fn test_process_connection_events() {
        let mut net = network(2);
        let (a, b) = (NodeAddr(0), NodeAddr(1));

        ExternalEvent::ConnectionUp { from: a, to: b }
            .process(&mut net, Timestamp::ZERO)
            .unwrap();
        let id = net.links().between(a, b).unwrap();
        assert!(net.links().link(id).unwrap().is_initiated_by(a));

        ExternalEvent::ConnectionDown { from: b, to: a }
            .process(&mut net, Timestamp::from_secs(1))
            .unwrap();
        assert_eq!(net.links().between(a, b), None);
    }

    #[test]
    fn test_process_message_events() {
        let mut net = network(2);
        let a = NodeAddr(0);
        ExternalEvent::CreateMessage {
            from: a,
            to: NodeAddr(1),
            id: "M1".into(),
            size: 10,
            response_size: 5,
        }
        .process(&mut net, Timestamp::from_secs(2))
        .unwrap();
        ExternalEvent::create_message(a, NodeAddr(1), "M2", 10)
            .process(&mut net, Timestamp::from_secs(2))
            .unwrap();

        let m1 = net.router(a).unwrap().base().message("M1").unwrap();
        assert_eq!(m1.response_size(), 5);
        assert_eq!(m1.created(), Timestamp::from_secs(2));

        ExternalEvent::DeleteMessage {
            host: a,
            id: Some("M1".into()),
            drop: true,
        }
        .process(&mut net, Timestamp::from_secs(3))
        .unwrap();
        assert_eq!(net.router(a).unwrap().base().message_ids(), vec!["M2".to_string()]);

        ExternalEvent::DeleteMessage {
            host: a,
            id: None,
            drop: false,
        }
        .process(&mut net, Timestamp::from_secs(3))
        .unwrap();
        assert_eq!(net.router(a).unwrap().base().message_count(), 0);
    }

    #[test]
    fn test_delete_missing_is_fatal() {
        let mut net = network(1);
        let err = ExternalEvent::DeleteMessage {
            host: NodeAddr(0),
            id: Some("nope".into()),
            drop: true,
        }
        .process(&mut net, Timestamp::ZERO)
        .unwrap_err();
        assert!(matches!(err, SimError::NoSuchMessage { .. }));
    }
}
