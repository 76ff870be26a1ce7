//! Simulation kernel: clock, event-source merge and update passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dtnroute::{ConfigError, Duration, Network, NodeAddr, SimError, Timestamp};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::event::{EventSource, ScheduledUpdates};
use crate::listener::{MovementListener, UpdateListener};
use crate::node::SimHost;

/// Cooperative cancellation flag, shareable across threads.
///
/// Polled before every single host update. A cancelled run keeps whatever
/// state it reached.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The source whose event is due next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueSource {
    /// The kernel's scheduled-update source.
    Scheduled,
    /// An external source, by registration index.
    External(usize),
}

/// Owns the clock, the network and the hosts, and drives them tick by tick.
pub struct World {
    net: Network,
    hosts: Vec<SimHost>,
    clock: Timestamp,
    update_interval: Duration,
    scheduled: ScheduledUpdates,
    sources: Vec<Box<dyn EventSource>>,
    randomize_updates: bool,
    simulate_connections: bool,
    simulate_connections_once: bool,
    /// Connectivity simulation for the rest of this run.
    simulating: bool,
    cancel: CancelHandle,
    update_listeners: Vec<Box<dyn UpdateListener>>,
    movement_listeners: Vec<Box<dyn MovementListener>>,
    ticks: u64,
}

impl core::fmt::Debug for World {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("World")
            .field("clock", &self.clock)
            .field("update_interval", &self.update_interval)
            .field("hosts", &self.hosts.len())
            .field("sources", &self.sources.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl World {
    /// Host `i` must belong to the network node with address `i`.
    pub fn new(net: Network, hosts: Vec<SimHost>, update_interval: Duration) -> Result<Self, ConfigError> {
        if update_interval == Duration::ZERO {
            return Err(ConfigError::NotPositive("update_interval"));
        }
        if hosts.len() != net.len() {
            return Err(ConfigError::Invalid {
                name: "hosts",
                reason: format!("{} hosts for {} network nodes", hosts.len(), net.len()),
            });
        }
        if let Some((i, host)) = hosts.iter().enumerate().find(|(i, h)| h.addr().index() != *i) {
            return Err(ConfigError::Invalid {
                name: "hosts",
                reason: format!("host {} is at index {}", host.addr(), i),
            });
        }
        Ok(Self {
            net,
            hosts,
            clock: Timestamp::ZERO,
            update_interval,
            scheduled: ScheduledUpdates::new(),
            sources: Vec::new(),
            randomize_updates: true,
            simulate_connections: false,
            simulate_connections_once: false,
            simulating: false,
            cancel: CancelHandle::new(),
            update_listeners: Vec::new(),
            movement_listeners: Vec::new(),
            ticks: 0,
        })
    }

    /// Shuffle the host update order on every pass (default on).
    pub fn with_randomized_updates(mut self, enabled: bool) -> Self {
        self.randomize_updates = enabled;
        self
    }

    /// Open and close links by radio range on every host update.
    pub fn with_connectivity(mut self, enabled: bool) -> Self {
        self.simulate_connections = enabled;
        self.simulating = enabled;
        self
    }

    /// Stop simulating connectivity after the first update pass.
    pub fn with_connectivity_once(mut self, once: bool) -> Self {
        self.simulate_connections_once = once;
        self
    }

    pub fn now(&self) -> Timestamp {
        self.clock
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn net(&self) -> &Network {
        &self.net
    }

    pub fn net_mut(&mut self) -> &mut Network {
        &mut self.net
    }

    pub fn hosts(&self) -> &[SimHost] {
        &self.hosts
    }

    /// Look up a host. An out-of-range address is fatal for the run.
    pub fn host(&self, addr: NodeAddr) -> Result<&SimHost, SimError> {
        self.hosts.get(addr.index()).ok_or(SimError::NoSuchNode {
            addr,
            count: self.hosts.len(),
        })
    }

    /// Register an external source. Ties go to the earlier registration.
    pub fn add_event_source(&mut self, source: Box<dyn EventSource>) -> usize {
        self.sources.push(source);
        self.sources.len() - 1
    }

    pub fn add_update_listener(&mut self, listener: impl UpdateListener + 'static) {
        self.update_listeners.push(Box::new(listener));
    }

    /// Register a movement observer; it is told every host's current location.
    pub fn add_movement_listener(&mut self, mut listener: impl MovementListener + 'static) {
        for host in &self.hosts {
            listener.initial_location(host.addr(), host.location());
        }
        self.movement_listeners.push(Box::new(listener));
    }

    /// Request an extra update pass at `time`.
    pub fn schedule_update(&mut self, time: Timestamp) {
        self.scheduled.add_update(time);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Share an externally owned cancellation flag.
    pub fn set_cancel_handle(&mut self, cancel: CancelHandle) {
        self.cancel = cancel;
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The source with the earliest next event.
    ///
    /// The scheduled-update source is checked first and the others in
    /// registration order; a later source only wins with a strictly earlier
    /// time.
    pub fn next_due_source(&self) -> (DueSource, Timestamp) {
        let mut due = DueSource::Scheduled;
        let mut earliest = self.scheduled.next_event_time();
        for (i, source) in self.sources.iter().enumerate() {
            let time = source.next_event_time();
            if time < earliest {
                due = DueSource::External(i);
                earliest = time;
            }
        }
        (due, earliest)
    }

    /// Advance the clock by one update interval.
    ///
    /// Every event due by the end of the interval is applied in time order,
    /// each followed by a full update pass. Then hosts move, the clock lands
    /// on the deadline, a final pass runs and tick observers are notified.
    pub fn advance_one_tick(&mut self) -> Result<(), SimError> {
        let deadline = self.clock.saturating_add(self.update_interval);

        let (mut due, mut time) = self.next_due_source();
        while time <= deadline {
            self.clock = self.clock.max(time);
            let event = match due {
                DueSource::Scheduled => self.scheduled.next_event(),
                DueSource::External(i) => self.sources[i].next_event(),
            };
            let Some(event) = event else {
                break;
            };
            event.process(&mut self.net, self.clock)?;
            self.update_hosts()?;
            (due, time) = self.next_due_source();
        }

        self.move_hosts(self.update_interval);
        self.clock = deadline;
        self.update_hosts()?;

        for l in &mut self.update_listeners {
            l.updated(self.clock, &self.net, &self.hosts);
        }
        self.ticks += 1;
        Ok(())
    }

    /// Host indices in the order of the next update pass.
    ///
    /// With randomization on this is a permutation seeded by the whole-second
    /// clock, so passes within the same second share an order.
    pub fn update_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.hosts.len()).collect();
        if self.randomize_updates {
            let mut rng = ChaCha8Rng::seed_from_u64(self.clock.as_secs() as u64);
            order.shuffle(&mut rng);
        }
        order
    }

    fn update_hosts(&mut self) -> Result<(), SimError> {
        let now = self.clock;
        for i in self.update_order() {
            if self.cancel.is_cancelled() {
                break;
            }
            self.update_host(i, now)?;
        }
        if self.simulate_connections_once && self.simulating {
            self.simulating = false;
        }
        Ok(())
    }

    fn update_host(&mut self, i: usize, now: Timestamp) -> Result<(), SimError> {
        let addr = self.hosts[i].addr();
        if !self.hosts[i].is_radio_active(now) {
            for peer in self.peers(addr)? {
                self.net.disconnect(addr, peer, now)?;
            }
            return Ok(());
        }
        if self.simulating {
            self.update_connectivity(i, now)?;
        }
        self.net.update_node(addr, now)
    }

    fn peers(&self, addr: NodeAddr) -> Result<Vec<NodeAddr>, SimError> {
        let links = self.net.links();
        Ok(self
            .net
            .router(addr)?
            .connections()
            .iter()
            .filter_map(|&id| links.get(id))
            .map(|l| l.other(addr))
            .collect())
    }

    /// Distance check against the smaller of the two radio ranges.
    fn within_range(&self, a: usize, b: usize) -> Result<bool, SimError> {
        let range_a = self.net.node(self.hosts[a].addr())?.interface().range;
        let range_b = self.net.node(self.hosts[b].addr())?.interface().range;
        let distance = self.hosts[a].location().distance(&self.hosts[b].location());
        Ok(distance <= range_a.min(range_b))
    }

    /// Drop links to peers out of range, then open links to peers in range.
    fn update_connectivity(&mut self, i: usize, now: Timestamp) -> Result<(), SimError> {
        let addr = self.hosts[i].addr();
        for peer in self.peers(addr)? {
            if !self.within_range(i, peer.index())? {
                self.net.disconnect(addr, peer, now)?;
            }
        }

        for j in 0..self.hosts.len() {
            if j == i || !self.hosts[j].is_radio_active(now) {
                continue;
            }
            let peer = self.hosts[j].addr();
            if self.net.links().between(addr, peer).is_some() {
                continue;
            }
            if self.within_range(i, j)? {
                self.net.connect(addr, peer, addr, now)?;
            }
        }
        Ok(())
    }

    fn move_hosts(&mut self, step: Duration) {
        let now = self.clock;
        for host in &mut self.hosts {
            host.advance(step, now, &mut self.movement_listeners);
        }
    }

    /// Settle mobility before `t = 0` by moving hosts from `-warmup` in
    /// update-interval steps. No events, updates or observers run.
    pub fn warmup_movement(&mut self, warmup: Duration) {
        if warmup == Duration::ZERO {
            return;
        }
        debug!(%warmup, "movement warm-up");
        self.clock = Timestamp::ZERO - warmup;
        let last_full_step = Timestamp::ZERO - self.update_interval;
        while self.clock < last_full_step {
            self.move_hosts(self.update_interval);
            self.clock += self.update_interval;
        }
        let final_step = Duration::between(self.clock, Timestamp::ZERO);
        self.move_hosts(final_step);
        self.clock = Timestamp::ZERO;
    }

    /// Tick until the clock reaches `end` or the run is cancelled.
    pub fn run_until(&mut self, end: Timestamp) -> Result<Timestamp, SimError> {
        info!(hosts = self.hosts.len(), %end, interval = %self.update_interval, "run started");
        while self.clock < end {
            if self.cancel.is_cancelled() {
                warn!(now = %self.clock, "run cancelled");
                break;
            }
            self.advance_one_tick()?;
        }
        if self.cancel.is_cancelled() && self.clock >= end {
            warn!(now = %self.clock, "run cancelled during the last tick");
        }
        info!(now = %self.clock, ticks = self.ticks, "run finished");
        Ok(self.clock)
    }

    /// Clear all run state so the same world can run again.
    pub fn reset(&mut self) {
        self.net.reset();
        for host in &mut self.hosts {
            host.reset();
        }
        for source in &mut self.sources {
            source.reset();
        }
        self.scheduled.reset();
        self.clock = Timestamp::ZERO;
        self.simulating = self.simulate_connections;
        self.cancel.clear();
        self.ticks = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use dtnroute::{ActiveRouter, DirectDelivery, InterfaceConfig, Message, RouterConfig, RoutingStrategy};

    use super::*;
    use crate::event::{EventQueue, ExternalEvent};
    use crate::movement::{Coord, Path, Scripted, Stationary};

    fn world_at(locations: &[Coord]) -> World {
        let mut net = Network::new();
        let proto = ActiveRouter::new(NodeAddr(0), RouterConfig::default());
        let mut hosts = Vec::new();
        for &loc in locations {
            let addr = net.add_node(&proto, Box::new(DirectDelivery), InterfaceConfig::default());
            hosts.push(SimHost::new(addr, "n", Box::new(Stationary::at(loc))));
        }
        World::new(net, hosts, Duration::from_secs(1)).unwrap()
    }

    fn world(count: usize) -> World {
        let locations: Vec<_> = (0..count).map(|i| Coord::new(i as f64 * 100.0, 0.0)).collect();
        world_at(&locations)
    }

    /// Records the clock of every tick.
    #[derive(Default)]
    struct Ticks(Vec<Timestamp>);

    impl UpdateListener for Ticks {
        fn updated(&mut self, now: Timestamp, _net: &Network, _hosts: &[SimHost]) {
            self.0.push(now);
        }
    }

    #[derive(Default)]
    struct Places(Vec<(NodeAddr, Coord)>);

    impl MovementListener for Places {
        fn initial_location(&mut self, host: NodeAddr, location: Coord) {
            self.0.push((host, location));
        }
    }

    #[test]
    fn test_rejects_bad_setup() {
        assert_eq!(
            World::new(Network::new(), Vec::new(), Duration::ZERO).err().map(|e| e.to_string()),
            Some(ConfigError::NotPositive("update_interval").to_string())
        );

        let mut net = Network::new();
        let proto = ActiveRouter::new(NodeAddr(0), RouterConfig::default());
        net.add_node(&proto, Box::new(DirectDelivery), InterfaceConfig::default());
        assert!(World::new(net, Vec::new(), Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_tick_advances_clock_and_notifies() {
        let mut world = world(2);
        let ticks = Rc::new(RefCell::new(Ticks::default()));
        world.add_update_listener(Rc::clone(&ticks));

        world.run_until(Timestamp::from_secs(3)).unwrap();
        assert_eq!(world.now(), Timestamp::from_secs(3));
        assert_eq!(world.ticks(), 3);
        assert_eq!(
            ticks.borrow().0,
            vec![
                Timestamp::from_secs(1),
                Timestamp::from_secs(2),
                Timestamp::from_secs(3)
            ]
        );
    }

    #[test]
    fn test_next_due_source_ties() {
        let mut world = world(2);
        let mut first = EventQueue::new();
        first.push(Timestamp::from_secs(5), ExternalEvent::Update);
        let mut second = EventQueue::new();
        second.push(Timestamp::from_secs(5), ExternalEvent::Update);
        second.push(Timestamp::from_secs(2), ExternalEvent::Update);
        world.add_event_source(Box::new(first));
        world.add_event_source(Box::new(second));

        assert_eq!(
            world.next_due_source(),
            (DueSource::External(1), Timestamp::from_secs(2))
        );

        world.schedule_update(Timestamp::from_secs(2));
        assert_eq!(
            world.next_due_source(),
            (DueSource::Scheduled, Timestamp::from_secs(2))
        );
    }

    #[test]
    fn test_events_apply_in_time_order() {
        let mut world = world(3);
        let (a, b, c) = (NodeAddr(0), NodeAddr(1), NodeAddr(2));
        let mut queue = EventQueue::new();
        queue.push(Timestamp::from_millis(700), ExternalEvent::ConnectionDown { from: a, to: b });
        queue.push(Timestamp::from_millis(300), ExternalEvent::ConnectionUp { from: a, to: b });
        queue.push(Timestamp::from_millis(1500), ExternalEvent::ConnectionUp { from: b, to: c });
        world.add_event_source(Box::new(queue));

        world.advance_one_tick().unwrap();
        assert_eq!(world.net().links().between(a, b), None);
        assert_eq!(world.net().links().between(b, c), None);

        world.advance_one_tick().unwrap();
        assert!(world.net().links().between(b, c).is_some());
    }

    #[test]
    fn test_event_on_deadline_runs_this_tick() {
        let mut world = world(2);
        let mut queue = EventQueue::new();
        queue.push(
            Timestamp::from_secs(1),
            ExternalEvent::ConnectionUp {
                from: NodeAddr(0),
                to: NodeAddr(1),
            },
        );
        world.add_event_source(Box::new(queue));
        world.advance_one_tick().unwrap();
        assert_eq!(world.net().links().up_count(), 1);
    }

    #[test]
    fn test_update_order_seeded_by_second() {
        let mut world = world(16);
        let identity: Vec<usize> = (0..16).collect();

        world.clock = Timestamp::from_millis(5_100);
        let first = world.update_order();
        world.clock = Timestamp::from_millis(5_900);
        assert_eq!(world.update_order(), first);

        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, identity);

        let other_seconds: Vec<_> = (6..12)
            .map(|s| {
                world.clock = Timestamp::from_secs(s);
                world.update_order()
            })
            .collect();
        assert!(other_seconds.iter().any(|order| *order != first));

        let world = world.with_randomized_updates(false);
        assert_eq!(world.update_order(), identity);
    }

    #[test]
    fn test_cancel_skips_remaining_updates() {
        let mut world = world(2);
        let handle = world.cancel_handle();
        world.advance_one_tick().unwrap();

        handle.cancel();
        assert!(world.is_cancelled());
        let end = world.run_until(Timestamp::from_secs(10)).unwrap();
        assert_eq!(end, Timestamp::from_secs(1));
        assert_eq!(world.ticks(), 1);
    }

    /// Records every update and cancels the run from inside the update of `trip_at`.
    #[derive(Clone)]
    struct CancelOnUpdate {
        trip_at: NodeAddr,
        cancel: CancelHandle,
        updated: Rc<RefCell<Vec<NodeAddr>>>,
    }

    impl RoutingStrategy for CancelOnUpdate {
        fn name(&self) -> &'static str {
            "CancelOnUpdate"
        }

        fn update(&mut self, net: &mut Network, addr: NodeAddr, now: Timestamp) -> Result<(), SimError> {
            self.updated.borrow_mut().push(addr);
            if addr == self.trip_at {
                net.create_message(Message::new(addr, NodeAddr(0), "K", 10, now))?;
                self.cancel.cancel();
            }
            Ok(())
        }

        fn replicate(&self) -> Box<dyn RoutingStrategy> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_cancel_during_pass_stops_later_hosts() {
        let cancel = CancelHandle::new();
        let updated = Rc::new(RefCell::new(Vec::new()));
        let strategy = CancelOnUpdate {
            trip_at: NodeAddr(1),
            cancel: cancel.clone(),
            updated: Rc::clone(&updated),
        };
        let mut net = Network::new();
        let proto = ActiveRouter::new(NodeAddr(0), RouterConfig::default());
        let mut hosts = Vec::new();
        for _ in 0..4 {
            let addr = net.add_node(&proto, strategy.replicate(), InterfaceConfig::default());
            hosts.push(SimHost::new(addr, "n", Box::new(Stationary::at(Coord::default()))));
        }
        let mut world = World::new(net, hosts, Duration::from_secs(1))
            .unwrap()
            .with_randomized_updates(false);
        world.set_cancel_handle(cancel);

        world.advance_one_tick().unwrap();

        assert!(world.is_cancelled());
        assert_eq!(*updated.borrow(), [NodeAddr(0), NodeAddr(1)]);
        assert!(world.net().router(NodeAddr(1)).unwrap().base().has_message("K"));
        assert_eq!(world.now(), Timestamp::from_secs(1));
        assert_eq!(world.ticks(), 1);
    }

    #[test]
    fn test_range_connectivity() {
        let mut world = world_at(&[Coord::new(0.0, 0.0), Coord::new(5.0, 0.0), Coord::new(50.0, 0.0)])
            .with_connectivity(true);
        world.advance_one_tick().unwrap();

        let links = world.net().links();
        assert!(links.between(NodeAddr(0), NodeAddr(1)).is_some());
        assert_eq!(links.between(NodeAddr(0), NodeAddr(2)), None);
        assert_eq!(links.between(NodeAddr(1), NodeAddr(2)), None);
    }

    #[test]
    fn test_moving_out_of_range_disconnects() {
        let mut net = Network::new();
        let proto = ActiveRouter::new(NodeAddr(0), RouterConfig::default());
        let a = net.add_node(&proto, Box::new(DirectDelivery), InterfaceConfig::default());
        let b = net.add_node(&proto, Box::new(DirectDelivery), InterfaceConfig::default());
        let walker = Scripted::new(Coord::new(5.0, 0.0))
            .with_leg(Timestamp::from_secs(1), Path::new(10.0).with_waypoint(Coord::new(100.0, 0.0)));
        let hosts = vec![
            SimHost::new(a, "n", Box::new(Stationary::at(Coord::default()))),
            SimHost::new(b, "n", Box::new(walker)),
        ];
        let mut world = World::new(net, hosts, Duration::from_secs(1))
            .unwrap()
            .with_connectivity(true);

        world.advance_one_tick().unwrap();
        assert!(world.net().links().between(a, b).is_some());

        world.advance_one_tick().unwrap();
        world.advance_one_tick().unwrap();
        assert_eq!(world.net().links().between(a, b), None);
    }

    #[test]
    fn test_connectivity_once() {
        let mut world = world_at(&[Coord::new(0.0, 0.0), Coord::new(5.0, 0.0)])
            .with_connectivity(true)
            .with_connectivity_once(true);
        world.advance_one_tick().unwrap();
        assert_eq!(world.net().links().up_count(), 1);

        world
            .net_mut()
            .disconnect(NodeAddr(0), NodeAddr(1), Timestamp::from_secs(1))
            .unwrap();
        world.advance_one_tick().unwrap();
        assert_eq!(world.net().links().up_count(), 0);
    }

    #[test]
    fn test_inactive_host_loses_links() {
        let mut net = Network::new();
        let proto = ActiveRouter::new(NodeAddr(0), RouterConfig::default());
        let a = net.add_node(&proto, Box::new(DirectDelivery), InterfaceConfig::default());
        let b = net.add_node(&proto, Box::new(DirectDelivery), InterfaceConfig::default());
        let sleeper = Scripted::new(Coord::new(1.0, 0.0))
            .with_inactive(Timestamp::from_secs(2), Timestamp::from_secs(4));
        let hosts = vec![
            SimHost::new(a, "n", Box::new(Stationary::at(Coord::default()))),
            SimHost::new(b, "n", Box::new(sleeper)),
        ];
        let mut world = World::new(net, hosts, Duration::from_secs(1)).unwrap();
        world.net_mut().connect(a, b, a, Timestamp::ZERO).unwrap();

        world.advance_one_tick().unwrap();
        assert_eq!(world.net().links().up_count(), 1);
        world.advance_one_tick().unwrap();
        assert_eq!(world.net().links().up_count(), 0);
    }

    #[test]
    fn test_warmup_moves_without_ticks() {
        let mut net = Network::new();
        let proto = ActiveRouter::new(NodeAddr(0), RouterConfig::default());
        let a = net.add_node(&proto, Box::new(DirectDelivery), InterfaceConfig::default());
        let walker = Scripted::new(Coord::default())
            .with_leg(Timestamp::MIN, Path::new(1.0).with_waypoint(Coord::new(100.0, 0.0)));
        let hosts = vec![SimHost::new(a, "n", Box::new(walker))];
        let mut world = World::new(net, hosts, Duration::from_secs(2)).unwrap();
        let ticks = Rc::new(RefCell::new(Ticks::default()));
        world.add_update_listener(Rc::clone(&ticks));

        world.warmup_movement(Duration::from_millis(4_500));
        assert_eq!(world.now(), Timestamp::ZERO);
        assert_eq!(world.ticks(), 0);
        assert!(ticks.borrow().0.is_empty());
        let loc = world.host(a).unwrap().location();
        assert!((loc.x - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_movement_listener_gets_initial_locations() {
        let mut world = world(3);
        let places = Rc::new(RefCell::new(Places::default()));
        world.add_movement_listener(Rc::clone(&places));
        assert_eq!(places.borrow().0.len(), 3);
        assert_eq!(places.borrow().0[2], (NodeAddr(2), Coord::new(200.0, 0.0)));
    }

    #[test]
    fn test_host_lookup_out_of_range() {
        let world = world(2);
        assert!(world.host(NodeAddr(1)).is_ok());
        assert_eq!(
            world.host(NodeAddr(2)).err(),
            Some(SimError::NoSuchNode {
                addr: NodeAddr(2),
                count: 2
            })
        );
    }

    #[test]
    fn test_reset_replays_sources() {
        let mut world = world(2);
        let mut queue = EventQueue::new();
        queue.push(
            Timestamp::from_millis(500),
            ExternalEvent::create_message(NodeAddr(0), NodeAddr(1), "M1", 10),
        );
        world.add_event_source(Box::new(queue));
        world.run_until(Timestamp::from_secs(2)).unwrap();
        assert!(world.net().router(NodeAddr(0)).unwrap().base().has_message("M1"));

        world.reset();
        assert_eq!(world.now(), Timestamp::ZERO);
        assert!(!world.net().router(NodeAddr(0)).unwrap().base().has_message("M1"));
        world.run_until(Timestamp::from_secs(1)).unwrap();
        assert!(world.net().router(NodeAddr(0)).unwrap().base().has_message("M1"));
    }
}
