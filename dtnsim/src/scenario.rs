//! Scenario builder for setting up and running simulations.
//!
//! A scenario is a list of host groups plus kernel settings. Names of routing
//! strategies and movement models are resolved once in [`ScenarioBuilder::build`];
//! every run gets a fresh [`World`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use dtnroute::{
    strategy_by_name, AcceptPolicy, ActiveRouter, Application, ConfigError, Duration, EnergyConfig,
    EnergyModel, InterfaceConfig, Network, NodeAddr, RouterConfig, SimError, Timestamp,
};
use tracing::info;

use crate::event::{EventQueue, ExternalEvent};
use crate::generator::{GeneratorConfig, MessageGenerator};
use crate::metrics::{MessageStats, SimulationResult};
use crate::movement::{movement_by_name, MovementModel, WorldSize};
use crate::node::SimHost;
use crate::sim::{CancelHandle, World};

/// Failure of a scenario run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("simulation: {0}")]
    Sim(#[from] SimError),
}

/// Where a group's hosts get their motion from.
#[derive(Clone)]
enum MovementSource {
    Named(String),
    Model(Rc<dyn MovementModel>),
}

impl fmt::Debug for MovementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementSource::Named(name) => write!(f, "{name:?}"),
            MovementSource::Model(model) => write!(f, "{}", model.name()),
        }
    }
}

/// Hosts sharing one configuration. Host names are `<id><address>`.
#[derive(Clone)]
pub struct HostGroup {
    id: String,
    count: usize,
    router: String,
    movement: MovementSource,
    router_config: RouterConfig,
    interface: InterfaceConfig,
    energy: Option<EnergyConfig>,
    policy: Option<Rc<dyn AcceptPolicy>>,
    applications: Vec<Rc<dyn Application>>,
}

impl fmt::Debug for HostGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostGroup")
            .field("id", &self.id)
            .field("count", &self.count)
            .field("router", &self.router)
            .field("movement", &self.movement)
            .field("interface", &self.interface)
            .field("applications", &self.applications.len())
            .finish()
    }
}

impl HostGroup {
    /// `count` stationary `Epidemic` hosts with default settings.
    pub fn new(id: impl Into<String>, count: usize) -> Self {
        Self {
            id: id.into(),
            count,
            router: "Epidemic".into(),
            movement: MovementSource::Named("Stationary".into()),
            router_config: RouterConfig::default(),
            interface: InterfaceConfig::default(),
            energy: None,
            policy: None,
            applications: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Routing strategy by registry name.
    pub fn with_router(mut self, name: impl Into<String>) -> Self {
        self.router = name.into();
        self
    }

    /// Movement model by registry name.
    pub fn with_movement(mut self, name: impl Into<String>) -> Self {
        self.movement = MovementSource::Named(name.into());
        self
    }

    /// Prototype movement model, replicated once per host.
    pub fn with_movement_model(mut self, model: impl MovementModel + 'static) -> Self {
        self.movement = MovementSource::Model(Rc::new(model));
        self
    }

    pub fn with_router_config(mut self, config: RouterConfig) -> Self {
        self.router_config = config;
        self
    }

    pub fn with_interface(mut self, interface: InterfaceConfig) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_energy(mut self, energy: EnergyConfig) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn with_policy(mut self, policy: impl AcceptPolicy + 'static) -> Self {
        self.policy = Some(Rc::new(policy));
        self
    }

    /// Attach an application; each host gets its own replica.
    pub fn with_application(mut self, app: impl Application + 'static) -> Self {
        self.applications.push(Rc::new(app));
        self
    }

    fn prototype(&self) -> Result<ActiveRouter, ConfigError> {
        self.router_config.validate()?;
        let mut proto = ActiveRouter::new(NodeAddr(0), self.router_config.clone());
        if let Some(policy) = &self.policy {
            proto = proto.with_policy(Rc::clone(policy));
        }
        if let Some(energy) = &self.energy {
            energy.validate()?;
            proto = proto.with_energy(EnergyModel::new(*energy));
        }
        for app in &self.applications {
            proto.base_mut().add_application(app.replicate());
        }
        Ok(proto)
    }
}

/// Builder for simulation scenarios.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    name: String,
    groups: Vec<HostGroup>,
    update_interval: Duration,
    end_time: Timestamp,
    warmup: Duration,
    randomize_updates: bool,
    simulate_connections: bool,
    simulate_connections_once: bool,
    world_size: WorldSize,
    seed: u64,
    events: Vec<(Timestamp, ExternalEvent)>,
    generators: Vec<GeneratorConfig>,
    updates: Vec<Timestamp>,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new("default")
    }
}

impl ScenarioBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            update_interval: Duration::from_secs(1),
            end_time: Timestamp::from_secs(60),
            warmup: Duration::ZERO,
            randomize_updates: true,
            simulate_connections: false,
            simulate_connections_once: false,
            world_size: WorldSize::default(),
            seed: 0,
            events: Vec::new(),
            generators: Vec::new(),
            updates: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Total number of hosts over all groups.
    pub fn host_count(&self) -> usize {
        self.groups.iter().map(HostGroup::count).sum()
    }

    /// Add a group; its hosts take the next free addresses.
    pub fn group(mut self, group: HostGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn with_end_time(mut self, end: Timestamp) -> Self {
        self.end_time = end;
        self
    }

    /// Move hosts for this long before `t = 0`.
    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_randomized_updates(mut self, enabled: bool) -> Self {
        self.randomize_updates = enabled;
        self
    }

    /// Open and close links by radio range.
    pub fn with_connectivity(mut self, enabled: bool) -> Self {
        self.simulate_connections = enabled;
        self
    }

    pub fn with_connectivity_once(mut self, once: bool) -> Self {
        self.simulate_connections_once = once;
        self
    }

    pub fn with_world_size(mut self, size: WorldSize) -> Self {
        self.world_size = size;
        self
    }

    /// Set the RNG seed for deterministic simulation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Add a scripted event.
    pub fn event(mut self, time: Timestamp, event: ExternalEvent) -> Self {
        self.events.push((time, event));
        self
    }

    pub fn connect_at(self, time: Timestamp, a: u32, b: u32) -> Self {
        self.event(
            time,
            ExternalEvent::ConnectionUp {
                from: NodeAddr(a),
                to: NodeAddr(b),
            },
        )
    }

    pub fn disconnect_at(self, time: Timestamp, a: u32, b: u32) -> Self {
        self.event(
            time,
            ExternalEvent::ConnectionDown {
                from: NodeAddr(a),
                to: NodeAddr(b),
            },
        )
    }

    pub fn message_at(self, time: Timestamp, from: u32, to: u32, id: &str, size: u64) -> Self {
        self.event(time, ExternalEvent::create_message(NodeAddr(from), NodeAddr(to), id, size))
    }

    /// Add a message generator. Its seed is offset by the scenario seed.
    pub fn generator(mut self, config: GeneratorConfig) -> Self {
        self.generators.push(config);
        self
    }

    /// Request an extra update pass at `time`.
    pub fn update_at(mut self, time: Timestamp) -> Self {
        self.updates.push(time);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval == Duration::ZERO {
            return Err(ConfigError::NotPositive("update_interval"));
        }
        self.world_size.validate()?;
        let hosts = self.host_count();
        if hosts == 0 {
            return Err(ConfigError::Invalid {
                name: "groups",
                reason: "scenario has no hosts".into(),
            });
        }
        if hosts > NodeAddr::LIMIT {
            return Err(ConfigError::Invalid {
                name: "groups",
                reason: format!("{hosts} hosts exceed the address space of {}", NodeAddr::LIMIT),
            });
        }
        for group in &self.groups {
            group.interface.validate()?;
        }
        for gen in &self.generators {
            gen.validate()?;
            let to = gen.to_hosts.as_ref().unwrap_or(&gen.hosts);
            if gen.hosts.end as usize > hosts || to.end as usize > hosts {
                return Err(ConfigError::Invalid {
                    name: "generator hosts",
                    reason: format!("address range exceeds {hosts} hosts"),
                });
            }
        }
        Ok(())
    }

    /// Resolve all names and assemble a ready-to-run world.
    pub fn build(&self) -> Result<World, ConfigError> {
        self.validate()?;

        let mut net = Network::new();
        let mut hosts = Vec::with_capacity(self.host_count());
        for group in &self.groups {
            let proto = group.prototype()?;
            let strategy = strategy_by_name(&group.router)?;
            let movement: Rc<dyn MovementModel> = match &group.movement {
                MovementSource::Named(name) => Rc::from(movement_by_name(name, self.world_size, self.seed)?),
                MovementSource::Model(model) => Rc::clone(model),
            };
            for _ in 0..group.count {
                let addr = net.add_node(&proto, strategy.replicate(), group.interface);
                let seed = self.seed.wrapping_add(addr.0 as u64 + 1);
                hosts.push(SimHost::new(addr, &group.id, movement.replicate(seed)));
            }
        }

        let mut world = World::new(net, hosts, self.update_interval)?
            .with_randomized_updates(self.randomize_updates)
            .with_connectivity(self.simulate_connections)
            .with_connectivity_once(self.simulate_connections_once);

        if !self.events.is_empty() {
            let queue: EventQueue = self.events.iter().cloned().collect();
            world.add_event_source(Box::new(queue));
        }
        for gen in &self.generators {
            let mut config = gen.clone();
            config.seed = config.seed.wrapping_add(self.seed);
            world.add_event_source(Box::new(MessageGenerator::new(config)?));
        }
        for &time in &self.updates {
            world.schedule_update(time);
        }
        Ok(world)
    }

    /// Build, warm up and run to the end time, collecting message statistics.
    pub fn run(&self) -> Result<SimulationResult, RunError> {
        self.run_with_cancel(&CancelHandle::new())
    }

    /// Like [`run`](Self::run), stopping early once `cancel` is set.
    pub fn run_with_cancel(&self, cancel: &CancelHandle) -> Result<SimulationResult, RunError> {
        let mut world = self.build()?;
        world.set_cancel_handle(cancel.clone());
        let stats = Rc::new(RefCell::new(MessageStats::new()));
        let listeners = world.net_mut().listeners_mut();
        listeners.add_message_listener(Rc::clone(&stats));
        listeners.add_connection_listener(Rc::clone(&stats));

        world.warmup_movement(self.warmup);
        let end_time = world.run_until(self.end_time)?;
        let stats = stats.borrow().clone();
        Ok(SimulationResult {
            run: 0,
            end_time,
            ticks: world.ticks(),
            cancelled: world.is_cancelled(),
            stats,
        })
    }

    /// Run every index of `runs`, each with its own world and the seed
    /// offset by the run index.
    pub fn run_batch(&self, runs: RunRange) -> Result<Vec<SimulationResult>, RunError> {
        let mut results = Vec::with_capacity(runs.len());
        for run in runs.indices() {
            info!(scenario = %self.name, run, "batch run");
            let mut result = self.clone().with_seed(self.seed.wrapping_add(run as u64)).run()?;
            result.run = run;
            results.push(result);
        }
        Ok(results)
    }
}

/// Run indices of a batch: `"N"` is runs `0..N`, `"S:E"` is runs `S-1..E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRange {
    pub start: u32,
    pub end: u32,
}

impl RunRange {
    pub fn count(n: u32) -> Self {
        Self { start: 0, end: n }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn indices(&self) -> std::ops::Range<u32> {
        self.start..self.end
    }
}

impl FromStr for RunRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::Invalid {
            name: "runs",
            reason: format!("{s:?}: {reason}"),
        };
        let number = |part: &str| part.trim().parse::<u32>().map_err(|_| invalid("not a number"));

        let range = match s.split_once(':') {
            None => Self::count(number(s)?),
            Some((start, end)) => {
                let start = number(start)?;
                if start == 0 {
                    return Err(invalid("run indices start at 1"));
                }
                Self {
                    start: start - 1,
                    end: number(end)?,
                }
            }
        };
        if range.is_empty() {
            return Err(invalid("no runs"));
        }
        Ok(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::{Coord, Stationary};
    use dtnroute::AddressPolicy;

    fn two_hosts() -> ScenarioBuilder {
        ScenarioBuilder::new("pair")
            .group(HostGroup::new("p", 2).with_movement_model(Stationary::at(Coord::default())))
            .with_end_time(Timestamp::from_secs(5))
    }

    #[test]
    fn test_build_names_and_addresses() {
        let world = ScenarioBuilder::new("groups")
            .group(HostGroup::new("a", 2))
            .group(HostGroup::new("b", 3).with_router("DirectDelivery"))
            .build()
            .unwrap();

        let names: Vec<_> = world.hosts().iter().map(|h| h.name().to_owned()).collect();
        assert_eq!(names, ["a0", "a1", "b2", "b3", "b4"]);
        assert_eq!(world.net().len(), 5);
        assert_eq!(
            world.net().node(NodeAddr(3)).unwrap().strategy_name(),
            Some("DirectDelivery")
        );
    }

    #[test]
    fn test_build_rejects_bad_config() {
        assert_eq!(
            ScenarioBuilder::new("empty").build().err().map(|e| e.to_string()),
            Some("invalid value for groups: scenario has no hosts".into())
        );
        assert_eq!(
            two_hosts().with_update_interval(Duration::ZERO).build().err(),
            Some(ConfigError::NotPositive("update_interval"))
        );
        assert_eq!(
            ScenarioBuilder::new("bad")
                .group(HostGroup::new("x", 1).with_router("Spray"))
                .build()
                .err(),
            Some(ConfigError::UnknownRouter("Spray".into()))
        );
        assert_eq!(
            ScenarioBuilder::new("bad")
                .group(HostGroup::new("x", 1).with_movement("Bus"))
                .build()
                .err(),
            Some(ConfigError::UnknownMovement("Bus".into()))
        );
        assert!(two_hosts().generator(GeneratorConfig::new(0..5)).build().is_err());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_build_rejects_unaddressable_hosts() {
        let err = ScenarioBuilder::new("huge")
            .group(HostGroup::new("x", NodeAddr::LIMIT).with_router("Spray"))
            .group(HostGroup::new("y", 1))
            .build()
            .err();
        assert!(matches!(err, Some(ConfigError::Invalid { name: "groups", .. })));
    }

    #[test]
    fn test_run_collects_stats() {
        let result = two_hosts()
            .connect_at(Timestamp::from_millis(100), 0, 1)
            .message_at(Timestamp::from_millis(200), 0, 1, "M1", 1_000)
            .run()
            .unwrap();

        assert_eq!(result.end_time, Timestamp::from_secs(5));
        assert_eq!(result.ticks, 5);
        assert!(!result.cancelled);
        assert_eq!(result.stats.created, 1);
        assert_eq!(result.stats.delivered, 1);
        assert_eq!(result.stats.contacts, 1);
        assert_eq!(result.delivery_probability(), 1.0);
    }

    #[test]
    fn test_policy_blocks_relay() {
        let result = ScenarioBuilder::new("policy")
            .group(
                HostGroup::new("p", 2)
                    .with_movement_model(Stationary::at(Coord::default()))
                    .with_policy(AddressPolicy::new().with_receive_from([NodeAddr(1)])),
            )
            .connect_at(Timestamp::from_millis(100), 0, 1)
            .message_at(Timestamp::from_millis(200), 0, 1, "M1", 1_000)
            .with_end_time(Timestamp::from_secs(3))
            .run()
            .unwrap();
        assert_eq!(result.stats.delivered, 0);
    }

    #[test]
    fn test_cancelled_run() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let result = two_hosts().run_with_cancel(&cancel).unwrap();
        assert!(result.cancelled);
        assert_eq!(result.ticks, 0);
        assert_eq!(result.end_time, Timestamp::ZERO);
    }

    #[test]
    fn test_run_range_parse() {
        assert_eq!("3".parse::<RunRange>(), Ok(RunRange { start: 0, end: 3 }));
        assert_eq!("2:4".parse::<RunRange>(), Ok(RunRange { start: 1, end: 4 }));
        assert_eq!("2:4".parse::<RunRange>().unwrap().len(), 3);
        assert!("0".parse::<RunRange>().is_err());
        assert!("0:3".parse::<RunRange>().is_err());
        assert!("4:2".parse::<RunRange>().is_err());
        assert!("x".parse::<RunRange>().is_err());
    }

    #[test]
    fn test_batch_runs_are_seeded_per_run() {
        let scenario = ScenarioBuilder::new("batch")
            .group(HostGroup::new("p", 4).with_movement_model(Stationary::at(Coord::default())))
            .with_connectivity(true)
            .generator(
                GeneratorConfig::new(0..4)
                    .with_size(100, 200)
                    .with_interval(Duration::from_secs(1), Duration::from_secs(3)),
            )
            .with_end_time(Timestamp::from_secs(20));

        let results = scenario.run_batch("2:3".parse().unwrap()).unwrap();
        assert_eq!(results.iter().map(|r| r.run).collect::<Vec<_>>(), [1, 2]);

        let again = scenario.clone().with_seed(1).run().unwrap();
        assert_eq!(again.stats, results[0].stats);
    }
}
