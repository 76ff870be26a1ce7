//! dtnsim - Discrete event simulator for opportunistic (delay-tolerant) networks.
//!
//! This crate drives the routers of [`dtnroute`] through simulated time: a
//! fixed-interval clock, external event sources, host mobility and
//! range-based connectivity.
//!
//! # Features
//!
//! - **Fixed-step kernel**: events are applied in time order inside each
//!   update interval, each followed by a full update pass
//! - **Deterministic**: host update order is a permutation seeded by the clock
//! - **Event sources**: scripted events, seeded message generators and
//!   scheduled update passes
//! - **Mobility**: waypoint paths from pluggable movement models
//! - **Scenario builder**: host groups, batch runs, message statistics
//!
//! # Example
//!
//! ```
//! use dtnsim::{HostGroup, ScenarioBuilder, Timestamp};
//!
//! let result = ScenarioBuilder::new("pair")
//!     .group(HostGroup::new("n", 2))
//!     .connect_at(Timestamp::from_millis(100), 0, 1)
//!     .message_at(Timestamp::from_millis(200), 0, 1, "M1", 1_000)
//!     .with_end_time(Timestamp::from_secs(5))
//!     .run()
//!     .unwrap();
//!
//! assert_eq!(result.stats.delivered, 1);
//! ```
//!
//! # Architecture
//!
//! Every tick of [`World::advance_one_tick`]:
//! 1. Pick the source with the earliest next event (ties go to the
//!    scheduled-update source, then registration order)
//! 2. While that event is due by the end of the interval, apply it and run
//!    an update pass over all hosts
//! 3. Move hosts by one interval
//! 4. Set the clock to the end of the interval, run a final update pass and
//!    notify tick observers

pub mod event;
pub mod generator;
pub mod listener;
pub mod metrics;
pub mod movement;
pub mod node;
pub mod scenario;
pub mod sim;

// Re-export main types
pub use dtnroute::{Duration, NodeAddr, Timestamp};
pub use event::{EventQueue, EventSource, ExternalEvent, ScheduledUpdates};
pub use generator::{GeneratorConfig, MessageGenerator};
pub use listener::{MovementListener, UpdateListener};
pub use metrics::{MessageStats, SimulationResult};
pub use movement::{movement_by_name, Coord, MovementModel, Path, Scripted, Stationary, WorldSize};
pub use node::SimHost;
pub use scenario::{HostGroup, RunError, RunRange, ScenarioBuilder};
pub use sim::{CancelHandle, DueSource, World};
