//! Simulated host: name, location and movement state.
//!
//! Routing state lives in the [`dtnroute::Network`]; a [`SimHost`] at index
//! `i` of the world belongs to the node with address `i`.

use dtnroute::{Duration, NodeAddr, Timestamp};
use tracing::trace;

use crate::listener::MovementListener;
use crate::movement::{Coord, MovementModel, Path};

pub struct SimHost {
    addr: NodeAddr,
    name: String,
    location: Coord,
    destination: Option<Coord>,
    speed: f64,
    path: Option<Path>,
    next_time_to_move: Timestamp,
    movement: Box<dyn MovementModel>,
}

impl core::fmt::Debug for SimHost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimHost")
            .field("addr", &self.addr)
            .field("name", &self.name)
            .field("location", &self.location)
            .field("destination", &self.destination)
            .field("movement", &self.movement.name())
            .finish()
    }
}

impl SimHost {
    /// Create a host named `<group><addr>` at the model's initial location.
    pub fn new(addr: NodeAddr, group: &str, mut movement: Box<dyn MovementModel>) -> Self {
        let location = movement.initial_location();
        Self {
            addr,
            name: format!("{}{}", group, addr.0),
            location,
            destination: None,
            speed: 0.0,
            path: None,
            next_time_to_move: Timestamp::MIN,
            movement,
        }
    }

    pub fn addr(&self) -> NodeAddr {
        self.addr
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Coord {
        self.location
    }

    pub fn destination(&self) -> Option<Coord> {
        self.destination
    }

    /// Current speed in metres per second.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn movement(&self) -> &dyn MovementModel {
        self.movement.as_ref()
    }

    /// Inactive hosts have their radio off.
    pub fn is_radio_active(&self, now: Timestamp) -> bool {
        self.movement.is_active(now)
    }

    /// Move towards the current destination for `step` of simulated time.
    ///
    /// Several waypoints may be consumed in one step. When the path runs out
    /// the host waits until its model's next path time.
    pub fn advance(&mut self, step: Duration, now: Timestamp, listeners: &mut [Box<dyn MovementListener>]) {
        if !self.movement.is_active(now) || now < self.next_time_to_move {
            return;
        }
        if self.destination.is_none() && !self.set_next_waypoint(now, listeners) {
            return;
        }
        let Some(mut dest) = self.destination else {
            return;
        };

        let mut possible = step.as_secs_f64() * self.speed;
        let mut distance = self.location.distance(&dest);
        while possible >= distance {
            self.location = dest;
            possible -= distance;
            if !self.set_next_waypoint(now, listeners) {
                return;
            }
            let Some(next) = self.destination else {
                return;
            };
            dest = next;
            distance = self.location.distance(&dest);
        }

        let fraction = possible / distance;
        self.location.translate(
            fraction * (dest.x - self.location.x),
            fraction * (dest.y - self.location.y),
        );
    }

    fn set_next_waypoint(&mut self, now: Timestamp, listeners: &mut [Box<dyn MovementListener>]) -> bool {
        if self.path.is_none() {
            self.path = self.movement.path(now);
        }
        let next = self.path.as_mut().and_then(|path| {
            let speed = path.speed();
            path.next_waypoint().map(|wp| (wp, speed))
        });
        let Some((wp, speed)) = next else {
            self.destination = None;
            self.path = None;
            self.next_time_to_move = self.movement.next_path_available(now);
            return false;
        };

        trace!(host = %self.addr, dest = %wp, speed, "new destination");
        self.destination = Some(wp);
        self.speed = speed;
        for l in listeners.iter_mut() {
            l.new_destination(self.addr, wp, speed);
        }
        true
    }

    /// Back to the model's initial state for a new run.
    pub fn reset(&mut self) {
        self.movement.reset();
        self.location = self.movement.initial_location();
        self.destination = None;
        self.speed = 0.0;
        self.path = None;
        self.next_time_to_move = Timestamp::MIN;
    }
}
