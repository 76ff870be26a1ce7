//! Movement models and the geometry they produce.
//!
//! The kernel only consumes the [`MovementModel`] contract: an initial
//! location, paths when they are available, the time the next path will be
//! available, and whether the host is active at all.

use std::collections::VecDeque;
use std::fmt;

use dtnroute::{ConfigError, Timestamp};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Point in the simulated area, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Coord) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2},{:.2})", self.x, self.y)
    }
}

/// Waypoints travelled at a constant speed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    waypoints: VecDeque<Coord>,
    /// Metres per second.
    speed: f64,
}

impl Path {
    pub fn new(speed: f64) -> Self {
        Self {
            waypoints: VecDeque::new(),
            speed,
        }
    }

    pub fn with_waypoint(mut self, wp: Coord) -> Self {
        self.add_waypoint(wp);
        self
    }

    pub fn add_waypoint(&mut self, wp: Coord) {
        self.waypoints.push_back(wp);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn has_next(&self) -> bool {
        !self.waypoints.is_empty()
    }

    pub fn next_waypoint(&mut self) -> Option<Coord> {
        self.waypoints.pop_front()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Source of motion for one host.
pub trait MovementModel {
    /// Registry name.
    fn name(&self) -> &'static str;

    fn initial_location(&mut self) -> Coord;

    /// The next path, or `None` if nothing is available at `now`.
    fn path(&mut self, now: Timestamp) -> Option<Path>;

    /// When the next path will be available.
    fn next_path_available(&self, now: Timestamp) -> Timestamp;

    /// Inactive hosts keep their radio off.
    fn is_active(&self, _now: Timestamp) -> bool {
        true
    }

    /// Fresh copy for another host, with its own random stream.
    fn replicate(&self, seed: u64) -> Box<dyn MovementModel>;

    /// Rewind for a new run.
    fn reset(&mut self) {}
}

/// Size of the simulated area, in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldSize {
    pub width: f64,
    pub height: f64,
}

impl Default for WorldSize {
    fn default() -> Self {
        Self {
            width: 4500.0,
            height: 3400.0,
        }
    }
}

impl WorldSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(ConfigError::NotPositive("world width"));
        }
        if !self.height.is_finite() || self.height <= 0.0 {
            return Err(ConfigError::NotPositive("world height"));
        }
        Ok(())
    }
}

/// A host that never moves.
///
/// Without a fixed location it picks a uniform random spot in the world.
#[derive(Debug, Clone)]
pub struct Stationary {
    location: Option<Coord>,
    world: WorldSize,
    rng: ChaCha8Rng,
}

impl Stationary {
    pub fn new(world: WorldSize, seed: u64) -> Self {
        Self {
            location: None,
            world,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn at(location: Coord) -> Self {
        Self {
            location: Some(location),
            world: WorldSize::default(),
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    fn location(&mut self) -> Coord {
        if let Some(loc) = self.location {
            return loc;
        }
        let loc = Coord::new(
            self.rng.gen_range(0.0..self.world.width),
            self.rng.gen_range(0.0..self.world.height),
        );
        self.location = Some(loc);
        loc
    }
}

impl MovementModel for Stationary {
    fn name(&self) -> &'static str {
        "Stationary"
    }

    fn initial_location(&mut self) -> Coord {
        self.location()
    }

    fn path(&mut self, _now: Timestamp) -> Option<Path> {
        Some(Path::new(0.0).with_waypoint(self.location()))
    }

    fn next_path_available(&self, _now: Timestamp) -> Timestamp {
        Timestamp::MAX
    }

    fn replicate(&self, seed: u64) -> Box<dyn MovementModel> {
        let mut copy = Stationary::new(self.world, seed);
        copy.location = self.location;
        Box::new(copy)
    }
}

/// Plays back a fixed list of timed paths.
///
/// A host may also be switched off for a window, e.g. to model a node that
/// leaves the area.
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    start: Coord,
    legs: Vec<(Timestamp, Path)>,
    next: usize,
    inactive: Option<(Timestamp, Timestamp)>,
}

impl Scripted {
    pub fn new(start: Coord) -> Self {
        Self {
            start,
            ..Self::default()
        }
    }

    /// Make `path` available from `at` on. Legs must be added in time order.
    pub fn with_leg(mut self, at: Timestamp, path: Path) -> Self {
        self.legs.push((at, path));
        self
    }

    pub fn with_inactive(mut self, from: Timestamp, until: Timestamp) -> Self {
        self.inactive = Some((from, until));
        self
    }
}

impl MovementModel for Scripted {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    fn initial_location(&mut self) -> Coord {
        self.start
    }

    fn path(&mut self, now: Timestamp) -> Option<Path> {
        let (at, path) = self.legs.get(self.next)?;
        if *at > now {
            return None;
        }
        self.next += 1;
        Some(path.clone())
    }

    fn next_path_available(&self, _now: Timestamp) -> Timestamp {
        self.legs.get(self.next).map_or(Timestamp::MAX, |(at, _)| *at)
    }

    fn is_active(&self, now: Timestamp) -> bool {
        !self
            .inactive
            .is_some_and(|(from, until)| from <= now && now < until)
    }

    fn replicate(&self, _seed: u64) -> Box<dyn MovementModel> {
        let mut copy = self.clone();
        copy.next = 0;
        Box::new(copy)
    }

    fn reset(&mut self) {
        self.next = 0;
    }
}

/// Names accepted by [`movement_by_name`].
pub const MOVEMENT_MODELS: &[&str] = &["Stationary"];

/// Resolve a movement model name once at configuration time.
pub fn movement_by_name(name: &str, world: WorldSize, seed: u64) -> Result<Box<dyn MovementModel>, ConfigError> {
    match name {
        "Stationary" => Ok(Box::new(Stationary::new(world, seed))),
        other => Err(ConfigError::UnknownMovement(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_distance() {
        let a = Coord::new(0.0, 0.0);
        let mut b = Coord::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
        b.translate(-3.0, -4.0);
        assert_eq!(b, a);
    }

    #[test]
    fn test_stationary_stays_put() {
        let world = WorldSize::new(100.0, 50.0);
        let mut model = Stationary::new(world, 3);
        let loc = model.initial_location();
        assert!((0.0..100.0).contains(&loc.x));
        assert!((0.0..50.0).contains(&loc.y));

        let mut path = model.path(Timestamp::from_secs(10)).unwrap();
        assert_eq!(path.speed(), 0.0);
        assert_eq!(path.next_waypoint(), Some(loc));
        assert!(!path.has_next());
        assert_eq!(model.next_path_available(Timestamp::ZERO), Timestamp::MAX);
    }

    #[test]
    fn test_stationary_replicas_differ() {
        let world = WorldSize::default();
        let proto = Stationary::new(world, 0);
        let mut a = proto.replicate(1);
        let mut b = proto.replicate(2);
        assert_ne!(a.initial_location(), b.initial_location());

        let mut again = proto.replicate(1);
        assert_eq!(again.initial_location(), a.initial_location());
    }

    #[test]
    fn test_scripted_legs() {
        let leg = Path::new(1.0).with_waypoint(Coord::new(10.0, 0.0));
        let mut model = Scripted::new(Coord::default())
            .with_leg(Timestamp::from_secs(5), leg.clone())
            .with_inactive(Timestamp::from_secs(20), Timestamp::from_secs(30));

        assert_eq!(model.path(Timestamp::from_secs(1)), None);
        assert_eq!(model.next_path_available(Timestamp::ZERO), Timestamp::from_secs(5));
        assert_eq!(model.path(Timestamp::from_secs(5)), Some(leg));
        assert_eq!(model.next_path_available(Timestamp::ZERO), Timestamp::MAX);

        assert!(model.is_active(Timestamp::from_secs(19)));
        assert!(!model.is_active(Timestamp::from_secs(20)));
        assert!(model.is_active(Timestamp::from_secs(30)));

        model.reset();
        assert_eq!(model.next_path_available(Timestamp::ZERO), Timestamp::from_secs(5));
    }

    #[test]
    fn test_registry() {
        let world = WorldSize::default();
        for name in MOVEMENT_MODELS {
            assert_eq!(movement_by_name(name, world, 0).unwrap().name(), *name);
        }
        assert_eq!(
            movement_by_name("RandomWaypoint", world, 0).err(),
            Some(ConfigError::UnknownMovement("RandomWaypoint".into()))
        );
    }
}
