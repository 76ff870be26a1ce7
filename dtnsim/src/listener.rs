//! Kernel-level observers: per-tick and movement.

use std::cell::RefCell;
use std::rc::Rc;

use dtnroute::{Network, NodeAddr, Timestamp};

use crate::movement::Coord;
use crate::node::SimHost;

/// Called once at the end of every tick, after the final update pass.
pub trait UpdateListener {
    fn updated(&mut self, now: Timestamp, net: &Network, hosts: &[SimHost]);
}

/// Host placement and destination changes.
pub trait MovementListener {
    /// Called once per host when the listener is registered.
    fn initial_location(&mut self, _host: NodeAddr, _location: Coord) {}

    fn new_destination(&mut self, _host: NodeAddr, _dest: Coord, _speed: f64) {}
}

impl<T: UpdateListener> UpdateListener for Rc<RefCell<T>> {
    fn updated(&mut self, now: Timestamp, net: &Network, hosts: &[SimHost]) {
        self.borrow_mut().updated(now, net, hosts)
    }
}

impl<T: MovementListener> MovementListener for Rc<RefCell<T>> {
    fn initial_location(&mut self, host: NodeAddr, location: Coord) {
        self.borrow_mut().initial_location(host, location)
    }

    fn new_destination(&mut self, host: NodeAddr, dest: Coord, speed: f64) {
        self.borrow_mut().new_destination(host, dest, speed)
    }
}
