//! Observer traits for message, connection and application events.
//!
//! Observers are notified synchronously on the simulation thread and must
//! not block. All methods have empty defaults so an observer implements only
//! what it records. Tests usually keep a recorder behind `Rc<RefCell<_>>`
//! and register a clone of the handle.

use std::cell::RefCell;
use std::rc::Rc;

use crate::application::AppEvent;
use crate::message::Message;
use crate::types::NodeAddr;

/// Message lifecycle observer.
pub trait MessageListener {
    /// A node created a message.
    fn new_message(&mut self, _msg: &Message) {}

    /// `to` started receiving `msg` from `from`.
    fn transfer_started(&mut self, _msg: &Message, _from: NodeAddr, _to: NodeAddr) {}

    /// A transfer was aborted before completion.
    fn transfer_aborted(&mut self, _msg: &Message, _from: NodeAddr, _to: NodeAddr) {}

    /// A transfer completed. `first_delivery` is set only the first time the
    /// message reaches its final recipient.
    fn transferred(&mut self, _msg: &Message, _from: NodeAddr, _to: NodeAddr, _first_delivery: bool) {}

    /// `node` removed `msg` from its buffer, as a drop or after delivery.
    fn deleted(&mut self, _msg: &Message, _node: NodeAddr, _drop: bool) {}
}

/// Link state observer.
pub trait ConnectionListener {
    fn connected(&mut self, _a: NodeAddr, _b: NodeAddr) {}

    fn disconnected(&mut self, _a: NodeAddr, _b: NodeAddr) {}
}

/// Application event observer.
pub trait ApplicationListener {
    fn got_event(&mut self, event: &AppEvent, host: NodeAddr);
}

impl<T: MessageListener> MessageListener for Rc<RefCell<T>> {
    fn new_message(&mut self, msg: &Message) {
        self.borrow_mut().new_message(msg)
    }

    fn transfer_started(&mut self, msg: &Message, from: NodeAddr, to: NodeAddr) {
        self.borrow_mut().transfer_started(msg, from, to)
    }

    fn transfer_aborted(&mut self, msg: &Message, from: NodeAddr, to: NodeAddr) {
        self.borrow_mut().transfer_aborted(msg, from, to)
    }

    fn transferred(&mut self, msg: &Message, from: NodeAddr, to: NodeAddr, first_delivery: bool) {
        self.borrow_mut().transferred(msg, from, to, first_delivery)
    }

    fn deleted(&mut self, msg: &Message, node: NodeAddr, drop: bool) {
        self.borrow_mut().deleted(msg, node, drop)
    }
}

impl<T: ConnectionListener> ConnectionListener for Rc<RefCell<T>> {
    fn connected(&mut self, a: NodeAddr, b: NodeAddr) {
        self.borrow_mut().connected(a, b)
    }

    fn disconnected(&mut self, a: NodeAddr, b: NodeAddr) {
        self.borrow_mut().disconnected(a, b)
    }
}

impl<T: ApplicationListener> ApplicationListener for Rc<RefCell<T>> {
    fn got_event(&mut self, event: &AppEvent, host: NodeAddr) {
        self.borrow_mut().got_event(event, host)
    }
}

/// Registered observers, fanned out in registration order.
#[derive(Default)]
pub struct Listeners {
    message: Vec<Box<dyn MessageListener>>,
    connection: Vec<Box<dyn ConnectionListener>>,
    application: Vec<Box<dyn ApplicationListener>>,
}

impl core::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Listeners")
            .field("message", &self.message.len())
            .field("connection", &self.connection.len())
            .field("application", &self.application.len())
            .finish()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message_listener(&mut self, listener: impl MessageListener + 'static) {
        self.message.push(Box::new(listener));
    }

    pub fn add_connection_listener(&mut self, listener: impl ConnectionListener + 'static) {
        self.connection.push(Box::new(listener));
    }

    pub fn add_application_listener(&mut self, listener: impl ApplicationListener + 'static) {
        self.application.push(Box::new(listener));
    }

    pub(crate) fn new_message(&mut self, msg: &Message) {
        for l in &mut self.message {
            l.new_message(msg);
        }
    }

    pub(crate) fn transfer_started(&mut self, msg: &Message, from: NodeAddr, to: NodeAddr) {
        for l in &mut self.message {
            l.transfer_started(msg, from, to);
        }
    }

    pub(crate) fn transfer_aborted(&mut self, msg: &Message, from: NodeAddr, to: NodeAddr) {
        for l in &mut self.message {
            l.transfer_aborted(msg, from, to);
        }
    }

    pub(crate) fn transferred(&mut self, msg: &Message, from: NodeAddr, to: NodeAddr, first_delivery: bool) {
        for l in &mut self.message {
            l.transferred(msg, from, to, first_delivery);
        }
    }

    pub(crate) fn deleted(&mut self, msg: &Message, node: NodeAddr, drop: bool) {
        for l in &mut self.message {
            l.deleted(msg, node, drop);
        }
    }

    pub(crate) fn connected(&mut self, a: NodeAddr, b: NodeAddr) {
        for l in &mut self.connection {
            l.connected(a, b);
        }
    }

    pub(crate) fn disconnected(&mut self, a: NodeAddr, b: NodeAddr) {
        for l in &mut self.connection {
            l.disconnected(a, b);
        }
    }

    pub(crate) fn app_event(&mut self, event: &AppEvent, host: NodeAddr) {
        for l in &mut self.application {
            l.got_event(event, host);
        }
    }
}
