//! Application pipeline attached to routers.
//!
//! Applications register under a type tag (or the wildcard `None`). When a
//! message finishes arriving, the stages for its tag run first, then the
//! wildcard stages, each in registration order. A stage may replace the
//! message (for instance retarget it) or drop it by returning `None`.

use crate::message::Message;
use crate::time::Timestamp;
use crate::types::NodeAddr;

/// Event reported by an application to application observers.
#[derive(Debug, Clone, PartialEq)]
pub struct AppEvent {
    pub app_id: Option<String>,
    pub name: String,
    pub detail: Option<String>,
}

/// What an application may do to its host while it runs.
#[derive(Debug)]
pub struct AppHost {
    addr: NodeAddr,
    now: Timestamp,
    created: Vec<Message>,
    events: Vec<AppEvent>,
}

impl AppHost {
    pub fn new(addr: NodeAddr, now: Timestamp) -> Self {
        Self {
            addr,
            now,
            created: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn addr(&self) -> NodeAddr {
        self.addr
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Queue a message for creation on the host once the stage returns.
    pub fn create_message(&mut self, msg: Message) {
        self.created.push(msg);
    }

    /// Report an event to application observers.
    pub fn emit(&mut self, app_id: Option<&str>, name: impl Into<String>, detail: Option<String>) {
        self.events.push(AppEvent {
            app_id: app_id.map(str::to_owned),
            name: name.into(),
            detail,
        });
    }

    pub fn into_parts(self) -> (Vec<Message>, Vec<AppEvent>) {
        (self.created, self.events)
    }
}

/// A pipeline stage and per-tick agent running on a host.
pub trait Application {
    /// Type tag of messages this application handles, `None` for all.
    fn app_id(&self) -> Option<&str>;

    /// Handle an arriving message. Returning `None` drops it.
    fn handle(&mut self, msg: Message, host: &mut AppHost) -> Option<Message>;

    /// Called at the start of every router update.
    fn update(&mut self, _host: &mut AppHost) {}

    /// Fresh copy for another host.
    fn replicate(&self) -> Box<dyn Application>;
}

/// Applications grouped by tag in first-registration order.
#[derive(Default)]
pub(crate) struct Applications {
    groups: Vec<(Option<String>, Vec<Box<dyn Application>>)>,
}

impl Applications {
    pub(crate) fn add(&mut self, app: Box<dyn Application>) {
        let tag = app.app_id().map(str::to_owned);
        match self.groups.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, apps)) => apps.push(app),
            None => self.groups.push((tag, vec![app])),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.iter().map(|(_, apps)| apps.len()).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Run the pipeline for `msg`. Stops at the first stage that drops it.
    pub(crate) fn run_pipeline(&mut self, msg: Message, host: &mut AppHost) -> Option<Message> {
        let tag = msg.app_id().map(str::to_owned);
        let mut current = msg;
        for group in self.stages_for(tag.as_deref()) {
            for app in self.groups[group].1.iter_mut() {
                current = app.handle(current, host)?;
            }
        }
        Some(current)
    }

    /// Per-tick update of every application.
    pub(crate) fn update(&mut self, host: &mut AppHost) {
        for (_, apps) in &mut self.groups {
            for app in apps {
                app.update(host);
            }
        }
    }

    pub(crate) fn replicate(&self) -> Self {
        let mut copy = Applications::default();
        for (_, apps) in &self.groups {
            for app in apps {
                copy.add(app.replicate());
            }
        }
        copy
    }

    /// Group indices for a tag: exact match first, then wildcard.
    fn stages_for(&self, tag: Option<&str>) -> Vec<usize> {
        let mut stages = Vec::with_capacity(2);
        if let Some(i) = self.groups.iter().position(|(t, _)| t.as_deref() == tag) {
            stages.push(i);
        }
        if tag.is_some() {
            if let Some(i) = self.groups.iter().position(|(t, _)| t.is_none()) {
                stages.push(i);
            }
        }
        stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Appends its name to a property so stage order is visible.
    struct Stamp {
        tag: Option<String>,
        name: &'static str,
        drop: bool,
    }

    impl Application for Stamp {
        fn app_id(&self) -> Option<&str> {
            self.tag.as_deref()
        }

        fn handle(&mut self, mut msg: Message, host: &mut AppHost) -> Option<Message> {
            let trail = format!("{}{}", msg.property("trail").unwrap_or(""), self.name);
            msg.update_property("trail", trail);
            host.emit(self.app_id(), "handled", Some(self.name.to_owned()));
            if self.drop {
                None
            } else {
                Some(msg)
            }
        }

        fn replicate(&self) -> Box<dyn Application> {
            Box::new(Stamp {
                tag: self.tag.clone(),
                name: self.name,
                drop: self.drop,
            })
        }
    }

    fn stamp(tag: Option<&str>, name: &'static str, drop: bool) -> Box<dyn Application> {
        Box::new(Stamp {
            tag: tag.map(str::to_owned),
            name,
            drop,
        })
    }

    fn tagged(tag: Option<&str>) -> Message {
        let mut m = Message::new(NodeAddr(0), NodeAddr(1), "M", 10, Timestamp::ZERO);
        m.set_app_id(tag.map(str::to_owned));
        m
    }

    #[test]
    fn test_pipeline_runs_tag_then_wildcard() {
        let mut apps = Applications::default();
        apps.add(stamp(None, "w", false));
        apps.add(stamp(Some("ping"), "a", false));
        apps.add(stamp(Some("pong"), "x", false));
        apps.add(stamp(Some("ping"), "b", false));
        assert_eq!(apps.len(), 4);

        let mut host = AppHost::new(NodeAddr(1), Timestamp::ZERO);
        let out = apps.run_pipeline(tagged(Some("ping")), &mut host).unwrap();
        assert_eq!(out.property("trail"), Some("abw"));

        let (_, events) = host.into_parts();
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_untagged_message_only_sees_wildcard() {
        let mut apps = Applications::default();
        apps.add(stamp(Some("ping"), "a", false));
        apps.add(stamp(None, "w", false));

        let mut host = AppHost::new(NodeAddr(1), Timestamp::ZERO);
        let out = apps.run_pipeline(tagged(None), &mut host).unwrap();
        assert_eq!(out.property("trail"), Some("w"));
    }

    #[test]
    fn test_drop_halts_pipeline() {
        let mut apps = Applications::default();
        apps.add(stamp(Some("ping"), "a", true));
        apps.add(stamp(None, "w", false));

        let mut host = AppHost::new(NodeAddr(1), Timestamp::ZERO);
        assert!(apps.run_pipeline(tagged(Some("ping")), &mut host).is_none());
        let (_, events) = host.into_parts();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_replicate_keeps_order() {
        let mut apps = Applications::default();
        apps.add(stamp(Some("ping"), "a", false));
        apps.add(stamp(Some("ping"), "b", false));
        let mut copy = apps.replicate();

        let mut host = AppHost::new(NodeAddr(1), Timestamp::ZERO);
        let out = copy.run_pipeline(tagged(Some("ping")), &mut host).unwrap();
        assert_eq!(out.property("trail"), Some("ab"));
    }
}
