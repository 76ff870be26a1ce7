//! Message value type.
//!
//! Messages are replicated on every hop: each router holds its own copy and
//! nothing is shared between nodes. TTL decays implicitly with simulated time
//! measured from the creation timestamp.

use hashbrown::HashMap;

use crate::error::SimError;
use crate::time::{Duration, Timestamp};
use crate::types::{MessageId, NodeAddr, RESPONSE_PREFIX};

/// A message travelling through the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    from: NodeAddr,
    to: NodeAddr,
    size: u64,
    ttl: Option<Duration>,
    created: Timestamp,
    received: Timestamp,
    path: Vec<NodeAddr>,
    response_size: u64,
    request_id: Option<MessageId>,
    app_id: Option<String>,
    properties: HashMap<String, String>,
}

impl Message {
    /// Create a message at its origin. The path starts with `from`.
    pub fn new(from: NodeAddr, to: NodeAddr, id: impl Into<MessageId>, size: u64, now: Timestamp) -> Self {
        Self {
            id: id.into(),
            from,
            to,
            size,
            ttl: None,
            created: now,
            received: now,
            path: vec![from],
            response_size: 0,
            request_id: None,
            app_id: None,
            properties: HashMap::new(),
        }
    }

    /// Build the response to `request`, sent back to its origin.
    pub fn response_to(request: &Message, now: Timestamp) -> Self {
        let mut response = Message::new(
            request.to,
            request.from,
            format!("{}{}", RESPONSE_PREFIX, request.id),
            request.response_size,
            now,
        );
        response.request_id = Some(request.id.clone());
        response
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn from(&self) -> NodeAddr {
        self.from
    }

    pub fn to(&self) -> NodeAddr {
        self.to
    }

    /// Retarget the message. Used by application pipeline stages.
    pub fn set_to(&mut self, to: NodeAddr) {
        self.to = to;
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn created(&self) -> Timestamp {
        self.created
    }

    /// Time the latest hop finished receiving this copy.
    pub fn received(&self) -> Timestamp {
        self.received
    }

    pub fn set_received(&mut self, now: Timestamp) {
        self.received = now;
    }

    /// Initial TTL, `None` if the message never expires.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn set_ttl(&mut self, ttl: Option<Duration>) {
        self.ttl = ttl;
    }

    /// Remaining TTL in milliseconds, negative once expired. `None` if infinite.
    pub fn remaining_ttl(&self, now: Timestamp) -> Option<i64> {
        let ttl = i64::try_from(self.ttl?.as_millis()).unwrap_or(i64::MAX);
        let age = now.as_millis().saturating_sub(self.created.as_millis());
        Some(ttl.saturating_sub(age))
    }

    /// True once the remaining TTL reaches zero.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.remaining_ttl(now).is_some_and(|left| left <= 0)
    }

    /// Nodes this copy has visited, origin first.
    pub fn path(&self) -> &[NodeAddr] {
        &self.path
    }

    pub fn hop_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn add_node_on_path(&mut self, node: NodeAddr) {
        self.path.push(node);
    }

    /// Size of the requested response, zero for none.
    pub fn response_size(&self) -> u64 {
        self.response_size
    }

    pub fn set_response_size(&mut self, size: u64) {
        self.response_size = size;
    }

    /// Id of the request this message answers.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn is_response(&self) -> bool {
        self.request_id.is_some()
    }

    /// Application type tag used to select pipeline stages.
    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    pub fn set_app_id(&mut self, app_id: Option<String>) {
        self.app_id = app_id;
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Add a new property. Adding an existing key is a bookkeeping error.
    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), SimError> {
        let key = key.into();
        if self.properties.contains_key(&key) {
            return Err(SimError::DuplicateProperty {
                id: self.id.clone(),
                key,
            });
        }
        self.properties.insert(key, value.into());
        Ok(())
    }

    /// Set a property, replacing any previous value.
    pub fn update_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Deep copy for the next hop.
    pub fn replicate(&self) -> Self {
        self.clone()
    }
}
