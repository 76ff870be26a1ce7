//! Error types.
//!
//! Protocol outcomes (accept, deny, busy) are [`ReceiveCode`](crate::ReceiveCode)
//! values and never errors. [`SimError`] is reserved for broken bookkeeping:
//! the run must stop when one is returned.

use crate::types::{LinkId, MessageId, NodeAddr};

/// Fatal simulation error. The run's state can no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// A message that must be buffered is missing.
    #[error("no message {id} in the buffer of {node}")]
    NoSuchMessage { node: NodeAddr, id: MessageId },
    /// A message that must be in the incoming buffer is missing.
    #[error("no incoming message {id} from {from} at {node}")]
    NoSuchIncoming {
        node: NodeAddr,
        id: MessageId,
        from: NodeAddr,
    },
    /// A node address outside the valid range.
    #[error("no host for address {addr}, valid range is 0..{count}")]
    NoSuchNode { addr: NodeAddr, count: usize },
    /// A link whose two ends are the same node.
    #[error("{0} cannot link to itself")]
    SelfLink(NodeAddr),
    /// A link id that does not resolve.
    #[error("no link {0}")]
    NoSuchLink(LinkId),
    /// A link that must carry a transfer is idle.
    #[error("{0} has no transfer in flight")]
    NoTransfer(LinkId),
    /// A message property was added twice.
    #[error("message {id} already has property {key}")]
    DuplicateProperty { id: MessageId, key: String },
}

/// Setup error, raised before the kernel starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A value that must be strictly positive.
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    /// A value outside its valid range.
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    /// A routing strategy name with no registry entry.
    #[error("unknown routing strategy {0:?}")]
    UnknownRouter(String),
    /// A movement model name with no registry entry.
    #[error("unknown movement model {0:?}")]
    UnknownMovement(String),
}
