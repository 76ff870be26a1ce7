//! Core identifier types and receive outcome codes.

use core::fmt;

/// Network address of a node. Addresses are dense indices `0..n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeAddr(pub u32);

impl NodeAddr {
    /// Largest number of nodes a network can address.
    pub const LIMIT: usize = u32::MAX as usize + 1;

    /// Index into per-node tables.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Address of table slot `index`. Callers keep `index` below [`Self::LIMIT`].
    #[inline]
    pub(crate) const fn from_index(index: usize) -> Self {
        NodeAddr(index as u32)
    }
}

impl TryFrom<usize> for NodeAddr {
    type Error = core::num::TryFromIntError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        u32::try_from(index).map(NodeAddr)
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifier of a link in the [`LinkTable`](crate::link::LinkTable).
///
/// Ids are never reused within a run, so a stale id simply fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link{}", self.0)
    }
}

/// Message identifier, unique per run.
pub type MessageId = String;

/// Prefix of response message ids.
pub const RESPONSE_PREFIX: &str = "R_";

/// Outcome of offering a message to a receiver.
///
/// Zero means accepted. Negative codes reject *this* message right now,
/// positive codes mean the receiver takes nothing at the moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiveCode {
    /// Accepted, transfer started.
    Ok,
    /// Receiver is busy, retry later.
    TryLaterBusy,
    /// Already buffered, delivered or blacklisted.
    DeniedOld,
    /// Not enough buffer space even after eviction.
    DeniedNoSpace,
    /// TTL expired and the receiver is not the final recipient.
    DeniedTtl,
    /// Receiver is out of some resource (energy).
    DeniedLowResources,
    /// Accept policy rejected the message.
    DeniedPolicy,
    /// Rejected for an unspecified reason.
    DeniedUnspecified,
}

impl ReceiveCode {
    /// Numeric code. Values in `[-100, 100]` are reserved.
    pub const fn value(self) -> i32 {
        match self {
            ReceiveCode::Ok => 0,
            ReceiveCode::TryLaterBusy => 1,
            ReceiveCode::DeniedOld => -1,
            ReceiveCode::DeniedNoSpace => -2,
            ReceiveCode::DeniedTtl => -3,
            ReceiveCode::DeniedLowResources => -4,
            ReceiveCode::DeniedPolicy => -5,
            ReceiveCode::DeniedUnspecified => -99,
        }
    }

    /// Accepted.
    pub const fn is_ok(self) -> bool {
        matches!(self, ReceiveCode::Ok)
    }

    /// The whole receiver is temporarily unavailable.
    pub const fn is_busy(self) -> bool {
        self.value() > 0
    }

    /// This particular message was rejected.
    pub const fn is_denied(self) -> bool {
        self.value() < 0
    }
}

impl fmt::Display for ReceiveCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReceiveCode::Ok => "RCV_OK",
            ReceiveCode::TryLaterBusy => "TRY_LATER_BUSY",
            ReceiveCode::DeniedOld => "DENIED_OLD",
            ReceiveCode::DeniedNoSpace => "DENIED_NO_SPACE",
            ReceiveCode::DeniedTtl => "DENIED_TTL",
            ReceiveCode::DeniedLowResources => "DENIED_LOW_RESOURCES",
            ReceiveCode::DeniedPolicy => "DENIED_POLICY",
            ReceiveCode::DeniedUnspecified => "DENIED_UNSPECIFIED",
        };
        write!(f, "{}({})", name, self.value())
    }
}
