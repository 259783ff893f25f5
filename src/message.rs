//! Message records and replication metadata.
//!
//! The engine does not define a wire format; messages live in memory and the
//! surrounding transfer layer moves their bytes between nodes. What the
//! engine owns is the replication metadata: the remaining replica budget and
//! the core-replica flag attached to each buffered copy.

use bytes::Bytes;
use std::{
    fmt::{self, Debug, Display},
    hash::Hash,
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::Timestamp;

/// Counter for generating unique message ids within a process.
static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a message.
///
/// Composed of a wall-clock timestamp, a node-local counter, and a random
/// component. This provides uniqueness across nodes and time without any
/// coordination.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId {
    timestamp: u64,
    counter: u64,
    random: u64,
}

impl MessageId {
    /// Create a new unique message id.
    pub fn new() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
        let random = rand::random::<u64>();

        Self {
            timestamp,
            counter,
            random,
        }
    }

    /// Create a message id from raw components (for testing/deserialization).
    pub const fn from_parts(timestamp: u64, counter: u64, random: u64) -> Self {
        Self {
            timestamp,
            counter,
            random,
        }
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MessageId({:016x}-{:016x}-{:016x})",
            self.timestamp, self.counter, self.random
        )
    }
}

impl Display for MessageId {
    // Full three-component rendering: error messages and log lines must not
    // collide across distinct ids.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:016x}-{:016x}-{:016x}",
            self.timestamp, self.counter, self.random
        )
    }
}

/// Replication allowance carried by a message copy.
///
/// Replaces the ambiguous "0 means unlimited" convention: unbounded
/// replication is its own variant and a limited budget is an explicit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReplicaBudget {
    /// No cap on the number of copies; forwarding never splits the budget.
    Unbounded,
    /// At most this many copies may descend from this one (binary splitting).
    ///
    /// `Limited(1)` is the last copy: it is retained, never relayed, and only
    /// handed to the destination itself. `Limited(0)` can appear transiently
    /// on a copy handed to its destination (the split consumed the final
    /// unit) and never propagates further.
    Limited(u32),
}

impl ReplicaBudget {
    /// Create a limited budget of at least one copy.
    pub fn limited(count: u32) -> Self {
        ReplicaBudget::Limited(count.max(1))
    }

    /// Whether this budget is the unbounded marker.
    pub const fn is_unbounded(&self) -> bool {
        matches!(self, ReplicaBudget::Unbounded)
    }

    /// Whether this copy is down to its last replica unit.
    pub const fn is_last_copy(&self) -> bool {
        matches!(self, ReplicaBudget::Limited(n) if *n <= 1)
    }

    /// Binary split on forward: one unit is consumed by the transfer, the
    /// remainder is divided between the retained copy and the clone.
    ///
    /// Returns `(retained, clone)`. For `Limited(n)` the retained copy keeps
    /// `ceil((n-1)/2) + 1` and the clone gets `floor((n-1)/2)`, so the two
    /// always sum to `n`. Unbounded budgets are exempt from splitting.
    pub fn split(self) -> (Self, Self) {
        match self {
            ReplicaBudget::Unbounded => (ReplicaBudget::Unbounded, ReplicaBudget::Unbounded),
            ReplicaBudget::Limited(n) => {
                let remaining = n.saturating_sub(1);
                let clone = remaining / 2;
                let retained = remaining - clone + 1;
                (
                    ReplicaBudget::Limited(retained),
                    ReplicaBudget::Limited(clone),
                )
            }
        }
    }
}

/// A message instance as held in a node's buffer.
///
/// The payload and addressing fields are created by the application; the
/// replication metadata (`remaining_replicas`, `core`) is written by the
/// engine as copies are forwarded. `ttl` counts down externally and is only
/// read here.
#[derive(Debug, Clone)]
pub struct Message<I> {
    /// Unique message identifier, shared by all copies.
    pub id: MessageId,
    /// Node that created the message.
    pub origin: I,
    /// Node the message is addressed to.
    pub destination: I,
    /// Opaque payload bytes.
    pub payload: Bytes,
    /// Creation time at the origin.
    pub created_at: Timestamp,
    /// Remaining time-to-live in discrete time units; maintained by the
    /// surrounding message bookkeeping, read by admission control.
    pub ttl: i64,
    /// Remaining replication allowance for this copy.
    pub remaining_replicas: ReplicaBudget,
    /// Whether this copy is the message's single core replica.
    pub core: bool,
    /// When this node received (buffered) this copy.
    pub received_at: Timestamp,
}

impl<I> Message<I> {
    /// Create a fresh (origin-held, non-core) message instance.
    pub fn new(
        id: MessageId,
        origin: I,
        destination: I,
        payload: Bytes,
        created_at: Timestamp,
        ttl: i64,
        budget: ReplicaBudget,
    ) -> Self {
        Self {
            id,
            origin,
            destination,
            payload,
            created_at,
            ttl,
            remaining_replicas: budget,
            core: false,
            received_at: created_at,
        }
    }

    /// Size of the message in bytes, as counted against buffer capacity.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
