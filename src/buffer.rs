//! Local message store with utility-driven admission and eviction.
//!
//! Core replicas are never evicted to make room. Non-core replicas give way
//! to incoming messages with higher utility toward their destination, and
//! eviction is all-or-nothing: if the full candidate set cannot free enough
//! space, nothing is evicted and the admission is denied.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::{
    message::{Message, MessageId},
    table::UtilityTable,
};

/// Outcome of an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    /// The message may be transferred; any required eviction has been done.
    Accept,
    /// The message is refused.
    Deny(DenyReason),
}

/// Why an admission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// A transfer is already in progress; one transfer per node at a time.
    Busy,
    /// Already buffered, already known-delivered, or blacklisted.
    Duplicate,
    /// TTL has run out and this node is not the destination.
    Expired,
    /// Not enough evictable space to fit the message.
    LowResources,
}

/// Statistics about the buffer contents.
#[derive(Debug, Clone, Copy)]
pub struct BufferStats {
    /// Number of buffered messages.
    pub messages: usize,
    /// Bytes currently occupied.
    pub used_bytes: usize,
    /// Configured capacity in bytes.
    pub capacity: usize,
}

/// The per-node message store.
#[derive(Debug)]
pub struct MessageBuffer<I> {
    messages: HashMap<MessageId, Message<I>>,
    used_bytes: usize,
    capacity: usize,
    busy: bool,
    blacklist: HashSet<MessageId>,
}

impl<I> MessageBuffer<I>
where
    I: Clone + Eq + Hash + Debug,
{
    /// Create an empty buffer with the given byte capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: HashMap::new(),
            used_bytes: 0,
            capacity,
            busy: false,
            blacklist: HashSet::new(),
        }
    }

    /// Admission control for an incoming message.
    ///
    /// May evict non-core replicas to make room; on any denial the buffer is
    /// left exactly as it was. Acceptance does not store the message — the
    /// transfer layer calls [`insert`](Self::insert) once the bytes have
    /// arrived.
    pub fn admit(
        &mut self,
        incoming: &Message<I>,
        local_id: &I,
        table: &UtilityTable<I>,
        delivered: &HashMap<MessageId, Message<I>>,
    ) -> AdmitDecision {
        if self.busy {
            return AdmitDecision::Deny(DenyReason::Busy);
        }

        if self.messages.contains_key(&incoming.id)
            || delivered.contains_key(&incoming.id)
            || self.blacklist.contains(&incoming.id)
        {
            return AdmitDecision::Deny(DenyReason::Duplicate);
        }

        if incoming.ttl <= 0 && incoming.destination != *local_id {
            return AdmitDecision::Deny(DenyReason::Expired);
        }

        let size = incoming.size();
        if self.free_bytes() >= size {
            return AdmitDecision::Accept;
        }

        if self.messages.values().all(|m| m.core) {
            // Core replicas are never evicted; a buffer full of them cannot
            // make room.
            return AdmitDecision::Deny(DenyReason::LowResources);
        }

        self.try_evict_for(incoming, table)
    }

    /// Utility-ordered eviction pass for an incoming message that does not
    /// fit in the free space.
    fn try_evict_for(&mut self, incoming: &Message<I>, table: &UtilityTable<I>) -> AdmitDecision {
        let incoming_utility = table.lookup(&incoming.destination).score();

        // Candidates: non-core replicas, and for a non-core incoming message
        // only those strictly less useful than it.
        let mut candidates: SmallVec<[(f64, u64, MessageId, usize); 8]> = self
            .messages
            .values()
            .filter(|m| !m.core)
            .filter_map(|m| {
                let utility = table.lookup(&m.destination).score();
                if incoming.core || utility < incoming_utility {
                    Some((utility, m.created_at, m.id, m.size()))
                } else {
                    None
                }
            })
            .collect();

        let size = incoming.size();
        let reclaimable: usize = candidates.iter().map(|(_, _, _, s)| s).sum();
        if self.free_bytes() + reclaimable < size {
            // No partial eviction: either the message fits after the full
            // pass or the buffer stays untouched.
            trace!(id = %incoming.id, "insufficient evictable space");
            return AdmitDecision::Deny(DenyReason::LowResources);
        }

        candidates.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        for (utility, _, id, _) in candidates {
            if self.free_bytes() >= size {
                break;
            }
            self.remove(&id);
            debug!(victim = %id, utility, "evicted non-core replica");
        }
        AdmitDecision::Accept
    }

    /// Store an admitted message, stamping its receive time.
    pub fn insert(&mut self, mut message: Message<I>, now: crate::Timestamp) {
        message.received_at = now;
        self.used_bytes += message.size();
        self.messages.insert(message.id, message);
    }

    /// Remove a message from the buffer.
    pub fn remove(&mut self, id: &MessageId) -> Option<Message<I>> {
        let removed = self.messages.remove(id);
        if let Some(m) = &removed {
            self.used_bytes -= m.size();
        }
        removed
    }

    /// The buffered message with the earliest receive time, optionally
    /// excluding one currently mid-transfer. Ties resolve to the smaller id.
    pub fn oldest_received(&self, exclude: Option<&MessageId>) -> Option<&Message<I>> {
        self.messages
            .values()
            .filter(|m| exclude != Some(&m.id))
            .min_by(|a, b| a.received_at.cmp(&b.received_at).then(a.id.cmp(&b.id)))
    }

    /// Mark a message id as refused forever (e.g. a poisoned transfer).
    pub fn blacklist_id(&mut self, id: MessageId) {
        self.blacklist.insert(id);
    }

    /// Whether an id has been blacklisted.
    pub fn is_blacklisted(&self, id: &MessageId) -> bool {
        self.blacklist.contains(id)
    }

    /// Flip the single-transfer latch.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Whether a transfer is currently in progress.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// A buffered message by id.
    pub fn get(&self, id: &MessageId) -> Option<&Message<I>> {
        self.messages.get(id)
    }

    /// Mutable access to a buffered message.
    pub fn get_mut(&mut self, id: &MessageId) -> Option<&mut Message<I>> {
        self.messages.get_mut(id)
    }

    /// Whether the id is currently buffered.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.contains_key(id)
    }

    /// Ids of all buffered messages.
    pub fn ids(&self) -> Vec<MessageId> {
        self.messages.keys().copied().collect()
    }

    /// Iterate over buffered messages.
    pub fn iter(&self) -> impl Iterator<Item = &Message<I>> {
        self.messages.values()
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Bytes still available.
    pub fn free_bytes(&self) -> usize {
        self.capacity.saturating_sub(self.used_bytes)
    }

    /// Occupancy statistics.
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            messages: self.messages.len(),
            used_bytes: self.used_bytes,
            capacity: self.capacity,
        }
    }
}
