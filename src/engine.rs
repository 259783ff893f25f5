//! The per-node SEDUM engine.
//!
//! Composes the utility table, contact clock, replication policy, and
//! message buffer behind a single lock, and exposes the entry points the
//! surrounding scheduler, contact layer, and transfer layer invoke. The
//! engine performs no I/O of its own: it computes decisions and stores state
//! for events handed to it.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::{
    buffer::{AdmitDecision, BufferStats, MessageBuffer},
    config::SedumConfig,
    contact::{relax_paths, LinkRegistry, PeerQuery},
    epoch::ContactClock,
    error::{Error, Result},
    message::{Message, MessageId},
    replication::{candidate_is_best_carrier, ForwardDecision, ReplicaPolicy},
    table::UtilityTable,
    utility::DurationUtility,
    Timestamp,
};

/// All mutable per-node state, behind one lock so [`PeerQuery`] responses
/// are atomic with respect to local mutation.
struct EngineState<I> {
    table: UtilityTable<I>,
    clock: ContactClock<I>,
    buffer: MessageBuffer<I>,
    delivered: HashMap<MessageId, Message<I>>,
    policy: ReplicaPolicy,
    links: LinkRegistry<I>,
}

/// A node's routing decision engine.
///
/// Driven externally through discrete ticks and contact/transfer events;
/// within one event handler the engine runs to completion. Peers read each
/// other's state only through the [`PeerQuery`] trait, which this type
/// implements for its own state.
pub struct SedumEngine<I> {
    local_id: I,
    config: SedumConfig,
    state: RwLock<EngineState<I>>,
}

impl<I: Debug> Debug for SedumEngine<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SedumEngine")
            .field("local_id", &self.local_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<I> SedumEngine<I>
where
    I: Clone + Eq + Hash + Ord + Debug + Send + Sync,
{
    /// Create an engine for `local_id` whose first epoch starts at `now`.
    ///
    /// Fails fast on an invalid configuration (zero epoch duration,
    /// out-of-range smoothing weight) so no division fault can surface at a
    /// later rollover.
    pub fn new(local_id: I, config: SedumConfig, now: Timestamp) -> Result<Self> {
        config.validate()?;
        let buffer = MessageBuffer::new(config.buffer_capacity);
        Ok(Self {
            local_id,
            config,
            state: RwLock::new(EngineState {
                table: UtilityTable::new(),
                clock: ContactClock::new(now),
                buffer,
                delivered: HashMap::new(),
                policy: ReplicaPolicy::new(),
                links: LinkRegistry::new(),
            }),
        })
    }

    /// This node's identifier.
    pub fn local_id(&self) -> &I {
        &self.local_id
    }

    /// The engine's immutable configuration.
    pub fn config(&self) -> &SedumConfig {
        &self.config
    }

    /// Periodic driver entry point; a no-op unless `now` is exactly the
    /// epoch boundary. The external scheduler must tick at least once per
    /// time unit — missed boundaries are not caught up.
    pub fn tick(&self, now: Timestamp) {
        let mut guard = self.state.write();
        let state = &mut *guard;
        if let Some(_refreshed) = state.clock.maybe_rollover(&mut state.table, &self.config, now) {
            #[cfg(feature = "metrics")]
            crate::metrics::record_rollover(_refreshed);
        }
    }

    /// Contact-layer entry point: the link to `peer` just came up.
    ///
    /// Performs the gossip exchange over `link` (known-delivered merge,
    /// utility delta, path relaxation) and starts contact accounting. The
    /// handle is held until [`on_contact_down`](Self::on_contact_down).
    pub fn on_contact_up(&self, peer: I, link: Arc<dyn PeerQuery<I>>, now: Timestamp) {
        // Query the peer before taking the write lock: the exchange is a
        // request/response pair against the peer's state, not ours.
        let last_contact = self.state.read().clock.last_contact(&peer);
        let peer_delivered = link.known_delivered();
        let reported = match last_contact {
            Some(since) => link.utilities_since(since, &self.local_id),
            None => link.utilities(&self.local_id),
        };

        let mut guard = self.state.write();
        let state = &mut *guard;

        // Merge the peer's known-delivered set and prune local copies of
        // anything that already reached its destination. Delivered pruning
        // is not eviction and bypasses the eviction accounting.
        let mut pruned = 0;
        for message in peer_delivered {
            if state.buffer.remove(&message.id).is_some() {
                pruned += 1;
            }
            state.delivered.entry(message.id).or_insert(message);
        }

        let relaxed = relax_paths(&mut state.table, &self.local_id, &peer, &reported, now);

        state.clock.connection_up(peer.clone(), now);
        state.links.attach(peer.clone(), link);

        debug!(
            peer = ?peer,
            delta_entries = reported.len(),
            relaxed,
            pruned,
            "contact up"
        );
        #[cfg(feature = "metrics")]
        crate::metrics::record_contact_up(reported.len(), relaxed, pruned);
    }

    /// Contact-layer entry point: the link to `peer` went down.
    ///
    /// Folds the connected interval into this epoch's accounting, stamps the
    /// last-contact time the next delta query will be measured against, and
    /// drops the peer's query handle.
    pub fn on_contact_down(&self, peer: &I, now: Timestamp) {
        let mut guard = self.state.write();
        guard.clock.connection_down(peer, now);
        guard.links.detach(peer);
        debug!(peer = ?peer, now, "contact down");
    }

    /// Originate a message at this node, stamped with the configured replica
    /// budget. The caller still admits and stores it like any other copy.
    pub fn compose(
        &self,
        destination: I,
        payload: bytes::Bytes,
        now: Timestamp,
        ttl: i64,
    ) -> Message<I> {
        Message::new(
            MessageId::new(),
            self.local_id.clone(),
            destination,
            payload,
            now,
            ttl,
            self.config.replica_budget,
        )
    }

    /// Transfer-layer entry point: may `incoming` be received into the
    /// buffer? Acceptance may evict non-core replicas; any denial leaves the
    /// buffer untouched.
    pub fn admit(&self, incoming: &Message<I>) -> AdmitDecision {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let decision = state
            .buffer
            .admit(incoming, &self.local_id, &state.table, &state.delivered);
        trace!(id = %incoming.id, ?decision, "admission");
        #[cfg(feature = "metrics")]
        crate::metrics::record_admit(&decision);
        decision
    }

    /// Transfer-layer entry point: the transfer accepted by
    /// [`admit`](Self::admit) has completed; store the message.
    pub fn admitted(&self, message: Message<I>, now: Timestamp) {
        self.state.write().buffer.insert(message, now);
    }

    /// Transfer-layer entry point: `message` reached its destination (this
    /// node). Records it as known-delivered — gossip will let other holders
    /// drop their copies — and removes any buffered copy.
    pub fn on_delivered(&self, message: Message<I>) {
        let mut guard = self.state.write();
        guard.buffer.remove(&message.id);
        guard.delivered.insert(message.id, message);
    }

    /// Forwarding policy: may the buffered message be copied to `candidate`?
    ///
    /// The candidate's reported utility is fetched through its link handle
    /// with no local lock held, so engines advancing in parallel never wait
    /// on each other's state.
    pub fn decide_forward(&self, id: &MessageId, candidate: &I) -> Result<ForwardDecision> {
        let (message, local, handle) = {
            let guard = self.state.read();
            let message = guard
                .buffer
                .get(id)
                .cloned()
                .ok_or_else(|| Error::MessageNotBuffered(id.to_string()))?;
            let local = guard.table.lookup(&message.destination);
            let handle = guard.links.get(candidate).cloned();
            (message, local, handle)
        };

        let remote = match handle {
            Some(link) => link.utility_toward(&message.destination),
            // No open link to query; an unreachable candidate carries zero
            // utility.
            None => DurationUtility::direct(0.0),
        };

        Ok(ReplicaPolicy::decide_forward(
            &message, candidate, &local, &remote,
        ))
    }

    /// Perform the forward allowed by [`decide_forward`](Self::decide_forward):
    /// split the replica budget, classify the clone (core at most once per
    /// message, only at its origin), and return the copy to hand to
    /// `candidate`.
    ///
    /// Neighbor utilities for the core-replica comparison are queried before
    /// the engine locks its own state; two connected engines forwarding to
    /// each other concurrently cannot block on each other's locks.
    pub fn forward(&self, id: &MessageId, candidate: &I) -> Result<Message<I>> {
        let (origin, destination, links) = {
            let guard = self.state.read();
            let message = guard
                .buffer
                .get(id)
                .ok_or_else(|| Error::MessageNotBuffered(id.to_string()))?;
            let links: Vec<(I, Arc<dyn PeerQuery<I>>)> = guard
                .links
                .iter()
                .map(|(peer, handle)| (peer.clone(), handle.clone()))
                .collect();
            (message.origin.clone(), message.destination.clone(), links)
        };

        // Only the origin ever ranks carriers; relays skip the queries.
        let candidate_is_best = origin == self.local_id && {
            let mut candidate_utility = None;
            let mut others = Vec::with_capacity(links.len());
            for (peer, handle) in links {
                let utility = handle.utility_toward(&destination);
                if peer == *candidate {
                    candidate_utility = Some(utility);
                } else {
                    others.push((peer, utility));
                }
            }
            match candidate_utility {
                Some(utility) => candidate_is_best_carrier(candidate, &utility, &others),
                // A candidate with no open link cannot be ranked.
                None => false,
            }
        };

        let mut guard = self.state.write();
        let state = &mut *guard;
        let message = state
            .buffer
            .get_mut(id)
            .ok_or_else(|| Error::MessageNotBuffered(id.to_string()))?;
        let clone = state
            .policy
            .make_clone(message, &self.local_id, candidate_is_best);
        #[cfg(feature = "metrics")]
        crate::metrics::record_forward(clone.core);
        Ok(clone)
    }

    /// Fallback victim selector: the buffered message with the earliest
    /// receive time, optionally excluding one currently mid-transfer.
    pub fn select_eviction_victim(&self, exclude_in_flight: Option<&MessageId>) -> Option<MessageId> {
        self.state
            .read()
            .buffer
            .oldest_received(exclude_in_flight)
            .map(|m| m.id)
    }

    /// Latch the single-transfer-at-a-time constraint on.
    pub fn transfer_started(&self) {
        self.state.write().buffer.set_busy(true);
    }

    /// Release the transfer latch.
    pub fn transfer_finished(&self) {
        self.state.write().buffer.set_busy(false);
    }

    /// Permanently refuse a message id (e.g. after a poisoned transfer).
    pub fn blacklist(&self, id: MessageId) {
        self.state.write().buffer.blacklist_id(id);
    }

    /// Current utility estimate toward `destination`; total, answering zero
    /// for unknown destinations.
    pub fn utility_toward(&self, destination: &I) -> DurationUtility<I> {
        self.state.read().table.lookup(destination)
    }

    /// Ids of all buffered messages.
    pub fn buffered_ids(&self) -> Vec<MessageId> {
        self.state.read().buffer.ids()
    }

    /// A snapshot of the buffered message with the given id.
    pub fn buffered(&self, id: &MessageId) -> Option<Message<I>> {
        self.state.read().buffer.get(id).cloned()
    }

    /// Buffer occupancy statistics.
    pub fn buffer_stats(&self) -> BufferStats {
        self.state.read().buffer.stats()
    }

    /// Number of messages known to have been delivered.
    pub fn delivered_count(&self) -> usize {
        self.state.read().delivered.len()
    }

    /// Whether the link to `peer` is currently open.
    pub fn is_connected(&self, peer: &I) -> bool {
        self.state.read().clock.is_connected(peer)
    }
}

impl<I> PeerQuery<I> for SedumEngine<I>
where
    I: Clone + Eq + Hash + Ord + Debug + Send + Sync,
{
    fn known_delivered(&self) -> Vec<Message<I>> {
        self.state.read().delivered.values().cloned().collect()
    }

    fn utilities(&self, requester: &I) -> HashMap<I, DurationUtility<I>> {
        self.state.read().table.snapshot(requester)
    }

    fn utilities_since(&self, since: Timestamp, requester: &I) -> HashMap<I, DurationUtility<I>> {
        self.state.read().table.snapshot_since(since, requester)
    }

    fn utility_toward(&self, destination: &I) -> DurationUtility<I> {
        self.state.read().table.lookup(destination)
    }
}
