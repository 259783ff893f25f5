//! Bounded-replication forwarding policy.
//!
//! Decides whether a buffered message may be copied to a contact, divides the
//! replica budget between the retained copy and the clone (binary
//! splitting), and designates at most one core replica per message at its
//! origin. The policy works on utility values the caller has already fetched
//! from its contacts, so no peer is ever queried while engine state is
//! locked.

use std::collections::HashSet;
use std::fmt::Debug;

use tracing::{debug, trace};

use crate::{
    message::{Message, MessageId},
    utility::DurationUtility,
};

/// Outcome of a forwarding decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardDecision {
    /// The copy may be transferred to the candidate.
    Allow,
    /// The candidate is no better a carrier than this node; keep the copy.
    Deny,
}

/// Forwarding policy state.
///
/// `core_allocated` is the per-origin set of message ids whose single core
/// replica has been created. It only grows: once allocated, a core replica is
/// never re-allocated, even if that copy is later lost.
#[derive(Debug, Default)]
pub struct ReplicaPolicy {
    core_allocated: HashSet<MessageId>,
}

impl ReplicaPolicy {
    /// Create a policy with no core replicas allocated yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a core replica has been allocated for `id`.
    pub fn core_allocated(&self, id: &MessageId) -> bool {
        self.core_allocated.contains(id)
    }

    /// Decide whether `message` may be copied to `candidate`.
    ///
    /// `local` is this node's utility toward the destination and `remote` the
    /// utility the candidate reported toward it (zero when the candidate
    /// could not be queried). The destination itself is always served.
    /// Otherwise the last copy is retained, and a relay candidate must either
    /// already be the relay of the best local path to the destination, or
    /// report a strictly higher utility toward it than this node holds.
    pub fn decide_forward<I>(
        message: &Message<I>,
        candidate: &I,
        local: &DurationUtility<I>,
        remote: &DurationUtility<I>,
    ) -> ForwardDecision
    where
        I: Eq + Debug,
    {
        if *candidate == message.destination {
            return ForwardDecision::Allow;
        }

        if message.remaining_replicas.is_last_copy() {
            trace!(id = %message.id, "last copy retained");
            return ForwardDecision::Deny;
        }

        if local.is_relayed_by(candidate) {
            // The best path this node knows already runs through the
            // candidate.
            return ForwardDecision::Allow;
        }

        if local.is_smaller_than(remote) {
            ForwardDecision::Allow
        } else {
            ForwardDecision::Deny
        }
    }

    /// Split the replica budget and produce the clone to hand over.
    ///
    /// Must only be called after [`decide_forward`](Self::decide_forward)
    /// allowed the transfer. The retained `message` keeps the larger half of
    /// the budget; the clone is marked core when this node is the origin, no
    /// core replica exists yet for the id, and the caller established the
    /// candidate as the best carrier via [`candidate_is_best_carrier`].
    pub fn make_clone<I>(
        &mut self,
        message: &mut Message<I>,
        local_id: &I,
        candidate_is_best: bool,
    ) -> Message<I>
    where
        I: Clone + Eq + Debug,
    {
        let (retained, handed) = message.remaining_replicas.split();
        message.remaining_replicas = retained;

        let mut clone = message.clone();
        clone.remaining_replicas = handed;
        clone.core = false;

        if *local_id == message.origin
            && !self.core_allocated.contains(&message.id)
            && candidate_is_best
        {
            clone.core = true;
            self.core_allocated.insert(message.id);
            debug!(id = %message.id, "core replica designated");
        }

        clone
    }
}

/// Whether `candidate`, reporting `candidate_utility` toward the destination,
/// ranks highest among all currently connected neighbors.
///
/// `others` holds every other connected neighbor with its reported utility;
/// the candidate's own entry must not appear in it. An equal-scoring
/// competitor wins only with a lower node id, which makes the outcome
/// independent of iteration order.
pub fn candidate_is_best_carrier<I>(
    candidate: &I,
    candidate_utility: &DurationUtility<I>,
    others: &[(I, DurationUtility<I>)],
) -> bool
where
    I: Ord,
{
    for (peer, other) in others {
        if candidate_utility.is_smaller_than(other) {
            return false;
        }
        if other.score() == candidate_utility.score() && peer < candidate {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ReplicaBudget;
    use bytes::Bytes;

    fn message(budget: ReplicaBudget) -> Message<u32> {
        Message::new(
            MessageId::from_parts(1, 1, 1),
            1,
            9,
            Bytes::from_static(b"payload"),
            0,
            100,
            budget,
        )
    }

    fn zero() -> DurationUtility<u32> {
        DurationUtility::direct(0.0)
    }

    #[test]
    fn test_destination_always_allowed() {
        // Even the last copy is handed to the destination itself.
        let msg = message(ReplicaBudget::Limited(1));
        assert_eq!(
            ReplicaPolicy::decide_forward(&msg, &9, &zero(), &zero()),
            ForwardDecision::Allow
        );
    }

    #[test]
    fn test_last_copy_not_relayed() {
        let msg = message(ReplicaBudget::Limited(1));
        assert_eq!(
            ReplicaPolicy::decide_forward(
                &msg,
                &5,
                &DurationUtility::direct(0.1),
                &DurationUtility::direct(0.9)
            ),
            ForwardDecision::Deny
        );
    }

    #[test]
    fn test_relay_of_best_path_allowed() {
        let msg = message(ReplicaBudget::Limited(4));
        let local = DurationUtility::Indirect {
            score: 0.6,
            relay: 5,
        };
        assert_eq!(
            ReplicaPolicy::decide_forward(&msg, &5, &local, &zero()),
            ForwardDecision::Allow
        );
    }

    #[test]
    fn test_strictly_better_peer_allowed() {
        let msg = message(ReplicaBudget::Limited(4));
        let local = DurationUtility::direct(0.4);

        assert_eq!(
            ReplicaPolicy::decide_forward(&msg, &5, &local, &DurationUtility::direct(0.5)),
            ForwardDecision::Allow
        );
        // An equal utility is not an improvement.
        assert_eq!(
            ReplicaPolicy::decide_forward(&msg, &6, &local, &DurationUtility::direct(0.4)),
            ForwardDecision::Deny
        );
    }

    #[test]
    fn test_clone_splits_budget() {
        let mut policy = ReplicaPolicy::new();
        let mut msg = message(ReplicaBudget::Limited(8));

        // Forwarded by a relay node, not the origin.
        let clone = policy.make_clone(&mut msg, &2, true);

        assert_eq!(msg.remaining_replicas, ReplicaBudget::Limited(5));
        assert_eq!(clone.remaining_replicas, ReplicaBudget::Limited(3));
        assert!(!clone.core);
        assert!(!policy.core_allocated(&msg.id));
    }

    #[test]
    fn test_core_allocated_once_at_origin() {
        let mut policy = ReplicaPolicy::new();
        let mut msg = message(ReplicaBudget::Limited(8));

        // Origin forwards to the best-ranked connected neighbor: core.
        let first = policy.make_clone(&mut msg, &1, true);
        assert!(first.core);
        assert!(policy.core_allocated(&msg.id));

        // Allocation is permanent; later clones are non-core even to the
        // same carrier.
        let second = policy.make_clone(&mut msg, &1, true);
        assert!(!second.core);
    }

    #[test]
    fn test_non_origin_never_designates_core() {
        let mut policy = ReplicaPolicy::new();
        let mut msg = message(ReplicaBudget::Limited(8));

        let clone = policy.make_clone(&mut msg, &3, true);

        assert!(!clone.core);
        assert!(!policy.core_allocated(&msg.id));
    }

    #[test]
    fn test_best_carrier_scans_all_neighbors() {
        // A stronger neighbor anywhere in the set demotes the candidate.
        let others = [(6u32, DurationUtility::direct(0.8))];
        assert!(!candidate_is_best_carrier(
            &5,
            &DurationUtility::direct(0.3),
            &others
        ));
        assert!(candidate_is_best_carrier(
            &5,
            &DurationUtility::direct(0.9),
            &others
        ));
    }

    #[test]
    fn test_best_carrier_tie_breaks_to_lower_id() {
        // Candidate 6 ties with peer 5; the lower id wins the tie.
        let others = [(5u32, DurationUtility::direct(0.5))];
        assert!(!candidate_is_best_carrier(
            &6,
            &DurationUtility::direct(0.5),
            &others
        ));

        // Candidate 5 wins the same tie against peer 6.
        let others = [(6u32, DurationUtility::direct(0.5))];
        assert!(candidate_is_best_carrier(
            &5,
            &DurationUtility::direct(0.5),
            &others
        ));
    }
}
