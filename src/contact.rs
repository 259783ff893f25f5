//! Contact-time state exchange.
//!
//! During a contact the two engines exchange their known-delivered sets and
//! utility-table deltas, then relax their own tables with the relay paths the
//! peer's entries reveal. Peers never touch each other's memory: everything a
//! node learns about a neighbor comes through the [`PeerQuery`] trait, a
//! synchronous stand-in for the contact-layer RPC. Implementations must
//! answer each call atomically with respect to their own mutations.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use tracing::trace;

use crate::{
    message::Message, table::UtilityTable, utility::DurationUtility, Timestamp,
};

/// Query surface one engine exposes to a connected peer.
///
/// The `requester` argument identifies the calling node so the responder can
/// exclude the entry it holds about the caller itself (self-loops carry no
/// routing information).
pub trait PeerQuery<I>: Send + Sync {
    /// Messages this node knows have reached their destination.
    fn known_delivered(&self) -> Vec<Message<I>>;

    /// Full utility table, excluding the entry about `requester`.
    fn utilities(&self, requester: &I) -> HashMap<I, DurationUtility<I>>;

    /// Entries updated strictly after `since`, excluding the entry about
    /// `requester`.
    fn utilities_since(&self, since: Timestamp, requester: &I) -> HashMap<I, DurationUtility<I>>;

    /// This node's current utility estimate toward `destination`.
    ///
    /// Total: unknown destinations answer as zero direct utility.
    fn utility_toward(&self, destination: &I) -> DurationUtility<I>;
}

/// Live contact handles, held only while the link is up.
///
/// Detaching on disconnect is what breaks the mutual references between two
/// connected engines.
pub struct LinkRegistry<I> {
    links: HashMap<I, Arc<dyn PeerQuery<I>>>,
}

impl<I: Debug> Debug for LinkRegistry<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkRegistry")
            .field("peers", &self.links.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<I> Default for LinkRegistry<I> {
    fn default() -> Self {
        Self {
            links: HashMap::new(),
        }
    }
}

impl<I> LinkRegistry<I>
where
    I: Clone + Eq + Hash,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the query handle for a peer whose link just came up.
    pub fn attach(&mut self, peer: I, handle: Arc<dyn PeerQuery<I>>) {
        self.links.insert(peer, handle);
    }

    /// Drop the handle for a peer whose link went down.
    pub fn detach(&mut self, peer: &I) {
        self.links.remove(peer);
    }

    /// Handle for a currently connected peer.
    pub fn get(&self, peer: &I) -> Option<&Arc<dyn PeerQuery<I>>> {
        self.links.get(peer)
    }

    /// All currently connected peers and their handles.
    pub fn iter(&self) -> impl Iterator<Item = (&I, &Arc<dyn PeerQuery<I>>)> {
        self.links.iter()
    }

    /// Number of open links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether no links are open.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Path relaxation over a peer's reported utilities.
///
/// For every `(k, u(peer, k))` received, the candidate `u(local, peer) *
/// u(peer, k)` relayed through `peer` is inserted when no entry for `k`
/// exists, or replaces the existing entry when strictly better. Without a
/// local estimate toward the peer there is nothing to multiply, so the
/// report is ignored entirely. Returns the number of entries changed.
pub(crate) fn relax_paths<I>(
    table: &mut UtilityTable<I>,
    local_id: &I,
    peer: &I,
    reported: &HashMap<I, DurationUtility<I>>,
    now: Timestamp,
) -> usize
where
    I: Clone + Eq + Hash + Debug,
{
    let Some(toward_peer) = table.get(peer).cloned() else {
        return 0;
    };

    let mut changed = 0;
    for (k, reported_utility) in reported {
        // No self-loops, regardless of what the responder sent.
        if k == local_id {
            continue;
        }
        let candidate = DurationUtility::relayed(&toward_peer, reported_utility, peer.clone());
        if table.update_if_better(k.clone(), candidate, now) {
            trace!(endpoint = ?k, relay = ?peer, "relay path improved estimate");
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relax_inserts_new_relay_path() {
        let mut table = UtilityTable::new();
        table.insert(2u32, DurationUtility::direct(0.5), 0);

        let reported = HashMap::from([(3u32, DurationUtility::direct(0.8))]);
        let changed = relax_paths(&mut table, &1, &2, &reported, 5);

        assert_eq!(changed, 1);
        let entry = table.lookup(&3);
        assert!((entry.score() - 0.4).abs() < 1e-12);
        assert!(entry.is_relayed_by(&2));
        assert_eq!(table.last_updated(&3), Some(5));
    }

    #[test]
    fn test_relax_requires_estimate_toward_peer() {
        let mut table: UtilityTable<u32> = UtilityTable::new();
        let reported = HashMap::from([(3u32, DurationUtility::direct(0.8))]);

        assert_eq!(relax_paths(&mut table, &1, &2, &reported, 5), 0);
        assert!(table.get(&3).is_none());
    }

    #[test]
    fn test_relax_keeps_better_existing_entry() {
        let mut table = UtilityTable::new();
        table.insert(2u32, DurationUtility::direct(0.5), 0);
        table.insert(3u32, DurationUtility::direct(0.9), 0);

        let reported = HashMap::from([(3u32, DurationUtility::direct(0.8))]);
        assert_eq!(relax_paths(&mut table, &1, &2, &reported, 5), 0);

        // 0.5 * 0.8 = 0.4 loses to the stored 0.9; timestamp untouched.
        assert_eq!(table.lookup(&3).score(), 0.9);
        assert_eq!(table.last_updated(&3), Some(0));
    }

    #[test]
    fn test_relax_skips_own_id() {
        let mut table = UtilityTable::new();
        table.insert(2u32, DurationUtility::direct(0.5), 0);

        let reported = HashMap::from([(1u32, DurationUtility::direct(0.9))]);
        assert_eq!(relax_paths(&mut table, &1, &2, &reported, 5), 0);
        assert!(table.get(&1).is_none());
    }
}
