//! Per-node utility table.
//!
//! Maps every known destination/relay to the current [`DurationUtility`]
//! estimate, with a parallel last-updated timestamp per entry so contacts can
//! exchange deltas ("everything you learned since we last met") instead of
//! full tables. Entries are created on first estimate and overwritten on
//! improvement or at epoch rollover; they are never deleted.

use std::collections::HashMap;
use std::hash::Hash;

use crate::{utility::DurationUtility, Timestamp};

/// Utility estimates held by one node, keyed by the far endpoint.
#[derive(Debug, Clone)]
pub struct UtilityTable<I> {
    utilities: HashMap<I, DurationUtility<I>>,
    updated_at: HashMap<I, Timestamp>,
}

impl<I> Default for UtilityTable<I> {
    fn default() -> Self {
        Self {
            utilities: HashMap::new(),
            updated_at: HashMap::new(),
        }
    }
}

impl<I> UtilityTable<I>
where
    I: Clone + Eq + Hash,
{
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored estimate toward `node`, if any.
    pub fn get(&self, node: &I) -> Option<&DurationUtility<I>> {
        self.utilities.get(node)
    }

    /// Total lookup: missing data is an implicit zero direct utility, so
    /// every utility comparison is defined.
    pub fn lookup(&self, node: &I) -> DurationUtility<I> {
        self.utilities
            .get(node)
            .cloned()
            .unwrap_or(DurationUtility::direct(0.0))
    }

    /// When the entry for `node` was last written, if it exists.
    pub fn last_updated(&self, node: &I) -> Option<Timestamp> {
        self.updated_at.get(node).copied()
    }

    /// Store (or overwrite) the estimate toward `node` and stamp it.
    pub fn insert(&mut self, node: I, utility: DurationUtility<I>, now: Timestamp) {
        self.updated_at.insert(node.clone(), now);
        self.utilities.insert(node, utility);
    }

    /// Store `candidate` only if it strictly beats the current entry.
    ///
    /// Missing entries always lose to the candidate. Equal scores keep the
    /// incumbent, so gossip cannot flap between equivalent relay paths.
    /// Returns whether the table changed.
    pub fn update_if_better(
        &mut self,
        node: I,
        candidate: DurationUtility<I>,
        now: Timestamp,
    ) -> bool {
        match self.utilities.get(&node) {
            Some(current) if !current.is_smaller_than(&candidate) => false,
            _ => {
                self.insert(node, candidate, now);
                true
            }
        }
    }

    /// Highest-scoring entry relayed through `relay`, if any.
    ///
    /// Equal scores resolve to whichever entry was reached first; the caller
    /// only consumes the score, so the choice is immaterial.
    pub fn best_relayed_through(&self, relay: &I) -> Option<&DurationUtility<I>> {
        self.utilities
            .values()
            .filter(|u| u.is_relayed_by(relay))
            .fold(None, |best: Option<&DurationUtility<I>>, u| match best {
                Some(b) if !b.is_smaller_than(u) => Some(b),
                _ => Some(u),
            })
    }

    /// Full-table snapshot for a first-ever contact, excluding the entry
    /// about the requester itself.
    pub fn snapshot(&self, excluding: &I) -> HashMap<I, DurationUtility<I>> {
        self.utilities
            .iter()
            .filter(|(node, _)| *node != excluding)
            .map(|(node, u)| (node.clone(), u.clone()))
            .collect()
    }

    /// Delta snapshot: entries updated strictly after `since`, excluding the
    /// entry about the requester itself.
    pub fn snapshot_since(&self, since: Timestamp, excluding: &I) -> HashMap<I, DurationUtility<I>> {
        self.utilities
            .iter()
            .filter(|(node, _)| *node != excluding)
            .filter(|(node, _)| {
                self.updated_at
                    .get(*node)
                    .is_some_and(|updated| *updated > since)
            })
            .map(|(node, u)| (node.clone(), u.clone()))
            .collect()
    }

    /// Number of known endpoints.
    pub fn len(&self) -> usize {
        self.utilities.len()
    }

    /// Whether the table holds no estimates yet.
    pub fn is_empty(&self) -> bool {
        self.utilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_defaults_to_zero() {
        let table: UtilityTable<u32> = UtilityTable::new();
        assert!(table.get(&1).is_none());
        assert_eq!(table.lookup(&1).score(), 0.0);
    }

    #[test]
    fn test_insert_stamps_entry() {
        let mut table = UtilityTable::new();
        table.insert(1u32, DurationUtility::direct(0.5), 10);

        assert_eq!(table.lookup(&1).score(), 0.5);
        assert_eq!(table.last_updated(&1), Some(10));
    }

    #[test]
    fn test_update_if_better_strict() {
        let mut table = UtilityTable::new();
        table.insert(1u32, DurationUtility::direct(0.5), 10);

        // Equal score keeps the incumbent and its timestamp.
        assert!(!table.update_if_better(1, DurationUtility::direct(0.5), 20));
        assert_eq!(table.last_updated(&1), Some(10));

        // Strictly better replaces and restamps.
        assert!(table.update_if_better(1, DurationUtility::direct(0.6), 20));
        assert_eq!(table.lookup(&1).score(), 0.6);
        assert_eq!(table.last_updated(&1), Some(20));

        // Unknown endpoints always take the candidate.
        assert!(table.update_if_better(2, DurationUtility::direct(0.1), 20));
    }

    #[test]
    fn test_snapshot_excludes_requester() {
        let mut table = UtilityTable::new();
        table.insert(1u32, DurationUtility::direct(0.5), 10);
        table.insert(2u32, DurationUtility::direct(0.3), 10);

        let snap = table.snapshot(&1);
        assert!(!snap.contains_key(&1));
        assert!(snap.contains_key(&2));
    }

    #[test]
    fn test_snapshot_since_is_strict() {
        let mut table = UtilityTable::new();
        table.insert(1u32, DurationUtility::direct(0.5), 10);
        table.insert(2u32, DurationUtility::direct(0.3), 20);
        table.insert(3u32, DurationUtility::direct(0.2), 30);

        let snap = table.snapshot_since(20, &99);
        assert_eq!(snap.len(), 1);
        assert!(snap.contains_key(&3));
    }

    #[test]
    fn test_best_relayed_through() {
        let mut table = UtilityTable::new();
        table.insert(1u32, DurationUtility::direct(0.9), 10);
        table.insert(
            2u32,
            DurationUtility::Indirect {
                score: 0.4,
                relay: 5,
            },
            10,
        );
        table.insert(
            3u32,
            DurationUtility::Indirect {
                score: 0.6,
                relay: 5,
            },
            10,
        );

        let best = table.best_relayed_through(&5).unwrap();
        assert_eq!(best.score(), 0.6);
        assert!(table.best_relayed_through(&7).is_none());
    }
}
