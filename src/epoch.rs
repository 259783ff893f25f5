//! Epoch-synchronized contact accounting.
//!
//! Tracks, per neighbor, how long the link has been up during the current
//! epoch, and performs the once-per-epoch rollover pass that folds those
//! durations into the utility table with exponential smoothing.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use tracing::{debug, trace};

use crate::{config::SedumConfig, table::UtilityTable, utility::DurationUtility, Timestamp};

/// Per-neighbor connection-duration accounting and epoch state.
///
/// Invariant: a neighbor has an entry in `link_up_since` exactly while its
/// link is open; closing the link (or the forced close-out at an epoch
/// boundary) folds the elapsed time into `accumulated`.
#[derive(Debug, Clone)]
pub struct ContactClock<I> {
    epoch_start: Timestamp,
    contacted: HashSet<I>,
    link_up_since: HashMap<I, Timestamp>,
    accumulated: HashMap<I, u64>,
    last_contact: HashMap<I, Timestamp>,
}

impl<I> ContactClock<I>
where
    I: Clone + Eq + Hash + Debug,
{
    /// Create a clock whose first epoch starts at `epoch_start`.
    pub fn new(epoch_start: Timestamp) -> Self {
        Self {
            epoch_start,
            contacted: HashSet::new(),
            link_up_since: HashMap::new(),
            accumulated: HashMap::new(),
            last_contact: HashMap::new(),
        }
    }

    /// Start of the current epoch.
    pub fn epoch_start(&self) -> Timestamp {
        self.epoch_start
    }

    /// When this node last disconnected from `peer`, if ever.
    pub fn last_contact(&self, peer: &I) -> Option<Timestamp> {
        self.last_contact.get(peer).copied()
    }

    /// Whether the link to `peer` is currently open.
    pub fn is_connected(&self, peer: &I) -> bool {
        self.link_up_since.contains_key(peer)
    }

    /// Neighbors with a currently open link.
    pub fn connected(&self) -> impl Iterator<Item = &I> {
        self.link_up_since.keys()
    }

    /// Record a link coming up: the peer counts as contacted this epoch and
    /// its duration timer (re)starts at `now`.
    pub fn connection_up(&mut self, peer: I, now: Timestamp) {
        self.contacted.insert(peer.clone());
        self.link_up_since.insert(peer, now);
    }

    /// Record a link going down: fold the open interval into this epoch's
    /// accumulated duration and remember `now` as the last contact time.
    pub fn connection_down(&mut self, peer: &I, now: Timestamp) {
        self.close_out(peer, now);
        self.link_up_since.remove(peer);
    }

    /// Fold the open interval for `peer` (if any) into the accumulator and
    /// stamp the last contact time. Does not close the link itself.
    fn close_out(&mut self, peer: &I, now: Timestamp) {
        if let Some(since) = self.link_up_since.get(peer) {
            let elapsed = now.saturating_sub(*since);
            *self.accumulated.entry(peer.clone()).or_insert(0) += elapsed;
            self.last_contact.insert(peer.clone(), now);
        }
    }

    /// Whether the epoch boundary falls exactly on `now`.
    ///
    /// Boundaries are never skipped or merged: the external driver ticks at
    /// least once per time unit, so equality is the only trigger.
    pub fn is_rollover_due(&self, now: Timestamp, epoch_duration: u64) -> bool {
        now == self.epoch_start + epoch_duration
    }

    /// Run the epoch rollover if `now` is the boundary.
    ///
    /// Recomputes the utility for every neighbor contacted during the epoch
    /// just ended, smoothing against prior estimates, then opens the next
    /// epoch with the still-connected neighbors carried over. Returns the
    /// number of neighbors whose estimate was refreshed, or `None` when the
    /// boundary has not been reached.
    pub fn maybe_rollover(
        &mut self,
        table: &mut UtilityTable<I>,
        config: &SedumConfig,
        now: Timestamp,
    ) -> Option<usize> {
        if !self.is_rollover_due(now, config.epoch_duration) {
            return None;
        }

        // Still-open links have not folded their time yet; close them out at
        // the boundary and immediately reopen, since the link stays up.
        let open: Vec<I> = self.link_up_since.keys().cloned().collect();
        for peer in &open {
            self.close_out(peer, now);
            self.link_up_since.insert(peer.clone(), now);
        }

        let contacted = std::mem::take(&mut self.contacted);
        for peer in &contacted {
            let current = self.current_epoch_utility(table, peer, config.epoch_duration);

            let refreshed = match table.get(peer) {
                Some(previous) => current.smoothed_with(previous, config.smoothing_weight),
                None => current,
            };
            trace!(
                peer = ?peer,
                score = refreshed.score(),
                "epoch utility refreshed"
            );
            table.insert(peer.clone(), refreshed, now);
        }

        // The next epoch starts with the open links already counting; they
        // need no fresh contact event to be accounted for.
        self.contacted = open.iter().cloned().collect();
        self.accumulated.clear();
        self.epoch_start = now;

        debug!(
            refreshed = contacted.len(),
            carried_over = open.len(),
            now,
            "epoch rollover"
        );
        Some(contacted.len())
    }

    /// The current-epoch utility toward `peer`: the raw connected fraction,
    /// upgraded to the best table entry relayed through `peer` when that is
    /// higher (the best known path through a neighbor summarizes its
    /// usefulness at least as well as raw contact time).
    fn current_epoch_utility(
        &self,
        table: &UtilityTable<I>,
        peer: &I,
        epoch_duration: u64,
    ) -> DurationUtility<I> {
        let connected = self.accumulated.get(peer).copied().unwrap_or(0);
        let direct = DurationUtility::from_contact(connected, epoch_duration);

        match table.best_relayed_through(peer) {
            Some(via) if direct.is_smaller_than(via) => via.clone(),
            _ => direct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SedumConfig {
        SedumConfig::default().with_epoch_duration(10)
    }

    #[test]
    fn test_full_epoch_contact_scores_one() {
        let cfg = config();
        let mut clock = ContactClock::new(0);
        let mut table = UtilityTable::new();

        clock.connection_up(1u32, 0);
        clock.connection_down(&1, 10);
        let refreshed = clock.maybe_rollover(&mut table, &cfg, 10);

        assert_eq!(refreshed, Some(1));
        // No prior entry existed, so no smoothing is applied.
        assert_eq!(table.lookup(&1).score(), 1.0);
    }

    #[test]
    fn test_rollover_smooths_against_prior() {
        let cfg = config().with_smoothing_weight(0.2);
        let mut clock = ContactClock::new(0);
        let mut table = UtilityTable::new();
        table.insert(1u32, DurationUtility::direct(0.4), 0);

        // Connected for 6 of 10 ticks: fresh observation 0.6.
        clock.connection_up(1u32, 2);
        clock.connection_down(&1, 8);
        clock.maybe_rollover(&mut table, &cfg, 10);

        let stored = table.lookup(&1);
        assert!((stored.score() - 0.44).abs() < 1e-12);
    }

    #[test]
    fn test_rollover_is_idempotent_per_boundary() {
        let cfg = config();
        let mut clock = ContactClock::new(0);
        let mut table = UtilityTable::new();

        clock.connection_up(1u32, 0);
        assert!(clock.maybe_rollover(&mut table, &cfg, 10).is_some());
        let after_first = table.lookup(&1).score();

        // Ticking again at the same instant must not re-smooth or
        // double-count.
        assert!(clock.maybe_rollover(&mut table, &cfg, 10).is_none());
        assert_eq!(table.lookup(&1).score(), after_first);
    }

    #[test]
    fn test_open_link_survives_boundary() {
        let cfg = config();
        let mut clock = ContactClock::new(0);
        let mut table = UtilityTable::new();

        // Link up at t=5, never dropped across the boundary at t=10.
        clock.connection_up(1u32, 5);
        clock.maybe_rollover(&mut table, &cfg, 10);
        assert_eq!(table.lookup(&1).score(), 0.5);

        // Next boundary at t=20: the full epoch counts without any fresh
        // contact event, smoothed over the 0.5 estimate.
        clock.maybe_rollover(&mut table, &cfg, 20);
        let expected = 0.2 * 1.0 + 0.8 * 0.5;
        assert!((table.lookup(&1).score() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_relayed_entries_upgrade_direct_observation() {
        let cfg = config();
        let mut clock = ContactClock::new(0);
        let mut table = UtilityTable::new();

        // A path through peer 1 is already known to be strong.
        table.insert(
            9u32,
            DurationUtility::Indirect {
                score: 0.8,
                relay: 1,
            },
            0,
        );

        // Raw contact time alone would only score 0.2.
        clock.connection_up(1u32, 0);
        clock.connection_down(&1, 2);
        clock.maybe_rollover(&mut table, &cfg, 10);

        // First estimate for peer 1 takes the relayed maximum unsmoothed.
        assert_eq!(table.lookup(&1).score(), 0.8);
    }

    #[test]
    fn test_last_contact_stamped_on_down() {
        let mut clock = ContactClock::new(0);
        assert_eq!(clock.last_contact(&1u32), None);

        clock.connection_up(1u32, 3);
        assert!(clock.is_connected(&1));
        clock.connection_down(&1, 7);

        assert!(!clock.is_connected(&1));
        assert_eq!(clock.last_contact(&1), Some(7));
    }
}
