//! Connectivity-duration utility values.
//!
//! A [`DurationUtility`] estimates the fraction of an epoch during which a
//! node pair is connected. A *direct* value comes from this node's own
//! contact accounting; an *indirect* value estimates reachability through a
//! single relay as the product of the two legs' scores. Values are compared
//! by score alone and refreshed with an exponential moving average, the same
//! smoothing scheme used for link-quality estimates everywhere else in this
//! family of protocols.

use std::fmt;

use crate::Timestamp;

/// Estimated utility of a node pair's connectivity.
///
/// The score lives conceptually in `[0, 1]` (fraction of an epoch spent
/// connected) but is not hard-clamped; relayed products keep it in range by
/// construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DurationUtility<I> {
    /// Utility observed from direct contact.
    Direct {
        /// Fraction of the epoch the pair was connected.
        score: f64,
    },
    /// Utility of reaching the far endpoint through one intermediate node.
    Indirect {
        /// Product of the two legs' scores.
        score: f64,
        /// The intermediate node the estimate runs through.
        relay: I,
    },
}

impl<I> DurationUtility<I> {
    /// Direct utility from accumulated contact time within one epoch.
    ///
    /// `epoch_duration` must be positive; this is guaranteed by
    /// [`SedumConfig::validate`](crate::SedumConfig::validate) before any
    /// value is ever computed.
    pub fn from_contact(connected: Timestamp, epoch_duration: Timestamp) -> Self {
        DurationUtility::Direct {
            score: connected as f64 / epoch_duration as f64,
        }
    }

    /// Direct utility from a raw score.
    pub const fn direct(score: f64) -> Self {
        DurationUtility::Direct { score }
    }

    /// Indirect utility through `relay`: the product of this node's utility
    /// toward the relay and the utility the relay reported toward the far
    /// endpoint.
    pub fn relayed(toward_relay: &Self, reported: &Self, relay: I) -> Self {
        DurationUtility::Indirect {
            score: toward_relay.score() * reported.score(),
            relay,
        }
    }

    /// The utility score.
    pub const fn score(&self) -> f64 {
        match self {
            DurationUtility::Direct { score } => *score,
            DurationUtility::Indirect { score, .. } => *score,
        }
    }

    /// The relay node, if this is an indirect estimate.
    pub const fn relay(&self) -> Option<&I> {
        match self {
            DurationUtility::Direct { .. } => None,
            DurationUtility::Indirect { relay, .. } => Some(relay),
        }
    }

    /// Total order by score; relays do not participate in the comparison.
    pub fn is_smaller_than(&self, other: &Self) -> bool {
        self.score() < other.score()
    }

    /// Whether this estimate runs through the given relay.
    pub fn is_relayed_by(&self, node: &I) -> bool
    where
        I: PartialEq,
    {
        match self {
            DurationUtility::Direct { .. } => false,
            DurationUtility::Indirect { relay, .. } => relay == node,
        }
    }

    /// Exponential smoothing against the previous estimate.
    ///
    /// `weight` scales the fresh observation (`self`); the result inherits
    /// `self`'s variant and relay, never the previous value's.
    pub fn smoothed_with(&self, previous: &Self, weight: f64) -> Self
    where
        I: Clone,
    {
        let score = weight * self.score() + (1.0 - weight) * previous.score();
        match self {
            DurationUtility::Direct { .. } => DurationUtility::Direct { score },
            DurationUtility::Indirect { relay, .. } => DurationUtility::Indirect {
                score,
                relay: relay.clone(),
            },
        }
    }
}

impl<I: fmt::Display> fmt::Display for DurationUtility<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationUtility::Direct { score } => write!(f, "{}", score),
            DurationUtility::Indirect { score, relay } => {
                write!(f, "{} through {}", score, relay)
            }
        }
    }
}
