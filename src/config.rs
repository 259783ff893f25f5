//! Configuration for the SEDUM engine.

use crate::error::{Error, Result};
use crate::message::ReplicaBudget;

/// Configuration options for a [`SedumEngine`](crate::SedumEngine).
///
/// These parameters control how quickly utility estimates react to new
/// observations and how aggressively messages are replicated. The
/// configuration is validated once at engine construction and is immutable
/// afterwards; there is no shared or global configuration state.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SedumConfig {
    /// Length of one utility epoch, in discrete time units.
    ///
    /// At the end of each epoch the accumulated connection durations are
    /// folded into the utility table and smoothed against the previous
    /// estimates. Must be positive; a zero value is rejected at engine
    /// construction (it would make the duration-to-utility division
    /// meaningless).
    ///
    /// Default: 1
    pub epoch_duration: u64,

    /// Weight of the freshly observed utility in the exponential smoothing
    /// combinator, in `(0, 1]`.
    ///
    /// Values closer to 1 favor the most recent epoch's observation; values
    /// closer to 0 favor history. A value of exactly 1 disables smoothing.
    ///
    /// Default: 0.2
    pub smoothing_weight: f64,

    /// Replica budget attached to messages originated by this node.
    ///
    /// [`ReplicaBudget::Limited`] budgets are halved on every forward
    /// (binary splitting); [`ReplicaBudget::Unbounded`] disables splitting
    /// entirely.
    ///
    /// Default: unbounded
    pub replica_budget: ReplicaBudget,

    /// Local message buffer capacity, in bytes.
    ///
    /// Admission beyond this capacity triggers the utility-driven eviction
    /// policy.
    ///
    /// Default: `usize::MAX` (effectively unlimited)
    pub buffer_capacity: usize,
}

impl Default for SedumConfig {
    fn default() -> Self {
        Self {
            epoch_duration: 1,
            smoothing_weight: 0.2,
            replica_budget: ReplicaBudget::Unbounded,
            buffer_capacity: usize::MAX,
        }
    }
}

impl SedumConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for dense contact patterns (e.g. campus mobility).
    ///
    /// Short epochs and a responsive smoothing weight: estimates track the
    /// frequent contacts closely.
    pub fn dense() -> Self {
        Self {
            epoch_duration: 1,
            smoothing_weight: 0.3,
            replica_budget: ReplicaBudget::Limited(8),
            buffer_capacity: usize::MAX,
        }
    }

    /// Configuration for sparse contact patterns (e.g. vehicular or
    /// wildlife-tracking scenarios).
    ///
    /// Long epochs and a conservative smoothing weight: a single unusual
    /// epoch moves the estimates only slightly.
    pub fn sparse() -> Self {
        Self {
            epoch_duration: 60,
            smoothing_weight: 0.1,
            replica_budget: ReplicaBudget::Limited(4),
            buffer_capacity: usize::MAX,
        }
    }

    /// Set the epoch duration (builder pattern).
    pub const fn with_epoch_duration(mut self, ticks: u64) -> Self {
        self.epoch_duration = ticks;
        self
    }

    /// Set the smoothing weight (builder pattern).
    pub const fn with_smoothing_weight(mut self, weight: f64) -> Self {
        self.smoothing_weight = weight;
        self
    }

    /// Set the replica budget for locally originated messages (builder pattern).
    pub const fn with_replica_budget(mut self, budget: ReplicaBudget) -> Self {
        self.replica_budget = budget;
        self
    }

    /// Set the buffer capacity in bytes (builder pattern).
    pub const fn with_buffer_capacity(mut self, bytes: usize) -> Self {
        self.buffer_capacity = bytes;
        self
    }

    /// Validate the configuration.
    ///
    /// Called by [`SedumEngine::new`](crate::SedumEngine::new); a zero epoch
    /// or an out-of-range smoothing weight must fail here, at construction,
    /// rather than at the first rollover.
    pub fn validate(&self) -> Result<()> {
        if self.epoch_duration == 0 {
            return Err(Error::Config(
                "epoch_duration must be positive".to_string(),
            ));
        }
        if !self.smoothing_weight.is_finite()
            || self.smoothing_weight <= 0.0
            || self.smoothing_weight > 1.0
        {
            return Err(Error::Config(format!(
                "smoothing_weight must be in (0, 1], got {}",
                self.smoothing_weight
            )));
        }
        Ok(())
    }
}
