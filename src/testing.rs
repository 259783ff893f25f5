//! In-memory test harness.
//!
//! Wires several [`SedumEngine`]s to each other through their [`PeerQuery`]
//! implementations, standing in for the contact and transfer layers of a
//! full simulation. Used by the crate's integration tests and useful for
//! driving the engine in examples.
//!
//! ```ignore
//! use sedum_routing::{testing::TestNet, SedumConfig};
//!
//! let mut net = TestNet::new(SedumConfig::default());
//! net.add_node(1u32, 0);
//! net.add_node(2u32, 0);
//!
//! net.connect(&1, &2, 0);
//! net.disconnect(&1, &2, 1);
//! net.tick_all(1);
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use bytes::Bytes;

use crate::{
    config::SedumConfig,
    contact::PeerQuery,
    engine::SedumEngine,
    message::{Message, MessageId, ReplicaBudget},
    Timestamp,
};

/// A set of engines connected through in-process [`PeerQuery`] handles.
pub struct TestNet<I> {
    config: SedumConfig,
    engines: HashMap<I, Arc<SedumEngine<I>>>,
}

impl<I> TestNet<I>
where
    I: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static,
{
    /// Create an empty network whose nodes share `config`.
    pub fn new(config: SedumConfig) -> Self {
        Self {
            config,
            engines: HashMap::new(),
        }
    }

    /// Add a node whose first epoch starts at `now`.
    ///
    /// # Panics
    ///
    /// Panics if the shared configuration is invalid or the id is taken.
    pub fn add_node(&mut self, id: I, now: Timestamp) -> Arc<SedumEngine<I>> {
        let engine = Arc::new(
            SedumEngine::new(id.clone(), self.config.clone(), now)
                .expect("test network configuration must be valid"),
        );
        let previous = self.engines.insert(id, engine.clone());
        assert!(previous.is_none(), "duplicate node id in test network");
        engine
    }

    /// The engine for `id`.
    ///
    /// # Panics
    ///
    /// Panics if no such node exists.
    pub fn engine(&self, id: &I) -> &Arc<SedumEngine<I>> {
        self.engines.get(id).expect("unknown node id")
    }

    /// Bring the link between `a` and `b` up at `now` (both directions
    /// exchange state).
    pub fn connect(&self, a: &I, b: &I, now: Timestamp) {
        let ea = self.engine(a).clone();
        let eb = self.engine(b).clone();
        ea.on_contact_up(b.clone(), eb.clone() as Arc<dyn PeerQuery<I>>, now);
        eb.on_contact_up(a.clone(), ea as Arc<dyn PeerQuery<I>>, now);
    }

    /// Tear the link between `a` and `b` down at `now`.
    pub fn disconnect(&self, a: &I, b: &I, now: Timestamp) {
        self.engine(a).on_contact_down(b, now);
        self.engine(b).on_contact_down(a, now);
    }

    /// Tick every node at `now`.
    pub fn tick_all(&self, now: Timestamp) {
        for engine in self.engines.values() {
            engine.tick(now);
        }
    }
}

/// A deterministic message for tests: id derived from `seed`, payload of
/// `size` zero bytes, generous TTL.
pub fn test_message<I>(
    seed: u64,
    origin: I,
    destination: I,
    size: usize,
    created_at: Timestamp,
    budget: ReplicaBudget,
) -> Message<I> {
    Message::new(
        MessageId::from_parts(seed, 0, 0),
        origin,
        destination,
        Bytes::from(vec![0u8; size]),
        created_at,
        1_000,
        budget,
    )
}
