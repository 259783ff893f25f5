//! # sedum-routing
//!
//! SEDUM routing decision engine for delay-tolerant (opportunistic) networks.
//!
//! Nodes meet intermittently, exchange state during contact, and must decide
//! — with no global knowledge — how to forward and buffer messages toward
//! destinations that may never be directly reachable. SEDUM scores node
//! pairs by *connectivity-duration utility* (the estimated fraction of an
//! epoch two nodes spend connected), gossips those scores during contacts,
//! and spends a bounded replica budget on the contacts most likely to carry
//! a message home.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │              External driver (simulation / stack)            │
//! │      scheduler ticks · contact layer · transfer layer        │
//! └────────────┬───────────────┬────────────────┬────────────────┘
//! │ tick()                     │ on_contact_*   │ admit()/forward()
//! ┌────────────▼───────────────▼────────────────▼────────────────┐
//! │                        SedumEngine                           │
//! │      (composition root - one lock, PeerQuery responder)      │
//! ├──────────────┬──────────────┬──────────────┬─────────────────┤
//! │ ContactClock │ UtilityTable │ReplicaPolicy │  MessageBuffer  │
//! │  (epochs)    │ (estimates)  │ (core/split) │ (admit/evict)   │
//! └──────────────┴──────────────┴──────────────┴─────────────────┘
//!                        ▲ PeerQuery (contact-time RPC)
//!                        └── other nodes' engines
//! ```
//!
//! ## Entry points
//!
//! | API | Caller | Purpose |
//! |-----|--------|---------|
//! | [`SedumEngine::tick`] | scheduler | epoch rollover check |
//! | [`SedumEngine::on_contact_up`] / [`SedumEngine::on_contact_down`] | contact layer | gossip exchange, contact accounting |
//! | [`SedumEngine::admit`] / [`SedumEngine::admitted`] | transfer layer | buffer admission and storage |
//! | [`SedumEngine::decide_forward`] / [`SedumEngine::forward`] | transfer layer | replication policy |
//! | [`SedumEngine::on_delivered`] / [`SedumEngine::select_eviction_victim`] | transfer layer | delivery bookkeeping, fallback eviction |
//!
//! ## Example
//!
//! ```
//! use sedum_routing::{SedumConfig, SedumEngine};
//! use std::sync::Arc;
//!
//! let config = SedumConfig::default().with_epoch_duration(10);
//! let a = Arc::new(SedumEngine::new("a", config.clone(), 0).unwrap());
//! let b = Arc::new(SedumEngine::new("b", config, 0).unwrap());
//!
//! // Contact layer reports a link between the two nodes.
//! a.on_contact_up("b", b.clone(), 0);
//! b.on_contact_up("a", a.clone(), 0);
//!
//! // ... time passes, the link drops, the scheduler keeps ticking ...
//! a.on_contact_down(&"b", 10);
//! b.on_contact_down(&"a", 10);
//! a.tick(10);
//! b.tick(10);
//!
//! assert_eq!(a.utility_toward(&"b").score(), 1.0);
//! ```
//!
//! The engine performs no networking of its own: peers are queried through
//! the [`PeerQuery`] trait, a synchronous stand-in for the contact-layer
//! exchange. Each node owns its state exclusively; there is no shared
//! mutable memory between nodes.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

mod buffer;
mod config;
mod contact;
mod engine;
mod epoch;
mod error;
mod message;
mod replication;
mod table;
mod utility;

pub mod testing;

#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub mod metrics;

/// Discrete simulation time, in the external driver's time units.
pub type Timestamp = u64;

// Re-export buffer types
pub use buffer::{AdmitDecision, BufferStats, DenyReason, MessageBuffer};

// Re-export config types
pub use config::SedumConfig;

// Re-export contact types
pub use contact::{LinkRegistry, PeerQuery};

// Re-export error types
pub use error::{Error, Result};

// Re-export epoch types
pub use epoch::ContactClock;

// Re-export message types
pub use message::{Message, MessageId, ReplicaBudget};

// Re-export replication types
pub use replication::{ForwardDecision, ReplicaPolicy};

// Re-export table types
pub use table::UtilityTable;

// Re-export utility types
pub use utility::DurationUtility;

// Re-export the engine
pub use engine::SedumEngine;
