//! Metrics for the SEDUM engine.
//!
//! Provides counters and histograms for monitoring routing behavior.
//!
//! ## Available Metrics
//!
//! ### Counters
//! - `sedum_epoch_rollovers_total` - Epoch boundaries processed
//! - `sedum_contacts_total` - Contact-up events handled
//! - `sedum_relay_paths_adopted_total` - Table entries improved via relay paths
//! - `sedum_delivered_pruned_total` - Buffered copies dropped as known-delivered
//! - `sedum_admit_accepted_total` - Admissions accepted
//! - `sedum_admit_denied_total` - Admissions denied, labeled by `reason`
//! - `sedum_forwards_total` - Clones handed to contacts
//! - `sedum_core_replicas_total` - Core replicas designated
//!
//! ### Histograms
//! - `sedum_epoch_refresh_size` - Neighbors refreshed per rollover
//! - `sedum_delta_entries` - Utility entries received per contact exchange

use metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::buffer::{AdmitDecision, DenyReason};

/// Initialize metric descriptions.
///
/// Call this once at application startup to register all metric
/// descriptions. This makes metrics more discoverable in monitoring systems.
pub fn init_metrics() {
    describe_counter!(
        "sedum_epoch_rollovers_total",
        "Total number of epoch boundaries processed"
    );
    describe_counter!("sedum_contacts_total", "Total number of contact-up events");
    describe_counter!(
        "sedum_relay_paths_adopted_total",
        "Total number of table entries improved through relay paths"
    );
    describe_counter!(
        "sedum_delivered_pruned_total",
        "Total number of buffered copies dropped because they were already delivered"
    );
    describe_counter!(
        "sedum_admit_accepted_total",
        "Total number of accepted admissions"
    );
    describe_counter!(
        "sedum_admit_denied_total",
        "Total number of denied admissions, labeled by reason"
    );
    describe_counter!(
        "sedum_forwards_total",
        "Total number of message clones handed to contacts"
    );
    describe_counter!(
        "sedum_core_replicas_total",
        "Total number of core replicas designated"
    );

    describe_histogram!(
        "sedum_epoch_refresh_size",
        "Number of neighbor estimates refreshed per epoch rollover"
    );
    describe_histogram!(
        "sedum_delta_entries",
        "Number of utility entries received per contact exchange"
    );
}

pub(crate) fn record_rollover(refreshed: usize) {
    counter!("sedum_epoch_rollovers_total").increment(1);
    histogram!("sedum_epoch_refresh_size").record(refreshed as f64);
}

pub(crate) fn record_contact_up(delta_entries: usize, relaxed: usize, pruned: usize) {
    counter!("sedum_contacts_total").increment(1);
    counter!("sedum_relay_paths_adopted_total").increment(relaxed as u64);
    counter!("sedum_delivered_pruned_total").increment(pruned as u64);
    histogram!("sedum_delta_entries").record(delta_entries as f64);
}

pub(crate) fn record_admit(decision: &AdmitDecision) {
    match decision {
        AdmitDecision::Accept => {
            counter!("sedum_admit_accepted_total").increment(1);
        }
        AdmitDecision::Deny(reason) => {
            let reason = match reason {
                DenyReason::Busy => "busy",
                DenyReason::Duplicate => "duplicate",
                DenyReason::Expired => "expired",
                DenyReason::LowResources => "low_resources",
            };
            counter!("sedum_admit_denied_total", "reason" => reason).increment(1);
        }
    }
}

pub(crate) fn record_forward(core: bool) {
    counter!("sedum_forwards_total").increment(1);
    if core {
        counter!("sedum_core_replicas_total").increment(1);
    }
}
