//! Contact-time gossip: delta queries, relay-path relaxation, and
//! delivered-message pruning across engines.

mod common;

use sedum_routing::testing::{test_message, TestNet};
use sedum_routing::{AdmitDecision, DenyReason, PeerQuery, ReplicaBudget, SedumConfig};

fn three_node_net() -> TestNet<u32> {
    common::init_tracing();
    let mut net = TestNet::new(SedumConfig::default().with_epoch_duration(10));
    net.add_node(1u32, 0);
    net.add_node(2u32, 0);
    net.add_node(3u32, 0);
    net
}

#[test]
fn relay_path_adopted_from_peer_report() {
    let net = three_node_net();

    // First epoch builds direct estimates: u(1,2) = 0.5 and u(2,3) = 0.8.
    net.connect(&1, &2, 0);
    net.disconnect(&1, &2, 5);
    net.connect(&2, &3, 0);
    net.disconnect(&2, &3, 8);
    net.tick_all(10);

    assert_eq!(net.engine(&1).utility_toward(&2).score(), 0.5);
    assert_eq!(net.engine(&2).utility_toward(&3).score(), 0.8);
    assert_eq!(net.engine(&1).utility_toward(&3).score(), 0.0);

    // Next meeting of 1 and 2: node 1 learns u(2,3) from the delta and
    // adopts the relayed path 0.5 * 0.8 = 0.4 through node 2.
    net.connect(&1, &2, 12);

    let adopted = net.engine(&1).utility_toward(&3);
    assert!((adopted.score() - 0.4).abs() < 1e-12);
    assert!(adopted.is_relayed_by(&2));
}

#[test]
fn delta_excludes_entry_about_requester() {
    let net = three_node_net();

    net.connect(&1, &2, 0);
    net.disconnect(&1, &2, 5);
    net.tick_all(10);

    // Node 2 holds an estimate about node 1, but never reports it back to
    // node 1 itself.
    assert_eq!(net.engine(&2).utility_toward(&1).score(), 0.5);
    let reported = net.engine(&2).utilities(&1);
    assert!(!reported.contains_key(&1));
}

#[test]
fn first_contact_requests_full_table() {
    let net = three_node_net();

    // Build an estimate on node 2 before it ever meets node 1.
    net.connect(&2, &3, 0);
    net.disconnect(&2, &3, 8);
    net.tick_all(10);

    // Nodes 1 and 2 meet twice without node 2 updating anything in between:
    // the first contact sees the full table, the second (delta) contact has
    // nothing new.
    net.connect(&1, &2, 11);
    net.disconnect(&1, &2, 12);
    let reported = net.engine(&2).utilities_since(12, &1);
    assert!(reported.is_empty());
}

#[test]
fn delivered_messages_are_pruned_on_contact() {
    let net = three_node_net();
    let msg = test_message(7, 1u32, 3u32, 100, 0, ReplicaBudget::Unbounded);

    // Node 2 carries a copy; node 3 (the destination) has taken delivery of
    // another copy.
    net.engine(&2).admitted(msg.clone(), 0);
    net.engine(&3).on_delivered(msg.clone());
    assert_eq!(net.engine(&2).buffer_stats().messages, 1);

    // Their next contact spreads the delivery news and drops the dead copy.
    net.connect(&2, &3, 5);
    assert_eq!(net.engine(&2).buffer_stats().messages, 0);
    assert_eq!(net.engine(&2).delivered_count(), 1);

    // The pruned message can never be re-admitted.
    assert_eq!(
        net.engine(&2).admit(&msg),
        AdmitDecision::Deny(DenyReason::Duplicate)
    );
}

#[test]
fn delivery_news_spreads_transitively() {
    let net = three_node_net();
    let msg = test_message(8, 1u32, 3u32, 100, 0, ReplicaBudget::Unbounded);

    net.engine(&3).on_delivered(msg.clone());

    // 3 tells 2, then 2 tells 1.
    net.connect(&2, &3, 1);
    net.disconnect(&2, &3, 2);
    net.engine(&1).admitted(msg.clone(), 0);
    net.connect(&1, &2, 3);

    assert_eq!(net.engine(&1).buffer_stats().messages, 0);
    assert_eq!(net.engine(&1).delivered_count(), 1);
}
