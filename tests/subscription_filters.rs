#![forbid(unsafe_code)]

use sdn_node::streaming::manager::StreamingManager;
use sdn_node::streaming::session::{DeliveryMode, EncryptionMode};
use sdn_node::streaming::subscription::{SubscriptionConfig, SubscriptionStore};
use sdn_node::streaming::{FieldFilter, FilterOp};
use serde_json::json;
use std::collections::BTreeSet;

fn known_schema(name: &str) -> bool {
    name == "OMM"
}

#[test]
fn only_matching_messages_are_single_delivered_and_counted() {
    let manager = StreamingManager::default();
    let config = SubscriptionConfig {
        data_types: BTreeSet::from(["OMM".to_string()]),
        source_peers: BTreeSet::from(["peerA".to_string(), "peerB".to_string()]),
        filters: vec![FieldFilter { path: "OBJECT_NAME".to_string(), op: FilterOp::Eq, value: json!("ISS") }],
        encrypted: false,
        streaming: false,
        rate_limit: 10,
    };
    let subscription = manager.create_subscription(config, &known_schema).unwrap();
    let (_session_id, _rx) = manager
        .create_session(&subscription.id, "peerA", vec!["OMM".to_string()], DeliveryMode::Single, EncryptionMode::None)
        .unwrap();

    let mut delivered = 0;
    for (schema, data, from_peer) in [
        ("OMM", json!({"OBJECT_NAME": "ISS"}), "peerA"),
        ("OMM", json!({"OBJECT_NAME": "Hubble"}), "peerA"),
        ("OMM", json!({"OBJECT_NAME": "ISS"}), "peerC"),
    ] {
        manager.process_message(schema, &data, b"raw", from_peer, false, |_delivery| delivered += 1);
    }

    assert_eq!(delivered, 1);
    let refreshed = manager.subscriptions().get(&subscription.id).unwrap();
    assert_eq!(refreshed.message_count, 1);
}

#[test]
fn create_rejects_an_unknown_schema_without_mutating_state() {
    let store = SubscriptionStore::new();
    let config = SubscriptionConfig {
        data_types: BTreeSet::from(["NOT_A_SCHEMA".to_string()]),
        source_peers: BTreeSet::from(["all".to_string()]),
        filters: Vec::new(),
        encrypted: false,
        streaming: false,
        rate_limit: 10,
    };
    assert!(store.create(config, &known_schema).is_err());
    assert!(store.active().is_empty());
}

#[test]
fn a_paused_subscription_stops_receiving_deliveries() {
    let manager = StreamingManager::default();
    let config = SubscriptionConfig {
        data_types: BTreeSet::from(["OMM".to_string()]),
        source_peers: BTreeSet::from(["all".to_string()]),
        filters: Vec::new(),
        encrypted: false,
        streaming: false,
        rate_limit: 10,
    };
    let subscription = manager.create_subscription(config, &known_schema).unwrap();
    manager
        .create_session(&subscription.id, "peerA", vec!["OMM".to_string()], DeliveryMode::Single, EncryptionMode::None)
        .unwrap();
    manager.subscriptions().pause(&subscription.id).unwrap();

    let mut delivered = 0;
    manager.process_message("OMM", &json!({"x": 1}), b"raw", "peerA", false, |_delivery| delivered += 1);
    assert_eq!(delivered, 0);
}
