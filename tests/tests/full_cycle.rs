//! End-to-end composition of rebalance -> fetch -> merge, matching the
//! single-broker single-member scenario plus the persister's flush-on-close
//! guarantee.

use engine::{fetch_broker, merge_fetch_results, rebalance_topic, FetchCycleResult, OffsetPersister};
use engine_core::Broker;
use integration_tests::fixtures::{message, single_broker_state};
use integration_tests::mocks::{MockFetchProducer, MockGroupRegistry};
use registry::GroupRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn single_member_single_partition_full_cycle() {
    let b = Broker::new("b1", 9092);
    let initial_state = single_broker_state(b.clone(), "x", 1, 5);

    let registry = Arc::new(MockGroupRegistry::new());
    let state_after_rebalance = rebalance_topic(
        &initial_state,
        "x",
        1,
        "member-a",
        registry.as_ref(),
        Duration::from_secs(30),
    )
    .await;

    let owned = engine::flatten(&state_after_rebalance);
    assert_eq!(owned.len(), 1);
    assert!(owned[0].locked);

    let producer = MockFetchProducer::new().with_response(
        "x",
        0,
        vec![message("x", 0, 5), message("x", 0, 6), message("x", 0, 7)],
    );

    let persister_handle = OffsetPersister::spawn(registry.clone(), Duration::from_millis(20));
    let (tx, mut rx) = mpsc::channel(10);

    let outcome = fetch_broker(&producer, &owned, &tx, &persister_handle.persister, Duration::from_secs(5)).await;
    drop(tx);
    assert!(outcome.errors.is_empty());

    let mut received = Vec::new();
    while let Some(msg) = rx.recv().await {
        received.push(msg.offset);
    }
    received.sort();
    assert_eq!(received, vec![5, 6, 7]);

    let results = vec![FetchCycleResult { broker: b.clone(), messages: outcome.messages }];
    let final_state = merge_fetch_results(&state_after_rebalance, &results);
    let updated = engine::get_partition(&final_state, &b, "x", 0).unwrap();
    assert_eq!(updated.offset, 8);

    persister_handle.close().await;

    // The persister's debounced flush eventually lands the checkpoint at
    // last_msg.offset + 1 in the durable store.
    let persisted = registry.get_offset("x/0").await.unwrap();
    assert_eq!(persisted, Some(7));
}
