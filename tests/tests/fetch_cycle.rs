//! Per-broker fetch cycle scenarios: timeouts and partial partition errors.

use engine::{fetch_broker, OffsetPersister};
use engine_core::Broker;
use integration_tests::fixtures::{message, partition};
use integration_tests::mocks::{MockFetchProducer, MockGroupRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Producer returns no message within `fetch_timeout`: the cycle yields a
/// single broker-wide timeout error and emits nothing.
#[tokio::test]
async fn stalled_broker_yields_timeout_error_without_advancing() {
    let producer = MockFetchProducer::new().stalling(Duration::from_millis(200));
    let owned = vec![partition("x", 0, Broker::new("b1", 9092), 5)];

    let registry = Arc::new(MockGroupRegistry::new());
    let persister_handle = OffsetPersister::spawn(registry, Duration::from_secs(3600));
    let (tx, mut rx) = mpsc::channel(10);

    let outcome = fetch_broker(&producer, &owned, &tx, &persister_handle.persister, Duration::from_millis(20)).await;
    drop(tx);

    assert_eq!(outcome.messages.len(), 0);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].is_broker_wide());
    assert!(rx.recv().await.is_none());

    persister_handle.close().await;
}

/// Per-partition error on (x, 0) alongside a successful fetch on (x, 1):
/// partition 0's offset is left untouched while partition 1 advances.
#[tokio::test]
async fn partial_partition_error_does_not_block_healthy_partitions() {
    let broker = Broker::new("b1", 9092);
    let producer = MockFetchProducer::new()
        .with_failure("x", 0)
        .with_response("x", 1, vec![message("x", 1, 10), message("x", 1, 11)]);

    let owned = vec![
        partition("x", 0, broker.clone(), 5),
        partition("x", 1, broker, 10),
    ];

    let registry = Arc::new(MockGroupRegistry::new());
    let persister_handle = OffsetPersister::spawn(registry, Duration::from_secs(3600));
    let (tx, mut rx) = mpsc::channel(10);

    let outcome = fetch_broker(&producer, &owned, &tx, &persister_handle.persister, Duration::from_secs(5)).await;
    drop(tx);

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].topic.as_deref(), Some("x"));
    assert_eq!(outcome.errors[0].partition, Some(0));

    let mut received = Vec::new();
    while let Some(msg) = rx.recv().await {
        received.push((msg.partition, msg.offset));
    }
    received.sort();
    assert_eq!(received, vec![(1, 10), (1, 11)]);

    persister_handle.close().await;
}
