//! Partition-assignment scenarios against the rebalancer.

use engine::rebalance_topic;
use integration_tests::fixtures::{broker, single_broker_state};
use integration_tests::mocks::MockGroupRegistry;
use registry::GroupRegistry;
use std::time::Duration;

fn locked_count(state: &engine::OffsetState) -> usize {
    engine::flatten(state).into_iter().filter(|p| p.locked).count()
}

/// Single broker, single topic with one partition, one member: the lone
/// member acquires the only partition and its offset is refreshed from the
/// durable store.
#[tokio::test]
async fn single_member_acquires_sole_partition() {
    let b = broker("b1", 9092);
    let state = single_broker_state(b, "x", 1, 5);
    let registry = MockGroupRegistry::new().with_offset("x/0", 4);

    let next = rebalance_topic(&state, "x", 1, "member-a", &registry, Duration::from_secs(30)).await;

    let partitions = engine::flatten(&next);
    assert_eq!(partitions.len(), 1);
    assert!(partitions[0].locked);
    assert_eq!(partitions[0].offset, 5); // persisted(4) + 1
}

/// Two members, one topic, two partitions: against a shared registry, each
/// member's own rebalance acquires exactly one partition and the two don't
/// collide.
#[tokio::test]
async fn two_members_split_two_partitions_evenly() {
    let b = broker("b1", 9092);
    let registry = MockGroupRegistry::new();

    let state_a = single_broker_state(b.clone(), "x", 2, 0);
    let state_b = single_broker_state(b, "x", 2, 0);

    let after_a = rebalance_topic(&state_a, "x", 2, "member-a", &registry, Duration::from_secs(30)).await;
    assert_eq!(locked_count(&after_a), 1);

    let after_b = rebalance_topic(&state_b, "x", 2, "member-b", &registry, Duration::from_secs(30)).await;
    assert_eq!(locked_count(&after_b), 1);

    let a_partition = engine::flatten(&after_a).into_iter().find(|p| p.locked).unwrap().partition;
    let b_partition = engine::flatten(&after_b).into_iter().find(|p| p.locked).unwrap().partition;
    assert_ne!(a_partition, b_partition, "members must not both own the same partition");
}

/// Member joins mid-stream: the incumbent releases down to its even share.
#[tokio::test]
async fn member_join_triggers_release_on_incumbent() {
    let b = broker("b1", 9092);
    let mut state = single_broker_state(b, "x", 2, 0);
    for partitions in state.values_mut().flat_map(|t| t.values_mut()) {
        for p in partitions.iter_mut() {
            p.locked = true;
        }
    }

    let registry = MockGroupRegistry::new();
    // Member A currently owns both partitions; a second member has joined.
    let next = rebalance_topic(&state, "x", 2, "member-a", &registry, Duration::from_secs(30)).await;

    assert_eq!(locked_count(&next), 1, "member-a should release one partition");
}

/// A lock held by another member leaves that partition unlocked in this
/// member's own state; the attempt is retried on the next cycle.
#[tokio::test]
async fn contested_lock_leaves_partition_unlocked() {
    let b = broker("b1", 9092);
    let state = single_broker_state(b, "x", 1, 0);
    let registry = MockGroupRegistry::new();

    // member-b grabs the lock first.
    registry
        .acquire_lock("x/0", "member-b", Duration::from_secs(30))
        .await
        .unwrap();

    let next = rebalance_topic(&state, "x", 1, "member-a", &registry, Duration::from_secs(30)).await;
    assert_eq!(locked_count(&next), 0);
}

/// After a reconnect, in-memory state resets every partition to unlocked,
/// but the registry still records this member as the owner. Re-acquiring
/// its own lock must succeed rather than blocking on NX against itself.
#[tokio::test]
async fn member_reacquires_its_own_lock_after_reconnect_reset() {
    let b = broker("b1", 9092);
    let registry = MockGroupRegistry::new();

    registry
        .acquire_lock("x/0", "member-a", Duration::from_secs(30))
        .await
        .unwrap();

    // bootstrap_state after a reconnect rebuilds with locked: false for every partition.
    let state = single_broker_state(b, "x", 1, 0);
    let next = rebalance_topic(&state, "x", 1, "member-a", &registry, Duration::from_secs(30)).await;

    assert_eq!(locked_count(&next), 1, "member-a should reclaim the partition it already owns");
}
