//! Test fixtures: small builders for the coordination engine's data model.

use engine_core::{Broker, Message, PartitionState};
use std::collections::HashMap;

pub fn broker(host: &str, port: u16) -> Broker {
    Broker::new(host, port)
}

pub fn partition(topic: &str, partition: i32, broker: Broker, offset: i64) -> PartitionState {
    PartitionState::new(topic, partition, broker, offset)
}

pub fn message(topic: &str, partition: i32, offset: i64) -> Message {
    Message {
        topic: topic.to_string(),
        partition,
        offset,
        key: None,
        value: None,
    }
}

/// A single-broker, single-topic state with `partitions` partitions, all
/// unlocked, starting at `offset`.
pub fn single_broker_state(
    broker: Broker,
    topic: &str,
    partitions: i32,
    offset: i64,
) -> engine::OffsetState {
    let states: Vec<PartitionState> = (0..partitions)
        .map(|i| PartitionState::new(topic, i, broker.clone(), offset))
        .collect();

    let mut topics = HashMap::new();
    topics.insert(topic.to_string(), states);

    let mut state = HashMap::new();
    state.insert(broker, topics);
    state
}
