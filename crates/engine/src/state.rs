//! The offset state store: a single-writer, nested broker/topic/partition map
//! and the pure transforms over it.

use engine_core::{Broker, Message, PartitionState};
use std::collections::HashMap;

/// Broker -> Topic -> partitions. Single-writer: only the consume loop
/// mutates this; fetchers receive immutable slices.
pub type OffsetState = HashMap<Broker, HashMap<String, Vec<PartitionState>>>;

/// Enumerates every partition across every broker and topic.
pub fn flatten(state: &OffsetState) -> Vec<PartitionState> {
    state
        .values()
        .flat_map(|topics| topics.values().flat_map(|partitions| partitions.iter().cloned()))
        .collect()
}

/// Looks up a single partition's state, if tracked.
pub fn get_partition(
    state: &OffsetState,
    broker: &Broker,
    topic: &str,
    partition: i32,
) -> Option<PartitionState> {
    state
        .get(broker)?
        .get(topic)?
        .iter()
        .find(|p| p.partition == partition)
        .cloned()
}

/// The broker/topic partition list with the named partition removed.
pub fn get_rest(state: &OffsetState, broker: &Broker, topic: &str, partition: i32) -> Vec<PartitionState> {
    state
        .get(broker)
        .and_then(|topics| topics.get(topic))
        .map(|partitions| {
            partitions
                .iter()
                .filter(|p| p.partition != partition)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// The messages fetched for one broker in one cycle.
#[derive(Debug, Clone)]
pub struct FetchCycleResult {
    pub broker: Broker,
    pub messages: Vec<Message>,
}

/// Applies a cycle's successfully fetched messages to the state. Only
/// messages advance offsets; partitions with a `FetchError` this cycle are
/// left untouched here and handled by the error path instead.
pub fn merge_fetch_results(state: &OffsetState, results: &[FetchCycleResult]) -> OffsetState {
    let mut next = state.clone();

    for result in results {
        let Some(topics) = next.get_mut(&result.broker) else {
            continue;
        };

        for message in &result.messages {
            let Some(partitions) = topics.get_mut(&message.topic) else {
                continue;
            };

            if let Some(p) = partitions.iter_mut().find(|p| p.partition == message.partition) {
                p.offset = p.offset.max(message.offset + 1);
                p.error_code = 0;
            }
        }
    }

    next
}
