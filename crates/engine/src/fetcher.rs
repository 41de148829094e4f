//! Broker fetcher: one activation per (broker, cycle). Fetches every owned
//! partition on a broker concurrently, emits new messages to the output
//! channel, and tells the persister about each advance.

use crate::persister::OffsetPersister;
use broker::FetchProducer;
use engine_core::{FetchError, Message, PartitionState};
use futures::future::join_all;
use std::collections::HashMap;
use std::time::Duration;
use telemetry::metrics;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// What one broker's fetch cycle produced.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub messages: Vec<Message>,
    pub errors: Vec<FetchError>,
}

/// Fetches every partition in `owned` against `producer`, bounded by
/// `fetch_timeout`. New messages are emitted on `output` and reported to
/// `persister`; duplicates within the same partition's response are
/// suppressed but every genuinely new message is still emitted once.
pub async fn fetch_broker(
    producer: &dyn FetchProducer,
    owned: &[PartitionState],
    output: &mpsc::Sender<Message>,
    persister: &OffsetPersister,
    fetch_timeout: Duration,
) -> FetchOutcome {
    let fetches = owned.iter().map(|partition| {
        let topic = partition.topic.clone();
        let partition_id = partition.partition;
        let offset = partition.offset;
        async move {
            let result = producer
                .fetch_partition(&topic, partition_id, offset, fetch_timeout)
                .await;
            (topic, partition_id, result)
        }
    });

    let joined = tokio::time::timeout(fetch_timeout, join_all(fetches)).await;

    let per_partition = match joined {
        Ok(results) => results,
        Err(_) => {
            metrics().fetch_timeouts.inc();
            warn!(fetch_timeout_ms = fetch_timeout.as_millis() as u64, "broker fetch cycle timed out");
            return FetchOutcome {
                messages: Vec::new(),
                errors: vec![FetchError::timeout()],
            };
        }
    };

    let mut outcome = FetchOutcome::default();
    let mut response_so_far: HashMap<(String, i32), Message> = HashMap::new();

    for (topic, partition_id, result) in per_partition {
        let owned_offset = owned
            .iter()
            .find(|p| p.topic == topic && p.partition == partition_id)
            .map(|p| p.offset);

        match result {
            Ok(messages) => {
                for message in messages {
                    let key = (message.topic.clone(), message.partition);
                    let latest_seen = response_so_far
                        .get(&key)
                        .map(|m| m.offset)
                        .or_else(|| owned_offset.map(|o| o - 1));

                    let Some(latest_seen) = latest_seen else {
                        error!(topic = %message.topic, partition = message.partition, "no known offset for fetched message; dropping");
                        continue;
                    };

                    let is_new = message.offset > latest_seen || message.offset == 0;
                    if !is_new {
                        continue;
                    }

                    response_so_far.insert(key.clone(), message.clone());
                    persister.send(format!("{}/{}", key.0, key.1), message.offset);

                    if output.send(message).await.is_err() {
                        warn!("output channel closed; dropping remaining messages for this cycle");
                        break;
                    }
                }
            }
            Err(e) => {
                warn!(topic = %topic, partition = partition_id, error = %e, "partition fetch failed");
                outcome.errors.push(FetchError::for_partition(topic, partition_id, -1));
            }
        }
    }

    outcome.messages = response_so_far.into_values().collect();
    outcome
}
