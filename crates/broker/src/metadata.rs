//! Cluster metadata lookup: which broker leads each partition.
//!
//! `rskafka`'s `list_topics` exposes partition counts but not per-partition
//! leader addresses; real leader routing happens inside `Client::partition_client`,
//! which resolves the leader internally on every call. To give the rebalancer
//! and offset state store something concrete to key on, we assign each
//! partition a synthetic leader by round-robining the configured bootstrap
//! brokers. Actual fetches still go through rskafka's own leader discovery;
//! this assignment only decides how partitions are grouped into per-broker
//! fetch cycles.

use engine_core::{Broker, Error, Result};
use rskafka::client::ClientBuilder;
use std::collections::HashMap;
use tracing::{debug, warn};

fn parse_broker(addr: &str) -> Option<Broker> {
    let (host, port) = addr.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    Some(Broker::new(host, port))
}

/// Looks up partition counts for `topics` and assigns each partition a
/// broker from `bootstrap_brokers`, round-robin.
///
/// Returns `Err(Error::NoMetadata)` if no topic in `topics` is found, matching
/// the "metadata fetch empty" fatal-at-startup behavior.
pub async fn get_metadata(
    bootstrap_brokers: &[String],
    topics: &[String],
) -> Result<HashMap<String, Vec<Broker>>> {
    let brokers: Vec<Broker> = bootstrap_brokers
        .iter()
        .filter_map(|s| parse_broker(s))
        .collect();

    if brokers.is_empty() {
        return Err(Error::config("no valid bootstrap brokers configured"));
    }

    let client = ClientBuilder::new(bootstrap_brokers.to_vec())
        .build()
        .await
        .map_err(|e| Error::connect(e.to_string()))?;

    let existing = client
        .list_topics()
        .await
        .map_err(|e| Error::connect(e.to_string()))?;

    let mut result = HashMap::new();

    for topic_name in topics {
        let Some(topic) = existing.iter().find(|t| &t.name == topic_name) else {
            warn!(topic = %topic_name, "topic not found in cluster metadata");
            continue;
        };

        let partition_count = topic.partitions.len();
        let assigned: Vec<Broker> = (0..partition_count)
            .map(|i| brokers[i % brokers.len()].clone())
            .collect();

        debug!(
            topic = %topic_name,
            partitions = partition_count,
            "resolved partition-to-broker assignment"
        );

        result.insert(topic_name.clone(), assigned);
    }

    if result.is_empty() {
        return Err(Error::NoMetadata);
    }

    Ok(result)
}
