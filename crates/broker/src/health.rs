//! Broker connectivity health checks.

use rskafka::client::ClientBuilder;
use tracing::{debug, error};

/// Checks that the bootstrap brokers are reachable.
pub async fn check_connection(brokers: &[String]) -> bool {
    let connection = brokers.join(",");

    match ClientBuilder::new(vec![connection]).build().await {
        Ok(client) => match client.list_topics().await {
            Ok(topics) => {
                debug!(topics = topics.len(), "broker connection healthy");
                true
            }
            Err(e) => {
                error!("failed to list topics: {}", e);
                false
            }
        },
        Err(e) => {
            error!("failed to connect to brokers: {}", e);
            false
        }
    }
}

/// Returns the subset of `topics` that do not currently exist on the cluster.
pub async fn verify_topics(brokers: &[String], topics: &[String]) -> Vec<String> {
    let connection = brokers.join(",");

    match ClientBuilder::new(vec![connection]).build().await {
        Ok(client) => match client.list_topics().await {
            Ok(existing) => {
                let existing: std::collections::HashSet<_> =
                    existing.iter().map(|t| t.name.as_str()).collect();

                topics
                    .iter()
                    .filter(|t| !existing.contains(t.as_str()))
                    .cloned()
                    .collect()
            }
            Err(_) => topics.to_vec(),
        },
        Err(_) => topics.to_vec(),
    }
}
