//! Fetch producer: per-partition record retrieval against a Kafka-compatible
//! broker, with cached partition clients.

use crate::config::tls_config;
use async_trait::async_trait;
use engine_core::{Broker, Error, Message, Result};
use rskafka::client::{
    partition::{PartitionClient, UnknownTopicHandling},
    Client, ClientBuilder,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Fetches records for a single partition. One Fetcher activation (in the
/// engine crate) drives several of these concurrently, one per owned
/// partition on a broker.
#[async_trait]
pub trait FetchProducer: Send + Sync {
    async fn fetch_partition(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
        max_wait: Duration,
    ) -> Result<Vec<Message>>;
}

pub struct RskafkaFetchProducer {
    client: Client,
    partition_clients: RwLock<BTreeMap<(String, i32), Arc<PartitionClient>>>,
}

impl RskafkaFetchProducer {
    pub async fn connect(broker: &Broker) -> Result<Self> {
        let client = ClientBuilder::new(vec![broker.connection_string()])
            .build()
            .await
            .map_err(|e| Error::connect(e.to_string()))?;

        Ok(Self {
            client,
            partition_clients: RwLock::new(BTreeMap::new()),
        })
    }

    pub async fn connect_tls(broker: &Broker) -> Result<Self> {
        let client = ClientBuilder::new(vec![broker.connection_string()])
            .tls_config(tls_config())
            .build()
            .await
            .map_err(|e| Error::connect(e.to_string()))?;

        Ok(Self {
            client,
            partition_clients: RwLock::new(BTreeMap::new()),
        })
    }

    async fn partition_client(&self, topic: &str, partition: i32) -> Result<Arc<PartitionClient>> {
        let key = (topic.to_string(), partition);

        {
            let clients = self.partition_clients.read().await;
            if let Some(c) = clients.get(&key) {
                return Ok(c.clone());
            }
        }

        let client = self
            .client
            .partition_client(topic, partition, UnknownTopicHandling::Error)
            .await
            .map_err(|e| Error::connect(e.to_string()))?;

        let client = Arc::new(client);

        let mut clients = self.partition_clients.write().await;
        clients.insert(key, client.clone());

        Ok(client)
    }
}

#[async_trait]
impl FetchProducer for RskafkaFetchProducer {
    async fn fetch_partition(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
        max_wait: Duration,
    ) -> Result<Vec<Message>> {
        let client = self.partition_client(topic, partition).await?;

        let max_bytes = 1_000_000; // 1 MB per partition per cycle
        let (records, _watermark) = client
            .fetch_records(offset, 1..max_bytes, max_wait.as_millis() as i32)
            .await
            .map_err(|e| {
                warn!(topic, partition, error = %e, "fetch failed");
                Error::fetch(e.to_string())
            })?;

        let messages = records
            .into_iter()
            .map(|record| Message {
                topic: topic.to_string(),
                partition,
                offset: record.offset,
                key: record.record.key,
                value: record.record.value,
            })
            .collect::<Vec<_>>();

        debug!(topic, partition, count = messages.len(), "fetched records");
        Ok(messages)
    }
}
