//! Offset producer: earliest/latest offset lookup at bootstrap and rebalance.

use async_trait::async_trait;
use engine_core::{Broker, Error, Result};
use rskafka::client::{
    partition::{OffsetAt, PartitionClient, UnknownTopicHandling},
    Client, ClientBuilder,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Looks up the initial offset for a partition per the `use_earliest` policy.
#[async_trait]
pub trait OffsetProducer: Send + Sync {
    async fn initial_offset(&self, topic: &str, partition: i32, use_earliest: bool) -> Result<i64>;
}

pub struct RskafkaOffsetProducer {
    client: Client,
    partition_clients: RwLock<BTreeMap<(String, i32), Arc<PartitionClient>>>,
}

impl RskafkaOffsetProducer {
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
impl OffsetProducer for RskafkaOffsetProducer {
    async fn initial_offset(&self, topic: &str, partition: i32, use_earliest: bool) -> Result<i64> {
        let client = self.partition_client(topic, partition).await?;

        let at = if use_earliest {
            OffsetAt::Earliest
        } else {
            OffsetAt::Latest
        };

        let offset = client
            .get_offset(at)
            .await
            .map_err(|e| Error::fetch(e.to_string()))?;

        debug!(topic, partition, use_earliest, offset, "resolved initial offset");
        Ok(offset)
    }
}
