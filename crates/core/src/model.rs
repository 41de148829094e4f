//! Data model for the coordination engine: brokers, partitions, messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A message broker's address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Broker {
    pub host: String,
    pub port: u16,
}

impl Broker {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn connection_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The canonical per-partition record: who leads it, what we've consumed,
/// and whether this member currently owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionState {
    pub topic: String,
    pub partition: i32,
    pub broker: Broker,
    /// Next offset to fetch (one past the last consumed offset).
    pub offset: i64,
    pub locked: bool,
    /// 0 means healthy.
    pub error_code: i32,
}

impl PartitionState {
    pub fn new(topic: impl Into<String>, partition: i32, broker: Broker, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            broker,
            offset,
            locked: false,
            error_code: 0,
        }
    }

    /// The registry key this partition's offset is persisted under.
    pub fn lock_key(&self) -> String {
        lock_key(&self.topic, self.partition)
    }
}

/// Builds the `"<topic>/<partition>"` registry key used for both locks and
/// persisted offsets.
pub fn lock_key(topic: &str, partition: i32) -> String {
    format!("{}/{}", topic, partition)
}

/// A decoded record fetched from a partition, emitted unchanged on the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

/// A fetch failure. Per-partition errors carry `topic`/`partition`;
/// broker-wide errors (timeout, transport failure) leave both `None`
/// since they aren't attributable to one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchError {
    pub topic: Option<String>,
    pub partition: Option<i32>,
    pub error_code: i32,
    pub message: String,
}

impl FetchError {
    pub fn for_partition(topic: impl Into<String>, partition: i32, error_code: i32) -> Self {
        Self {
            topic: Some(topic.into()),
            partition: Some(partition),
            error_code,
            message: format!("fetch error code {error_code}"),
        }
    }

    pub fn broker_wide(message: impl Into<String>) -> Self {
        Self {
            topic: None,
            partition: None,
            error_code: -1,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::broker_wide("timeout")
    }

    pub fn is_broker_wide(&self) -> bool {
        self.topic.is_none()
    }
}
