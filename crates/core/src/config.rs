//! Engine configuration.

use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize brokers as either a comma-separated string or a list.
fn deserialize_brokers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct BrokersVisitor;

    impl<'de> Visitor<'de> for BrokersVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a comma-separated string or a list of broker addresses")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.split(',').map(|s| s.trim().to_string()).collect())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut brokers = Vec::new();
            while let Some(broker) = seq.next_element::<String>()? {
                brokers.push(broker);
            }
            Ok(brokers)
        }
    }

    deserializer.deserialize_any(BrokersVisitor)
}

fn deserialize_topics<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_brokers(deserializer)
}

/// Redis-backed group registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConf {
    #[serde(default = "default_redis_host")]
    pub redis_host: String,
    #[serde(default = "default_heart_beat_freq")]
    pub heart_beat_freq: u64,
}

fn default_redis_host() -> String {
    "localhost".to_string()
}

fn default_heart_beat_freq() -> u64 {
    10
}

impl Default for RedisConf {
    fn default() -> Self {
        Self {
            redis_host: default_redis_host(),
            heart_beat_freq: default_heart_beat_freq(),
        }
    }
}

/// Top-level configuration for the consumer coordination engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bootstrap broker addresses (comma-separated string or list).
    #[serde(deserialize_with = "deserialize_brokers", default = "default_brokers")]
    pub brokers: Vec<String>,

    /// Topics subscribed to (comma-separated string or list).
    #[serde(deserialize_with = "deserialize_topics", default)]
    pub topics: Vec<String>,

    /// Persister debounce interval.
    #[serde(default = "default_offset_commit_freq_ms")]
    pub offset_commit_freq_ms: u64,

    /// Per-broker fetch cycle deadline.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Idle-cycle sleep when a cycle produced no messages.
    #[serde(default = "default_fetch_poll_ms")]
    pub fetch_poll_ms: u64,

    /// Initial offset policy: true = earliest, false = latest.
    #[serde(default = "default_use_earliest")]
    pub use_earliest: bool,

    /// Group member identity. Derived if absent.
    pub host_name: Option<String>,

    #[serde(default)]
    pub redis_conf: RedisConf,
}

fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_offset_commit_freq_ms() -> u64 {
    5000
}

fn default_fetch_timeout_ms() -> u64 {
    60_000
}

fn default_fetch_poll_ms() -> u64 {
    10_000
}

fn default_use_earliest() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topics: Vec::new(),
            offset_commit_freq_ms: default_offset_commit_freq_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            fetch_poll_ms: default_fetch_poll_ms(),
            use_earliest: default_use_earliest(),
            host_name: None,
            redis_conf: RedisConf::default(),
        }
    }
}

impl EngineConfig {
    /// This member's identity: the configured host name, or a generated one.
    pub fn member_id(&self) -> String {
        self.host_name
            .clone()
            .unwrap_or_else(|| format!("member-{}", uuid_like()))
    }

    pub fn offset_commit_freq(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.offset_commit_freq_ms)
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn fetch_poll(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.fetch_poll_ms)
    }
}

/// A short suffix derived from the current time, used to give a default
/// member id some uniqueness when no `host_name` is configured.
fn uuid_like() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{:x}", nanos & 0xffff_ffff)
}
