//! In-memory mock implementations of the engine's collaborator traits.
//!
//! These implement the same traits as the real Redis- and rskafka-backed
//! types, letting tests exercise the rebalancer, fetcher, and persister
//! without a running broker or registry.

use async_trait::async_trait;
use broker::{FetchProducer, OffsetProducer};
use engine_core::{Error, Message, Result};
use parking_lot::Mutex;
use registry::{GroupRegistry, Result as RegistryResult};
use std::collections::HashMap;
use std::time::Duration;

/// In-memory group registry: membership, locks, and offsets all live in
/// plain maps guarded by a mutex. Good enough to drive the rebalancer and
/// persister through their real code paths.
#[derive(Default)]
pub struct MockGroupRegistry {
    members: Mutex<Vec<String>>,
    locks: Mutex<HashMap<String, String>>,
    offsets: Mutex<HashMap<String, i64>>,
    /// Every batch `set_offsets` was called with, in call order.
    pub flushes: Mutex<Vec<Vec<(String, i64)>>>,
}

impl MockGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(members: &[&str]) -> Self {
        let registry = Self::new();
        *registry.members.lock() = members.iter().map(|m| m.to_string()).collect();
        registry
    }

    pub fn with_offset(self, key: &str, offset: i64) -> Self {
        self.offsets.lock().insert(key.to_string(), offset);
        self
    }

    pub fn set_members(&self, members: &[&str]) {
        *self.members.lock() = members.iter().map(|m| m.to_string()).collect();
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.locks.lock().contains_key(key)
    }
}

#[async_trait]
impl GroupRegistry for MockGroupRegistry {
    async fn heartbeat(&self, member_id: &str, _ttl: Duration) -> RegistryResult<()> {
        let mut members = self.members.lock();
        if !members.iter().any(|m| m == member_id) {
            members.push(member_id.to_string());
        }
        Ok(())
    }

    async fn members(&self, _ttl: Duration) -> RegistryResult<Vec<String>> {
        Ok(self.members.lock().clone())
    }

    async fn acquire_lock(&self, key: &str, owner: &str, _ttl: Duration) -> RegistryResult<bool> {
        let mut locks = self.locks.lock();
        match locks.get(key) {
            Some(current) if current != owner => Ok(false),
            _ => {
                locks.insert(key.to_string(), owner.to_string());
                Ok(true)
            }
        }
    }

    async fn release_lock(&self, key: &str, owner: &str) -> RegistryResult<()> {
        let mut locks = self.locks.lock();
        if locks.get(key).map(|o| o.as_str()) == Some(owner) {
            locks.remove(key);
        }
        Ok(())
    }

    async fn get_offset(&self, key: &str) -> RegistryResult<Option<i64>> {
        Ok(self.offsets.lock().get(key).copied())
    }

    async fn set_offset(&self, key: &str, offset: i64) -> RegistryResult<()> {
        self.offsets.lock().insert(key.to_string(), offset);
        self.flushes.lock().push(vec![(key.to_string(), offset)]);
        Ok(())
    }

    async fn set_offsets(&self, pairs: &[(String, i64)]) -> RegistryResult<()> {
        let mut offsets = self.offsets.lock();
        for (key, offset) in pairs {
            offsets.insert(key.clone(), *offset);
        }
        self.flushes.lock().push(pairs.to_vec());
        Ok(())
    }
}

/// Fixed per-partition responses, consumed once per key. A partition with
/// no queued response returns an empty batch; a partition marked to fail
/// returns an error every call.
#[derive(Default)]
pub struct MockFetchProducer {
    responses: Mutex<HashMap<(String, i32), Vec<Message>>>,
    failing: Mutex<Vec<(String, i32)>>,
    /// If set, every `fetch_partition` call sleeps this long before
    /// returning — used to drive the broker-wide timeout path.
    pub stall: Option<Duration>,
}

impl MockFetchProducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, topic: &str, partition: i32, messages: Vec<Message>) -> Self {
        self.responses
            .lock()
            .insert((topic.to_string(), partition), messages);
        self
    }

    pub fn with_failure(self, topic: &str, partition: i32) -> Self {
        self.failing.lock().push((topic.to_string(), partition));
        self
    }

    pub fn stalling(mut self, delay: Duration) -> Self {
        self.stall = Some(delay);
        self
    }
}

#[async_trait]
impl FetchProducer for MockFetchProducer {
    async fn fetch_partition(
        &self,
        topic: &str,
        partition: i32,
        _offset: i64,
        _max_wait: Duration,
    ) -> Result<Vec<Message>> {
        if let Some(delay) = self.stall {
            tokio::time::sleep(delay).await;
        }

        let key = (topic.to_string(), partition);
        if self.failing.lock().contains(&key) {
            return Err(Error::fetch(format!("simulated failure for {topic}/{partition}")));
        }

        Ok(self.responses.lock().remove(&key).unwrap_or_default())
    }
}

/// Fixed initial offsets keyed by `"<topic>/<partition>"`.
#[derive(Default)]
pub struct MockOffsetProducer {
    offsets: HashMap<(String, i32), i64>,
}

impl MockOffsetProducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, topic: &str, partition: i32, offset: i64) -> Self {
        self.offsets.insert((topic.to_string(), partition), offset);
        self
    }
}

#[async_trait]
impl OffsetProducer for MockOffsetProducer {
    async fn initial_offset(&self, topic: &str, partition: i32, use_earliest: bool) -> Result<i64> {
        Ok(self
            .offsets
            .get(&(topic.to_string(), partition))
            .copied()
            .unwrap_or(if use_earliest { 0 } else { i64::MAX }))
    }
}
