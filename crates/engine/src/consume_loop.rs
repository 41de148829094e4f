//! Consume loop: the top-level orchestrator. Rebalances ownership, fetches
//! every owned broker in parallel, folds results back into the offset
//! state, and reconnects wholesale on any fetch-cycle error.

use crate::fetcher::fetch_broker;
use crate::persister::OffsetPersister;
use crate::rebalancer::rebalance_topic;
use crate::state::{flatten, merge_fetch_results, FetchCycleResult, OffsetState};
use broker::{get_metadata, FetchProducer, OffsetProducer, RskafkaFetchProducer, RskafkaOffsetProducer};
use engine_core::{Broker, EngineConfig, Message, PartitionState};
use futures::future::join_all;
use registry::GroupRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const MESSAGE_CHANNEL_DEPTH: usize = 100;

/// What the embedding application gets back from spawning a [`ConsumeLoop`].
pub struct ConsumerHandle {
    pub message_channel: mpsc::Receiver<Message>,
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl ConsumerHandle {
    /// Halts the background loop at its next suspension point, closes all
    /// producers, and closes the persister. In-flight fetches are abandoned;
    /// anything already emitted on `message_channel` remains delivered.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.join.await;
    }

    /// Blocks on `message_channel` up to an optional timeout.
    pub async fn read_msg(&mut self, timeout: Option<Duration>) -> Option<Message> {
        match timeout {
            Some(t) => tokio::time::timeout(t, self.message_channel.recv())
                .await
                .ok()
                .flatten(),
            None => self.message_channel.recv().await,
        }
    }
}

/// The background orchestrator. Construct with [`ConsumeLoop::new`] and
/// hand off to a task with [`ConsumeLoop::spawn`].
pub struct ConsumeLoop {
    brokers: Vec<String>,
    topics: Vec<String>,
    member_id: String,
    registry: Arc<dyn GroupRegistry>,
    fetch_timeout: Duration,
    fetch_poll: Duration,
    offset_commit_freq: Duration,
    lock_ttl: Duration,
    use_earliest: bool,
}

impl ConsumeLoop {
    pub fn new(config: &EngineConfig, registry: Arc<dyn GroupRegistry>) -> Self {
        Self {
            brokers: config.brokers.clone(),
            topics: config.topics.clone(),
            member_id: config.member_id(),
            registry,
            fetch_timeout: config.fetch_timeout(),
            fetch_poll: config.fetch_poll(),
            offset_commit_freq: config.offset_commit_freq(),
            lock_ttl: Duration::from_secs(config.redis_conf.heart_beat_freq * 3),
            use_earliest: config.use_earliest,
        }
    }

    /// Spawns the background task and returns the consumer-facing handle.
    pub fn spawn(self) -> ConsumerHandle {
        let (tx, rx) = mpsc::channel(MESSAGE_CHANNEL_DEPTH);
        let shutdown = Arc::new(Notify::new());
        let shutdown_for_task = shutdown.clone();

        let join = tokio::spawn(async move {
            self.run(tx, shutdown_for_task).await;
        });

        ConsumerHandle { message_channel: rx, shutdown, join }
    }

    async fn build_producers(&self) -> HashMap<Broker, Arc<dyn FetchProducer>> {
        let metadata = match get_metadata(&self.brokers, &self.topics).await {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "failed to resolve cluster metadata");
                return HashMap::new();
            }
        };

        let mut all_brokers: Vec<Broker> = metadata.values().flatten().cloned().collect();
        all_brokers.sort();
        all_brokers.dedup();

        let mut producers: HashMap<Broker, Arc<dyn FetchProducer>> = HashMap::new();
        for b in all_brokers {
            match RskafkaFetchProducer::connect(&b).await {
                Ok(p) => {
                    producers.insert(b, Arc::new(p));
                }
                Err(e) => {
                    warn!(broker = %b, error = %e, "failed to connect fetch producer");
                }
            }
        }
        producers
    }

    /// Builds the initial offset state: resolves metadata, then probes the
    /// initial offset for every partition per `use_earliest`.
    async fn bootstrap_state(
        &self,
        producers: &HashMap<Broker, Arc<dyn FetchProducer>>,
    ) -> engine_core::Result<OffsetState> {
        let metadata = get_metadata(&self.brokers, &self.topics).await?;
        let mut state: OffsetState = HashMap::new();

        for (topic, brokers_per_partition) in &metadata {
            for (partition, b) in brokers_per_partition.iter().enumerate() {
                if !producers.contains_key(b) {
                    continue;
                }

                let offset_producer = RskafkaOffsetProducer::connect(b).await?;
                let offset = offset_producer
                    .initial_offset(topic, partition as i32, self.use_earliest)
                    .await?;

                state
                    .entry(b.clone())
                    .or_default()
                    .entry(topic.clone())
                    .or_default()
                    .push(PartitionState::new(topic.clone(), partition as i32, b.clone(), offset));
            }
        }

        Ok(state)
    }

    async fn run(self, output: mpsc::Sender<Message>, shutdown: Arc<Notify>) {
        let persister_handle = OffsetPersister::spawn(self.registry.clone(), self.offset_commit_freq);

        let mut producers = self.build_producers().await;
        let mut offset_state = match self.bootstrap_state(&producers).await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to bootstrap offset state; consumer cannot start");
                persister_handle.close().await;
                return;
            }
        };

        loop {
            if shutdown_requested(&shutdown).await {
                break;
            }

            let members = match self.registry.members(self.lock_ttl).await {
                Ok(m) if !m.is_empty() => m,
                Ok(_) => vec![self.member_id.clone()],
                Err(e) => {
                    warn!(error = %e, "failed to list group members; assuming solitary membership");
                    vec![self.member_id.clone()]
                }
            };
            metrics().known_members.set(members.len() as u64);

            let rebalance_start = Instant::now();
            let mut state_after_rebalance = offset_state.clone();
            for topic in &self.topics {
                state_after_rebalance = rebalance_topic(
                    &state_after_rebalance,
                    topic,
                    members.len(),
                    &self.member_id,
                    self.registry.as_ref(),
                    self.lock_ttl,
                )
                .await;
            }
            metrics().rebalance_cycles.inc();
            metrics().rebalance_latency_ms.observe(rebalance_start.elapsed().as_millis() as u64);

            let owned_count = flatten(&state_after_rebalance).into_iter().filter(|p| p.locked).count();
            metrics().owned_partitions.set(owned_count as u64);

            let cycle_start = Instant::now();
            let mut fetches = Vec::new();
            for (b, producer) in &producers {
                let owned: Vec<PartitionState> = flatten(&state_after_rebalance)
                    .into_iter()
                    .filter(|p| p.locked && &p.broker == b)
                    .collect();

                if owned.is_empty() {
                    continue;
                }

                let producer = producer.clone();
                let broker = b.clone();
                let output = output.clone();
                let persister = persister_handle.persister.clone();
                let fetch_timeout = self.fetch_timeout;

                fetches.push(async move {
                    let outcome = fetch_broker(producer.as_ref(), &owned, &output, &persister, fetch_timeout).await;
                    (broker, outcome)
                });
            }

            let cycle_results = join_all(fetches).await;
            metrics().fetch_cycle_ms.observe(cycle_start.elapsed().as_millis() as u64);

            let mut errors = Vec::new();
            let mut results = Vec::new();
            let mut total_messages = 0usize;

            for (b, outcome) in cycle_results {
                total_messages += outcome.messages.len();
                if !outcome.errors.is_empty() {
                    errors.extend(outcome.errors);
                }
                results.push(FetchCycleResult { broker: b, messages: outcome.messages });
            }

            if !errors.is_empty() {
                metrics().fetch_errors.inc_by(errors.len() as u64);
                warn!(count = errors.len(), "fetch cycle produced errors; reconnecting");

                for err in &errors {
                    if let (Some(topic), Some(partition)) = (&err.topic, err.partition) {
                        if let Some(p) = find_partition(&state_after_rebalance, topic, partition) {
                            persister_handle.persister.send(p.lock_key(), p.offset);
                        }
                    }
                }
                // Make the checkpoint durable before rebuilding state: the next
                // rebalance's get_offset read must see it, not race the debounce timer.
                persister_handle.persister.flush().await;

                metrics().reconnects.inc();
                producers = self.build_producers().await;
                offset_state = match self.bootstrap_state(&producers).await {
                    Ok(s) => s,
                    Err(e) => {
                        error!(error = %e, "failed to rebuild offset state after reconnect");
                        state_after_rebalance
                    }
                };
                continue;
            }

            offset_state = merge_fetch_results(&state_after_rebalance, &results);
            metrics().messages_consumed.inc_by(total_messages as u64);

            if total_messages == 0 {
                metrics().empty_cycles.inc();
                tokio::select! {
                    _ = tokio::time::sleep(self.fetch_poll) => {}
                    _ = shutdown.notified() => break,
                }
            }
        }

        info!("consume loop shutting down");
        persister_handle.close().await;
    }
}

fn find_partition(state: &OffsetState, topic: &str, partition: i32) -> Option<PartitionState> {
    state
        .values()
        .filter_map(|topics| topics.get(topic))
        .flatten()
        .find(|p| p.partition == partition)
        .cloned()
}

/// Non-blocking check for a pending shutdown notification: `notify_one`
/// stores a permit when nothing is awaiting, so a pending signal resolves
/// `notified()` immediately and this returns without yielding.
async fn shutdown_requested(shutdown: &Notify) -> bool {
    tokio::select! {
        _ = shutdown.notified() => true,
        _ = std::future::ready(()) => false,
    }
}
