//! Internal metrics collection for the coordination engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the coordination engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Fetch cycle metrics
    pub messages_consumed: Counter,
    pub fetch_errors: Counter,
    pub fetch_timeouts: Counter,
    pub empty_cycles: Counter,

    // Offset persistence metrics
    pub persister_flushes: Counter,
    pub persister_flush_errors: Counter,

    // Rebalance metrics
    pub rebalance_cycles: Counter,
    pub partitions_acquired: Counter,
    pub partitions_released: Counter,
    pub lock_acquire_failures: Counter,

    // Reconnect metrics
    pub reconnects: Counter,

    // Latency histograms
    pub fetch_cycle_ms: Histogram,
    pub persist_latency_ms: Histogram,
    pub rebalance_latency_ms: Histogram,

    // Gauges
    pub owned_partitions: Gauge,
    pub known_members: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub messages_consumed: u64,
    pub fetch_errors: u64,
    pub fetch_timeouts: u64,
    pub empty_cycles: u64,
    pub persister_flushes: u64,
    pub persister_flush_errors: u64,
    pub rebalance_cycles: u64,
    pub partitions_acquired: u64,
    pub partitions_released: u64,
    pub lock_acquire_failures: u64,
    pub reconnects: u64,
    pub fetch_cycle_mean_ms: f64,
    pub persist_latency_mean_ms: f64,
    pub rebalance_latency_mean_ms: f64,
    pub owned_partitions: u64,
    pub known_members: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            messages_consumed: self.messages_consumed.get(),
            fetch_errors: self.fetch_errors.get(),
            fetch_timeouts: self.fetch_timeouts.get(),
            empty_cycles: self.empty_cycles.get(),
            persister_flushes: self.persister_flushes.get(),
            persister_flush_errors: self.persister_flush_errors.get(),
            rebalance_cycles: self.rebalance_cycles.get(),
            partitions_acquired: self.partitions_acquired.get(),
            partitions_released: self.partitions_released.get(),
            lock_acquire_failures: self.lock_acquire_failures.get(),
            reconnects: self.reconnects.get(),
            fetch_cycle_mean_ms: self.fetch_cycle_ms.mean(),
            persist_latency_mean_ms: self.persist_latency_ms.mean(),
            rebalance_latency_mean_ms: self.rebalance_latency_ms.mean(),
            owned_partitions: self.owned_partitions.get(),
            known_members: self.known_members.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
