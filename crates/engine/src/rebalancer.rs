//! Rebalancer: partition-assignment arithmetic and distributed lock
//! acquisition/release against live group membership.

use crate::state::OffsetState;
use engine_core::PartitionState;
use registry::GroupRegistry;
use std::time::Duration;
use telemetry::metrics;
use tracing::{debug, warn};

/// Rebalances one topic's partitions against the current membership count,
/// acquiring or releasing distributed locks as needed and refreshing offsets
/// for newly acquired partitions from the durable store.
///
/// Assignment: for `P` partitions across `M` live members, each member
/// targets `E = P / M` partitions, with up to `L = P mod M` spares
/// available first-come-first-served. A failed lock acquisition is not an
/// error: the partition is simply left unlocked for this cycle and retried
/// on the next one.
pub async fn rebalance_topic(
    state: &OffsetState,
    topic: &str,
    member_count: usize,
    member_id: &str,
    registry: &dyn GroupRegistry,
    lock_ttl: Duration,
) -> OffsetState {
    let partitions: Vec<PartitionState> = crate::state::flatten(state)
        .into_iter()
        .filter(|p| p.topic == topic)
        .collect();

    let total = partitions.len();
    if total == 0 || member_count == 0 {
        return state.clone();
    }

    let even_share = total / member_count;
    let spares = total % member_count;

    let locked: Vec<&PartitionState> = partitions.iter().filter(|p| p.locked).collect();
    let unlocked: Vec<&PartitionState> = partitions.iter().filter(|p| !p.locked).collect();
    let currently_locked = locked.len();

    let mut to_release = Vec::new();
    let mut candidates = Vec::new();
    let mut needed = 0;

    if currently_locked > even_share {
        let release_count = currently_locked - even_share;
        to_release.extend(locked.iter().take(release_count).map(|p| (*p).clone()));
    } else if even_share > currently_locked {
        needed = (even_share - currently_locked + spares).min(unlocked.len());
        candidates.extend(unlocked.iter().map(|p| (*p).clone()));
    }

    let mut updates: Vec<PartitionState> = Vec::new();

    for mut partition in to_release {
        let key = partition.lock_key();
        if let Err(e) = registry.release_lock(&key, member_id).await {
            warn!(key = %key, error = %e, "failed to release partition lock");
        }
        partition.locked = false;
        metrics().partitions_released.inc();
        debug!(key = %key, "released partition");
        updates.push(partition);
    }

    // Contested locks fall through to the next candidate rather than
    // stalling this member on whichever partition happened to be first;
    // otherwise a busy topic could starve a member indefinitely.
    let mut acquired = 0;
    for mut partition in candidates {
        if acquired >= needed {
            break;
        }

        let key = partition.lock_key();
        match registry.acquire_lock(&key, member_id, lock_ttl).await {
            Ok(true) => {
                if let Ok(Some(persisted)) = registry.get_offset(&key).await {
                    partition.offset = persisted + 1;
                }
                partition.locked = true;
                metrics().partitions_acquired.inc();
                debug!(key = %key, offset = partition.offset, "acquired partition");
                updates.push(partition);
                acquired += 1;
            }
            Ok(false) => {
                // Another member holds it; try the next candidate.
            }
            Err(e) => {
                metrics().lock_acquire_failures.inc();
                warn!(key = %key, error = %e, "failed to acquire partition lock");
            }
        }
    }

    apply_updates(state, &updates)
}

fn apply_updates(state: &OffsetState, updates: &[PartitionState]) -> OffsetState {
    let mut next = state.clone();

    for update in updates {
        for topics in next.values_mut() {
            if let Some(partitions) = topics.get_mut(&update.topic) {
                if let Some(p) = partitions.iter_mut().find(|p| p.partition == update.partition) {
                    *p = update.clone();
                }
            }
        }
    }

    next
}
