//! The deferred-retry queue for `MOD`/`DEL`/`LINK` receives whose
//! precondition record is missing locally: rather than failing outright,
//! the receive is parked here and replayed once the record shows up.
//!
//! Bounded: 3 attempts, exponential backoff starting at 100ms, 30s TTL after
//! which the item is dropped and logged rather than retried forever. Items
//! that exhaust their attempt budget are logged and dropped the same way.

use ribochain_types::{Hash, PeerId};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 3;
const TTL: Duration = Duration::from_secs(30);

/// Enough of the original `MOD`/`DEL`/`LINK_REQUEST` to replay the receive
/// once its precondition hash is `PUT`.
#[derive(Clone, Debug)]
pub enum RetryReason {
    Mod { new_hash: Hash, source: PeerId },
    Del { by: Hash, source: PeerId },
    Link { links_hash: Hash, source: PeerId },
}

#[derive(Debug)]
struct Pending {
    reason: RetryReason,
    attempts: u32,
    created_at: Instant,
    next_attempt_at: Instant,
}

fn backoff(attempts: u32) -> Duration {
    Duration::from_millis(100 * 4u64.pow(attempts.min(2)))
}

/// Keyed by the hash the receive handler was missing (the MOD/DEL target,
/// or the LINK base).
#[derive(Default)]
pub struct RetryQueue {
    pending: Mutex<HashMap<Hash, Vec<Pending>>>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueue(&self, missing_hash: Hash, reason: RetryReason) {
        let now = Instant::now();
        let entry = Pending {
            reason,
            attempts: 0,
            created_at: now,
            next_attempt_at: now + backoff(0),
        };
        self.pending.lock().await.entry(missing_hash).or_default().push(entry);
    }

    /// Pull every item for `hash` that is due for a retry attempt and has
    /// not exceeded its attempt budget or TTL. Expired or attempt-exhausted
    /// items are dropped here and logged at the point they're dropped.
    pub async fn due(&self, hash: &Hash) -> Vec<RetryReason> {
        let now = Instant::now();
        let mut pending = self.pending.lock().await;
        let Some(items) = pending.get_mut(hash) else {
            return Vec::new();
        };
        items.retain(|p| {
            let alive = now.duration_since(p.created_at) < TTL;
            if !alive {
                warn!(%hash, reason = ?p.reason, "deferred retry expired, dropping");
            }
            alive
        });
        let mut due = Vec::new();
        for item in items.iter_mut() {
            if item.attempts < MAX_ATTEMPTS && now >= item.next_attempt_at {
                item.attempts += 1;
                item.next_attempt_at = now + backoff(item.attempts);
                due.push(item.reason.clone());
            }
        }
        items.retain(|p| {
            let alive = p.attempts < MAX_ATTEMPTS;
            if !alive {
                warn!(%hash, reason = ?p.reason, "deferred retry exhausted its attempt budget, dropping");
            }
            alive
        });
        if items.is_empty() {
            pending.remove(hash);
        }
        due
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.values().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(s: &str) -> Hash {
        Hash::of(s.as_bytes())
    }

    #[tokio::test]
    async fn enqueues_and_becomes_due_immediately_once_backoff_elapses() {
        let queue = RetryQueue::new();
        let target = hash("missing");
        queue
            .enqueue(
                target.clone(),
                RetryReason::Del {
                    by: hash("deletion-record"),
                    source: PeerId("bob".into()),
                },
            )
            .await;
        assert_eq!(queue.len().await, 1);
        tokio::time::sleep(Duration::from_millis(110)).await;
        let due = queue.due(&target).await;
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let queue = RetryQueue::new();
        let target = hash("missing");
        queue
            .enqueue(
                target.clone(),
                RetryReason::Del {
                    by: hash("deletion-record"),
                    source: PeerId("bob".into()),
                },
            )
            .await;
        for _ in 0..MAX_ATTEMPTS {
            tokio::time::sleep(Duration::from_secs(2)).await;
            queue.due(&target).await;
        }
        assert_eq!(queue.len().await, 0);
    }
}
