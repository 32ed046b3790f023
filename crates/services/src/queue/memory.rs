use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{Delivery, MessageQueue};
use crate::error::QueueError;

struct Entry {
    queue: String,
    payload: String,
    visible_at: Instant,
    sequence: u64,
    delivery_count: u32,
}

/// In-process queue for single-node deployments and tests.
pub struct MemoryQueue {
    entries: DashMap<String, Entry>,
    sequence: std::sync::atomic::AtomicU64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            sequence: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Number of messages in `queue`, visible or not.
    pub fn len(&self, queue: &str) -> usize {
        self.entries.iter().filter(|e| e.queue == queue).count()
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Payloads in `queue` with their remaining invisibility, in publish order.
    pub fn pending(&self, queue: &str) -> Vec<(String, Duration)> {
        let now = Instant::now();
        let mut pending: Vec<(u64, String, Duration)> = self
            .entries
            .iter()
            .filter(|e| e.queue == queue)
            .map(|e| {
                (
                    e.sequence,
                    e.payload.clone(),
                    e.visible_at.saturating_duration_since(now),
                )
            })
            .collect();
        pending.sort_by_key(|(sequence, _, _)| *sequence);
        pending.into_iter().map(|(_, p, d)| (p, d)).collect()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn publish(&self, queue: &str, payload: &str, delay: Duration) -> Result<String, QueueError> {
        let id = Uuid::new_v4().to_string();
        let sequence = self
            .sequence
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.entries.insert(
            id.clone(),
            Entry {
                queue: queue.to_string(),
                payload: payload.to_string(),
                visible_at: Instant::now() + delay,
                sequence,
                delivery_count: 0,
            },
        );
        Ok(id)
    }

    async fn receive(&self, queue: &str, lock: Duration) -> Result<Option<Delivery>, QueueError> {
        let now = Instant::now();
        let mut candidates: Vec<(Instant, u64, String)> = self
            .entries
            .iter()
            .filter(|e| e.queue == queue && e.visible_at <= now)
            .map(|e| (e.visible_at, e.sequence, e.key().clone()))
            .collect();
        candidates.sort();

        for (_, _, id) in candidates {
            let Some(mut entry) = self.entries.get_mut(&id) else {
                continue;
            };
            // Another receiver may have claimed it since the scan.
            if entry.visible_at > now {
                continue;
            }
            entry.visible_at = now + lock;
            entry.delivery_count += 1;
            return Ok(Some(Delivery {
                id,
                queue: entry.queue.clone(),
                payload: entry.payload.clone(),
                delivery_count: entry.delivery_count,
            }));
        }
        Ok(None)
    }

    async fn complete(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.entries
            .remove(&delivery.id)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownDelivery(delivery.id.clone()))
    }

    async fn abandon(&self, delivery: &Delivery, delay: Duration) -> Result<(), QueueError> {
        let mut entry = self
            .entries
            .get_mut(&delivery.id)
            .ok_or_else(|| QueueError::UnknownDelivery(delivery.id.clone()))?;
        entry.visible_at = Instant::now() + delay;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
