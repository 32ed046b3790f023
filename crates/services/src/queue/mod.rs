mod memory;
mod redis_queue;

pub use memory::MemoryQueue;
pub use redis_queue::RedisQueue;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::QueueError;

/// One delivery of a queued message. The message stays invisible to other
/// receivers until it is completed, abandoned, or its lock expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: String,
    pub queue: String,
    pub payload: String,
    /// Starts at 1 on the first delivery.
    pub delivery_count: u32,
}

/// At-least-once queue with scheduled visibility.
#[async_trait]
pub trait MessageQueue: Send + Sync + 'static {
    /// Enqueues `payload`; it becomes visible after `delay`. Returns the message id.
    async fn publish(&self, queue: &str, payload: &str, delay: Duration) -> Result<String, QueueError>;

    /// Takes the next visible message and hides it for `lock`.
    async fn receive(&self, queue: &str, lock: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Removes a delivered message for good.
    async fn complete(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Releases a delivered message so it becomes visible again after `delay`.
    async fn abandon(&self, delivery: &Delivery, delay: Duration) -> Result<(), QueueError>;

    fn name(&self) -> &str;
}

/// Serializes `message` as JSON and publishes it.
pub async fn publish_json<T: Serialize + Sync>(
    queue: &dyn MessageQueue,
    name: &str,
    message: &T,
    delay: Duration,
) -> Result<String, QueueError> {
    let payload = serde_json::to_string(message).map_err(|e| QueueError::Backend(e.to_string()))?;
    queue.publish(name, &payload, delay).await
}
