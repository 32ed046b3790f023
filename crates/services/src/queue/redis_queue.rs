use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::Script;
use redis::aio::ConnectionManager;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Delivery, MessageQueue};
use crate::error::QueueError;

/// Redis-backed queue.
///
/// Each queue uses a sorted set of message ids scored by the epoch millisecond
/// at which they become visible, plus hashes for payloads and delivery counts.
/// A receiver claims a due message by rescoring it to the lock deadline, so a
/// crashed handler's message resurfaces. The claim runs as one Lua script; a
/// message is never out of the pending set while its payload exists.
pub struct RedisQueue {
    conn: ConnectionManager,
    prefix: String,
    claim: Script,
}

/// KEYS: pending, payload, deliveries. ARGV: now, lock deadline.
/// Returns `{id, payload, delivery_count}` or nil when nothing is due.
const CLAIM_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 10)
for _, id in ipairs(due) do
    local payload = redis.call('HGET', KEYS[2], id)
    if payload then
        redis.call('ZADD', KEYS[1], ARGV[2], id)
        local count = redis.call('HINCRBY', KEYS[3], id, 1)
        return {id, payload, count}
    end
    redis.call('ZREM', KEYS[1], id)
end
return false
"#;

impl RedisQueue {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(url, "Connected to Redis queue backend");
        Ok(Self {
            conn,
            prefix: "batchscribe".to_string(),
            claim: Script::new(CLAIM_SCRIPT),
        })
    }

    fn pending_key(&self, queue: &str) -> String {
        format!("{}:{queue}:pending", self.prefix)
    }

    fn payload_key(&self, queue: &str) -> String {
        format!("{}:{queue}:payload", self.prefix)
    }

    fn count_key(&self, queue: &str) -> String {
        format!("{}:{queue}:deliveries", self.prefix)
    }
}

fn epoch_millis_after(delay: Duration) -> f64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now + delay).as_millis() as f64
}

#[async_trait]
impl MessageQueue for RedisQueue {
    async fn publish(&self, queue: &str, payload: &str, delay: Duration) -> Result<String, QueueError> {
        let id = Uuid::new_v4().to_string();
        let mut conn = self.conn.clone();
        let _: () = conn.hset(self.payload_key(queue), &id, payload).await?;
        let _: () = conn
            .zadd(self.pending_key(queue), &id, epoch_millis_after(delay))
            .await?;
        debug!(queue, id = %id, delay_secs = delay.as_secs(), "Message published");
        Ok(id)
    }

    async fn receive(&self, queue: &str, lock: Duration) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.conn.clone();
        let claimed: Option<(String, String, u32)> = self
            .claim
            .key(self.pending_key(queue))
            .key(self.payload_key(queue))
            .key(self.count_key(queue))
            .arg(epoch_millis_after(Duration::ZERO))
            .arg(epoch_millis_after(lock))
            .invoke_async(&mut conn)
            .await?;

        Ok(claimed.map(|(id, payload, delivery_count)| Delivery {
            id,
            queue: queue.to_string(),
            payload,
            delivery_count,
        }))
    }

    async fn complete(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .zrem(self.pending_key(&delivery.queue), &delivery.id)
            .await?;
        let _: () = conn
            .hdel(self.payload_key(&delivery.queue), &delivery.id)
            .await?;
        let _: () = conn
            .hdel(self.count_key(&delivery.queue), &delivery.id)
            .await?;
        if removed == 0 {
            return Err(QueueError::UnknownDelivery(delivery.id.clone()));
        }
        Ok(())
    }

    async fn abandon(&self, delivery: &Delivery, delay: Duration) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .zadd(
                self.pending_key(&delivery.queue),
                &delivery.id,
                epoch_millis_after(delay),
            )
            .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}
