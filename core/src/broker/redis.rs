//! `redis`-backed `BrokerAdapter`.
//!
//! Grounded on `examples/FlexNetOS-noa_ark_os/server/gateway/src/main.rs`'s
//! `RedisClient::open(...)` + connection-manager setup. Durable queues are
//! modeled as sorted sets keyed by enqueue-time priority (`ZADD` /
//! `ZPOPMAX`, ties broken FIFO by a monotonic sub-score), counters use
//! `INCRBY`, and keyed locks use `SET key val NX PX ttl`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use agentaskit_shared::errors::{CoreError, CoreResult};

use super::{BrokerAdapter, BrokerEnvelope, QueueMessage};

pub struct RedisBroker {
    conn: ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn map_err(err: redis::RedisError) -> CoreError {
        CoreError::Internal(anyhow::anyhow!(err))
    }

    fn queue_key(queue: &str) -> String {
        format!("agentaskit:queue:{queue}")
    }

    fn lock_key(key: &str) -> String {
        format!("agentaskit:lock:{key}")
    }
}

#[async_trait]
impl BrokerAdapter for RedisBroker {
    async fn enqueue(&self, queue: &str, priority: u8, payload: serde_json::Value) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        // Sub-priority ordering: later enqueues at the same priority sort
        // after earlier ones because the fractional part increases with
        // wall-clock time, approximating FIFO within a priority band.
        let score = priority as f64 * 1_000_000.0
            + (chrono::Utc::now().timestamp_millis() % 1_000_000) as f64 / 1_000_000.0;
        let encoded = serde_json::to_string(&payload).map_err(|e| CoreError::Internal(e.into()))?;
        conn.zadd::<_, _, _, ()>(Self::queue_key(queue), encoded, score)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> CoreResult<Option<QueueMessage>> {
        let mut conn = self.conn.clone();
        let popped: Vec<(String, f64)> = conn
            .zpopmax(Self::queue_key(queue), 1)
            .await
            .map_err(Self::map_err)?;
        let Some((encoded, score)) = popped.into_iter().next() else {
            return Ok(None);
        };
        let payload: serde_json::Value =
            serde_json::from_str(&encoded).map_err(|e| CoreError::Internal(e.into()))?;
        let priority = (score / 1_000_000.0).floor() as u8;
        Ok(Some(QueueMessage { priority, payload }))
    }

    async fn queue_depth(&self, queue: &str) -> CoreResult<u64> {
        let mut conn = self.conn.clone();
        conn.zcard(Self::queue_key(queue)).await.map_err(Self::map_err)
    }

    async fn publish(&self, channel: &str, envelope: &BrokerEnvelope) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        let encoded =
            serde_json::to_string(envelope).map_err(|e| CoreError::Internal(e.into()))?;
        conn.publish::<_, _, ()>(channel, encoded).await.map_err(Self::map_err)?;
        Ok(())
    }

    async fn increment(&self, counter: &str, by: i64) -> CoreResult<i64> {
        let mut conn = self.conn.clone();
        conn.incr(format!("agentaskit:counter:{counter}"), by)
            .await
            .map_err(Self::map_err)
    }

    async fn try_lock(&self, key: &str, ttl: Duration) -> CoreResult<bool> {
        let mut conn = self.conn.clone();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(Self::lock_key(key))
            .arg("1")
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(acquired.is_some())
    }

    async fn unlock(&self, key: &str) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::lock_key(key)).await.map_err(Self::map_err)
    }
}
