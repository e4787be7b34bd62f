//! Broker Adapter: durable work queues, pub/sub channels, atomic counters,
//! and keyed locks (spec §6, "Broker surface").

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agentaskit_shared::errors::CoreResult;

/// A message pulled off a durable queue, carrying its enqueue-time priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub priority: u8,
    pub payload: serde_json::Value,
}

/// A pub/sub envelope published on a coordination channel
/// (`channel = "swarm:{id}"` per spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub sender_id: String,
    pub content: serde_json::Value,
    pub metadata: serde_json::Value,
    pub ts: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Enqueue a durable message; `priority` 0-10, higher drains first.
    async fn enqueue(&self, queue: &str, priority: u8, payload: serde_json::Value) -> CoreResult<()>;
    /// Pop the highest-priority message, if any.
    async fn dequeue(&self, queue: &str) -> CoreResult<Option<QueueMessage>>;
    async fn queue_depth(&self, queue: &str) -> CoreResult<u64>;

    async fn publish(&self, channel: &str, envelope: &BrokerEnvelope) -> CoreResult<()>;

    /// Atomically add `by` to a named counter and return the new value.
    async fn increment(&self, counter: &str, by: i64) -> CoreResult<i64>;

    /// Acquire a keyed lock with a TTL; returns whether it was acquired.
    async fn try_lock(&self, key: &str, ttl: Duration) -> CoreResult<bool>;
    async fn unlock(&self, key: &str) -> CoreResult<()>;
}
