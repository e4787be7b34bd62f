//! In-memory `BrokerAdapter` used by tests and as the LOCAL-mode degrade
//! target when the real broker is unavailable (spec §4.3, "Failure
//! semantics").

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use agentaskit_shared::errors::CoreResult;

use super::{BrokerAdapter, BrokerEnvelope, QueueMessage};

#[derive(Default)]
struct Store {
    queues: HashMap<String, Vec<QueueMessage>>,
    counters: HashMap<String, i64>,
    locks: HashMap<String, Instant>,
    published: Vec<(String, BrokerEnvelope)>,
}

pub struct InMemoryBroker {
    store: Mutex<Store>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
        }
    }

    /// Test/inspection hook: drain everything published on `channel`.
    pub fn published_on(&self, channel: &str) -> Vec<BrokerEnvelope> {
        self.store
            .lock()
            .published
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerAdapter for InMemoryBroker {
    async fn enqueue(&self, queue: &str, priority: u8, payload: serde_json::Value) -> CoreResult<()> {
        let mut store = self.store.lock();
        let q = store.queues.entry(queue.to_string()).or_default();
        q.push(QueueMessage { priority, payload });
        q.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> CoreResult<Option<QueueMessage>> {
        Ok(self
            .store
            .lock()
            .queues
            .get_mut(queue)
            .filter(|q| !q.is_empty())
            .map(|q| q.remove(0)))
    }

    async fn queue_depth(&self, queue: &str) -> CoreResult<u64> {
        Ok(self
            .store
            .lock()
            .queues
            .get(queue)
            .map(|q| q.len() as u64)
            .unwrap_or(0))
    }

    async fn publish(&self, channel: &str, envelope: &BrokerEnvelope) -> CoreResult<()> {
        self.store
            .lock()
            .published
            .push((channel.to_string(), envelope.clone()));
        Ok(())
    }

    async fn increment(&self, counter: &str, by: i64) -> CoreResult<i64> {
        let mut store = self.store.lock();
        let value = store.counters.entry(counter.to_string()).or_insert(0);
        *value += by;
        Ok(*value)
    }

    async fn try_lock(&self, key: &str, ttl: Duration) -> CoreResult<bool> {
        let mut store = self.store.lock();
        let now = Instant::now();
        let acquirable = match store.locks.get(key) {
            Some(expires_at) => now >= *expires_at,
            None => true,
        };
        if acquirable {
            store.locks.insert(key.to_string(), now + ttl);
        }
        Ok(acquirable)
    }

    async fn unlock(&self, key: &str) -> CoreResult<()> {
        self.store.lock().locks.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn higher_priority_drains_first() {
        let broker = InMemoryBroker::new();
        broker.enqueue("default", 1, serde_json::json!("low")).await.unwrap();
        broker.enqueue("default", 9, serde_json::json!("high")).await.unwrap();

        let first = broker.dequeue("default").await.unwrap().unwrap();
        assert_eq!(first.payload, serde_json::json!("high"));
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_ttl_elapses() {
        let broker = InMemoryBroker::new();
        assert!(broker.try_lock("role:beat_scheduler", Duration::from_millis(20)).await.unwrap());
        assert!(!broker.try_lock("role:beat_scheduler", Duration::from_millis(20)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(broker.try_lock("role:beat_scheduler", Duration::from_millis(20)).await.unwrap());
    }
}
