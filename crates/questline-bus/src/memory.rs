//! In-process bus.
//!
//! Each subscriber owns a bounded queue; publish waits for queue space so a
//! slow consumer applies backpressure instead of losing messages. A bounded
//! tail of published envelopes is kept per topic for inspection.
use crate::{BusError, BusResult, Envelope, MessageBus};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

const DEFAULT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_HISTORY_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct InMemoryBus {
    inner: Arc<Inner>,
}

struct Inner {
    queue_capacity: usize,
    history_capacity: usize,
    subscribers: RwLock<HashMap<String, Vec<mpsc::Sender<Envelope>>>>,
    history: Mutex<HashMap<String, VecDeque<Envelope>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(queue_capacity: usize, history_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue_capacity: queue_capacity.max(1),
                history_capacity,
                subscribers: RwLock::new(HashMap::new()),
                history: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self, topic: &str) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(self.inner.queue_capacity);
        self.inner
            .subscribers
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Envelopes published on `topic`, oldest first.
    pub fn published(&self, topic: &str) -> Vec<Envelope> {
        self.inner
            .history
            .lock()
            .get(topic)
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, envelope: &Envelope) {
        if self.inner.history_capacity == 0 {
            return;
        }
        let mut history = self.inner.history.lock();
        let items = history.entry(envelope.topic.clone()).or_default();
        items.push_back(envelope.clone());
        while items.len() > self.inner.history_capacity {
            items.pop_front();
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, envelope: Envelope) -> BusResult<()> {
        self.record(&envelope);
        metrics::counter!("questline_bus_published_total", "topic" => envelope.topic.clone())
            .increment(1);
        // Snapshot senders so the lock is not held across awaits.
        let senders = self
            .inner
            .subscribers
            .read()
            .get(&envelope.topic)
            .cloned()
            .unwrap_or_default();
        if senders.is_empty() {
            tracing::debug!(topic = %envelope.topic, "no in-process subscribers");
            return Ok(());
        }
        let mut closed = 0;
        for sender in &senders {
            if sender.send(envelope.clone()).await.is_err() {
                closed += 1;
            }
        }
        if closed > 0 {
            self.inner
                .subscribers
                .write()
                .entry(envelope.topic.clone())
                .or_default()
                .retain(|sender| !sender.is_closed());
        }
        if closed == senders.len() {
            return Err(BusError::Closed(envelope.topic));
        }
        Ok(())
    }
}
