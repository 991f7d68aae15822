//! In-process topic bus.
//!
//! String-keyed pub/sub connecting dispatchers and tunnel sessions: each
//! live tunnel consumes its subdomain topic, each in-flight request
//! consumes a private topic named by its correlation id. Mailboxes are
//! unbounded and delivery is FIFO per publisher. Dropping a subscription
//! unsubscribes it; a message published to a topic with no subscribers is
//! discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;

/// A message delivered by the bus.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self { id: id.into(), payload }
    }

    /// Acknowledge delivery. The in-memory bus is fire-and-forget, so
    /// this only traces the consumption; a durable bus would hook real
    /// acking here without changing any call site.
    pub fn ack(&self) {
        trace!(message_id = %self.id, "message acked");
    }
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Default)]
struct Inner {
    topics: DashMap<String, Vec<Subscriber>>,
    next_id: AtomicU64,
}

#[derive(Clone, Default)]
pub struct TopicBus {
    inner: Arc<Inner>,
}

impl TopicBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking enqueue to every current subscriber of the topic.
    /// Dead subscribers are pruned on the way through.
    pub fn publish(&self, topic: &str, msg: Message) {
        if let Some(mut subs) = self.inner.topics.get_mut(topic) {
            subs.retain(|sub| sub.tx.send(msg.clone()).is_ok());
        }
    }

    /// Open a mailbox on the topic. The subscription receives every
    /// message published from this point on and unsubscribes on drop.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        Subscription {
            topic: topic.to_string(),
            id,
            rx,
            bus: Arc::clone(&self.inner),
        }
    }
}

pub struct Subscription {
    topic: String,
    id: u64,
    rx: mpsc::UnboundedReceiver<Message>,
    bus: Arc<Inner>,
}

impl Subscription {
    /// Next message on the topic; pends until one arrives.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(mut subs) = self.bus.topics.get_mut(&self.topic) {
            subs.retain(|sub| sub.id != self.id);
        }
        self.bus.topics.remove_if(&self.topic, |_, subs| subs.is_empty());
    }
}
