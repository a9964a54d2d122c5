use std::collections::HashMap;
use std::sync::Arc;

use moodwell_schema::BusMessage;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Topic {
    EntriesChanged,
    SubmissionFailed,
    CorruptionDetected,
}

impl Topic {
    pub fn from_message(msg: &BusMessage) -> Self {
        match msg {
            BusMessage::EntriesChanged { .. } => Topic::EntriesChanged,
            BusMessage::SubmissionFailed { .. } => Topic::SubmissionFailed,
            BusMessage::CorruptionDetected { .. } => Topic::CorruptionDetected,
        }
    }
}

type Subscriber = mpsc::Sender<BusMessage>;
type SubscriberMap = Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>;

/// Fan-out of journal events to dashboards and summaries.
///
/// Delivery is best effort: a subscriber whose queue is full misses the
/// message, and subscribers whose receiver was dropped are pruned on the
/// next publish.
pub struct EventBus {
    subscribers: SubscriberMap,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        subs.entry(topic).or_default().push(tx);
        rx
    }

    /// Returns how many subscribers received the message.
    pub async fn publish(&self, msg: BusMessage) -> usize {
        deliver(&self.subscribers, msg).await
    }

    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            subscribers: self.subscribers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BusPublisher {
    subscribers: SubscriberMap,
}

impl BusPublisher {
    pub async fn publish(&self, msg: BusMessage) -> usize {
        deliver(&self.subscribers, msg).await
    }
}

async fn deliver(subscribers: &SubscriberMap, msg: BusMessage) -> usize {
    let topic = Topic::from_message(&msg);
    let mut delivered = 0;
    let mut saw_closed = false;
    {
        let subs = subscribers.read().await;
        if let Some(list) = subs.get(&topic) {
            for tx in list {
                match tx.try_send(msg.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::debug!(?topic, "subscriber queue full, dropping event");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => saw_closed = true,
                }
            }
        }
    }

    if saw_closed {
        let mut subs = subscribers.write().await;
        if let Some(list) = subs.get_mut(&topic) {
            list.retain(|tx| !tx.is_closed());
        }
    }

    delivered
}
