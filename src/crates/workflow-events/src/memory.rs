//! In-process event bus
//!
//! Direct dispatch to a set of handlers: [`publish`](InProcessBus::publish)
//! looks up the current subscribers of a channel and hands the event to
//! each one's dedicated worker without waiting for it to be processed.
//!
//! Each subscription owns a bounded `mpsc` channel and a worker task that
//! drains it in order (FIFO per channel, per §4.C2) and spawns a fresh task
//! per event to actually invoke the handler — so a handler that panics or
//! hangs only ever affects that one task, never the publisher or sibling
//! subscribers. When a subscriber's queue is full (a persistently slow
//! handler), the event is dropped for that subscriber with a `warn` log
//! rather than applying back-pressure to the publisher.

use dashmap::DashMap;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::bus::{new_subscription_id, EventBus, Handler, SubscriptionId};
use crate::error::Result;
use crate::event::Event;

const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
    _worker: tokio::task::JoinHandle<()>,
}

struct PatternSubscriber {
    subscriber: Subscriber,
    pattern: Regex,
}

/// In-process [`EventBus`] dispatching directly to in-memory subscriber
/// queues.
#[derive(Clone)]
pub struct InProcessBus {
    channels: Arc<DashMap<String, Vec<Subscriber>>>,
    patterns: Arc<parking_lot::RwLock<Vec<PatternSubscriber>>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            patterns: Arc::new(parking_lot::RwLock::new(Vec::new())),
        }
    }

    fn spawn_worker(handler: Handler) -> (mpsc::Sender<Event>, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Event>(SUBSCRIBER_QUEUE_CAPACITY);
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let handler = handler.clone();
                tokio::spawn(async move {
                    handler(event).await;
                });
            }
        });
        (tx, worker)
    }

    fn deliver(subscriber: &Subscriber, event: &Event) {
        match subscriber.tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = subscriber.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    channel = %event.channel,
                    subscriber = ?subscriber.id,
                    dropped_total = dropped,
                    "subscriber queue full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(subscriber = ?subscriber.id, "subscriber worker gone, dropping event");
            }
        }
    }

}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EventBus for InProcessBus {
    async fn publish(&self, channel: &str, payload: serde_json::Value) -> Result<()> {
        let event = Event::new(channel, payload);

        if let Some(subscribers) = self.channels.get(channel) {
            for subscriber in subscribers.iter() {
                Self::deliver(subscriber, &event);
            }
        }

        for pattern_subscriber in self.patterns.read().iter() {
            if pattern_subscriber.pattern.is_match(channel) {
                Self::deliver(&pattern_subscriber.subscriber, &event);
            }
        }

        Ok(())
    }

    async fn subscribe(&self, channel: &str, handler: Handler) -> Result<SubscriptionId> {
        let id = new_subscription_id();
        let (tx, worker) = Self::spawn_worker(handler);
        let subscriber = Subscriber {
            id,
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            _worker: worker,
        };
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push(subscriber);
        Ok(id)
    }

    async fn pattern_subscribe(&self, glob: &str, handler: Handler) -> Result<SubscriptionId> {
        let pattern = crate::glob::to_regex(glob)
            .map_err(|e| crate::error::EventBusError::InvalidPattern(glob.to_string(), e.to_string()))?;
        let id = new_subscription_id();
        let (tx, worker) = Self::spawn_worker(handler);
        let subscriber = Subscriber {
            id,
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            _worker: worker,
        };
        self.patterns
            .write()
            .push(PatternSubscriber { subscriber, pattern });
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        for mut entry in self.channels.iter_mut() {
            entry.value_mut().retain(|s| s.id != id);
        }
        self.patterns.write().retain(|p| p.subscriber.id != id);
        Ok(())
    }

    async fn start_listening(&self) -> Result<()> {
        Ok(())
    }

    async fn stop_listening(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.channels.clear();
        self.patterns.write().clear();
        Ok(())
    }
}
