//! Network-attached event bus (Redis pub/sub)
//!
//! Uses a dedicated `redis::aio::PubSub` connection for `SUBSCRIBE` /
//! `PSUBSCRIBE` and a separate `ConnectionManager` for `PUBLISH`, since a
//! connection in subscriber mode cannot issue other commands. A background
//! listener task (started by [`RedisBus::start_listening`]) drains the
//! pub/sub message stream and dispatches to whichever handlers are
//! registered for the message's channel at delivery time — this is the
//! "background listener translating incoming messages into handler
//! invocations" called for in §4.C2.
//!
//! Delivery here is at-least-once in steady state (Redis pub/sub itself does
//! not persist messages for a disconnected subscriber, but the connection
//! this bus holds does not intentionally drop messages once subscribed).

use dashmap::DashMap;
use futures::StreamExt;
use regex::Regex;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bus::{new_subscription_id, EventBus, Handler, SubscriptionId};
use crate::error::Result;
use crate::event::Event;

struct Registered {
    id: SubscriptionId,
    handler: Handler,
}

struct PatternRegistered {
    id: SubscriptionId,
    regex: Regex,
    handler: Handler,
}

/// [`EventBus`] backed by Redis `PUBLISH`/`SUBSCRIBE`/`PSUBSCRIBE`.
pub struct RedisBus {
    publish_conn: redis::aio::ConnectionManager,
    pubsub: Arc<Mutex<redis::aio::PubSub>>,
    channel_handlers: Arc<DashMap<String, Vec<Registered>>>,
    pattern_handlers: Arc<DashMap<String, Vec<PatternRegistered>>>,
    listener: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RedisBus {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let publish_conn = client.get_connection_manager().await?;
        let pubsub = client.get_async_connection().await?.into_pubsub();
        Ok(Self {
            publish_conn,
            pubsub: Arc::new(Mutex::new(pubsub)),
            channel_handlers: Arc::new(DashMap::new()),
            pattern_handlers: Arc::new(DashMap::new()),
            listener: Mutex::new(None),
        })
    }
}

#[async_trait::async_trait]
impl EventBus for RedisBus {
    async fn publish(&self, channel: &str, payload: serde_json::Value) -> Result<()> {
        let mut conn = self.publish_conn.clone();
        let text = serde_json::to_string(&payload)
            .map_err(|e| crate::error::EventBusError::Backend(e.to_string()))?;
        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(text)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str, handler: Handler) -> Result<SubscriptionId> {
        let id = new_subscription_id();
        self.pubsub.lock().await.subscribe(channel).await?;
        self.channel_handlers
            .entry(channel.to_string())
            .or_default()
            .push(Registered { id, handler });
        Ok(id)
    }

    async fn pattern_subscribe(&self, glob: &str, handler: Handler) -> Result<SubscriptionId> {
        let regex = crate::glob::to_regex(glob)
            .map_err(|e| crate::error::EventBusError::InvalidPattern(glob.to_string(), e.to_string()))?;
        let id = new_subscription_id();
        self.pubsub.lock().await.psubscribe(glob).await?;
        self.pattern_handlers
            .entry(glob.to_string())
            .or_default()
            .push(PatternRegistered { id, regex, handler });
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let mut empty_channels = Vec::new();
        for mut entry in self.channel_handlers.iter_mut() {
            entry.value_mut().retain(|r| r.id != id);
            if entry.value().is_empty() {
                empty_channels.push(entry.key().clone());
            }
        }
        for channel in empty_channels {
            self.channel_handlers.remove(&channel);
            self.pubsub.lock().await.unsubscribe(&channel).await.ok();
        }

        let mut empty_patterns = Vec::new();
        for mut entry in self.pattern_handlers.iter_mut() {
            entry.value_mut().retain(|r| r.id != id);
            if entry.value().is_empty() {
                empty_patterns.push(entry.key().clone());
            }
        }
        for glob in empty_patterns {
            self.pattern_handlers.remove(&glob);
            self.pubsub.lock().await.punsubscribe(&glob).await.ok();
        }

        Ok(())
    }

    async fn start_listening(&self) -> Result<()> {
        let mut guard = self.listener.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let pubsub = self.pubsub.clone();
        let channel_handlers = self.channel_handlers.clone();
        let pattern_handlers = self.pattern_handlers.clone();

        let handle = tokio::spawn(async move {
            loop {
                let msg = {
                    let mut conn = pubsub.lock().await;
                    let mut stream = conn.on_message();
                    stream.next().await
                };
                let Some(msg) = msg else {
                    break;
                };
                let channel: String = msg.get_channel_name().to_string();
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(err) => {
                        tracing::warn!(%channel, %err, "failed to decode redis pub/sub payload");
                        continue;
                    }
                };
                let value: serde_json::Value = match serde_json::from_str(&payload) {
                    Ok(v) => v,
                    Err(err) => {
                        tracing::warn!(%channel, %err, "failed to parse event payload as json");
                        continue;
                    }
                };
                let event = Event::new(channel.clone(), value);

                if let Some(handlers) = channel_handlers.get(&channel) {
                    for registered in handlers.iter() {
                        let handler = registered.handler.clone();
                        let event = event.clone();
                        tokio::spawn(async move { handler(event).await });
                    }
                }
                for entry in pattern_handlers.iter() {
                    for registered in entry.value().iter() {
                        if registered.regex.is_match(&channel) {
                            let handler = registered.handler.clone();
                            let event = event.clone();
                            tokio::spawn(async move { handler(event).await });
                        }
                    }
                }
            }
        });

        *guard = Some(handle);
        Ok(())
    }

    async fn stop_listening(&self) -> Result<()> {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.stop_listening().await?;
        self.channel_handlers.clear();
        self.pattern_handlers.clear();
        Ok(())
    }
}
