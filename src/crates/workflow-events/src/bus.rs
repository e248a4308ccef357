//! The [`EventBus`] trait — §4.C2

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::event::Event;

/// Opaque handle returned by `subscribe`/`pattern_subscribe`, passed back to
/// `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// A subscriber callback. Boxed so both backends can store a homogeneous
/// collection of subscribers regardless of the concrete closure type.
pub type Handler = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

/// Channel-based publish/subscribe, fanning a published [`Event`] out to
/// every handler subscribed to its channel at publish time.
///
/// Handler invocations are isolated: a handler that panics or returns
/// (there is no return value to fail on, but a handler future that never
/// completes) must never prevent sibling handlers from running and must
/// never propagate back into [`EventBus::publish`]'s caller. Implementations
/// achieve this by dispatching each handler invocation onto its own worker
/// rather than awaiting it inline — see `crate::memory::InProcessBus`.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Fire-and-forget publish to every subscriber of `channel` at this
    /// moment. Does not wait for handlers to run.
    async fn publish(&self, channel: &str, payload: serde_json::Value) -> Result<()>;

    /// Register `handler` to be invoked for every event published on
    /// `channel` from now on.
    async fn subscribe(&self, channel: &str, handler: Handler) -> Result<SubscriptionId>;

    /// Register `handler` for every channel matching `glob` (`*` and `?`
    /// wildcards). Only the network backend is required to support this;
    /// [`crate::memory::InProcessBus`] implements it too, for parity in
    /// tests, but it is not required to by §4.C2.
    async fn pattern_subscribe(&self, glob: &str, handler: Handler) -> Result<SubscriptionId>;

    /// Remove a previously registered subscription. Unsubscribing an
    /// already-removed id is not an error.
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    /// Start the background listener translating backend-native messages
    /// into handler invocations. A no-op for backends that dispatch
    /// synchronously in-process.
    async fn start_listening(&self) -> Result<()>;

    /// Stop the background listener.
    async fn stop_listening(&self) -> Result<()>;

    /// Release resources (connections, worker tasks).
    async fn close(&self) -> Result<()>;
}

pub(crate) fn new_subscription_id() -> SubscriptionId {
    SubscriptionId::new()
}
