//! Channel-based publish/subscribe event bus (§4.C2).
//!
//! [`memory::InProcessBus`] dispatches directly to in-memory subscribers;
//! [`redis_bus::RedisBus`] uses Redis `PUBLISH`/`SUBSCRIBE`/`PSUBSCRIBE` with
//! a background listener. Both implement [`EventBus`].

pub mod bus;
pub mod error;
pub mod event;
pub mod glob;
pub mod memory;
pub mod redis_bus;

pub use bus::{EventBus, Handler, SubscriptionId};
pub use error::{EventBusError, Result};
pub use event::Event;
pub use memory::InProcessBus;
pub use redis_bus::RedisBus;

/// The single channel every core event kind is published on (§4.C8
/// "events emitted on channel `workflow_events`"; §6 "Event envelope (on
/// `workflow_events`)"). Producers discriminate by the payload's `type`
/// field rather than by channel, so one subscription (the WebSocket
/// broadcaster's, a test's) observes every core event in publish order.
pub const WORKFLOW_EVENTS_CHANNEL: &str = "workflow_events";
