//! Broadcaster errors (§4.C9). Kept deliberately small: a broadcaster
//! failure must never propagate into the executor (§4.C9 "its failures MUST
//! NOT affect the executor"), so the only place these surface is the
//! broadcaster's own API surface (subscribing to the bus, registering a
//! client).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("event bus error: {0}")]
    EventBus(#[from] workflow_events::EventBusError),

    #[error("unknown client '{0}'")]
    UnknownClient(String),
}

pub type Result<T> = std::result::Result<T, BroadcastError>;
