//! WebSocket broadcaster (§4.C9): forwards `workflow_events` Event Bus
//! traffic to connected external clients, filtered per-client. Not on the
//! executor's critical path — see [`server`] module docs.

pub mod client;
pub mod error;
pub mod filters;
pub mod server;

pub use client::{ClientHandle, ClientRegistry};
pub use error::{BroadcastError, Result};
pub use filters::{EventFilter, FilterManager};
pub use server::{attach, router, BroadcastState};
