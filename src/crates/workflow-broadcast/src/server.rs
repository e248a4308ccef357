//! The WebSocket broadcaster (§4.C9): a thin [`workflow_events::EventBus`]
//! subscriber that fans `workflow_events` traffic out to connected external
//! clients, filtered per-client by [`crate::filters::EventFilter`].
//!
//! Grounded on `orchestrator::api::ws::handler`/`pool` for the connection
//! lifecycle and `prospectorengine-prospector-btc`'s
//! `apps/orchestrator/src/handlers/stream.rs` for the axum WebSocket upgrade
//! mechanics (split socket, one task forwarding the bus to the client, one
//! draining inbound filter-update messages). Not on the critical path of
//! execution (§4.C9 "not the hard part"): every failure here is logged and
//! swallowed, never surfaced to the executor.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use workflow_events::EventBus;

use crate::client::ClientRegistry;
use crate::filters::{EventFilter, FilterManager};

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Shared state behind the broadcaster's axum router.
#[derive(Clone)]
pub struct BroadcastState {
    registry: ClientRegistry,
    filters: FilterManager,
}

impl BroadcastState {
    pub fn new() -> Self {
        Self { registry: ClientRegistry::new(), filters: FilterManager::new() }
    }

    pub fn active_clients(&self) -> usize {
        self.registry.active_count()
    }
}

impl Default for BroadcastState {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscribes `state` to `bus`'s `workflow_events` channel and forwards
/// every published payload to connected clients whose filter accepts it.
/// Returns the subscription id so the caller can unsubscribe on shutdown.
pub async fn attach(
    state: BroadcastState,
    bus: Arc<dyn EventBus>,
) -> crate::error::Result<workflow_events::SubscriptionId> {
    let id = bus
        .subscribe(
            "workflow_events",
            Arc::new(move |event: workflow_events::Event| {
                let state = state.clone();
                Box::pin(async move {
                    state.registry.broadcast(&event.payload, &state.filters);
                })
            }),
        )
        .await?;
    Ok(id)
}

/// Builds the broadcaster's axum router: a single `/ws` upgrade endpoint.
/// The embedding application (`workflow-cli serve`) nests this under
/// whatever else it serves.
pub fn router(state: BroadcastState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<BroadcastState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    SetFilter { filter: EventFilter },
    ClearFilter,
}

async fn handle_socket(socket: WebSocket, state: BroadcastState) {
    let (mut sender, mut receiver) = socket.split();
    let (handle, mut outbound) = state.registry.register();
    let client_id = handle.id.clone();
    tracing::info!(client_id = %client_id, "broadcaster client connected");

    let mut send_task = tokio::spawn(async move {
        let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
        loop {
            tokio::select! {
                _ = keepalive.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
                event = outbound.recv() => {
                    match event {
                        Some(payload) => {
                            let text = serde_json::to_string(&payload).unwrap_or_default();
                            if sender.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    });

    let filters = state.filters.clone();
    let client_id_recv = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let Message::Text(text) = message else { continue };
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::SetFilter { filter }) => filters.set(&client_id_recv, filter),
                Ok(ClientMessage::ClearFilter) => filters.clear(&client_id_recv),
                Err(e) => tracing::warn!(client_id = %client_id_recv, error = %e, "ignoring malformed client message"),
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.registry.unregister(&client_id);
    state.filters.clear(&client_id);
    tracing::info!(client_id = %client_id, "broadcaster client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_events::InProcessBus;

    #[tokio::test]
    async fn attach_subscribes_without_error() {
        let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new());
        let state = BroadcastState::new();
        let sub = attach(state.clone(), bus.clone()).await.unwrap();
        bus.unsubscribe(sub).await.unwrap();
    }

    #[tokio::test]
    async fn router_exposes_ws_route() {
        let state = BroadcastState::new();
        let app = router(state);
        // Smoke-check the router builds without panicking; a full upgrade
        // handshake needs a live TCP listener, exercised by `workflow-cli`'s
        // `serve` integration rather than here.
        let _ = app;
    }
}
