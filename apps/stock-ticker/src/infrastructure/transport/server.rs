//! Transport Server
//!
//! Axum server exposing `GET /stocks` and the `GET /ws` update stream.
//!
//! A WebSocket session registers its subscriber before it takes the
//! snapshot, so no change applied after the snapshot can be missed. A change
//! applied between registration and snapshot may arrive both ways; clients
//! tell them apart by `sequence`.

use std::net::SocketAddr;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::{ServerMessage, TransportError};
use crate::application::services::SharedTickerService;
use crate::domain::stock::Stock;
use crate::infrastructure::broadcast::SharedBroadcastHub;

/// Shared state for transport handlers.
#[derive(Clone)]
pub struct TransportState {
    ticker: SharedTickerService,
    hub: SharedBroadcastHub,
    cancel: CancellationToken,
}

impl TransportState {
    /// Create transport state. Open sessions end when `cancel` fires.
    #[must_use]
    pub const fn new(
        ticker: SharedTickerService,
        hub: SharedBroadcastHub,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ticker,
            hub,
            cancel,
        }
    }
}

/// Build the transport router.
pub fn router(state: TransportState) -> Router {
    Router::new()
        .route("/stocks", get(stocks_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Stock transport HTTP server.
pub struct TransportServer {
    port: u16,
    state: TransportState,
}

impl TransportServer {
    /// Create a new transport server.
    #[must_use]
    pub const fn new(port: u16, state: TransportState) -> Self {
        Self { port, state }
    }

    /// Run the server until the state's token is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), TransportError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Transport server listening");
        serve(listener, self.state).await
    }
}

/// Serve the transport on an already bound listener.
///
/// # Errors
///
/// Returns `TransportError::ServerFailed` if the HTTP server fails.
pub async fn serve(listener: TcpListener, state: TransportState) -> Result<(), TransportError> {
    let cancel = state.cancel.clone();

    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| TransportError::ServerFailed(e.to_string()))?;

    tracing::info!("Transport server stopped");
    Ok(())
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn stocks_handler(State(state): State<TransportState>) -> Json<Vec<Stock>> {
    Json(state.ticker.all_stocks())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<TransportState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: TransportState) {
    let (id, mut updates) = state.hub.subscribe();
    tracing::info!(subscriber_id = %id, "Client connected");

    let snapshot = ServerMessage::Snapshot {
        stocks: state.ticker.all_stocks(),
    };

    if send(&mut socket, &snapshot).await {
        loop {
            tokio::select! {
                () = state.cancel.cancelled() => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }

                update = updates.recv() => {
                    let Some(stock) = update else { break };
                    if !send(&mut socket, &ServerMessage::UpdateStockPrice { stock }).await {
                        break;
                    }
                }

                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    state.hub.unregister(id);
    tracing::info!(subscriber_id = %id, "Client disconnected");
}

/// Send one message. Returns `false` once the client is gone.
async fn send(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server message");
            return true;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

// =============================================================================
// Tests
// =============================================================================
