//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};

use crate::{
    domain::{Credentials, VerifiedIdentity},
    infrastructure::dto::websocket::ClientMessage,
    ui::state::AppState,
};

use super::dispatcher::dispatch;

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub token: Option<String>,
}

impl From<ConnectQuery> for Credentials {
    fn from(query: ConnectQuery) -> Self {
        Self {
            user_id: query.user_id,
            display_name: query.display_name,
            token: query.token,
        }
    }
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let credentials = Credentials::from(query);
    let identity = match state.identity_verifier.verify(&credentials).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("Rejected WebSocket connection: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, identity)))
}

/// Spawns a task that receives frames from the rx channel and pushes them to the WebSocket sender.
///
/// This function handles the outbound flow: events addressed to this connection
/// (via the MessagePusher) are written to its socket in order.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: VerifiedIdentity) {
    let (sender, mut receiver) = socket.split();

    // Create a channel for this connection to receive events
    let (tx, rx) = mpsc::unbounded_channel();
    let record = match state
        .connect_participant_usecase
        .execute(identity, tx)
        .await
    {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!("Failed to register connection: {}", e);
            return;
        }
    };
    let connection_id = record.connection_id;

    // Outbound: events from the MessagePusher → this socket
    let mut send_task = pusher_loop(rx, sender);

    // Inbound: frames are handled one at a time so a connection's requests never overlap
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let recv_state = state.clone();
    let recv_connection_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        loop {
            // Stop requests are only observed between frames; a dispatch in progress always completes
            let next = tokio::select! {
                next = receiver.next() => next,
                _ = &mut stop_rx => break,
            };
            let Some(msg) = next else {
                break;
            };
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(connection_id = %recv_connection_id, "WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let message = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(message) => message,
                        Err(e) => {
                            tracing::warn!(
                                connection_id = %recv_connection_id,
                                "Ignoring unparseable frame: {}",
                                e
                            );
                            continue;
                        }
                    };
                    dispatch(&recv_state, &recv_connection_id, message).await;
                }
                Message::Ping(_) => {
                    // Ping/pong is handled automatically by the WebSocket protocol
                    tracing::trace!("Received ping");
                }
                Message::Close(_) => {
                    tracing::info!(connection_id = %recv_connection_id, "Client requested close");
                    break;
                }
                _ => {}
            }
        }
    });

    // If either side completes, stop the other
    let recv_finished = tokio::select! {
        _ = &mut recv_task => true,
        _ = &mut send_task => false,
    };
    if recv_finished {
        send_task.abort();
    } else {
        // 処理中のフレームは最後まで実行させてから後片付けする
        let _ = stop_tx.send(());
        let _ = recv_task.await;
    }

    // Teardown runs after the read loop has stopped
    let departure = state
        .disconnect_participant_usecase
        .execute(&connection_id)
        .await;
    tracing::info!(
        connection_id = %connection_id,
        was_in_room = departure.is_some(),
        "Connection closed"
    );
}
