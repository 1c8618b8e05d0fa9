use axum::extract::{
    State,
    ws::{self, WebSocket, WebSocketUpgrade},
};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

/// Frames queued per client before the room manager starts dropping them.
const CLIENT_QUEUE_CAPACITY: usize = 64;

pub async fn ws_handler(
    ws_upgrade: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    tracing::debug!("WebSocket upgrade requested");
    ws_upgrade.on_upgrade(move |socket| handle_socket(socket, app_state))
}

pub async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = Uuid::new_v4();
    let room_manager = app_state.room_manager;

    let (manager_to_client_tx, mut manager_to_client_rx) =
        mpsc::channel::<ws::Message>(CLIENT_QUEUE_CAPACITY);
    room_manager
        .client_connected(connection_id, manager_to_client_tx)
        .await;
    tracing::info!(connection.id = %connection_id, "WebSocket connection established");

    let mut send_task = tokio::spawn(async move {
        while let Some(message_to_send) = manager_to_client_rx.recv().await {
            if ws_sender.send(message_to_send).await.is_err() {
                tracing::debug!(
                    connection.id = %connection_id,
                    "WS send failed, client likely gone"
                );
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let recv_manager = room_manager.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = ws_receiver.next().await {
            match frame {
                Ok(ws::Message::Text(text_msg)) => {
                    if let Err(e) = recv_manager
                        .forward_client_event(connection_id, text_msg.to_string())
                        .await
                    {
                        tracing::error!(
                            connection.id = %connection_id,
                            error = %e,
                            "Failed to forward event"
                        );
                        break;
                    }
                }
                Ok(ws::Message::Binary(_)) => {
                    tracing::debug!(connection.id = %connection_id, "Ignoring binary frame");
                }
                Ok(ws::Message::Ping(_)) | Ok(ws::Message::Pong(_)) => {}
                Ok(ws::Message::Close(_)) => {
                    tracing::debug!(connection.id = %connection_id, "WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        connection.id = %connection_id,
                        error = %e,
                        "WebSocket read error"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    room_manager.client_disconnected(connection_id).await;
    tracing::info!(connection.id = %connection_id, "WebSocket connection closed");
}
