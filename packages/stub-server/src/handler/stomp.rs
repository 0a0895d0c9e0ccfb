//! STOMP-over-WebSocket live channel.
//!
//! A connection must open with a `CONNECT` frame carrying the bearer token in
//! its `Authorization` header. After `CONNECTED` the client may subscribe to
//! its own `/queue/messages/{userId}` and publish chat messages to
//! `/app/chat.send`. Each published message is stored, then delivered to the
//! receiver's and the sender's queues with its id, timestamp and the echoed
//! `clientMessageId`.

use std::{sync::Arc, time::Duration};

use alumnibridge_shared::{
    dto::live::{CHAT_SEND_DESTINATION, ChatPayload, user_queue},
    stomp::{Command, Frame},
    time::format_wire_timestamp,
};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::sync::mpsc;

use crate::{broker::ConnectionId, state::AppState};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that forwards encoded frames from the rx channel to the WebSocket sender.
///
/// # Arguments
///
/// * `rx` - Channel receiver for frames addressed to this connection
/// * `sender` - WebSocket sink of this connection
///
/// # Returns
///
/// A `JoinHandle` for the spawned task
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    })
}

fn error_frame(message: &str) -> String {
    Frame::new(Command::Error)
        .header("message", message)
        .body(message)
        .encode()
}

/// Wait for `CONNECT` and resolve its bearer token to a user id
async fn await_connect(
    receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
) -> Result<i64, String> {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match Frame::parse(&text) {
                // heart-beat
                Ok(None) => continue,
                Ok(Some(frame)) if matches!(frame.command, Command::Connect | Command::Stomp) => {
                    let authorization = frame
                        .get_header("Authorization")
                        .or_else(|| frame.get_header("authorization"));
                    return state
                        .authenticate(authorization)
                        .await
                        .map_err(|_| "Unauthorized".to_string());
                }
                Ok(Some(frame)) => return Err(format!("Expected CONNECT, got {}", frame.command)),
                Err(e) => return Err(e.to_string()),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => return Err(e.to_string()),
        }
    }
    Err("Connection closed during handshake".to_string())
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let connection = state.broker.next_connection_id();

    let user_id = match tokio::time::timeout(HANDSHAKE_TIMEOUT, await_connect(&mut receiver, &state)).await
    {
        Ok(Ok(user_id)) => user_id,
        Ok(Err(reason)) => {
            tracing::warn!("Live channel handshake rejected: {}", reason);
            let _ = sender.send(Message::Text(error_frame(&reason).into())).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
        Err(_) => {
            tracing::warn!("Live channel handshake timed out");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let connected = Frame::new(Command::Connected)
        .header("version", "1.2")
        .header("heart-beat", "0,0")
        .header("user-name", user_id.to_string());
    if let Err(e) = sender.send(Message::Text(connected.encode().into())).await {
        tracing::error!("Failed to send CONNECTED to user {}: {}", user_id, e);
        return;
    }
    tracing::info!("Live channel connection {} opened for user {}", connection, user_id);

    let (tx, rx) = mpsc::unbounded_channel();
    let state_clone = state.clone();

    // Spawn a task to receive frames from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => {
                    tracing::info!("User {} requested close", user_id);
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
            };

            let frame = match Frame::parse(&text) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Malformed frame from user {}: {}", user_id, e);
                    let _ = tx.send(error_frame(&e.to_string()));
                    continue;
                }
            };

            if !handle_frame(&state_clone, connection, user_id, frame, &tx).await {
                break;
            }
        }
    });

    // Spawn a task to push frames addressed to this connection
    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.broker.remove_connection(connection).await;
    tracing::info!("Live channel connection {} closed for user {}", connection, user_id);
}

/// Handle one client frame; `false` ends the connection
async fn handle_frame(
    state: &AppState,
    connection: ConnectionId,
    user_id: i64,
    frame: Frame,
    tx: &mpsc::UnboundedSender<String>,
) -> bool {
    match frame.command {
        Command::Subscribe => {
            let (Some(id), Some(destination)) =
                (frame.get_header("id"), frame.get_header("destination"))
            else {
                let _ = tx.send(error_frame("SUBSCRIBE requires id and destination"));
                return true;
            };
            if destination != user_queue(user_id) {
                tracing::warn!("User {} may not subscribe to {}", user_id, destination);
                let _ = tx.send(error_frame("Forbidden destination"));
                return true;
            }
            state
                .broker
                .subscribe(connection, id, destination, tx.clone())
                .await;
        }
        Command::Unsubscribe => {
            if let Some(id) = frame.get_header("id") {
                state.broker.unsubscribe(connection, id).await;
            }
        }
        Command::Send => match frame.get_header("destination") {
            Some(CHAT_SEND_DESTINATION) => chat_send(state, user_id, &frame.body).await,
            other => {
                tracing::warn!("SEND to unknown destination {:?}", other);
                let _ = tx.send(error_frame("Unknown destination"));
            }
        },
        Command::Disconnect => {
            if let Some(receipt) = frame.get_header("receipt") {
                let _ = tx.send(
                    Frame::new(Command::Receipt)
                        .header("receipt-id", receipt)
                        .encode(),
                );
            }
            tracing::info!("User {} sent DISCONNECT", user_id);
            return false;
        }
        other => tracing::debug!("Ignoring {} frame from user {}", other, user_id),
    }
    true
}

/// Store a published chat message and deliver it to both participants
async fn chat_send(state: &AppState, user_id: i64, body: &str) {
    let payload = match serde_json::from_str::<ChatPayload>(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Failed to parse chat payload from user {}: {}", user_id, e);
            return;
        }
    };
    if payload.sender_id != user_id {
        tracing::warn!(
            "User {} published as {}; using the authenticated id",
            user_id,
            payload.sender_id
        );
    }

    let stored = {
        let mut store = state.store.lock().await;
        store.touch(user_id);
        store.store_message(
            user_id,
            payload.receiver_id,
            &payload.content,
            payload.client_message_id.clone(),
            payload.event_id,
        )
    };
    let stored = match stored {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!("Dropping chat message from user {}: {}", user_id, e);
            return;
        }
    };

    let delivered = ChatPayload {
        sender_id: user_id,
        receiver_id: stored.receiver,
        content: stored.content.clone(),
        is_event_link: payload.is_event_link,
        event_id: stored.event_id,
        client_message_id: stored.client_message_id.clone(),
        id: Some(stored.id),
        timestamp: Some(format_wire_timestamp(stored.sent_at)),
    };
    let body = match serde_json::to_string(&delivered) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("Failed to serialize chat payload: {}", e);
            return;
        }
    };

    let mut count = state
        .broker
        .publish(&user_queue(stored.receiver), &body)
        .await;
    if stored.receiver != user_id {
        count += state.broker.publish(&user_queue(user_id), &body).await;
    }
    tracing::info!(
        "Message #{} from {} to {} delivered to {} subscription(s)",
        stored.id,
        user_id,
        stored.receiver,
        count
    );
}
