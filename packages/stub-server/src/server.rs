//! Server execution logic.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{get, post, put},
};
use tokio::{net::TcpListener, task::JoinHandle};
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        active_events, batch_detail, batches, chat_connections, connect, connection_requests,
        connections, create_event, degrees, delete_event, disconnect, health_check, heartbeat,
        login, me, messages_with, my_registrations, register, register_event, respond,
        search_users, send_message, sent_requests, unregister_event, update_event,
        websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
    store::Store,
};

/// Routes of the HTTP API and the live channel
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket エンドポイント
        .route("/ws", get(websocket_handler))
        // HTTP エンドポイント
        .route("/api/health", get(health_check))
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/users/me", get(me))
        .route("/api/users/search", get(search_users))
        .route("/api/users/connections", get(connections))
        .route("/api/users/connection-requests", get(connection_requests))
        .route("/api/users/sent-requests", get(sent_requests))
        .route("/api/users/connect/{receiver_id}", post(connect))
        .route("/api/users/connection/{request_id}/respond", post(respond))
        .route("/api/users/disconnect/{user_id}", post(disconnect))
        .route("/api/users/heartbeat", post(heartbeat))
        .route("/api/chat/connections", get(chat_connections))
        .route("/api/messages", post(send_message))
        .route("/api/messages/{user_id}", get(messages_with))
        .route("/api/events/", post(create_event))
        .route("/api/events/{event_id}", put(update_event).delete(delete_event))
        .route("/api/events/active", get(active_events))
        .route("/api/events/my-registrations", get(my_registrations))
        .route("/api/events/register/{event_id}", post(register_event))
        .route("/api/events/unregister/{event_id}", post(unregister_event))
        .route("/api/batches", get(batches))
        .route("/api/batches/{batch_id}", get(batch_detail))
        .route("/api/degrees", get(degrees))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the stub backend until Ctrl+C
///
/// # Arguments
///
/// * `host` - The host address to bind to (e.g., "127.0.0.1")
/// * `port` - The port number to bind to (e.g., 8080)
///
/// # Errors
///
/// Returns an error if the server fails to bind to the specified address or
/// if there's an error during server execution.
pub async fn run_server(host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(Arc::new(AppState::default()));

    let bind_addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Stub backend listening on {}", listener.local_addr()?);
    tracing::info!("API base: http://{}/api", bind_addr);
    tracing::info!("Live channel: ws://{}/ws", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// A stub backend running in the current runtime on an ephemeral port.
///
/// The server stops when the value is dropped.
pub struct StubServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    task: JoinHandle<()>,
}

impl StubServer {
    /// Start with the seeded store
    pub async fn spawn() -> std::io::Result<Self> {
        Self::spawn_with(Store::default()).await
    }

    pub async fn spawn_with(store: Store) -> std::io::Result<Self> {
        let state = Arc::new(AppState::new(store));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = router(state.clone());

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Stub backend error: {}", e);
            }
        });
        tracing::debug!("Stub backend started on {}", addr);

        Ok(Self { addr, state, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL every API path is appended to
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Issue a bearer token without going through login
    pub async fn token_for(&self, user_id: i64) -> String {
        self.state.store.lock().await.issue_token(user_id)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
