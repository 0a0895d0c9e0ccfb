//! HTTP API endpoint handlers.

use std::sync::Arc;

use alumnibridge_shared::{
    dto::http::{
        AuthResponse, BatchDto, BatchMembersDto, ChatContactDto, ConnectionRequestDto, DegreeDto,
        EventDto, EventRequest, LoginRequest, MessageDto, MyRegistrationsDto, RegisterRequest,
        SendMessageRequest, UserDto,
    },
    time::format_wire_timestamp,
};
use axum::{
    Json,
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{error::ApiError, state::AppState};

/// The signed-in user, resolved from the bearer token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        state.authenticate(authorization).await.map(AuthUser)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondQuery {
    pub accept: bool,
}

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

// ========================================
// Auth
// ========================================

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = state
        .store
        .lock()
        .await
        .login(&request.email, &request.password)?;
    tracing::info!("User {} signed in", response.user_id);
    Ok(Json(response))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = state.store.lock().await.register(request)?;
    tracing::info!("User {} registered as {}", response.user_id, response.role);
    Ok(Json(response))
}

// ========================================
// Users and connections
// ========================================

pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
) -> Result<Json<UserDto>, ApiError> {
    state.store.lock().await.me(me).map(Json)
}

pub async fn search_users(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<UserDto>> {
    Json(state.store.lock().await.search(query.q.as_deref()))
}

pub async fn connections(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
) -> Json<Vec<UserDto>> {
    Json(state.store.lock().await.connections(me))
}

pub async fn connection_requests(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
) -> Json<Vec<ConnectionRequestDto>> {
    Json(state.store.lock().await.received_requests(me))
}

pub async fn sent_requests(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
) -> Json<Vec<ConnectionRequestDto>> {
    Json(state.store.lock().await.sent_requests(me))
}

pub async fn connect(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
    Path(receiver_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let request_id = state.store.lock().await.send_request(me, receiver_id)?;
    tracing::info!(
        "Connection request #{} from {} to {}",
        request_id,
        me,
        receiver_id
    );
    Ok(Json(json!({"message": "Connection request sent"})))
}

/// Answers in plain text, like the backend does
pub async fn respond(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
    Path(request_id): Path<i64>,
    Query(query): Query<RespondQuery>,
) -> Result<&'static str, ApiError> {
    state
        .store
        .lock()
        .await
        .respond(me, request_id, query.accept)?;
    tracing::info!(
        "Connection request #{} {} by {}",
        request_id,
        if query.accept { "accepted" } else { "rejected" },
        me
    );
    Ok(if query.accept {
        "Connection Accepted"
    } else {
        "Connection Rejected"
    })
}

pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
    Path(user_id): Path<i64>,
) -> &'static str {
    let removed = state.store.lock().await.disconnect(me, user_id);
    tracing::info!("Removed {} edge(s) between {} and {}", removed, me, user_id);
    "Connection removed"
}

pub async fn heartbeat(State(state): State<Arc<AppState>>, AuthUser(me): AuthUser) -> Json<Value> {
    state.store.lock().await.touch(me);
    Json(json!({"status": "ok", "timestamp": format_wire_timestamp(Utc::now())}))
}

// ========================================
// Chat
// ========================================

pub async fn chat_connections(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
) -> Json<Vec<ChatContactDto>> {
    Json(state.store.lock().await.chat_contacts(me))
}

pub async fn messages_with(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
    Path(user_id): Path<i64>,
) -> Json<Vec<MessageDto>> {
    let mut store = state.store.lock().await;
    store.touch(me);
    Json(store.conversation(me, user_id))
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<MessageDto>, ApiError> {
    let mut store = state.store.lock().await;
    store.touch(me);
    let message = store.store_message(
        me,
        request.recipient_id,
        &request.content,
        request.client_message_id,
        None,
    )?;
    tracing::info!("Message #{} from {} to {} over HTTP", message.id, me, message.receiver);
    Ok(Json(store.message_dto(&message)))
}

// ========================================
// Events
// ========================================

pub async fn active_events(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
) -> Json<Vec<EventDto>> {
    let today = Utc::now().date_naive();
    Json(state.store.lock().await.active_events(me, today))
}

pub async fn my_registrations(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
) -> Json<MyRegistrationsDto> {
    Json(state.store.lock().await.my_registrations(me))
}

pub async fn register_event(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
    Path(event_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.store.lock().await.register_event(me, event_id)?;
    tracing::info!("User {} registered for event #{}", me, event_id);
    Ok(Json(json!({"message": "Successfully registered for event"})))
}

pub async fn unregister_event(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
    Path(event_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.store.lock().await.unregister_event(me, event_id)?;
    tracing::info!("User {} unregistered from event #{}", me, event_id);
    Ok(Json(json!({"message": "Successfully unregistered from event"})))
}

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
    Json(request): Json<EventRequest>,
) -> Result<Json<EventDto>, ApiError> {
    let event = state.store.lock().await.create_event(me, request)?;
    tracing::info!("User {} created event #{} '{}'", me, event.id, event.title);
    Ok(Json(event))
}

pub async fn update_event(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
    Path(event_id): Path<i64>,
    Json(request): Json<EventRequest>,
) -> Result<Json<EventDto>, ApiError> {
    let event = state.store.lock().await.update_event(me, event_id, request)?;
    tracing::info!("User {} updated event #{}", me, event_id);
    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    AuthUser(me): AuthUser,
    Path(event_id): Path<i64>,
) -> Result<&'static str, ApiError> {
    state.store.lock().await.delete_event(event_id)?;
    tracing::info!("User {} deleted event #{}", me, event_id);
    Ok("Event deleted successfully")
}

// ========================================
// Directory
// ========================================

pub async fn batches(State(state): State<Arc<AppState>>) -> Json<Vec<BatchDto>> {
    Json(state.store.lock().await.batches())
}

pub async fn degrees(State(state): State<Arc<AppState>>) -> Json<Vec<DegreeDto>> {
    Json(state.store.lock().await.degrees())
}

pub async fn batch_detail(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<i64>,
) -> Result<Json<BatchMembersDto>, ApiError> {
    state.store.lock().await.batch_members(batch_id).map(Json)
}
