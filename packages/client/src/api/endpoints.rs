//! バックエンド API の trait 定義
//!
//! UseCase 層はこれらの trait に依存し、HTTP の具体的な実装（[`ApiClient`]）には依存しない。
//! テストでは mockall が生成するモックに差し替える。

use alumnibridge_shared::dto::http::{
    self as dto, BatchDto, DegreeDto, EventRequest, MyRegistrationsDto, RegisterRequest,
};
use async_trait::async_trait;
use serde_json::json;

use super::{
    client::{ApiClient, confirmation_text},
    conversion,
};
use crate::{
    domain::{ChatMessage, ConnectionRequest, Conversation, Event, EventId, Person, RequestId, UserId},
    error::RequestError,
    session::Session,
};

/// 認証 API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/login`
    async fn login(&self, email: String, password: String) -> Result<Session, RequestError>;

    /// `POST /auth/register`
    async fn register(&self, request: RegisterRequest) -> Result<Session, RequestError>;
}

/// ユーザー API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersApi: Send + Sync {
    /// `GET /users/me`
    async fn current_user(&self) -> Result<Person, RequestError>;

    /// `GET /users/search`（検索語なしで全ユーザー）
    async fn search_users(&self, query: Option<String>) -> Result<Vec<Person>, RequestError>;
}

/// つながり（コネクション）API
///
/// 承認・拒否はリクエスト ID、取り消し・切断は相手のユーザー ID を指定する。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionsApi: Send + Sync {
    /// `GET /users/connections`
    async fn connections(&self) -> Result<Vec<Person>, RequestError>;

    /// `GET /users/connection-requests`（受信したリクエスト）
    async fn received_requests(&self) -> Result<Vec<ConnectionRequest>, RequestError>;

    /// `GET /users/sent-requests`（送信したリクエスト）
    async fn sent_requests(&self) -> Result<Vec<ConnectionRequest>, RequestError>;

    /// `POST /users/connect/{receiverId}`
    async fn send_request(&self, receiver_id: UserId) -> Result<Option<String>, RequestError>;

    /// `POST /users/connection/{requestId}/respond?accept=...`
    async fn respond(&self, request_id: RequestId, accept: bool) -> Result<Option<String>, RequestError>;

    /// `POST /users/disconnect/{userId}`（どちら向きのエッジでも削除される）
    async fn remove_connection(&self, user_id: UserId) -> Result<Option<String>, RequestError>;
}

/// チャット API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /chat/connections`
    async fn conversations(&self) -> Result<Vec<Conversation>, RequestError>;

    /// `GET /messages/{userId}`
    async fn messages(&self, user_id: UserId) -> Result<Vec<ChatMessage>, RequestError>;

    /// `POST /messages`（ライブチャネルが使えない場合のフォールバック）
    async fn send_message(&self, message: ChatMessage) -> Result<ChatMessage, RequestError>;

    /// `POST /users/heartbeat`
    async fn heartbeat(&self) -> Result<(), RequestError>;
}

/// イベント API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventsApi: Send + Sync {
    /// `GET /events/active`
    async fn active_events(&self) -> Result<Vec<Event>, RequestError>;

    /// `GET /events/my-registrations`
    async fn my_registrations(&self) -> Result<Vec<EventId>, RequestError>;

    /// `POST /events/register/{id}`
    async fn register(&self, event_id: EventId) -> Result<Option<String>, RequestError>;

    /// `POST /events/unregister/{id}`
    async fn unregister(&self, event_id: EventId) -> Result<Option<String>, RequestError>;

    /// `POST /events/`
    async fn create_event(&self, request: EventRequest) -> Result<Event, RequestError>;

    /// `PUT /events/{id}`
    async fn update_event(&self, event_id: EventId, request: EventRequest) -> Result<Event, RequestError>;

    /// `DELETE /events/{id}`
    async fn delete_event(&self, event_id: EventId) -> Result<Option<String>, RequestError>;
}

/// 卒業年度・学位の参照 API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// `GET /batches`
    async fn batches(&self) -> Result<Vec<BatchDto>, RequestError>;

    /// `GET /degrees`
    async fn degrees(&self) -> Result<Vec<DegreeDto>, RequestError>;

    /// `GET /batches/{id}`
    async fn batch_members(&self, batch_id: i64) -> Result<Vec<Person>, RequestError>;
}

// ========================================
// HTTP 実装
// ========================================

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, email: String, password: String) -> Result<Session, RequestError> {
        let request = dto::LoginRequest { email, password };
        let response: dto::AuthResponse =
            self.post_json("/auth/login", &request).await?;
        Session::try_from(response)
    }

    async fn register(&self, request: RegisterRequest) -> Result<Session, RequestError> {
        let response: dto::AuthResponse =
            self.post_json("/auth/register", &request).await?;
        Session::try_from(response)
    }
}

#[async_trait]
impl UsersApi for ApiClient {
    async fn current_user(&self) -> Result<Person, RequestError> {
        let user: dto::UserDto = self.get("/users/me").await?;
        Ok(user.into())
    }

    async fn search_users(&self, query: Option<String>) -> Result<Vec<Person>, RequestError> {
        let users: Vec<dto::UserDto> =
            match query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
                Some(q) => {
                    self.get_list_with_query("/users/search", &[("q", q)])
                        .await?
                }
                None => self.get_list("/users/search").await?,
            };
        Ok(users.into_iter().map(Person::from).collect())
    }
}

#[async_trait]
impl ConnectionsApi for ApiClient {
    async fn connections(&self) -> Result<Vec<Person>, RequestError> {
        let users: Vec<dto::UserDto> =
            self.get_list("/users/connections").await?;
        Ok(users.into_iter().map(Person::from).collect())
    }

    async fn received_requests(&self) -> Result<Vec<ConnectionRequest>, RequestError> {
        let requests: Vec<dto::ConnectionRequestDto> =
            self.get_list("/users/connection-requests").await?;
        Ok(requests.into_iter().map(ConnectionRequest::from).collect())
    }

    async fn sent_requests(&self) -> Result<Vec<ConnectionRequest>, RequestError> {
        let requests: Vec<dto::ConnectionRequestDto> =
            self.get_list("/users/sent-requests").await?;
        Ok(requests.into_iter().map(ConnectionRequest::from).collect())
    }

    async fn send_request(&self, receiver_id: UserId) -> Result<Option<String>, RequestError> {
        let body = self
            .post(&format!("/users/connect/{}", receiver_id), None)
            .await?;
        Ok(confirmation_text(body))
    }

    async fn respond(&self, request_id: RequestId, accept: bool) -> Result<Option<String>, RequestError> {
        let body = self
            .post(
                &format!("/users/connection/{}/respond?accept={}", request_id, accept),
                None,
            )
            .await?;
        Ok(confirmation_text(body))
    }

    async fn remove_connection(&self, user_id: UserId) -> Result<Option<String>, RequestError> {
        let body = self
            .post(&format!("/users/disconnect/{}", user_id), None)
            .await?;
        Ok(confirmation_text(body))
    }
}

#[async_trait]
impl ChatApi for ApiClient {
    async fn conversations(&self) -> Result<Vec<Conversation>, RequestError> {
        let contacts: Vec<dto::ChatContactDto> =
            self.get_list("/chat/connections").await?;
        Ok(contacts.into_iter().map(Conversation::from).collect())
    }

    async fn messages(&self, user_id: UserId) -> Result<Vec<ChatMessage>, RequestError> {
        let messages: Vec<dto::MessageDto> =
            self.get_list(&format!("/messages/{}", user_id)).await?;
        messages.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn send_message(&self, message: ChatMessage) -> Result<ChatMessage, RequestError> {
        let request = conversion::send_request(&message);
        let mut saved: dto::MessageDto =
            self.post_json("/messages", &request).await?;
        // The echo is required for replace-in-place; keep ours if the backend drops it
        if saved.client_message_id.is_none() {
            saved.client_message_id = request.client_message_id;
        }
        ChatMessage::try_from(saved)
    }

    async fn heartbeat(&self) -> Result<(), RequestError> {
        self.post("/users/heartbeat", Some(&json!({}))).await?;
        Ok(())
    }
}

#[async_trait]
impl EventsApi for ApiClient {
    async fn active_events(&self) -> Result<Vec<Event>, RequestError> {
        let events: Vec<dto::EventDto> =
            self.get_list("/events/active").await?;
        events.into_iter().map(Event::try_from).collect()
    }

    async fn my_registrations(&self) -> Result<Vec<EventId>, RequestError> {
        let registrations: MyRegistrationsDto = self.get("/events/my-registrations").await?;
        Ok(registrations
            .registered_event_ids
            .into_iter()
            .map(EventId)
            .collect())
    }

    async fn register(&self, event_id: EventId) -> Result<Option<String>, RequestError> {
        let body = self
            .post(&format!("/events/register/{}", event_id), None)
            .await?;
        Ok(confirmation_text(body))
    }

    async fn unregister(&self, event_id: EventId) -> Result<Option<String>, RequestError> {
        let body = self
            .post(&format!("/events/unregister/{}", event_id), None)
            .await?;
        Ok(confirmation_text(body))
    }

    async fn create_event(&self, request: EventRequest) -> Result<Event, RequestError> {
        let event: dto::EventDto = self.post_json("/events/", &request).await?;
        Event::try_from(event)
    }

    async fn update_event(&self, event_id: EventId, request: EventRequest) -> Result<Event, RequestError> {
        let event: dto::EventDto = self
            .put_json(&format!("/events/{}", event_id), &request)
            .await?;
        Event::try_from(event)
    }

    async fn delete_event(&self, event_id: EventId) -> Result<Option<String>, RequestError> {
        let body = self.delete(&format!("/events/{}", event_id)).await?;
        Ok(confirmation_text(body))
    }
}

#[async_trait]
impl DirectoryApi for ApiClient {
    async fn batches(&self) -> Result<Vec<BatchDto>, RequestError> {
        self.get_list("/batches").await
    }

    async fn degrees(&self) -> Result<Vec<DegreeDto>, RequestError> {
        self.get_list("/degrees").await
    }

    async fn batch_members(&self, batch_id: i64) -> Result<Vec<Person>, RequestError> {
        let batch: dto::BatchMembersDto =
            self.get(&format!("/batches/{}", batch_id)).await?;
        Ok(batch.users.into_iter().map(Person::from).collect())
    }
}
