//! Conversion logic between wire DTOs and domain types.

use alumnibridge_shared::{
    dto::{http as dto, live},
    time::parse_timestamp,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::{
    domain::{
        ChatMessage, ConnectionRequest, Conversation, Delivery, Event, EventId, MessageId, Person,
        RequestId, Role, UserId, validation::EventForm,
    },
    error::RequestError,
    session::Session,
};

// ========================================
// DTO → Domain
// ========================================

impl From<dto::UserDto> for Person {
    fn from(dto: dto::UserDto) -> Self {
        Self {
            id: UserId(dto.id),
            name: dto.name.unwrap_or_default(),
            email: dto.email.unwrap_or_default(),
            role: dto.role.as_deref().and_then(Role::parse),
            institute: non_blank(dto.institute),
            degree_name: non_blank(dto.degree_name),
            batch_year: dto.batch_year,
            headline: non_blank(dto.headline),
            skills: dto.skills.as_deref().map(split_skills).unwrap_or_default(),
            picture_url: non_blank(dto.picture_url),
            is_online: dto.is_online.unwrap_or(false),
            last_active_at: dto.last_active_at.as_deref().and_then(parse_timestamp),
        }
    }
}

impl From<dto::ConnectionRequestDto> for ConnectionRequest {
    fn from(dto: dto::ConnectionRequestDto) -> Self {
        Self {
            id: RequestId(dto.id),
            sender: dto.sender.into(),
            receiver: dto.receiver.into(),
            created_at: dto.created_at.as_deref().and_then(parse_timestamp),
        }
    }
}

impl From<dto::ChatContactDto> for Conversation {
    fn from(dto: dto::ChatContactDto) -> Self {
        let person = Person {
            is_online: dto.is_online,
            last_active_at: dto.last_active_at.as_deref().and_then(parse_timestamp),
            headline: non_blank(dto.headline),
            picture_url: non_blank(dto.picture_url),
            email: dto.email.unwrap_or_default(),
            role: dto.role.as_deref().and_then(Role::parse),
            ..Person::new(UserId(dto.id), dto.name.unwrap_or_default())
        };
        Self {
            person,
            last_message: dto.last_message,
            last_message_at: dto.last_message_at.as_deref().and_then(parse_timestamp),
        }
    }
}

impl TryFrom<dto::MessageDto> for ChatMessage {
    type Error = RequestError;

    fn try_from(dto: dto::MessageDto) -> Result<Self, Self::Error> {
        let timestamp = parse_timestamp(&dto.timestamp).ok_or_else(|| {
            RequestError::Decode(format!("invalid message timestamp: {}", dto.timestamp))
        })?;
        Ok(Self {
            id: MessageId::Server(dto.id),
            client_message_id: dto.client_message_id.as_deref().and_then(parse_client_id),
            sender_id: UserId(dto.sender_id),
            receiver_id: UserId(dto.recipient_id),
            content: dto.content,
            timestamp,
            delivery: Delivery::Confirmed,
            event_id: dto.event_id,
        })
    }
}

impl TryFrom<dto::EventDto> for Event {
    type Error = RequestError;

    fn try_from(dto: dto::EventDto) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(dto.event_date.trim(), "%Y-%m-%d")
            .map_err(|_| RequestError::Decode(format!("invalid event date: {}", dto.event_date)))?;
        let time = dto.event_time.as_deref().and_then(|time| {
            NaiveTime::parse_from_str(time.trim(), "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M:%S"))
                .ok()
        });
        Ok(Self {
            id: EventId(dto.id),
            title: dto.title,
            description: non_blank(dto.description),
            date,
            time,
            location: non_blank(dto.location),
            organizer: non_blank(dto.organizer).or(non_blank(dto.created_by_name)),
            capacity: dto.capacity,
            registration_count: dto.registration_count.unwrap_or(0),
            is_registered: dto.is_registered.unwrap_or(false),
        })
    }
}

impl TryFrom<dto::AuthResponse> for Session {
    type Error = RequestError;

    fn try_from(dto: dto::AuthResponse) -> Result<Self, Self::Error> {
        let role = Role::parse(&dto.role)
            .ok_or_else(|| RequestError::Decode(format!("unknown role: {}", dto.role)))?;
        Ok(Self {
            token: dto.token,
            user_id: UserId(dto.user_id),
            role,
        })
    }
}

/// Message pushed on the live channel.
///
/// Returns `None` when the broker did not assign an id; such a push cannot be
/// de-duplicated and the thread is reloaded instead.
pub fn message_from_push(payload: live::ChatPayload, received_at: DateTime<Utc>) -> Option<ChatMessage> {
    let id = payload.id?;
    Some(ChatMessage {
        id: MessageId::Server(id),
        client_message_id: payload.client_message_id.as_deref().and_then(parse_client_id),
        sender_id: UserId(payload.sender_id),
        receiver_id: UserId(payload.receiver_id),
        content: payload.content,
        timestamp: payload
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(received_at),
        delivery: Delivery::Confirmed,
        event_id: payload.event_id.filter(|_| payload.is_event_link),
    })
}

// ========================================
// Domain → DTO
// ========================================

/// Outbound live payload for an optimistic entry
pub fn push_payload(message: &ChatMessage) -> live::ChatPayload {
    live::ChatPayload {
        sender_id: message.sender_id.0,
        receiver_id: message.receiver_id.0,
        content: message.content.clone(),
        is_event_link: message.event_id.is_some(),
        event_id: message.event_id,
        client_message_id: message.client_message_id.map(|id| id.to_string()),
        id: None,
        timestamp: None,
    }
}

/// HTTP fallback body for an optimistic entry
pub fn send_request(message: &ChatMessage) -> dto::SendMessageRequest {
    dto::SendMessageRequest {
        recipient_id: message.receiver_id.0,
        content: message.content.clone(),
        client_message_id: message.client_message_id.map(|id| id.to_string()),
    }
}

/// Body of event creation and update. Expects a validated form.
pub fn event_request(form: &EventForm) -> dto::EventRequest {
    dto::EventRequest {
        title: form.title.trim().to_string(),
        description: non_blank(form.description.clone()),
        event_date: form.date.trim().to_string(),
        event_time: form.time.trim().to_string(),
        location: form.location.trim().to_string(),
        organizer: non_blank(form.organizer.clone()),
        capacity: form.capacity_or_default(),
        is_active: form.is_active,
    }
}

fn parse_client_id(value: &str) -> Option<Uuid> {
    Uuid::parse_str(value.trim()).ok()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_skills(skills: &str) -> Vec<String> {
    skills
        .split(',')
        .map(str::trim)
        .filter(|skill| !skill.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_user_dto_to_person() {
        // テスト項目: ユーザー DTO が人物モデルに変換される（スキルは分割、空文字は None）
        // given (前提条件):
        let dto = dto::UserDto {
            id: 9,
            name: Some("Bob".to_string()),
            role: Some("ALUMNI".to_string()),
            institute: Some("  ".to_string()),
            skills: Some("Rust, Go,,".to_string()),
            last_active_at: Some("2025-11-27T10:00:00".to_string()),
            ..Default::default()
        };

        // when (操作):
        let person = Person::from(dto);

        // then (期待する結果):
        assert_eq!(person.id, UserId(9));
        assert_eq!(person.role, Some(Role::Alumni));
        assert_eq!(person.institute, None);
        assert_eq!(person.skills, vec!["Rust".to_string(), "Go".to_string()]);
        assert_eq!(person.last_active_at, Some(at("2025-11-27T10:00:00Z")));
    }

    #[test]
    fn test_message_dto_with_client_id() {
        // テスト項目: クライアント ID をエコーしたメッセージ DTO はその ID を保持する
        // given (前提条件):
        let client_id = Uuid::new_v4();
        let dto = dto::MessageDto {
            id: 3,
            sender_id: 5,
            sender_name: None,
            recipient_id: 9,
            recipient_name: None,
            content: "hi".to_string(),
            timestamp: "2025-11-27T10:00:00.000".to_string(),
            client_message_id: Some(client_id.to_string()),
            event_id: None,
        };

        // when (操作):
        let message = ChatMessage::try_from(dto).unwrap();

        // then (期待する結果):
        assert_eq!(message.id, MessageId::Server(3));
        assert_eq!(message.client_message_id, Some(client_id));
        assert_eq!(message.delivery, Delivery::Confirmed);
    }

    #[test]
    fn test_event_dto_with_invalid_date_is_decode_error() {
        // テスト項目: 日付が不正なイベント DTO はデコードエラーになる
        // given (前提条件):
        let dto = dto::EventDto {
            id: 1,
            title: "Meetup".to_string(),
            event_date: "27/11/2025".to_string(),
            ..Default::default()
        };

        // when (操作):
        let result = Event::try_from(dto);

        // then (期待する結果):
        assert!(matches!(result, Err(RequestError::Decode(_))));
    }

    #[test]
    fn test_event_dto_to_event() {
        // テスト項目: イベント DTO の日付・時刻・登録数が変換される
        // given (前提条件):
        let dto = dto::EventDto {
            id: 1,
            title: "Meetup".to_string(),
            event_date: "2025-12-10".to_string(),
            event_time: Some("18:30".to_string()),
            capacity: Some(50),
            registration_count: Some(49),
            created_by_name: Some("Admin".to_string()),
            ..Default::default()
        };

        // when (操作):
        let event = Event::try_from(dto).unwrap();

        // then (期待する結果):
        assert_eq!(event.time, NaiveTime::from_hms_opt(18, 30, 0));
        assert_eq!(event.registration_count, 49);
        assert_eq!(event.organizer.as_deref(), Some("Admin"));
        assert!(!event.is_registered);
    }

    #[test]
    fn test_push_without_id_is_not_converted() {
        // テスト項目: ID が割り当てられていないプッシュメッセージは変換されない
        // given (前提条件):
        let payload = live::ChatPayload {
            sender_id: 9,
            receiver_id: 5,
            content: "yo".to_string(),
            is_event_link: false,
            event_id: None,
            client_message_id: None,
            id: None,
            timestamp: None,
        };

        // when (操作):
        let message = message_from_push(payload, at("2025-11-27T12:00:00Z"));

        // then (期待する結果):
        assert_eq!(message, None);
    }

    #[test]
    fn test_push_payload_carries_client_id() {
        // テスト項目: 送信ペイロードには楽観的エントリの一時 ID が含まれる
        // given (前提条件):
        let message = ChatMessage::optimistic(UserId(5), UserId(9), "hello", at("2025-11-27T12:00:00Z"));

        // when (操作):
        let payload = push_payload(&message);

        // then (期待する結果):
        assert_eq!(payload.sender_id, 5);
        assert_eq!(payload.receiver_id, 9);
        assert_eq!(
            payload.client_message_id,
            message.client_message_id.map(|id| id.to_string())
        );
        assert!(!payload.is_event_link);
    }

    #[test]
    fn test_event_form_to_request_trims_and_defaults() {
        // テスト項目: イベントフォームの送信ボディは前後の空白を除き、空の任意項目と定員を補完する
        // given (前提条件):
        let form = EventForm {
            title: " Meetup ".to_string(),
            description: Some("   ".to_string()),
            date: "2025-12-10".to_string(),
            time: " 18:00".to_string(),
            location: "Hall A ".to_string(),
            ..Default::default()
        };

        // when (操作):
        let request = event_request(&form);

        // then (期待する結果):
        assert_eq!(request.title, "Meetup");
        assert_eq!(request.description, None);
        assert_eq!(request.event_time, "18:00");
        assert_eq!(request.location, "Hall A");
        assert_eq!(request.capacity, 100);
        assert!(request.is_active);
    }
}
