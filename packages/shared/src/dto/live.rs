//! Live channel payloads.

use serde::{Deserialize, Serialize};

/// Destination outbound chat messages are published to
pub const CHAT_SEND_DESTINATION: &str = "/app/chat.send";

/// Per-user inbound destination
pub fn user_queue(user_id: i64) -> String {
    format!("/queue/messages/{}", user_id)
}

/// Body of a `SEND` to [`CHAT_SEND_DESTINATION`] and of the resulting `MESSAGE`.
///
/// The broker fills `id` and `timestamp` when it stores the message and echoes
/// `clientMessageId` unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    #[serde(default)]
    pub is_event_link: bool,
    #[serde(default)]
    pub event_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_uses_backend_field_names() {
        // テスト項目: ペイロードはバックエンドのフィールド名でシリアライズされる
        // given (前提条件):
        let payload = ChatPayload {
            sender_id: 5,
            receiver_id: 9,
            content: "hi".to_string(),
            is_event_link: false,
            event_id: None,
            client_message_id: Some("abc".to_string()),
            id: None,
            timestamp: None,
        };

        // when (操作):
        let json = serde_json::to_string(&payload).unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            r#"{"senderId":5,"receiverId":9,"content":"hi","isEventLink":false,"eventId":null,"clientMessageId":"abc"}"#
        );
    }

    #[test]
    fn test_payload_without_broker_fields_parses() {
        // テスト項目: ID やタイムスタンプのないプッシュメッセージも解析できる
        // given (前提条件):
        let json = r#"{"senderId":9,"receiverId":5,"content":"yo","isEventLink":true,"eventId":3}"#;

        // when (操作):
        let payload: ChatPayload = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(payload.event_id, Some(3));
        assert!(payload.is_event_link);
        assert_eq!(payload.id, None);
        assert_eq!(user_queue(payload.receiver_id), "/queue/messages/5");
    }
}
