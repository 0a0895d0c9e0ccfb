//! Chat messages and the per-conversation timeline.
//!
//! Messages reach a timeline from three producers: the live channel, the
//! polling timer and the HTTP send confirmation. The timeline is the single
//! consumer and de-duplicates them:
//!
//! - an optimistic entry carries a client-generated id; a message echoing that
//!   id replaces the entry in place
//! - a server id already present is ignored

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::person::UserId;

/// Identity of a rendered message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Assigned by the backend
    Server(i64),
    /// Temporary id of an optimistic entry
    Pending(Uuid),
}

/// Delivery state of a rendered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    /// Client id echoed back by the backend for messages this client sent
    pub client_message_id: Option<Uuid>,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub delivery: Delivery,
    /// Shared event reference, when the message links an event
    pub event_id: Option<i64>,
}

impl ChatMessage {
    /// Optimistic entry rendered before the backend confirms it
    pub fn optimistic(
        sender_id: UserId,
        receiver_id: UserId,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let client_id = Uuid::new_v4();
        Self {
            id: MessageId::Pending(client_id),
            client_message_id: Some(client_id),
            sender_id,
            receiver_id,
            content: content.into(),
            timestamp: now,
            delivery: Delivery::Pending,
            event_id: None,
        }
    }

    /// Whether the message was exchanged with `counterpart`
    pub fn involves(&self, counterpart: UserId) -> bool {
        self.sender_id == counterpart || self.receiver_id == counterpart
    }

    pub fn is_sent_by(&self, user_id: UserId) -> bool {
        self.sender_id == user_id
    }
}

/// Result of applying a message to a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// New message inserted in timestamp order
    Appended,
    /// Optimistic entry replaced in place by its confirmation
    Confirmed,
    /// Already rendered
    Duplicate,
    /// Belongs to another conversation
    Ignored,
}

impl ApplyOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, ApplyOutcome::Appended | ApplyOutcome::Confirmed)
    }
}

/// Messages of the open conversation, ordered by timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    me: UserId,
    counterpart: UserId,
    messages: Vec<ChatMessage>,
}

impl Timeline {
    pub fn new(me: UserId, counterpart: UserId) -> Self {
        Self {
            me,
            counterpart,
            messages: Vec::new(),
        }
    }

    pub fn counterpart(&self) -> UserId {
        self.counterpart
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Render an optimistic entry for `content` and return it
    pub fn push_optimistic(&mut self, content: &str, now: DateTime<Utc>) -> ChatMessage {
        let message = ChatMessage::optimistic(self.me, self.counterpart, content, now);
        self.messages.push(message.clone());
        message
    }

    /// Apply a message from any producer
    pub fn apply(&mut self, message: ChatMessage) -> ApplyOutcome {
        if !message.involves(self.counterpart) {
            return ApplyOutcome::Ignored;
        }

        if let Some(client_id) = message.client_message_id
            && let Some(index) = self
                .messages
                .iter()
                .position(|m| m.client_message_id == Some(client_id))
        {
            let existing = &mut self.messages[index];
            if existing.delivery == Delivery::Confirmed && existing.id == message.id {
                return ApplyOutcome::Duplicate;
            }
            *existing = ChatMessage {
                delivery: Delivery::Confirmed,
                ..message
            };
            return ApplyOutcome::Confirmed;
        }

        if let MessageId::Server(_) = message.id
            && self.messages.iter().any(|m| m.id == message.id)
        {
            return ApplyOutcome::Duplicate;
        }

        let index = self
            .messages
            .iter()
            .rposition(|m| m.timestamp <= message.timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.messages.insert(
            index,
            ChatMessage {
                delivery: Delivery::Confirmed,
                ..message
            },
        );
        ApplyOutcome::Appended
    }

    /// Apply a full history snapshot (poll or reload). Returns how many entries changed.
    pub fn apply_snapshot(&mut self, messages: Vec<ChatMessage>) -> usize {
        messages
            .into_iter()
            .map(|message| self.apply(message))
            .filter(ApplyOutcome::changed)
            .count()
    }

    /// Mark an optimistic entry as not delivered
    pub fn mark_failed(&mut self, client_id: Uuid) -> bool {
        match self
            .messages
            .iter_mut()
            .find(|m| m.client_message_id == Some(client_id) && m.delivery == Delivery::Pending)
        {
            Some(message) => {
                message.delivery = Delivery::Failed;
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.delivery == Delivery::Pending)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ME: UserId = UserId(5);
    const BOB: UserId = UserId(9);

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-11-27T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn server_message(id: i64, sender: UserId, receiver: UserId, offset_secs: i64) -> ChatMessage {
        ChatMessage {
            id: MessageId::Server(id),
            client_message_id: None,
            sender_id: sender,
            receiver_id: receiver,
            content: format!("message {}", id),
            timestamp: t0() + Duration::seconds(offset_secs),
            delivery: Delivery::Confirmed,
            event_id: None,
        }
    }

    #[test]
    fn test_optimistic_entry_is_pending() {
        // テスト項目: 楽観的に追加されたメッセージは保留状態で一時 ID を持つ
        // given (前提条件):
        let mut timeline = Timeline::new(ME, BOB);

        // when (操作):
        let entry = timeline.push_optimistic("hello", t0());

        // then (期待する結果):
        assert_eq!(entry.delivery, Delivery::Pending);
        assert!(matches!(entry.id, MessageId::Pending(_)));
        assert_eq!(entry.receiver_id, BOB);
        assert_eq!(timeline.pending_count(), 1);
    }

    #[test]
    fn test_confirmation_echoing_client_id_replaces_in_place() {
        // テスト項目: 一時 ID をエコーした確認メッセージは楽観的エントリを置き換える（重複しない）
        // given (前提条件):
        let mut timeline = Timeline::new(ME, BOB);
        timeline.apply(server_message(1, BOB, ME, -60));
        let entry = timeline.push_optimistic("hello", t0());
        let mut confirmation = server_message(2, ME, BOB, 1);
        confirmation.content = "hello".to_string();
        confirmation.client_message_id = entry.client_message_id;

        // when (操作):
        let outcome = timeline.apply(confirmation);

        // then (期待する結果):
        assert_eq!(outcome, ApplyOutcome::Confirmed);
        assert_eq!(timeline.messages().len(), 2);
        assert_eq!(timeline.messages()[1].id, MessageId::Server(2));
        assert_eq!(timeline.pending_count(), 0);
    }

    #[test]
    fn test_same_server_message_from_two_producers_renders_once() {
        // テスト項目: プッシュとポーリングの両方で同じメッセージを受け取っても 1 回だけ表示される
        // given (前提条件):
        let mut timeline = Timeline::new(ME, BOB);
        let pushed = server_message(7, BOB, ME, 0);
        let polled = pushed.clone();

        // when (操作):
        let first = timeline.apply(pushed);
        let second = timeline.apply(polled);

        // then (期待する結果):
        assert_eq!(first, ApplyOutcome::Appended);
        assert_eq!(second, ApplyOutcome::Duplicate);
        assert_eq!(timeline.messages().len(), 1);
    }

    #[test]
    fn test_confirmation_seen_twice_is_duplicate() {
        // テスト項目: 確認済みメッセージを再度受け取っても重複として扱われる
        // given (前提条件):
        let mut timeline = Timeline::new(ME, BOB);
        let entry = timeline.push_optimistic("hi", t0());
        let mut confirmation = server_message(3, ME, BOB, 0);
        confirmation.client_message_id = entry.client_message_id;
        timeline.apply(confirmation.clone());

        // when (操作):
        let outcome = timeline.apply(confirmation);

        // then (期待する結果):
        assert_eq!(outcome, ApplyOutcome::Duplicate);
        assert_eq!(timeline.messages().len(), 1);
    }

    #[test]
    fn test_message_for_other_conversation_is_ignored() {
        // テスト項目: 別の相手とのメッセージは現在のスレッドに追加されない
        // given (前提条件):
        let mut timeline = Timeline::new(ME, BOB);
        let other = server_message(4, UserId(12), ME, 0);

        // when (操作):
        let outcome = timeline.apply(other);

        // then (期待する結果):
        assert_eq!(outcome, ApplyOutcome::Ignored);
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_messages_are_kept_in_timestamp_order() {
        // テスト項目: 到着順に関係なくタイムスタンプ順に並ぶ
        // given (前提条件):
        let mut timeline = Timeline::new(ME, BOB);

        // when (操作):
        let changed = timeline.apply_snapshot(vec![
            server_message(3, BOB, ME, 30),
            server_message(1, ME, BOB, 10),
            server_message(2, BOB, ME, 20),
        ]);

        // then (期待する結果):
        let ids: Vec<MessageId> = timeline.messages().iter().map(|m| m.id).collect();
        assert_eq!(changed, 3);
        assert_eq!(
            ids,
            vec![
                MessageId::Server(1),
                MessageId::Server(2),
                MessageId::Server(3)
            ]
        );
    }

    #[test]
    fn test_mark_failed_only_affects_pending_entry() {
        // テスト項目: 送信失敗は該当する保留中エントリのみに反映される
        // given (前提条件):
        let mut timeline = Timeline::new(ME, BOB);
        let entry = timeline.push_optimistic("lost", t0());
        let client_id = entry.client_message_id.unwrap();

        // when (操作):
        let first = timeline.mark_failed(client_id);
        let second = timeline.mark_failed(client_id);

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert_eq!(timeline.messages()[0].delivery, Delivery::Failed);
    }
}
