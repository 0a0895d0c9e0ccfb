//! Plain-text rendering of the client views.

use alumnibridge_shared::{
    dto::http::{BatchDto, DegreeDto},
    time::{format_clock_time, format_date_label, format_time_ago},
};
use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    domain::{
        ChatMessage, ConnectionRequest, Control, Conversation, Delivery, Event, Person, Timeline,
        UserId,
    },
    live::ChannelState,
    usecase::{Badges, PersonCard, RequestTab},
};

const RULE: &str = "============================================================";
const THIN_RULE: &str = "------------------------------------------------------------";

/// Formatter for the text views
pub struct Formatter;

impl Formatter {
    /// Format a person card with its status and call-to-action controls
    ///
    /// # Arguments
    ///
    /// * `card` - The card to render
    ///
    /// # Returns
    ///
    /// One line per card, e.g. `[9] Bob (ALUMNI, 2019) ... [Pending] [Cancel Request]`
    pub fn format_person_card(card: &PersonCard) -> String {
        format!(
            "[{}] {}{}  {}\n",
            card.person.id,
            Self::format_person_summary(&card.person),
            Self::format_online(&card.person),
            Self::format_controls(&card.controls)
        )
    }

    /// Name, role and profile attributes of a person
    pub fn format_person_summary(person: &Person) -> String {
        let mut details: Vec<String> = Vec::new();
        if let Some(role) = person.role {
            details.push(role.as_str().to_string());
        }
        if let Some(batch) = person.batch_year {
            details.push(batch.to_string());
        }
        if let Some(degree) = &person.degree_name {
            details.push(degree.clone());
        }
        if let Some(institute) = &person.institute {
            details.push(institute.clone());
        }

        let mut summary = person.display_name().to_string();
        if !details.is_empty() {
            summary.push_str(&format!(" ({})", details.join(", ")));
        }
        if let Some(headline) = &person.headline {
            summary.push_str(&format!(" - {}", headline));
        }
        summary
    }

    fn format_online(person: &Person) -> &'static str {
        if person.is_online { " ●" } else { "" }
    }

    /// Controls as bracketed buttons; disabled ones are shown in parentheses
    pub fn format_controls(controls: &[Control]) -> String {
        controls
            .iter()
            .map(|control| {
                if control.enabled {
                    format!("[{}]", control.label)
                } else {
                    format!("({})", control.label)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Tab header with badge counts
    pub fn format_badges(badges: &Badges) -> String {
        format!(
            "Connections ({})  |  Received ({})  |  Sent ({})\n",
            badges.connections, badges.received, badges.sent
        )
    }

    /// A pending request as shown on the received or sent tab
    pub fn format_request(request: &ConnectionRequest, tab: RequestTab, now: DateTime<Utc>) -> String {
        let (person, controls) = match tab {
            RequestTab::Received => (&request.sender, "[Accept] [Reject]"),
            RequestTab::Sent => (&request.receiver, "(Pending) [Cancel Request]"),
        };
        let when = request
            .created_at
            .map(|at| format!(" · {}", format_time_ago(at, now)))
            .unwrap_or_default();
        format!(
            "#{} [{}] {}{}  {}\n",
            request.id,
            person.id,
            Self::format_person_summary(person),
            when,
            controls
        )
    }

    /// Format the conversation list
    ///
    /// # Arguments
    ///
    /// * `conversations` - Conversations, most recent first
    /// * `open` - Counterpart of the open conversation (marked with `>`)
    /// * `now` - Current time for the time-ago labels
    pub fn format_conversations(
        conversations: &[&Conversation],
        open: Option<UserId>,
        now: DateTime<Utc>,
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\nConversations:\n", RULE));
        if conversations.is_empty() {
            output.push_str("(No conversations yet)\n");
        }
        for conversation in conversations {
            let marker = if Some(conversation.counterpart()) == open { ">" } else { " " };
            let when = conversation
                .last_message_at
                .map(|at| format_time_ago(at, now))
                .unwrap_or_default();
            output.push_str(&format!(
                "{} [{}] {}{}  {}  {}\n",
                marker,
                conversation.counterpart(),
                conversation.person.display_name(),
                Self::format_online(&conversation.person),
                when,
                conversation.preview()
            ));
        }
        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Format a single chat message
    ///
    /// Own messages are prefixed with `me`; pending and failed entries carry a marker.
    pub fn format_message(message: &ChatMessage, me: UserId, counterpart_name: &str) -> String {
        let author = if message.is_sent_by(me) { "me" } else { counterpart_name };
        let marker = match message.delivery {
            Delivery::Pending => " (sending…)",
            Delivery::Confirmed => "",
            Delivery::Failed => " (failed to send)",
        };
        let event = message
            .event_id
            .map(|id| format!(" [event #{}]", id))
            .unwrap_or_default();
        format!(
            "{} @{}: {}{}{}\n",
            format_clock_time(message.timestamp),
            author,
            message.content,
            event,
            marker
        )
    }

    /// Format a whole thread with date separators
    pub fn format_thread(
        timeline: &Timeline,
        me: UserId,
        counterpart_name: &str,
        now: DateTime<Utc>,
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\nChat with {}\n", THIN_RULE, counterpart_name));
        if timeline.is_empty() {
            output.push_str("No messages yet. Say hello!\n");
        }

        let mut current_day: Option<NaiveDate> = None;
        for message in timeline.messages() {
            let day = message.timestamp.date_naive();
            if current_day != Some(day) {
                output.push_str(&format!(
                    "-- {} --\n",
                    format_date_label(message.timestamp, now)
                ));
                current_day = Some(day);
            }
            output.push_str(&Self::format_message(message, me, counterpart_name));
        }
        output.push_str(THIN_RULE);
        output.push('\n');
        output
    }

    /// Format an event card
    pub fn format_event(event: &Event, now: DateTime<Utc>) -> String {
        let control = event.registration_control(now);
        let button = if control.enabled() {
            format!("[{}]", control.label())
        } else {
            format!("({})", control.label())
        };
        let time = event
            .time
            .map(|time| format!(" {}", time.format("%H:%M")))
            .unwrap_or_default();
        let capacity = match event.capacity {
            Some(capacity) if capacity > 0 => format!(
                "{}/{} registered ({}%)",
                event.registration_count,
                capacity,
                event.fill_percent()
            ),
            _ => format!("{} registered", event.registration_count),
        };

        let mut output = format!(
            "#{} {} [{}]\n    {}{}",
            event.id,
            event.title,
            event.status(now).label(),
            event.date.format("%a, %b %-d %Y"),
            time
        );
        if let Some(location) = &event.location {
            output.push_str(&format!(" @ {}", location));
        }
        output.push('\n');
        if let Some(organizer) = &event.organizer {
            output.push_str(&format!("    Organized by {}\n", organizer));
        }
        if let Some(description) = &event.description {
            output.push_str(&format!("    {}\n", description));
        }
        output.push_str(&format!("    {}  {}\n", capacity, button));
        output
    }

    /// Live channel indicator, or `None` when there is nothing to show
    pub fn format_channel_state(state: &ChannelState) -> Option<String> {
        match state {
            ChannelState::Reconnecting {
                attempt,
                delay,
                show_indicator: true,
            } => Some(format!(
                "⟳ Reconnecting… (attempt {}, next try in {}s)\n",
                attempt,
                delay.as_secs().max(1)
            )),
            ChannelState::GaveUp => {
                Some("⚠ Live updates unavailable; messages refresh periodically\n".to_string())
            }
            _ => None,
        }
    }

    pub fn format_alert(message: &str) -> String {
        format!("✗ {}\n", message)
    }

    pub fn format_notice(message: &str) -> String {
        format!("✓ {}\n", message)
    }

    pub fn format_batches(batches: &[BatchDto]) -> String {
        if batches.is_empty() {
            return "(No batches)\n".to_string();
        }
        batches
            .iter()
            .map(|batch| format!("[{}] {}\n", batch.id, batch.year))
            .collect()
    }

    pub fn format_degrees(degrees: &[DegreeDto]) -> String {
        if degrees.is_empty() {
            return "(No degrees)\n".to_string();
        }
        degrees
            .iter()
            .map(|degree| format!("[{}] {}\n", degree.id, degree.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ConnectionStatus, EventId, MessageId, RequestId, Role,
        connection::controls_for,
    };
    use chrono::{Duration as ChronoDuration, NaiveTime};
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-11-27T15:45:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn message(id: i64, sender: i64, content: &str, at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: MessageId::Server(id),
            client_message_id: None,
            sender_id: UserId(sender),
            receiver_id: UserId(if sender == 5 { 9 } else { 5 }),
            content: content.to_string(),
            timestamp: at,
            delivery: Delivery::Confirmed,
            event_id: None,
        }
    }

    #[test]
    fn test_format_person_card_with_pending_sent() {
        // テスト項目: 申請中の相手のカードに無効な Pending と Cancel Request が表示される
        // given (前提条件):
        let mut person = Person::new(UserId(9), "Bob");
        person.role = Some(Role::Alumni);
        person.batch_year = Some(2019);
        let status = ConnectionStatus::PendingSent {
            request_id: RequestId(3),
        };
        let card = PersonCard {
            controls: controls_for(person.id, status, false),
            person,
            status,
        };

        // when (操作):
        let result = Formatter::format_person_card(&card);

        // then (期待する結果):
        assert!(result.starts_with("[9] Bob (ALUMNI, 2019)"));
        assert!(result.contains("(Pending) [Cancel Request]"));
    }

    #[test]
    fn test_format_badges() {
        // テスト項目: タブのバッジ件数が表示される
        // given (前提条件):
        let badges = Badges {
            connections: 4,
            received: 2,
            sent: 1,
        };

        // when (操作):
        let result = Formatter::format_badges(&badges);

        // then (期待する結果):
        assert_eq!(result, "Connections (4)  |  Received (2)  |  Sent (1)\n");
    }

    #[test]
    fn test_format_thread_with_date_separators_and_markers() {
        // テスト項目: スレッドに日付の区切りと送信中マーカーが表示される
        // given (前提条件):
        let mut timeline = Timeline::new(UserId(5), UserId(9));
        timeline.apply(message(1, 9, "hi", now() - ChronoDuration::days(1)));
        timeline.apply(message(2, 5, "hello", now() - ChronoDuration::minutes(5)));
        timeline.push_optimistic("on my way", now());

        // when (操作):
        let result = Formatter::format_thread(&timeline, UserId(5), "Bob", now());

        // then (期待する結果):
        assert!(result.contains("-- Yesterday --"));
        assert!(result.contains("-- Today --"));
        assert!(result.contains("@Bob: hi"));
        assert!(result.contains("15:40 @me: hello"));
        assert!(result.contains("@me: on my way (sending…)"));
    }

    #[test]
    fn test_format_empty_thread() {
        // テスト項目: メッセージがない場合、案内が表示される
        // given (前提条件):
        let timeline = Timeline::new(UserId(5), UserId(9));

        // when (操作):
        let result = Formatter::format_thread(&timeline, UserId(5), "Bob", now());

        // then (期待する結果):
        assert!(result.contains("No messages yet"));
    }

    #[test]
    fn test_format_full_event() {
        // テスト項目: 満員のイベントは無効化された "Event Full" と登録率を表示する
        // given (前提条件):
        let event = Event {
            id: EventId(1),
            title: "Alumni Meetup".to_string(),
            description: None,
            date: NaiveDate::from_ymd_opt(2025, 12, 10).unwrap(),
            time: NaiveTime::from_hms_opt(18, 30, 0),
            location: Some("Main Hall".to_string()),
            organizer: None,
            capacity: Some(50),
            registration_count: 50,
            is_registered: false,
        };

        // when (操作):
        let result = Formatter::format_event(&event, now());

        // then (期待する結果):
        assert!(result.contains("50/50 registered (100%)"));
        assert!(result.contains("(Event Full)"));
        assert!(result.contains("18:30 @ Main Hall"));
    }

    #[test]
    fn test_format_channel_state_indicator() {
        // テスト項目: 再接続インジケーターは閾値を超えた場合のみ表示される
        // given (前提条件):
        let quiet = ChannelState::Reconnecting {
            attempt: 1,
            delay: Duration::from_secs(1),
            show_indicator: false,
        };
        let loud = ChannelState::Reconnecting {
            attempt: 3,
            delay: Duration::from_secs(4),
            show_indicator: true,
        };

        // when (操作):
        // then (期待する結果):
        assert_eq!(Formatter::format_channel_state(&quiet), None);
        assert!(
            Formatter::format_channel_state(&loud)
                .unwrap()
                .contains("attempt 3")
        );
        assert_eq!(Formatter::format_channel_state(&ChannelState::Connected), None);
        assert!(Formatter::format_channel_state(&ChannelState::GaveUp).is_some());
    }
}
