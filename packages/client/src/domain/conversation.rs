//! Conversations: a person plus the latest message exchanged with them.
//!
//! Derived from the chat contacts list on every refresh, never diffed.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::person::{Person, UserId};

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub person: Person,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn counterpart(&self) -> UserId {
        self.person.id
    }

    /// Preview line of the conversation list
    pub fn preview(&self) -> &str {
        match self.last_message.as_deref() {
            Some(message) if !message.trim().is_empty() => message,
            _ => "No messages yet",
        }
    }
}

/// Most recent first; conversations without messages last, by name
fn compare(a: &Conversation, b: &Conversation) -> Ordering {
    match (a.last_message_at, b.last_message_at) {
        (Some(a_at), Some(b_at)) => b_at.cmp(&a_at),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| {
        a.person
            .display_name()
            .to_lowercase()
            .cmp(&b.person.display_name().to_lowercase())
    })
}

/// Ordered conversation list
pub fn derive_conversations(mut conversations: Vec<Conversation>) -> Vec<Conversation> {
    conversations.sort_by(compare);
    conversations
}

/// Case-insensitive name filter of the sidebar search
pub fn filter_conversations<'a>(
    conversations: &'a [Conversation],
    term: &str,
) -> Vec<&'a Conversation> {
    let term = term.trim().to_lowercase();
    conversations
        .iter()
        .filter(|conversation| {
            term.is_empty()
                || conversation
                    .person
                    .display_name()
                    .to_lowercase()
                    .contains(&term)
        })
        .collect()
}
