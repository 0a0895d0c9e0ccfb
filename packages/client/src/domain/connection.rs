//! Connection state reconciliation.
//!
//! The backend exposes three independent collections (accepted connections,
//! requests received, requests sent). The client derives one display status
//! per person by membership-testing them. The collections are fetched
//! separately and can transiently disagree, so the merge order decides which
//! one wins: accepted, then received, then sent, first write wins.

use std::{cmp::Ordering, collections::HashMap, str::FromStr};

use chrono::{DateTime, Utc};

use super::person::{Person, RequestId, UserId};

/// A pending connection request as returned by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRequest {
    pub id: RequestId,
    pub sender: Person,
    pub receiver: Person,
    pub created_at: Option<DateTime<Utc>>,
}

/// Display status of the edge between the signed-in user and another person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    None,
    PendingSent {
        request_id: RequestId,
    },
    PendingReceived {
        request_id: RequestId,
    },
    Accepted,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::None => "NONE",
            ConnectionStatus::PendingSent { .. } => "PENDING_SENT",
            ConnectionStatus::PendingReceived { .. } => "PENDING_RECEIVED",
            ConnectionStatus::Accepted => "ACCEPTED",
        }
    }
}

/// Per-person status derived from the three collections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionStatusMap {
    entries: HashMap<UserId, ConnectionStatus>,
}

impl ConnectionStatusMap {
    /// Build the map from freshly fetched collections.
    ///
    /// A person listed as connected stays `Accepted` even if a stale pending
    /// request for them is still present in `received` or `sent`.
    pub fn build(
        connections: &[Person],
        received: &[ConnectionRequest],
        sent: &[ConnectionRequest],
    ) -> Self {
        let mut entries = HashMap::new();

        for person in connections {
            entries.entry(person.id).or_insert(ConnectionStatus::Accepted);
        }
        for request in received {
            entries
                .entry(request.sender.id)
                .or_insert(ConnectionStatus::PendingReceived {
                    request_id: request.id,
                });
        }
        for request in sent {
            entries
                .entry(request.receiver.id)
                .or_insert(ConnectionStatus::PendingSent {
                    request_id: request.id,
                });
        }

        Self { entries }
    }

    pub fn status_of(&self, user_id: UserId) -> ConnectionStatus {
        self.entries.get(&user_id).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Action behind a control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Connect { user_id: UserId },
    Pending,
    CancelRequest { user_id: UserId },
    Accept { request_id: RequestId, sender_id: UserId },
    Reject { request_id: RequestId, sender_id: UserId },
    Connected,
    Message { user_id: UserId },
    Disconnect { user_id: UserId },
}

/// A rendered call-to-action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub kind: ControlKind,
    pub label: &'static str,
    pub enabled: bool,
}

impl Control {
    fn enabled(kind: ControlKind, label: &'static str) -> Self {
        Self {
            kind,
            label,
            enabled: true,
        }
    }

    fn disabled(kind: ControlKind, label: &'static str) -> Self {
        Self {
            kind,
            label,
            enabled: false,
        }
    }
}

/// Controls shown on a person card.
///
/// `busy` marks a person whose action is in flight; their controls are disabled
/// until the action completes or fails.
pub fn controls_for(user_id: UserId, status: ConnectionStatus, busy: bool) -> Vec<Control> {
    let mut controls = match status {
        ConnectionStatus::None => vec![Control::enabled(
            ControlKind::Connect { user_id },
            "+ Connect",
        )],
        ConnectionStatus::PendingSent { .. } => vec![
            Control::disabled(ControlKind::Pending, "Pending"),
            Control::enabled(ControlKind::CancelRequest { user_id }, "Cancel Request"),
        ],
        ConnectionStatus::PendingReceived { request_id } => vec![
            Control::enabled(
                ControlKind::Accept {
                    request_id,
                    sender_id: user_id,
                },
                "Accept",
            ),
            Control::enabled(
                ControlKind::Reject {
                    request_id,
                    sender_id: user_id,
                },
                "Reject",
            ),
        ],
        ConnectionStatus::Accepted => vec![
            Control::disabled(ControlKind::Connected, "Connected"),
            Control::enabled(ControlKind::Message { user_id }, "Message"),
            Control::enabled(ControlKind::Disconnect { user_id }, "Disconnect"),
        ],
    };

    if busy {
        for control in &mut controls {
            control.enabled = false;
        }
    }
    controls
}

/// Sort order of the people list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    NameDesc,
    Batch,
    BatchAsc,
    Degree,
    Role,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SortKey::Name),
            "name-desc" => Ok(SortKey::NameDesc),
            "batch" => Ok(SortKey::Batch),
            "batch-asc" => Ok(SortKey::BatchAsc),
            "degree" => Ok(SortKey::Degree),
            "role" => Ok(SortKey::Role),
            other => Err(format!("unknown sort key '{}'", other)),
        }
    }
}

fn compare_names(a: &Person, b: &Person) -> Ordering {
    a.display_name()
        .to_lowercase()
        .cmp(&b.display_name().to_lowercase())
}

/// Sort people in place
pub fn sort_people(people: &mut [Person], sort: SortKey) {
    match sort {
        SortKey::Name => people.sort_by(compare_names),
        SortKey::NameDesc => people.sort_by(|a, b| compare_names(b, a)),
        // newest batch first, people without a batch last
        SortKey::Batch => people.sort_by_key(|p| std::cmp::Reverse(p.batch_year.unwrap_or(0))),
        SortKey::BatchAsc => people.sort_by_key(|p| p.batch_year.unwrap_or(9999)),
        SortKey::Degree => people.sort_by(|a, b| {
            a.degree_name
                .as_deref()
                .unwrap_or_default()
                .cmp(b.degree_name.as_deref().unwrap_or_default())
        }),
        SortKey::Role => people.sort_by_key(|p| p.role.map(|r| r.as_str()).unwrap_or_default()),
    }
}

/// People shown in the "browse all" list: everyone but the signed-in user,
/// filtered by the search term and sorted.
pub fn browse_list(
    all: &[Person],
    current_user: Option<UserId>,
    term: &str,
    sort: SortKey,
) -> Vec<Person> {
    let mut list: Vec<Person> = all
        .iter()
        .filter(|person| Some(person.id) != current_user)
        .filter(|person| person.matches(term))
        .cloned()
        .collect();
    sort_people(&mut list, sort);
    list
}
