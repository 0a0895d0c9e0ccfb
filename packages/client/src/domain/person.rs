//! People and identifiers.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend identifier of a person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(UserId)
    }
}

/// Backend identifier of a connection request (not of a person)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role tag of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Alumni,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Alumni => "ALUMNI",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Some(Role::Student),
            "ALUMNI" => Some(Role::Alumni),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person as fetched from the backend.
///
/// Read-only on the client; `is_online` is the only field the client may overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
    pub institute: Option<String>,
    pub degree_name: Option<String>,
    pub batch_year: Option<i32>,
    pub headline: Option<String>,
    pub skills: Vec<String>,
    pub picture_url: Option<String>,
    pub is_online: bool,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl Person {
    /// Minimal person with only an id and a name
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: String::new(),
            role: None,
            institute: None,
            degree_name: None,
            batch_year: None,
            headline: None,
            skills: Vec::new(),
            picture_url: None,
            is_online: false,
            last_active_at: None,
        }
    }

    /// Name shown on cards: name, then email, then "Unknown"
    pub fn display_name(&self) -> &str {
        if !self.name.trim().is_empty() {
            self.name.trim()
        } else if !self.email.trim().is_empty() {
            self.email.trim()
        } else {
            "Unknown"
        }
    }

    /// Up to two uppercase initials, `?` when there is nothing to abbreviate
    pub fn initials(&self) -> String {
        let initials: String = self
            .display_name()
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect();
        if initials.is_empty() {
            "?".to_string()
        } else {
            initials
        }
    }

    /// Case-insensitive free-text match over the searchable profile fields
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        let batch = self.batch_year.map(|year| year.to_string());
        let role = self.role.map(|role| role.as_str());
        let haystack = [
            Some(self.name.as_str()),
            Some(self.email.as_str()),
            self.institute.as_deref(),
            self.degree_name.as_deref(),
            role,
            batch.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(self.skills.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

        haystack.contains(&term)
    }
}
