//! Page navigation surface.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::domain::{Role, UserId};

/// Where the client can send the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Login,
    StudentDashboard,
    AlumniDashboard,
    AdminDashboard,
    /// Chat view, optionally pre-selecting a counterpart
    Chat { user_id: Option<UserId> },
    Profile,
}

impl Destination {
    /// Landing page after login
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Student => Destination::StudentDashboard,
            Role::Alumni => Destination::AlumniDashboard,
            Role::Admin => Destination::AdminDashboard,
        }
    }

    pub fn chat_with(user_id: UserId) -> Self {
        Destination::Chat {
            user_id: Some(user_id),
        }
    }

    /// Page path, with the query string when a counterpart is pre-selected
    pub fn path(&self) -> String {
        match self {
            Destination::Login => "login.html".to_string(),
            Destination::StudentDashboard => "student-dashboard.html".to_string(),
            Destination::AlumniDashboard => "alumni-dashboard.html".to_string(),
            Destination::AdminDashboard => "admin-dashboard.html".to_string(),
            Destination::Chat { user_id: None } => "chat.html".to_string(),
            Destination::Chat {
                user_id: Some(user_id),
            } => format!("chat.html?userId={}", user_id),
            Destination::Profile => "profile.html".to_string(),
        }
    }

    /// Parse a page path produced by [`Destination::path`]
    pub fn parse(path: &str) -> Option<Self> {
        let (page, query) = match path.split_once('?') {
            Some((page, query)) => (page, Some(query)),
            None => (path, None),
        };
        let page = page.rsplit('/').next().unwrap_or(page);
        match page {
            "login.html" => Some(Destination::Login),
            "student-dashboard.html" => Some(Destination::StudentDashboard),
            "alumni-dashboard.html" => Some(Destination::AlumniDashboard),
            "admin-dashboard.html" => Some(Destination::AdminDashboard),
            "profile.html" => Some(Destination::Profile),
            "chat.html" => {
                let user_id = query.and_then(|query| {
                    query
                        .split('&')
                        .filter_map(|pair| pair.split_once('='))
                        .find(|(key, _)| *key == "userId")
                        .and_then(|(_, value)| value.parse().ok())
                });
                Some(Destination::Chat { user_id })
            }
            _ => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Navigation side effect
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: Destination);
}

/// Reports navigations through the log; the CLI has no pages to switch
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate(&self, destination: Destination) {
        tracing::info!("Redirecting to {}", destination);
    }
}

/// Keeps every navigation for later inspection
#[derive(Debug, Default, Clone)]
pub struct RecordingNavigator {
    visited: Arc<Mutex<Vec<Destination>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<Destination> {
        self.visited
            .lock()
            .map(|visited| visited.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Destination> {
        self.visited().last().copied()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, destination: Destination) {
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(destination);
        }
    }
}
