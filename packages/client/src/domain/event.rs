//! Events and the registration call-to-action.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub location: Option<String>,
    pub organizer: Option<String>,
    /// `None` (or zero) means unlimited
    pub capacity: Option<u32>,
    pub registration_count: u32,
    pub is_registered: bool,
}

/// Schedule status shown next to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Upcoming,
    Today,
    Ended,
}

impl EventStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "Upcoming",
            EventStatus::Today => "Today",
            EventStatus::Ended => "Ended",
        }
    }
}

impl Event {
    pub fn is_full(&self) -> bool {
        match self.capacity {
            Some(capacity) if capacity > 0 => self.registration_count >= capacity,
            _ => false,
        }
    }

    /// Ended once the last instant of its date is in the past
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.date < now.date_naive()
    }

    pub fn status(&self, now: DateTime<Utc>) -> EventStatus {
        if self.has_ended(now) {
            EventStatus::Ended
        } else if self.date == now.date_naive() {
            EventStatus::Today
        } else {
            EventStatus::Upcoming
        }
    }

    /// Fill ratio in percent, capped at 100; zero for unlimited events
    pub fn fill_percent(&self) -> u32 {
        match self.capacity {
            Some(capacity) if capacity > 0 => {
                (self.registration_count.saturating_mul(100) / capacity).min(100)
            }
            _ => 0,
        }
    }

    pub fn registration_control(&self, now: DateTime<Utc>) -> RegistrationControl {
        if self.has_ended(now) {
            RegistrationControl::Ended
        } else if self.is_registered {
            RegistrationControl::Registered
        } else if self.is_full() {
            RegistrationControl::Full
        } else {
            RegistrationControl::RegisterNow
        }
    }
}

/// Call-to-action rendered on an event card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationControl {
    Ended,
    Registered,
    Full,
    RegisterNow,
}

impl RegistrationControl {
    pub fn label(&self) -> &'static str {
        match self {
            RegistrationControl::Ended => "Event Ended",
            RegistrationControl::Registered => "✓ Registered",
            RegistrationControl::Full => "Event Full",
            RegistrationControl::RegisterNow => "Register Now",
        }
    }

    pub fn enabled(&self) -> bool {
        matches!(self, RegistrationControl::RegisterNow)
    }
}

/// Locally tracked list of events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBoard {
    events: Vec<Event>,
}

impl EventBoard {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    /// Overlay the ids the signed-in user is registered for
    pub fn mark_registered(&mut self, registered: &[EventId]) {
        for event in &mut self.events {
            if registered.contains(&event.id) {
                event.is_registered = true;
            }
        }
    }

    /// Count a successful registration without reloading the list
    pub fn record_registration(&mut self, id: EventId) -> bool {
        match self.events.iter_mut().find(|event| event.id == id) {
            Some(event) => {
                event.registration_count = event.registration_count.saturating_add(1);
                event.is_registered = true;
                true
            }
            None => false,
        }
    }

    /// Count a successful unregistration; the count never drops below zero
    pub fn record_unregistration(&mut self, id: EventId) -> bool {
        match self.events.iter_mut().find(|event| event.id == id) {
            Some(event) => {
                event.registration_count = event.registration_count.saturating_sub(1);
                event.is_registered = false;
                true
            }
            None => false,
        }
    }
}
