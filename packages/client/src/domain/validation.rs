//! Client-side form validation.
//!
//! Runs before any network call; a rejected form never reaches the backend.

use std::{fmt, sync::LazyLock};

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use super::person::Role;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

pub const MIN_PASSWORD_LEN: usize = 6;

/// Seats offered when the organizer leaves the capacity blank
pub const DEFAULT_EVENT_CAPACITY: u32 = 100;

/// Form field a validation message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Password,
    ConfirmPassword,
    Role,
    Institute,
    BatchYear,
    Title,
    EventDate,
    EventTime,
    Location,
    Capacity,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Password => "password",
            Field::ConfirmPassword => "confirmPassword",
            Field::Role => "role",
            Field::Institute => "institute",
            Field::BatchYear => "batchYear",
            Field::Title => "title",
            Field::EventDate => "eventDate",
            Field::EventTime => "eventTime",
            Field::Location => "location",
            Field::Capacity => "capacity",
        }
    }
}

/// Inline message attached to a form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: &'static str,
}

impl FieldError {
    fn new(field: Field, message: &'static str) -> Self {
        Self { field, message }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field.as_str(), self.message)
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if email.is_empty() {
        errors.push(FieldError::new(Field::Email, "Email is required"));
    } else if !is_valid_email(email) {
        errors.push(FieldError::new(Field::Email, "Please enter a valid email"));
    }
}

fn check_password(password: &str, errors: &mut Vec<FieldError>) {
    if password.is_empty() {
        errors.push(FieldError::new(Field::Password, "Password is required"));
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            Field::Password,
            "Password must be at least 6 characters",
        ));
    }
}

/// Validate the login form. The email is expected trimmed.
pub fn validate_login(email: &str, password: &str) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    check_email(email, &mut errors);
    check_password(password, &mut errors);
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Sign-up form as entered by the user
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Option<Role>,
    pub institute: Option<String>,
    pub batch_year: Option<i32>,
    pub degree_name: Option<String>,
}

pub fn validate_registration(form: &RegistrationForm) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if form.name.trim().is_empty() {
        errors.push(FieldError::new(Field::Name, "Name is required"));
    }
    check_email(form.email.trim(), &mut errors);
    check_password(&form.password, &mut errors);

    if form.confirm_password.is_empty() {
        errors.push(FieldError::new(
            Field::ConfirmPassword,
            "Please confirm your password",
        ));
    } else if form.password != form.confirm_password {
        errors.push(FieldError::new(
            Field::ConfirmPassword,
            "Passwords do not match",
        ));
    }

    // Admin accounts are not self-service
    if matches!(form.role, None | Some(Role::Admin)) {
        errors.push(FieldError::new(Field::Role, "Please select a role"));
    }

    if form
        .institute
        .as_deref()
        .is_none_or(|institute| institute.trim().is_empty())
    {
        errors.push(FieldError::new(
            Field::Institute,
            "Please select an institute",
        ));
    }

    if form.batch_year.is_none() {
        errors.push(FieldError::new(
            Field::BatchYear,
            "Please select a batch year",
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Event form of the management screen
#[derive(Debug, Clone)]
pub struct EventForm {
    pub title: String,
    pub description: Option<String>,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub location: String,
    pub organizer: Option<String>,
    /// Blank means [`DEFAULT_EVENT_CAPACITY`]
    pub capacity: Option<u32>,
    pub is_active: bool,
}

impl Default for EventForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: None,
            date: String::new(),
            time: String::new(),
            location: String::new(),
            organizer: None,
            capacity: None,
            is_active: true,
        }
    }
}

impl EventForm {
    pub fn capacity_or_default(&self) -> u32 {
        self.capacity.unwrap_or(DEFAULT_EVENT_CAPACITY)
    }
}

pub fn validate_event(form: &EventForm) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if form.title.trim().is_empty() {
        errors.push(FieldError::new(Field::Title, "Title is required"));
    }

    let date = form.date.trim();
    if date.is_empty() {
        errors.push(FieldError::new(Field::EventDate, "Event date is required"));
    } else if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        errors.push(FieldError::new(
            Field::EventDate,
            "Please enter the date as YYYY-MM-DD",
        ));
    }

    let time = form.time.trim();
    if time.is_empty() {
        errors.push(FieldError::new(Field::EventTime, "Event time is required"));
    } else if NaiveTime::parse_from_str(time, "%H:%M").is_err() {
        errors.push(FieldError::new(
            Field::EventTime,
            "Please enter the time as HH:MM",
        ));
    }

    if form.location.trim().is_empty() {
        errors.push(FieldError::new(Field::Location, "Location is required"));
    }

    if form.capacity == Some(0) {
        errors.push(FieldError::new(
            Field::Capacity,
            "Capacity must be at least 1",
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Trimmed chat input, or `None` when there is nothing to send
pub fn normalize_chat_input(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
