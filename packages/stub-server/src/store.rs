//! In-memory data of the stub backend.
//!
//! Holds users, bearer tokens, connection edges, messages and events, with just
//! enough rules for the client's flows to behave as they do against the real
//! backend (duplicate requests conflict, full events reject registrations).

use std::collections::{BTreeSet, HashMap};

use alumnibridge_shared::{
    dto::http::{
        AuthResponse, BatchDto, BatchMembersDto, ChatContactDto, ConnectionRequestDto, DegreeDto,
        EventDto, EventRequest, MessageDto, MyRegistrationsDto, RegisterRequest, UserDto,
    },
    time::format_wire_timestamp,
};
use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::ApiError;

/// Password of every seeded account
pub const SEED_PASSWORD: &str = "password123";

pub const ADMIN_ID: i64 = 1;
pub const ALICE_ID: i64 = 5;
pub const BOB_ID: i64 = 9;
pub const CAROL_ID: i64 = 12;

pub const ALICE_EMAIL: &str = "alice@example.com";
pub const BOB_EMAIL: &str = "bob@example.com";
pub const CAROL_EMAIL: &str = "carol@example.com";

/// Capacity 50, 49 registered
pub const MEETUP_EVENT_ID: i64 = 1;
/// Capacity 50, 50 registered
pub const CAREER_FAIR_EVENT_ID: i64 = 2;
/// No capacity limit
pub const WORKSHOP_EVENT_ID: i64 = 3;
/// Dated in the past; never listed as active
pub const PAST_EVENT_ID: i64 = 4;

const ONLINE_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub institute: Option<String>,
    pub batch_year: Option<i32>,
    pub degree_name: Option<String>,
    pub headline: Option<String>,
    pub skills: Option<String>,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl StoredUser {
    fn seed(id: i64, name: &str, email: &str, role: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password: SEED_PASSWORD.to_string(),
            role: role.to_string(),
            institute: None,
            batch_year: None,
            degree_name: None,
            headline: None,
            skills: None,
            last_active_at: None,
        }
    }

    fn is_online(&self, now: DateTime<Utc>) -> bool {
        self.last_active_at
            .is_some_and(|at| at > now - Duration::minutes(ONLINE_WINDOW_MINUTES))
    }

    fn to_dto(&self, now: DateTime<Utc>) -> UserDto {
        UserDto {
            id: self.id,
            name: Some(self.name.clone()),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            institute: self.institute.clone(),
            batch_year: self.batch_year,
            degree_name: self.degree_name.clone(),
            headline: self.headline.clone(),
            skills: self.skills.clone(),
            is_online: Some(self.is_online(now)),
            last_active_at: self.last_active_at.map(format_wire_timestamp),
            ..UserDto::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStatus {
    Pending,
    Accepted,
}

impl EdgeStatus {
    fn as_str(&self) -> &'static str {
        match self {
            EdgeStatus::Pending => "PENDING",
            EdgeStatus::Accepted => "ACCEPTED",
        }
    }
}

/// A connection request; once accepted it is the connection itself
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: i64,
    pub sender: i64,
    pub receiver: i64,
    pub status: EdgeStatus,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    fn joins(&self, a: i64, b: i64) -> bool {
        (self.sender == a && self.receiver == b) || (self.sender == b && self.receiver == a)
    }

    fn other(&self, me: i64) -> i64 {
        if self.sender == me {
            self.receiver
        } else {
            self.sender
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: i64,
    pub sender: i64,
    pub receiver: i64,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub client_message_id: Option<String>,
    pub event_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub location: Option<String>,
    pub organizer: Option<String>,
    pub capacity: Option<u32>,
    pub is_active: bool,
    pub created_by: i64,
    /// Registrations made before the stub started
    pub seeded_registrations: u32,
}

pub struct Store {
    users: Vec<StoredUser>,
    tokens: HashMap<String, i64>,
    edges: Vec<Edge>,
    messages: Vec<StoredMessage>,
    events: Vec<StoredEvent>,
    registrations: BTreeSet<(i64, i64)>,
    batches: Vec<BatchDto>,
    degrees: Vec<DegreeDto>,
    next_user_id: i64,
    next_edge_id: i64,
    next_message_id: i64,
    next_event_id: i64,
}

impl Default for Store {
    fn default() -> Self {
        Self::seeded(Utc::now())
    }
}

impl Store {
    /// Store populated with the demo accounts, events and directory entries
    ///
    /// Alice (student) and Carol (alumna) are connected and have exchanged a
    /// message; Bob (alumnus) has no edge with anyone.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();

        let mut alice = StoredUser::seed(ALICE_ID, "Alice Student", ALICE_EMAIL, "STUDENT");
        alice.institute = Some("IIT Delhi".to_string());
        alice.batch_year = Some(2024);
        alice.degree_name = Some("B.Tech".to_string());
        alice.skills = Some("Rust, SQL".to_string());

        let mut bob = StoredUser::seed(BOB_ID, "Bob Alumni", BOB_EMAIL, "ALUMNI");
        bob.institute = Some("IIT Delhi".to_string());
        bob.batch_year = Some(2019);
        bob.degree_name = Some("M.Tech".to_string());
        bob.headline = Some("Backend engineer".to_string());

        let mut carol = StoredUser::seed(CAROL_ID, "Carol Alumni", CAROL_EMAIL, "ALUMNI");
        carol.institute = Some("IIM Bangalore".to_string());
        carol.batch_year = Some(2015);
        carol.degree_name = Some("MBA".to_string());

        let admin = StoredUser::seed(ADMIN_ID, "Ada Admin", "admin@alumnibridge.test", "ADMIN");

        let in_days = |days: u64| today.checked_add_days(Days::new(days)).unwrap_or(today);
        let past = today.checked_sub_days(Days::new(10)).unwrap_or(today);
        let event = |id: i64, title: &str, date: NaiveDate, capacity: Option<u32>, seeded: u32| {
            StoredEvent {
                id,
                title: title.to_string(),
                description: Some(format!("{} for the AlumniBridge community", title)),
                date,
                time: Some("18:30".to_string()),
                location: Some("Main Auditorium".to_string()),
                organizer: Some("Alumni Office".to_string()),
                capacity,
                is_active: true,
                created_by: ADMIN_ID,
                seeded_registrations: seeded,
            }
        };

        Self {
            users: vec![admin, alice, bob, carol],
            tokens: HashMap::new(),
            edges: vec![Edge {
                id: 1,
                sender: ALICE_ID,
                receiver: CAROL_ID,
                status: EdgeStatus::Accepted,
                created_at: now - Duration::days(30),
            }],
            messages: vec![StoredMessage {
                id: 1,
                sender: CAROL_ID,
                receiver: ALICE_ID,
                content: "Welcome to AlumniBridge!".to_string(),
                sent_at: now - Duration::days(1),
                client_message_id: None,
                event_id: None,
            }],
            events: vec![
                event(MEETUP_EVENT_ID, "Alumni Meetup", in_days(30), Some(50), 49),
                event(CAREER_FAIR_EVENT_ID, "Career Fair", in_days(14), Some(50), 50),
                event(WORKSHOP_EVENT_ID, "Rust Workshop", in_days(7), None, 3),
                event(PAST_EVENT_ID, "Founders Day", past, Some(100), 80),
            ],
            registrations: BTreeSet::new(),
            batches: vec![
                BatchDto { id: 1, year: 2015 },
                BatchDto { id: 2, year: 2019 },
                BatchDto { id: 3, year: 2024 },
            ],
            degrees: vec![
                DegreeDto {
                    id: 1,
                    name: "B.Tech".to_string(),
                },
                DegreeDto {
                    id: 2,
                    name: "M.Tech".to_string(),
                },
                DegreeDto {
                    id: 3,
                    name: "MBA".to_string(),
                },
            ],
            next_user_id: 100,
            next_edge_id: 2,
            next_message_id: 2,
            next_event_id: 5,
        }
    }

    // ========================================
    // Auth
    // ========================================

    pub fn issue_token(&mut self, user_id: i64) -> String {
        let token = format!("stub-{}", Uuid::new_v4());
        self.tokens.insert(token.clone(), user_id);
        token
    }

    pub fn user_for_token(&self, token: &str) -> Option<i64> {
        self.tokens.get(token).copied()
    }

    pub fn login(&mut self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let user = self
            .users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email.trim()) && user.password == password)
            .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;
        let (user_id, role) = (user.id, user.role.clone());
        let token = self.issue_token(user_id);
        Ok(AuthResponse {
            token,
            user_id,
            role,
        })
    }

    pub fn register(&mut self, request: RegisterRequest) -> Result<AuthResponse, ApiError> {
        if request.name.trim().is_empty()
            || request.email.trim().is_empty()
            || request.password.is_empty()
        {
            return Err(ApiError::BadRequest(
                "Name, email and password are required".to_string(),
            ));
        }
        if request.role != "STUDENT" && request.role != "ALUMNI" {
            return Err(ApiError::BadRequest("Invalid role".to_string()));
        }
        if self
            .users
            .iter()
            .any(|user| user.email.eq_ignore_ascii_case(request.email.trim()))
        {
            return Err(ApiError::Conflict("Email already in use".to_string()));
        }

        let id = self.next_user_id;
        self.next_user_id += 1;
        let mut user = StoredUser::seed(id, request.name.trim(), request.email.trim(), &request.role);
        user.password = request.password;
        user.institute = request.institute;
        user.batch_year = request.batch_year;
        user.degree_name = request.degree_name;
        self.users.push(user);

        let token = self.issue_token(id);
        Ok(AuthResponse {
            token,
            user_id: id,
            role: request.role,
        })
    }

    // ========================================
    // Users
    // ========================================

    fn user(&self, id: i64) -> Option<&StoredUser> {
        self.users.iter().find(|user| user.id == id)
    }

    fn user_dto(&self, id: i64, now: DateTime<Utc>) -> UserDto {
        self.user(id)
            .map(|user| user.to_dto(now))
            .unwrap_or_else(|| UserDto {
                id,
                ..UserDto::default()
            })
    }

    pub fn me(&self, id: i64) -> Result<UserDto, ApiError> {
        self.user(id)
            .map(|user| user.to_dto(Utc::now()))
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    /// Name search; everyone when the query is blank
    pub fn search(&self, query: Option<&str>) -> Vec<UserDto> {
        let now = Utc::now();
        let query = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();
        self.users
            .iter()
            .filter(|user| query.is_empty() || user.name.to_lowercase().contains(&query))
            .map(|user| user.to_dto(now))
            .collect()
    }

    pub fn touch(&mut self, id: i64) {
        if let Some(user) = self.users.iter_mut().find(|user| user.id == id) {
            user.last_active_at = Some(Utc::now());
        }
    }

    // ========================================
    // Connections
    // ========================================

    pub fn connections(&self, me: i64) -> Vec<UserDto> {
        let now = Utc::now();
        self.edges
            .iter()
            .filter(|edge| edge.status == EdgeStatus::Accepted && (edge.sender == me || edge.receiver == me))
            .map(|edge| self.user_dto(edge.other(me), now))
            .collect()
    }

    fn request_dto(&self, edge: &Edge, now: DateTime<Utc>) -> ConnectionRequestDto {
        ConnectionRequestDto {
            id: edge.id,
            sender: self.user_dto(edge.sender, now),
            receiver: self.user_dto(edge.receiver, now),
            status: Some(edge.status.as_str().to_string()),
            created_at: Some(format_wire_timestamp(edge.created_at)),
        }
    }

    pub fn received_requests(&self, me: i64) -> Vec<ConnectionRequestDto> {
        let now = Utc::now();
        self.edges
            .iter()
            .filter(|edge| edge.status == EdgeStatus::Pending && edge.receiver == me)
            .map(|edge| self.request_dto(edge, now))
            .collect()
    }

    pub fn sent_requests(&self, me: i64) -> Vec<ConnectionRequestDto> {
        let now = Utc::now();
        self.edges
            .iter()
            .filter(|edge| edge.status == EdgeStatus::Pending && edge.sender == me)
            .map(|edge| self.request_dto(edge, now))
            .collect()
    }

    pub fn send_request(&mut self, me: i64, receiver: i64) -> Result<i64, ApiError> {
        if me == receiver {
            return Err(ApiError::Conflict(
                "You cannot send a connection request to yourself".to_string(),
            ));
        }
        if self.user(receiver).is_none() {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
        if let Some(existing) = self.edges.iter().find(|edge| edge.joins(me, receiver)) {
            let message = match existing.status {
                EdgeStatus::Accepted => "You are already connected with this user",
                EdgeStatus::Pending if existing.sender == me => "Connection request already sent",
                EdgeStatus::Pending => "You already have a pending request from this user",
            };
            return Err(ApiError::Conflict(message.to_string()));
        }

        let id = self.next_edge_id;
        self.next_edge_id += 1;
        self.edges.push(Edge {
            id,
            sender: me,
            receiver,
            status: EdgeStatus::Pending,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    /// Accept or reject a request addressed to `me`; a rejected request is dropped
    pub fn respond(&mut self, me: i64, request_id: i64, accept: bool) -> Result<(), ApiError> {
        let index = self
            .edges
            .iter()
            .position(|edge| {
                edge.id == request_id && edge.receiver == me && edge.status == EdgeStatus::Pending
            })
            .ok_or_else(|| ApiError::NotFound("Connection request not found".to_string()))?;
        if accept {
            self.edges[index].status = EdgeStatus::Accepted;
        } else {
            self.edges.remove(index);
        }
        Ok(())
    }

    /// Remove every edge between the two users, pending or accepted
    pub fn disconnect(&mut self, me: i64, other: i64) -> usize {
        let before = self.edges.len();
        self.edges.retain(|edge| !edge.joins(me, other));
        before - self.edges.len()
    }

    // ========================================
    // Chat
    // ========================================

    fn between(&self, a: i64, b: i64) -> impl Iterator<Item = &StoredMessage> {
        self.messages.iter().filter(move |message| {
            (message.sender == a && message.receiver == b)
                || (message.sender == b && message.receiver == a)
        })
    }

    /// Accepted connections with the latest message, most recent first
    pub fn chat_contacts(&self, me: i64) -> Vec<ChatContactDto> {
        let now = Utc::now();
        let mut contacts: Vec<(Option<DateTime<Utc>>, ChatContactDto)> = self
            .edges
            .iter()
            .filter(|edge| edge.status == EdgeStatus::Accepted && (edge.sender == me || edge.receiver == me))
            .filter_map(|edge| self.user(edge.other(me)))
            .map(|user| {
                let last = self.between(me, user.id).max_by_key(|message| message.id);
                let contact = ChatContactDto {
                    id: user.id,
                    name: Some(user.name.clone()),
                    email: Some(user.email.clone()),
                    role: Some(user.role.clone()),
                    is_online: user.is_online(now),
                    last_active_at: user.last_active_at.map(format_wire_timestamp),
                    headline: user.headline.clone(),
                    picture_url: None,
                    last_message: last.map(|message| message.content.clone()),
                    last_message_at: last.map(|message| format_wire_timestamp(message.sent_at)),
                };
                (last.map(|message| message.sent_at), contact)
            })
            .collect();
        contacts.sort_by(|a, b| b.0.cmp(&a.0));
        contacts.into_iter().map(|(_, contact)| contact).collect()
    }

    pub fn conversation(&self, me: i64, other: i64) -> Vec<MessageDto> {
        let mut messages: Vec<&StoredMessage> = self.between(me, other).collect();
        messages.sort_by_key(|message| message.id);
        messages
            .into_iter()
            .map(|message| self.message_dto(message))
            .collect()
    }

    pub fn store_message(
        &mut self,
        sender: i64,
        receiver: i64,
        content: &str,
        client_message_id: Option<String>,
        event_id: Option<i64>,
    ) -> Result<StoredMessage, ApiError> {
        if self.user(sender).is_none() || self.user(receiver).is_none() {
            return Err(ApiError::BadRequest("Invalid user".to_string()));
        }
        let message = StoredMessage {
            id: self.next_message_id,
            sender,
            receiver,
            content: content.to_string(),
            sent_at: Utc::now(),
            client_message_id,
            event_id,
        };
        self.next_message_id += 1;
        self.messages.push(message.clone());
        Ok(message)
    }

    pub fn message_dto(&self, message: &StoredMessage) -> MessageDto {
        MessageDto {
            id: message.id,
            sender_id: message.sender,
            sender_name: self.user(message.sender).map(|user| user.name.clone()),
            recipient_id: message.receiver,
            recipient_name: self.user(message.receiver).map(|user| user.name.clone()),
            content: message.content.clone(),
            timestamp: format_wire_timestamp(message.sent_at),
            client_message_id: message.client_message_id.clone(),
            event_id: message.event_id,
        }
    }

    // ========================================
    // Events
    // ========================================

    fn registration_count(&self, event: &StoredEvent) -> u32 {
        let registered = self
            .registrations
            .iter()
            .filter(|(_, event_id)| *event_id == event.id)
            .count() as u32;
        event.seeded_registrations + registered
    }

    fn event_dto(&self, event: &StoredEvent, me: i64) -> EventDto {
        EventDto {
            id: event.id,
            title: event.title.clone(),
            description: event.description.clone(),
            event_date: event.date.format("%Y-%m-%d").to_string(),
            event_time: event.time.clone(),
            location: event.location.clone(),
            organizer: event.organizer.clone(),
            capacity: event.capacity,
            registration_count: Some(self.registration_count(event)),
            is_registered: Some(self.registrations.contains(&(me, event.id))),
            created_by: Some(event.created_by),
            created_by_name: self.user(event.created_by).map(|user| user.name.clone()),
        }
    }

    /// Active events dated today or later, soonest first
    pub fn active_events(&self, me: i64, today: NaiveDate) -> Vec<EventDto> {
        let mut events: Vec<&StoredEvent> = self
            .events
            .iter()
            .filter(|event| event.is_active && event.date >= today)
            .collect();
        events.sort_by_key(|event| event.date);
        events
            .into_iter()
            .map(|event| self.event_dto(event, me))
            .collect()
    }

    pub fn my_registrations(&self, me: i64) -> MyRegistrationsDto {
        MyRegistrationsDto {
            registered_event_ids: self
                .registrations
                .iter()
                .filter(|(user_id, _)| *user_id == me)
                .map(|(_, event_id)| *event_id)
                .collect(),
        }
    }

    pub fn register_event(&mut self, me: i64, event_id: i64) -> Result<(), ApiError> {
        let event = self
            .events
            .iter()
            .find(|event| event.id == event_id)
            .ok_or_else(ApiError::event_not_found)?;
        if self.registrations.contains(&(me, event_id)) {
            return Err(ApiError::event_rejected("Already registered for this event"));
        }
        if let Some(capacity) = event.capacity.filter(|capacity| *capacity > 0)
            && self.registration_count(event) >= capacity
        {
            return Err(ApiError::event_rejected("Event is at full capacity"));
        }
        self.registrations.insert((me, event_id));
        Ok(())
    }

    pub fn unregister_event(&mut self, me: i64, event_id: i64) -> Result<(), ApiError> {
        if !self.events.iter().any(|event| event.id == event_id) {
            return Err(ApiError::event_not_found());
        }
        if !self.registrations.remove(&(me, event_id)) {
            return Err(ApiError::Event {
                status: 404,
                message: "Registration not found".to_string(),
            });
        }
        Ok(())
    }

    pub fn create_event(&mut self, me: i64, request: EventRequest) -> Result<EventDto, ApiError> {
        let event = StoredEvent {
            id: self.next_event_id,
            created_by: me,
            seeded_registrations: 0,
            ..stored_event_fields(request)?
        };
        self.next_event_id += 1;
        let dto = self.event_dto(&event, me);
        self.events.push(event);
        Ok(dto)
    }

    /// Replace the details of an event; registrations are kept
    pub fn update_event(
        &mut self,
        me: i64,
        event_id: i64,
        request: EventRequest,
    ) -> Result<EventDto, ApiError> {
        let fields = stored_event_fields(request)?;
        let index = self
            .events
            .iter()
            .position(|event| event.id == event_id)
            .ok_or_else(|| ApiError::Rejected("Event not found".to_string()))?;
        let current = &self.events[index];
        let event = StoredEvent {
            id: current.id,
            created_by: current.created_by,
            seeded_registrations: current.seeded_registrations,
            ..fields
        };
        let dto = self.event_dto(&event, me);
        self.events[index] = event;
        Ok(dto)
    }

    /// Remove an event together with its registrations
    pub fn delete_event(&mut self, event_id: i64) -> Result<(), ApiError> {
        let before = self.events.len();
        self.events.retain(|event| event.id != event_id);
        if self.events.len() == before {
            return Err(ApiError::Rejected("Event not found".to_string()));
        }
        self.registrations.retain(|(_, id)| *id != event_id);
        Ok(())
    }

    // ========================================
    // Directory
    // ========================================

    pub fn batches(&self) -> Vec<BatchDto> {
        self.batches.clone()
    }

    pub fn degrees(&self) -> Vec<DegreeDto> {
        self.degrees.clone()
    }

    pub fn batch_members(&self, batch_id: i64) -> Result<BatchMembersDto, ApiError> {
        let batch = self
            .batches
            .iter()
            .find(|batch| batch.id == batch_id)
            .ok_or_else(|| ApiError::NotFound("Batch not found".to_string()))?;
        let now = Utc::now();
        Ok(BatchMembersDto {
            id: batch.id,
            year: batch.year,
            users: self
                .users
                .iter()
                .filter(|user| user.batch_year == Some(batch.year))
                .map(|user| user.to_dto(now))
                .collect(),
        })
    }
}

/// Event details of a create or update body. `id`, `created_by` and
/// `seeded_registrations` are left for the caller to fill in.
fn stored_event_fields(request: EventRequest) -> Result<StoredEvent, ApiError> {
    let required = [
        request.title.as_str(),
        request.event_date.as_str(),
        request.event_time.as_str(),
        request.location.as_str(),
    ];
    if required.iter().any(|value| value.trim().is_empty()) {
        return Err(ApiError::Rejected(
            "Title, date, time and location are required".to_string(),
        ));
    }
    let date = NaiveDate::parse_from_str(request.event_date.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::Rejected(format!("Invalid event date: {}", request.event_date)))?;
    Ok(StoredEvent {
        id: 0,
        title: request.title.trim().to_string(),
        description: request.description,
        date,
        time: Some(request.event_time.trim().to_string()),
        location: Some(request.location.trim().to_string()),
        organizer: request.organizer,
        capacity: Some(request.capacity).filter(|capacity| *capacity > 0),
        is_active: request.is_active,
        created_by: 0,
        seeded_registrations: 0,
    })
}
