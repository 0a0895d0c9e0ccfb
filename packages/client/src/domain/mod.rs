//! Domain models and pure functions.
//!
//! Nothing in this module performs I/O, so every rule here is unit-tested
//! without a backend.

pub mod connection;
pub mod conversation;
pub mod event;
pub mod message;
pub mod person;
pub mod reconnect;
pub mod validation;

pub use connection::{ConnectionRequest, ConnectionStatus, ConnectionStatusMap, Control, ControlKind};
pub use conversation::Conversation;
pub use event::{Event, EventBoard, EventId, RegistrationControl};
pub use message::{ChatMessage, Delivery, MessageId, Timeline};
pub use person::{Person, RequestId, Role, UserId};
pub use reconnect::ReconnectPolicy;
