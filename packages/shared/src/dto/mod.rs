//! Data Transfer Objects (DTOs) exchanged with the backend.
//!
//! DTOs are organized by transport:
//! - `http`: HTTP API request and response bodies
//! - `live`: payloads carried in STOMP frames on the live channel
//!
//! Field names follow the backend's camelCase JSON. Timestamps stay strings
//! here; they are parsed with [`crate::time::parse_timestamp`] on conversion.

pub mod http;
pub mod live;
