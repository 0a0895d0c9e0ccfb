//! API Gateway.
//!
//! - `client`: the HTTP gateway every call goes through
//! - `endpoints`: typed endpoint traits and their HTTP implementation
//! - `conversion`: wire DTOs to domain types and back

pub mod client;
pub mod conversion;
pub mod endpoints;

pub use client::ApiClient;
pub use endpoints::{AuthApi, ChatApi, ConnectionsApi, DirectoryApi, EventsApi, UsersApi};
