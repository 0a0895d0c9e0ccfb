//! AlumniBridge client library.
//!
//! A thin client over the AlumniBridge backend: the backend owns business
//! rules, persistence and authorization, the client renders state and drives
//! actions.
//!
//! - `api`: gateway shim over the HTTP API (bearer token, error normalisation)
//! - `session`, `navigation`: persistent session storage and redirect targets
//! - `domain`: pure models (connection status, chat timeline, events, validation)
//! - `live`: STOMP-over-WebSocket live messaging channel
//! - `usecase`: views owning their state (network, chat, events, auth)
//! - `ui`: plain-text rendering and the interactive chat prompt

// layers
pub mod api;
pub mod domain;
pub mod live;
pub mod ui;
pub mod usecase;

// ambient
pub mod config;
pub mod error;
pub mod navigation;
pub mod session;
