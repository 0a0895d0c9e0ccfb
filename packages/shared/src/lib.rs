//! Shared utilities for the AlumniBridge client and its stub backend.
//!
//! - `dto`: wire types of the HTTP API and the live channel payloads
//! - `logger`: tracing subscriber setup
//! - `time`: clock abstraction and display formatting of timestamps
//! - `stomp`: STOMP 1.2 frame codec used on the live messaging channel

pub mod dto;
pub mod logger;
pub mod stomp;
pub mod time;
