//! Request handlers.

pub mod http;
pub mod stomp;

pub use http::*;
pub use stomp::websocket_handler;
