//! In-memory stand-in for the AlumniBridge backend.
//!
//! Speaks the HTTP API and the STOMP live channel the client consumes, backed
//! by a seeded in-memory store. Used by the client's integration tests and for
//! local development; it is not the real backend.

pub mod broker;
pub mod error;
pub mod handler;
pub mod server;
pub mod signal;
pub mod state;
pub mod store;

pub use server::{StubServer, router, run_server};
pub use state::AppState;
pub use store::Store;
