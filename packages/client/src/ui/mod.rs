//! UI layer: plain-text rendering and the interactive chat prompt.

pub mod chat_session;
pub mod formatter;
pub mod prompt;

pub use chat_session::run_chat_session;
pub use formatter::Formatter;
pub use prompt::redisplay_prompt;
