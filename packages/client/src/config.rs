//! Client configuration.

use std::{path::PathBuf, time::Duration};

use crate::domain::ReconnectPolicy;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";
pub const DEFAULT_SESSION_FILE: &str = ".alumnibridge-session.json";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every API path is appended to
    pub api_base_url: String,
    /// WebSocket endpoint of the live messaging channel
    pub ws_url: String,
    pub request_timeout: Duration,
    /// Interval of the chat polling fallback
    pub poll_interval: Duration,
    /// Interval of the liveness heartbeat
    pub heartbeat_interval: Duration,
    /// Delay before the conversation list is refreshed after a send
    pub conversation_refresh_delay: Duration,
    /// Use the live channel; polling alone when false
    pub live_channel: bool,
    pub reconnect: ReconnectPolicy,
    /// Where the session keys are persisted
    pub session_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(120),
            conversation_refresh_delay: Duration::from_millis(500),
            live_channel: true,
            reconnect: ReconnectPolicy::default(),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at another backend
    pub fn for_backend(api_base_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ws_url: ws_url.into(),
            ..Self::default()
        }
    }
}
