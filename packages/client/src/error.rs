//! Error types for the AlumniBridge client.

use thiserror::Error;

use crate::domain::validation::FieldError;

/// Failure of a single HTTP call through the gateway
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response; `message` comes from the body when present
    #[error("{message}")]
    Status { status: u16, message: String },

    /// 401 response. The session has already been cleared.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A 2xx body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl RequestError {
    /// Text shown to the user in an alert
    pub fn message(&self) -> String {
        match self {
            RequestError::Network(_) => "Network error. Please try again.".to_string(),
            RequestError::Status { message, .. } => message.clone(),
            RequestError::Unauthorized(message) => message.clone(),
            RequestError::Decode(_) => "Unexpected response from server".to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RequestError::Unauthorized(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            RequestError::Unauthorized(_) => Some(401),
            _ => None,
        }
    }
}

/// Live channel errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// WebSocket or STOMP handshake did not complete
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The broker answered the handshake with an ERROR frame
    #[error("Connection rejected: {0}")]
    Rejected(String),

    /// The transport dropped after the handshake
    #[error("Transport error: {0}")]
    Transport(String),

    /// A frame could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Publish attempted while not connected
    #[error("Live channel is not connected")]
    NotConnected,
}

/// Client-level errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Request(#[from] RequestError),

    /// No session in storage
    #[error("Not signed in")]
    NotAuthenticated,

    /// Rejected before any network call
    #[error("Invalid input: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// Persistent client storage could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// No conversation is open
    #[error("No conversation selected")]
    UnknownConversation,

    #[error("Terminal error: {0}")]
    Terminal(String),
}

impl ClientError {
    /// Text shown to the user in an alert
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Request(error) => error.message(),
            other => other.to_string(),
        }
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::validate_login;

    #[test]
    fn test_status_error_message_is_passed_through() {
        // テスト項目: バックエンドのエラーメッセージはそのままユーザーに表示される
        // given (前提条件):
        let error = RequestError::Status {
            status: 409,
            message: "Connection request already exists".to_string(),
        };

        // when (操作):
        let message = ClientError::from(error).user_message();

        // then (期待する結果):
        assert_eq!(message, "Connection request already exists");
    }

    #[test]
    fn test_validation_error_lists_fields() {
        // テスト項目: 検証エラーは各フィールドのメッセージを含む
        // given (前提条件):
        let errors = validate_login("", "").unwrap_err();

        // when (操作):
        let message = ClientError::Validation(errors).to_string();

        // then (期待する結果):
        assert_eq!(
            message,
            "Invalid input: email: Email is required, password: Password is required"
        );
    }
}
