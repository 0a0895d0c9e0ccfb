//! Error responses of the stub backend.
//!
//! The body shapes follow the backend the client talks to: most endpoints
//! answer `{"message": ...}`, the event registration endpoints `{"error": ...}`,
//! event management failures plain text, and an unauthenticated call a
//! plain-text `Unauthorized`.

use alumnibridge_shared::dto::http::ErrorBody;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Unauthorized")]
    MissingToken,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Event management failure, answered as a plain-text 400
    #[error("{0}")]
    Rejected(String),

    /// Event registration failure, reported in the `error` field
    #[error("{message}")]
    Event { status: u16, message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingToken | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Event { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }
        }
    }

    pub fn event_not_found() -> Self {
        ApiError::Event {
            status: 404,
            message: "Event not found".to_string(),
        }
    }

    pub fn event_rejected(message: impl Into<String>) -> Self {
        ApiError::Event {
            status: 400,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::MissingToken => (status, "Unauthorized").into_response(),
            ApiError::Rejected(message) => (status, message).into_response(),
            ApiError::Event { message, .. } => {
                (status, Json(ErrorBody::error(message))).into_response()
            }
            other => (status, Json(ErrorBody::message(other.to_string()))).into_response(),
        }
    }
}
