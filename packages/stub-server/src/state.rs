//! Server state.

use tokio::sync::Mutex;

use crate::{broker::Broker, error::ApiError, store::Store};

/// Shared application state
pub struct AppState {
    /// In-memory data (users, edges, messages, events)
    pub store: Mutex<Store>,
    /// Live channel subscriptions
    pub broker: Broker,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            store: Mutex::new(store),
            broker: Broker::default(),
        }
    }

    /// Resolve an `Authorization` header value to a user id
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<i64, ApiError> {
        let token = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::MissingToken)?;
        self.store
            .lock()
            .await
            .user_for_token(token)
            .ok_or(ApiError::MissingToken)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Store::default())
    }
}
