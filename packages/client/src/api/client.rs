//! HTTP gateway.
//!
//! Every backend call goes through [`ApiClient::request`], which injects the
//! bearer token from session storage, normalizes non-2xx answers into
//! [`RequestError`] and handles a 401 by clearing the session and redirecting
//! to the login page before returning the error.

use std::{sync::Arc, time::Duration};

use reqwest::{Method, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::ClientConfig,
    error::RequestError,
    navigation::{Destination, Navigator},
    session::SessionStorage,
};

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    storage: SessionStorage,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, storage: SessionStorage, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.trim().trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
            storage,
            navigator,
        }
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and return its JSON body.
    ///
    /// Empty bodies yield `None`; plain-text bodies yield a JSON string.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, RequestError> {
        self.send(method, path, &[], body).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Option<Value>, RequestError> {
        let mut request = self
            .http
            .request(method.clone(), self.endpoint(path))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .timeout(self.timeout);

        if !query.is_empty() {
            request = request.query(query);
        }

        match self.storage.token() {
            Ok(Some(token)) => request = request.bearer_auth(token),
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to read token from storage: {}", e),
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("API error [{} {}]: {}", method, path, e);
            RequestError::Network(e.to_string())
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::error!("API error [{} {}]: failed to read body: {}", method, path, e);
            RequestError::Network(e.to_string())
        })?;

        if status == StatusCode::UNAUTHORIZED {
            let message = error_message(status, &text);
            tracing::error!("API error [{} {}]: 401 {}", method, path, message);
            if let Err(e) = self.storage.clear() {
                tracing::warn!("Failed to clear session: {}", e);
            }
            self.navigator.navigate(Destination::Login);
            return Err(RequestError::Unauthorized(message));
        }

        if !status.is_success() {
            let message = error_message(status, &text);
            tracing::error!(
                "API error [{} {}]: {} {}",
                method,
                path,
                status.as_u16(),
                message
            );
            return Err(RequestError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(parse_body(&text))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        decode(self.request(Method::GET, path, None).await?)
    }

    /// GET a list; an empty body is an empty list
    pub async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, RequestError> {
        self.get_list_with_query(path, &[]).await
    }

    pub async fn get_list_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, RequestError> {
        match self.send(Method::GET, path, query, None).await? {
            None => Ok(Vec::new()),
            Some(value) => decode(Some(value)),
        }
    }

    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<Option<Value>, RequestError> {
        self.request(Method::POST, path, body).await
    }

    pub async fn post_json<Req, Res>(&self, path: &str, payload: &Req) -> Result<Res, RequestError>
    where
        Req: serde::Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let body = serde_json::to_value(payload).map_err(|e| RequestError::Decode(e.to_string()))?;
        decode(self.post(path, Some(&body)).await?)
    }

    pub async fn put_json<Req, Res>(&self, path: &str, payload: &Req) -> Result<Res, RequestError>
    where
        Req: serde::Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let body = serde_json::to_value(payload).map_err(|e| RequestError::Decode(e.to_string()))?;
        decode(self.request(Method::PUT, path, Some(&body)).await?)
    }

    pub async fn delete(&self, path: &str) -> Result<Option<Value>, RequestError> {
        self.request(Method::DELETE, path, None).await
    }
}

/// Turn a response body into a value
pub(crate) fn parse_body(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(trimmed.to_string())),
    }
}

/// User-visible message of a non-2xx response: `message`, then `error`,
/// then a plain-text body, then the status code
pub(crate) fn error_message(status: StatusCode, text: &str) -> String {
    let fallback = || format!("HTTP {}", status.as_u16());
    match parse_body(text) {
        Some(Value::String(text)) => text,
        Some(value) => ["message", "error"]
            .iter()
            .find_map(|key| {
                value
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|message| !message.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(fallback),
        None => fallback(),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Option<Value>) -> Result<T, RequestError> {
    let value = value.ok_or_else(|| RequestError::Decode("empty response body".to_string()))?;
    serde_json::from_value(value).map_err(|e| RequestError::Decode(e.to_string()))
}

/// Plain-text confirmation of an action, when the backend sent one
pub(crate) fn confirmation_text(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text),
        Some(value) => value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        None => None,
    }
}
