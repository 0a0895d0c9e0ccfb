//! Integration tests for the HTTP gateway against the stub backend.

mod common;

use std::sync::Arc;

use alumnibridge_client::{
    api::{ApiClient, ConnectionsApi, UsersApi},
    config::ClientConfig,
    domain::{Role, UserId},
    error::RequestError,
    navigation::{Destination, Navigator, RecordingNavigator},
    session::{Session, SessionStorage},
};
use alumnibridge_stub_server::{
    StubServer,
    store::{ALICE_EMAIL, ALICE_ID, BOB_EMAIL, BOB_ID},
};
use reqwest::Method;
use serde_json::Value;

use common::TestUser;

#[tokio::test]
async fn test_unauthorized_response_clears_session_and_redirects_to_login() {
    // テスト項目: 401 を受け取るとセッションが消去され、ログイン画面へ遷移する
    // given (前提条件):
    let server = StubServer::spawn().await.unwrap();
    let config = ClientConfig::for_backend(server.api_url(), server.ws_url());
    let storage = SessionStorage::in_memory();
    storage
        .write_login(
            &Session {
                token: "stale-token".to_string(),
                user_id: UserId(ALICE_ID),
                role: Role::Student,
            },
            ALICE_EMAIL,
        )
        .unwrap();
    let navigator = RecordingNavigator::new();
    let shared: Arc<dyn Navigator> = Arc::new(navigator.clone());
    let api = ApiClient::new(&config, storage.clone(), shared);

    // when (操作):
    let result = api.current_user().await;

    // then (期待する結果):
    assert!(matches!(result, Err(RequestError::Unauthorized(_))));
    assert_eq!(storage.session().unwrap(), None);
    assert_eq!(storage.token().unwrap(), None);
    assert_eq!(navigator.last(), Some(Destination::Login));
}

#[tokio::test]
async fn test_login_stores_session_and_navigates_by_role() {
    // テスト項目: ログインに成功するとセッションが保存され、ロール別のダッシュボードへ遷移する
    // given (前提条件):
    let server = StubServer::spawn().await.unwrap();

    // when (操作):
    let alice = TestUser::sign_in(&server, ALICE_EMAIL).await;

    // then (期待する結果):
    assert_eq!(alice.session.user_id, UserId(ALICE_ID));
    assert_eq!(alice.session.role, Role::Student);
    assert_eq!(alice.storage.session().unwrap(), Some(alice.session.clone()));
    assert_eq!(alice.storage.email().unwrap().as_deref(), Some(ALICE_EMAIL));
    assert_eq!(alice.navigator.last(), Some(Destination::StudentDashboard));
}

#[tokio::test]
async fn test_conflict_message_is_passed_through() {
    // テスト項目: 409 の本文のメッセージがそのままエラーになる
    // given (前提条件):
    let server = StubServer::spawn().await.unwrap();
    let alice = TestUser::sign_in(&server, ALICE_EMAIL).await;
    alice.api.send_request(UserId(BOB_ID)).await.unwrap();

    // when (操作):
    let result = alice.api.send_request(UserId(BOB_ID)).await;

    // then (期待する結果):
    let error = result.unwrap_err();
    assert_eq!(error.status(), Some(409));
    assert_eq!(error.message(), "Connection request already sent");
    // 401 以外ではセッションは残る
    assert!(alice.storage.session().unwrap().is_some());
}

#[tokio::test]
async fn test_plain_text_body_is_returned_as_string() {
    // テスト項目: JSON ではない本文は文字列として返される
    // given (前提条件):
    let server = StubServer::spawn().await.unwrap();
    let alice = TestUser::sign_in(&server, ALICE_EMAIL).await;
    let bob = TestUser::sign_in(&server, BOB_EMAIL).await;
    alice.api.send_request(UserId(BOB_ID)).await.unwrap();
    let request = bob.api.received_requests().await.unwrap().remove(0);

    // when (操作):
    let body = bob
        .api
        .request(
            Method::POST,
            &format!("/users/connection/{}/respond?accept=true", request.id.0),
            None,
        )
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(body, Some(Value::String("Connection Accepted".to_string())));
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_error() {
    // テスト項目: 接続できない場合はネットワークエラーになり、セッションは残る
    // given (前提条件):
    let config = ClientConfig::for_backend("http://127.0.0.1:9/api", "ws://127.0.0.1:9/ws");
    let storage = SessionStorage::in_memory();
    storage
        .write_login(
            &Session {
                token: "token".to_string(),
                user_id: UserId(ALICE_ID),
                role: Role::Student,
            },
            ALICE_EMAIL,
        )
        .unwrap();
    let api = ApiClient::new(&config, storage.clone(), Arc::new(RecordingNavigator::new()));

    // when (操作):
    let result = api.current_user().await;

    // then (期待する結果):
    let error = result.unwrap_err();
    assert!(matches!(error, RequestError::Network(_)));
    assert_eq!(error.message(), "Network error. Please try again.");
    assert!(storage.session().unwrap().is_some());
}
