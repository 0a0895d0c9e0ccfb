//! Integration tests for direct messaging over HTTP and the live channel.

mod common;

use std::time::Duration;

use alumnibridge_client::{
    domain::{ChatMessage, Delivery, MessageId, UserId},
    live::{ChannelState, LiveChannelConfig, LiveLink},
    usecase::{ChatState, ChatView},
};
use alumnibridge_stub_server::{
    StubServer,
    store::{ALICE_EMAIL, ALICE_ID, CAROL_EMAIL, CAROL_ID},
};

use common::{TestUser, WAIT, fast_policy, fast_timers};

fn entries_with<'a>(state: &'a ChatState, content: &str) -> Vec<&'a ChatMessage> {
    state
        .timeline
        .as_ref()
        .map(|timeline| {
            timeline
                .messages()
                .iter()
                .filter(|message| message.content == content)
                .collect()
        })
        .unwrap_or_default()
}

fn confirmed_once(state: &ChatState, content: &str) -> bool {
    let entries = entries_with(state, content);
    entries.len() == 1
        && entries[0].delivery == Delivery::Confirmed
        && matches!(entries[0].id, MessageId::Server(_))
}

#[tokio::test]
async fn test_http_send_is_confirmed_and_polling_picks_up_replies() {
    // テスト項目: ライブチャネルなしでも HTTP で送信・確定され、相手の返信はポーリングで届く
    // given (前提条件):
    let server = StubServer::spawn().await.unwrap();
    let alice = TestUser::sign_in(&server, ALICE_EMAIL).await;
    let carol = TestUser::sign_in(&server, CAROL_EMAIL).await;
    let alice_view = ChatView::mount(
        alice.api.clone(),
        alice.id(),
        fast_timers(),
        None,
        Some(UserId(CAROL_ID)),
    )
    .await
    .unwrap();
    assert!(
        alice_view
            .wait_until(WAIT, |state| confirmed_once(state, "Welcome to AlumniBridge!"))
            .await
    );

    // when (操作):
    let optimistic = alice_view
        .send_message("  Hello over HTTP  ")
        .await
        .unwrap()
        .unwrap();

    // then (期待する結果): 楽観的エントリが確定済みのエントリに置き換わる
    assert_eq!(optimistic.content, "Hello over HTTP");
    assert!(optimistic.client_message_id.is_some());
    assert!(
        alice_view
            .wait_until(WAIT, |state| confirmed_once(state, "Hello over HTTP"))
            .await
    );
    assert!(
        alice_view
            .wait_until(WAIT, |state| {
                state
                    .conversation_with(UserId(CAROL_ID))
                    .is_some_and(|conversation| conversation.preview() == "Hello over HTTP")
            })
            .await
    );

    // when (操作): Carol が返信する
    let carol_view = ChatView::mount(
        carol.api.clone(),
        carol.id(),
        fast_timers(),
        None,
        Some(UserId(ALICE_ID)),
    )
    .await
    .unwrap();
    carol_view.send_message("Hi Alice").await.unwrap();

    // then (期待する結果): Alice の画面にポーリングで現れる
    assert!(
        alice_view
            .wait_until(WAIT, |state| confirmed_once(state, "Hi Alice"))
            .await
    );
    let state = alice_view.snapshot().await;
    let reply = entries_with(&state, "Hi Alice")[0];
    assert_eq!(reply.sender_id, UserId(CAROL_ID));

    alice_view.unmount();
    carol_view.unmount();
}

#[tokio::test]
async fn test_blank_message_is_not_sent() {
    // テスト項目: 空白のみの入力は送信されない
    // given (前提条件):
    let server = StubServer::spawn().await.unwrap();
    let alice = TestUser::sign_in(&server, ALICE_EMAIL).await;
    let view = ChatView::mount(
        alice.api.clone(),
        alice.id(),
        fast_timers(),
        None,
        Some(UserId(CAROL_ID)),
    )
    .await
    .unwrap();
    assert!(
        view.wait_until(WAIT, |state| {
            state.timeline.as_ref().is_some_and(|timeline| !timeline.is_empty())
        })
        .await
    );
    let before = view.snapshot().await.timeline.unwrap().messages().len();

    // when (操作):
    let sent = view.send_message("   ").await.unwrap();

    // then (期待する結果):
    assert!(sent.is_none());
    assert_eq!(view.snapshot().await.timeline.unwrap().messages().len(), before);
}

#[tokio::test]
async fn test_live_message_is_echoed_once_and_pushed_to_receiver() {
    // テスト項目: ライブチャネルで送信したメッセージはエコーで確定し、重複せず、相手にも届く
    // given (前提条件):
    let server = StubServer::spawn().await.unwrap();
    let alice = TestUser::sign_in(&server, ALICE_EMAIL).await;
    let carol = TestUser::sign_in(&server, CAROL_EMAIL).await;
    let alice_view = ChatView::mount(
        alice.api.clone(),
        alice.id(),
        fast_timers(),
        Some(alice.live_link()),
        Some(UserId(CAROL_ID)),
    )
    .await
    .unwrap();
    let carol_view = ChatView::mount(
        carol.api.clone(),
        carol.id(),
        fast_timers(),
        Some(carol.live_link()),
        Some(UserId(ALICE_ID)),
    )
    .await
    .unwrap();
    assert!(
        alice_view
            .wait_until(WAIT, |state| state.channel.is_connected())
            .await
    );
    assert!(
        carol_view
            .wait_until(WAIT, |state| state.channel.is_connected())
            .await
    );
    // Let the broker register both subscriptions
    tokio::time::sleep(Duration::from_millis(200)).await;

    // when (操作):
    alice_view.send_message("Live hello").await.unwrap();

    // then (期待する結果):
    assert!(
        alice_view
            .wait_until(WAIT, |state| confirmed_once(state, "Live hello"))
            .await
    );
    assert!(
        carol_view
            .wait_until(WAIT, |state| confirmed_once(state, "Live hello"))
            .await
    );

    // ポーリングが何度か走っても重複しない
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(confirmed_once(&alice_view.snapshot().await, "Live hello"));
    assert!(confirmed_once(&carol_view.snapshot().await, "Live hello"));
    let state = carol_view.snapshot().await;
    assert_eq!(entries_with(&state, "Live hello")[0].sender_id, UserId(ALICE_ID));

    alice_view.unmount();
    carol_view.unmount();
}

#[tokio::test]
async fn test_rejected_handshake_gives_up_without_retrying() {
    // テスト項目: 無効なトークンでの接続は拒否され、再接続せずに GaveUp になる
    // given (前提条件):
    let server = StubServer::spawn().await.unwrap();
    let link = LiveLink::start(LiveChannelConfig {
        url: server.ws_url(),
        token: "not-a-token".to_string(),
        user_id: UserId(ALICE_ID),
        policy: fast_policy(),
    });
    let mut states = link.states.clone();

    // when (操作):
    let reached = tokio::time::timeout(
        WAIT,
        states.wait_for(|state| *state == ChannelState::GaveUp),
    )
    .await;

    // then (期待する結果):
    assert!(reached.is_ok_and(|result| result.is_ok()));
    assert!(!link.publisher.state().is_connected());
    link.publisher.close();
}
