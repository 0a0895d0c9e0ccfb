//! UseCase: チャット画面（メッセージ配信チャネル）
//!
//! ライブチャネルのプッシュ、ポーリング結果、送信確認はすべて 1 つのキュー
//! （[`ChatEvent`]）に流し込まれ、単一のコンシューマタスクが [`ChatState`] に適用する。
//! 重複はタイムラインがメッセージ ID で排除する。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ChatView の mount / send_message / プッシュ受信 / unmount
//!
//! ### なぜこのテストが必要か
//! - 空白のみの入力ではネットワーク呼び出しも楽観的エントリも発生しないことを保証
//! - 楽観的エントリが確認メッセージで置き換えられ、重複表示されないことを確認
//! - 開いている会話と関係ないプッシュは追加されず、会話一覧だけが更新されることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：HTTP 送信、ライブチャネル送信とエコー
//! - 異常系：送信失敗で Failed になる
//! - エッジケース：同じメッセージをプッシュとポーリングの両方で受信する

use std::{sync::Arc, time::Duration};

use alumnibridge_shared::{
    dto::live::ChatPayload,
    time::{Clock, SystemClock},
};
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use uuid::Uuid;

use crate::{
    api::{ChatApi, conversion},
    config::ClientConfig,
    domain::{
        ChatMessage, Conversation, Timeline, UserId,
        conversation::{derive_conversations, filter_conversations},
        message::ApplyOutcome,
        validation::normalize_chat_input,
    },
    error::ClientError,
    live::{ChannelState, LiveLink, LivePublisher},
};

/// Timers of the chat view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatTimers {
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    /// Delay before the conversation list is refreshed after a send
    pub refresh_delay: Duration,
}

impl From<&ClientConfig> for ChatTimers {
    fn from(config: &ClientConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            heartbeat_interval: config.heartbeat_interval,
            refresh_delay: config.conversation_refresh_delay,
        }
    }
}

/// Producers' input to the single consumer
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Payload pushed on the live channel
    Pushed(ChatPayload),
    /// History of a conversation fetched by the polling timer or a reload
    Polled {
        counterpart: UserId,
        messages: Vec<ChatMessage>,
    },
    /// The backend confirmed an HTTP send
    Confirmed(ChatMessage),
    /// Delivery of an optimistic entry failed
    Failed(Uuid),
    ConversationsRefreshed(Vec<Conversation>),
    ChannelStateChanged(ChannelState),
}

/// チャット画面の状態
#[derive(Debug, Clone)]
pub struct ChatState {
    pub me: UserId,
    /// Most recent first
    pub conversations: Vec<Conversation>,
    /// Thread of the open conversation
    pub timeline: Option<Timeline>,
    pub channel: ChannelState,
    pub search: String,
    pub alert: Option<String>,
}

impl ChatState {
    fn new(me: UserId) -> Self {
        Self {
            me,
            conversations: Vec::new(),
            timeline: None,
            channel: ChannelState::Disconnected,
            search: String::new(),
            alert: None,
        }
    }

    pub fn counterpart(&self) -> Option<UserId> {
        self.timeline.as_ref().map(Timeline::counterpart)
    }

    /// Conversation list after the sidebar search
    pub fn visible_conversations(&self) -> Vec<&Conversation> {
        filter_conversations(&self.conversations, &self.search)
    }

    pub fn conversation_with(&self, user_id: UserId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| conversation.counterpart() == user_id)
    }
}

/// What the consumer asks for after applying an event
#[derive(Debug, Default, PartialEq, Eq)]
struct FollowUp {
    refresh_conversations: bool,
    reload_thread: Option<UserId>,
}

struct Inner {
    api: Arc<dyn ChatApi>,
    clock: Arc<dyn Clock>,
    timers: ChatTimers,
    state: Mutex<ChatState>,
    events: mpsc::UnboundedSender<ChatEvent>,
    /// Bumped after every state change (render trigger)
    revision: watch::Sender<u64>,
}

impl Inner {
    fn emit(&self, event: ChatEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Chat consumer is gone; dropping event");
        }
    }

    fn touch(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Apply one event; the only writer of conversations, timeline and channel state
    async fn apply(&self, event: ChatEvent) -> FollowUp {
        let mut follow_up = FollowUp::default();
        let mut state = self.state.lock().await;

        match event {
            ChatEvent::Pushed(payload) => {
                // Every push refreshes the conversation list (last message, ordering)
                follow_up.refresh_conversations = true;
                let counterpart = state.counterpart();
                let sender = UserId(payload.sender_id);
                let receiver = UserId(payload.receiver_id);
                let involves_open = counterpart.is_some_and(|c| c == sender || c == receiver);

                match conversion::message_from_push(payload, self.clock.now()) {
                    Some(message) => {
                        if let Some(timeline) = state.timeline.as_mut() {
                            let outcome = timeline.apply(message);
                            tracing::debug!("Pushed message: {:?}", outcome);
                        }
                    }
                    None if involves_open => follow_up.reload_thread = counterpart,
                    None => {}
                }
            }
            ChatEvent::Polled {
                counterpart,
                messages,
            } => {
                if let Some(timeline) = state
                    .timeline
                    .as_mut()
                    .filter(|timeline| timeline.counterpart() == counterpart)
                {
                    let changed = timeline.apply_snapshot(messages);
                    if changed > 0 {
                        tracing::debug!("Poll brought {} new messages", changed);
                    }
                }
            }
            ChatEvent::Confirmed(message) => {
                if let Some(timeline) = state.timeline.as_mut()
                    && timeline.apply(message) == ApplyOutcome::Ignored
                {
                    tracing::debug!("Confirmation for a closed conversation");
                }
            }
            ChatEvent::Failed(client_id) => {
                if let Some(timeline) = state.timeline.as_mut() {
                    timeline.mark_failed(client_id);
                }
                state.alert = Some("Failed to send message".to_string());
            }
            ChatEvent::ConversationsRefreshed(conversations) => {
                state.conversations = derive_conversations(conversations);
            }
            ChatEvent::ChannelStateChanged(channel) => {
                if channel != state.channel {
                    tracing::info!("Live channel state: {:?}", channel);
                }
                state.channel = channel;
            }
        }

        drop(state);
        self.touch();
        follow_up
    }
}

/// Fetch the conversation list and queue it
async fn refresh_conversations(inner: &Inner) {
    match inner.api.conversations().await {
        Ok(conversations) => inner.emit(ChatEvent::ConversationsRefreshed(conversations)),
        Err(e) => tracing::warn!("Failed to refresh conversations: {}", e),
    }
}

/// Fetch a thread and queue it
async fn reload_thread(inner: &Inner, counterpart: UserId) {
    match inner.api.messages(counterpart).await {
        Ok(messages) => inner.emit(ChatEvent::Polled {
            counterpart,
            messages,
        }),
        Err(e) => tracing::warn!("Failed to load messages with {}: {}", counterpart, e),
    }
}

/// チャット画面
///
/// `mount` で生成され、`unmount`（または drop）でタイマーとライブチャネルが停止する。
pub struct ChatView {
    inner: Arc<Inner>,
    live: Option<Arc<dyn LivePublisher>>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChatView {
    /// チャット画面を開く
    ///
    /// # Arguments
    ///
    /// * `api` - チャット API
    /// * `me` - サインイン中のユーザー ID
    /// * `timers` - ポーリング・ハートビートの間隔
    /// * `live` - ライブチャネル（`None` の場合はポーリングのみ）
    /// * `select` - 事前に選択する会話の相手（`chat.html?userId=9` に相当）
    pub async fn mount(
        api: Arc<dyn ChatApi>,
        me: UserId,
        timers: ChatTimers,
        live: Option<LiveLink>,
        select: Option<UserId>,
    ) -> Result<Self, ClientError> {
        Self::mount_with_clock(api, me, timers, live, select, Arc::new(SystemClock)).await
    }

    pub async fn mount_with_clock(
        api: Arc<dyn ChatApi>,
        me: UserId,
        timers: ChatTimers,
        live: Option<LiveLink>,
        select: Option<UserId>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ClientError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (revision, _) = watch::channel(0);
        let inner = Arc::new(Inner {
            api,
            clock,
            timers,
            state: Mutex::new(ChatState::new(me)),
            events: events_tx,
            revision,
        });

        let mut tasks = vec![tokio::spawn(consume(inner.clone(), events_rx))];

        // Initial conversation list goes straight into the state
        match inner.api.conversations().await {
            Ok(conversations) => {
                inner.state.lock().await.conversations = derive_conversations(conversations);
            }
            Err(e) => {
                tracing::error!("Failed to load conversations: {}", e);
                inner.state.lock().await.alert = Some(e.message());
            }
        }
        inner.touch();

        let publisher = match live {
            Some(LiveLink {
                publisher,
                inbound,
                states,
            }) => {
                tasks.push(tokio::spawn(forward_pushes(inner.clone(), inbound)));
                tasks.push(tokio::spawn(forward_states(inner.clone(), states)));
                Some(publisher)
            }
            None => None,
        };
        tasks.push(tokio::spawn(poll(inner.clone())));
        tasks.push(tokio::spawn(heartbeat(inner.clone())));

        let view = Self {
            inner,
            live: publisher,
            tasks,
        };
        if let Some(user_id) = select {
            view.open_conversation(user_id).await?;
        }
        Ok(view)
    }

    /// 会話を選択し、履歴を読み込む
    pub async fn open_conversation(&self, counterpart: UserId) -> Result<(), ClientError> {
        {
            let mut state = self.inner.state.lock().await;
            let me = state.me;
            state.timeline = Some(Timeline::new(me, counterpart));
        }
        self.inner.touch();

        let messages = self.inner.api.messages(counterpart).await?;
        self.inner.emit(ChatEvent::Polled {
            counterpart,
            messages,
        });
        Ok(())
    }

    pub async fn set_search(&self, term: impl Into<String>) {
        self.inner.state.lock().await.search = term.into();
        self.inner.touch();
    }

    /// メッセージを送信する
    ///
    /// 空白のみの入力は何もしない（`Ok(None)`）。それ以外は楽観的エントリを即座に表示し、
    /// ライブチャネルが接続中ならそちらで、そうでなければ HTTP で送信する。
    ///
    /// # Returns
    ///
    /// * `Ok(Some(ChatMessage))` - 表示した楽観的エントリ
    /// * `Ok(None)` - 送信する内容がない
    /// * `Err(ClientError::UnknownConversation)` - 会話が選択されていない
    /// * `Err(ClientError::Request)` - HTTP 送信の失敗（エントリは Failed になる）
    pub async fn send_message(&self, content: &str) -> Result<Option<ChatMessage>, ClientError> {
        let Some(content) = normalize_chat_input(content) else {
            return Ok(None);
        };

        let optimistic = {
            let mut state = self.inner.state.lock().await;
            let timeline = state
                .timeline
                .as_mut()
                .ok_or(ClientError::UnknownConversation)?;
            timeline.push_optimistic(content, self.inner.clock.now())
        };
        self.inner.touch();

        let result = self.deliver(&optimistic).await;
        self.schedule_conversation_refresh();
        result.map(|()| Some(optimistic))
    }

    async fn deliver(&self, message: &ChatMessage) -> Result<(), ClientError> {
        if let Some(live) = self
            .live
            .as_ref()
            .filter(|live| live.state().is_connected())
        {
            match live.publish(&conversion::push_payload(message)).await {
                // The broker echo confirms the entry
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!("Live publish failed, falling back to HTTP: {}", e),
            }
        }

        match self.inner.api.send_message(message.clone()).await {
            Ok(saved) => {
                self.inner.emit(ChatEvent::Confirmed(saved));
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to send message: {}", e);
                if let Some(client_id) = message.client_message_id {
                    self.inner.emit(ChatEvent::Failed(client_id));
                }
                Err(e.into())
            }
        }
    }

    fn schedule_conversation_refresh(&self) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.timers.refresh_delay).await;
            refresh_conversations(&inner).await;
        });
    }

    /// 現在の状態のコピー
    pub async fn snapshot(&self) -> ChatState {
        self.inner.state.lock().await.clone()
    }

    /// 状態が変わるたびに値が増える受信側（再描画のトリガー）
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// `predicate` が成立するまで待つ。タイムアウトした場合は `false`。
    pub async fn wait_until<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&ChatState) -> bool,
    {
        let mut revisions = self.subscribe();
        let wait = async {
            loop {
                if predicate(&*self.inner.state.lock().await) {
                    return;
                }
                if revisions.changed().await.is_err() {
                    return;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
            && predicate(&*self.inner.state.lock().await)
    }

    /// 画面を閉じる（タイマーとライブチャネルを停止）
    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(live) = self.live.take() {
            live.close();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// The single consumer of [`ChatEvent`]s
async fn consume(inner: Arc<Inner>, mut events: mpsc::UnboundedReceiver<ChatEvent>) {
    while let Some(event) = events.recv().await {
        let follow_up = inner.apply(event).await;
        if follow_up.refresh_conversations {
            let inner = inner.clone();
            tokio::spawn(async move { refresh_conversations(&inner).await });
        }
        if let Some(counterpart) = follow_up.reload_thread {
            let inner = inner.clone();
            tokio::spawn(async move { reload_thread(&inner, counterpart).await });
        }
    }
}

async fn forward_pushes(inner: Arc<Inner>, mut inbound: mpsc::UnboundedReceiver<ChatPayload>) {
    while let Some(payload) = inbound.recv().await {
        inner.emit(ChatEvent::Pushed(payload));
    }
}

async fn forward_states(inner: Arc<Inner>, mut states: watch::Receiver<ChannelState>) {
    loop {
        let state = *states.borrow_and_update();
        inner.emit(ChatEvent::ChannelStateChanged(state));
        if states.changed().await.is_err() {
            break;
        }
    }
}

/// Redundant refresh of the open thread and the conversation list
async fn poll(inner: Arc<Inner>) {
    let mut interval = tokio::time::interval(inner.timers.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; mount already loaded everything
    interval.tick().await;
    loop {
        interval.tick().await;
        let counterpart = inner.state.lock().await.counterpart();
        if let Some(counterpart) = counterpart {
            reload_thread(&inner, counterpart).await;
        }
        refresh_conversations(&inner).await;
    }
}

/// Liveness signal so the backend can compute online status
async fn heartbeat(inner: Arc<Inner>) {
    let mut interval = tokio::time::interval(inner.timers.heartbeat_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(e) = inner.api.heartbeat().await {
            tracing::warn!("Heartbeat failed: {}", e);
        }
    }
}
