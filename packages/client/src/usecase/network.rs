//! UseCase: ネットワーク画面（つながりの状態と操作）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - NetworkView::refresh() と 5 つの操作（送信・承認・拒否・取り消し・切断）
//!
//! ### なぜこのテストが必要か
//! - 3 つのコレクションから導出した状態が正しく表示されることを保証
//! - 操作の成功時に再取得され、失敗時にボタンが元に戻りメッセージがそのまま表示されることを確認
//! - 同じ操作を連続で実行してもクラッシュしないこと（重複排除はしない）を確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：リクエスト送信後に PENDING_SENT になる
//! - 異常系：重複リクエストに対するバックエンドの拒否、一部コレクションの取得失敗
//! - エッジケース：同じ相手へのリクエストを 2 回連続で送信する
//! - エッジケース：再取得中もボタンは無効のまま

use std::{
    collections::HashMap,
    future::Future,
    sync::Arc,
};

use tokio::sync::Mutex;

use crate::{
    api::{ConnectionsApi, UsersApi},
    domain::{
        ConnectionRequest, ConnectionStatus, ConnectionStatusMap, Control, Person, RequestId,
        UserId,
        connection::{SortKey, browse_list, controls_for},
    },
    error::{ClientError, RequestError},
};

/// リクエスト一覧のタブ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTab {
    Received,
    Sent,
}

/// 人物カード（表示用）
#[derive(Debug, Clone, PartialEq)]
pub struct PersonCard {
    pub person: Person,
    pub status: ConnectionStatus,
    pub controls: Vec<Control>,
}

/// タブのバッジに表示する件数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Badges {
    pub connections: usize,
    pub received: usize,
    pub sent: usize,
}

/// ネットワーク画面の状態
#[derive(Debug, Clone, Default)]
pub struct NetworkState {
    pub current_user: Option<Person>,
    pub people: Vec<Person>,
    pub connections: Vec<Person>,
    pub received: Vec<ConnectionRequest>,
    pub sent: Vec<ConnectionRequest>,
    pub statuses: ConnectionStatusMap,
    /// 操作中の相手ごとの実行中の件数（ボタンの無効化に使う）
    pub in_flight: HashMap<UserId, usize>,
    pub search: String,
    pub sort: SortKey,
    /// 直近のエラー（バックエンドのメッセージをそのまま保持）
    pub alert: Option<String>,
    /// 直近の操作の確認メッセージ
    pub notice: Option<String>,
}

impl NetworkState {
    fn is_busy(&self, user_id: UserId) -> bool {
        self.in_flight.get(&user_id).is_some_and(|count| *count > 0)
    }

    fn begin(&mut self, user_id: UserId) {
        *self.in_flight.entry(user_id).or_insert(0) += 1;
    }

    fn finish(&mut self, user_id: UserId) {
        if let Some(count) = self.in_flight.get_mut(&user_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.in_flight.remove(&user_id);
            }
        }
    }

    /// 「すべてのユーザー」一覧のカード
    pub fn cards(&self) -> Vec<PersonCard> {
        browse_list(
            &self.people,
            self.current_user.as_ref().map(|user| user.id),
            &self.search,
            self.sort,
        )
        .into_iter()
        .map(|person| {
            let status = self.statuses.status_of(person.id);
            let controls = controls_for(person.id, status, self.is_busy(person.id));
            PersonCard {
                person,
                status,
                controls,
            }
        })
        .collect()
    }

    /// 接続済みのカード
    pub fn connection_cards(&self) -> Vec<PersonCard> {
        self.connections
            .iter()
            .map(|person| PersonCard {
                person: person.clone(),
                status: ConnectionStatus::Accepted,
                controls: controls_for(
                    person.id,
                    ConnectionStatus::Accepted,
                    self.is_busy(person.id),
                ),
            })
            .collect()
    }

    pub fn requests(&self, tab: RequestTab) -> &[ConnectionRequest] {
        match tab {
            RequestTab::Received => &self.received,
            RequestTab::Sent => &self.sent,
        }
    }

    pub fn badges(&self) -> Badges {
        Badges {
            connections: self.connections.len(),
            received: self.received.len(),
            sent: self.sent.len(),
        }
    }
}

/// ネットワーク画面
///
/// 状態は `tokio::sync::Mutex` で保護し、ネットワーク呼び出しの間はロックを保持しない。
pub struct NetworkView {
    users: Arc<dyn UsersApi>,
    connections: Arc<dyn ConnectionsApi>,
    state: Mutex<NetworkState>,
}

impl NetworkView {
    /// 新しい NetworkView を作成
    pub fn new(users: Arc<dyn UsersApi>, connections: Arc<dyn ConnectionsApi>) -> Self {
        Self {
            users,
            connections,
            state: Mutex::new(NetworkState::default()),
        }
    }

    /// 現在の状態のコピー
    pub async fn snapshot(&self) -> NetworkState {
        self.state.lock().await.clone()
    }

    pub async fn status_of(&self, user_id: UserId) -> ConnectionStatus {
        self.state.lock().await.statuses.status_of(user_id)
    }

    pub async fn set_search(&self, term: impl Into<String>) {
        self.state.lock().await.search = term.into();
    }

    pub async fn set_sort(&self, sort: SortKey) {
        self.state.lock().await.sort = sort;
    }

    /// 全データを再取得して状態を再構築する
    ///
    /// 現在のユーザーを取得した後、4 つのコレクションを並行して取得する。
    /// 取得に失敗したコレクションは空になり、そのエラーがアラートとして表示される。
    /// 取得は 1 つのトランザクションではないため、件数とカードが一時的に食い違うことがある。
    ///
    /// # Returns
    ///
    /// * `Ok(())` - 現在のユーザーの取得に成功（コレクションの一部が失敗していても成功扱い）
    /// * `Err(ClientError)` - 現在のユーザーの取得に失敗
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let current_user = match self.users.current_user().await {
            Ok(user) => user,
            Err(e) => {
                self.state.lock().await.alert = Some(e.message());
                return Err(e.into());
            }
        };

        let (people, connections, received, sent) = tokio::join!(
            self.users.search_users(None),
            self.connections.connections(),
            self.connections.received_requests(),
            self.connections.sent_requests(),
        );

        let mut alert = None;
        let people = collect_or_clear("users", people, &mut alert);
        let connections = collect_or_clear("connections", connections, &mut alert);
        let received = collect_or_clear("received requests", received, &mut alert);
        let sent = collect_or_clear("sent requests", sent, &mut alert);

        let mut state = self.state.lock().await;
        state.statuses = ConnectionStatusMap::build(&connections, &received, &sent);
        state.current_user = Some(current_user);
        state.people = people;
        state.connections = connections;
        state.received = received;
        state.sent = sent;
        state.alert = alert;
        tracing::debug!(
            "Network refreshed: {} people, {} connections, {} received, {} sent",
            state.people.len(),
            state.connections.len(),
            state.received.len(),
            state.sent.len()
        );
        Ok(())
    }

    /// つながりリクエストを送信
    pub async fn send_request(&self, user_id: UserId) -> Result<Option<String>, ClientError> {
        self.perform(
            user_id,
            "Connection request sent!",
            self.connections.send_request(user_id),
        )
        .await
    }

    /// 受信したリクエストを承認（リクエスト ID で指定）
    pub async fn accept_request(
        &self,
        request_id: RequestId,
        sender_id: UserId,
    ) -> Result<Option<String>, ClientError> {
        self.perform(
            sender_id,
            "Connection accepted!",
            self.connections.respond(request_id, true),
        )
        .await
    }

    /// 受信したリクエストを拒否（リクエスト ID で指定）
    pub async fn reject_request(
        &self,
        request_id: RequestId,
        sender_id: UserId,
    ) -> Result<Option<String>, ClientError> {
        self.perform(
            sender_id,
            "Connection request rejected",
            self.connections.respond(request_id, false),
        )
        .await
    }

    /// 送信したリクエストを取り消す（相手のユーザー ID で指定、切断と同じエンドポイント）
    pub async fn cancel_request(&self, user_id: UserId) -> Result<Option<String>, ClientError> {
        self.perform(
            user_id,
            "Connection request cancelled",
            self.connections.remove_connection(user_id),
        )
        .await
    }

    /// つながりを切断する（相手のユーザー ID で指定）
    pub async fn disconnect(&self, user_id: UserId) -> Result<Option<String>, ClientError> {
        self.perform(
            user_id,
            "Disconnected successfully",
            self.connections.remove_connection(user_id),
        )
        .await
    }

    /// 操作を実行する
    ///
    /// 実行中は相手のボタンを無効化する。成功時は全データを再取得し、再取得が終わるまで
    /// ボタンは無効のまま。失敗時はボタンを元に戻し、バックエンドのメッセージをそのままアラートにする。
    /// 重複実行のガードは行わない。
    async fn perform(
        &self,
        target: UserId,
        default_notice: &str,
        action: impl Future<Output = Result<Option<String>, RequestError>>,
    ) -> Result<Option<String>, ClientError> {
        self.state.lock().await.begin(target);
        let confirmation = match action.await {
            Ok(confirmation) => confirmation,
            Err(e) => {
                tracing::warn!("Action on user {} failed: {}", target, e);
                let mut state = self.state.lock().await;
                state.finish(target);
                state.notice = None;
                state.alert = Some(e.message());
                return Err(e.into());
            }
        };

        {
            let mut state = self.state.lock().await;
            state.alert = None;
            state.notice = Some(
                confirmation
                    .clone()
                    .unwrap_or_else(|| default_notice.to_string()),
            );
        }
        if let Err(e) = self.refresh().await {
            tracing::warn!("Refresh after action failed: {}", e);
        }
        self.state.lock().await.finish(target);
        Ok(confirmation)
    }
}

fn collect_or_clear<T>(
    what: &str,
    result: Result<Vec<T>, RequestError>,
    alert: &mut Option<String>,
) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            tracing::error!("Failed to load {}: {}", what, e);
            alert.get_or_insert_with(|| e.message());
            Vec::new()
        }
    }
}
