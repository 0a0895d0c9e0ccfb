//! UseCase: イベント一覧と参加登録、イベントの作成・更新・削除
//!
//! 登録・登録解除の成功後は一覧を再取得せず、ローカルの登録数を更新する。
//! 作成・更新・削除はフォーム検証の後に送信し、成功したら一覧を再取得する。

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    api::{EventsApi, conversion::event_request},
    domain::{
        Event, EventBoard, EventId,
        validation::{EventForm, validate_event},
    },
    error::ClientError,
};

/// イベント画面の状態
#[derive(Debug, Clone, Default)]
pub struct EventsState {
    pub board: EventBoard,
    pub alert: Option<String>,
    pub notice: Option<String>,
}

/// イベント画面
pub struct EventsView {
    api: Arc<dyn EventsApi>,
    state: Mutex<EventsState>,
}

impl EventsView {
    pub fn new(api: Arc<dyn EventsApi>) -> Self {
        Self {
            api,
            state: Mutex::new(EventsState::default()),
        }
    }

    pub async fn snapshot(&self) -> EventsState {
        self.state.lock().await.clone()
    }

    /// イベント一覧を読み込む
    ///
    /// 自分の登録状況の取得は失敗しても続行する（全て未登録として表示）。
    pub async fn load(&self) -> Result<(), ClientError> {
        let registered = match self.api.my_registrations().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Failed to load registrations: {}", e);
                Vec::new()
            }
        };

        let events = match self.api.active_events().await {
            Ok(events) => events,
            Err(e) => {
                self.state.lock().await.alert = Some(e.message());
                return Err(e.into());
            }
        };

        let mut board = EventBoard::new(events);
        board.mark_registered(&registered);

        let mut state = self.state.lock().await;
        tracing::debug!(
            "Loaded {} events ({} registered)",
            board.events().len(),
            registered.len()
        );
        state.board = board;
        Ok(())
    }

    /// イベントに参加登録する
    pub async fn register(&self, event_id: EventId) -> Result<Option<Event>, ClientError> {
        match self.api.register(event_id).await {
            Ok(confirmation) => {
                let mut state = self.state.lock().await;
                state.board.record_registration(event_id);
                state.alert = None;
                state.notice = Some(
                    confirmation.unwrap_or_else(|| "Successfully registered for event!".to_string()),
                );
                Ok(state.board.get(event_id).cloned())
            }
            Err(e) => {
                tracing::warn!("Registration for event {} failed: {}", event_id, e);
                self.state.lock().await.alert = Some(e.message());
                Err(e.into())
            }
        }
    }

    /// 参加登録を取り消す
    pub async fn unregister(&self, event_id: EventId) -> Result<Option<Event>, ClientError> {
        match self.api.unregister(event_id).await {
            Ok(confirmation) => {
                let mut state = self.state.lock().await;
                state.board.record_unregistration(event_id);
                state.alert = None;
                state.notice = Some(
                    confirmation.unwrap_or_else(|| "Registration cancelled".to_string()),
                );
                Ok(state.board.get(event_id).cloned())
            }
            Err(e) => {
                tracing::warn!("Unregistration from event {} failed: {}", event_id, e);
                self.state.lock().await.alert = Some(e.message());
                Err(e.into())
            }
        }
    }

    /// イベントを作成する
    ///
    /// # Returns
    ///
    /// * `Ok(Event)` - 作成されたイベント
    /// * `Err(ClientError::Validation)` - 入力検証エラー（ネットワーク呼び出しなし）
    /// * `Err(ClientError::Request)` - バックエンドのエラー
    pub async fn create(&self, form: &EventForm) -> Result<Event, ClientError> {
        validate_event(form).map_err(ClientError::Validation)?;
        match self.api.create_event(event_request(form)).await {
            Ok(event) => {
                tracing::info!("Created event {} '{}'", event.id, event.title);
                self.finish_edit("Event created successfully!").await;
                Ok(event)
            }
            Err(e) => {
                tracing::warn!("Event creation failed: {}", e);
                self.fail_edit(e.message()).await;
                Err(e.into())
            }
        }
    }

    /// イベントを更新する
    pub async fn update(&self, event_id: EventId, form: &EventForm) -> Result<Event, ClientError> {
        validate_event(form).map_err(ClientError::Validation)?;
        match self.api.update_event(event_id, event_request(form)).await {
            Ok(event) => {
                tracing::info!("Updated event {}", event_id);
                self.finish_edit("Event updated successfully!").await;
                Ok(event)
            }
            Err(e) => {
                tracing::warn!("Update of event {} failed: {}", event_id, e);
                self.fail_edit(e.message()).await;
                Err(e.into())
            }
        }
    }

    /// イベントを削除する
    pub async fn delete(&self, event_id: EventId) -> Result<(), ClientError> {
        match self.api.delete_event(event_id).await {
            Ok(_) => {
                tracing::info!("Deleted event {}", event_id);
                self.finish_edit("Event deleted successfully!").await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Deletion of event {} failed: {}", event_id, e);
                self.fail_edit(e.message()).await;
                Err(e.into())
            }
        }
    }

    /// 編集の成功を通知して一覧を再取得する。再取得の失敗は警告として残す。
    async fn finish_edit(&self, notice: &str) {
        {
            let mut state = self.state.lock().await;
            state.alert = None;
            state.notice = Some(notice.to_string());
        }
        if let Err(e) = self.load().await {
            tracing::warn!("Reload after event change failed: {}", e);
        }
    }

    async fn fail_edit(&self, message: String) {
        let mut state = self.state.lock().await;
        state.notice = None;
        state.alert = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::endpoints::MockEventsApi,
        domain::RegistrationControl,
        error::RequestError,
    };
    use chrono::{DateTime, NaiveDate, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-11-27T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn event(id: i64, capacity: u32, count: u32) -> Event {
        Event {
            id: EventId(id),
            title: format!("Meetup {}", id),
            description: None,
            date: NaiveDate::from_ymd_opt(2025, 12, 10).unwrap(),
            time: None,
            location: None,
            organizer: None,
            capacity: Some(capacity),
            registration_count: count,
            is_registered: false,
        }
    }

    #[tokio::test]
    async fn test_load_marks_registered_events() {
        // テスト項目: 自分の登録状況が一覧に反映される
        // given (前提条件):
        let mut api = MockEventsApi::new();
        api.expect_my_registrations()
            .returning(|| Ok(vec![EventId(2)]));
        api.expect_active_events()
            .returning(|| Ok(vec![event(1, 50, 10), event(2, 50, 10)]));
        let view = EventsView::new(Arc::new(api));

        // when (操作):
        view.load().await.unwrap();

        // then (期待する結果):
        let state = view.snapshot().await;
        assert!(!state.board.get(EventId(1)).unwrap().is_registered);
        assert_eq!(
            state.board.get(EventId(2)).unwrap().registration_control(now()),
            RegistrationControl::Registered
        );
    }

    #[tokio::test]
    async fn test_load_survives_registration_lookup_failure() {
        // テスト項目: 登録状況の取得に失敗しても一覧は表示される
        // given (前提条件):
        let mut api = MockEventsApi::new();
        api.expect_my_registrations()
            .returning(|| Err(RequestError::Network("reset".to_string())));
        api.expect_active_events()
            .returning(|| Ok(vec![event(1, 50, 50)]));
        let view = EventsView::new(Arc::new(api));

        // when (操作):
        let result = view.load().await;

        // then (期待する結果):
        assert!(result.is_ok());
        let state = view.snapshot().await;
        let control = state.board.get(EventId(1)).unwrap().registration_control(now());
        assert_eq!(control.label(), "Event Full");
        assert!(!control.enabled());
    }

    #[tokio::test]
    async fn test_register_at_49_updates_count_locally() {
        // テスト項目: 登録数 49 で登録すると再取得せずに 50 になり、ボタンが無効化される
        // given (前提条件):
        let mut api = MockEventsApi::new();
        api.expect_my_registrations().returning(|| Ok(Vec::new()));
        api.expect_active_events()
            .times(1)
            .returning(|| Ok(vec![event(1, 50, 49)]));
        api.expect_register()
            .withf(|id| *id == EventId(1))
            .returning(|_| Ok(Some("Successfully registered for event".to_string())));
        let view = EventsView::new(Arc::new(api));
        view.load().await.unwrap();

        // when (操作):
        let updated = view.register(EventId(1)).await.unwrap().unwrap();

        // then (期待する結果):
        assert_eq!(updated.registration_count, 50);
        assert!(!updated.registration_control(now()).enabled());
        assert_eq!(
            view.snapshot().await.notice.as_deref(),
            Some("Successfully registered for event")
        );
    }

    #[tokio::test]
    async fn test_rejected_registration_keeps_count() {
        // テスト項目: 登録が拒否された場合、登録数は変わらずメッセージがそのまま表示される
        // given (前提条件):
        let mut api = MockEventsApi::new();
        api.expect_my_registrations().returning(|| Ok(Vec::new()));
        api.expect_active_events()
            .returning(|| Ok(vec![event(1, 50, 49)]));
        api.expect_register().returning(|_| {
            Err(RequestError::Status {
                status: 400,
                message: "Event is full".to_string(),
            })
        });
        let view = EventsView::new(Arc::new(api));
        view.load().await.unwrap();

        // when (操作):
        let result = view.register(EventId(1)).await;

        // then (期待する結果):
        assert!(result.is_err());
        let state = view.snapshot().await;
        assert_eq!(state.alert.as_deref(), Some("Event is full"));
        assert_eq!(state.board.get(EventId(1)).unwrap().registration_count, 49);
    }

    #[tokio::test]
    async fn test_unregister_decrements_count() {
        // テスト項目: 登録解除で登録数が 1 減り、未登録に戻る
        // given (前提条件):
        let mut api = MockEventsApi::new();
        api.expect_my_registrations()
            .returning(|| Ok(vec![EventId(1)]));
        api.expect_active_events()
            .returning(|| Ok(vec![event(1, 50, 50)]));
        api.expect_unregister().returning(|_| Ok(None));
        let view = EventsView::new(Arc::new(api));
        view.load().await.unwrap();

        // when (操作):
        let updated = view.unregister(EventId(1)).await.unwrap().unwrap();

        // then (期待する結果):
        assert_eq!(updated.registration_count, 49);
        assert!(!updated.is_registered);
        assert_eq!(
            updated.registration_control(now()),
            RegistrationControl::RegisterNow
        );
    }

    fn meetup_form() -> EventForm {
        EventForm {
            title: "Winter Meetup".to_string(),
            date: "2025-12-10".to_string(),
            time: "18:00".to_string(),
            location: "Hall A".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_event_form_is_not_sent() {
        // テスト項目: 必須項目が欠けたイベントフォームは送信されない
        // given (前提条件):
        let mut api = MockEventsApi::new();
        api.expect_create_event().never();
        let view = EventsView::new(Arc::new(api));
        let form = EventForm {
            location: String::new(),
            ..meetup_form()
        };

        // when (操作):
        let result = view.create(&form).await;

        // then (期待する結果):
        match result {
            Err(ClientError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].message, "Location is required");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_event_reloads_board() {
        // テスト項目: イベント作成に成功すると既定の定員で送信され、通知を出して一覧を再取得する
        // given (前提条件):
        let mut api = MockEventsApi::new();
        api.expect_create_event()
            .withf(|request| request.title == "Winter Meetup" && request.capacity == 100)
            .times(1)
            .returning(|_| Ok(event(7, 100, 0)));
        api.expect_my_registrations().returning(|| Ok(Vec::new()));
        api.expect_active_events()
            .times(1)
            .returning(|| Ok(vec![event(7, 100, 0)]));
        let view = EventsView::new(Arc::new(api));

        // when (操作):
        let created = view.create(&meetup_form()).await.unwrap();

        // then (期待する結果):
        assert_eq!(created.id, EventId(7));
        let state = view.snapshot().await;
        assert_eq!(state.notice.as_deref(), Some("Event created successfully!"));
        assert!(state.board.get(EventId(7)).is_some());
    }

    #[tokio::test]
    async fn test_update_event_sends_target_id() {
        // テスト項目: イベント更新は対象 ID と入力内容を送信する
        // given (前提条件):
        let mut api = MockEventsApi::new();
        api.expect_update_event()
            .withf(|id, request| *id == EventId(3) && request.capacity == 40)
            .times(1)
            .returning(|_, _| Ok(event(3, 40, 0)));
        api.expect_my_registrations().returning(|| Ok(Vec::new()));
        api.expect_active_events()
            .returning(|| Ok(vec![event(3, 40, 0)]));
        let view = EventsView::new(Arc::new(api));
        let form = EventForm {
            capacity: Some(40),
            ..meetup_form()
        };

        // when (操作):
        let updated = view.update(EventId(3), &form).await.unwrap();

        // then (期待する結果):
        assert_eq!(updated.capacity, Some(40));
        assert_eq!(
            view.snapshot().await.notice.as_deref(),
            Some("Event updated successfully!")
        );
    }

    #[tokio::test]
    async fn test_rejected_delete_shows_backend_message() {
        // テスト項目: 削除が拒否された場合、バックエンドのメッセージを表示し一覧は再取得しない
        // given (前提条件):
        let mut api = MockEventsApi::new();
        api.expect_delete_event().returning(|_| {
            Err(RequestError::Status {
                status: 400,
                message: "Event not found".to_string(),
            })
        });
        api.expect_active_events().never();
        let view = EventsView::new(Arc::new(api));

        // when (操作):
        let result = view.delete(EventId(99)).await;

        // then (期待する結果):
        assert!(result.is_err());
        let state = view.snapshot().await;
        assert_eq!(state.alert.as_deref(), Some("Event not found"));
        assert_eq!(state.notice, None);
    }
}
