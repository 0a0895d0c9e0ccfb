//! UseCase: 認証（ログイン・新規登録・ログアウト）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - AuthUseCase の login / register / logout / require_auth / display_name
//!
//! ### なぜこのテストが必要か
//! - 入力検証に失敗した場合はネットワーク呼び出しを行わないことを保証
//! - ログイン成功時に 5 つのストレージキーが書き込まれ、ロール別の画面へ遷移することを確認
//! - 表示名の取得が キャッシュ → /users/me → メールアドレス → "User" の順で解決されることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：ログイン・登録・ログアウト
//! - 異常系：入力検証エラー、認証失敗
//! - エッジケース：表示名の取得に失敗してもログイン自体は成功する

use std::sync::Arc;

use alumnibridge_shared::dto::http::RegisterRequest;

use crate::{
    api::{AuthApi, UsersApi},
    domain::validation::{RegistrationForm, validate_login, validate_registration},
    error::ClientError,
    navigation::{Destination, Navigator},
    session::{Session, SessionStorage},
};

/// 表示名が何も分からない場合の既定値
const FALLBACK_DISPLAY_NAME: &str = "User";

/// 認証のユースケース
pub struct AuthUseCase {
    auth: Arc<dyn AuthApi>,
    users: Arc<dyn UsersApi>,
    storage: SessionStorage,
    navigator: Arc<dyn Navigator>,
}

impl AuthUseCase {
    /// 新しい AuthUseCase を作成
    pub fn new(
        auth: Arc<dyn AuthApi>,
        users: Arc<dyn UsersApi>,
        storage: SessionStorage,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            auth,
            users,
            storage,
            navigator,
        }
    }

    /// ログインを実行
    ///
    /// # Arguments
    ///
    /// * `email` - メールアドレス（前後の空白は除去される）
    /// * `password` - パスワード
    ///
    /// # Returns
    ///
    /// * `Ok(Session)` - 保存されたセッション
    /// * `Err(ClientError::Validation)` - 入力検証エラー（ネットワーク呼び出しなし）
    /// * `Err(ClientError::Request)` - バックエンドのエラー
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let email = email.trim();
        validate_login(email, password).map_err(ClientError::Validation)?;

        let session = self
            .auth
            .login(email.to_string(), password.to_string())
            .await?;
        self.complete_sign_in(&session, email).await?;
        Ok(session)
    }

    /// 新規登録を実行し、そのままログイン状態にする
    pub async fn register(&self, form: &RegistrationForm) -> Result<Session, ClientError> {
        validate_registration(form).map_err(ClientError::Validation)?;
        let role = form
            .role
            .map(|role| role.as_str().to_string())
            .unwrap_or_default();

        let email = form.email.trim();
        let request = RegisterRequest {
            name: form.name.trim().to_string(),
            email: email.to_string(),
            password: form.password.clone(),
            role,
            institute: form.institute.as_deref().map(str::trim).map(str::to_string),
            batch_year: form.batch_year,
            degree_name: form
                .degree_name
                .as_deref()
                .map(str::trim)
                .filter(|degree| !degree.is_empty())
                .map(str::to_string),
        };

        let session = self.auth.register(request).await?;
        self.complete_sign_in(&session, email).await?;
        Ok(session)
    }

    /// セッションを保存し、表示名をキャッシュしてロール別の画面へ遷移する
    async fn complete_sign_in(&self, session: &Session, email: &str) -> Result<(), ClientError> {
        self.storage.write_login(session, email)?;
        tracing::info!(
            "Signed in as user {} ({})",
            session.user_id,
            session.role
        );

        // 表示名のキャッシュはベストエフォート
        match self.users.current_user().await {
            Ok(person) => {
                if let Err(e) = self.storage.cache_display_name(person.display_name()) {
                    tracing::warn!("Failed to cache display name: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to fetch current user: {}", e),
        }

        self.navigator.navigate(Destination::for_role(session.role));
        Ok(())
    }

    /// ログアウト（ストレージを一括削除してログイン画面へ）
    pub fn logout(&self) -> Result<(), ClientError> {
        self.storage.clear()?;
        tracing::info!("Signed out");
        self.navigator.navigate(Destination::Login);
        Ok(())
    }

    /// 認証済みであることを確認する。未認証の場合はログイン画面へ遷移する。
    pub fn require_auth(&self) -> Result<Session, ClientError> {
        match self.storage.session()? {
            Some(session) => Ok(session),
            None => {
                self.navigator.navigate(Destination::Login);
                Err(ClientError::NotAuthenticated)
            }
        }
    }

    /// 表示名を解決する
    ///
    /// キャッシュ済みの名前 → `/users/me` → メールアドレス → "User" の順に試す。
    pub async fn display_name(&self) -> String {
        if let Ok(Some(name)) = self.storage.display_name() {
            return name;
        }

        match self.users.current_user().await {
            Ok(person) if !person.name.trim().is_empty() => {
                let name = person.name.trim().to_string();
                if let Err(e) = self.storage.cache_display_name(&name) {
                    tracing::warn!("Failed to cache display name: {}", e);
                }
                return name;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to fetch current user: {}", e),
        }

        self.storage
            .email()
            .ok()
            .flatten()
            .filter(|email| !email.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::endpoints::{MockAuthApi, MockUsersApi},
        domain::{Person, Role, UserId},
        error::RequestError,
        navigation::RecordingNavigator,
    };

    fn session(role: Role) -> Session {
        Session {
            token: "token-5".to_string(),
            user_id: UserId(5),
            role,
        }
    }

    fn usecase(
        auth: MockAuthApi,
        users: MockUsersApi,
    ) -> (AuthUseCase, SessionStorage, Arc<RecordingNavigator>) {
        let storage = SessionStorage::in_memory();
        let navigator = Arc::new(RecordingNavigator::new());
        let usecase = AuthUseCase::new(
            Arc::new(auth),
            Arc::new(users),
            storage.clone(),
            navigator.clone(),
        );
        (usecase, storage, navigator)
    }

    #[tokio::test]
    async fn test_login_with_invalid_input_makes_no_request() {
        // テスト項目: 入力検証に失敗した場合、ネットワーク呼び出しを行わない
        // given (前提条件):
        let mut auth = MockAuthApi::new();
        auth.expect_login().never();
        let (usecase, storage, navigator) = usecase(auth, MockUsersApi::new());

        // when (操作):
        let result = usecase.login("not-an-email", "123").await;

        // then (期待する結果):
        match result {
            Err(ClientError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(storage.session().unwrap(), None);
        assert_eq!(navigator.last(), None);
    }

    #[tokio::test]
    async fn test_login_writes_session_and_redirects_by_role() {
        // テスト項目: ログイン成功時にセッションを保存し、ロール別の画面へ遷移する
        // given (前提条件):
        let mut auth = MockAuthApi::new();
        auth.expect_login()
            .withf(|email, password| email == "alice@example.com" && password == "secret1")
            .times(1)
            .returning(|_, _| Ok(session(Role::Alumni)));
        let mut users = MockUsersApi::new();
        users
            .expect_current_user()
            .returning(|| Ok(Person::new(UserId(5), "Alice")));
        let (usecase, storage, navigator) = usecase(auth, users);

        // when (操作):
        let result = usecase.login("  alice@example.com ", "secret1").await;

        // then (期待する結果):
        assert_eq!(result.unwrap(), session(Role::Alumni));
        assert_eq!(storage.session().unwrap(), Some(session(Role::Alumni)));
        assert_eq!(
            storage.email().unwrap().as_deref(),
            Some("alice@example.com")
        );
        assert_eq!(storage.display_name().unwrap().as_deref(), Some("Alice"));
        assert_eq!(navigator.last(), Some(Destination::AlumniDashboard));
    }

    #[tokio::test]
    async fn test_login_succeeds_when_profile_fetch_fails() {
        // テスト項目: 表示名の取得に失敗してもログインは成功する
        // given (前提条件):
        let mut auth = MockAuthApi::new();
        auth.expect_login()
            .returning(|_, _| Ok(session(Role::Student)));
        let mut users = MockUsersApi::new();
        users
            .expect_current_user()
            .returning(|| Err(RequestError::Network("timeout".to_string())));
        let (usecase, storage, navigator) = usecase(auth, users);

        // when (操作):
        let result = usecase.login("bob@example.com", "secret1").await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(storage.display_name().unwrap(), None);
        assert_eq!(navigator.last(), Some(Destination::StudentDashboard));
    }

    #[tokio::test]
    async fn test_login_rejected_by_backend_passes_message_through() {
        // テスト項目: バックエンドが拒否した場合、メッセージがそのまま返され何も保存されない
        // given (前提条件):
        let mut auth = MockAuthApi::new();
        auth.expect_login().returning(|_, _| {
            Err(RequestError::Status {
                status: 400,
                message: "Invalid credentials".to_string(),
            })
        });
        let (usecase, storage, _navigator) = usecase(auth, MockUsersApi::new());

        // when (操作):
        let result = usecase.login("bob@example.com", "wrong-password").await;

        // then (期待する結果):
        let error = result.unwrap_err();
        assert_eq!(error.user_message(), "Invalid credentials");
        assert_eq!(storage.token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_register_sends_role_and_signs_in() {
        // テスト項目: 新規登録はロールを文字列で送信し、そのままログイン状態になる
        // given (前提条件):
        let mut auth = MockAuthApi::new();
        auth.expect_register()
            .withf(|request| {
                request.role == "STUDENT"
                    && request.name == "Carol"
                    && request.batch_year == Some(2026)
                    && request.degree_name.is_none()
            })
            .times(1)
            .returning(|_| Ok(session(Role::Student)));
        let mut users = MockUsersApi::new();
        users
            .expect_current_user()
            .returning(|| Ok(Person::new(UserId(5), "Carol")));
        let (usecase, storage, navigator) = usecase(auth, users);
        let form = RegistrationForm {
            name: " Carol ".to_string(),
            email: "carol@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
            role: Some(Role::Student),
            institute: Some("Engineering College".to_string()),
            batch_year: Some(2026),
            degree_name: Some("  ".to_string()),
        };

        // when (操作):
        let result = usecase.register(&form).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert!(storage.session().unwrap().is_some());
        assert_eq!(navigator.last(), Some(Destination::StudentDashboard));
    }

    #[tokio::test]
    async fn test_logout_clears_storage_and_redirects() {
        // テスト項目: ログアウトでストレージが消去され、ログイン画面へ遷移する
        // given (前提条件):
        let (usecase, storage, navigator) = usecase(MockAuthApi::new(), MockUsersApi::new());
        storage
            .write_login(&session(Role::Alumni), "alice@example.com")
            .unwrap();

        // when (操作):
        usecase.logout().unwrap();

        // then (期待する結果):
        assert_eq!(storage.session().unwrap(), None);
        assert_eq!(storage.email().unwrap(), None);
        assert_eq!(navigator.last(), Some(Destination::Login));
    }

    #[tokio::test]
    async fn test_require_auth_without_session_redirects_to_login() {
        // テスト項目: セッションがない場合、ログイン画面へ遷移しエラーを返す
        // given (前提条件):
        let (usecase, _storage, navigator) = usecase(MockAuthApi::new(), MockUsersApi::new());

        // when (操作):
        let result = usecase.require_auth();

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::NotAuthenticated)));
        assert_eq!(navigator.last(), Some(Destination::Login));
    }

    #[tokio::test]
    async fn test_display_name_falls_back_to_email() {
        // テスト項目: キャッシュも /users/me の名前もない場合、メールアドレスが表示名になる
        // given (前提条件):
        let mut users = MockUsersApi::new();
        users
            .expect_current_user()
            .returning(|| Ok(Person::new(UserId(5), "")));
        let (usecase, storage, _navigator) = usecase(MockAuthApi::new(), users);
        storage
            .write_login(&session(Role::Alumni), "alice@example.com")
            .unwrap();

        // when (操作):
        let name = usecase.display_name().await;

        // then (期待する結果):
        assert_eq!(name, "alice@example.com");
    }

    #[tokio::test]
    async fn test_display_name_defaults_to_user() {
        // テスト項目: 何も分からない場合、表示名は "User" になる
        // given (前提条件):
        let mut users = MockUsersApi::new();
        users
            .expect_current_user()
            .returning(|| Err(RequestError::Network("down".to_string())));
        let (usecase, _storage, _navigator) = usecase(MockAuthApi::new(), users);

        // when (操作):
        let name = usecase.display_name().await;

        // then (期待する結果):
        assert_eq!(name, "User");
    }
}
