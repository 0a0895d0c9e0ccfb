//! Shared helpers for the integration tests: a signed-in client against the
//! in-process stub backend.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use alumnibridge_client::{
    api::ApiClient,
    config::ClientConfig,
    domain::{ReconnectPolicy, UserId},
    live::{LiveChannelConfig, LiveLink},
    navigation::{Navigator, RecordingNavigator},
    session::{Session, SessionStorage},
    usecase::{AuthUseCase, ChatTimers},
};
use alumnibridge_stub_server::{StubServer, store::SEED_PASSWORD};

/// Helper struct holding everything one signed-in user needs
pub struct TestUser {
    pub config: ClientConfig,
    pub api: Arc<ApiClient>,
    pub storage: SessionStorage,
    pub navigator: RecordingNavigator,
    pub session: Session,
}

impl TestUser {
    /// Sign in with a seeded account
    pub async fn sign_in(server: &StubServer, email: &str) -> Self {
        let config = ClientConfig::for_backend(server.api_url(), server.ws_url());
        let storage = SessionStorage::in_memory();
        let navigator = RecordingNavigator::new();
        let shared: Arc<dyn Navigator> = Arc::new(navigator.clone());
        let api = Arc::new(ApiClient::new(&config, storage.clone(), shared.clone()));

        let auth = AuthUseCase::new(api.clone(), api.clone(), storage.clone(), shared);
        let session = auth
            .login(email, SEED_PASSWORD)
            .await
            .expect("Failed to sign in");

        TestUser {
            config,
            api,
            storage,
            navigator,
            session,
        }
    }

    pub fn id(&self) -> UserId {
        self.session.user_id
    }

    /// Start a live channel with a fast reconnect policy
    pub fn live_link(&self) -> LiveLink {
        LiveLink::start(LiveChannelConfig {
            url: self.config.ws_url.clone(),
            token: self.session.token.clone(),
            user_id: self.session.user_id,
            policy: fast_policy(),
        })
    }
}

pub fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        max_attempts: 2,
        indicator_after: 1,
    }
}

/// Short timers so polling shows up within a test
pub fn fast_timers() -> ChatTimers {
    ChatTimers {
        poll_interval: Duration::from_millis(200),
        heartbeat_interval: Duration::from_secs(60),
        refresh_delay: Duration::from_millis(50),
    }
}

/// Upper bound for waiting on a view
pub const WAIT: Duration = Duration::from_secs(5);
