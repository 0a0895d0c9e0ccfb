//! STOMP-over-WebSocket live channel with supervised reconnection.
//!
//! A supervisor task owns the socket. It performs the STOMP handshake,
//! subscribes to the signed-in user's queue and forwards every inbound
//! chat payload to the consumer. When the transport drops it retries with
//! the delays of [`ReconnectPolicy`] until the policy gives up.
//!
//! The current [`ChannelState`] is published on a `watch` channel so the
//! chat view can show a "reconnecting" indicator.

use std::time::Duration;

use alumnibridge_shared::{
    dto::live::{CHAT_SEND_DESTINATION, ChatPayload, user_queue},
    stomp::{Command as StompCommand, Frame},
};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{http::Uri, protocol::Message},
};

use super::LivePublisher;
use crate::{
    domain::{ReconnectPolicy, UserId},
    error::ChannelError,
};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
const SUBSCRIPTION_ID: &str = "sub-0";

/// Connection state of the live channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting {
        /// Consecutive failures so far
        attempt: u32,
        delay: Duration,
        show_indicator: bool,
    },
    /// Retries exhausted or the handshake was rejected; polling only from here on
    GaveUp,
}

impl ChannelState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelState::Connected)
    }
}

/// Parameters of a live channel
#[derive(Debug, Clone)]
pub struct LiveChannelConfig {
    pub url: String,
    pub token: String,
    pub user_id: UserId,
    pub policy: ReconnectPolicy,
}

enum Command {
    Publish {
        frame: Frame,
        reply: oneshot::Sender<Result<(), ChannelError>>,
    },
    Shutdown,
}

/// Handle to a running live channel. Dropping it shuts the supervisor down.
pub struct LiveChannelHandle {
    state: watch::Receiver<ChannelState>,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl LiveChannelHandle {
    /// Start the supervisor; inbound chat payloads are sent to `inbound`
    pub fn start(config: LiveChannelConfig, inbound: mpsc::UnboundedSender<ChatPayload>) -> Self {
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(supervise(config, inbound, command_rx, state_tx));
        Self {
            state: state_rx,
            commands: command_tx,
            task: Some(task),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Receiver for state changes
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Publish a chat payload to the application destination.
    ///
    /// Resolves once the frame is written to the socket.
    pub async fn publish(&self, payload: &ChatPayload) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        let body =
            serde_json::to_string(payload).map_err(|e| ChannelError::Protocol(e.to_string()))?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Publish {
                frame: Frame::send_json(CHAT_SEND_DESTINATION, body),
                reply: reply_tx,
            })
            .map_err(|_| ChannelError::NotConnected)?;
        reply_rx.await.map_err(|_| ChannelError::NotConnected)?
    }

    /// Ask the supervisor to send DISCONNECT and stop, without waiting
    pub fn close(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Send DISCONNECT and stop the supervisor
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(mut task) = self.task.take()
            && tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err()
        {
            task.abort();
        }
    }
}

#[async_trait]
impl LivePublisher for LiveChannelHandle {
    fn state(&self) -> ChannelState {
        LiveChannelHandle::state(self)
    }

    async fn publish(&self, payload: &ChatPayload) -> Result<(), ChannelError> {
        LiveChannelHandle::publish(self, payload).await
    }

    fn close(&self) {
        LiveChannelHandle::close(self)
    }
}

impl Drop for LiveChannelHandle {
    fn drop(&mut self) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        let _ = self.commands.send(Command::Shutdown);
        match tokio::runtime::Handle::try_current() {
            // Give the supervisor a moment to send DISCONNECT
            Ok(runtime) => {
                runtime.spawn(async move {
                    if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                        task.abort();
                    }
                });
            }
            Err(_) => task.abort(),
        }
    }
}

enum SessionEnd {
    /// Shutdown requested by the owner
    Shutdown,
    /// The session failed; `established` tells whether it had reached Connected
    Failed {
        error: ChannelError,
        established: bool,
    },
}

async fn supervise(
    config: LiveChannelConfig,
    inbound: mpsc::UnboundedSender<ChatPayload>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ChannelState>,
) {
    let policy = config.policy;
    let mut failures: u32 = 0;

    loop {
        state.send_replace(ChannelState::Connecting);
        tracing::info!("Connecting live channel to {}", config.url);

        let (error, established) = match run_session(&config, &inbound, &mut commands, &state).await
        {
            SessionEnd::Shutdown => {
                tracing::info!("Live channel closed");
                state.send_replace(ChannelState::Disconnected);
                return;
            }
            SessionEnd::Failed { error, established } => (error, established),
        };

        if established {
            failures = 0;
        }
        tracing::warn!("Live channel lost: {}", error);

        if !policy.should_attempt_reconnect(&error, failures) {
            tracing::error!(
                "Live channel gave up after {} attempts; falling back to polling",
                failures
            );
            state.send_replace(ChannelState::GaveUp);
            reject_until_closed(&mut commands).await;
            return;
        }

        let delay = policy.delay_for(failures);
        failures += 1;
        state.send_replace(ChannelState::Reconnecting {
            attempt: failures,
            delay,
            show_indicator: policy.should_show_indicator(failures),
        });
        tracing::info!(
            "Reconnecting live channel in {:?} (attempt {}/{})",
            delay,
            failures,
            policy.max_attempts
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => {
                        state.send_replace(ChannelState::Disconnected);
                        return;
                    }
                    Some(Command::Publish { reply, .. }) => {
                        let _ = reply.send(Err(ChannelError::NotConnected));
                    }
                },
            }
        }
    }
}

/// After giving up, answer publishes until the handle goes away
async fn reject_until_closed(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Publish { reply, .. } => {
                let _ = reply.send(Err(ChannelError::NotConnected));
            }
            Command::Shutdown => return,
        }
    }
}

async fn run_session(
    config: &LiveChannelConfig,
    inbound: &mpsc::UnboundedSender<ChatPayload>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    state: &watch::Sender<ChannelState>,
) -> SessionEnd {
    let failed = |error: ChannelError| SessionEnd::Failed {
        error,
        established: false,
    };

    let (ws_stream, _) = match connect_async(config.url.as_str()).await {
        Ok(result) => result,
        Err(e) => return failed(ChannelError::Handshake(e.to_string())),
    };
    let (mut write, mut read) = ws_stream.split();

    let connect = Frame::connect(&host_of(&config.url))
        .header("Authorization", format!("Bearer {}", config.token));
    if let Err(e) = write.send(Message::Text(connect.encode().into())).await {
        return failed(ChannelError::Handshake(e.to_string()));
    }

    // Wait for CONNECTED
    let handshake = async {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => match Frame::parse(&text) {
                    Ok(Some(frame)) if frame.command == StompCommand::Connected => return Ok(()),
                    Ok(Some(frame)) if frame.command == StompCommand::Error => {
                        let reason = frame
                            .get_header("message")
                            .map(str::to_string)
                            .unwrap_or_else(|| frame.body.clone());
                        return Err(ChannelError::Rejected(reason));
                    }
                    Ok(_) => continue,
                    Err(e) => return Err(ChannelError::Protocol(e.to_string())),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => return Err(ChannelError::Handshake(e.to_string())),
            }
        }
        Err(ChannelError::Handshake(
            "connection closed during handshake".to_string(),
        ))
    };
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => return failed(error),
        Err(_) => return failed(ChannelError::Handshake("handshake timed out".to_string())),
    }

    let subscribe = Frame::subscribe(SUBSCRIPTION_ID, &user_queue(config.user_id.0));
    if let Err(e) = write.send(Message::Text(subscribe.encode().into())).await {
        return failed(ChannelError::Transport(e.to_string()));
    }

    state.send_replace(ChannelState::Connected);
    tracing::info!("Live channel connected as user {}", config.user_id);

    let lost = |error: ChannelError| SessionEnd::Failed {
        error,
        established: true,
    };

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => match Frame::parse(&text) {
                    Ok(Some(frame)) => match frame.command {
                        StompCommand::Message => {
                            match serde_json::from_str::<ChatPayload>(&frame.body) {
                                Ok(payload) => {
                                    if inbound.send(payload).is_err() {
                                        tracing::debug!("Live channel consumer is gone");
                                    }
                                }
                                Err(e) => tracing::warn!("Failed to parse pushed message: {}", e),
                            }
                        }
                        StompCommand::Error => {
                            let reason = frame
                                .get_header("message")
                                .unwrap_or("broker error")
                                .to_string();
                            return lost(ChannelError::Protocol(reason));
                        }
                        _ => {}
                    },
                    // heart-beat
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Dropping malformed frame: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => {
                    return lost(ChannelError::Transport("connection closed by server".to_string()));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return lost(ChannelError::Transport(e.to_string())),
            },
            command = commands.recv() => match command {
                Some(Command::Publish { frame, reply }) => {
                    match write.send(Message::Text(frame.encode().into())).await {
                        Ok(()) => {
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            let error = ChannelError::Transport(e.to_string());
                            let _ = reply.send(Err(error.clone()));
                            return lost(error);
                        }
                    }
                }
                None | Some(Command::Shutdown) => {
                    let disconnect = Frame::new(StompCommand::Disconnect);
                    let _ = write.send(Message::Text(disconnect.encode().into())).await;
                    let _ = write.close().await;
                    return SessionEnd::Shutdown;
                }
            },
        }
    }
}

/// Virtual host for the CONNECT frame
fn host_of(url: &str) -> String {
    url.parse::<Uri>()
        .ok()
        .and_then(|uri| uri.host().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of_ws_url() {
        // テスト項目: WebSocket URL から CONNECT フレームのホスト名を取り出す
        // given (前提条件):
        let url = "ws://chat.example.com:8080/ws";

        // when (操作):
        let host = host_of(url);

        // then (期待する結果):
        assert_eq!(host, "chat.example.com");
        assert_eq!(host_of("not a url"), "localhost");
    }

    #[tokio::test]
    async fn test_publish_before_connected_is_rejected() {
        // テスト項目: 接続前の送信は NotConnected エラーになる
        // given (前提条件):
        let (inbound_tx, _inbound_rx) = mpsc::unbounded_channel();
        let handle = LiveChannelHandle::start(
            LiveChannelConfig {
                url: "ws://127.0.0.1:9/ws".to_string(),
                token: "t".to_string(),
                user_id: UserId(5),
                policy: ReconnectPolicy {
                    max_attempts: 0,
                    ..ReconnectPolicy::default()
                },
            },
            inbound_tx,
        );
        let payload = ChatPayload {
            sender_id: 5,
            receiver_id: 9,
            content: "hi".to_string(),
            is_event_link: false,
            event_id: None,
            client_message_id: None,
            id: None,
            timestamp: None,
        };

        // when (操作):
        let result = handle.publish(&payload).await;

        // then (期待する結果):
        assert_eq!(result, Err(ChannelError::NotConnected));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_server_gives_up_when_no_retries_allowed() {
        // テスト項目: 再接続回数が 0 の場合、接続失敗後に GaveUp 状態になる
        // given (前提条件):
        let (inbound_tx, _inbound_rx) = mpsc::unbounded_channel();
        let handle = LiveChannelHandle::start(
            LiveChannelConfig {
                url: "ws://127.0.0.1:9/ws".to_string(),
                token: "t".to_string(),
                user_id: UserId(5),
                policy: ReconnectPolicy {
                    max_attempts: 0,
                    ..ReconnectPolicy::default()
                },
            },
            inbound_tx,
        );
        let mut state = handle.watch_state();

        // when (操作):
        let reached = tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == ChannelState::GaveUp),
        )
        .await
        .map(|result| result.is_ok());

        // then (期待する結果):
        assert_eq!(reached, Ok(true));
        assert_eq!(handle.state(), ChannelState::GaveUp);
    }
}
