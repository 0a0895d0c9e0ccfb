//! Live messaging channel.
//!
//! [`LivePublisher`] is the seam the chat view talks to; [`LiveChannelHandle`]
//! implements it over STOMP/WebSocket.

pub mod channel;

use std::sync::Arc;

use alumnibridge_shared::dto::live::ChatPayload;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::error::ChannelError;

pub use channel::{ChannelState, LiveChannelConfig, LiveChannelHandle};

/// ライブチャネルへの送信（依存性の逆転）
#[async_trait]
pub trait LivePublisher: Send + Sync {
    /// 現在の接続状態
    fn state(&self) -> ChannelState;

    /// チャットメッセージを送信する
    async fn publish(&self, payload: &ChatPayload) -> Result<(), ChannelError>;

    /// チャネルを閉じる（DISCONNECT を送って終了する）
    fn close(&self);
}

/// A running live channel as consumed by the chat view
pub struct LiveLink {
    pub publisher: Arc<dyn LivePublisher>,
    /// Payloads pushed to the signed-in user's queue
    pub inbound: mpsc::UnboundedReceiver<ChatPayload>,
    pub states: watch::Receiver<ChannelState>,
}

impl LiveLink {
    /// Start a STOMP channel and wrap it
    pub fn start(config: LiveChannelConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let handle = LiveChannelHandle::start(config, inbound_tx);
        let states = handle.watch_state();
        Self {
            publisher: Arc::new(handle),
            inbound: inbound_rx,
            states,
        }
    }
}
