//! UseCase 層
//!
//! 各画面の状態を所有し、API trait（依存性の逆転）を通じてバックエンドを呼び出す。

pub mod auth;
pub mod chat;
pub mod events;
pub mod network;

pub use auth::AuthUseCase;
pub use chat::{ChatEvent, ChatState, ChatTimers, ChatView};
pub use events::{EventsState, EventsView};
pub use network::{Badges, NetworkState, NetworkView, PersonCard, RequestTab};
