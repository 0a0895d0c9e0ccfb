//! Interactive chat session.
//!
//! Input is read on a dedicated thread (rustyline is synchronous) and sent
//! over an mpsc channel; view changes arrive on the view's revision channel.
//! Both are multiplexed with `tokio::select!`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use alumnibridge_shared::time::Clock;
use chrono::{DateTime, Utc};
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use crate::{
    domain::{ChatMessage, Delivery, MessageId, UserId},
    error::ClientError,
    live::ChannelState,
    usecase::{ChatState, ChatView},
};

use super::{
    formatter::Formatter,
    prompt::{prompt_for, redisplay_prompt},
};

const HELP: &str = "\
Commands:
  /list            show conversations
  /open <userId>   open the conversation with a user
  /search <term>   filter conversations by name
  /history         show the open thread again
  /help            show this help
  /quit            leave the chat
Anything else is sent to the open conversation.
";

/// A line typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    List,
    Open(UserId),
    Search(String),
    History,
    Help,
    Quit,
    Send(String),
    Invalid(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return ChatCommand::Send(line.to_string());
        };
        let (name, argument) = match command.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (command, ""),
        };
        match name {
            "list" => ChatCommand::List,
            "open" => match argument.parse() {
                Ok(user_id) => ChatCommand::Open(user_id),
                Err(_) => ChatCommand::Invalid(format!("invalid user id '{}'", argument)),
            },
            "search" => ChatCommand::Search(argument.to_string()),
            "history" => ChatCommand::History,
            "help" => ChatCommand::Help,
            "quit" | "exit" => ChatCommand::Quit,
            other => ChatCommand::Invalid(format!("unknown command '/{}'", other)),
        }
    }
}

/// Prints what changed in the chat state since the last render
#[derive(Debug)]
pub struct Renderer {
    counterpart: Option<UserId>,
    printed: HashMap<MessageId, Delivery>,
    channel: ChannelState,
    alert: Option<String>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            counterpart: None,
            printed: HashMap::new(),
            channel: ChannelState::Disconnected,
            alert: None,
        }
    }
}

/// Stable identity of a rendered entry across its confirmation
fn render_key(message: &ChatMessage) -> MessageId {
    message
        .client_message_id
        .map(MessageId::Pending)
        .unwrap_or(message.id)
}

/// Display name of a counterpart
pub fn counterpart_name(state: &ChatState, user_id: UserId) -> String {
    state
        .conversation_with(user_id)
        .map(|conversation| conversation.person.display_name().to_string())
        .unwrap_or_else(|| format!("User {}", user_id))
}

impl Renderer {
    /// Text to print for the changes since the previous call
    pub fn render_changes(&mut self, state: &ChatState, now: DateTime<Utc>) -> String {
        let mut output = String::new();

        if state.channel != self.channel {
            self.channel = state.channel;
            match Formatter::format_channel_state(&state.channel) {
                Some(indicator) => output.push_str(&indicator),
                None if state.channel.is_connected() => {
                    output.push_str("● Live updates connected\n");
                }
                None => {}
            }
        }

        if state.alert != self.alert {
            self.alert = state.alert.clone();
            if let Some(alert) = &state.alert {
                output.push_str(&Formatter::format_alert(alert));
            }
        }

        let Some(timeline) = &state.timeline else {
            self.counterpart = None;
            return output;
        };
        let name = counterpart_name(state, timeline.counterpart());

        if self.counterpart != Some(timeline.counterpart()) {
            self.counterpart = Some(timeline.counterpart());
            self.printed = timeline
                .messages()
                .iter()
                .map(|message| (render_key(message), message.delivery))
                .collect();
            output.push_str(&Formatter::format_thread(timeline, state.me, &name, now));
            return output;
        }

        for message in timeline.messages() {
            let key = render_key(message);
            match self.printed.insert(key, message.delivery) {
                None => output.push_str(&Formatter::format_message(message, state.me, &name)),
                Some(previous)
                    if previous != Delivery::Failed && message.delivery == Delivery::Failed =>
                {
                    output.push_str(&Formatter::format_message(message, state.me, &name));
                }
                Some(_) => {}
            }
        }
        output
    }
}

/// Run the interactive chat until `/quit`, Ctrl+C or Ctrl+D
pub async fn run_chat_session(view: ChatView, clock: Arc<dyn Clock>) -> Result<(), ClientError> {
    let mut revisions = view.subscribe();
    let mut renderer = Renderer::default();

    let state = view.snapshot().await;
    let prompt = Arc::new(Mutex::new(prompt_for(
        state
            .counterpart()
            .map(|id| counterpart_name(&state, id))
            .as_deref(),
    )));
    print!(
        "{}",
        Formatter::format_conversations(&state.visible_conversations(), state.counterpart(), clock.now())
    );
    print!("{}", renderer.render_changes(&state, clock.now()));
    println!("Type /help for commands.");

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let prompt_for_input = prompt.clone();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            let prompt = prompt_for_input
                .lock()
                .map(|prompt| prompt.clone())
                .unwrap_or_else(|_| prompt_for(None));
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            line = input_rx.recv() => {
                let Some(line) = line else { break };
                match ChatCommand::parse(&line) {
                    ChatCommand::Quit => break,
                    ChatCommand::Help => print!("{}", HELP),
                    ChatCommand::Invalid(reason) => print!("{}", Formatter::format_alert(&reason)),
                    ChatCommand::List => {
                        let state = view.snapshot().await;
                        print!(
                            "{}",
                            Formatter::format_conversations(
                                &state.visible_conversations(),
                                state.counterpart(),
                                clock.now()
                            )
                        );
                    }
                    ChatCommand::Search(term) => {
                        view.set_search(term).await;
                        let state = view.snapshot().await;
                        print!(
                            "{}",
                            Formatter::format_conversations(
                                &state.visible_conversations(),
                                state.counterpart(),
                                clock.now()
                            )
                        );
                    }
                    ChatCommand::History => {
                        let state = view.snapshot().await;
                        if let Some(timeline) = &state.timeline {
                            let name = counterpart_name(&state, timeline.counterpart());
                            print!("{}", Formatter::format_thread(timeline, state.me, &name, clock.now()));
                        }
                    }
                    ChatCommand::Open(user_id) => {
                        if let Err(e) = view.open_conversation(user_id).await {
                            print!("{}", Formatter::format_alert(&e.user_message()));
                        }
                        let state = view.snapshot().await;
                        if let Ok(mut prompt) = prompt.lock() {
                            *prompt = prompt_for(Some(&counterpart_name(&state, user_id)));
                        }
                    }
                    ChatCommand::Send(content) => {
                        if let Err(e) = view.send_message(&content).await {
                            print!("{}", Formatter::format_alert(&e.user_message()));
                        }
                    }
                }
                let current = prompt.lock().map(|p| p.clone()).unwrap_or_default();
                redisplay_prompt(&current);
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = view.snapshot().await;
                let output = renderer.render_changes(&state, clock.now());
                if !output.is_empty() {
                    print!("\n{}", output);
                    let current = prompt.lock().map(|p| p.clone()).unwrap_or_default();
                    redisplay_prompt(&current);
                }
            }
        }
    }

    view.unmount();
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Conversation, Person, Timeline};
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-11-27T15:45:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn state_with_thread() -> ChatState {
        let mut timeline = Timeline::new(UserId(5), UserId(9));
        timeline.push_optimistic("hello", now());
        ChatState {
            me: UserId(5),
            conversations: vec![Conversation {
                person: Person::new(UserId(9), "Bob"),
                last_message: None,
                last_message_at: None,
            }],
            timeline: Some(timeline),
            channel: ChannelState::Disconnected,
            search: String::new(),
            alert: None,
        }
    }

    #[test]
    fn test_parse_commands() {
        // テスト項目: 入力行がコマンドまたは送信メッセージとして解釈される
        // given (前提条件):
        let lines = ["/open 9", "/open bob", "/search  bo ", "/quit", "hello /there", "/dance"];

        // when (操作):
        let commands: Vec<ChatCommand> = lines.iter().map(|line| ChatCommand::parse(line)).collect();

        // then (期待する結果):
        assert_eq!(commands[0], ChatCommand::Open(UserId(9)));
        assert!(matches!(commands[1], ChatCommand::Invalid(_)));
        assert_eq!(commands[2], ChatCommand::Search("bo".to_string()));
        assert_eq!(commands[3], ChatCommand::Quit);
        assert_eq!(commands[4], ChatCommand::Send("hello /there".to_string()));
        assert!(matches!(commands[5], ChatCommand::Invalid(_)));
    }

    #[test]
    fn test_renderer_prints_thread_once_then_only_new_entries() {
        // テスト項目: 初回はスレッド全体、以降は新しいエントリだけが表示される
        // given (前提条件):
        let mut renderer = Renderer::default();
        let mut state = state_with_thread();

        // when (操作):
        let first = renderer.render_changes(&state, now());
        let unchanged = renderer.render_changes(&state, now());
        if let Some(timeline) = state.timeline.as_mut() {
            timeline.push_optimistic("second", now());
        }
        let second = renderer.render_changes(&state, now());

        // then (期待する結果):
        assert!(first.contains("Chat with Bob"));
        assert!(first.contains("@me: hello (sending…)"));
        assert_eq!(unchanged, "");
        assert!(second.contains("@me: second"));
        assert!(!second.contains("hello"));
    }

    #[test]
    fn test_renderer_reports_failures_and_channel_changes() {
        // テスト項目: 送信失敗とライブチャネルの状態変化が表示される
        // given (前提条件):
        let mut renderer = Renderer::default();
        let mut state = state_with_thread();
        renderer.render_changes(&state, now());
        let client_id = state
            .timeline
            .as_ref()
            .and_then(|t| t.messages()[0].client_message_id)
            .unwrap();

        // when (操作):
        if let Some(timeline) = state.timeline.as_mut() {
            timeline.mark_failed(client_id);
        }
        state.channel = ChannelState::Reconnecting {
            attempt: 3,
            delay: Duration::from_secs(4),
            show_indicator: true,
        };
        let output = renderer.render_changes(&state, now());

        // then (期待する結果):
        assert!(output.contains("(failed to send)"));
        assert!(output.contains("Reconnecting"));
    }
}
