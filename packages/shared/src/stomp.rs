//! STOMP 1.2 frame codec.
//!
//! The live messaging channel carries one STOMP frame per WebSocket text
//! message. A frame is
//!
//! ```text
//! COMMAND
//! header1:value1
//! header2:value2
//!
//! body^@
//! ```
//!
//! where `^@` is the NUL octet. A text message that only contains end-of-line
//! characters is a heart-beat.

use std::fmt;

use thiserror::Error;

/// Errors while decoding a STOMP frame
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StompError {
    /// The frame has no command line
    #[error("Empty frame")]
    Empty,

    /// The command is not part of STOMP 1.2
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The frame is not terminated by a NUL octet
    #[error("Frame is missing its NUL terminator")]
    MissingTerminator,

    /// A header line has no `:` separator
    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    /// A header contains an undefined escape sequence
    #[error("Invalid escape sequence in header: {0}")]
    InvalidEscape(String),
}

/// STOMP commands (client and server frames)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    fn parse(value: &str) -> Result<Self, StompError> {
        match value {
            "CONNECT" => Ok(Command::Connect),
            "STOMP" => Ok(Command::Stomp),
            "CONNECTED" => Ok(Command::Connected),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe),
            "SEND" => Ok(Command::Send),
            "MESSAGE" => Ok(Command::Message),
            "RECEIPT" => Ok(Command::Receipt),
            "ERROR" => Ok(Command::Error),
            "DISCONNECT" => Ok(Command::Disconnect),
            other => Err(StompError::UnknownCommand(other.to_string())),
        }
    }

    /// CONNECT and CONNECTED frames never escape their headers
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Builder-style header append
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Builder-style body setter
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header. Repeated headers keep the first occurrence (STOMP 1.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// `CONNECT` frame for the given virtual host
    pub fn connect(host: &str) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", "0,0")
    }

    /// `SUBSCRIBE` frame
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    /// `SEND` frame with a JSON body
    pub fn send_json(destination: &str, body: impl Into<String>) -> Self {
        Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .body(body)
    }

    /// Serialize into the wire representation (NUL-terminated)
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse a frame from its wire representation.
    ///
    /// Returns `Ok(None)` for heart-beats.
    pub fn parse(raw: &str) -> Result<Option<Frame>, StompError> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        if raw.is_empty() {
            return Ok(None);
        }

        let raw = raw
            .trim_end_matches(['\r', '\n'])
            .strip_suffix('\0')
            .ok_or(StompError::MissingTerminator)?;

        let (head, body) = match raw.find("\n\n") {
            Some(index) => (&raw[..index], &raw[index + 2..]),
            None => match raw.find("\r\n\r\n") {
                Some(index) => (&raw[..index], &raw[index + 4..]),
                None => (raw, ""),
            },
        };

        let mut lines = head.lines();
        let command_line = lines.next().map(str::trim).unwrap_or_default();
        if command_line.is_empty() {
            return Err(StompError::Empty);
        }
        let command = Command::parse(command_line)?;
        let escape = command.escapes_headers();

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| StompError::MalformedHeader(line.to_string()))?;
            if escape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        Ok(Some(Frame {
            command,
            headers,
            body: body.to_string(),
        }))
    }
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(StompError::InvalidEscape(value.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_send_frame() {
        // テスト項目: SEND フレームが正しいワイヤ形式にエンコードされる
        // given (前提条件):
        let frame = Frame::send_json("/app/chat.send", r#"{"content":"hi"}"#);

        // when (操作):
        let encoded = frame.encode();

        // then (期待する結果):
        assert_eq!(
            encoded,
            "SEND\ndestination:/app/chat.send\ncontent-type:application/json\n\n{\"content\":\"hi\"}\0"
        );
    }

    #[test]
    fn test_parse_message_frame() {
        // テスト項目: MESSAGE フレームのヘッダーとボディが解析される
        // given (前提条件):
        let raw = "MESSAGE\ndestination:/queue/messages/9\nsubscription:sub-0\nmessage-id:1\n\n{\"senderId\":5}\0";

        // when (操作):
        let frame = Frame::parse(raw).unwrap().unwrap();

        // then (期待する結果):
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get_header("destination"), Some("/queue/messages/9"));
        assert_eq!(frame.get_header("subscription"), Some("sub-0"));
        assert_eq!(frame.body, "{\"senderId\":5}");
    }

    #[test]
    fn test_header_escaping_survives_encode_and_parse() {
        // テスト項目: コロンや改行を含むヘッダー値がエスケープされ、解析時に復元される
        // given (前提条件):
        let frame = Frame::new(Command::Error).header("message", "bad: token\nexpired");

        // when (操作):
        let encoded = frame.encode();
        let parsed = Frame::parse(&encoded).unwrap().unwrap();

        // then (期待する結果):
        assert!(encoded.contains("message:bad\\c token\\nexpired"));
        assert_eq!(parsed.get_header("message"), Some("bad: token\nexpired"));
    }

    #[test]
    fn test_connect_headers_are_not_escaped() {
        // テスト項目: CONNECT フレームのヘッダーはエスケープされない
        // given (前提条件):
        let frame = Frame::connect("localhost").header("Authorization", "Bearer a:b");

        // when (操作):
        let encoded = frame.encode();
        let parsed = Frame::parse(&encoded).unwrap().unwrap();

        // then (期待する結果):
        assert!(encoded.contains("Authorization:Bearer a:b"));
        assert_eq!(parsed.get_header("Authorization"), Some("Bearer a:b"));
    }

    #[test]
    fn test_parse_heartbeat_returns_none() {
        // テスト項目: 改行のみのメッセージはハートビートとして扱われる
        // given (前提条件):
        let raw = "\n";

        // when (操作):
        let result = Frame::parse(raw);

        // then (期待する結果):
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn test_parse_rejects_missing_terminator() {
        // テスト項目: NUL 終端のないフレームはエラーになる
        // given (前提条件):
        let raw = "CONNECTED\nversion:1.2\n\n";

        // when (操作):
        let result = Frame::parse(raw);

        // then (期待する結果):
        assert_eq!(result, Err(StompError::MissingTerminator));
    }

    #[test]
    fn test_parse_rejects_unknown_command() {
        // テスト項目: 未知のコマンドはエラーになる
        // given (前提条件):
        let raw = "HELLO\n\n\0";

        // when (操作):
        let result = Frame::parse(raw);

        // then (期待する結果):
        assert_eq!(result, Err(StompError::UnknownCommand("HELLO".to_string())));
    }

    #[test]
    fn test_repeated_header_keeps_first_value() {
        // テスト項目: 同名ヘッダーが複数ある場合は最初の値が使われる
        // given (前提条件):
        let raw = "MESSAGE\ndestination:/queue/a\ndestination:/queue/b\n\n\0";

        // when (操作):
        let frame = Frame::parse(raw).unwrap().unwrap();

        // then (期待する結果):
        assert_eq!(frame.get_header("destination"), Some("/queue/a"));
    }
}
