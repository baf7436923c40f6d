//! STOMP 1.2 frame codec.
//!
//! Frames travel as WebSocket text messages. A message may also carry bare
//! end-of-line heart-beats, before or after a frame.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Errors from decoding a STOMP frame.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("Unknown STOMP command: {0}")]
    UnknownCommand(String),

    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    #[error("Invalid escape sequence in header: {0}")]
    InvalidEscape(String),

    #[error("Invalid content-length: {0}")]
    InvalidContentLength(String),

    #[error("Frame is not NUL-terminated")]
    MissingNul,

    #[error("Invalid heart-beat header: {0}")]
    InvalidHeartBeat(String),
}

/// STOMP frame commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED headers are never escaped.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// Heart-beat intervals in milliseconds, as in the `heart-beat` header.
///
/// `send_ms` is how often this side promises to send, `receive_ms` how often
/// it wants to receive. Zero disables that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    pub send_ms: u64,
    pub receive_ms: u64,
}

impl HeartBeat {
    pub fn new(send_ms: u64, receive_ms: u64) -> Self {
        Self {
            send_ms,
            receive_ms,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }
}

impl fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.send_ms, self.receive_ms)
    }
}

impl FromStr for HeartBeat {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FrameError::InvalidHeartBeat(s.to_string());
        let (send, receive) = s.split_once(',').ok_or_else(invalid)?;
        Ok(Self {
            send_ms: send.trim().parse().map_err(|_| invalid())?,
            receive_ms: receive.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Heart-beat schedule agreed for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeatTiming {
    /// How often the client sends an EOL.
    pub send_every: Option<Duration>,
    /// How often the broker promised to send something.
    pub expect_every: Option<Duration>,
}

/// Negotiate heart-beats between the client's offer and the broker's reply.
pub fn negotiate(client: HeartBeat, server: HeartBeat) -> HeartBeatTiming {
    let pick = |ours: u64, theirs: u64| {
        if ours == 0 || theirs == 0 {
            None
        } else {
            Some(Duration::from_millis(ours.max(theirs)))
        }
    };
    HeartBeatTiming {
        send_every: pick(client.send_ms, server.receive_ms),
        expect_every: pick(client.receive_ms, server.send_ms),
    }
}

/// One STOMP frame.
#[derive(Debug, Clone, PartialEq)]
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

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header. Repeated headers keep the first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn connect(host: &str, heart_beat: HeartBeat) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", heart_beat.to_string())
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn disconnect(receipt: Option<&str>) -> Self {
        let frame = Frame::new(Command::Disconnect);
        match receipt {
            Some(receipt) => frame.header("receipt", receipt),
            None => frame,
        }
    }

    /// Serialize to wire text, including the trailing NUL.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
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
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// One unit read off the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    HeartBeat,
    Frame(Frame),
}

/// Decode every frame and heart-beat in one text message.
pub fn decode(input: &str) -> Result<Vec<Incoming>, FrameError> {
    let bytes = input.as_bytes();
    let mut pos = 0;
    let mut out = Vec::new();

    while pos < bytes.len() {
        match bytes[pos] {
            b'\n' => {
                out.push(Incoming::HeartBeat);
                pos += 1;
            }
            b'\r' if bytes.get(pos + 1) == Some(&b'\n') => {
                out.push(Incoming::HeartBeat);
                pos += 2;
            }
            _ => {
                let (frame, consumed) = decode_frame(&input[pos..])?;
                out.push(Incoming::Frame(frame));
                pos += consumed;
            }
        }
    }

    Ok(out)
}

/// Decode one frame from the start of `input`, returning it with the number
/// of bytes consumed.
fn decode_frame(input: &str) -> Result<(Frame, usize), FrameError> {
    let mut cursor = 0;

    let command_line = read_line(input, &mut cursor).ok_or(FrameError::MissingNul)?;
    let command: Command = command_line.parse()?;
    let unescape = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let line = read_line(input, &mut cursor).ok_or(FrameError::MissingNul)?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
        if unescape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| FrameError::InvalidContentLength(v.clone()))
        })
        .transpose()?;

    let rest = &input[cursor..];
    let body_len = match content_length {
        Some(len) => {
            if rest.as_bytes().get(len) != Some(&0) {
                return Err(FrameError::MissingNul);
            }
            len
        }
        None => rest.find('\0').ok_or(FrameError::MissingNul)?,
    };
    let body = rest
        .get(..body_len)
        .ok_or_else(|| FrameError::InvalidContentLength(body_len.to_string()))?
        .to_string();

    Ok((
        Frame {
            command,
            headers,
            body,
        },
        cursor + body_len + 1,
    ))
}

/// Read one line ending in LF (optionally CR LF), advancing the cursor.
fn read_line<'a>(input: &'a str, cursor: &mut usize) -> Option<&'a str> {
    let rest = &input[*cursor..];
    let end = rest.find('\n')?;
    *cursor += end + 1;
    let line = &rest[..end];
    Some(line.strip_suffix('\r').unwrap_or(line))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}
