//! Two-layer text framing for the party server.
//!
//! The outer layer is a set of short fixed control tokens (liveness and the
//! probe handshake). The inner layer is a numeric prefix followed by a JSON
//! array `[eventName, payload]`. A frame is only treated as an inner-layer
//! message when it has that exact digits-then-array shape; everything else is
//! compared verbatim against the control tokens.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

pub const TOKEN_OPEN: &str = "0";
pub const TOKEN_CLOSE: &str = "1";
pub const TOKEN_PING: &str = "2";
pub const TOKEN_PONG: &str = "3";
pub const TOKEN_PROBE: &str = "2probe";
pub const TOKEN_PROBE_ACK: &str = "3probe";
pub const TOKEN_PROBE_CONFIRM: &str = "5";

/// Prefix for outgoing event frames.
const EVENT_PREFIX: &str = "42";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Open,
    Close,
    Ping,
    Pong,
    Probe,
    ProbeAck,
    ProbeConfirm,
}

impl ControlSignal {
    pub fn token(self) -> &'static str {
        match self {
            ControlSignal::Open => TOKEN_OPEN,
            ControlSignal::Close => TOKEN_CLOSE,
            ControlSignal::Ping => TOKEN_PING,
            ControlSignal::Pong => TOKEN_PONG,
            ControlSignal::Probe => TOKEN_PROBE,
            ControlSignal::ProbeAck => TOKEN_PROBE_ACK,
            ControlSignal::ProbeConfirm => TOKEN_PROBE_CONFIRM,
        }
    }

    pub fn from_token(raw: &str) -> Option<Self> {
        match raw {
            TOKEN_OPEN => Some(ControlSignal::Open),
            TOKEN_CLOSE => Some(ControlSignal::Close),
            TOKEN_PING => Some(ControlSignal::Ping),
            TOKEN_PONG => Some(ControlSignal::Pong),
            TOKEN_PROBE => Some(ControlSignal::Probe),
            TOKEN_PROBE_ACK => Some(ControlSignal::ProbeAck),
            TOKEN_PROBE_CONFIRM => Some(ControlSignal::ProbeConfirm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Control(ControlSignal),
    Event { name: String, payload: Value },
    Unrecognized,
}

/// Encodes a named event as an outgoing message frame: `42["name",payload]`.
pub fn encode_event<T: Serialize>(name: &str, payload: &T) -> anyhow::Result<String> {
    let body = serde_json::to_string(&(name, payload))?;
    Ok(format!("{EVENT_PREFIX}{body}"))
}

/// Decodes a raw text frame. Never fails: malformed message bodies are logged
/// and reported as `Frame::Unrecognized` so the decode loop keeps running.
pub fn decode_frame(raw: &str) -> Frame {
    if let Some(body) = event_body(raw) {
        return match parse_event(body) {
            Some((name, payload)) => Frame::Event { name, payload },
            None => {
                warn!(frame = raw, "dropping message frame with malformed body");
                Frame::Unrecognized
            }
        };
    }
    match ControlSignal::from_token(raw) {
        Some(signal) => Frame::Control(signal),
        None => Frame::Unrecognized,
    }
}

/// Returns the JSON-array body of a message frame, or `None` when `raw` does
/// not have the `<digits>[...]` shape.
fn event_body(raw: &str) -> Option<&str> {
    let digits = raw.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 || digits == raw.len() {
        return None;
    }
    let rest = &raw[digits..];
    if rest.starts_with('[') && rest.ends_with(']') {
        Some(rest)
    } else {
        None
    }
}

fn parse_event(body: &str) -> Option<(String, Value)> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let items = parsed.as_array()?;
    let name = items.first()?.as_str()?.to_string();
    let payload = items.get(1).cloned().unwrap_or(Value::Null);
    Some((name, payload))
}
