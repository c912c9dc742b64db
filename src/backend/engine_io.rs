//! Engine.IO v4 / Socket.IO v5 text framing over a WebSocket.
//!
//! Only the subset the chat backend uses is supported: the open handshake,
//! ping/pong, namespace connect on `/` and JSON events.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, data: Value },
    ConnectError(Value),
    /// Acks and binary packets; the chat backend does not use them.
    Unsupported(char),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Noop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    Empty,
    UnknownPacketType(char),
    InvalidPayload(String),
}

pub fn decode(frame: &str) -> Result<EnginePacket, CodecError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|err| CodecError::InvalidPayload(err.to_string())),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => decode_socket_packet(rest).map(EnginePacket::Message),
        '5' | '6' => Ok(EnginePacket::Noop),
        other => Err(CodecError::UnknownPacketType(other)),
    }
}

fn decode_socket_packet(body: &str) -> Result<SocketPacket, CodecError> {
    let mut chars = body.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let payload = strip_ack_id(strip_namespace(chars.as_str()));

    match kind {
        '0' => Ok(SocketPacket::Connect(parse_optional_json(payload)?)),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => decode_event(payload),
        '4' => Ok(SocketPacket::ConnectError(
            parse_optional_json(payload)?.unwrap_or(Value::Null),
        )),
        '3' | '5' | '6' => Ok(SocketPacket::Unsupported(kind)),
        other => Err(CodecError::UnknownPacketType(other)),
    }
}

fn decode_event(payload: &str) -> Result<SocketPacket, CodecError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|err| CodecError::InvalidPayload(err.to_string()))?;
    let Value::Array(mut items) = value else {
        return Err(CodecError::InvalidPayload("event is not an array".to_owned()));
    };
    if items.is_empty() {
        return Err(CodecError::InvalidPayload("event has no name".to_owned()));
    }

    let Value::String(name) = items.remove(0) else {
        return Err(CodecError::InvalidPayload("event name is not a string".to_owned()));
    };
    let data = if items.is_empty() {
        Value::Null
    } else {
        items.remove(0)
    };

    Ok(SocketPacket::Event { name, data })
}

/// Non-default namespaces are prefixed as `/name,`.
fn strip_namespace(payload: &str) -> &str {
    if payload.starts_with('/') {
        return payload
            .split_once(',')
            .map_or("", |(_, rest)| rest);
    }
    payload
}

fn strip_ack_id(payload: &str) -> &str {
    payload.trim_start_matches(|ch: char| ch.is_ascii_digit())
}

fn parse_optional_json(payload: &str) -> Result<Option<Value>, CodecError> {
    if payload.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(payload)
        .map(Some)
        .map_err(|err| CodecError::InvalidPayload(err.to_string()))
}

pub fn encode_pong() -> String {
    "3".to_owned()
}

/// Namespace connect on `/`, authenticating with `token` when present.
pub fn encode_connect(token: Option<&str>) -> String {
    match token {
        Some(token) => format!("40{}", serde_json::json!({ "token": token })),
        None => "40".to_owned(),
    }
}

pub fn encode_disconnect() -> String {
    "41".to_owned()
}

pub fn encode_event(name: &str, data: &Value) -> String {
    format!("42{}", serde_json::json!([name, data]))
}
