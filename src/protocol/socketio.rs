// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine.IO v3 / socket.io framing over websocket text frames.
//!
//! The cloud speaks the legacy v3 dialect: every websocket text frame holds
//! exactly one packet, a leading digit classifies it, and socket.io messages
//! nest inside packet type `4` with their own subtype digit and an optional
//! namespace prefix. Only the subset the vendor actually uses is modelled
//! here; anything else fails parsing and the connection gets recycled.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProtocolError;

/// Namespace the vendor serves device traffic on.
pub(crate) const NAMESPACE: &str = "/api/v2/socket_io";

/// Engine.IO ping frame, sent by whichever side keeps the session alive.
pub(crate) const PING: &str = "2";
/// Engine.IO pong frame.
pub(crate) const PONG: &str = "3";

// ===== Packet model =====

/// Session parameters from the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Handshake {
    pub sid: String,
    #[serde(rename = "pingInterval", default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(rename = "pingTimeout", default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    60_000
}

/// One Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketMessage),
    Noop,
}

/// The socket.io layer inside a message packet.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SocketMessage {
    Connect {
        namespace: String,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        name: String,
        payload: Value,
    },
    Error {
        namespace: String,
        payload: Value,
    },
}

// ===== Parsing =====

/// Parses one websocket text frame into a packet.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPacket`] for frames outside the
/// vendor's dialect and [`ProtocolError::InvalidHandshake`] when the open
/// payload does not decode.
pub(crate) fn parse(frame: &str) -> Result<Packet, ProtocolError> {
    // Matching on the raw byte keeps the packet-type digit ASCII, so the
    // slice one byte in cannot split a character.
    let Some(&kind) = frame.as_bytes().first() else {
        return Err(ProtocolError::MalformedPacket("empty frame".to_string()));
    };

    match kind {
        b'0' => {
            let handshake: Handshake = serde_json::from_str(&frame[1..])
                .map_err(|e| ProtocolError::InvalidHandshake(e.to_string()))?;
            Ok(Packet::Open(handshake))
        }
        b'1' => Ok(Packet::Close),
        b'2' => Ok(Packet::Ping),
        b'3' => Ok(Packet::Pong),
        b'4' => parse_message(&frame[1..]).map(Packet::Message),
        b'6' => Ok(Packet::Noop),
        _ => Err(ProtocolError::MalformedPacket(truncate(frame))),
    }
}

fn parse_message(rest: &str) -> Result<SocketMessage, ProtocolError> {
    let Some(&subtype) = rest.as_bytes().first() else {
        return Err(ProtocolError::MalformedPacket(
            "message packet without subtype".to_string(),
        ));
    };

    match subtype {
        b'0' => Ok(SocketMessage::Connect {
            namespace: parse_namespace(&rest[1..]),
        }),
        b'1' => Ok(SocketMessage::Disconnect {
            namespace: parse_namespace(&rest[1..]),
        }),
        b'2' => parse_event(&rest[1..]),
        b'4' => Ok(parse_error(&rest[1..])),
        _ => Err(ProtocolError::MalformedPacket(truncate(rest))),
    }
}

/// Parses a namespace error body, e.g. `44/ns,"not authorized"`.
///
/// The payload is kept as raw JSON; an undecodable body still yields an
/// error message carrying the raw text, since the server is already telling
/// us something went wrong.
fn parse_error(body: &str) -> SocketMessage {
    let (namespace, json) = if body.starts_with('/') {
        match body.split_once(',') {
            Some((ns, json)) => (ns.to_string(), json),
            None => (body.to_string(), ""),
        }
    } else {
        ("/".to_string(), body)
    };

    let payload =
        serde_json::from_str(json).unwrap_or_else(|_| Value::String(json.to_string()));
    SocketMessage::Error { namespace, payload }
}

/// Extracts the namespace from a connect/disconnect body.
///
/// The server may append a trailing comma to its connect ack, and the client
/// form carries a query string; both are stripped. An empty body means the
/// default namespace.
fn parse_namespace(body: &str) -> String {
    let body = body.trim_end_matches(',');
    let body = body.split('?').next().unwrap_or(body);
    if body.is_empty() {
        "/".to_string()
    } else {
        body.to_string()
    }
}

fn parse_event(body: &str) -> Result<SocketMessage, ProtocolError> {
    let (namespace, json) = if body.starts_with('/') {
        match body.split_once(',') {
            Some((ns, json)) => (ns.to_string(), json),
            None => {
                return Err(ProtocolError::MalformedPacket(truncate(body)));
            }
        }
    } else {
        ("/".to_string(), body)
    };

    let array: Vec<Value> = serde_json::from_str(json)?;
    let mut items = array.into_iter();

    let name = match items.next() {
        Some(Value::String(name)) => name,
        _ => {
            return Err(ProtocolError::MalformedPacket(
                "event without a name".to_string(),
            ));
        }
    };
    let payload = items.next().unwrap_or(Value::Null);

    Ok(SocketMessage::Event {
        namespace,
        name,
        payload,
    })
}

fn truncate(frame: &str) -> String {
    const LIMIT: usize = 120;
    if frame.len() <= LIMIT {
        frame.to_string()
    } else {
        let head: String = frame.chars().take(LIMIT).collect();
        format!("{head}...")
    }
}

// ===== Encoding =====

/// Encodes a namespace connect request, e.g. `40/ns?token=x`.
pub(crate) fn encode_connect(namespace: &str, query: &str) -> String {
    if query.is_empty() {
        format!("40{namespace}")
    } else {
        format!("40{namespace}?{query}")
    }
}

/// Encodes an event emit, e.g. `42/ns,["dev_data"]`.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if the payload cannot be serialized.
pub(crate) fn encode_event(
    namespace: &str,
    name: &str,
    payload: Option<&Value>,
) -> Result<String, ProtocolError> {
    let array = match payload {
        Some(payload) => serde_json::to_string(&(name, payload))?,
        None => serde_json::to_string(&(name,))?,
    };
    Ok(format!("42{namespace},{array}"))
}
