// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the Helki bridge library.
//!
//! This module provides a comprehensive error hierarchy for handling failures
//! across the library: authentication, topology discovery, the real-time
//! transport, command validation, and protocol framing.
//!
//! The propagation policy is deliberately narrow: transient failures
//! (transport drops, flaky discovery calls) are absorbed internally via
//! retry, and only persistent or authentication failures cross the crate
//! boundary.

use thiserror::Error;

use crate::types::PresetKind;

/// The main error type for this library.
///
/// This enum encompasses all possible errors that can occur when talking to
/// the Helki cloud on behalf of an Elnur Gabarron heater installation.
#[derive(Debug, Error)]
pub enum Error {
    /// Authentication against the cloud failed.
    ///
    /// Fatal: bad credentials or a rejected refresh token require external
    /// reconfiguration, there is no internal remedy.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Topology discovery over REST failed persistently.
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The real-time transport failed beyond the configured retry ceiling.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A command value failed local validation and was never transmitted.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An inbound frame could not be interpreted.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The real-time connection is not subscribed, so commands cannot be
    /// forwarded right now. Retrying is the caller's responsibility.
    #[error("real-time connection is not subscribed")]
    NotConnected,

    /// The addressed zone is not part of the discovered topology.
    #[error("zone not found")]
    ZoneNotFound,

    /// The addressed device hub is not part of the discovered topology.
    #[error("device not found")]
    DeviceNotFound,

    /// The account has no device hubs to bridge.
    #[error("no devices discovered for this account")]
    NoDevices,
}

/// Errors raised by the OAuth2 session against `/client/token`.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token endpoint rejected the credentials.
    #[error("credentials rejected (HTTP {status})")]
    CredentialsRejected {
        /// HTTP status returned by the token endpoint.
        status: u16,
    },

    /// The refresh token was rejected; a full re-authentication with
    /// credentials is required.
    #[error("refresh token rejected (HTTP {status})")]
    RefreshRejected {
        /// HTTP status returned by the token endpoint.
        status: u16,
    },

    /// The token endpoint could not be reached.
    #[error("token endpoint unreachable: {0}")]
    Http(#[from] reqwest::Error),

    /// The token response was missing required fields.
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
}

impl AuthError {
    /// Returns `true` if the error means the stored credentials or refresh
    /// token are no longer usable. An unreachable token endpoint is a
    /// transient transport failure, not a rejection.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CredentialsRejected { .. } | Self::RefreshRejected { .. })
    }
}

/// Errors raised by REST topology discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The request failed at the HTTP layer.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("unexpected status {status} from {endpoint}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The endpoint path that failed.
        endpoint: String,
    },

    /// The payload did not decode into the expected shape.
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DiscoveryError {
    /// Returns `true` if a retry might succeed: network-level failures and
    /// server-side errors. Client errors and undecodable payloads will not
    /// get better on their own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Decode(_) => false,
        }
    }
}

/// Errors raised by the real-time websocket transport.
///
/// These are handled internally by the reconnect state machine; they are
/// logged and retried rather than surfaced to callers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The websocket connection could not be established or dropped.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server closed the connection before the handshake completed.
    #[error("connection closed during handshake")]
    HandshakeClosed,

    /// The handshake did not complete within its deadline.
    #[error("handshake timed out")]
    HandshakeTimeout,
}

/// Errors raised by local command validation.
///
/// These are produced before anything is transmitted; the store is left
/// unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A target temperature is outside the allowed range.
    #[error("target temperature {actual} is out of range [{min}, {max}]")]
    TemperatureOutOfRange {
        /// Minimum allowed value in degrees Celsius.
        min: f64,
        /// Maximum allowed value in degrees Celsius.
        max: f64,
        /// The actual value that was provided.
        actual: f64,
    },

    /// A preset setpoint is outside the range allowed for its kind.
    #[error("{kind} preset {actual} is out of range [{min}, {max}]")]
    PresetOutOfRange {
        /// The preset kind being set.
        kind: PresetKind,
        /// Minimum allowed value in degrees Celsius.
        min: f64,
        /// Maximum allowed value in degrees Celsius.
        max: f64,
        /// The actual value that was provided.
        actual: f64,
    },

    /// An operating mode string is not part of the enumerated mode set.
    #[error("unknown heater mode: {0}")]
    UnknownMode(String),

    /// A zone address is outside the vendor's addressable range.
    #[error("zone address {0} is out of range")]
    InvalidZoneAddr(u32),

    /// A time of day is not within a single day.
    #[error("time of day {0} minutes is past midnight")]
    InvalidTimeOfDay(u32),
}

/// Errors raised while interpreting inbound frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The Engine.IO packet could not be classified.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// The socket.io event payload did not decode.
    #[error("malformed event payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The handshake payload was missing required fields.
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),

    /// A packet arrived that is not valid in the current phase.
    #[error("unexpected packet during {phase}: {packet}")]
    UnexpectedPacket {
        /// The connection phase the packet arrived in.
        phase: &'static str,
        /// A short rendering of the offending packet.
        packet: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` if this error is fatal for the running session.
    ///
    /// Fatal errors require external action (fixing credentials,
    /// reconfiguring the account); everything else is either retried
    /// internally or safe to retry from the caller.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(e) if e.is_fatal())
    }

    /// Returns `true` if the operation may succeed when retried later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Transport(_) | Self::Discovery(_)
        )
    }
}
