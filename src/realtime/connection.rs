// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection lifecycle states of the realtime channel.

use std::fmt;

/// Lifecycle state of the realtime connection.
///
/// The coordinator walks `Disconnected → Connecting → Authenticated →
/// Subscribed`, bounces between `Reconnecting` and `Subscribed` for as long
/// as it runs, and ends in `Closed` on [`stop`] or on a fatal
/// authentication failure.
///
/// [`stop`]: super::RealtimeCoordinator::stop
///
/// # Examples
///
/// ```
/// use helki_lib::realtime::ConnectionState;
///
/// let state = ConnectionState::Reconnecting { attempt: 3 };
/// assert!(!state.is_subscribed());
/// assert_eq!(state.to_string(), "reconnecting (attempt 3)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempt has been made yet.
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    /// Transport and namespace handshake accepted by the server.
    Authenticated,
    /// Initial snapshot received; inbound frames are flowing.
    Subscribed,
    /// Connection lost; waiting to retry.
    Reconnecting {
        /// Consecutive failed attempts so far.
        attempt: u32,
    },
    /// Stopped for good, either explicitly or by a fatal auth failure.
    Closed,
}

impl ConnectionState {
    /// Returns the state label without any attempt counter.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticated => "authenticated",
            Self::Subscribed => "subscribed",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Closed => "closed",
        }
    }

    /// Whether commands can currently be dispatched.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed)
    }

    /// Whether the coordinator has shut down for good.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_labels() {
        assert_eq!(ConnectionState::Disconnected.as_str(), "disconnected");
        assert_eq!(ConnectionState::Subscribed.as_str(), "subscribed");
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 7 }.as_str(),
            "reconnecting"
        );
    }

    #[test]
    fn display_includes_attempt() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 2 }.to_string(),
            "reconnecting (attempt 2)"
        );
    }

    #[test]
    fn subscribed_and_closed_checks() {
        assert!(ConnectionState::Subscribed.is_subscribed());
        assert!(!ConnectionState::Authenticated.is_subscribed());
        assert!(ConnectionState::Closed.is_closed());
        assert!(!ConnectionState::Disconnected.is_closed());
    }
}
