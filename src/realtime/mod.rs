// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The real-time push channel.
//!
//! The cloud streams heater state over a socket.io connection. This module
//! keeps that connection alive: [`RealtimeCoordinator`] supervises dialing,
//! reconnection and liveness, one session at a time, and feeds everything
//! the server pushes into the shared [`DeviceStateStore`]. Consumers watch
//! [`ConnectionState`] to know how much to trust the store: zone reads are
//! only live while the channel is [`ConnectionState::Subscribed`].
//!
//! [`DeviceStateStore`]: crate::state::DeviceStateStore

mod connection;
mod coordinator;
mod session;

pub use connection::ConnectionState;
pub use coordinator::{RealtimeCoordinator, ReconnectConfig};

pub(crate) use coordinator::CommandFrame;
