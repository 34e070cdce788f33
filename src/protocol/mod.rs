// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire-level access to the Helki cloud.
//!
//! Two surfaces exist side by side: a REST API for authentication and
//! topology ([`rest`]) and a socket.io channel for state pushes and commands
//! ([`socketio`]). Higher layers never touch URLs or frame syntax directly;
//! they go through these modules.

pub(crate) mod rest;
pub(crate) mod socketio;
