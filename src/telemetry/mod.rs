// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding of realtime push payloads.
//!
//! The realtime channel delivers two shapes of data: full `dev_data`
//! snapshots listing every zone of a hub, and incremental `update` events
//! addressing one subtree of one zone. This module turns both into
//! [`ZonePatch`](crate::state::ZonePatch) values; the coordinator decides
//! whether they are applied with snapshot or merge semantics.

mod node;
mod push;

pub(crate) use push::{PushEvent, classify};
