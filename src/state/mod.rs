// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Zone state tracking.
//!
//! This module holds the canonical picture of every discovered heater.
//! [`DeviceStateStore`] is the single shared instance the rest of the crate
//! writes into; [`Zone`] is the immutable view it hands out.
//!
//! # Examples
//!
//! ```
//! use helki_lib::state::DeviceStateStore;
//! use helki_lib::types::{DeviceId, ZoneAddr, ZoneKey};
//!
//! let store = DeviceStateStore::new();
//! let key = ZoneKey::new(DeviceId::new("a1b2"), ZoneAddr::new(2));
//!
//! // Nothing has been discovered or pushed yet.
//! assert!(store.read(&key).is_none());
//! ```

mod store;
mod zone;

pub use store::DeviceStateStore;
pub use zone::Zone;
pub(crate) use zone::ZonePatch;
