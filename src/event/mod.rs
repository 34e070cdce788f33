// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for bridge state changes.
//!
//! This module provides a pub/sub event system over tokio's broadcast
//! channel. The coordinator and the command dispatcher publish
//! [`BridgeEvent`]s whenever zone state, connection state or device
//! reachability changes, so callers can react without polling.
//!
//! # Examples
//!
//! ```
//! use helki_lib::event::{BridgeEvent, EventBus};
//! use helki_lib::types::{DeviceId, ZoneAddr, ZoneKey};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(BridgeEvent::ZoneUpdated {
//!     zone: ZoneKey::new(DeviceId::new("a1b2"), ZoneAddr::new(2)),
//! });
//! ```

mod bridge_event;
mod event_bus;

pub use bridge_event::BridgeEvent;
pub use event_bus::EventBus;
