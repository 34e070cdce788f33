// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge event types.

use crate::realtime::ConnectionState;
use crate::types::{DeviceId, ZoneKey};

/// Events emitted while the bridge is running.
///
/// Subscribers learn about zone state changes, connection transitions and
/// device reachability without polling the store.
///
/// # Examples
///
/// ```
/// use helki_lib::event::BridgeEvent;
/// use helki_lib::types::{DeviceId, ZoneAddr, ZoneKey};
///
/// let event = BridgeEvent::ZoneUpdated {
///     zone: ZoneKey::new(DeviceId::new("a1b2"), ZoneAddr::new(2)),
/// };
/// assert!(event.is_zone_update());
/// ```
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// A zone's stored state changed, from a push or an optimistic write.
    ZoneUpdated {
        /// The zone whose state changed.
        zone: ZoneKey,
    },

    /// The realtime connection moved to a new lifecycle state.
    ConnectionChanged {
        /// The state entered.
        state: ConnectionState,
        /// The triggering error, when the transition was caused by one.
        error: Option<String>,
    },

    /// A device and its zones became reachable or unreachable.
    AvailabilityChanged {
        /// The device hub concerned.
        device: DeviceId,
        /// Whether the device is now considered reachable.
        available: bool,
    },
}

impl BridgeEvent {
    /// Returns `true` for zone state updates.
    #[must_use]
    pub fn is_zone_update(&self) -> bool {
        matches!(self, Self::ZoneUpdated { .. })
    }

    /// Returns `true` for connection lifecycle transitions.
    #[must_use]
    pub fn is_connection_change(&self) -> bool {
        matches!(self, Self::ConnectionChanged { .. })
    }

    /// The zone concerned, for zone update events.
    #[must_use]
    pub fn zone(&self) -> Option<&ZoneKey> {
        match self {
            Self::ZoneUpdated { zone } => Some(zone),
            _ => None,
        }
    }

    /// Creates a zone update event.
    #[must_use]
    pub(crate) fn zone_updated(zone: ZoneKey) -> Self {
        Self::ZoneUpdated { zone }
    }
}
