// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for broadcasting bridge events.

use tokio::sync::broadcast;

use super::BridgeEvent;

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcasts [`BridgeEvent`]s to any number of subscribers.
///
/// Built on tokio's broadcast channel; every subscriber receives its own
/// copy of each event. A subscriber that falls more than the channel
/// capacity behind loses the oldest events and observes
/// `RecvError::Lagged`.
///
/// # Examples
///
/// ```
/// use helki_lib::event::{BridgeEvent, EventBus};
/// use helki_lib::realtime::ConnectionState;
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(BridgeEvent::ConnectionChanged {
///     state: ConnectionState::Connecting,
///     error: None,
/// });
/// ```
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to bridge events.
    ///
    /// The receiver sees every event published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event to all subscribers.
    ///
    /// An event published while nobody is subscribed is discarded.
    pub fn publish(&self, event: BridgeEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceId, ZoneAddr, ZoneKey};

    fn key() -> ZoneKey {
        ZoneKey::new(DeviceId::new("abc"), ZoneAddr::new(2))
    }

    #[test]
    fn new_bus_has_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn publish_delivers_to_every_subscriber() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(BridgeEvent::zone_updated(key()));

        assert_eq!(rx1.recv().await.unwrap().zone(), Some(&key()));
        assert_eq!(rx2.recv().await.unwrap().zone(), Some(&key()));
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(BridgeEvent::zone_updated(key()));
    }

    #[test]
    fn clone_shares_the_same_channel() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let _rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
