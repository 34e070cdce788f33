// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level bridge facade.
//!
//! [`Bridge`] wires the individual pieces of this crate into one running
//! unit: it authenticates, discovers the account topology, seeds the state
//! store, starts the realtime coordinator for one hub and hands out the
//! command dispatcher. Applications that need finer control, or more than
//! one hub per process, can assemble the same pieces by hand; see
//! [`RealtimeCoordinator`] for that route.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::auth::AuthSession;
use crate::command::CommandDispatcher;
use crate::config::CloudConfig;
use crate::discovery::{DeviceDiscovery, DeviceInfo};
use crate::error::{Error, Result};
use crate::event::{BridgeEvent, EventBus};
use crate::realtime::{ConnectionState, RealtimeCoordinator, ReconnectConfig};
use crate::state::DeviceStateStore;
use crate::types::{DeviceId, ZoneKey};

// ===== Bridge =====

/// A running bridge for one heater hub.
///
/// Constructed through [`Bridge::builder`]; dropping the bridge does not
/// stop the background task, call [`shutdown`](Self::shutdown) for an
/// orderly close.
///
/// # Examples
///
/// ```no_run
/// use helki_lib::Bridge;
///
/// # async fn example() -> Result<(), helki_lib::Error> {
/// let bridge = Bridge::builder("user@example.com", "secret").connect().await?;
///
/// let mut events = bridge.subscribe();
/// tokio::spawn(async move {
///     while let Ok(event) = events.recv().await {
///         println!("{event:?}");
///     }
/// });
///
/// for zone in bridge.store().zones() {
///     if let Some(state) = bridge.store().read(&zone) {
///         println!("{}: {:?}", state.display_name(), state.current_temperature());
///     }
/// }
///
/// bridge.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Bridge {
    store: Arc<DeviceStateStore>,
    events: EventBus,
    coordinator: Arc<RealtimeCoordinator>,
    dispatcher: CommandDispatcher,
}

impl Bridge {
    /// Starts building a bridge for the given account credentials.
    #[must_use]
    pub fn builder(email: impl Into<String>, password: impl Into<String>) -> BridgeBuilder {
        BridgeBuilder {
            config: CloudConfig::new(email, password),
            reconnect: ReconnectConfig::new(),
            device: None,
        }
    }

    /// The hub this bridge serves.
    #[must_use]
    pub fn device(&self) -> &DeviceId {
        self.coordinator.device()
    }

    /// The state store holding the bridged zones.
    #[must_use]
    pub fn store(&self) -> &Arc<DeviceStateStore> {
        &self.store
    }

    /// The dispatcher for writing commands to zones.
    #[must_use]
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Subscribes to bridge events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// The current realtime connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.coordinator.state()
    }

    /// A watch receiver that tracks connection state transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.coordinator.state_changes()
    }

    /// Stops the realtime task and closes the connection.
    ///
    /// The store keeps its last known zone state and stays readable.
    pub async fn shutdown(&self) {
        self.coordinator.stop().await;
    }
}

// ===== BridgeBuilder =====

/// Builder for [`Bridge`].
///
/// All knobs default to the vendor endpoints and the documented reconnect
/// cadence; only the account credentials are mandatory.
#[derive(Debug, Clone)]
pub struct BridgeBuilder {
    config: CloudConfig,
    reconnect: ReconnectConfig,
    device: Option<DeviceId>,
}

impl BridgeBuilder {
    /// Sets the serial/site identifier sent as `x-serialid`.
    #[must_use]
    pub fn with_serial_id(mut self, serial_id: impl Into<String>) -> Self {
        self.config = self.config.with_serial_id(serial_id);
        self
    }

    /// Overrides the OAuth2 client id/secret pair.
    #[must_use]
    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.config = self.config.with_client_credentials(client_id, client_secret);
        self
    }

    /// Overrides the REST API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.config = self.config.with_api_base(api_base);
        self
    }

    /// Overrides the socket base URL.
    #[must_use]
    pub fn with_socket_base(mut self, socket_base: impl Into<String>) -> Self {
        self.config = self.config.with_socket_base(socket_base);
        self
    }

    /// Sets the reconnect cadence for the realtime connection.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Pins the hub to bridge.
    ///
    /// Without this the first discovered hub is used.
    #[must_use]
    pub fn with_device(mut self, device: impl Into<DeviceId>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Authenticates, discovers the topology and starts the realtime task.
    ///
    /// Returns once the background task is running; zone state arrives with
    /// the first snapshot, observable as a [`BridgeEvent::ConnectionChanged`]
    /// to [`ConnectionState::Subscribed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the credentials are rejected,
    /// [`Error::Discovery`] when the topology cannot be listed,
    /// [`Error::NoDevices`] when the account has no hubs and
    /// [`Error::DeviceNotFound`] when a pinned hub is not in the account.
    pub async fn connect(self) -> Result<Bridge> {
        let session = Arc::new(AuthSession::new(self.config)?);
        session.authenticate().await?;

        let discovery = DeviceDiscovery::new(Arc::clone(&session));
        let hubs = discovery.list_all_devices().await?;
        let hub = pick_hub(hubs, self.device.as_ref())?;

        let store = Arc::new(DeviceStateStore::new());
        store.upsert_device(hub.id(), hub.name(), hub.serial());

        let zones = discovery.list_zones(hub.id()).await?;
        if zones.is_empty() {
            warn!(device = %hub.id(), "hub has no zones");
        }
        for zone in &zones {
            let key = ZoneKey::new(hub.id().clone(), zone.addr());
            store.insert_zone_topology(&key, zone.name());
        }

        let events = EventBus::new();
        let coordinator = Arc::new(RealtimeCoordinator::new(
            session,
            Arc::clone(&store),
            events.clone(),
            hub.id().clone(),
            self.reconnect,
        ));
        let dispatcher =
            CommandDispatcher::new(Arc::clone(&coordinator), Arc::clone(&store), events.clone());

        coordinator.start();
        info!(device = %hub.id(), zones = zones.len(), "bridge started");

        Ok(Bridge {
            store,
            events,
            coordinator,
            dispatcher,
        })
    }
}

fn pick_hub(mut hubs: Vec<DeviceInfo>, wanted: Option<&DeviceId>) -> Result<DeviceInfo> {
    if let Some(id) = wanted {
        return hubs
            .into_iter()
            .find(|hub| hub.id() == id)
            .ok_or(Error::DeviceNotFound);
    }

    if hubs.is_empty() {
        return Err(Error::NoDevices);
    }
    if hubs.len() > 1 {
        warn!(hubs = hubs.len(), "multiple hubs in account; bridging the first");
    }
    Ok(hubs.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(id: &str) -> DeviceInfo {
        DeviceInfo::new(DeviceId::new(id), None, None)
    }

    // ===== hub selection =====

    #[test]
    fn empty_account_is_an_error() {
        assert!(matches!(pick_hub(Vec::new(), None), Err(Error::NoDevices)));
    }

    #[test]
    fn first_hub_wins_by_default() {
        let picked = pick_hub(vec![hub("a"), hub("b")], None).unwrap();
        assert_eq!(picked.id().as_str(), "a");
    }

    #[test]
    fn pinned_hub_is_looked_up() {
        let wanted = DeviceId::new("b");
        let picked = pick_hub(vec![hub("a"), hub("b")], Some(&wanted)).unwrap();
        assert_eq!(picked.id().as_str(), "b");
    }

    #[test]
    fn pinned_hub_missing_is_an_error() {
        let wanted = DeviceId::new("zz");
        assert!(matches!(
            pick_hub(vec![hub("a")], Some(&wanted)),
            Err(Error::DeviceNotFound)
        ));
    }

    // ===== builder =====

    #[test]
    fn builder_defaults_to_vendor_endpoints() {
        let builder = Bridge::builder("me@example.com", "pw");
        assert_eq!(builder.config.api_base(), CloudConfig::DEFAULT_API_BASE);
        assert_eq!(
            builder.config.socket_base(),
            CloudConfig::DEFAULT_SOCKET_BASE
        );
        assert!(builder.device.is_none());
    }

    #[test]
    fn builder_overrides_flow_through() {
        let builder = Bridge::builder("me@example.com", "pw")
            .with_api_base("http://127.0.0.1:8080")
            .with_socket_base("ws://127.0.0.1:8080")
            .with_serial_id("11")
            .with_device("a1b2")
            .with_reconnect(ReconnectConfig::new().with_availability_threshold(3));

        assert_eq!(builder.config.api_base(), "http://127.0.0.1:8080");
        assert_eq!(builder.config.socket_base(), "ws://127.0.0.1:8080");
        assert_eq!(builder.config.serial_id(), "11");
        assert_eq!(builder.device, Some(DeviceId::new("a1b2")));
        assert_eq!(builder.reconnect.availability_threshold(), 3);
    }
}
