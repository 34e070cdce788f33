// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helki Lib - A Rust bridge to Elnur Gabarron electric heaters.
//!
//! This library talks to the vendor's Helki cloud on behalf of one account.
//! It authenticates over OAuth2, discovers homes, hub devices and heating
//! zones over REST, mirrors live zone state pushed over a socket.io channel,
//! and writes control commands back over that same channel.
//!
//! # Supported Features
//!
//! - **Authentication**: password and refresh grants with proactive renewal
//! - **Discovery**: homes, hub devices and heating zones
//! - **Live state**: pushed snapshots and incremental updates, automatic
//!   reconnection, per-device availability tracking
//! - **Control**: target temperature, operating mode, preset setpoints
//!
//! # Quick Start
//!
//! ```no_run
//! use helki_lib::Bridge;
//!
//! #[tokio::main]
//! async fn main() -> helki_lib::Result<()> {
//!     let bridge = Bridge::builder("user@example.com", "secret").connect().await?;
//!
//!     // React to pushed changes.
//!     let mut events = bridge.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     // Read and control zones.
//!     for key in bridge.store().zones() {
//!         bridge.dispatcher().set_target_temperature(&key, 21.0)?;
//!     }
//!
//!     bridge.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Assembling the pieces by hand
//!
//! [`Bridge`] is convenience wiring. The parts compose directly when an
//! application needs more than one hub per process or its own lifecycle:
//!
//! ```no_run
//! use std::sync::Arc;
//! use helki_lib::{
//!     AuthSession, CloudConfig, DeviceDiscovery, DeviceStateStore, EventBus,
//!     RealtimeCoordinator, ReconnectConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> helki_lib::Result<()> {
//!     let session = Arc::new(AuthSession::new(CloudConfig::new("user@example.com", "secret"))?);
//!     session.authenticate().await?;
//!
//!     let discovery = DeviceDiscovery::new(Arc::clone(&session));
//!     let store = Arc::new(DeviceStateStore::new());
//!     let events = EventBus::new();
//!
//!     let mut coordinators = Vec::new();
//!     for hub in discovery.list_all_devices().await? {
//!         let coordinator = RealtimeCoordinator::new(
//!             Arc::clone(&session),
//!             Arc::clone(&store),
//!             events.clone(),
//!             hub.id().clone(),
//!             ReconnectConfig::new(),
//!         );
//!         coordinator.start();
//!         coordinators.push(coordinator);
//!     }
//!
//!     // ... read the store, subscribe to events ...
//!
//!     for coordinator in &coordinators {
//!         coordinator.stop().await;
//!     }
//!     Ok(())
//! }
//! ```

mod auth;
mod bridge;
pub mod command;
mod config;
pub mod discovery;
pub mod error;
pub mod event;
pub(crate) mod protocol;
pub mod realtime;
pub mod state;
pub(crate) mod telemetry;
pub mod types;

pub use auth::{AccessToken, AuthSession};
pub use bridge::{Bridge, BridgeBuilder};
pub use command::CommandDispatcher;
pub use config::CloudConfig;
pub use discovery::{DeviceDiscovery, DeviceInfo, Home, ZoneInfo};
pub use error::{
    AuthError, DiscoveryError, Error, ProtocolError, Result, TransportError, ValidationError,
};
pub use event::{BridgeEvent, EventBus};
pub use realtime::{ConnectionState, RealtimeCoordinator, ReconnectConfig};
pub use state::{DeviceStateStore, Zone};
pub use types::{
    DeviceId, HeaterMode, HomeId, PresetKind, PresetTemperature, TargetTemperature, ZoneAddr,
    ZoneKey,
};
