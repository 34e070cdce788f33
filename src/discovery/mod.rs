// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! REST topology discovery.
//!
//! The cloud groups an account's heaters as homes containing hub devices,
//! each hub carrying one or more heating zones. [`DeviceDiscovery`] walks
//! that hierarchy once at startup; after that the realtime channel keeps
//! zone state current and topology is assumed stable.
//!
//! Vendor records are forgiving by design: entries that are missing their
//! identifier are skipped with a warning instead of failing the whole
//! listing, and transient HTTP failures are retried a few times with a
//! doubling delay before an error is surfaced.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use helki_lib::{AuthSession, CloudConfig, DeviceDiscovery};
//!
//! # async fn example() -> Result<(), helki_lib::Error> {
//! let session = Arc::new(AuthSession::new(CloudConfig::new("me@example.com", "hunter2"))?);
//! let discovery = DeviceDiscovery::new(Arc::clone(&session));
//!
//! for home in discovery.list_homes().await? {
//!     for device in discovery.list_devices(home.id()).await? {
//!         let zones = discovery.list_zones(device.id()).await?;
//!         println!("{}: {} zones", device.display_name(), zones.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::auth::AuthSession;
use crate::error::Result;
use crate::protocol::rest::{DevWire, GroupWire, NodeListWire, NodeWire};
use crate::types::{DeviceId, HomeId, ZoneAddr};

/// Attempts per listing before a transient failure is surfaced.
const FETCH_ATTEMPTS: u32 = 3;

/// Delay after the first failed attempt; doubles per retry.
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

// ===== Topology records =====

/// A top-level account grouping of hub devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Home {
    id: HomeId,
    name: Option<String>,
}

impl Home {
    /// The cloud identifier of this home.
    #[must_use]
    pub fn id(&self) -> &HomeId {
        &self.id
    }

    /// The display name, if the account has one set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The display name, falling back to the identifier.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Home {}", self.id))
    }
}

/// A hub device as listed by discovery.
///
/// This is topology only; live state for the hub's zones comes from the
/// realtime channel via the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    id: DeviceId,
    name: Option<String>,
    serial: Option<String>,
}

impl DeviceInfo {
    pub(crate) fn new(id: DeviceId, name: Option<String>, serial: Option<String>) -> Self {
        Self { id, name, serial }
    }

    /// The cloud identifier of this hub.
    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// The display name, if the account has one set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The hardware serial reported by the cloud, if any.
    #[must_use]
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// The display name, falling back to the identifier.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Device {}", self.id))
    }
}

/// A heating zone as listed by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneInfo {
    addr: ZoneAddr,
    name: Option<String>,
    kind: Option<String>,
}

impl ZoneInfo {
    /// The zone address within its hub.
    #[must_use]
    pub fn addr(&self) -> ZoneAddr {
        self.addr
    }

    /// The display name, if the heater has one programmed.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The vendor node type, `acm` for the storage heaters this crate
    /// controls.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

// ===== DeviceDiscovery =====

/// Walks the account's home/device/zone hierarchy over REST.
pub struct DeviceDiscovery {
    session: Arc<AuthSession>,
}

impl DeviceDiscovery {
    /// Creates a discovery client on top of an authenticated session.
    #[must_use]
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self { session }
    }

    /// Lists the homes of the account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`](crate::Error::Auth) when no valid token can
    /// be obtained and [`Error::Discovery`](crate::Error::Discovery) when
    /// the listing keeps failing after retries.
    pub async fn list_homes(&self) -> Result<Vec<Home>> {
        let groups = self.fetch_groups().await?;
        let homes = map_homes(groups);
        info!(homes = homes.len(), "listed homes");
        Ok(homes)
    }

    /// Lists the hub devices of one home.
    ///
    /// An unknown home id yields an empty listing with a warning; the cloud
    /// offers no way to tell a deleted home from a mistyped one.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`list_homes`](Self::list_homes).
    pub async fn list_devices(&self, home: &HomeId) -> Result<Vec<DeviceInfo>> {
        let groups = self.fetch_groups().await?;

        let Some(group) = groups
            .into_iter()
            .find(|g| g.id.as_deref() == Some(home.as_str()))
        else {
            warn!(home = %home, "home not present in the account listing");
            return Ok(Vec::new());
        };

        let devices = map_devices(group.devs);
        info!(home = %home, devices = devices.len(), "listed devices");
        Ok(devices)
    }

    /// Lists every hub device of the account, across all homes.
    ///
    /// Convenience for bridging setups that do not care about the home
    /// grouping; hub ids are unique account-wide.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`list_homes`](Self::list_homes).
    pub async fn list_all_devices(&self) -> Result<Vec<DeviceInfo>> {
        let groups = self.fetch_groups().await?;
        let devices: Vec<DeviceInfo> = groups
            .into_iter()
            .flat_map(|group| map_devices(group.devs))
            .collect();
        info!(devices = devices.len(), "listed devices across homes");
        Ok(devices)
    }

    /// Lists the heating zones of one hub.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`list_homes`](Self::list_homes).
    pub async fn list_zones(&self, device: &DeviceId) -> Result<Vec<ZoneInfo>> {
        let listing = self.fetch_nodes(device).await?;
        let zones = map_zones(listing);
        info!(device = %device, zones = zones.len(), "listed zones");
        Ok(zones)
    }

    async fn fetch_groups(&self) -> Result<Vec<GroupWire>> {
        let mut attempt = 0;
        loop {
            let token = self.session.ensure_valid().await?;
            match self.session.rest().grouped_devices(&token).await {
                Ok(groups) => return Ok(groups),
                Err(err) if err.is_transient() && attempt + 1 < FETCH_ATTEMPTS => {
                    let delay = retry_delay(attempt);
                    warn!(error = %err, attempt, "device listing failed; retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn fetch_nodes(&self, device: &DeviceId) -> Result<NodeListWire> {
        let mut attempt = 0;
        loop {
            let token = self.session.ensure_valid().await?;
            match self.session.rest().device_nodes(&token, device).await {
                Ok(listing) => return Ok(listing),
                Err(err) if err.is_transient() && attempt + 1 < FETCH_ATTEMPTS => {
                    let delay = retry_delay(attempt);
                    warn!(error = %err, attempt, device = %device, "zone listing failed; retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn retry_delay(attempt: u32) -> Duration {
    FETCH_RETRY_DELAY.saturating_mul(2_u32.saturating_pow(attempt))
}

// ===== Wire mapping =====

fn map_homes(groups: Vec<GroupWire>) -> Vec<Home> {
    let mut homes = Vec::with_capacity(groups.len());
    for group in groups {
        let Some(id) = group.id else {
            warn!("skipping home without an id");
            continue;
        };
        homes.push(Home {
            id: HomeId::new(id),
            name: group.name,
        });
    }
    homes
}

fn map_devices(devs: Vec<DevWire>) -> Vec<DeviceInfo> {
    let mut devices = Vec::with_capacity(devs.len());
    for dev in devs {
        let Some(id) = dev.dev_id else {
            warn!("skipping device without an id");
            continue;
        };
        devices.push(DeviceInfo::new(DeviceId::new(id), dev.name, dev.serial_id));
    }
    devices
}

fn map_zones(listing: NodeListWire) -> Vec<ZoneInfo> {
    let mut zones = Vec::with_capacity(listing.nodes.len());
    for node in listing.nodes {
        let NodeWire { addr, name, kind } = node;
        let Some(addr) = addr.and_then(|raw| ZoneAddr::from_raw(raw).ok()) else {
            warn!(addr = ?addr, "skipping zone without a usable address");
            continue;
        };
        debug!(addr = %addr, kind = ?kind, "zone listed");
        zones.push(ZoneInfo { addr, name, kind });
    }
    zones
}
