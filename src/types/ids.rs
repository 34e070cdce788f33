// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identifier types for the cloud topology.
//!
//! All identifiers originate in vendor payloads: homes are the vendor's
//! "groups", device hubs carry an opaque `dev_id`, and zones are addressed
//! by a small integer `addr` that is only unique within its hub. A zone is
//! therefore globally identified by a [`ZoneKey`] pairing the two.

use std::fmt;

use crate::error::ValidationError;

/// Identifier of a home (vendor: group id).
///
/// # Examples
///
/// ```
/// use helki_lib::types::HomeId;
///
/// let home = HomeId::new("5e83c3a8");
/// assert_eq!(home.as_str(), "5e83c3a8");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct HomeId(String);

impl HomeId {
    /// Creates a home identifier from a vendor group id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HomeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of a device hub (vendor: `dev_id`).
///
/// # Examples
///
/// ```
/// use helki_lib::types::DeviceId;
///
/// let dev = DeviceId::new("a1b2c3d4e5");
/// assert_eq!(dev.as_str(), "a1b2c3d4e5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a device identifier from a vendor `dev_id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Address of a zone within its hub (vendor: node `addr`).
///
/// Observed installations use single-digit addresses; the vendor path
/// grammar (`/acm/<addr>/status`) puts no documented bound on them, so
/// anything that fits a `u16` is accepted.
///
/// # Examples
///
/// ```
/// use helki_lib::types::ZoneAddr;
///
/// let addr = ZoneAddr::new(2);
/// assert_eq!(addr.value(), 2);
/// assert_eq!(addr.to_string(), "2");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ZoneAddr(u16);

impl ZoneAddr {
    /// Creates a zone address.
    #[must_use]
    pub const fn new(addr: u16) -> Self {
        Self(addr)
    }

    /// Parses a zone address from a path segment or payload integer.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidZoneAddr` if the value does not fit
    /// the addressable range.
    pub fn from_raw(value: i64) -> Result<Self, ValidationError> {
        u16::try_from(value).map(Self).map_err(|_| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            ValidationError::InvalidZoneAddr(value.unsigned_abs().min(u64::from(u32::MAX)) as u32)
        })
    }

    /// Returns the numeric address.
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ZoneAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for ZoneAddr {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// Globally unique zone reference: hub id plus zone address.
///
/// # Examples
///
/// ```
/// use helki_lib::types::{DeviceId, ZoneAddr, ZoneKey};
///
/// let key = ZoneKey::new(DeviceId::new("a1b2"), ZoneAddr::new(2));
/// assert_eq!(key.to_string(), "a1b2/2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ZoneKey {
    device: DeviceId,
    addr: ZoneAddr,
}

impl ZoneKey {
    /// Creates a zone key.
    #[must_use]
    pub fn new(device: DeviceId, addr: ZoneAddr) -> Self {
        Self { device, addr }
    }

    /// Returns the hub this zone belongs to.
    #[must_use]
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Returns the zone address within the hub.
    #[must_use]
    pub fn addr(&self) -> ZoneAddr {
        self.addr
    }
}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.addr)
    }
}
