// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared store of the last known cloud state.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::warn;

use crate::types::{DeviceId, ZoneAddr, ZoneKey};

use super::zone::{Zone, ZonePatch};

#[derive(Debug, Default)]
struct DeviceEntry {
    name: Option<String>,
    serial: Option<String>,
    available: bool,
}

#[derive(Debug, Default)]
struct StoreInner {
    devices: HashMap<DeviceId, DeviceEntry>,
    zones: HashMap<ZoneKey, Zone>,
}

/// Last known state of every discovered zone.
///
/// Readers get point-in-time clones; writers live inside the crate, so two
/// pushes can never interleave on the same zone. A `None` from [`read`]
/// means the zone has not been discovered or pushed yet.
///
/// [`read`]: DeviceStateStore::read
///
/// # Examples
///
/// ```
/// use helki_lib::DeviceStateStore;
///
/// let store = DeviceStateStore::new();
/// assert!(store.zones().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct DeviceStateStore {
    inner: RwLock<StoreInner>,
}

impl DeviceStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ===== reads =====

    /// Returns a snapshot of one zone, or `None` if it is unknown.
    #[must_use]
    pub fn read(&self, key: &ZoneKey) -> Option<Zone> {
        self.inner.read().zones.get(key).cloned()
    }

    /// Whether the store knows the zone.
    #[must_use]
    pub fn contains(&self, key: &ZoneKey) -> bool {
        self.inner.read().zones.contains_key(key)
    }

    /// All known zone keys, ordered by device then address.
    #[must_use]
    pub fn zones(&self) -> Vec<ZoneKey> {
        let mut keys: Vec<ZoneKey> = self.inner.read().zones.keys().cloned().collect();
        keys.sort_by(|a, b| {
            (a.device().as_str(), a.addr()).cmp(&(b.device().as_str(), b.addr()))
        });
        keys
    }

    /// The zone keys of one device, ordered by address.
    #[must_use]
    pub fn zones_for(&self, device: &DeviceId) -> Vec<ZoneKey> {
        let mut keys: Vec<ZoneKey> = self
            .inner
            .read()
            .zones
            .keys()
            .filter(|key| key.device() == device)
            .cloned()
            .collect();
        keys.sort_by_key(ZoneKey::addr);
        keys
    }

    /// All known device ids, in name order.
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.inner.read().devices.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// The device's discovered name, if known.
    #[must_use]
    pub fn device_name(&self, device: &DeviceId) -> Option<String> {
        self.inner.read().devices.get(device)?.name.clone()
    }

    /// The device's hardware serial, if the cloud reported one.
    #[must_use]
    pub fn device_serial(&self, device: &DeviceId) -> Option<String> {
        self.inner.read().devices.get(device)?.serial.clone()
    }

    /// Whether the device is currently reachable, or `None` if unknown.
    #[must_use]
    pub fn device_available(&self, device: &DeviceId) -> Option<bool> {
        Some(self.inner.read().devices.get(device)?.available)
    }

    // ===== writes (crate-internal) =====

    /// Registers a device, updating its name and serial where given. New
    /// devices start out available.
    pub(crate) fn upsert_device(&self, device: &DeviceId, name: Option<&str>, serial: Option<&str>) {
        let mut inner = self.inner.write();
        let entry = inner
            .devices
            .entry(device.clone())
            .or_insert_with(|| DeviceEntry {
                name: None,
                serial: None,
                available: true,
            });
        if let Some(name) = name {
            entry.name = Some(name.to_string());
        }
        if let Some(serial) = serial {
            entry.serial = Some(serial.to_string());
        }
    }

    /// Registers a zone from REST topology. The name is kept only until the
    /// realtime channel reports one.
    pub(crate) fn insert_zone_topology(&self, key: &ZoneKey, name: Option<&str>) {
        let mut inner = self.inner.write();
        let zone = inner
            .zones
            .entry(key.clone())
            .or_insert_with(|| Zone::new(key.addr()));
        if let Some(name) = name {
            zone.set_topology_name(name);
        }
    }

    /// Replaces the state of every zone carried by a full push. Zones the
    /// topology pass missed are created on the spot. Returns the keys whose
    /// state changed.
    pub(crate) fn apply_snapshot(
        &self,
        device: &DeviceId,
        zones: Vec<(ZoneAddr, ZonePatch)>,
    ) -> Vec<ZoneKey> {
        let mut inner = self.inner.write();
        let mut changed = Vec::new();
        for (addr, patch) in zones {
            let key = ZoneKey::new(device.clone(), addr);
            let zone = inner
                .zones
                .entry(key.clone())
                .or_insert_with(|| Zone::new(addr));
            if zone.apply_snapshot(&patch) {
                changed.push(key);
            }
        }
        changed
    }

    /// Merges a partial push into one zone. Patches for zones the store has
    /// never seen are dropped with a warning; the next full push will
    /// establish them. Returns whether the zone changed.
    pub(crate) fn apply_patch(&self, key: &ZoneKey, patch: &ZonePatch) -> bool {
        let mut inner = self.inner.write();
        match inner.zones.get_mut(key) {
            Some(zone) => zone.apply_patch(patch),
            None => {
                warn!(zone = %key, "dropping update for unknown zone");
                false
            }
        }
    }

    /// Flips the reachability flag of a device and all of its zones.
    /// Returns whether the device flag actually changed.
    pub(crate) fn set_device_available(&self, device: &DeviceId, available: bool) -> bool {
        let mut inner = self.inner.write();
        let entry = inner
            .devices
            .entry(device.clone())
            .or_insert_with(|| DeviceEntry {
                name: None,
                serial: None,
                available,
            });
        let changed = entry.available != available;
        entry.available = available;
        for (key, zone) in &mut inner.zones {
            if key.device() == device {
                zone.set_available(available);
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeaterMode;

    fn key(device: &str, addr: u16) -> ZoneKey {
        ZoneKey::new(DeviceId::new(device), ZoneAddr::new(addr))
    }

    fn target_patch(value: f64) -> ZonePatch {
        ZonePatch {
            target_temperature: Some(value),
            ..ZonePatch::default()
        }
    }

    #[test]
    fn read_unknown_zone_is_none() {
        let store = DeviceStateStore::new();
        assert!(store.read(&key("abc", 2)).is_none());
        assert!(!store.contains(&key("abc", 2)));
    }

    #[test]
    fn snapshot_creates_and_patch_merges() {
        let store = DeviceStateStore::new();
        let device = DeviceId::new("abc");

        let changed = store.apply_snapshot(
            &device,
            vec![
                (ZoneAddr::new(2), target_patch(21.0)),
                (ZoneAddr::new(3), target_patch(18.0)),
            ],
        );
        assert_eq!(changed.len(), 2);

        assert!(store.apply_patch(
            &key("abc", 2),
            &ZonePatch {
                mode: Some(HeaterMode::Auto),
                ..ZonePatch::default()
            }
        ));

        let zone = store.read(&key("abc", 2)).unwrap();
        assert_eq!(zone.target_temperature(), Some(21.0));
        assert_eq!(zone.mode(), Some(HeaterMode::Auto));

        // The sibling zone is untouched by the patch.
        let other = store.read(&key("abc", 3)).unwrap();
        assert_eq!(other.target_temperature(), Some(18.0));
        assert_eq!(other.mode(), None);
    }

    #[test]
    fn patch_for_unknown_zone_is_dropped() {
        let store = DeviceStateStore::new();
        assert!(!store.apply_patch(&key("abc", 9), &target_patch(20.0)));
        assert!(store.read(&key("abc", 9)).is_none());
    }

    #[test]
    fn snapshot_reports_only_changed_zones() {
        let store = DeviceStateStore::new();
        let device = DeviceId::new("abc");
        store.apply_snapshot(&device, vec![(ZoneAddr::new(2), target_patch(21.0))]);

        let changed = store.apply_snapshot(
            &device,
            vec![
                (ZoneAddr::new(2), target_patch(21.0)),
                (ZoneAddr::new(3), target_patch(19.0)),
            ],
        );
        assert_eq!(changed, vec![key("abc", 3)]);
    }

    #[test]
    fn zone_listing_is_ordered() {
        let store = DeviceStateStore::new();
        store.apply_snapshot(
            &DeviceId::new("bbb"),
            vec![(ZoneAddr::new(1), target_patch(20.0))],
        );
        store.apply_snapshot(
            &DeviceId::new("aaa"),
            vec![
                (ZoneAddr::new(5), target_patch(20.0)),
                (ZoneAddr::new(2), target_patch(20.0)),
            ],
        );

        assert_eq!(
            store.zones(),
            vec![key("aaa", 2), key("aaa", 5), key("bbb", 1)]
        );
        assert_eq!(
            store.zones_for(&DeviceId::new("aaa")),
            vec![key("aaa", 2), key("aaa", 5)]
        );
    }

    #[test]
    fn availability_cascades_to_zones() {
        let store = DeviceStateStore::new();
        let device = DeviceId::new("abc");
        store.upsert_device(&device, Some("Home hub"), None);
        store.apply_snapshot(&device, vec![(ZoneAddr::new(2), target_patch(21.0))]);

        assert_eq!(store.device_available(&device), Some(true));
        assert!(store.set_device_available(&device, false));
        assert!(!store.set_device_available(&device, false));

        assert_eq!(store.device_available(&device), Some(false));
        assert!(!store.read(&key("abc", 2)).unwrap().available());
    }

    #[test]
    fn topology_name_survives_until_push() {
        let store = DeviceStateStore::new();
        let device = DeviceId::new("abc");
        store.insert_zone_topology(&key("abc", 2), Some("Node 2"));
        assert_eq!(store.read(&key("abc", 2)).unwrap().name(), Some("Node 2"));

        store.apply_patch(
            &key("abc", 2),
            &ZonePatch {
                name: Some("Bedroom".to_string()),
                ..ZonePatch::default()
            },
        );
        store.insert_zone_topology(&key("abc", 2), Some("Node 2"));
        assert_eq!(store.read(&key("abc", 2)).unwrap().name(), Some("Bedroom"));
    }

    #[test]
    fn device_metadata_reads() {
        let store = DeviceStateStore::new();
        let device = DeviceId::new("abc");
        assert_eq!(store.device_available(&device), None);

        store.upsert_device(&device, None, None);
        assert_eq!(store.device_name(&device), None);
        assert_eq!(store.device_serial(&device), None);
        store.upsert_device(&device, Some("Home hub"), Some("0042"));
        assert_eq!(store.device_name(&device), Some("Home hub".to_string()));
        assert_eq!(store.device_serial(&device), Some("0042".to_string()));
        assert_eq!(store.devices(), vec![device]);
    }
}
