// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Canonical zone state and the patches that mutate it.
//!
//! [`Zone`] is what [`read`](super::DeviceStateStore::read) hands to
//! callers: a plain snapshot of one heating area. [`ZonePatch`] is the
//! store's only mutation currency; pushes and optimistic command writes both
//! reduce to one before touching a zone.

use crate::types::{
    ChargingSchedule, FirmwareVersion, HeaterMode, PowerRatings, PresetKind, ZoneAddr,
};

/// A partial update to one zone.
///
/// Every field is optional; `None` means "leave untouched" under merge
/// semantics and "absent" under snapshot semantics. Temperatures stay raw
/// `f64` here: inbound values reflect whatever the cloud reports, and only
/// outbound commands go through the validated types.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ZonePatch {
    pub name: Option<String>,
    pub mode: Option<HeaterMode>,
    pub target_temperature: Option<f64>,
    pub current_temperature: Option<f64>,
    pub anti_frost_temperature: Option<f64>,
    pub economy_temperature: Option<f64>,
    pub comfort_temperature: Option<f64>,
    pub heating: Option<bool>,
    pub charging: Option<bool>,
    pub charge_level: Option<u8>,
    pub power_watts: Option<f64>,
    pub pcb_temperature: Option<f64>,
    pub window_open: Option<bool>,
    pub presence: Option<bool>,
    pub true_radiant: Option<bool>,
    pub error_code: Option<i64>,
    pub ratings: Option<PowerRatings>,
    pub charging_schedule: Option<ChargingSchedule>,
    pub firmware: Option<FirmwareVersion>,
}

impl ZonePatch {
    /// Whether the patch carries no fields at all.
    pub(crate) fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// State of one heating zone.
///
/// Returned by value from the store; a `Zone` in caller hands is a snapshot
/// and never reflects later pushes.
#[derive(Debug, Clone)]
pub struct Zone {
    addr: ZoneAddr,
    name: Option<String>,
    // Names learned from the realtime channel win over REST topology names.
    name_from_push: bool,
    available: bool,
    mode: Option<HeaterMode>,
    target_temperature: Option<f64>,
    current_temperature: Option<f64>,
    anti_frost_temperature: Option<f64>,
    economy_temperature: Option<f64>,
    comfort_temperature: Option<f64>,
    heating: Option<bool>,
    charging: Option<bool>,
    charge_level: Option<u8>,
    power_watts: Option<f64>,
    pcb_temperature: Option<f64>,
    window_open: Option<bool>,
    presence: Option<bool>,
    true_radiant: Option<bool>,
    error_code: Option<i64>,
    ratings: PowerRatings,
    charging_schedule: Option<ChargingSchedule>,
    firmware: FirmwareVersion,
}

/// Overwrites `slot` when the patch carries a value that differs.
fn merge_field<T: PartialEq + Copy>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(v) if *slot != Some(v) => {
            *slot = Some(v);
            true
        }
        _ => false,
    }
}

/// Overwrites `slot` unconditionally, `None` included.
fn replace_field<T: PartialEq + Copy>(slot: &mut Option<T>, value: Option<T>) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

impl Zone {
    pub(crate) fn new(addr: ZoneAddr) -> Self {
        Self {
            addr,
            name: None,
            name_from_push: false,
            available: true,
            mode: None,
            target_temperature: None,
            current_temperature: None,
            anti_frost_temperature: None,
            economy_temperature: None,
            comfort_temperature: None,
            heating: None,
            charging: None,
            charge_level: None,
            power_watts: None,
            pcb_temperature: None,
            window_open: None,
            presence: None,
            true_radiant: None,
            error_code: None,
            ratings: PowerRatings::default(),
            charging_schedule: None,
            firmware: FirmwareVersion::default(),
        }
    }

    // ===== mutation (store-internal) =====

    /// Merges a partial update; fields the patch does not carry stay as they
    /// are. Returns whether anything changed.
    pub(crate) fn apply_patch(&mut self, patch: &ZonePatch) -> bool {
        let mut changed = false;

        if let Some(name) = &patch.name {
            changed |= self.set_push_name(name);
        }

        changed |= merge_field(&mut self.mode, patch.mode);
        changed |= merge_field(&mut self.target_temperature, patch.target_temperature);
        changed |= merge_field(&mut self.current_temperature, patch.current_temperature);
        changed |= merge_field(&mut self.anti_frost_temperature, patch.anti_frost_temperature);
        changed |= merge_field(&mut self.economy_temperature, patch.economy_temperature);
        changed |= merge_field(&mut self.comfort_temperature, patch.comfort_temperature);
        changed |= merge_field(&mut self.heating, patch.heating);
        changed |= merge_field(&mut self.charging, patch.charging);
        changed |= merge_field(&mut self.charge_level, patch.charge_level);
        changed |= merge_field(&mut self.power_watts, patch.power_watts);
        changed |= merge_field(&mut self.pcb_temperature, patch.pcb_temperature);
        changed |= merge_field(&mut self.window_open, patch.window_open);
        changed |= merge_field(&mut self.presence, patch.presence);
        changed |= merge_field(&mut self.true_radiant, patch.true_radiant);
        changed |= merge_field(&mut self.error_code, patch.error_code);

        if let Some(ratings) = patch.ratings
            && self.ratings != ratings
        {
            self.ratings = ratings;
            changed = true;
        }
        if let Some(schedule) = patch.charging_schedule
            && self.charging_schedule != Some(schedule)
        {
            self.charging_schedule = Some(schedule);
            changed = true;
        }
        if let Some(firmware) = &patch.firmware
            && self.firmware != *firmware
        {
            self.firmware = firmware.clone();
            changed = true;
        }

        changed
    }

    /// Replaces the whole mutable subtree with the snapshot's content.
    /// Fields the snapshot does not carry are cleared. Returns whether
    /// anything changed.
    pub(crate) fn apply_snapshot(&mut self, snapshot: &ZonePatch) -> bool {
        let mut changed = false;

        if let Some(name) = &snapshot.name {
            changed |= self.set_push_name(name);
        }

        changed |= replace_field(&mut self.mode, snapshot.mode);
        changed |= replace_field(&mut self.target_temperature, snapshot.target_temperature);
        changed |= replace_field(&mut self.current_temperature, snapshot.current_temperature);
        changed |= replace_field(
            &mut self.anti_frost_temperature,
            snapshot.anti_frost_temperature,
        );
        changed |= replace_field(&mut self.economy_temperature, snapshot.economy_temperature);
        changed |= replace_field(&mut self.comfort_temperature, snapshot.comfort_temperature);
        changed |= replace_field(&mut self.heating, snapshot.heating);
        changed |= replace_field(&mut self.charging, snapshot.charging);
        changed |= replace_field(&mut self.charge_level, snapshot.charge_level);
        changed |= replace_field(&mut self.power_watts, snapshot.power_watts);
        changed |= replace_field(&mut self.pcb_temperature, snapshot.pcb_temperature);
        changed |= replace_field(&mut self.window_open, snapshot.window_open);
        changed |= replace_field(&mut self.presence, snapshot.presence);
        changed |= replace_field(&mut self.true_radiant, snapshot.true_radiant);
        changed |= replace_field(&mut self.error_code, snapshot.error_code);

        let ratings = snapshot.ratings.unwrap_or_default();
        if self.ratings != ratings {
            self.ratings = ratings;
            changed = true;
        }
        if self.charging_schedule != snapshot.charging_schedule {
            self.charging_schedule = snapshot.charging_schedule;
            changed = true;
        }
        let firmware = snapshot.firmware.clone().unwrap_or_default();
        if self.firmware != firmware {
            self.firmware = firmware;
            changed = true;
        }

        changed
    }

    fn set_push_name(&mut self, name: &str) -> bool {
        self.name_from_push = true;
        if self.name.as_deref() == Some(name) {
            false
        } else {
            self.name = Some(name.to_string());
            true
        }
    }

    /// Sets a name learned from REST topology. Ignored once the realtime
    /// channel has reported a name for this zone.
    pub(crate) fn set_topology_name(&mut self, name: &str) -> bool {
        if self.name_from_push || self.name.as_deref() == Some(name) {
            false
        } else {
            self.name = Some(name.to_string());
            true
        }
    }

    pub(crate) fn set_available(&mut self, available: bool) -> bool {
        if self.available == available {
            false
        } else {
            self.available = available;
            true
        }
    }

    // ===== accessors =====

    /// The zone's address on its hub.
    #[must_use]
    pub fn addr(&self) -> ZoneAddr {
        self.addr
    }

    /// The zone's name, if one was learned from the cloud.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The zone's name with an addressing fallback, e.g. `Zone 2`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("Zone {}", self.addr),
        }
    }

    /// Whether the zone's hub is currently reachable.
    #[must_use]
    pub fn available(&self) -> bool {
        self.available
    }

    /// Operating mode.
    #[must_use]
    pub fn mode(&self) -> Option<HeaterMode> {
        self.mode
    }

    /// Target temperature in degrees Celsius.
    #[must_use]
    pub fn target_temperature(&self) -> Option<f64> {
        self.target_temperature
    }

    /// Measured room temperature in degrees Celsius.
    #[must_use]
    pub fn current_temperature(&self) -> Option<f64> {
        self.current_temperature
    }

    /// Setpoint of one preset, in degrees Celsius.
    #[must_use]
    pub fn preset(&self, kind: PresetKind) -> Option<f64> {
        match kind {
            PresetKind::AntiFrost => self.anti_frost_temperature,
            PresetKind::Economy => self.economy_temperature,
            PresetKind::Comfort => self.comfort_temperature,
        }
    }

    /// Whether the element is currently producing heat.
    #[must_use]
    pub fn heating(&self) -> Option<bool> {
        self.heating
    }

    /// Whether the accumulator core is currently charging.
    #[must_use]
    pub fn charging(&self) -> Option<bool> {
        self.charging
    }

    /// Accumulator charge level in percent.
    #[must_use]
    pub fn charge_level(&self) -> Option<u8> {
        self.charge_level
    }

    /// Present power draw in watts.
    #[must_use]
    pub fn power_watts(&self) -> Option<f64> {
        self.power_watts
    }

    /// Internal electronics temperature in degrees Celsius.
    #[must_use]
    pub fn pcb_temperature(&self) -> Option<f64> {
        self.pcb_temperature
    }

    /// Open-window detection state.
    #[must_use]
    pub fn window_open(&self) -> Option<bool> {
        self.window_open
    }

    /// Presence detection state.
    #[must_use]
    pub fn presence(&self) -> Option<bool> {
        self.presence
    }

    /// Whether the true-radiant output mode is active.
    #[must_use]
    pub fn true_radiant(&self) -> Option<bool> {
        self.true_radiant
    }

    /// Vendor error code; zero means no error.
    #[must_use]
    pub fn error_code(&self) -> Option<i64> {
        self.error_code
    }

    /// Factory power ratings.
    #[must_use]
    pub fn ratings(&self) -> PowerRatings {
        self.ratings
    }

    /// Off-peak charging schedule, once setup data has arrived.
    #[must_use]
    pub fn charging_schedule(&self) -> Option<ChargingSchedule> {
        self.charging_schedule
    }

    /// Firmware and hardware revisions.
    #[must_use]
    pub fn firmware(&self) -> &FirmwareVersion {
        &self.firmware
    }
}
