// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsers for the zone payloads pushed over the realtime channel.
//!
//! The cloud is loose about value types: temperatures arrive as decimal
//! strings, flags arrive as booleans, numbers or `"1"`/`"0"` strings
//! depending on firmware. Everything here decodes leniently and converts to
//! the typed [`ZonePatch`] currency; a carried value that cannot be
//! interpreted is dropped with a warning rather than failing the frame.

use serde::Deserialize;
use tracing::warn;

use crate::state::ZonePatch;
use crate::types::{ChargingSchedule, ChargingSlot, FirmwareVersion, HeaterMode, PowerRatings};

// ===== lenient scalars =====

/// A numeric value that may arrive as a JSON number or a decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Number(serde_json::Number),
    Text(String),
}

impl WireNumber {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// A flag that may arrive as a JSON boolean, a number or a `"1"`/`"0"`
/// style string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireBool {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl WireBool {
    fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Number(n) => n.as_f64().map(|v| v != 0.0),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => Some(true),
                "0" | "false" | "off" => Some(false),
                _ => None,
            },
        }
    }
}

fn flag(field: &Option<WireBool>) -> Option<bool> {
    field.as_ref().and_then(WireBool::as_bool)
}

fn temperature(field: &Option<WireNumber>, key: &'static str) -> Option<f64> {
    let raw = field.as_ref()?;
    let value = raw.as_f64();
    if value.is_none() {
        warn!(key, value = ?raw, "ignoring unparseable temperature");
    }
    value
}

// ===== dev_data =====

/// Payload of a full `dev_data` push.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DevDataPayload {
    #[serde(default)]
    pub nodes: Vec<NodePayload>,
}

/// One zone record inside a `dev_data` push.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct NodePayload {
    /// Zone address on the hub.
    #[serde(default)]
    pub addr: Option<i64>,

    /// Zone name as configured in the vendor app.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub status: ZoneStatus,

    #[serde(default)]
    pub setup: ZoneSetup,

    #[serde(default)]
    pub version: ZoneVersion,
}

impl NodePayload {
    /// Flattens the record into one patch covering readings, setup and
    /// firmware data.
    pub(crate) fn to_patch(&self) -> ZonePatch {
        let mut patch = self.status.to_patch();
        patch.name = self.name.clone();
        let setup = self.setup.to_patch();
        patch.ratings = setup.ratings;
        patch.charging_schedule = setup.charging_schedule;
        patch.firmware = self.version.to_firmware();
        patch
    }
}

// ===== status subtree =====

/// The `status` subtree of a zone.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ZoneStatus {
    /// Measured room temperature, decimal string.
    #[serde(default)]
    mtemp: Option<WireNumber>,

    /// Setpoint temperature, decimal string.
    #[serde(default)]
    stemp: Option<WireNumber>,

    /// Operating mode, e.g. `"auto"` or `"modified_auto"`.
    #[serde(default)]
    mode: Option<String>,

    /// Anti-frost preset setpoint.
    #[serde(default)]
    ice_temp: Option<WireNumber>,

    /// Economy preset setpoint.
    #[serde(default)]
    eco_temp: Option<WireNumber>,

    /// Comfort preset setpoint.
    #[serde(default)]
    comf_temp: Option<WireNumber>,

    /// Whether the element is producing heat.
    #[serde(default)]
    heating: Option<WireBool>,

    /// Whether the accumulator core is charging.
    #[serde(default)]
    charging: Option<WireBool>,

    /// Accumulator charge level in percent.
    #[serde(default)]
    charge_level: Option<WireNumber>,

    /// Present power draw in watts.
    #[serde(default)]
    power: Option<WireNumber>,

    /// Internal electronics temperature.
    #[serde(default)]
    pcb_temp: Option<WireNumber>,

    #[serde(default)]
    window_open: Option<WireBool>,

    #[serde(default)]
    presence: Option<WireBool>,

    #[serde(default)]
    true_radiant_active: Option<WireBool>,

    /// Vendor error code; zero means no error.
    #[serde(default)]
    error_code: Option<WireNumber>,
}

impl ZoneStatus {
    /// Converts the subtree into a patch. Unknown modes and unparseable
    /// temperatures are logged and left out of the patch.
    pub(crate) fn to_patch(&self) -> ZonePatch {
        let mode = self.mode.as_deref().and_then(|raw| {
            let mode = HeaterMode::from_wire(raw);
            if mode.is_none() {
                warn!(mode = raw, "ignoring unknown heater mode");
            }
            mode
        });

        ZonePatch {
            mode,
            current_temperature: temperature(&self.mtemp, "mtemp"),
            target_temperature: temperature(&self.stemp, "stemp"),
            anti_frost_temperature: temperature(&self.ice_temp, "ice_temp"),
            economy_temperature: temperature(&self.eco_temp, "eco_temp"),
            comfort_temperature: temperature(&self.comf_temp, "comf_temp"),
            heating: flag(&self.heating),
            charging: flag(&self.charging),
            charge_level: self
                .charge_level
                .as_ref()
                .and_then(WireNumber::as_i64)
                .and_then(|v| u8::try_from(v).ok()),
            power_watts: self.power.as_ref().and_then(WireNumber::as_f64),
            pcb_temperature: self.pcb_temp.as_ref().and_then(WireNumber::as_f64),
            window_open: flag(&self.window_open),
            presence: flag(&self.presence),
            true_radiant: flag(&self.true_radiant_active),
            error_code: self.error_code.as_ref().and_then(WireNumber::as_i64),
            ..ZonePatch::default()
        }
    }
}

// ===== setup subtree =====

/// The `setup` subtree of a zone.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ZoneSetup {
    #[serde(default)]
    factory_options: Option<FactoryOptions>,

    #[serde(default)]
    charging_conf: Option<ChargingConf>,
}

/// Factory ratings; wattages are decimal strings, possibly empty.
#[derive(Debug, Clone, Default, Deserialize)]
struct FactoryOptions {
    #[serde(default)]
    accumulator_power: Option<String>,

    #[serde(default)]
    emitter_power: Option<String>,
}

/// Off-peak charging windows; bounds are minutes since midnight.
#[derive(Debug, Clone, Default, Deserialize)]
struct ChargingConf {
    #[serde(default)]
    slot_1: Option<SlotConf>,

    #[serde(default)]
    slot_2: Option<SlotConf>,

    /// Seven entries, Monday first.
    #[serde(default)]
    active_days: Option<Vec<WireBool>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SlotConf {
    #[serde(default)]
    start: Option<WireNumber>,

    #[serde(default)]
    end: Option<WireNumber>,
}

impl SlotConf {
    fn to_slot(&self) -> Option<ChargingSlot> {
        let start = bound_minutes(&self.start);
        let end = bound_minutes(&self.end);
        ChargingSlot::from_wire_minutes(start, end)
    }
}

fn bound_minutes(field: &Option<WireNumber>) -> u32 {
    field
        .as_ref()
        .and_then(WireNumber::as_i64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

impl ZoneSetup {
    /// Converts the subtree into a patch carrying ratings and schedule.
    pub(crate) fn to_patch(&self) -> ZonePatch {
        let ratings = self.factory_options.as_ref().map(|opts| {
            PowerRatings::from_wire(
                opts.accumulator_power.as_deref(),
                opts.emitter_power.as_deref(),
            )
        });

        let charging_schedule = self.charging_conf.as_ref().map(|conf| {
            ChargingSchedule::new(
                conf.slot_1.as_ref().and_then(SlotConf::to_slot),
                conf.slot_2.as_ref().and_then(SlotConf::to_slot),
                conf.active_day_flags(),
            )
        });

        ZonePatch {
            ratings,
            charging_schedule,
            ..ZonePatch::default()
        }
    }
}

impl ChargingConf {
    fn active_day_flags(&self) -> [bool; 7] {
        let Some(days) = &self.active_days else {
            return [false; 7];
        };
        if days.len() != 7 {
            warn!(count = days.len(), "ignoring malformed active_days list");
            return [false; 7];
        }
        let mut flags = [false; 7];
        for (flag, day) in flags.iter_mut().zip(days) {
            *flag = day.as_bool().unwrap_or(false);
        }
        flags
    }
}

// ===== version subtree =====

/// The `version` subtree of a zone.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ZoneVersion {
    #[serde(default)]
    fw_version: Option<String>,

    #[serde(default)]
    hw_version: Option<String>,
}

impl ZoneVersion {
    /// `None` when the subtree carried nothing.
    pub(crate) fn to_firmware(&self) -> Option<FirmwareVersion> {
        if self.fw_version.is_none() && self.hw_version.is_none() {
            return None;
        }
        Some(FirmwareVersion::new(
            self.fw_version.clone(),
            self.hw_version.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== status =====

    #[test]
    fn status_with_string_temperatures() {
        let json = r#"{"mtemp":"21.5","stemp":"22.0","mode":"auto","heating":"1"}"#;
        let status: ZoneStatus = serde_json::from_str(json).unwrap();
        let patch = status.to_patch();

        assert_eq!(patch.current_temperature, Some(21.5));
        assert_eq!(patch.target_temperature, Some(22.0));
        assert_eq!(patch.mode, Some(HeaterMode::Auto));
        assert_eq!(patch.heating, Some(true));
    }

    #[test]
    fn status_with_native_types() {
        let json = r#"{"mtemp":20.1,"heating":false,"charge_level":80,"power":950.0}"#;
        let status: ZoneStatus = serde_json::from_str(json).unwrap();
        let patch = status.to_patch();

        assert_eq!(patch.current_temperature, Some(20.1));
        assert_eq!(patch.heating, Some(false));
        assert_eq!(patch.charge_level, Some(80));
        assert_eq!(patch.power_watts, Some(950.0));
    }

    #[test]
    fn status_full_accumulator_reading() {
        let json = r#"{
            "mtemp": "19.8",
            "stemp": "21.0",
            "mode": "modified_auto",
            "ice_temp": "7.0",
            "eco_temp": "16.5",
            "comf_temp": "21.0",
            "heating": true,
            "charging": false,
            "charge_level": 65,
            "power": 1300,
            "pcb_temp": 41.2,
            "window_open": false,
            "presence": true,
            "true_radiant_active": false,
            "error_code": 0
        }"#;
        let status: ZoneStatus = serde_json::from_str(json).unwrap();
        let patch = status.to_patch();

        assert_eq!(patch.mode, Some(HeaterMode::Manual));
        assert_eq!(patch.anti_frost_temperature, Some(7.0));
        assert_eq!(patch.economy_temperature, Some(16.5));
        assert_eq!(patch.comfort_temperature, Some(21.0));
        assert_eq!(patch.charging, Some(false));
        assert_eq!(patch.charge_level, Some(65));
        assert_eq!(patch.power_watts, Some(1300.0));
        assert_eq!(patch.pcb_temperature, Some(41.2));
        assert_eq!(patch.window_open, Some(false));
        assert_eq!(patch.presence, Some(true));
        assert_eq!(patch.true_radiant, Some(false));
        assert_eq!(patch.error_code, Some(0));
    }

    #[test]
    fn unknown_mode_is_dropped() {
        let json = r#"{"mode":"boost","stemp":"20.0"}"#;
        let status: ZoneStatus = serde_json::from_str(json).unwrap();
        let patch = status.to_patch();

        assert_eq!(patch.mode, None);
        assert_eq!(patch.target_temperature, Some(20.0));
    }

    #[test]
    fn unparseable_temperature_is_dropped() {
        let json = r#"{"mtemp":"--","stemp":"21.0"}"#;
        let status: ZoneStatus = serde_json::from_str(json).unwrap();
        let patch = status.to_patch();

        assert_eq!(patch.current_temperature, None);
        assert_eq!(patch.target_temperature, Some(21.0));
    }

    #[test]
    fn empty_status_yields_empty_patch() {
        let status: ZoneStatus = serde_json::from_str("{}").unwrap();
        assert!(status.to_patch().is_empty());
    }

    // ===== setup =====

    #[test]
    fn setup_with_ratings_and_schedule() {
        let json = r#"{
            "factory_options": {"accumulator_power": "1300", "emitter_power": "500"},
            "charging_conf": {
                "slot_1": {"start": 120, "end": 360},
                "slot_2": {"start": 0, "end": 0},
                "active_days": [1, 1, 1, 1, 1, 0, 0]
            }
        }"#;
        let setup: ZoneSetup = serde_json::from_str(json).unwrap();
        let patch = setup.to_patch();

        let ratings = patch.ratings.unwrap();
        assert_eq!(ratings.accumulator_watts(), Some(1300));
        assert_eq!(ratings.emitter_watts(), Some(500));

        let schedule = patch.charging_schedule.unwrap();
        assert_eq!(schedule.slot_1().unwrap().to_string(), "02:00-06:00");
        assert!(schedule.slot_2().is_none());
        assert!(schedule.is_active_on(0));
        assert!(!schedule.is_active_on(5));
    }

    #[test]
    fn setup_with_empty_ratings() {
        let json = r#"{"factory_options": {"accumulator_power": "", "emitter_power": ""}}"#;
        let setup: ZoneSetup = serde_json::from_str(json).unwrap();
        let patch = setup.to_patch();

        assert!(patch.ratings.unwrap().is_empty());
        assert!(patch.charging_schedule.is_none());
    }

    #[test]
    fn malformed_active_days_falls_back_to_none_active() {
        let json = r#"{"charging_conf": {"active_days": [1, 0]}}"#;
        let setup: ZoneSetup = serde_json::from_str(json).unwrap();
        let schedule = setup.to_patch().charging_schedule.unwrap();

        assert_eq!(schedule.active_days(), [false; 7]);
    }

    #[test]
    fn empty_setup_yields_empty_patch() {
        let setup: ZoneSetup = serde_json::from_str("{}").unwrap();
        assert!(setup.to_patch().is_empty());
    }

    // ===== version =====

    #[test]
    fn version_maps_to_firmware() {
        let json = r#"{"fw_version": "1.2.3", "hw_version": "B"}"#;
        let version: ZoneVersion = serde_json::from_str(json).unwrap();
        let firmware = version.to_firmware().unwrap();

        assert_eq!(firmware.firmware(), Some("1.2.3"));
        assert_eq!(firmware.hardware(), Some("B"));
    }

    #[test]
    fn empty_version_maps_to_none() {
        let version: ZoneVersion = serde_json::from_str("{}").unwrap();
        assert!(version.to_firmware().is_none());
    }

    // ===== dev_data =====

    #[test]
    fn dev_data_node_flattens_to_one_patch() {
        let json = r#"{
            "nodes": [{
                "addr": 2,
                "name": "Living room",
                "status": {"mtemp": "21.5", "stemp": "22.0", "mode": "auto"},
                "setup": {"factory_options": {"accumulator_power": "1300"}},
                "version": {"fw_version": "1.2.3"}
            }]
        }"#;
        let payload: DevDataPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.nodes.len(), 1);

        let node = &payload.nodes[0];
        assert_eq!(node.addr, Some(2));
        let patch = node.to_patch();

        assert_eq!(patch.name.as_deref(), Some("Living room"));
        assert_eq!(patch.current_temperature, Some(21.5));
        assert_eq!(patch.ratings.unwrap().accumulator_watts(), Some(1300));
        assert_eq!(patch.firmware.unwrap().firmware(), Some("1.2.3"));
    }

    #[test]
    fn dev_data_tolerates_missing_subtrees() {
        let json = r#"{"nodes": [{"addr": 1}]}"#;
        let payload: DevDataPayload = serde_json::from_str(json).unwrap();
        let patch = payload.nodes[0].to_patch();

        assert_eq!(patch.name, None);
        assert!(patch.ratings.is_none());
        assert!(patch.firmware.is_none());
    }
}
