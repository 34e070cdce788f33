// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for heater fleet control.
//!
//! This module provides type-safe representations of the values exchanged
//! with the cloud. Each type ensures values are within their valid ranges at
//! construction time, so commands are checked before anything reaches the
//! wire.
//!
//! # Types
//!
//! - [`HomeId`] / [`DeviceId`] / [`ZoneAddr`] / [`ZoneKey`] - fleet addressing
//! - [`HeaterMode`] - Off/Auto/Manual operating modes
//! - [`TargetTemperature`] - setpoint in half-degree Celsius steps (5-30)
//! - [`PresetKind`] / [`PresetTemperature`] - anti-frost, economy and comfort
//!   presets with per-kind ranges
//! - [`PowerRatings`] - factory wattage ratings
//! - [`TimeOfDay`] / [`ChargingSlot`] / [`ChargingSchedule`] - off-peak
//!   charging windows
//! - [`FirmwareVersion`] - firmware and hardware revisions

mod ids;
mod mode;
mod power;
mod schedule;
mod temperature;
mod version;

pub use ids::{DeviceId, HomeId, ZoneAddr, ZoneKey};
pub use mode::HeaterMode;
pub use power::PowerRatings;
pub use schedule::{ChargingSchedule, ChargingSlot, TimeOfDay};
pub use temperature::{PresetKind, PresetTemperature, TargetTemperature};
pub use version::FirmwareVersion;
