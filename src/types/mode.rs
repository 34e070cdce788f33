// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Operating mode for heating zones.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Operating mode of a heating zone.
///
/// The vendor recognises three modes. `Auto` follows the charging schedule
/// programmed into the heater; `Manual` (vendor wire name `modified_auto`)
/// holds the target temperature regardless of the schedule and is what a
/// thermostat's "heat" setting maps to; `Off` disables heating output.
///
/// # Examples
///
/// ```
/// use helki_lib::types::HeaterMode;
///
/// assert_eq!(HeaterMode::Manual.as_wire(), "modified_auto");
/// assert_eq!("off".parse::<HeaterMode>().unwrap(), HeaterMode::Off);
/// assert!("banana".parse::<HeaterMode>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaterMode {
    /// Heating output disabled.
    Off,
    /// Follow the programmed schedule.
    Auto,
    /// Hold the target temperature (vendor: `modified_auto`).
    Manual,
}

impl HeaterMode {
    /// Returns the vendor wire string for this mode.
    #[must_use]
    pub const fn as_wire(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Auto => "auto",
            Self::Manual => "modified_auto",
        }
    }

    /// Parses a vendor wire string, returning `None` for unknown values.
    ///
    /// Inbound pushes use this so an unrecognised mode degrades to a logged
    /// warning instead of failing the whole frame.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "off" => Some(Self::Off),
            "auto" => Some(Self::Auto),
            "modified_auto" | "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for HeaterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::Auto => "auto",
            Self::Manual => "manual",
        };
        write!(f, "{name}")
    }
}

impl FromStr for HeaterMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(&s.to_lowercase()).ok_or_else(|| ValidationError::UnknownMode(s.to_string()))
    }
}
