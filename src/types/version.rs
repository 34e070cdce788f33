// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Firmware and hardware revision reporting.

use std::fmt;

/// Firmware and hardware revisions of a zone.
///
/// Heaters report either, both, or neither value depending on model and
/// firmware age, so both components are optional.
///
/// # Examples
///
/// ```
/// use helki_lib::types::FirmwareVersion;
///
/// let v = FirmwareVersion::new(Some("3.2.1".into()), Some("rev B".into()));
/// assert_eq!(v.to_string(), "FW: 3.2.1 / HW: rev B");
///
/// let fw_only = FirmwareVersion::new(Some("3.2.1".into()), None);
/// assert_eq!(fw_only.to_string(), "FW: 3.2.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FirmwareVersion {
    firmware: Option<String>,
    hardware: Option<String>,
}

impl FirmwareVersion {
    /// Creates a version record from its optional components.
    #[must_use]
    pub const fn new(firmware: Option<String>, hardware: Option<String>) -> Self {
        Self { firmware, hardware }
    }

    /// Firmware revision string, if reported.
    #[must_use]
    pub fn firmware(&self) -> Option<&str> {
        self.firmware.as_deref()
    }

    /// Hardware revision string, if reported.
    #[must_use]
    pub fn hardware(&self) -> Option<&str> {
        self.hardware.as_deref()
    }

    /// Whether neither component was reported.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.firmware.is_none() && self.hardware.is_none()
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.firmware, &self.hardware) {
            (Some(fw), Some(hw)) => write!(f, "FW: {fw} / HW: {hw}"),
            (Some(fw), None) => write!(f, "FW: {fw}"),
            (None, Some(hw)) => write!(f, "HW: {hw}"),
            (None, None) => write!(f, "unknown"),
        }
    }
}
