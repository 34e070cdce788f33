// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Temperature setpoint types.
//!
//! The vendor transmits every temperature as a decimal string in degrees
//! Celsius (e.g. `"21.0"`). These types validate setpoints at construction
//! time so an out-of-range value can never reach the wire.

use std::fmt;

use crate::error::ValidationError;

// =============================================================================
// TargetTemperature
// =============================================================================

/// A validated target temperature for a heating zone.
///
/// Valid range: 5.0 to 30.0 degrees Celsius, the span the heater hardware
/// accepts. Panels step in half degrees; values are snapped to the nearest
/// half degree on construction.
///
/// # Examples
///
/// ```
/// use helki_lib::types::TargetTemperature;
///
/// let temp = TargetTemperature::new(21.0).unwrap();
/// assert_eq!(temp.celsius(), 21.0);
///
/// // Snapped to the nearest half degree
/// let temp = TargetTemperature::new(21.3).unwrap();
/// assert_eq!(temp.celsius(), 21.5);
///
/// // Out-of-range values return an error
/// assert!(TargetTemperature::new(3.0).is_err());
/// assert!(TargetTemperature::new(42.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TargetTemperature(f64);

impl TargetTemperature {
    /// Minimum target temperature in degrees Celsius.
    pub const MIN: f64 = 5.0;

    /// Maximum target temperature in degrees Celsius.
    pub const MAX: f64 = 30.0;

    /// Setpoint granularity in degrees Celsius.
    pub const STEP: f64 = 0.5;

    /// Creates a new target temperature.
    ///
    /// In-range values are snapped to the nearest half degree, matching the
    /// heater panel's own granularity. Snapping cannot move a value out of
    /// range because both bounds are whole half degrees.
    ///
    /// # Arguments
    ///
    /// * `celsius` - The target temperature in degrees Celsius (5.0-30.0)
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::TemperatureOutOfRange` if the value is
    /// outside [5.0, 30.0] or not finite.
    pub fn new(celsius: f64) -> Result<Self, ValidationError> {
        if !celsius.is_finite() || !(Self::MIN..=Self::MAX).contains(&celsius) {
            return Err(ValidationError::TemperatureOutOfRange {
                min: Self::MIN,
                max: Self::MAX,
                actual: celsius,
            });
        }
        Ok(Self((celsius / Self::STEP).round() * Self::STEP))
    }

    /// Creates a target temperature, clamping to the valid range.
    ///
    /// Non-finite input clamps to the minimum.
    ///
    /// # Examples
    ///
    /// ```
    /// use helki_lib::types::TargetTemperature;
    ///
    /// assert_eq!(TargetTemperature::clamped(50.0).celsius(), 30.0);
    /// assert_eq!(TargetTemperature::clamped(0.0).celsius(), 5.0);
    /// ```
    #[must_use]
    pub fn clamped(celsius: f64) -> Self {
        if !celsius.is_finite() {
            return Self(Self::MIN);
        }
        let snapped = (celsius / Self::STEP).round() * Self::STEP;
        Self(snapped.clamp(Self::MIN, Self::MAX))
    }

    /// Returns the temperature in degrees Celsius.
    #[must_use]
    pub const fn celsius(&self) -> f64 {
        self.0
    }

    /// Returns the wire encoding used by the vendor (`"21.0"`).
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("{:.1}", self.0)
    }
}

impl fmt::Display for TargetTemperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°C", self.0)
    }
}

impl TryFrom<f64> for TargetTemperature {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// =============================================================================
// Presets
// =============================================================================

/// The named preset setpoints a zone carries.
///
/// Each kind has its own allowed range: anti-frost protection stays low,
/// economy and comfort share the full span.
///
/// # Examples
///
/// ```
/// use helki_lib::types::PresetKind;
///
/// assert_eq!(PresetKind::AntiFrost.wire_key(), "ice_temp");
/// assert_eq!(PresetKind::AntiFrost.range(), (5.0, 15.0));
/// assert_eq!(PresetKind::Comfort.range(), (7.0, 30.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresetKind {
    /// Frost-protection setpoint (vendor: `ice_temp`).
    AntiFrost,
    /// Economy setpoint (vendor: `eco_temp`).
    Economy,
    /// Comfort setpoint (vendor: `comf_temp`).
    Comfort,
}

impl PresetKind {
    /// Returns the status field key the vendor uses for this preset.
    #[must_use]
    pub const fn wire_key(&self) -> &'static str {
        match self {
            Self::AntiFrost => "ice_temp",
            Self::Economy => "eco_temp",
            Self::Comfort => "comf_temp",
        }
    }

    /// Returns the allowed `(min, max)` range in degrees Celsius.
    #[must_use]
    pub const fn range(&self) -> (f64, f64) {
        match self {
            Self::AntiFrost => (5.0, 15.0),
            Self::Economy | Self::Comfort => (7.0, 30.0),
        }
    }
}

impl fmt::Display for PresetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AntiFrost => "anti-frost",
            Self::Economy => "economy",
            Self::Comfort => "comfort",
        };
        write!(f, "{name}")
    }
}

/// A validated preset setpoint: a [`PresetKind`] together with a value
/// inside that kind's range.
///
/// # Examples
///
/// ```
/// use helki_lib::types::{PresetKind, PresetTemperature};
///
/// let eco = PresetTemperature::new(PresetKind::Economy, 18.0).unwrap();
/// assert_eq!(eco.celsius(), 18.0);
///
/// // Anti-frost tops out at 15
/// assert!(PresetTemperature::new(PresetKind::AntiFrost, 20.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetTemperature {
    kind: PresetKind,
    celsius: f64,
}

impl PresetTemperature {
    /// Creates a new preset setpoint.
    ///
    /// In-range values are snapped to the nearest half degree, like
    /// [`TargetTemperature::new`].
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::PresetOutOfRange` if the value is outside
    /// the kind's range or not finite.
    pub fn new(kind: PresetKind, celsius: f64) -> Result<Self, ValidationError> {
        let (min, max) = kind.range();
        if !celsius.is_finite() || !(min..=max).contains(&celsius) {
            return Err(ValidationError::PresetOutOfRange {
                kind,
                min,
                max,
                actual: celsius,
            });
        }
        let snapped = (celsius / TargetTemperature::STEP).round() * TargetTemperature::STEP;
        Ok(Self {
            kind,
            celsius: snapped,
        })
    }

    /// Returns the preset kind.
    #[must_use]
    pub const fn kind(&self) -> PresetKind {
        self.kind
    }

    /// Returns the setpoint in degrees Celsius.
    #[must_use]
    pub const fn celsius(&self) -> f64 {
        self.celsius
    }

    /// Returns the wire encoding used by the vendor (`"12.0"`).
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("{:.1}", self.celsius)
    }
}

impl fmt::Display for PresetTemperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.1}°C", self.kind, self.celsius)
    }
}
