// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Off-peak charging schedule types.
//!
//! Storage heaters charge their ceramic core during configured time slots,
//! typically aligned with off-peak tariff windows. The cloud reports the
//! schedule as minutes since midnight; these types carry it in a form that
//! renders as `HH:MM`.

use std::fmt;

use crate::error::ValidationError;

// ===== TimeOfDay =====

/// A clock time expressed as minutes since midnight.
///
/// # Examples
///
/// ```
/// use helki_lib::types::TimeOfDay;
///
/// let t = TimeOfDay::from_minutes(125).unwrap();
/// assert_eq!(t.hour(), 2);
/// assert_eq!(t.minute(), 5);
/// assert_eq!(t.to_string(), "02:05");
///
/// assert!(TimeOfDay::from_minutes(1440).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    /// Largest representable value, 23:59.
    pub const MAX_MINUTES: u32 = 1439;

    /// Creates a time of day from minutes since midnight.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTimeOfDay`] when `minutes` does not
    /// fall within a single day.
    pub fn from_minutes(minutes: u32) -> Result<Self, ValidationError> {
        if minutes > Self::MAX_MINUTES {
            return Err(ValidationError::InvalidTimeOfDay(minutes));
        }
        Ok(Self(minutes))
    }

    /// Midnight, 00:00.
    #[must_use]
    pub const fn midnight() -> Self {
        Self(0)
    }

    /// Hour component, 0-23.
    #[must_use]
    pub const fn hour(&self) -> u32 {
        self.0 / 60
    }

    /// Minute component, 0-59.
    #[must_use]
    pub const fn minute(&self) -> u32 {
        self.0 % 60
    }

    /// Minutes since midnight.
    #[must_use]
    pub const fn minutes(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

// ===== ChargingSlot =====

/// A single charging window.
///
/// Heaters hold two slots. The cloud marks a slot unused by reporting both
/// bounds as zero; [`ChargingSlot::from_wire_minutes`] maps that to `None`,
/// along with any slot whose end does not come after its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargingSlot {
    start: TimeOfDay,
    end: TimeOfDay,
}

impl ChargingSlot {
    /// Creates a charging window.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTimeOfDay`] when `end` is not
    /// strictly after `start`. The wire reuses the same minute encoding, so
    /// the offending end value is carried in the error.
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvalidTimeOfDay(end.minutes()));
        }
        Ok(Self { start, end })
    }

    /// Interprets a slot as reported by the cloud.
    ///
    /// Returns `None` for disabled slots (both bounds zero), for bounds past
    /// midnight, and for degenerate ranges.
    #[must_use]
    pub fn from_wire_minutes(start: u32, end: u32) -> Option<Self> {
        if start == 0 && end == 0 {
            return None;
        }
        let start = TimeOfDay::from_minutes(start).ok()?;
        let end = TimeOfDay::from_minutes(end).ok()?;
        Self::new(start, end).ok()
    }

    /// Start of the window.
    #[must_use]
    pub const fn start(&self) -> TimeOfDay {
        self.start
    }

    /// End of the window.
    #[must_use]
    pub const fn end(&self) -> TimeOfDay {
        self.end
    }
}

impl fmt::Display for ChargingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ===== ChargingSchedule =====

/// The full charging configuration of a zone.
///
/// `active_days` is Monday-first; a slot that is `None` is disabled.
///
/// # Examples
///
/// ```
/// use helki_lib::types::{ChargingSchedule, ChargingSlot};
///
/// let schedule = ChargingSchedule::new(
///     ChargingSlot::from_wire_minutes(120, 360),
///     None,
///     [true, true, true, true, true, false, false],
/// );
/// assert_eq!(schedule.slot_1().unwrap().to_string(), "02:00-06:00");
/// assert!(schedule.slot_2().is_none());
/// assert!(schedule.is_active_on(0));
/// assert!(!schedule.is_active_on(6));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargingSchedule {
    slot_1: Option<ChargingSlot>,
    slot_2: Option<ChargingSlot>,
    active_days: [bool; 7],
}

impl ChargingSchedule {
    /// Creates a schedule from its parts.
    #[must_use]
    pub const fn new(
        slot_1: Option<ChargingSlot>,
        slot_2: Option<ChargingSlot>,
        active_days: [bool; 7],
    ) -> Self {
        Self {
            slot_1,
            slot_2,
            active_days,
        }
    }

    /// First charging window, if enabled.
    #[must_use]
    pub const fn slot_1(&self) -> Option<ChargingSlot> {
        self.slot_1
    }

    /// Second charging window, if enabled.
    #[must_use]
    pub const fn slot_2(&self) -> Option<ChargingSlot> {
        self.slot_2
    }

    /// Active days, Monday-first.
    #[must_use]
    pub const fn active_days(&self) -> [bool; 7] {
        self.active_days
    }

    /// Whether charging runs on the given day, 0 = Monday.
    ///
    /// Out-of-range day indices read as inactive.
    #[must_use]
    pub fn is_active_on(&self, day: usize) -> bool {
        self.active_days.get(day).copied().unwrap_or(false)
    }
}
