// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Electrical power ratings reported by a heater.

use std::fmt;

/// Factory power ratings of a heater, in watts.
///
/// Storage heaters report the wattage of the ceramic accumulator core and,
/// on combi models, of the direct emitter element. These come from the
/// heater's setup payload as strings that may be empty, so both components
/// are optional and never change at runtime.
///
/// # Examples
///
/// ```
/// use helki_lib::types::PowerRatings;
///
/// let ratings = PowerRatings::from_wire(Some("1300"), Some("500"));
/// assert_eq!(ratings.accumulator_watts(), Some(1300));
/// assert_eq!(ratings.to_string(), "1300W (emitter: 500W)");
///
/// let unknown = PowerRatings::from_wire(Some(""), None);
/// assert!(unknown.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerRatings {
    accumulator: Option<u32>,
    emitter: Option<u32>,
}

impl PowerRatings {
    /// Creates ratings from already-parsed wattages.
    #[must_use]
    pub const fn new(accumulator: Option<u32>, emitter: Option<u32>) -> Self {
        Self {
            accumulator,
            emitter,
        }
    }

    /// Parses the wire representation, where each value is a decimal string
    /// that may be absent or empty.
    #[must_use]
    pub fn from_wire(accumulator: Option<&str>, emitter: Option<&str>) -> Self {
        Self {
            accumulator: accumulator.and_then(parse_watts),
            emitter: emitter.and_then(parse_watts),
        }
    }

    /// Wattage of the accumulator core, if reported.
    #[must_use]
    pub const fn accumulator_watts(&self) -> Option<u32> {
        self.accumulator
    }

    /// Wattage of the direct emitter element, if reported.
    #[must_use]
    pub const fn emitter_watts(&self) -> Option<u32> {
        self.emitter
    }

    /// Whether neither rating was reported.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.accumulator.is_none() && self.emitter.is_none()
    }
}

fn parse_watts(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse().ok()
}

impl fmt::Display for PowerRatings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.accumulator, self.emitter) {
            (Some(acc), Some(emit)) => write!(f, "{acc}W (emitter: {emit}W)"),
            (Some(acc), None) => write!(f, "{acc}W"),
            (None, Some(emit)) => write!(f, "emitter: {emit}W"),
            (None, None) => write!(f, "unknown"),
        }
    }
}
