// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Heater control commands.
//!
//! All control flows through [`CommandDispatcher`]; there is no other write
//! path. Each operation validates locally, is sent over the realtime
//! channel, and lands optimistically in the store until the next push from
//! the cloud confirms or corrects it.
//!
//! # Operations
//!
//! | Operation | Validation | Wire fields |
//! |-----------|------------|-------------|
//! | [`set_target_temperature`] | 5.0 to 30.0 °C, half-degree steps | `stemp`, `units`, `mode` |
//! | [`set_mode`] | [`HeaterMode`] enum | `mode` |
//! | [`set_preset`] | per [`PresetKind`] range | `ice_temp`/`eco_temp`/`comf_temp`, `units` |
//!
//! [`set_target_temperature`]: CommandDispatcher::set_target_temperature
//! [`set_mode`]: CommandDispatcher::set_mode
//! [`set_preset`]: CommandDispatcher::set_preset
//! [`HeaterMode`]: crate::types::HeaterMode
//! [`PresetKind`]: crate::types::PresetKind

mod dispatcher;

pub use dispatcher::CommandDispatcher;
