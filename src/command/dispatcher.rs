// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validated control writes.
//!
//! [`CommandDispatcher`] is the only way callers change heater state. Every
//! operation validates its value locally, refuses zones the store has never
//! seen, and hands a frame to the realtime coordinator for transmission.
//! On success the store is patched optimistically so the new value shows up
//! in reads immediately; the next authoritative push for the zone settles
//! what the heater actually accepted.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::{BridgeEvent, EventBus};
use crate::realtime::{CommandFrame, RealtimeCoordinator};
use crate::state::{DeviceStateStore, ZonePatch};
use crate::types::{
    HeaterMode, PresetKind, PresetTemperature, TargetTemperature, ZoneAddr, ZoneKey,
};

/// Issues control writes for zones known to the store.
///
/// Commands are fire-and-forget toward the cloud: the dispatcher neither
/// queues across reconnects nor waits for confirmation. If the realtime
/// channel is not subscribed the call fails immediately and the store is
/// left untouched.
///
/// # Examples
///
/// ```no_run
/// use helki_lib::Bridge;
///
/// # async fn run() -> Result<(), helki_lib::Error> {
/// let bridge = Bridge::builder("user@example.com", "secret").connect().await?;
/// let zone = bridge.store().zones()[0].clone();
///
/// bridge.dispatcher().set_target_temperature(&zone, 21.5)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CommandDispatcher {
    coordinator: Arc<RealtimeCoordinator>,
    store: Arc<DeviceStateStore>,
    events: EventBus,
}

impl CommandDispatcher {
    pub(crate) fn new(
        coordinator: Arc<RealtimeCoordinator>,
        store: Arc<DeviceStateStore>,
        events: EventBus,
    ) -> Self {
        Self {
            coordinator,
            store,
            events,
        }
    }

    /// Sets the target temperature of a zone.
    ///
    /// The heater treats a direct setpoint as manual control, so the zone's
    /// mode moves to [`HeaterMode::Manual`] along with the temperature.
    /// Values are snapped to the panel's half-degree steps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `celsius` is outside [5.0, 30.0],
    /// [`Error::ZoneNotFound`] for a zone the store has never seen, and
    /// [`Error::NotConnected`] when the realtime channel is not subscribed.
    pub fn set_target_temperature(&self, zone: &ZoneKey, celsius: f64) -> Result<()> {
        let target = TargetTemperature::new(celsius)?;
        self.ensure_zone(zone)?;
        self.transmit(zone, target_body(target))?;

        debug!(zone = %zone, target = %target, "target temperature set");
        self.apply_optimistic(
            zone,
            ZonePatch {
                mode: Some(HeaterMode::Manual),
                target_temperature: Some(target.celsius()),
                ..ZonePatch::default()
            },
        );
        Ok(())
    }

    /// Sets the operating mode of a zone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZoneNotFound`] for a zone the store has never seen
    /// and [`Error::NotConnected`] when the realtime channel is not
    /// subscribed.
    pub fn set_mode(&self, zone: &ZoneKey, mode: HeaterMode) -> Result<()> {
        self.ensure_zone(zone)?;
        self.transmit(zone, mode_body(mode))?;

        debug!(zone = %zone, %mode, "mode set");
        self.apply_optimistic(
            zone,
            ZonePatch {
                mode: Some(mode),
                ..ZonePatch::default()
            },
        );
        Ok(())
    }

    /// Sets one of a zone's preset setpoints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `celsius` is outside the range for
    /// `kind` (anti-frost [5, 15], economy and comfort [7, 30]),
    /// [`Error::ZoneNotFound`] for a zone the store has never seen, and
    /// [`Error::NotConnected`] when the realtime channel is not subscribed.
    pub fn set_preset(&self, zone: &ZoneKey, kind: PresetKind, celsius: f64) -> Result<()> {
        let preset = PresetTemperature::new(kind, celsius)?;
        self.ensure_zone(zone)?;
        self.transmit(zone, preset_body(preset))?;

        debug!(zone = %zone, preset = %preset, "preset set");
        let mut patch = ZonePatch::default();
        match kind {
            PresetKind::AntiFrost => patch.anti_frost_temperature = Some(preset.celsius()),
            PresetKind::Economy => patch.economy_temperature = Some(preset.celsius()),
            PresetKind::Comfort => patch.comfort_temperature = Some(preset.celsius()),
        }
        self.apply_optimistic(zone, patch);
        Ok(())
    }

    fn ensure_zone(&self, zone: &ZoneKey) -> Result<()> {
        if self.store.contains(zone) {
            Ok(())
        } else {
            Err(Error::ZoneNotFound)
        }
    }

    fn transmit(&self, zone: &ZoneKey, body: Value) -> Result<()> {
        self.coordinator.send_command(CommandFrame {
            path: command_path(zone.addr()),
            body,
        })
    }

    fn apply_optimistic(&self, zone: &ZoneKey, patch: ZonePatch) {
        if self.store.apply_patch(zone, &patch) {
            self.events.publish(BridgeEvent::zone_updated(zone.clone()));
        }
    }
}

// ===== Frame construction =====

fn command_path(addr: ZoneAddr) -> String {
    format!("/acm/{addr}/status")
}

fn target_body(target: TargetTemperature) -> Value {
    let mut body = Map::new();
    body.insert("stemp".to_string(), Value::String(target.to_wire()));
    body.insert("units".to_string(), Value::String("C".to_string()));
    body.insert(
        "mode".to_string(),
        Value::String(HeaterMode::Manual.as_wire().to_string()),
    );
    Value::Object(body)
}

fn mode_body(mode: HeaterMode) -> Value {
    let mut body = Map::new();
    body.insert("mode".to_string(), Value::String(mode.as_wire().to_string()));
    Value::Object(body)
}

fn preset_body(preset: PresetTemperature) -> Value {
    let mut body = Map::new();
    body.insert(
        preset.kind().wire_key().to_string(),
        Value::String(preset.to_wire()),
    );
    body.insert("units".to_string(), Value::String("C".to_string()));
    Value::Object(body)
}
