// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classification of inbound realtime events.
//!
//! The cloud pushes two event kinds: `dev_data` with the full node list,
//! and `update` with one subtree of one zone addressed by a path such as
//! `/acm/2/status`. Everything else is ignored for forward compatibility.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::state::ZonePatch;
use crate::types::ZoneAddr;

use super::node::{DevDataPayload, ZoneSetup, ZoneStatus};

/// An inbound event reduced to what the store needs.
#[derive(Debug)]
pub(crate) enum PushEvent {
    /// Full-state push; replaces the affected zones wholesale.
    Snapshot(Vec<(ZoneAddr, ZonePatch)>),
    /// Incremental update of one zone.
    Patch { addr: ZoneAddr, patch: ZonePatch },
    /// The hub reported its own cloud link state.
    HubLink(bool),
    /// Unknown or malformed; already logged, nothing to apply.
    Ignored,
}

/// Classifies one named event from the realtime channel.
pub(crate) fn classify(name: &str, payload: &Value) -> PushEvent {
    match name {
        "dev_data" => classify_dev_data(payload),
        "update" => classify_update(payload),
        other => {
            debug!(event = other, "ignoring unknown event");
            PushEvent::Ignored
        }
    }
}

fn classify_dev_data(payload: &Value) -> PushEvent {
    let data = match DevDataPayload::deserialize(payload) {
        Ok(data) => data,
        Err(err) => {
            warn!(error = %err, "malformed dev_data payload");
            return PushEvent::Ignored;
        }
    };

    let mut zones = Vec::with_capacity(data.nodes.len());
    for node in &data.nodes {
        let addr = match node.addr.map(ZoneAddr::from_raw) {
            Some(Ok(addr)) => addr,
            Some(Err(_)) | None => {
                warn!(addr = ?node.addr, "skipping node without a usable address");
                continue;
            }
        };
        zones.push((addr, node.to_patch()));
    }
    PushEvent::Snapshot(zones)
}

fn classify_update(payload: &Value) -> PushEvent {
    let Some(path) = payload.get("path").and_then(Value::as_str) else {
        warn!("update event without a path");
        return PushEvent::Ignored;
    };
    let body = payload.get("body").unwrap_or(&Value::Null);

    if path.ends_with("/connected") || path == "/connected" {
        return classify_hub_link(path, body);
    }

    // Zone paths look like /acm/2/status; a missing subtree means status.
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() < 3 || parts[1] != "acm" {
        debug!(path, "ignoring update for unhandled path");
        return PushEvent::Ignored;
    }
    let addr = match parts[2].parse::<i64>().map(ZoneAddr::from_raw) {
        Ok(Ok(addr)) => addr,
        _ => {
            warn!(path, "update path without a usable zone address");
            return PushEvent::Ignored;
        }
    };

    match parts.get(3).copied().unwrap_or("status") {
        "status" => match ZoneStatus::deserialize(body) {
            Ok(status) => PushEvent::Patch {
                addr,
                patch: status.to_patch(),
            },
            Err(err) => {
                warn!(path, error = %err, "malformed status update body");
                PushEvent::Ignored
            }
        },
        "setup" => match ZoneSetup::deserialize(body) {
            Ok(setup) => PushEvent::Patch {
                addr,
                patch: setup.to_patch(),
            },
            Err(err) => {
                warn!(path, error = %err, "malformed setup update body");
                PushEvent::Ignored
            }
        },
        subtree => {
            debug!(path, subtree, "ignoring update for unhandled subtree");
            PushEvent::Ignored
        }
    }
}

fn classify_hub_link(path: &str, body: &Value) -> PushEvent {
    let linked = body
        .as_bool()
        .or_else(|| body.get("connected").and_then(Value::as_bool));
    match linked {
        Some(linked) => PushEvent::HubLink(linked),
        None => {
            debug!(path, "connected update without a boolean body");
            PushEvent::Ignored
        }
    }
}
