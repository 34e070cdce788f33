// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One websocket session, from dial to disconnect.
//!
//! A session dials the socket endpoint with a bearer token, completes the
//! Engine.IO handshake, joins the vendor namespace, and requests a full
//! snapshot. After that it pumps frames: inbound events flow into the
//! store, outbound commands are encoded onto the wire, and ping, keepalive
//! and liveness timers keep the server talking. The coordinator decides
//! what to do with the [`SessionOutcome`] this module reports back.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::auth::AccessToken;
use crate::config::CloudConfig;
use crate::error::{Error, ProtocolError, TransportError};
use crate::event::BridgeEvent;
use crate::protocol::socketio::{self, Handshake, Packet, SocketMessage};
use crate::telemetry::{self, PushEvent};
use crate::types::{DeviceId, ZoneKey};

use super::connection::ConnectionState;
use super::coordinator::{CommandFrame, Shared};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Event requesting a full snapshot of every node on the hub.
const DEV_DATA_EVENT: &str = "dev_data";

/// Event carrying a control write to the hub.
const WRITE_EVENT: &str = "write";

/// Deadline for dial, handshake and namespace join together.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Floor for the server-announced ping interval.
const MIN_PING_INTERVAL: Duration = Duration::from_secs(1);

// ===== Outcome =====

/// Why a session ended.
#[derive(Debug)]
pub(crate) enum SessionOutcome {
    /// The session ran its course: the server closed it or it went quiet.
    /// `subscribed` records whether the first snapshot was reached.
    Expired { subscribed: bool },

    /// The server rejected the session in a way that points at the token.
    Invalidated,

    /// The transport or protocol failed outright.
    Failed(Error),

    /// The coordinator asked the session to stop.
    Stopped,
}

// ===== Entry point =====

/// Runs one session to completion.
pub(crate) async fn run(
    shared: &Shared,
    token: &AccessToken,
    commands: &mut mpsc::Receiver<CommandFrame>,
) -> SessionOutcome {
    let handshake_phase = timeout(HANDSHAKE_TIMEOUT, connect(shared, token));
    let (socket, handshake) = tokio::select! {
        biased;
        () = shared.cancel.cancelled() => return SessionOutcome::Stopped,
        result = handshake_phase => match result {
            Ok(Ok(ready)) => ready,
            Ok(Err(outcome)) => return outcome,
            Err(_elapsed) => {
                return SessionOutcome::Failed(TransportError::HandshakeTimeout.into());
            }
        },
    };

    pump(shared, socket, &handshake, commands).await
}

// ===== Handshake =====

/// Dials the socket and walks it to the authenticated state.
///
/// On failure the terminal [`SessionOutcome`] is returned as the error, so
/// the caller can hand it straight back to the coordinator.
async fn connect(
    shared: &Shared,
    token: &AccessToken,
) -> Result<(Socket, Handshake), SessionOutcome> {
    let url = socket_url(shared.session.config(), token, &shared.device);
    debug!(device = %shared.device, "opening realtime connection");

    let (mut socket, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|err| SessionOutcome::Failed(TransportError::WebSocket(err).into()))?;

    // The server speaks first: an open packet with the ping cadence.
    let frame = read_text(&mut socket).await.map_err(SessionOutcome::Failed)?;
    let handshake = match socketio::parse(&frame) {
        Ok(Packet::Open(handshake)) => handshake,
        Ok(_) => {
            return Err(SessionOutcome::Failed(
                ProtocolError::UnexpectedPacket {
                    phase: "handshake",
                    packet: frame,
                }
                .into(),
            ));
        }
        Err(err) => return Err(SessionOutcome::Failed(err.into())),
    };
    trace!(sid = %handshake.sid, "engine session open");

    let query = format!(
        "token={}&dev_id={}",
        urlencoding::encode(token.secret()),
        urlencoding::encode(shared.device.as_str()),
    );
    send_text(&mut socket, socketio::encode_connect(socketio::NAMESPACE, &query))
        .await
        .map_err(SessionOutcome::Failed)?;

    await_namespace_ack(&mut socket).await?;
    shared.set_state(ConnectionState::Authenticated, None);

    Ok((socket, handshake))
}

/// Waits for the namespace connect acknowledgment.
///
/// A namespace error here means the server did not accept the token for
/// this device, which is reported as [`SessionOutcome::Invalidated`].
async fn await_namespace_ack(socket: &mut Socket) -> Result<(), SessionOutcome> {
    loop {
        let frame = read_text(socket).await.map_err(SessionOutcome::Failed)?;
        match socketio::parse(&frame) {
            Ok(Packet::Message(SocketMessage::Connect { namespace })) => {
                debug!(namespace, "namespace joined");
                return Ok(());
            }
            Ok(Packet::Message(SocketMessage::Error { payload, .. })) => {
                warn!(payload = %payload, "namespace join rejected");
                return Err(SessionOutcome::Invalidated);
            }
            Ok(Packet::Ping) => {
                send_text(socket, socketio::PONG.to_string())
                    .await
                    .map_err(SessionOutcome::Failed)?;
            }
            Ok(Packet::Close) => {
                return Err(SessionOutcome::Failed(TransportError::HandshakeClosed.into()));
            }
            Ok(other) => {
                debug!(packet = ?other, "ignoring packet while joining namespace");
            }
            Err(err) => {
                warn!(error = %err, "malformed frame while joining namespace");
                return Err(SessionOutcome::Failed(err.into()));
            }
        }
    }
}

// ===== Pump =====

/// What the pump should do after one inbound frame.
enum FrameAction {
    /// Keep pumping.
    Continue,
    /// Keep pumping; the frame carried zone data.
    Data,
    /// The session is over.
    End(SessionOutcome),
}

#[allow(clippy::too_many_lines)]
async fn pump(
    shared: &Shared,
    mut socket: Socket,
    handshake: &Handshake,
    commands: &mut mpsc::Receiver<CommandFrame>,
) -> SessionOutcome {
    let snapshot_request = match socketio::encode_event(socketio::NAMESPACE, DEV_DATA_EVENT, None)
    {
        Ok(frame) => frame,
        Err(err) => return SessionOutcome::Failed(err.into()),
    };
    if let Err(err) = send_text(&mut socket, snapshot_request.clone()).await {
        return SessionOutcome::Failed(err);
    }

    let ping_interval = Duration::from_millis(handshake.ping_interval).max(MIN_PING_INTERVAL);
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let keepalive_interval = shared.config.keepalive_interval();
    let mut keepalive = interval_at(Instant::now() + keepalive_interval, keepalive_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_activity = Instant::now();
    let mut last_data = Instant::now();
    let mut subscribed = false;

    loop {
        let idle_deadline = last_activity + shared.config.idle_timeout();
        let stale_deadline = last_data + shared.config.stale_timeout();

        tokio::select! {
            biased;

            () = shared.cancel.cancelled() => {
                let _ = socket.close(None).await;
                return SessionOutcome::Stopped;
            }

            frame = socket.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    last_activity = Instant::now();
                    match handle_frame(shared, &mut socket, &text, &mut subscribed).await {
                        FrameAction::Continue => {}
                        FrameAction::Data => last_data = Instant::now(),
                        FrameAction::End(outcome) => return outcome,
                    }
                }
                Some(Ok(WsMessage::Ping(_))) => {
                    // tungstenite answers the pong itself.
                    last_activity = Instant::now();
                }
                Some(Ok(WsMessage::Pong(_))) => {
                    last_activity = Instant::now();
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "server closed the websocket");
                    return SessionOutcome::Expired { subscribed };
                }
                Some(Ok(_)) => {
                    // Binary frames are not part of this dialect.
                }
                Some(Err(err)) => {
                    return SessionOutcome::Failed(TransportError::WebSocket(err).into());
                }
                None => return SessionOutcome::Expired { subscribed },
            },

            command = commands.recv() => match command {
                Some(frame) if subscribed => {
                    debug!(path = %frame.path, "sending command");
                    let payload = json!({ "path": frame.path, "body": frame.body });
                    match socketio::encode_event(socketio::NAMESPACE, WRITE_EVENT, Some(&payload)) {
                        Ok(encoded) => {
                            if let Err(err) = send_text(&mut socket, encoded).await {
                                return SessionOutcome::Failed(err);
                            }
                        }
                        Err(err) => warn!(error = %err, "failed to encode command"),
                    }
                }
                Some(frame) => {
                    warn!(path = %frame.path, "dropping command; session not subscribed");
                }
                None => return SessionOutcome::Stopped,
            },

            _ = ping.tick() => {
                trace!("ping");
                if let Err(err) = send_text(&mut socket, socketio::PING.to_string()).await {
                    return SessionOutcome::Failed(err);
                }
            }

            _ = keepalive.tick(), if subscribed => {
                trace!("requesting keepalive snapshot");
                if let Err(err) = send_text(&mut socket, snapshot_request.clone()).await {
                    return SessionOutcome::Failed(err);
                }
            }

            () = sleep_until(idle_deadline) => {
                debug!("connection idle; treating as session expiry");
                let _ = socket.close(None).await;
                return SessionOutcome::Expired { subscribed };
            }

            () = sleep_until(stale_deadline), if subscribed => {
                warn!("no zone data for too long; recycling the connection");
                let _ = socket.close(None).await;
                return SessionOutcome::Expired { subscribed };
            }
        }
    }
}

// ===== Frame handling =====

async fn handle_frame(
    shared: &Shared,
    socket: &mut Socket,
    text: &str,
    subscribed: &mut bool,
) -> FrameAction {
    // A frame the codec cannot read means the connection is not speaking
    // the dialect anymore; recycle it rather than guess.
    let packet = match socketio::parse(text) {
        Ok(packet) => packet,
        Err(err) => {
            warn!(error = %err, frame = text, "unparseable frame; recycling the connection");
            return FrameAction::End(SessionOutcome::Failed(err.into()));
        }
    };

    match packet {
        Packet::Ping => {
            trace!("pong");
            match send_text(socket, socketio::PONG.to_string()).await {
                Ok(()) => FrameAction::Continue,
                Err(err) => FrameAction::End(SessionOutcome::Failed(err)),
            }
        }
        Packet::Pong | Packet::Noop | Packet::Open(_) => FrameAction::Continue,
        Packet::Close => {
            debug!("server ended the engine session");
            FrameAction::End(SessionOutcome::Expired {
                subscribed: *subscribed,
            })
        }
        Packet::Message(message) => handle_message(shared, message, subscribed),
    }
}

fn handle_message(shared: &Shared, message: SocketMessage, subscribed: &mut bool) -> FrameAction {
    match message {
        SocketMessage::Connect { namespace } => {
            debug!(namespace, "late namespace acknowledgment");
            FrameAction::Continue
        }
        SocketMessage::Disconnect { namespace } => {
            info!(namespace, "server left the namespace");
            FrameAction::End(SessionOutcome::Expired {
                subscribed: *subscribed,
            })
        }
        SocketMessage::Error { payload, .. } => {
            if indicates_invalid_session(&payload) {
                warn!(payload = %payload, "session invalidated by the server");
                FrameAction::End(SessionOutcome::Invalidated)
            } else {
                warn!(payload = %payload, "server reported an error");
                FrameAction::Continue
            }
        }
        SocketMessage::Event {
            namespace,
            name,
            payload,
        } => {
            if namespace != socketio::NAMESPACE && namespace != "/" {
                debug!(namespace, event = %name, "ignoring event from another namespace");
                return FrameAction::Continue;
            }
            handle_event(shared, &name, &payload, subscribed)
        }
    }
}

fn handle_event(
    shared: &Shared,
    name: &str,
    payload: &Value,
    subscribed: &mut bool,
) -> FrameAction {
    match telemetry::classify(name, payload) {
        PushEvent::Snapshot(zones) => {
            let changed = shared.store.apply_snapshot(&shared.device, zones);
            debug!(changed = changed.len(), "snapshot applied");
            for zone in changed {
                shared.events.publish(BridgeEvent::zone_updated(zone));
            }
            if !*subscribed {
                *subscribed = true;
                shared.set_state(ConnectionState::Subscribed, None);
            }
            shared.set_availability(true);
            FrameAction::Data
        }
        PushEvent::Patch { addr, patch } => {
            let key = ZoneKey::new(shared.device.clone(), addr);
            if shared.store.apply_patch(&key, &patch) {
                shared.events.publish(BridgeEvent::zone_updated(key));
            }
            FrameAction::Data
        }
        PushEvent::HubLink(linked) => {
            debug!(linked, "hub reported its cloud link");
            FrameAction::Data
        }
        PushEvent::Ignored => FrameAction::Continue,
    }
}

/// Guesses whether an error payload means the session token is dead.
///
/// The server does not tag its errors; anything that mentions the token or
/// authorization is treated as worth a fresh token on reconnect.
fn indicates_invalid_session(payload: &Value) -> bool {
    let text = payload.to_string().to_ascii_lowercase();
    ["token", "auth", "unauthorized", "session"]
        .iter()
        .any(|needle| text.contains(needle))
}

// ===== Socket helpers =====

fn socket_url(config: &CloudConfig, token: &AccessToken, device: &DeviceId) -> String {
    format!(
        "{}/socket.io/?token={}&dev_id={}&EIO=3&transport=websocket",
        config.socket_base(),
        urlencoding::encode(token.secret()),
        urlencoding::encode(device.as_str()),
    )
}

async fn send_text(socket: &mut Socket, frame: String) -> Result<(), Error> {
    socket
        .send(WsMessage::text(frame))
        .await
        .map_err(|err| TransportError::WebSocket(err).into())
}

/// Reads the next text frame, skipping websocket control frames.
async fn read_text(socket: &mut Socket) -> Result<String, Error> {
    loop {
        match socket.next().await {
            Some(Ok(WsMessage::Text(text))) => return Ok(text.to_string()),
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(TransportError::HandshakeClosed.into());
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(TransportError::WebSocket(err).into()),
        }
    }
}
