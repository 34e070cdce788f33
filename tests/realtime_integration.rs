// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the realtime channel against an in-process
//! socket.io server, with wiremock standing in for the token endpoint.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helki_lib::types::{DeviceId, ZoneAddr, ZoneKey};
use helki_lib::{
    AuthSession, Bridge, BridgeEvent, CloudConfig, ConnectionState, DeviceStateStore, Error,
    EventBus, HeaterMode, RealtimeCoordinator, ReconnectConfig,
};

const NAMESPACE: &str = "/api/v2/socket_io";
const OPEN_FRAME: &str = r#"0{"sid":"s1","pingInterval":25000,"pingTimeout":60000}"#;

// ============================================================================
// In-process socket.io server
// ============================================================================

/// One accepted client connection, seen as plain text frames.
struct ServerConn {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<Message>,
}

impl ServerConn {
    async fn recv(&mut self) -> String {
        timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("connection task ended")
    }

    fn send(&self, frame: impl Into<String>) {
        self.tx
            .send(Message::text(frame.into()))
            .expect("connection task ended");
    }

    fn close(&self) {
        self.tx
            .send(Message::Close(None))
            .expect("connection task ended");
    }

    /// Serves the engine open, namespace join and initial snapshot
    /// exchange. Returns the client's namespace connect frame so tests
    /// can inspect the query it carried.
    async fn serve_handshake(&mut self, nodes: serde_json::Value) -> String {
        self.send(OPEN_FRAME);

        let connect = self.recv().await;
        assert!(
            connect.starts_with(&format!("40{NAMESPACE}?token=")),
            "unexpected connect frame: {connect}"
        );
        assert!(connect.contains("dev_id="), "connect frame without dev_id");
        self.send(format!("40{NAMESPACE},"));

        let request = self.recv().await;
        assert_eq!(request, format!("42{NAMESPACE},[\"dev_data\"]"));
        self.send(event_frame("dev_data", &json!({ "nodes": nodes })));

        connect
    }
}

fn event_frame(name: &str, payload: &serde_json::Value) -> String {
    format!(
        "42{NAMESPACE},{}",
        serde_json::to_string(&(name, payload)).unwrap()
    )
}

/// Starts a websocket listener that yields one [`ServerConn`] per accepted
/// client. Connections are served one at a time so reconnect tests see
/// them in order.
async fn spawn_socket_server() -> (String, mpsc::UnboundedReceiver<ServerConn>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(socket) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            if conn_tx.send(ServerConn { rx: in_rx, tx: out_tx }).is_err() {
                break;
            }
            pump_connection(socket, in_tx, out_rx).await;
        }
    });

    (format!("ws://{addr}"), conn_rx)
}

async fn pump_connection(
    socket: WebSocketStream<TcpStream>,
    in_tx: mpsc::UnboundedSender<String>,
    mut out_rx: mpsc::UnboundedReceiver<Message>,
) {
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    // Engine pings are answered here so tests only ever
                    // see socket.io traffic.
                    if text.as_str() == "2" {
                        let _ = sink.send(Message::text("3")).await;
                    } else if in_tx.send(text.to_string()).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
            outbound = out_rx.recv() => match outbound {
                Some(Message::Close(frame)) => {
                    let _ = sink.send(Message::Close(frame)).await;
                    break;
                }
                Some(message) => {
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
}

// ============================================================================
// Shared fixtures
// ============================================================================

fn token_body(access: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": "rt-1",
        "expires_in": 3600,
    })
}

async fn mock_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/client/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1")))
        .mount(server)
        .await;
}

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig::new()
        .with_initial_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_millis(200))
}

struct Harness {
    coordinator: Arc<RealtimeCoordinator>,
    store: Arc<DeviceStateStore>,
    events: EventBus,
}

/// Builds an unstarted coordinator for hub `dev-1`; tests subscribe to
/// whatever they need and then call `start` themselves.
fn build_harness(rest_uri: String, socket_base: String) -> Harness {
    let config = CloudConfig::new("user@example.com", "secret")
        .with_api_base(rest_uri)
        .with_socket_base(socket_base);
    let session = Arc::new(AuthSession::new(config).unwrap());
    let store = Arc::new(DeviceStateStore::new());
    let events = EventBus::new();
    let coordinator = Arc::new(RealtimeCoordinator::new(
        session,
        Arc::clone(&store),
        events.clone(),
        DeviceId::new("dev-1"),
        fast_reconnect(),
    ));
    Harness {
        coordinator,
        store,
        events,
    }
}

async fn accept_conn(conns: &mut mpsc::UnboundedReceiver<ServerConn>) -> ServerConn {
    timeout(Duration::from_secs(10), conns.recv())
        .await
        .expect("timed out waiting for a client connection")
        .expect("server task ended")
}

async fn wait_for_state(
    states: &mut watch::Receiver<ConnectionState>,
    want: impl Fn(ConnectionState) -> bool,
) {
    timeout(Duration::from_secs(10), states.wait_for(|state| want(*state)))
        .await
        .expect("timed out waiting for a connection state")
        .expect("state channel closed");
}

async fn next_event(events: &mut broadcast::Receiver<BridgeEvent>) -> BridgeEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a bridge event")
        .expect("event bus closed")
}

fn zone_key(addr: u16) -> ZoneKey {
    ZoneKey::new(DeviceId::new("dev-1"), ZoneAddr::new(addr))
}

// ============================================================================
// RealtimeCoordinator Tests
// ============================================================================

mod coordinator_flow {
    use super::*;

    #[tokio::test]
    async fn snapshot_populates_store_and_subscribes() {
        let rest = MockServer::start().await;
        mock_token(&rest).await;
        let (socket_base, mut conns) = spawn_socket_server().await;

        let harness = build_harness(rest.uri(), socket_base);
        let mut states = harness.coordinator.state_changes();
        harness.coordinator.start();

        let mut conn = accept_conn(&mut conns).await;
        conn.serve_handshake(json!([
            {
                "addr": 2,
                "name": "Living room",
                "status": {
                    "stemp": "21.0",
                    "mtemp": "19.5",
                    "mode": "auto",
                    "heating": true
                }
            },
            { "addr": 3, "status": { "stemp": "18.0" } }
        ]))
        .await;

        wait_for_state(&mut states, |s| s == ConnectionState::Subscribed).await;

        let zone = harness.store.read(&zone_key(2)).expect("zone in store");
        assert_eq!(zone.name(), Some("Living room"));
        assert_eq!(zone.target_temperature(), Some(21.0));
        assert_eq!(zone.current_temperature(), Some(19.5));
        assert_eq!(zone.mode(), Some(HeaterMode::Auto));
        assert_eq!(zone.heating(), Some(true));

        let device = DeviceId::new("dev-1");
        assert_eq!(harness.store.zones_for(&device).len(), 2);
        assert_eq!(harness.store.device_available(&device), Some(true));

        harness.coordinator.stop().await;
        assert!(harness.coordinator.state().is_closed());
    }

    #[tokio::test]
    async fn updates_patch_the_store_and_publish_events() {
        let rest = MockServer::start().await;
        mock_token(&rest).await;
        let (socket_base, mut conns) = spawn_socket_server().await;

        let harness = build_harness(rest.uri(), socket_base);
        let mut states = harness.coordinator.state_changes();
        harness.coordinator.start();

        let mut conn = accept_conn(&mut conns).await;
        conn.serve_handshake(json!([
            { "addr": 2, "status": { "stemp": "21.0", "mode": "auto" } }
        ]))
        .await;
        wait_for_state(&mut states, |s| s == ConnectionState::Subscribed).await;

        let mut events = harness.events.subscribe();

        // Frames the pump must tolerate without dropping the session.
        conn.send(event_frame("ping_stats", &json!({})));
        conn.send(event_frame("update", &json!({ "path": "/connected", "body": true })));
        conn.send(event_frame(
            "update",
            &json!({ "path": "/htr/2/status", "body": { "stemp": "25.0" } }),
        ));

        // The real patch arrives after them.
        conn.send(event_frame(
            "update",
            &json!({ "path": "/acm/2/status", "body": { "stemp": "22.5", "charge_level": 4 } }),
        ));

        let event = next_event(&mut events).await;
        match event {
            BridgeEvent::ZoneUpdated { zone } => assert_eq!(zone, zone_key(2)),
            other => panic!("expected a zone update, got {other:?}"),
        }

        let zone = harness.store.read(&zone_key(2)).expect("zone in store");
        assert_eq!(zone.target_temperature(), Some(22.5));
        assert_eq!(zone.charge_level(), Some(4));
        // Untouched fields survive the merge.
        assert_eq!(zone.mode(), Some(HeaterMode::Auto));

        harness.coordinator.stop().await;
    }

    #[tokio::test]
    async fn lifecycle_events_are_published_in_order() {
        let rest = MockServer::start().await;
        mock_token(&rest).await;
        let (socket_base, mut conns) = spawn_socket_server().await;

        let harness = build_harness(rest.uri(), socket_base);
        let mut events = harness.events.subscribe();
        harness.coordinator.start();

        let mut conn = accept_conn(&mut conns).await;
        conn.serve_handshake(json!([
            { "addr": 2, "status": { "stemp": "21.0" } }
        ]))
        .await;

        assert!(matches!(
            next_event(&mut events).await,
            BridgeEvent::ConnectionChanged { state: ConnectionState::Connecting, .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            BridgeEvent::ConnectionChanged { state: ConnectionState::Authenticated, .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            BridgeEvent::ZoneUpdated { .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            BridgeEvent::ConnectionChanged { state: ConnectionState::Subscribed, .. }
        ));

        harness.coordinator.stop().await;
    }

    #[tokio::test]
    async fn reconnects_after_a_server_close() {
        let rest = MockServer::start().await;
        mock_token(&rest).await;
        let (socket_base, mut conns) = spawn_socket_server().await;

        let harness = build_harness(rest.uri(), socket_base);
        let mut states = harness.coordinator.state_changes();
        harness.coordinator.start();

        let mut conn = accept_conn(&mut conns).await;
        conn.serve_handshake(json!([
            { "addr": 2, "status": { "stemp": "21.0" } }
        ]))
        .await;
        wait_for_state(&mut states, |s| s == ConnectionState::Subscribed).await;

        conn.close();
        wait_for_state(&mut states, |s| {
            matches!(s, ConnectionState::Reconnecting { .. })
        })
        .await;

        let mut second = accept_conn(&mut conns).await;
        second
            .serve_handshake(json!([
                { "addr": 2, "status": { "stemp": "20.5" } }
            ]))
            .await;
        wait_for_state(&mut states, |s| s == ConnectionState::Subscribed).await;

        let device = DeviceId::new("dev-1");
        let zone = harness.store.read(&zone_key(2)).expect("zone in store");
        assert_eq!(zone.target_temperature(), Some(20.5));
        // Resubscription is idempotent: same zone, no duplicates.
        assert_eq!(harness.store.zones_for(&device), vec![zone_key(2)]);
        // A quick reconnect never marks the hub unavailable.
        assert_eq!(harness.store.device_available(&device), Some(true));

        harness.coordinator.stop().await;
    }

    #[tokio::test]
    async fn unparseable_frames_recycle_the_connection() {
        let rest = MockServer::start().await;
        mock_token(&rest).await;
        let (socket_base, mut conns) = spawn_socket_server().await;

        let harness = build_harness(rest.uri(), socket_base);
        let mut states = harness.coordinator.state_changes();
        harness.coordinator.start();

        let mut conn = accept_conn(&mut conns).await;
        conn.serve_handshake(json!([
            { "addr": 2, "status": { "stemp": "21.0" } }
        ]))
        .await;
        wait_for_state(&mut states, |s| s == ConnectionState::Subscribed).await;

        conn.send("this is not a packet");
        wait_for_state(&mut states, |s| {
            matches!(s, ConnectionState::Reconnecting { .. })
        })
        .await;

        let mut second = accept_conn(&mut conns).await;
        second
            .serve_handshake(json!([
                { "addr": 2, "status": { "stemp": "21.0" } }
            ]))
            .await;
        wait_for_state(&mut states, |s| s == ConnectionState::Subscribed).await;

        harness.coordinator.stop().await;
    }

    #[tokio::test]
    async fn stop_during_backoff_returns_promptly() {
        let rest = MockServer::start().await;
        mock_token(&rest).await;

        // A port with nothing listening: dials fail instantly and park the
        // coordinator in its backoff sleep.
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let socket_base = format!("ws://{}", closed.local_addr().unwrap());
        drop(closed);

        let config = CloudConfig::new("user@example.com", "secret")
            .with_api_base(rest.uri())
            .with_socket_base(socket_base);
        let session = Arc::new(AuthSession::new(config).unwrap());
        let coordinator = Arc::new(RealtimeCoordinator::new(
            session,
            Arc::new(DeviceStateStore::new()),
            EventBus::new(),
            DeviceId::new("dev-1"),
            ReconnectConfig::new().with_initial_delay(Duration::from_secs(30)),
        ));
        coordinator.start();
        tokio::time::sleep(Duration::from_millis(300)).await;

        timeout(Duration::from_secs(1), coordinator.stop())
            .await
            .expect("stop did not cancel the backoff timer");
        assert!(coordinator.state().is_closed());
    }

    #[tokio::test]
    async fn namespace_rejection_forces_a_token_refresh() {
        let rest = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/client/token"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1")))
            .mount(&rest)
            .await;
        Mock::given(method("POST"))
            .and(path("/client/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-2")))
            .expect(1)
            .mount(&rest)
            .await;
        let (socket_base, mut conns) = spawn_socket_server().await;

        let harness = build_harness(rest.uri(), socket_base);
        let mut states = harness.coordinator.state_changes();
        harness.coordinator.start();

        let mut conn = accept_conn(&mut conns).await;
        let first_connect = conn
            .serve_handshake(json!([
                { "addr": 2, "status": { "stemp": "21.0" } }
            ]))
            .await;
        assert!(first_connect.contains("token=at-1"));
        wait_for_state(&mut states, |s| s == ConnectionState::Subscribed).await;

        // The server revokes the session mid-flight.
        conn.send(format!("44{NAMESPACE},\"Invalid token\""));

        let mut second = accept_conn(&mut conns).await;
        let second_connect = second
            .serve_handshake(json!([
                { "addr": 2, "status": { "stemp": "21.0" } }
            ]))
            .await;
        assert!(
            second_connect.contains("token=at-2"),
            "reconnect reused the invalidated token: {second_connect}"
        );
        wait_for_state(&mut states, |s| s == ConnectionState::Subscribed).await;

        harness.coordinator.stop().await;
    }

    #[tokio::test]
    async fn rejected_credentials_close_the_channel() {
        let rest = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/client/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&rest)
            .await;

        // The socket is never dialed; any address will do.
        let harness = build_harness(rest.uri(), "ws://127.0.0.1:9".to_string());
        let mut states = harness.coordinator.state_changes();
        harness.coordinator.start();

        wait_for_state(&mut states, |s| s == ConnectionState::Closed).await;
        assert_eq!(
            harness.store.device_available(&DeviceId::new("dev-1")),
            Some(false)
        );
    }
}

// ============================================================================
// Bridge Tests
// ============================================================================

mod bridge_flow {
    use super::*;

    async fn mock_topology(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v2/grouped_devs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "h1",
                    "name": "Main house",
                    "devs": [{ "dev_id": "dev-1", "name": "Hub" }]
                }
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/devs/dev-1/mgr/nodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nodes": [{ "addr": 2, "name": "Living room", "type": "acm" }]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn bridge_discovers_subscribes_and_controls_a_zone() {
        let rest = MockServer::start().await;
        mock_token(&rest).await;
        mock_topology(&rest).await;
        let (socket_base, mut conns) = spawn_socket_server().await;

        let bridge = Bridge::builder("user@example.com", "secret")
            .with_api_base(rest.uri())
            .with_socket_base(socket_base)
            .with_reconnect(fast_reconnect())
            .connect()
            .await
            .unwrap();

        // Topology is in the store before any socket traffic.
        let zones = bridge.store().zones();
        assert_eq!(zones, vec![zone_key(2)]);
        assert_eq!(bridge.store().device_name(bridge.device()), Some("Hub".to_string()));

        let mut conn = accept_conn(&mut conns).await;
        conn.serve_handshake(json!([
            { "addr": 2, "status": { "stemp": "21.0", "mode": "auto" } }
        ]))
        .await;

        let mut states = bridge.state_changes();
        wait_for_state(&mut states, |s| s == ConnectionState::Subscribed).await;

        let zone = zones[0].clone();
        bridge.dispatcher().set_target_temperature(&zone, 22.0).unwrap();

        // The command reaches the wire as a namespace write event.
        let frame = conn.recv().await;
        assert!(
            frame.starts_with(&format!("42{NAMESPACE},[\"write\"")),
            "unexpected frame: {frame}"
        );
        assert!(frame.contains("\"path\":\"/acm/2/status\""));
        assert!(frame.contains("\"stemp\":\"22.0\""));
        assert!(frame.contains("\"mode\":\"modified_auto\""));

        // The optimistic patch shows up immediately.
        let optimistic = bridge.store().read(&zone).expect("zone in store");
        assert_eq!(optimistic.target_temperature(), Some(22.0));
        assert_eq!(optimistic.mode(), Some(HeaterMode::Manual));

        // The next authoritative push wins.
        let mut events = bridge.subscribe();
        conn.send(event_frame(
            "update",
            &json!({ "path": "/acm/2/status", "body": { "stemp": "19.0", "mode": "auto" } }),
        ));
        assert!(matches!(
            next_event(&mut events).await,
            BridgeEvent::ZoneUpdated { .. }
        ));
        let settled = bridge.store().read(&zone).expect("zone in store");
        assert_eq!(settled.target_temperature(), Some(19.0));
        assert_eq!(settled.mode(), Some(HeaterMode::Auto));

        bridge.shutdown().await;
        assert!(bridge.state().is_closed());
    }

    #[tokio::test]
    async fn commands_before_subscribe_are_rejected() {
        let rest = MockServer::start().await;
        mock_token(&rest).await;
        mock_topology(&rest).await;
        let (socket_base, _conns) = spawn_socket_server().await;

        let bridge = Bridge::builder("user@example.com", "secret")
            .with_api_base(rest.uri())
            .with_socket_base(socket_base)
            .with_reconnect(fast_reconnect())
            .connect()
            .await
            .unwrap();

        // The handshake has not been served, so the channel cannot be
        // subscribed yet.
        let zone = bridge.store().zones()[0].clone();
        let err = bridge
            .dispatcher()
            .set_target_temperature(&zone, 21.0)
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));

        // No optimistic write on a rejected command.
        let view = bridge.store().read(&zone).expect("zone in store");
        assert_eq!(view.target_temperature(), None);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn empty_account_fails_connect() {
        let rest = MockServer::start().await;
        mock_token(&rest).await;
        Mock::given(method("GET"))
            .and(path("/api/v2/grouped_devs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&rest)
            .await;

        let err = Bridge::builder("user@example.com", "secret")
            .with_api_base(rest.uri())
            .connect()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoDevices));
    }

    #[tokio::test]
    async fn pinned_device_must_exist() {
        let rest = MockServer::start().await;
        mock_token(&rest).await;
        mock_topology(&rest).await;

        let err = Bridge::builder("user@example.com", "secret")
            .with_api_base(rest.uri())
            .with_device("dev-9")
            .connect()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DeviceNotFound));
    }
}
