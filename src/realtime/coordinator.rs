// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Supervision of the real-time push channel.
//!
//! [`RealtimeCoordinator`] owns one background task per hub. The task dials
//! the socket, joins the vendor namespace, requests a snapshot, and applies
//! pushed updates to the shared [`DeviceStateStore`] until the session dies.
//! It then reconnects with exponential backoff, refreshing the access token
//! when the server invalidates the old one. Individual connection attempts
//! live in the `session` module; this one decides when to attempt, with
//! which token, and how long to wait in between.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::AuthSession;
use crate::error::{Error, Result};
use crate::event::{BridgeEvent, EventBus};
use crate::state::DeviceStateStore;
use crate::types::DeviceId;

use super::connection::ConnectionState;
use super::session::{self, SessionOutcome};

/// Outbound commands buffered while the session transmits.
const COMMAND_BUFFER: usize = 32;

/// Pause before redialing after a session that had reached a snapshot.
const EXPIRY_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Doublings applied to the reconnect delay before the ceiling takes over.
const MAX_BACKOFF_DOUBLINGS: u32 = 16;

/// Fraction of the delay the jitter may add or remove.
const JITTER_SPREAD: f64 = 0.25;

// ===== Reconnect policy =====

/// Tuning for reconnect pacing and liveness detection.
///
/// The defaults match the cadence the vendor cloud keeps: data roughly
/// every thirty seconds on a healthy session, and sessions that fall
/// silent shortly before server-side expiry.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use helki_lib::ReconnectConfig;
///
/// let config = ReconnectConfig::new()
///     .with_initial_delay(Duration::from_secs(2))
///     .with_availability_threshold(3);
/// assert_eq!(config.initial_delay(), Duration::from_secs(2));
/// assert_eq!(config.max_delay(), ReconnectConfig::DEFAULT_MAX_DELAY);
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    initial_delay: Duration,
    max_delay: Duration,
    availability_threshold: u32,
    idle_timeout: Duration,
    stale_timeout: Duration,
    keepalive_interval: Duration,
}

impl ReconnectConfig {
    /// Delay before the first reconnect attempt; doubles per failure.
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);

    /// Ceiling on the doubled reconnect delay.
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

    /// Consecutive failures before the hub is marked unavailable.
    pub const DEFAULT_AVAILABILITY_THRESHOLD: u32 = 10;

    /// Silence on an open connection treated as session expiry.
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(40);

    /// Time without a data-bearing event before the session is recycled.
    pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(300);

    /// Interval between full-state requests on a subscribed session.
    pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initial_delay: Self::DEFAULT_INITIAL_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
            availability_threshold: Self::DEFAULT_AVAILABILITY_THRESHOLD,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
            stale_timeout: Self::DEFAULT_STALE_TIMEOUT,
            keepalive_interval: Self::DEFAULT_KEEPALIVE_INTERVAL,
        }
    }

    /// Sets the delay before the first reconnect attempt.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the ceiling on the reconnect delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets how many consecutive failures mark the hub unavailable.
    #[must_use]
    pub fn with_availability_threshold(mut self, failures: u32) -> Self {
        self.availability_threshold = failures;
        self
    }

    /// Sets how long an open connection may stay silent.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets how long a session may run without data before it is recycled.
    #[must_use]
    pub fn with_stale_timeout(mut self, timeout: Duration) -> Self {
        self.stale_timeout = timeout;
        self
    }

    /// Sets the interval between keepalive full-state requests.
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Delay before the first reconnect attempt.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Ceiling on the reconnect delay.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Consecutive failures before the hub is marked unavailable.
    #[must_use]
    pub fn availability_threshold(&self) -> u32 {
        self.availability_threshold
    }

    /// Silence allowed on an open connection.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Time without data before the session is recycled.
    #[must_use]
    pub fn stale_timeout(&self) -> Duration {
        self.stale_timeout
    }

    /// Interval between keepalive full-state requests.
    #[must_use]
    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ===== Commands =====

/// An outbound control write, addressed the way inbound updates are.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandFrame {
    /// Vendor resource path, e.g. `/acm/2/status`.
    pub path: String,
    /// Fields to write at that path.
    pub body: Value,
}

// ===== Shared task state =====

/// State shared between the coordinator handle and its background task.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) session: Arc<AuthSession>,
    pub(crate) store: Arc<DeviceStateStore>,
    pub(crate) events: EventBus,
    pub(crate) device: DeviceId,
    pub(crate) config: ReconnectConfig,
    pub(crate) cancel: CancellationToken,
    state_tx: watch::Sender<ConnectionState>,
}

impl Shared {
    /// Moves the public connection state and notifies subscribers.
    pub(crate) fn set_state(&self, next: ConnectionState, error: Option<String>) {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            debug!(state = %next, "connection state changed");
            self.events
                .publish(BridgeEvent::ConnectionChanged { state: next, error });
        }
    }

    /// Flips availability for the hub and all of its zones.
    pub(crate) fn set_availability(&self, available: bool) {
        if self.store.set_device_available(&self.device, available) {
            info!(device = %self.device, available, "device availability changed");
            self.events.publish(BridgeEvent::AvailabilityChanged {
                device: self.device.clone(),
                available,
            });
        }
    }

    /// Marks the hub unavailable once the failure count crosses the
    /// configured threshold. Reconnect attempts continue regardless.
    fn note_failure(&self, failures: u32) {
        if failures == self.config.availability_threshold {
            warn!(failures, "reconnect failures reached the threshold; marking hub unavailable");
            self.set_availability(false);
        }
    }

    /// Sleeps unless cancelled first; returns `false` on cancellation.
    async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

// ===== Coordinator =====

/// Owns the real-time push channel for one hub.
///
/// The coordinator runs a single background task. The task keeps the
/// socket session alive, applies pushed updates to the shared store, and
/// republishes them as [`BridgeEvent`]s. When a session ends it reconnects
/// on its own; the first snapshot after a reconnect replaces whatever the
/// store held for the affected zones.
///
/// Stopping is explicit: [`stop`](Self::stop) cancels any pending
/// reconnect timer, closes the transport, and leaves the coordinator in
/// [`ConnectionState::Closed`]. A rejected credential does the same, since
/// retrying a bad password would only lock the account.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// use helki_lib::{
///     AuthSession, CloudConfig, DeviceStateStore, EventBus, RealtimeCoordinator,
///     ReconnectConfig, types::DeviceId,
/// };
///
/// # async fn run() -> Result<(), helki_lib::Error> {
/// let session = Arc::new(AuthSession::new(CloudConfig::new("user@example.com", "secret"))?);
/// let store = Arc::new(DeviceStateStore::new());
/// let coordinator = RealtimeCoordinator::new(
///     session,
///     Arc::clone(&store),
///     EventBus::new(),
///     DeviceId::new("a1b2c3"),
///     ReconnectConfig::new(),
/// );
/// coordinator.start();
/// // ... use the store and events while the task runs ...
/// coordinator.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RealtimeCoordinator {
    shared: Arc<Shared>,
    command_tx: mpsc::Sender<CommandFrame>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandFrame>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeCoordinator {
    /// Creates a coordinator for one hub. Nothing is dialed until
    /// [`start`](Self::start).
    #[must_use]
    pub fn new(
        session: Arc<AuthSession>,
        store: Arc<DeviceStateStore>,
        events: EventBus,
        device: DeviceId,
        config: ReconnectConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        Self {
            shared: Arc::new(Shared {
                session,
                store,
                events,
                device,
                config,
                cancel: CancellationToken::new(),
                state_tx,
            }),
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            task: Mutex::new(None),
        }
    }

    /// The hub this coordinator serves.
    #[must_use]
    pub fn device(&self) -> &DeviceId {
        &self.shared.device
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// A watch channel following every connection state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Spawns the background connection task.
    ///
    /// Calling this more than once has no effect; a coordinator drives one
    /// task for its whole life and cannot be restarted after
    /// [`stop`](Self::stop).
    pub fn start(&self) {
        let Some(commands) = self.command_rx.lock().take() else {
            debug!(device = %self.shared.device, "realtime task already started");
            return;
        };
        let shared = Arc::clone(&self.shared);
        *self.task.lock() = Some(tokio::spawn(run(shared, commands)));
    }

    /// Stops the background task, cancelling any pending reconnect timer
    /// and closing the transport.
    pub async fn stop(&self) {
        self.shared.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "realtime task ended abnormally");
                }
            }
        }
    }

    /// Queues a command for transmission on the live session.
    ///
    /// Commands are never queued across reconnects: if the session is not
    /// subscribed, or the outbound buffer is full because the transport
    /// has stalled, the command is rejected immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] when the command cannot be handed
    /// to a live session.
    pub(crate) fn send_command(&self, frame: CommandFrame) -> Result<()> {
        if !self.state().is_subscribed() {
            return Err(Error::NotConnected);
        }
        self.command_tx.try_send(frame).map_err(|err| {
            warn!(error = %err, "dropping command; outbound queue unavailable");
            Error::NotConnected
        })
    }
}

// ===== Connection loop =====

async fn run(shared: Arc<Shared>, mut commands: mpsc::Receiver<CommandFrame>) {
    let mut attempt: u32 = 0;
    let mut failures: u32 = 0;
    let mut force_refresh = false;
    let mut first = true;

    loop {
        if shared.cancel.is_cancelled() {
            break;
        }

        if first {
            shared.set_state(ConnectionState::Connecting, None);
            first = false;
        } else {
            shared.set_state(ConnectionState::Reconnecting { attempt }, None);
        }

        let token = if force_refresh {
            shared.session.refresh().await
        } else {
            shared.session.ensure_valid().await
        };
        force_refresh = false;

        let token = match token {
            Ok(token) => token,
            Err(err) if err.is_fatal() => {
                error!(error = %err, "credentials rejected; closing the realtime channel");
                shared.set_availability(false);
                shared.set_state(ConnectionState::Closed, Some(err.to_string()));
                return;
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed before connect");
                if !pause_after_failure(&shared, &mut attempt, &mut failures).await {
                    break;
                }
                continue;
            }
        };

        match session::run(&shared, &token, &mut commands).await {
            SessionOutcome::Stopped => break,
            SessionOutcome::Expired { subscribed: true } => {
                debug!("session expired after a healthy cycle; reconnecting");
                attempt = 0;
                failures = 0;
                if !shared.sleep(EXPIRY_RECONNECT_DELAY).await {
                    break;
                }
            }
            SessionOutcome::Expired { subscribed: false } => {
                warn!("connection ended before the first snapshot");
                if !pause_after_failure(&shared, &mut attempt, &mut failures).await {
                    break;
                }
            }
            SessionOutcome::Invalidated => {
                info!("session invalidated by the server; forcing a token refresh");
                force_refresh = true;
                if !pause_after_failure(&shared, &mut attempt, &mut failures).await {
                    break;
                }
            }
            SessionOutcome::Failed(err) => {
                warn!(error = %err, attempt, "realtime connection failed");
                if !pause_after_failure(&shared, &mut attempt, &mut failures).await {
                    break;
                }
            }
        }
    }

    shared.set_state(ConnectionState::Closed, None);
}

/// Records a failure and waits out the backoff delay.
///
/// Returns `false` when the coordinator was stopped while waiting.
async fn pause_after_failure(shared: &Shared, attempt: &mut u32, failures: &mut u32) -> bool {
    *failures += 1;
    shared.note_failure(*failures);

    let delay = backoff_delay(*attempt, &shared.config);
    debug!(?delay, attempt = *attempt, failures = *failures, "waiting before reconnect");
    if !shared.sleep(delay).await {
        return false;
    }
    *attempt = attempt.saturating_add(1);
    true
}

/// Exponential backoff with deterministic jitter.
///
/// The delay doubles per attempt up to the configured ceiling. The jitter
/// is a pure function of the attempt number, so a given retry sequence is
/// reproducible.
fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    let doubled = config
        .initial_delay
        .saturating_mul(2_u32.saturating_pow(attempt.min(MAX_BACKOFF_DOUBLINGS)))
        .min(config.max_delay);

    let jitter = 1.0 + JITTER_SPREAD * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64(doubled.as_secs_f64() * jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CloudConfig;

    fn test_coordinator() -> RealtimeCoordinator {
        let config = CloudConfig::new("user@example.com", "secret");
        let session = Arc::new(AuthSession::new(config).expect("client builds"));
        RealtimeCoordinator::new(
            session,
            Arc::new(DeviceStateStore::new()),
            EventBus::new(),
            DeviceId::new("a1b2c3"),
            ReconnectConfig::new(),
        )
    }

    // ===== backoff =====

    #[test]
    fn backoff_grows_with_attempts() {
        let config = ReconnectConfig::new();
        assert!(backoff_delay(0, &config) < backoff_delay(3, &config));
    }

    #[test]
    fn backoff_respects_the_ceiling() {
        let config = ReconnectConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(4));

        // Five seconds allows for the full jitter spread above four.
        assert!(backoff_delay(10, &config) <= Duration::from_secs(5));
    }

    #[test]
    fn backoff_is_deterministic() {
        let config = ReconnectConfig::new();
        assert_eq!(backoff_delay(4, &config), backoff_delay(4, &config));
    }

    // ===== config =====

    #[test]
    fn config_defaults_match_the_documented_cadence() {
        let config = ReconnectConfig::new();
        assert_eq!(config.initial_delay(), Duration::from_secs(5));
        assert_eq!(config.max_delay(), Duration::from_secs(60));
        assert_eq!(config.availability_threshold(), 10);
        assert_eq!(config.idle_timeout(), Duration::from_secs(40));
        assert_eq!(config.stale_timeout(), Duration::from_secs(300));
        assert_eq!(config.keepalive_interval(), Duration::from_secs(30));
    }

    #[test]
    fn config_builders_override_each_knob() {
        let config = ReconnectConfig::new()
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(50))
            .with_availability_threshold(2)
            .with_idle_timeout(Duration::from_secs(5))
            .with_stale_timeout(Duration::from_secs(10))
            .with_keepalive_interval(Duration::from_secs(1));

        assert_eq!(config.initial_delay(), Duration::from_millis(10));
        assert_eq!(config.max_delay(), Duration::from_millis(50));
        assert_eq!(config.availability_threshold(), 2);
        assert_eq!(config.idle_timeout(), Duration::from_secs(5));
        assert_eq!(config.stale_timeout(), Duration::from_secs(10));
        assert_eq!(config.keepalive_interval(), Duration::from_secs(1));
    }

    // ===== coordinator handle =====

    #[tokio::test]
    async fn commands_are_rejected_until_subscribed() {
        let coordinator = test_coordinator();
        let frame = CommandFrame {
            path: "/acm/1/status".to_string(),
            body: serde_json::json!({"mode": "off"}),
        };

        assert!(matches!(
            coordinator.send_command(frame),
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let coordinator = test_coordinator();
        coordinator.stop().await;
        assert_eq!(coordinator.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn state_starts_disconnected() {
        let coordinator = test_coordinator();
        assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        assert!(!coordinator.state().is_subscribed());
    }
}
