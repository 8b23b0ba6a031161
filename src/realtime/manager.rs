//! Public handle of the realtime connection manager.
//!
//! Every method is non-blocking: it posts a command to the event loop and
//! returns. Nothing is reported back to the caller directly; outcomes show
//! up on the observable channels.
//!
//! # Example
//!
//! ```no_run
//! use traffic_realtime::{RealtimeManager, StaticTokenProvider};
//!
//! # async fn example() -> traffic_realtime::Result<()> {
//! let manager = RealtimeManager::builder()
//!     .endpoint("wss://realtime.example.com/ws")
//!     .token_provider(StaticTokenProvider::new("access-token", "user-42"))
//!     .build()?;
//!
//! let mut traffic = manager.traffic_updates();
//! manager.connect();
//!
//! while let Some(update) = traffic.next().await {
//!     println!("{}: {}", update.severity, update.description);
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::TokenProvider;
use crate::protocol::{Envelope, RealTimeUpdate, TrafficUpdate, VehicleTelemetryUpdate};
use crate::transport::Transport;

use super::actor::{Actor, Command, Outputs};
use super::builder::RealtimeManagerBuilder;
use super::channel::Subscription;
use super::config::RealtimeConfig;
use super::state::ConnectionState;

// ============================================================================
// RealtimeManager
// ============================================================================

/// Maintains one realtime session multiplexing the traffic, telemetry and
/// notification streams, with bounded automatic reconnection.
///
/// Construct one per application with [`RealtimeManager::builder()`] and
/// share it (e.g. behind an `Arc`). Dropping the manager cancels all of
/// its background work and closes the session.
pub struct RealtimeManager {
    command_tx: mpsc::UnboundedSender<Command>,
    outputs: Arc<Outputs>,
    shutdown: CancellationToken,
}

impl RealtimeManager {
    /// Creates a new builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RealtimeManagerBuilder {
        RealtimeManagerBuilder::new()
    }

    /// Spawns the event loop. Must run inside a tokio runtime.
    pub(crate) fn spawn(
        config: RealtimeConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let outputs = Arc::new(Outputs::new());
        let shutdown = CancellationToken::new();

        let actor = Actor::new(
            config,
            transport,
            tokens,
            Arc::clone(&outputs),
            command_rx,
            command_tx.clone(),
            shutdown.clone(),
        );
        tokio::spawn(actor.run());

        Self {
            command_tx,
            outputs,
            shutdown,
        }
    }

    // ========================================================================
    // Session Control
    // ========================================================================

    /// Opens the session.
    ///
    /// No-op while a session is open or being opened. Emits
    /// [`ConnectionState::Connecting`] right away and
    /// [`ConnectionState::Connected`] once the handshake completes, followed
    /// by the three stream subscriptions.
    pub fn connect(&self) {
        self.post(Command::Connect);
    }

    /// Closes the session with code 1000 and cancels any pending reconnect.
    ///
    /// Safe to call when not connected.
    pub fn disconnect(&self) {
        self.post(Command::Disconnect);
    }

    /// Cancels all background work and closes the session.
    ///
    /// Called automatically on drop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    // ========================================================================
    // Outbound Messages
    // ========================================================================

    /// Reports the device position.
    ///
    /// Dropped when not connected; never queued or retried.
    pub fn send_location_update(&self, latitude: f64, longitude: f64) {
        self.post(Command::Send(Envelope::location_update(
            latitude,
            longitude,
            epoch_millis(),
        )));
    }

    /// Reports a traffic incident.
    ///
    /// Dropped when not connected, or when `report` cannot be serialized.
    pub fn send_traffic_report<R: Serialize>(&self, report: &R) {
        let report = match serde_json::to_value(report) {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Failed to serialize traffic report");
                return;
            }
        };
        self.post(Command::Send(Envelope::traffic_report(report, epoch_millis())));
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Subscribes to connection state changes.
    #[must_use]
    pub fn connection_state(&self) -> Subscription<ConnectionState> {
        self.outputs.state.subscribe()
    }

    /// Subscribes to traffic updates.
    #[must_use]
    pub fn traffic_updates(&self) -> Subscription<TrafficUpdate> {
        self.outputs.traffic.subscribe()
    }

    /// Subscribes to vehicle telemetry.
    #[must_use]
    pub fn vehicle_telemetry(&self) -> Subscription<VehicleTelemetryUpdate> {
        self.outputs.telemetry.subscribe()
    }

    /// Subscribes to notifications.
    #[must_use]
    pub fn notifications(&self) -> Subscription<RealTimeUpdate> {
        self.outputs.notifications.subscribe()
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.outputs.state.latest().unwrap_or_default()
    }

    /// Returns `true` when the session is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    fn post(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            debug!("Realtime event loop stopped, ignoring request");
        }
    }
}

impl Drop for RealtimeManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Milliseconds since the Unix epoch.
fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::time::{sleep, timeout};

    use crate::auth::StaticTokenProvider;
    use crate::error::{Error, Result};
    use crate::protocol::{GeoPoint, Topic};
    use crate::transport::{ConnectRequest, OutboundFrame, SessionChannels, SessionEvent};

    // ------------------------------------------------------------------------
    // In-memory transport
    // ------------------------------------------------------------------------

    struct MockTransport {
        attempts: AtomicUsize,
        refuse: AtomicBool,
        tokens_seen: Mutex<Vec<String>>,
        sessions: mpsc::UnboundedSender<MockSession>,
    }

    struct MockSession {
        outbound: mpsc::UnboundedReceiver<OutboundFrame>,
        inbound: mpsc::UnboundedSender<SessionEvent>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&self, request: ConnectRequest) -> Result<SessionChannels> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.tokens_seen.lock().push(request.bearer_token);

            if self.refuse.load(Ordering::SeqCst) {
                return Err(Error::connection("refused"));
            }

            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let _ = self.sessions.send(MockSession {
                outbound: outbound_rx,
                inbound: inbound_tx,
            });

            Ok(SessionChannels {
                outbound: outbound_tx,
                inbound: inbound_rx,
            })
        }
    }

    impl MockSession {
        async fn next_frame(&mut self) -> OutboundFrame {
            timeout(Duration::from_secs(1), self.outbound.recv())
                .await
                .expect("frame expected")
                .expect("outbound channel open")
        }

        async fn next_envelope(&mut self) -> Envelope {
            match self.next_frame().await {
                OutboundFrame::Text(text) => Envelope::decode(&text).expect("valid envelope"),
                other => panic!("expected text frame, got {other:?}"),
            }
        }

        async fn drain_subscriptions(&mut self) {
            for _ in 0..3 {
                let envelope = self.next_envelope().await;
                assert_eq!(envelope.message_type, "SUBSCRIBE");
            }
        }

        fn push(&self, event: SessionEvent) {
            self.inbound.send(event).expect("session loop alive");
        }

        fn push_text(&self, text: &str) {
            self.push(SessionEvent::Text(text.to_string()));
        }
    }

    struct Harness {
        manager: RealtimeManager,
        transport: Arc<MockTransport>,
        tokens: Arc<StaticTokenProvider>,
        sessions: mpsc::UnboundedReceiver<MockSession>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(RealtimeConfig::new())
        }

        fn with_config(config: RealtimeConfig) -> Self {
            Self::with_tokens(config, StaticTokenProvider::new("tok-1", "user-42"))
        }

        fn with_tokens(config: RealtimeConfig, tokens: StaticTokenProvider) -> Self {
            let (sessions_tx, sessions) = mpsc::unbounded_channel();
            let transport = Arc::new(MockTransport {
                attempts: AtomicUsize::new(0),
                refuse: AtomicBool::new(false),
                tokens_seen: Mutex::new(Vec::new()),
                sessions: sessions_tx,
            });
            let tokens = Arc::new(tokens);

            let manager = RealtimeManager::spawn(
                config,
                Arc::clone(&transport) as Arc<dyn Transport>,
                Arc::clone(&tokens) as Arc<dyn TokenProvider>,
            );

            Self {
                manager,
                transport,
                tokens,
                sessions,
            }
        }

        fn attempts(&self) -> usize {
            self.transport.attempts.load(Ordering::SeqCst)
        }

        fn refuse(&self, refuse: bool) {
            self.transport.refuse.store(refuse, Ordering::SeqCst);
        }

        async fn next_session(&mut self) -> MockSession {
            timeout(Duration::from_secs(10), self.sessions.recv())
                .await
                .expect("session expected")
                .expect("transport alive")
        }

        async fn wait_state(&self, predicate: impl FnMut(&ConnectionState) -> bool) -> ConnectionState {
            let mut states = self.manager.connection_state();
            timeout(Duration::from_secs(10), states.wait_for(predicate))
                .await
                .expect("state expected")
                .expect("manager alive")
        }

        async fn connect_and_open(&mut self) -> MockSession {
            self.manager.connect();
            let mut session = self.next_session().await;
            self.wait_state(ConnectionState::is_connected).await;
            session.drain_subscriptions().await;
            session
        }
    }

    const TRAFFIC_FRAME: &str = r#"{"type":"DATA","topic":"traffic-updates","payload":{"id":"t1","location":{"lat":1,"lon":2},"severity":"high","description":"jam","timestamp":1000,"affectedRoutes":["R1"]}}"#;

    const TELEMETRY_FRAME: &str = r#"{"type":"DATA","topic":"vehicle-telemetry","payload":{"vehicleId":"v1","speed":42.0,"fuelLevel":0.8,"emissions":{"co2":95.0,"nox":0.02,"pm25":0.001},"location":{"lat":48.1,"lon":11.5},"timestamp":2000}}"#;

    // ------------------------------------------------------------------------
    // Session open
    // ------------------------------------------------------------------------

    #[test]
    fn test_epoch_millis_is_current() {
        // 2020-01-01T00:00:00Z
        assert!(epoch_millis() > 1_577_836_800_000);
    }

    #[tokio::test]
    async fn test_initial_state_is_disconnected() {
        let harness = Harness::new();
        assert_eq!(harness.manager.state(), ConnectionState::Disconnected);
        assert!(!harness.manager.is_connected());
    }

    #[tokio::test]
    async fn test_open_sends_three_subscriptions_in_order() {
        let mut harness = Harness::new();
        harness.manager.connect();

        let mut session = harness.next_session().await;

        let traffic = session.next_envelope().await;
        assert_eq!(traffic.message_type, "SUBSCRIBE");
        assert_eq!(traffic.topic, "traffic-updates");
        assert_eq!(traffic.payload, json!({ "userId": "user-42", "radius": 10 }));

        let telemetry = session.next_envelope().await;
        assert_eq!(telemetry.topic, "vehicle-telemetry");
        assert_eq!(telemetry.payload, json!({ "userId": "user-42" }));

        let notifications = session.next_envelope().await;
        assert_eq!(notifications.topic, "notifications");
        assert_eq!(notifications.payload, json!({ "userId": "user-42" }));

        assert!(harness.manager.is_connected());
        assert_eq!(*harness.transport.tokens_seen.lock(), vec!["tok-1".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_credentials_still_open_session() {
        let mut harness =
            Harness::with_tokens(RealtimeConfig::new(), StaticTokenProvider::new("", ""));
        harness.manager.connect();

        let mut session = harness.next_session().await;
        for topic in Topic::SUBSCRIBED {
            let envelope = session.next_envelope().await;
            assert_eq!(envelope.message_type, "SUBSCRIBE");
            assert_eq!(envelope.topic, topic.as_str());
            assert_eq!(envelope.payload["userId"], "");
        }

        harness.wait_state(ConnectionState::is_connected).await;
        assert_eq!(harness.manager.state(), ConnectionState::Connected);
        assert_eq!(*harness.transport.tokens_seen.lock(), vec![String::new()]);
    }

    #[tokio::test]
    async fn test_second_connect_is_noop() {
        let mut harness = Harness::new();
        let mut session = harness.connect_and_open().await;

        harness.manager.connect();
        harness.manager.send_location_update(1.5, 2.5);

        // Next frame after the subscriptions is the location update
        let envelope = session.next_envelope().await;
        assert_eq!(envelope.message_type, "LOCATION_UPDATE");
        assert_eq!(harness.attempts(), 1);
    }

    #[tokio::test]
    async fn test_double_connect_while_opening_opens_one_session() {
        let mut harness = Harness::new();
        harness.manager.connect();
        harness.manager.connect();

        let mut session = harness.next_session().await;
        session.drain_subscriptions().await;
        harness.manager.send_location_update(0.0, 0.0);
        assert_eq!(session.next_envelope().await.message_type, "LOCATION_UPDATE");
        assert_eq!(harness.attempts(), 1);
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_send_while_disconnected_performs_no_write() {
        let mut harness = Harness::new();
        harness.manager.send_location_update(1.0, 2.0);
        harness.manager.send_traffic_report(&json!({ "kind": "accident" }));

        let mut session = harness.connect_and_open().await;
        harness.manager.disconnect();

        assert_eq!(session.next_frame().await, OutboundFrame::normal_closure());

        harness.manager.send_location_update(1.0, 2.0);
        let next = timeout(Duration::from_millis(100), session.outbound.recv()).await;
        assert!(matches!(next, Ok(None)), "no frame may follow the close");
        assert_eq!(harness.attempts(), 1);
    }

    #[tokio::test]
    async fn test_location_update_envelope() {
        let mut harness = Harness::new();
        let mut session = harness.connect_and_open().await;

        harness.manager.send_location_update(52.52, 13.405);
        let envelope = session.next_envelope().await;

        assert_eq!(envelope.topic, "location");
        assert_eq!(envelope.payload["latitude"], 52.52);
        assert_eq!(envelope.payload["longitude"], 13.405);
        assert!(envelope.payload["timestamp"].as_i64().unwrap_or_default() > 0);
    }

    #[tokio::test]
    async fn test_traffic_report_envelope() {
        #[derive(Serialize)]
        struct Report {
            kind: &'static str,
            lanes_blocked: u8,
        }

        let mut harness = Harness::new();
        let mut session = harness.connect_and_open().await;

        harness.manager.send_traffic_report(&Report {
            kind: "accident",
            lanes_blocked: 2,
        });
        let envelope = session.next_envelope().await;

        assert_eq!(envelope.message_type, "TRAFFIC_REPORT");
        assert_eq!(envelope.topic, "traffic-incidents");
        assert_eq!(envelope.payload["report"]["kind"], "accident");
        assert_eq!(envelope.payload["report"]["lanes_blocked"], 2);
        assert!(envelope.payload["timestamp"].is_i64());
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_traffic_frame_reaches_channel() {
        let mut harness = Harness::new();
        let session = harness.connect_and_open().await;
        let mut traffic = harness.manager.traffic_updates();

        session.push_text(TRAFFIC_FRAME);

        let update = timeout(Duration::from_secs(1), traffic.next())
            .await
            .expect("update expected")
            .expect("manager alive");
        assert_eq!(
            update,
            TrafficUpdate {
                id: "t1".to_string(),
                location: GeoPoint { lat: 1.0, lon: 2.0 },
                severity: "high".to_string(),
                description: "jam".to_string(),
                timestamp: 1000,
                affected_routes: vec!["R1".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_frames_do_not_block_later_frames() {
        let mut harness = Harness::new();
        let session = harness.connect_and_open().await;
        let mut telemetry = harness.manager.vehicle_telemetry();

        session.push_text("garbage");
        session.push_text(r#"{"type":"DATA","topic":"traffic-updates","payload":{"bad":1}}"#);
        session.push_text(r#"{"type":"DATA","topic":"weather","payload":{}}"#);
        session.push_text(TELEMETRY_FRAME);

        let update = timeout(Duration::from_secs(1), telemetry.next())
            .await
            .expect("update expected")
            .expect("manager alive");
        assert_eq!(update.vehicle_id, "v1");
        assert_eq!(harness.manager.traffic_updates().latest(), None);
        assert!(harness.manager.is_connected());
    }

    #[tokio::test]
    async fn test_late_subscriber_receives_last_notification() {
        let mut harness = Harness::new();
        let session = harness.connect_and_open().await;
        let mut early = harness.manager.notifications();

        session.push_text(r#"{"type":"DATA","topic":"notifications","payload":{"n":1}}"#);
        session.push_text(r#"{"type":"DATA","topic":"notifications","payload":{"n":2}}"#);

        timeout(Duration::from_secs(1), early.wait_for(|u| u.as_value()["n"] == 2))
            .await
            .expect("second notification expected");

        let mut late = harness.manager.notifications();
        let replayed = timeout(Duration::from_millis(50), late.next())
            .await
            .expect("replay should be immediate")
            .expect("manager alive");
        assert_eq!(replayed.into_value(), json!({ "n": 2 }));
    }

    // ------------------------------------------------------------------------
    // Closure and reconnection
    // ------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_failures_stop_after_cap() {
        let harness = Harness::new();
        harness.refuse(true);
        harness.manager.connect();

        sleep(Duration::from_secs(60)).await;

        // Initial attempt plus five scheduled reconnects
        assert_eq!(harness.attempts(), 6);
        assert_eq!(harness.manager.state(), ConnectionState::Disconnected);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(harness.attempts(), 6);

        harness.manager.connect();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(harness.attempts(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reports_reason() {
        let harness = Harness::new();
        harness.refuse(true);
        harness.manager.connect();

        let state = harness.wait_state(ConnectionState::is_failed).await;
        assert_eq!(state.failure_reason(), Some("Connection failed: refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let harness = Harness::new();
        harness.refuse(true);
        harness.manager.connect();

        harness.wait_state(ConnectionState::is_failed).await;
        harness.manager.disconnect();

        sleep(Duration::from_secs(10)).await;
        assert_eq!(harness.attempts(), 1);
        assert_eq!(harness.manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_failure_reconnects_with_fresh_token() {
        let mut harness = Harness::new();
        let session = harness.connect_and_open().await;

        harness.tokens.set_access_token("tok-2");
        session.push(SessionEvent::Failed(Some("connection reset".to_string())));

        let state = harness.wait_state(ConnectionState::is_failed).await;
        assert_eq!(state.failure_reason(), Some("connection reset"));

        let mut second = harness.next_session().await;
        second.drain_subscriptions().await;

        assert_eq!(harness.attempts(), 2);
        assert_eq!(
            *harness.transport.tokens_seen.lock(),
            vec!["tok-1".to_string(), "tok-2".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_session_without_reason_uses_placeholder() {
        let mut harness = Harness::new();
        let session = harness.connect_and_open().await;

        drop(session);

        let state = harness.wait_state(ConnectionState::is_failed).await;
        assert_eq!(state.failure_reason(), Some("Unknown error"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_close_does_not_reconnect() {
        let mut harness = Harness::new();
        let session = harness.connect_and_open().await;

        session.push(SessionEvent::Closed {
            code: 1000,
            reason: "server shutdown".to_string(),
        });

        harness
            .wait_state(|s| *s == ConnectionState::Disconnected)
            .await;

        sleep(Duration::from_secs(30)).await;
        assert_eq!(harness.attempts(), 1);
        assert_eq!(harness.manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_open_resets_attempt_counter() {
        let mut harness = Harness::with_config(RealtimeConfig::new().with_max_reconnect_attempts(1));
        harness.refuse(true);
        harness.manager.connect();
        harness.wait_state(ConnectionState::is_failed).await;

        // The single allowed reconnect succeeds
        harness.refuse(false);
        let session = harness.next_session().await;
        harness.wait_state(ConnectionState::is_connected).await;

        // Counter was reset, so one more reconnect is allowed
        session.push(SessionEvent::Failed(None));
        let _third = harness.next_session().await;
        assert_eq!(harness.attempts(), 3);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let harness = Harness::new();
        harness.manager.disconnect();
        harness.manager.disconnect();

        sleep(Duration::from_millis(20)).await;
        assert_eq!(harness.manager.state(), ConnectionState::Disconnected);
        assert_eq!(harness.attempts(), 0);
    }

    #[tokio::test]
    async fn test_drop_closes_session() {
        let mut harness = Harness::new();
        let mut session = harness.connect_and_open().await;

        let Harness { manager, .. } = harness;
        drop(manager);

        assert_eq!(session.next_frame().await, OutboundFrame::normal_closure());
    }
}
