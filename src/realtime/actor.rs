//! Manager event loop.
//!
//! One tokio task owns every piece of mutable session state: the transport
//! handle, the connected flag, the reconnect counter and all channel
//! emissions. Caller requests, connect results, inbound session events and
//! reconnect timers all arrive through the same mailbox or the session
//! receiver, so they are handled strictly one at a time.
//!
//! # Reconnect Policy
//!
//! ```text
//! failure ──► Failed(reason) ──┬─ attempts < max ─► sleep(delay) ─► attempts += 1 ─► connect
//!                              └─ attempts = max ─► Disconnected (terminal)
//! remote close ──► Disconnected (no reconnect)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::TokenProvider;
use crate::protocol::{
    Envelope, RealTimeUpdate, Topic, TrafficUpdate, VehicleTelemetryUpdate,
};
use crate::transport::{ConnectRequest, OutboundFrame, SessionChannels, SessionEvent, Transport};

use super::channel::Replay;
use super::config::RealtimeConfig;
use super::router::{Routed, route};
use super::state::ConnectionState;

// ============================================================================
// Command
// ============================================================================

/// Messages processed by the event loop.
pub(crate) enum Command {
    /// Open a session unless one is open or opening.
    Connect,
    /// Close the session and cancel pending work.
    Disconnect,
    /// Transmit an envelope if connected.
    Send(Envelope),
    /// A connect attempt completed its handshake.
    Opened {
        attempt: u64,
        channels: SessionChannels,
    },
    /// A connect attempt failed.
    ConnectFailed { attempt: u64, reason: String },
    /// A reconnect timer elapsed.
    ReconnectDue { timer: u64 },
}

// ============================================================================
// Outputs
// ============================================================================

/// Observable channels shared between the loop and the public handle.
#[derive(Debug)]
pub(crate) struct Outputs {
    pub(crate) state: Replay<ConnectionState>,
    pub(crate) traffic: Replay<TrafficUpdate>,
    pub(crate) telemetry: Replay<VehicleTelemetryUpdate>,
    pub(crate) notifications: Replay<RealTimeUpdate>,
}

impl Outputs {
    pub(crate) fn new() -> Self {
        Self {
            state: Replay::with_initial(ConnectionState::Disconnected),
            traffic: Replay::new(),
            telemetry: Replay::new(),
            notifications: Replay::new(),
        }
    }

    fn publish(&self, routed: Routed) {
        match routed {
            Routed::Traffic(update) => self.traffic.emit(update),
            Routed::Telemetry(update) => self.telemetry.emit(update),
            Routed::Notification(update) => self.notifications.emit(update),
        }
    }
}

// ============================================================================
// Pending Work
// ============================================================================

/// A spawned unit of work the loop may need to cancel.
struct PendingTask {
    id: u64,
    cancel: CancellationToken,
}

impl PendingTask {
    fn cancel(self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// Actor
// ============================================================================

/// State owned by the event loop.
pub(crate) struct Actor {
    config: RealtimeConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    outputs: Arc<Outputs>,
    mailbox: mpsc::UnboundedReceiver<Command>,
    mailbox_tx: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    session: Option<SessionChannels>,
    connecting: Option<PendingTask>,
    reconnect: Option<PendingTask>,
    attempt_seq: u64,
    timer_seq: u64,
    reconnect_attempts: u32,
}

impl Actor {
    pub(crate) fn new(
        config: RealtimeConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        outputs: Arc<Outputs>,
        mailbox: mpsc::UnboundedReceiver<Command>,
        mailbox_tx: mpsc::UnboundedSender<Command>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            transport,
            tokens,
            outputs,
            mailbox,
            mailbox_tx,
            shutdown,
            session: None,
            connecting: None,
            reconnect: None,
            attempt_seq: 0,
            timer_seq: 0,
            reconnect_attempts: 0,
        }
    }

    /// Runs until the manager shuts down.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                command = self.mailbox.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => break,
                    }
                }

                event = next_session_event(&mut self.session) => {
                    self.handle_session_event(event);
                }
            }
        }

        self.teardown();
        debug!("Realtime event loop terminated");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Disconnect => self.disconnect(),
            Command::Send(envelope) => self.transmit(&envelope),
            Command::Opened { attempt, channels } => self.on_opened(attempt, channels),
            Command::ConnectFailed { attempt, reason } => {
                if self.connecting.as_ref().is_some_and(|p| p.id == attempt) {
                    self.connecting = None;
                    self.on_failure(Some(reason));
                } else {
                    debug!(attempt, "Ignoring failure of abandoned connect attempt");
                }
            }
            Command::ReconnectDue { timer } => {
                if self.reconnect.as_ref().is_some_and(|p| p.id == timer) {
                    self.reconnect = None;
                    self.connect();
                } else {
                    debug!(timer, "Ignoring cancelled reconnect timer");
                }
            }
        }
    }

    fn handle_session_event(&mut self, event: Option<SessionEvent>) {
        match event {
            Some(SessionEvent::Text(text)) => match route(&text) {
                Ok(Some(routed)) => self.outputs.publish(routed),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Discarding malformed frame"),
            },
            Some(SessionEvent::Closed { code, reason }) => {
                info!(code, %reason, "Realtime session closed by server");
                self.session = None;
                self.outputs.state.emit(ConnectionState::Disconnected);
            }
            Some(SessionEvent::Failed(reason)) => self.on_failure(reason),
            None => self.on_failure(None),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn connect(&mut self) {
        if self.session.is_some() {
            debug!("Already connected");
            return;
        }
        if self.connecting.is_some() {
            debug!("Connect already in progress");
            return;
        }

        self.cancel_reconnect();
        self.attempt_seq += 1;
        let attempt = self.attempt_seq;

        self.outputs.state.emit(ConnectionState::Connecting);

        let bearer_token = self.tokens.access_token();
        if bearer_token.is_empty() {
            warn!("Access token is empty");
        }

        let request = ConnectRequest {
            endpoint: self.config.endpoint.clone(),
            bearer_token,
        };

        info!(endpoint = %request.endpoint, attempt, "Connecting realtime session");

        let cancel = self.shutdown.child_token();
        let task_cancel = cancel.clone();
        let transport = Arc::clone(&self.transport);
        let mailbox = self.mailbox_tx.clone();

        tokio::spawn(async move {
            let command = tokio::select! {
                () = task_cancel.cancelled() => return,
                result = transport.connect(request) => match result {
                    Ok(channels) => Command::Opened { attempt, channels },
                    Err(e) => {
                        if e.is_connection_error() {
                            debug!(attempt, error = %e, "Connect attempt failed");
                        } else {
                            error!(attempt, error = %e, "Connect attempt rejected before dialing");
                        }
                        Command::ConnectFailed { attempt, reason: e.to_string() }
                    }
                },
            };
            let _ = mailbox.send(command);
        });

        self.connecting = Some(PendingTask { id: attempt, cancel });
    }

    fn on_opened(&mut self, attempt: u64, channels: SessionChannels) {
        if !self.connecting.as_ref().is_some_and(|p| p.id == attempt) {
            debug!(attempt, "Closing session of abandoned connect attempt");
            let _ = channels.outbound.send(OutboundFrame::normal_closure());
            return;
        }

        self.connecting = None;
        self.reconnect_attempts = 0;
        self.session = Some(channels);
        self.outputs.state.emit(ConnectionState::Connected);

        info!("Realtime session connected");

        self.subscribe_all();
    }

    fn subscribe_all(&mut self) {
        let user_id = self.tokens.current_user_id();
        if user_id.is_empty() {
            warn!("User id is empty");
        }

        for topic in Topic::SUBSCRIBED {
            let payload = match topic {
                Topic::TrafficUpdates => json!({
                    "userId": user_id,
                    "radius": self.config.traffic_radius_km,
                }),
                _ => json!({ "userId": user_id }),
            };
            self.transmit(&Envelope::subscribe(topic, payload));
        }
    }

    fn disconnect(&mut self) {
        self.cancel_reconnect();

        if let Some(attempt) = self.connecting.take() {
            debug!(attempt = attempt.id, "Abandoning connect attempt");
            attempt.cancel();
        }

        if let Some(session) = self.session.take() {
            let _ = session.outbound.send(OutboundFrame::normal_closure());
            info!("Realtime session disconnected");
        }

        self.outputs.state.emit(ConnectionState::Disconnected);
    }

    fn on_failure(&mut self, reason: Option<String>) {
        self.session = None;

        let state = ConnectionState::failed(reason);
        warn!(%state, attempts = self.reconnect_attempts, "Realtime session failed");
        self.outputs.state.emit(state);

        if self.reconnect_attempts < self.config.max_reconnect_attempts {
            self.schedule_reconnect();
        } else {
            info!(
                max = self.config.max_reconnect_attempts,
                "Reconnect attempts exhausted"
            );
            self.outputs.state.emit(ConnectionState::Disconnected);
        }
    }

    fn schedule_reconnect(&mut self) {
        self.cancel_reconnect();
        self.reconnect_attempts += 1;
        self.timer_seq += 1;
        let timer = self.timer_seq;

        let delay = self.config.reconnect_delay;
        info!(
            attempt = self.reconnect_attempts,
            max = self.config.max_reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        let cancel = self.shutdown.child_token();
        let task_cancel = cancel.clone();
        let mailbox = self.mailbox_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = task_cancel.cancelled() => {}
                () = sleep(delay) => {
                    let _ = mailbox.send(Command::ReconnectDue { timer });
                }
            }
        });

        self.reconnect = Some(PendingTask { id: timer, cancel });
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect.take() {
            debug!(timer = timer.id, "Cancelling pending reconnect");
            timer.cancel();
        }
    }

    fn teardown(&mut self) {
        self.cancel_reconnect();
        if let Some(attempt) = self.connecting.take() {
            attempt.cancel();
        }
        if let Some(session) = self.session.take() {
            let _ = session.outbound.send(OutboundFrame::normal_closure());
        }
        self.outputs.state.emit(ConnectionState::Disconnected);
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    fn transmit(&self, envelope: &Envelope) {
        let Some(session) = &self.session else {
            debug!(
                topic = %envelope.topic,
                message_type = %envelope.message_type,
                "Not connected, dropping message"
            );
            return;
        };

        match envelope.encode() {
            Ok(text) => {
                if session.outbound.send(OutboundFrame::Text(text)).is_err() {
                    warn!(topic = %envelope.topic, "Session writer gone, dropping message");
                }
            }
            Err(e) => warn!(error = %e, topic = %envelope.topic, "Failed to encode message"),
        }
    }
}

/// Waits for the next event of the open session, or forever without one.
async fn next_session_event(session: &mut Option<SessionChannels>) -> Option<SessionEvent> {
    match session {
        Some(session) => session.inbound.recv().await,
        None => pending().await,
    }
}
