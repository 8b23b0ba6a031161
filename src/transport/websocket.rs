//! WebSocket client transport.
//!
//! Opens a `ws://` or `wss://` session with a bearer credential header and
//! spawns a tokio task that owns the socket.
//!
//! # Session Loop
//!
//! The spawned task handles:
//!
//! - Incoming text frames, forwarded as [`SessionEvent::Text`]
//! - Remote close handshakes, forwarded as [`SessionEvent::Closed`]
//! - Socket errors and unexpected stream ends, forwarded as [`SessionEvent::Failed`]
//! - Outgoing frames queued by the manager

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};

use super::{ConnectRequest, OutboundFrame, SessionChannels, SessionEvent, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for the WebSocket handshake.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Code reported when the remote close frame carries no status.
const NO_STATUS_CODE: u16 = 1005;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type WsWrite = SplitSink<WsStream, Message>;

// ============================================================================
// WebSocketTransport
// ============================================================================

/// [`Transport`] backed by tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    handshake_timeout: Duration,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketTransport {
    /// Creates a transport with the default 30s handshake timeout.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub const fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    /// Returns the handshake timeout.
    #[inline]
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, request: ConnectRequest) -> Result<SessionChannels> {
        let mut ws_request = request.endpoint.as_str().into_client_request()?;
        let credential = HeaderValue::from_str(&format!("Bearer {}", request.bearer_token))?;
        ws_request.headers_mut().insert(AUTHORIZATION, credential);

        let (ws_stream, response) = timeout(self.handshake_timeout, connect_async(ws_request))
            .await
            .map_err(|_| {
                Error::connection(format!(
                    "handshake timed out after {}ms",
                    self.handshake_timeout.as_millis()
                ))
            })??;

        info!(
            endpoint = %request.endpoint,
            status = %response.status(),
            "WebSocket session established"
        );

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_session_loop(ws_stream, outbound_rx, inbound_tx));

        Ok(SessionChannels {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

// ============================================================================
// Session Loop
// ============================================================================

/// Drives one socket until it closes, fails or is released.
async fn run_session_loop(
    ws_stream: WsStream,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>,
    inbound_tx: mpsc::UnboundedSender<SessionEvent>,
) {
    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming frames from the server
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.as_str().len(), "Frame received");
                        if inbound_tx.send(SessionEvent::Text(text.as_str().to_owned())).is_err() {
                            debug!("Session receiver dropped");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((NO_STATUS_CODE, String::new()));
                        debug!(code, %reason, "WebSocket closed by remote");
                        // Flushes the queued close reply
                        let _ = ws_write.close().await;
                        let _ = inbound_tx.send(SessionEvent::Closed { code, reason });
                        break;
                    }

                    Some(Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake))) | None => {
                        warn!("WebSocket stream ended without close frame");
                        let _ = inbound_tx.send(SessionEvent::Failed(Some(
                            Error::ConnectionClosed.to_string(),
                        )));
                        break;
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        let _ = inbound_tx.send(SessionEvent::Failed(Some(e.to_string())));
                        break;
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            // Frames queued by the manager
            frame = outbound_rx.recv() => {
                match frame {
                    Some(OutboundFrame::Text(text)) => {
                        if let Err(e) = send_text(&mut ws_write, text).await {
                            warn!(error = %e, "Failed to send frame");
                            let _ = inbound_tx.send(SessionEvent::Failed(Some(e.to_string())));
                            break;
                        }
                    }

                    Some(OutboundFrame::Close { code, reason }) => {
                        debug!(code, %reason, "Closing WebSocket");
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        let _ = ws_write.send(Message::Close(Some(frame))).await;
                        break;
                    }

                    None => {
                        debug!("Outbound channel closed");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    debug!("Session loop terminated");
}

/// Writes one text frame.
async fn send_text(ws_write: &mut WsWrite, text: String) -> Result<()> {
    ws_write.send(Message::Text(text.into())).await?;
    trace!("Frame sent");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use url::Url;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_HANDSHAKE_TIMEOUT.as_secs(), 30);
        assert_eq!(NO_STATUS_CODE, 1005);
    }

    #[test]
    fn test_handshake_timeout_override() {
        let transport = WebSocketTransport::new().with_handshake_timeout(Duration::from_secs(5));
        assert_eq!(transport.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(
            WebSocketTransport::default().handshake_timeout(),
            DEFAULT_HANDSHAKE_TIMEOUT
        );
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let request = ConnectRequest {
            endpoint: Url::parse(&format!("ws://127.0.0.1:{port}/ws")).expect("valid url"),
            bearer_token: "token".to_string(),
        };

        let result = WebSocketTransport::new().connect(request).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_token_rejected_before_dialing() {
        let request = ConnectRequest {
            endpoint: Url::parse("ws://127.0.0.1:1/ws").expect("valid url"),
            bearer_token: "bad\ntoken".to_string(),
        };

        let err = WebSocketTransport::new().connect(request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }
}
