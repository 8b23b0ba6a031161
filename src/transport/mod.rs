//! Session transport layer.
//!
//! This module defines the seam between the
//! [`RealtimeManager`](crate::RealtimeManager) and the network. A
//! [`Transport`] opens one session per connect attempt and hands back a
//! pair of channels: an outbound sender for frames and an inbound receiver
//! of [`SessionEvent`]s. All transport callbacks reach the manager through
//! that receiver, so the manager's task stays the only writer of its state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   OutboundFrame    ┌──────────────────┐         ┌──────────┐
//! │ RealtimeManager  │───────────────────►│  session loop    │◄───────►│  server  │
//! │ (actor task)     │◄───────────────────│  (transport task)│   WSS   │          │
//! └──────────────────┘    SessionEvent    └──────────────────┘         └──────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | tokio-tungstenite client transport |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket client transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::WebSocketTransport;

// ============================================================================
// Constants
// ============================================================================

/// Close code sent on a local disconnect.
pub const NORMAL_CLOSURE_CODE: u16 = 1000;

/// Close reason sent on a local disconnect.
pub const NORMAL_CLOSURE_REASON: &str = "Normal closure";

// ============================================================================
// Types
// ============================================================================

/// Parameters for opening a session.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Endpoint to connect to.
    pub endpoint: Url,
    /// Token placed in the `Authorization: Bearer` header.
    pub bearer_token: String,
}

/// A frame queued for the remote end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// JSON text frame.
    Text(String),
    /// Close handshake; the session ends after it is sent.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

impl OutboundFrame {
    /// The close frame used by a local disconnect.
    #[must_use]
    pub fn normal_closure() -> Self {
        Self::Close {
            code: NORMAL_CLOSURE_CODE,
            reason: NORMAL_CLOSURE_REASON.to_string(),
        }
    }
}

/// Something that happened on an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Text frame received.
    Text(String),
    /// Remote end completed a close handshake.
    Closed {
        /// Close code sent by the remote end.
        code: u16,
        /// Close reason sent by the remote end.
        reason: String,
    },
    /// Session broke; carries the error description when one exists.
    Failed(Option<String>),
}

/// Channel pair of an established session.
///
/// Dropping `outbound` ends the session.
#[derive(Debug)]
pub struct SessionChannels {
    /// Frames to send.
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    /// Events from the remote end.
    pub inbound: mpsc::UnboundedReceiver<SessionEvent>,
}

// ============================================================================
// Transport
// ============================================================================

/// Opens realtime sessions.
///
/// `connect` resolves once the handshake completes (the session is open)
/// or fails with the handshake error.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be established.
    async fn connect(&self, request: ConnectRequest) -> Result<SessionChannels>;
}

// ============================================================================
// Tests
// ============================================================================
