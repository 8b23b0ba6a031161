//! Traffic Realtime - WebSocket client for live traffic, vehicle telemetry
//! and notification streams.
//!
//! This library keeps one persistent WebSocket session to the realtime
//! endpoint of a traffic-and-sustainability service and multiplexes three
//! independent update streams over it.
//!
//! # Architecture
//!
//! - **Local End (Rust)**: [`RealtimeManager`] owns the session lifecycle,
//!   subscriptions, routing and reconnection
//! - **Remote End (Server)**: pushes JSON envelopes tagged by topic
//!
//! Key design principles:
//!
//! - One event-loop task per manager owns all mutable state
//! - Every frame is a `{type, topic, payload}` envelope
//! - Output channels replay their latest value to new subscribers
//! - Failures surface on the connection-state channel, never as return values
//!
//! # Quick Start
//!
//! ```no_run
//! use traffic_realtime::{ConnectionState, RealtimeManager, Result, StaticTokenProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = RealtimeManager::builder()
//!         .endpoint("wss://realtime.example.com/ws")
//!         .token_provider(StaticTokenProvider::new("access-token", "user-42"))
//!         .build()?;
//!
//!     let mut state = manager.connection_state();
//!     manager.connect();
//!     state.wait_for(ConnectionState::is_connected).await;
//!
//!     manager.send_location_update(52.52, 13.405);
//!
//!     let mut traffic = manager.traffic_updates();
//!     if let Some(update) = traffic.next().await {
//!         println!("{} on {:?}", update.description, update.affected_routes);
//!     }
//!
//!     manager.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Token provider seam |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Envelope and update payload types |
//! | [`realtime`] | [`RealtimeManager`], state and channels |
//! | [`transport`] | Session transport seam and WebSocket client |

// ============================================================================
// Modules
// ============================================================================

/// Credential source for sessions.
pub mod auth;

/// Error types and result aliases.
///
/// Fallible setup operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// WebSocket protocol message types.
///
/// Envelope format and typed stream payloads.
pub mod protocol;

/// Realtime connection manager.
///
/// Use [`RealtimeManager::builder()`] to create a configured manager.
pub mod realtime;

/// Session transport layer.
///
/// [`Transport`](transport::Transport) trait and the tokio-tungstenite client.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Credential types
pub use auth::{StaticTokenProvider, TokenProvider};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{
    Emissions, Envelope, GeoPoint, MessageType, RealTimeUpdate, Topic, TrafficUpdate,
    VehicleTelemetryUpdate,
};

// Manager types
pub use realtime::{
    ConnectionState, RealtimeConfig, RealtimeManager, RealtimeManagerBuilder, Subscription,
};

// Transport types
pub use transport::{Transport, WebSocketTransport};
