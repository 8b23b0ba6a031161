//! Realtime connection manager.
//!
//! The [`RealtimeManager`] keeps one WebSocket session open, subscribes to
//! the traffic, vehicle telemetry and notification streams, routes inbound
//! frames to typed replay-of-one channels and reconnects after failures on
//! a fixed interval, up to a fixed number of attempts.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `actor` | Event loop owning all session state |
//! | `builder` | Fluent manager construction |
//! | `channel` | Replay-of-one output channels |
//! | `config` | Endpoint and reconnect policy |
//! | `manager` | Public handle |
//! | `router` | Inbound frame decoding and dispatch |
//! | `state` | Connection state |

// ============================================================================
// Submodules
// ============================================================================

mod actor;

/// Fluent manager construction.
pub mod builder;

/// Replay-of-one output channels.
pub mod channel;

/// Endpoint and reconnect policy.
pub mod config;

/// Public manager handle.
pub mod manager;

mod router;

/// Connection state.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::RealtimeManagerBuilder;
pub use channel::Subscription;
pub use config::{
    DEFAULT_ENDPOINT, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY,
    DEFAULT_TRAFFIC_RADIUS_KM, RealtimeConfig,
};
pub use manager::RealtimeManager;
pub use state::ConnectionState;
