//! WebSocket protocol message types.
//!
//! This module defines the message format exchanged with the realtime
//! endpoint. Every frame, in either direction, is a JSON [`Envelope`].
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Topic | Purpose |
//! |--------------|-----------|-------|---------|
//! | `SUBSCRIBE` | Local → Remote | stream topic | Start a stream |
//! | `LOCATION_UPDATE` | Local → Remote | `location` | Report device position |
//! | `TRAFFIC_REPORT` | Local → Remote | `traffic-incidents` | Report an incident |
//! | any (e.g. `DATA`) | Remote → Local | stream topic | Stream update |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Envelope, topics and message types |
//! | `update` | Typed stream payloads |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope, topic and message type definitions.
pub mod envelope;

/// Typed update payloads delivered on stream topics.
pub mod update;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{Envelope, MessageType, Topic};
pub use update::{Emissions, GeoPoint, RealTimeUpdate, TrafficUpdate, VehicleTelemetryUpdate};
