//! Inbound frame routing.
//!
//! Decodes a text frame into an [`Envelope`] and its payload into the typed
//! update for the envelope's topic.
//!
//! | Topic | Payload | Output |
//! |-------|---------|--------|
//! | `traffic-updates` | [`TrafficUpdate`] | traffic channel |
//! | `vehicle-telemetry` | [`VehicleTelemetryUpdate`] | telemetry channel |
//! | `notifications` | [`RealTimeUpdate`] | notification channel |
//! | anything else | - | dropped |

// ============================================================================
// Imports
// ============================================================================

use tracing::debug;

use crate::error::Result;
use crate::protocol::{Envelope, RealTimeUpdate, Topic, TrafficUpdate, VehicleTelemetryUpdate};

// ============================================================================
// Routed
// ============================================================================

/// A decoded update bound for one output channel.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Routed {
    Traffic(TrafficUpdate),
    Telemetry(VehicleTelemetryUpdate),
    Notification(RealTimeUpdate),
}

// ============================================================================
// Routing
// ============================================================================

/// Routes one inbound frame.
///
/// Returns `Ok(None)` for topics without an output channel.
///
/// # Errors
///
/// Returns an error if the frame is not an envelope or the payload does not
/// match its topic.
pub(crate) fn route(text: &str) -> Result<Option<Routed>> {
    let envelope = Envelope::decode(text)?;

    let routed = match envelope.known_topic() {
        Some(Topic::TrafficUpdates) => Routed::Traffic(envelope.into_payload()?),
        Some(Topic::VehicleTelemetry) => Routed::Telemetry(envelope.into_payload()?),
        Some(Topic::Notifications) => Routed::Notification(envelope.into_payload()?),
        Some(Topic::Location | Topic::TrafficIncidents) | None => {
            debug!(topic = %envelope.topic, "No output channel for topic");
            return Ok(None);
        }
    };

    Ok(Some(routed))
}

// ============================================================================
// Tests
// ============================================================================
