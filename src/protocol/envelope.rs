//! Envelope message type.
//!
//! Outbound subscription and report messages, and inbound stream updates,
//! share a single JSON shape.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};

// ============================================================================
// Envelope
// ============================================================================

/// A message exchanged with the realtime endpoint.
///
/// # Format
///
/// ```json
/// {
///   "type": "SUBSCRIBE",
///   "topic": "traffic-updates",
///   "payload": { "userId": "u-1", "radius": 10 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message intent (`SUBSCRIBE`, `LOCATION_UPDATE`, `DATA`, ...).
    #[serde(rename = "type", default)]
    pub message_type: String,

    /// Routing key for inbound dispatch.
    pub topic: String,

    /// Topic-specific data.
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Creates a new envelope.
    #[inline]
    #[must_use]
    pub fn new(message_type: MessageType, topic: Topic, payload: Value) -> Self {
        Self {
            message_type: message_type.as_str().to_string(),
            topic: topic.as_str().to_string(),
            payload,
        }
    }

    /// Creates a `SUBSCRIBE` envelope for a stream topic.
    #[inline]
    #[must_use]
    pub fn subscribe(topic: Topic, payload: Value) -> Self {
        Self::new(MessageType::Subscribe, topic, payload)
    }

    /// Creates a `LOCATION_UPDATE` envelope.
    #[must_use]
    pub fn location_update(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self::new(
            MessageType::LocationUpdate,
            Topic::Location,
            json!({
                "latitude": latitude,
                "longitude": longitude,
                "timestamp": timestamp,
            }),
        )
    }

    /// Creates a `TRAFFIC_REPORT` envelope wrapping an application report.
    #[must_use]
    pub fn traffic_report(report: Value, timestamp: i64) -> Self {
        Self::new(
            MessageType::TrafficReport,
            Topic::TrafficIncidents,
            json!({
                "report": report,
                "timestamp": timestamp,
            }),
        )
    }

    /// Decodes an envelope from a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the frame is not a valid envelope.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encodes the envelope as a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns the routing topic if it is one this crate knows.
    #[inline]
    #[must_use]
    pub fn known_topic(&self) -> Option<Topic> {
        Topic::parse(&self.topic)
    }

    /// Consumes the envelope and decodes its payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the payload does not match `T`.
    pub fn into_payload<T: DeserializeOwned>(self) -> Result<T> {
        let topic = self.topic;
        serde_json::from_value(self.payload)
            .map_err(|e| Error::protocol(format!("invalid payload for topic {topic}: {e}")))
    }
}

// ============================================================================
// MessageType
// ============================================================================

/// Outbound message intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Start receiving a stream.
    Subscribe,
    /// Device position report.
    LocationUpdate,
    /// Traffic incident report.
    TrafficReport,
}

impl MessageType {
    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "SUBSCRIBE",
            Self::LocationUpdate => "LOCATION_UPDATE",
            Self::TrafficReport => "TRAFFIC_REPORT",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Topic
// ============================================================================

/// Routing topics used by the realtime endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Traffic incident stream.
    TrafficUpdates,
    /// Vehicle telemetry stream.
    VehicleTelemetry,
    /// General notification stream.
    Notifications,
    /// Outbound device location.
    Location,
    /// Outbound incident reports.
    TrafficIncidents,
}

impl Topic {
    /// Stream topics subscribed to on every session open, in order.
    pub const SUBSCRIBED: [Topic; 3] = [
        Topic::TrafficUpdates,
        Topic::VehicleTelemetry,
        Topic::Notifications,
    ];

    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TrafficUpdates => "traffic-updates",
            Self::VehicleTelemetry => "vehicle-telemetry",
            Self::Notifications => "notifications",
            Self::Location => "location",
            Self::TrafficIncidents => "traffic-incidents",
        }
    }

    /// Looks up a topic by wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "traffic-updates" => Some(Self::TrafficUpdates),
            "vehicle-telemetry" => Some(Self::VehicleTelemetry),
            "notifications" => Some(Self::Notifications),
            "location" => Some(Self::Location),
            "traffic-incidents" => Some(Self::TrafficIncidents),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
