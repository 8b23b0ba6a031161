//! Typed update payloads.
//!
//! Payloads of the `traffic-updates`, `vehicle-telemetry` and
//! `notifications` topics. Field names are camelCase on the wire.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Shared Value Types
// ============================================================================

/// A geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// Vehicle emission readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emissions {
    /// Carbon dioxide.
    pub co2: f64,
    /// Nitrogen oxides.
    pub nox: f64,
    /// Fine particulate matter.
    pub pm25: f64,
}

// ============================================================================
// TrafficUpdate
// ============================================================================

/// A traffic incident or congestion update.
///
/// # Format
///
/// ```json
/// {
///   "id": "t1",
///   "location": { "lat": 1.0, "lon": 2.0 },
///   "severity": "high",
///   "description": "jam",
///   "timestamp": 1000,
///   "affectedRoutes": ["R1"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficUpdate {
    /// Incident id.
    pub id: String,
    /// Incident position.
    pub location: GeoPoint,
    /// Severity label as sent by the server.
    pub severity: String,
    /// Human-readable description.
    pub description: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Route identifiers affected, in server order.
    #[serde(default)]
    pub affected_routes: Vec<String>,
}

// ============================================================================
// VehicleTelemetryUpdate
// ============================================================================

/// A telemetry sample for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleTelemetryUpdate {
    /// Vehicle id.
    pub vehicle_id: String,
    /// Current speed.
    pub speed: f64,
    /// Remaining fuel level.
    pub fuel_level: f64,
    /// Emission readings.
    pub emissions: Emissions,
    /// Vehicle position.
    pub location: GeoPoint,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

// ============================================================================
// RealTimeUpdate
// ============================================================================

/// A notification payload.
///
/// The structure is owned by the server; it is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RealTimeUpdate(pub Value);

impl RealTimeUpdate {
    /// Returns the raw payload.
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the update and returns the raw payload.
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

// ============================================================================
// Tests
// ============================================================================
