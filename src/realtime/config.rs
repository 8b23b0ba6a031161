//! Realtime manager configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use traffic_realtime::RealtimeConfig;
//!
//! let config = RealtimeConfig::new()
//!     .with_reconnect_delay(Duration::from_secs(3))
//!     .with_max_reconnect_attempts(5);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default realtime endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://api.ecoroute.app/ws/realtime";

/// Fixed delay between a failure and the next connect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Failures tolerated before the manager stops reconnecting.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Radius sent with the traffic subscription, in kilometers.
pub const DEFAULT_TRAFFIC_RADIUS_KM: u32 = 10;

// ============================================================================
// RealtimeConfig
// ============================================================================

/// Tunables of a [`RealtimeManager`](crate::RealtimeManager).
///
/// Defaults match the production policy: fixed 3000 ms delay, 5 attempts,
/// 10 km traffic radius.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Session endpoint (`ws` or `wss`).
    pub endpoint: Url,

    /// Delay before each automatic reconnect.
    pub reconnect_delay: Duration,

    /// Automatic reconnects allowed after consecutive failures.
    pub max_reconnect_attempts: u32,

    /// Radius of the traffic subscription in kilometers.
    pub traffic_radius_km: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeConfig {
    /// Creates a configuration with the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoint: default_endpoint(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            traffic_radius_km: DEFAULT_TRAFFIC_RADIUS_KM,
        }
    }

    /// Sets the endpoint from a parsed URL.
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Sets the reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the reconnect attempt cap.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the traffic subscription radius.
    #[inline]
    #[must_use]
    pub fn with_traffic_radius_km(mut self, radius: u32) -> Self {
        self.traffic_radius_km = radius;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the endpoint scheme is not `ws`/`wss`
    /// or the endpoint has no host.
    pub fn validate(&self) -> Result<()> {
        match self.endpoint.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::config(format!(
                    "endpoint scheme must be ws or wss, got {other}"
                )));
            }
        }

        if self.endpoint.host_str().is_none_or(str::is_empty) {
            return Err(Error::config("endpoint has no host"));
        }

        Ok(())
    }
}

/// Parses [`DEFAULT_ENDPOINT`].
fn default_endpoint() -> Url {
    Url::parse(DEFAULT_ENDPOINT).expect("DEFAULT_ENDPOINT is a valid URL")
}

// ============================================================================
// Tests
// ============================================================================
