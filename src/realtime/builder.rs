//! Builder pattern for manager configuration.
//!
//! Provides a fluent API for configuring and creating [`RealtimeManager`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use traffic_realtime::{RealtimeManager, StaticTokenProvider};
//!
//! # fn example() -> traffic_realtime::Result<()> {
//! let manager = RealtimeManager::builder()
//!     .endpoint("wss://realtime.example.com/ws")
//!     .reconnect_delay(Duration::from_secs(3))
//!     .token_provider(StaticTokenProvider::new("token", "user-1"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use url::Url;

use crate::auth::TokenProvider;
use crate::error::{Error, Result};
use crate::transport::{Transport, WebSocketTransport};

use super::config::RealtimeConfig;
use super::manager::RealtimeManager;

// ============================================================================
// RealtimeManagerBuilder
// ============================================================================

/// Builder for configuring a [`RealtimeManager`] instance.
///
/// Use [`RealtimeManager::builder()`] to create a new builder.
#[derive(Default)]
pub struct RealtimeManagerBuilder {
    /// Base configuration.
    config: RealtimeConfig,
    /// Endpoint override, parsed at build time.
    endpoint: Option<String>,
    /// Credential source.
    token_provider: Option<Arc<dyn TokenProvider>>,
    /// Session transport; WebSocket when unset.
    transport: Option<Arc<dyn Transport>>,
}

// ============================================================================
// RealtimeManagerBuilder Implementation
// ============================================================================

impl RealtimeManagerBuilder {
    /// Creates a new builder with the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    ///
    /// An endpoint set with [`endpoint`](Self::endpoint) still takes precedence.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: RealtimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the endpoint URL (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the delay before each automatic reconnect.
    #[inline]
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// Sets how many automatic reconnects follow consecutive failures.
    #[inline]
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the traffic subscription radius in kilometers.
    #[inline]
    #[must_use]
    pub fn traffic_radius_km(mut self, radius: u32) -> Self {
        self.config.traffic_radius_km = radius;
        self
    }

    /// Sets the credential source.
    #[inline]
    #[must_use]
    pub fn token_provider(mut self, provider: impl TokenProvider) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Sets a credential source shared with the rest of the application.
    #[inline]
    #[must_use]
    pub fn shared_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Sets the session transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets a session transport shared with other owners.
    #[inline]
    #[must_use]
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validates the configuration and starts the manager.
    ///
    /// The manager starts disconnected; call
    /// [`connect`](RealtimeManager::connect) to open the session.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no token provider is set
    /// - [`Error::Url`] if the endpoint cannot be parsed
    /// - [`Error::Config`] if the endpoint is not a `ws`/`wss` URL
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn build(self) -> Result<RealtimeManager> {
        let config = self.validate_config()?;
        let token_provider = self.token_provider.ok_or_else(|| {
            Error::config(
                "token provider is required. Use .token_provider() to set it.\n\
                 Example: RealtimeManager::builder().token_provider(StaticTokenProvider::new(token, user_id))",
            )
        })?;

        if Handle::try_current().is_err() {
            return Err(Error::config(
                "RealtimeManager must be built inside a tokio runtime",
            ));
        }

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WebSocketTransport::new()) as Arc<dyn Transport>);

        Ok(RealtimeManager::spawn(config, transport, token_provider))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl RealtimeManagerBuilder {
    /// Applies the endpoint override and validates the result.
    fn validate_config(&self) -> Result<RealtimeConfig> {
        let mut config = self.config.clone();
        if let Some(ref endpoint) = self.endpoint {
            config.endpoint = Url::parse(endpoint)?;
        }
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::auth::StaticTokenProvider;
    use crate::realtime::ConnectionState;

    #[test]
    fn test_builder_default_config() {
        let builder = RealtimeManagerBuilder::new();
        assert_eq!(builder.config, RealtimeConfig::default());
        assert!(builder.endpoint.is_none());
        assert!(builder.token_provider.is_none());
        assert!(builder.transport.is_none());
    }

    #[test]
    fn test_builder_setters() {
        let builder = RealtimeManagerBuilder::new()
            .endpoint("ws://localhost:8080/ws")
            .reconnect_delay(Duration::from_millis(250))
            .max_reconnect_attempts(2)
            .traffic_radius_km(3);

        let config = builder.validate_config().expect("valid config");
        assert_eq!(config.endpoint.as_str(), "ws://localhost:8080/ws");
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.max_reconnect_attempts, 2);
        assert_eq!(config.traffic_radius_km, 3);
    }

    #[test]
    fn test_build_without_token_provider_fails() {
        let result = RealtimeManagerBuilder::new().build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_with_bad_endpoint_fails() {
        let result = RealtimeManagerBuilder::new()
            .endpoint("not a url")
            .token_provider(StaticTokenProvider::default())
            .build();
        assert!(matches!(result, Err(Error::Url(_))));

        let result = RealtimeManagerBuilder::new()
            .endpoint("http://example.com/ws")
            .token_provider(StaticTokenProvider::default())
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let result = RealtimeManagerBuilder::new()
            .token_provider(StaticTokenProvider::default())
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_build_starts_disconnected() {
        let manager = RealtimeManagerBuilder::new()
            .endpoint("ws://127.0.0.1:9/ws")
            .token_provider(StaticTokenProvider::new("t", "u"))
            .build()
            .expect("build should succeed");

        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
