//! Credential source for realtime sessions.
//!
//! The manager asks the provider for a fresh access token on every connect
//! attempt, so token renewal done elsewhere is picked up by the next
//! reconnect. Both calls are synchronous and may return empty or stale
//! values; the manager logs and carries on.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;

// ============================================================================
// TokenProvider
// ============================================================================

/// Supplies the bearer token and user id for a realtime session.
pub trait TokenProvider: Send + Sync + 'static {
    /// Returns the current access token.
    fn access_token(&self) -> String;

    /// Returns the id of the signed-in user.
    fn current_user_id(&self) -> String;
}

// ============================================================================
// StaticTokenProvider
// ============================================================================

/// A [`TokenProvider`] holding values set by the application.
///
/// Values can be replaced at runtime with [`set_access_token`](Self::set_access_token),
/// which the next connect attempt observes.
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    access_token: RwLock<String>,
    user_id: RwLock<String>,
}

impl StaticTokenProvider {
    /// Creates a provider with the given token and user id.
    #[must_use]
    pub fn new(access_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            access_token: RwLock::new(access_token.into()),
            user_id: RwLock::new(user_id.into()),
        }
    }

    /// Replaces the access token.
    pub fn set_access_token(&self, token: impl Into<String>) {
        *self.access_token.write() = token.into();
    }

    /// Replaces the user id.
    pub fn set_user_id(&self, user_id: impl Into<String>) {
        *self.user_id.write() = user_id.into();
    }
}

impl TokenProvider for StaticTokenProvider {
    fn access_token(&self) -> String {
        self.access_token.read().clone()
    }

    fn current_user_id(&self) -> String {
        self.user_id.read().clone()
    }
}

impl<T: TokenProvider> TokenProvider for std::sync::Arc<T> {
    fn access_token(&self) -> String {
        (**self).access_token()
    }

    fn current_user_id(&self) -> String {
        (**self).current_user_id()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[test]
    fn test_static_provider_values() {
        let provider = StaticTokenProvider::new("tok-1", "user-1");
        assert_eq!(provider.access_token(), "tok-1");
        assert_eq!(provider.current_user_id(), "user-1");
    }

    #[test]
    fn test_token_rotation_visible_through_arc() {
        let provider = Arc::new(StaticTokenProvider::new("old", "u"));
        let shared: Arc<StaticTokenProvider> = Arc::clone(&provider);

        provider.set_access_token("new");
        provider.set_user_id("u2");

        assert_eq!(shared.access_token(), "new");
        assert_eq!(shared.current_user_id(), "u2");
    }

    #[test]
    fn test_default_is_empty() {
        let provider = StaticTokenProvider::default();
        assert!(provider.access_token().is_empty());
        assert!(provider.current_user_id().is_empty());
    }
}
