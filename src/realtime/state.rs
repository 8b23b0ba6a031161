//! Connection state reported by the manager.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Failure reason used when the transport gives none.
pub const UNKNOWN_FAILURE_REASON: &str = "Unknown error";

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the realtime session.
///
/// ```text
/// Disconnected ──connect()──► Connecting ──open──► Connected
///       ▲                        │                    │
///       │                        └──failure──► Failed ◄┘
///       │                                        │
///       └──── remote close / disconnect() / attempts exhausted
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// A connect attempt is in flight.
    Connecting,
    /// Session is open and subscriptions were sent.
    Connected,
    /// No session, and none scheduled.
    #[default]
    Disconnected,
    /// The last session attempt or session failed.
    Failed(String),
}

impl ConnectionState {
    /// Creates a failed state, substituting a placeholder for a missing reason.
    #[must_use]
    pub fn failed(reason: Option<String>) -> Self {
        match reason {
            Some(reason) if !reason.is_empty() => Self::Failed(reason),
            _ => Self::Failed(UNKNOWN_FAILURE_REASON.to_string()),
        }
    }

    /// Returns `true` when the session is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` for the failed state.
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the failure reason, if any.
    #[inline]
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
