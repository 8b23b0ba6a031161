//! Replay-of-one output channels.
//!
//! Each channel keeps only its most recent value. A subscriber attaching
//! after an emission sees that value straight away, then every later value
//! it manages to observe. Slow subscribers skip intermediate values; they
//! never block the manager.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::watch;

// ============================================================================
// Replay
// ============================================================================

/// Sending half of a replay-of-one channel.
///
/// Owned by the manager; subscribers only get [`Subscription`]s.
#[derive(Debug)]
pub(crate) struct Replay<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> Replay<T> {
    /// Creates an empty channel.
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Creates a channel holding an initial value.
    pub(crate) fn with_initial(value: T) -> Self {
        let (tx, _rx) = watch::channel(Some(value));
        Self { tx }
    }

    /// Replaces the retained value and wakes subscribers.
    pub(crate) fn emit(&self, value: T) {
        self.tx.send_replace(Some(value));
    }

    /// Returns the retained value.
    pub(crate) fn latest(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// Attaches a new subscriber.
    pub(crate) fn subscribe(&self) -> Subscription<T> {
        let mut rx = self.tx.subscribe();
        if rx.borrow().is_some() {
            rx.mark_changed();
        }
        Subscription { rx }
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Receiving half of a replay-of-one channel.
#[derive(Debug, Clone)]
pub struct Subscription<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Subscription<T> {
    /// Returns the most recent value without waiting.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// Waits for a value this subscription has not seen yet.
    ///
    /// The first call returns the retained value immediately when the
    /// channel already holds one. Returns `None` once the manager is gone.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Some(value);
            }
        }
    }

    /// Waits until the retained value satisfies `predicate`.
    ///
    /// Checks the current value first. Returns `None` once the manager is gone.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        let value = self
            .rx
            .wait_for(|value| value.as_ref().is_some_and(&mut predicate))
            .await
            .ok()?;
        (*value).clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
