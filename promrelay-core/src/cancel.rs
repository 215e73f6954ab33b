//! Cooperative cancellation for collection requests
//!
//! A [`CancellationToken`] is handed to the executor so that a stalled remote
//! command can be abandoned. The chain is still released in order when that
//! happens.

use std::sync::Arc;

use tokio::sync::watch;

/// Token for cancelling an in-flight collection
///
/// Clones share one state; cancelling one cancels all of them. Waiters in
/// [`Self::cancelled`] are woken by [`Self::cancel`] directly.
#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Creates a new, non-cancelled token
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Cancels every operation observing this token
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    /// Checks if the token has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Clears the cancelled state so the token can be reused
    pub fn reset(&self) {
        self.state.send_replace(false);
    }

    /// Completes once the token is cancelled
    pub async fn cancelled(&self) {
        let mut observer = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns once the
        // flag is set.
        let _ = observer.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
