//! Shutdown coordination.

use tokio_util::sync::CancellationToken;

/// Coordinator for cooperative shutdown.
///
/// Hands out the token every policy call observes. Triggering it aborts
/// in-flight attempts and backoff waits.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// The token to pass to `execute_resiliently_cancellable`.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }
}
