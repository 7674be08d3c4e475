//! Shutdown coordination.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Clones share the same token. Long-running tasks either wait on
/// [`Shutdown::cancelled`] or derive child tokens from [`Shutdown::token`].
#[derive(Debug, Clone)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown triggered");
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_reaches_children() {
        let shutdown = Shutdown::new();
        let child = shutdown.token().child_token();
        let clone = shutdown.clone();

        assert!(!shutdown.is_triggered());
        clone.trigger();
        clone.trigger();

        assert!(shutdown.is_triggered());
        assert!(child.is_cancelled());
        tokio::time::timeout(Duration::from_millis(100), shutdown.cancelled())
            .await
            .expect("already triggered");
    }
}
