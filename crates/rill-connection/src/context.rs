//! Stream context passed through the registry
//!
//! Carries cancellation down to connection factories, `ping` and `close`.
//! The registry forwards the context and never cancels it itself.

use tokio_util::sync::CancellationToken;

/// Cancellation scope for a pipeline interacting with the registry
#[derive(Debug, Clone, Default)]
pub struct StreamContext {
    cancel: CancellationToken,
}

impl StreamContext {
    /// Fresh root context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for registry-internal work such as reload; never cancelled
    /// by any pipeline.
    pub fn background() -> Self {
        Self::new()
    }

    /// Derive a context cancelled together with this one
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
        }
    }

    /// Cancel this context and all children
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolve when cancellation is requested
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// The underlying token, for factories that select! against it
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
