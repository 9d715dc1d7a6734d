//! Configuration surface for the connection registry

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registry configuration, read once at construction
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Total retry budget for initial connection construction, in
    /// milliseconds. Overrides the backoff policy's 3-minute default.
    #[serde(default = "default_backoff_max_elapsed_ms")]
    pub backoff_max_elapsed_ms: u64,
}

fn default_backoff_max_elapsed_ms() -> u64 {
    180_000 // 3 minutes
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backoff_max_elapsed_ms: default_backoff_max_elapsed_ms(),
        }
    }
}

impl ConnectionConfig {
    /// The configured retry budget as a [`Duration`]
    pub fn backoff_max_elapsed(&self) -> Duration {
        Duration::from_millis(self.backoff_max_elapsed_ms)
    }
}
