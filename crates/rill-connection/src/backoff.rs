//! Exponential backoff schedule for connection construction
//!
//! A fresh [`ExponentialBackoff`] is taken per retry loop; the schedule
//! grows exponentially with jitter, caps each step at a maximum interval,
//! and stops entirely once a total elapsed budget is spent.

use std::time::{Duration, Instant};

/// Default first delay between attempts
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(100);
/// Default cap on a single delay step
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(1);
/// Default total retry budget
pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(180);

/// Parameters of the backoff schedule
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_interval: Duration,
    /// Cap on any single delay step
    pub max_interval: Duration,
    /// Total budget; once spent, no further retries
    pub max_elapsed: Duration,
    /// Growth factor between steps
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0) applied to each step
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            max_elapsed: DEFAULT_MAX_ELAPSED,
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Create a config with the default schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial interval (builder pattern)
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Set the per-step cap (builder pattern)
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Set the total elapsed budget (builder pattern)
    pub fn with_max_elapsed(mut self, budget: Duration) -> Self {
        self.max_elapsed = budget;
        self
    }

    /// Set the growth multiplier (builder pattern)
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the jitter factor, clamped to [0.0, 1.0] (builder pattern)
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }
}

/// A running backoff schedule
///
/// Stateful over one retry loop only; callers construct a new instance for
/// each connection attempt sequence.
#[derive(Debug)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    attempt: u32,
    start: Instant,
}

impl ExponentialBackoff {
    /// Start a schedule; the elapsed budget is measured from this call
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempt: 0,
            start: Instant::now(),
        }
    }

    /// Next delay to sleep before retrying, or `None` once the elapsed
    /// budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.start.elapsed() >= self.config.max_elapsed {
            return None;
        }

        // cap attempt to prevent i32 overflow and degenerate growth
        let capped_attempt = self.attempt.min(30);
        let base = self.config.initial_interval.as_millis() as f64
            * self.config.multiplier.powi(capped_attempt as i32);
        let capped = base.min(self.config.max_interval.as_millis() as f64);

        // Deterministic jitter keyed on the attempt number
        let jitter = if self.config.jitter_factor > 0.0 {
            let range = capped * self.config.jitter_factor;
            let value = ((self.attempt + 1) as f64 * 0.618033988749895) % 1.0;
            range * (value - 0.5) * 2.0
        } else {
            0.0
        };

        self.attempt += 1;
        Some(Duration::from_millis((capped + jitter).max(0.0) as u64))
    }

    /// Number of delays handed out so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Time since the schedule started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Restart the schedule from now
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.start = Instant::now();
    }
}
