//! Polling with exponential backoff
//!
//! Time is injected through [`Clock`] so stack waits can be driven without
//! a wall clock.

use async_trait::async_trait;
use std::time::Duration;

/// Source of delays for polling loops
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Shortest delay between two status checks
pub const MIN_POLL_DELAY: Duration = Duration::from_millis(100);

/// Backoff settings for stack status polling
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay before the second status check
    pub initial_delay: Duration,
    /// Ceiling for a single delay
    pub max_delay: Duration,
    /// Exponential growth factor; values below 1 are treated as 1
    pub multiplier: f64,
    /// Ceiling on the accumulated delay of one wait
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl PollConfig {
    /// Delay before check `attempt + 1`, never shorter than [`MIN_POLL_DELAY`]
    ///
    /// A non-growing delay would let a wait poll forever without using up
    /// its timeout.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            1.0
        };
        let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64).max(MIN_POLL_DELAY)
    }
}

/// State of one polling loop
#[derive(Debug)]
pub struct Backoff {
    config: PollConfig,
    attempt: u32,
    waited: Duration,
}

impl Backoff {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            attempt: 0,
            waited: Duration::ZERO,
        }
    }

    /// Total delay slept so far
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Sleep for the next delay, clamped to what is left of the timeout
    ///
    /// Returns `false` without sleeping once the timeout is used up.
    pub async fn wait(&mut self, clock: &dyn Clock) -> bool {
        let remaining = self.config.timeout.saturating_sub(self.waited);
        if remaining.is_zero() {
            return false;
        }
        let delay = self.config.delay_for_attempt(self.attempt).min(remaining);
        clock.sleep(delay).await;
        self.waited += delay;
        self.attempt = self.attempt.saturating_add(1);
        true
    }
}
