//! Reconnect policy with exponential backoff
//!
//! Bounded strategy:
//! - At most `max_attempts` connect attempts per `acquire()`
//! - Binary exponential delay between attempts, capped, with ±25% jitter
//! - The last error is surfaced unchanged once attempts run out

use crate::errors::{BridgeError, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Default number of connect attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff
const BASE_DELAY_MS: u64 = 250;

/// Maximum delay cap
const MAX_DELAY_MS: u64 = 4000;

/// Reconnect policy
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum attempts (including the first)
    max_attempts: u32,

    /// Base delay in milliseconds
    base_delay_ms: u64,

    /// Maximum delay cap in milliseconds
    max_delay_ms: u64,

    /// Enable jitter
    enable_jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconnectPolicy {
    /// Create policy with default settings
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: BASE_DELAY_MS,
            max_delay_ms: MAX_DELAY_MS,
            enable_jitter: true,
        }
    }

    /// Create policy with custom settings
    pub fn with_config(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
            enable_jitter: true,
        }
    }

    /// Disable jitter (deterministic delays)
    pub fn without_jitter(mut self) -> Self {
        self.enable_jitter = false;
        self
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !Self::is_retryable(&e) || attempt >= self.max_attempts {
                        return Err(e);
                    }

                    let delay = self.calculate_delay(attempt - 1);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "connect attempt failed, backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Calculate delay after the given (zero-based) failed attempt
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential_delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));

        let delay_ms = exponential_delay.min(self.max_delay_ms);

        let final_delay = if self.enable_jitter {
            let jitter = (delay_ms / 4) as i64;
            let random_jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter as f64;
            ((delay_ms as i64) + random_jitter as i64).max(0) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }

    /// Authentication failures are permanent; everything else transport-level is transient
    fn is_retryable(error: &BridgeError) -> bool {
        use crate::errors::ConnectionErrorKind::*;

        matches!(
            error.connection_kind(),
            Some(Unreachable) | Some(TimedOut) | Some(Reset)
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
