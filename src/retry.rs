//! Retry decisions for request execution
//!
//! The executor drives an explicit [`AttemptState`] through a
//! [`RetryPolicy`]. The retry decision itself is the pure function
//! [`should_retry`], so it can be tested without any I/O.

use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::ModbusError;

/// Retry when attempts remain and the failure is transient.
///
/// Transient failures are timeouts, communication errors and the
/// "slave device busy" exception. Everything else propagates at once.
#[inline]
pub fn should_retry(error: &ModbusError, attempts_left: u32) -> bool {
    attempts_left > 0 && error.is_retryable()
}

/// Linear backoff: `base × (attempt + 1)` for the zero-based attempt that failed.
#[inline]
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.saturating_add(1))
}

/// Where a request is in its retry cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Attempt `attempt` (zero-based) is about to run
    Attempting { attempt: u32 },
    /// Attempt `attempt` failed; wait `delay` before the next one
    Backoff { attempt: u32, delay: Duration },
    /// Attempt `attempt` produced a response
    Succeeded { attempt: u32 },
    /// Attempt `attempt` failed and no retry follows
    Failed { attempt: u32 },
}

impl AttemptState {
    /// Whether the cycle has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }
}

/// Retry budget and backoff base for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Policy allowing `max_retries` retries after the first attempt
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Retries after the first attempt
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts, first one included
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff base
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Initial state of a new request
    pub fn start(&self) -> AttemptState {
        AttemptState::Attempting { attempt: 0 }
    }

    /// State after attempt `attempt` succeeded
    pub fn on_success(&self, attempt: u32) -> AttemptState {
        AttemptState::Succeeded { attempt }
    }

    /// State after attempt `attempt` failed with `error`
    pub fn on_failure(&self, attempt: u32, error: &ModbusError) -> AttemptState {
        let attempts_left = self.max_retries.saturating_sub(attempt);
        if should_retry(error, attempts_left) {
            AttemptState::Backoff {
                attempt,
                delay: backoff_delay(self.base_delay, attempt),
            }
        } else {
            AttemptState::Failed { attempt }
        }
    }

    /// State once the backoff after attempt `attempt` has elapsed
    pub fn after_backoff(&self, attempt: u32) -> AttemptState {
        AttemptState::Attempting {
            attempt: attempt + 1,
        }
    }
}

impl From<&ClientConfig> for RetryPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self::new(config.retries, config.retry_base_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}
