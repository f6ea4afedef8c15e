//! # Client Configuration
//!
//! Retry budget, backoff base and transport timeout for a
//! [`GenericModbusClient`](crate::client::GenericModbusClient).
//!
//! The core never enforces timeouts itself. The configured timeout is handed
//! to the transport, which reports expiry as [`ModbusError::Timeout`](crate::ModbusError::Timeout).

use std::time::Duration;

/// Default retries after the first attempt.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default linear backoff base in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;

/// Default transport timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Request execution settings.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use modbus_master::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_retries(5)
///     .with_timeout(Duration::from_millis(500));
///
/// assert_eq!(config.retries, 5);
/// assert_eq!(config.retry_base_delay, Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Backoff base; the wait after attempt `n` is `base × (n + 1)`.
    pub retry_base_delay: Duration,
    /// Transport timeout applied when the client is built.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    /// Set the retry count.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the backoff base.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Set the transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Worst-case total backoff across all retries.
    pub fn max_total_backoff(&self) -> Duration {
        (0..self.retries).fold(Duration::ZERO, |acc, attempt| {
            acc.saturating_add(crate::retry::backoff_delay(self.retry_base_delay, attempt))
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
