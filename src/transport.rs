//! Transport collaborator interface
//!
//! The client never opens sockets or serial ports. It hands complete frames
//! to a [`ModbusTransport`] and receives complete frames back. Implementations
//! own connection lifecycle and enforce their timeout, reporting expiry as
//! [`ModbusError::Timeout`](crate::ModbusError::Timeout).
//!
//! The same trait carries both framings: the frame codec decides what the
//! bytes look like, the transport only moves them.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{ModbusError, ModbusResult};

/// Byte-level request/response channel to one Modbus device or gateway.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use bytes::Bytes;
/// use modbus_master::{ModbusResult, ModbusTransport};
///
/// /// Answers every request with the same frame.
/// struct Canned {
///     reply: Bytes,
///     timeout: Duration,
/// }
///
/// impl ModbusTransport for Canned {
///     async fn connect(&mut self) -> ModbusResult<bool> {
///         Ok(true)
///     }
///
///     async fn disconnect(&mut self) -> ModbusResult<()> {
///         Ok(())
///     }
///
///     fn is_connected(&self) -> bool {
///         true
///     }
///
///     async fn send_receive(&mut self, _request: &[u8]) -> ModbusResult<Bytes> {
///         Ok(self.reply.clone())
///     }
///
///     fn timeout(&self) -> Duration {
///         self.timeout
///     }
///
///     fn set_timeout(&mut self, timeout: Duration) {
///         self.timeout = timeout;
///     }
/// }
/// ```
pub trait ModbusTransport: Send + Sync {
    /// Open the connection; `Ok(false)` when the peer refused without an I/O error
    fn connect(&mut self) -> impl Future<Output = ModbusResult<bool>> + Send;

    /// Close the connection
    fn disconnect(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Whether the connection is open
    fn is_connected(&self) -> bool;

    /// Send one request frame and return the complete response frame
    fn send_receive(&mut self, request: &[u8]) -> impl Future<Output = ModbusResult<Bytes>> + Send;

    /// Response timeout
    fn timeout(&self) -> Duration;

    /// Change the response timeout
    fn set_timeout(&mut self, timeout: Duration);
}

/// Request counters kept by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    /// Failed attempts, retried ones included
    pub errors: u64,
    pub timeouts: u64,
    /// Exception responses from remote units
    pub exceptions: u64,
    pub retries: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl TransportStats {
    /// Record a frame handed to the transport
    pub(crate) fn record_sent(&mut self, len: usize) {
        self.requests_sent += 1;
        self.bytes_sent += len as u64;
    }

    /// Record a frame returned by the transport
    pub(crate) fn record_received(&mut self, len: usize) {
        self.responses_received += 1;
        self.bytes_received += len as u64;
    }

    /// Record a failed attempt
    pub(crate) fn record_error(&mut self, error: &ModbusError) {
        self.errors += 1;
        match error {
            ModbusError::Timeout { .. } => self.timeouts += 1,
            ModbusError::Exception { .. } => self.exceptions += 1,
            _ => {}
        }
    }

    /// Fraction of attempts that failed, 0.0 before any request
    pub fn error_rate(&self) -> f64 {
        if self.requests_sent == 0 {
            0.0
        } else {
            self.errors as f64 / self.requests_sent as f64
        }
    }
}
