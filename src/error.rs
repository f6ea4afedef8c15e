//! Error types for Modbus master operations
//!
//! Every fallible operation in the crate returns [`ModbusResult`]. The variants
//! map one-to-one onto the failure kinds a caller needs to tell apart: local
//! argument mistakes, link failures, malformed frames, and protocol exceptions
//! reported by the remote unit.

use thiserror::Error;

use crate::protocol::{ExceptionCode, ModbusFunction, SlaveId};

/// Result type alias for Modbus operations
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Modbus error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModbusError {
    /// Transport is not open or the link failed
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Malformed or corrupted frame, CRC mismatch, short read
    #[error("Communication error: {message}")]
    Communication { message: String },

    /// No response within the transport timeout
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Protocol exception returned by the remote unit
    #[error("Modbus exception from unit {unit_id}: {function} -> {code}")]
    Exception {
        function: ModbusFunction,
        unit_id: SlaveId,
        code: ExceptionCode,
    },

    /// Caller supplied an argument outside the protocol limits
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Function code byte outside the supported set
    #[error("Invalid function code: 0x{code:02X}")]
    InvalidFunction { code: u8 },

    /// Frame construction failure (PDU overflow)
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// The client has been closed
    #[error("Client has been disposed")]
    Disposed,

    /// The in-flight request was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,
}

impl ModbusError {
    /// Create a connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a communication error
    pub fn communication<S: Into<String>>(message: S) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create an exception error
    pub fn exception(function: ModbusFunction, unit_id: SlaveId, code: ExceptionCode) -> Self {
        Self::Exception {
            function,
            unit_id,
            code,
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an invalid function error
    pub fn invalid_function(code: u8) -> Self {
        Self::InvalidFunction { code }
    }

    /// Create a protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Whether a fresh attempt of the same request could succeed.
    ///
    /// Timeouts and corrupted frames are transient; of the protocol
    /// exceptions only "server device busy" is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Communication { .. }
                | Self::Exception {
                    code: ExceptionCode::SlaveDeviceBusy,
                    ..
                }
        )
    }

    /// Exception code carried by a protocol exception, if any
    pub fn exception_code(&self) -> Option<ExceptionCode> {
        match self {
            Self::Exception { code, .. } => Some(*code),
            _ => None,
        }
    }
}
