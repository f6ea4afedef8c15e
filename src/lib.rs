//! # Modbus Master - Modbus Client Protocol Engine
//!
//! Turns typed register and coil operations into Modbus frames, parses and
//! validates the responses, and drives request execution with bounds
//! checking, retries and cancellation.
//!
//! ## Features
//!
//! - **Two framings**: RTU (CRC-16) and TCP (MBAP header with transaction ids)
//! - **Transport agnostic**: bring any [`ModbusTransport`]; RTU over TCP is a codec choice
//! - **Typed register codec**: any [`RegisterValue`] under four [`ByteOrder`] layouts
//! - **Retrying executor**: linear backoff on timeouts, communication errors and busy devices
//! - **Stack-allocated PDU**: no heap allocation while building request bodies
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Client |
//! |------|----------|--------|
//! | 0x01 | Read Coils | ✅ |
//! | 0x02 | Read Discrete Inputs | ✅ |
//! | 0x03 | Read Holding Registers | ✅ |
//! | 0x04 | Read Input Registers | ✅ |
//! | 0x05 | Write Single Coil | ✅ |
//! | 0x06 | Write Single Register | ✅ |
//! | 0x0F | Write Multiple Coils | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ |
//! | 0x17 | Read/Write Multiple Registers | ✅ |
//!
//! ## Register Codec
//!
//! ```rust
//! use modbus_master::{codec, ByteOrder};
//!
//! let registers = codec::to_registers(&[25.0f32], ByteOrder::BigEndianSwap);
//! assert_eq!(registers, vec![0x0000, 0x41C8]);
//!
//! let values: Vec<f32> = codec::from_registers(&registers, 1, ByteOrder::BigEndianSwap).unwrap();
//! assert_eq!(values, vec![25.0]);
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus protocol constants
pub mod constants;

/// CRC, bit packing and register packing helpers
pub mod utils;

/// Modbus protocol definitions and message handling
pub mod protocol;

/// Stack-allocated PDU and per-function PDU layouts
pub mod pdu;

/// RTU and TCP frame codecs
pub mod frame;

/// Transport collaborator interface
pub mod transport;

/// Retry decisions and backoff
pub mod retry;

/// Client configuration
pub mod config;

/// Frame logging helpers
pub mod logging;

/// Modbus client and request executor
pub mod client;

// ============================================================================
// Register data modules
// ============================================================================

/// Byte order handling for multi-register data types
pub mod bytes;

/// Generic register codec
pub mod codec;

/// Runtime-typed register values
pub mod value;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Core client API ===
pub use client::{GenericModbusClient, ModbusClient, ModbusRtuClient, ModbusTcpClient};
pub use config::ClientConfig;
pub use frame::{FrameCodec, RtuFrameCodec, TcpFrameCodec};
pub use transport::{ModbusTransport, TransportStats};

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Core types ===
pub use bytes::{ByteOrder, ModbusEndianness, RegisterByteOrder, WordOrder};
pub use codec::RegisterValue;
pub use protocol::{ExceptionCode, ModbusFunction, ModbusRequest, ModbusResponse, SlaveId};
pub use value::{DataType, ModbusValue};

// === Protocol limits (commonly needed constants) ===
pub use constants::{
    MAX_PDU_SIZE, MAX_READ_COILS, MAX_READ_REGISTERS, MAX_RW_WRITE_REGISTERS, MAX_WRITE_COILS,
    MAX_WRITE_REGISTERS,
};

// === PDU (advanced usage) ===
pub use pdu::{ModbusPdu, PduBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
