//! Modbus protocol constants
//!
//! Wire-level sizes and quantity limits. The quantity limits all fall out of
//! the 253-byte PDU ceiling (RS485 ADU of 256 bytes minus unit id and CRC).

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Maximum PDU (function code + data) size
pub const MAX_PDU_SIZE: usize = 253;

/// MBAP header length for TCP: Transaction ID(2) + Protocol ID(2) + Length(2)
///
/// The unit id that follows is counted by the length field, not by this header.
pub const MBAP_HEADER_LEN: usize = 6;

/// Maximum MBAP length field value (Unit ID + PDU)
pub const MAX_MBAP_LENGTH: usize = 1 + MAX_PDU_SIZE;

/// Modbus TCP protocol identifier, always zero
pub const MODBUS_PROTOCOL_ID: u16 = 0;

/// CRC-16 trailer length of an RTU frame
pub const RTU_CRC_LEN: usize = 2;

/// Smallest frame that can carry a CRC: one byte of content plus the trailer
pub const RTU_MIN_FRAME_LEN: usize = 1 + RTU_CRC_LEN;

/// RTU exception response: Unit(1) + FC(1) + Code(1) + CRC(2)
pub const RTU_EXCEPTION_FRAME_LEN: usize = 5;

/// TCP exception response: MBAP(6) + Unit(1) + FC(1) + Code(1)
pub const TCP_EXCEPTION_FRAME_LEN: usize = 9;

/// Bit set on the function code byte of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Coil ON value for FC05
pub const COIL_ON: u16 = 0xFF00;

/// Coil OFF value for FC05
pub const COIL_OFF: u16 = 0x0000;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum registers for FC03/FC04 and the read side of FC23
///
/// Response PDU: FC(1) + ByteCount(1) + N × 2 ≤ 253 → N ≤ 125
pub const MAX_READ_REGISTERS: usize = 125;

/// Maximum registers for FC16 (Write Multiple Registers)
///
/// Request PDU: FC(1) + Addr(2) + Qty(2) + ByteCount(1) + N × 2 ≤ 253 → N ≤ 123
pub const MAX_WRITE_REGISTERS: usize = 123;

/// Maximum registers on the write side of FC23 (Read/Write Multiple Registers)
///
/// Request PDU: FC(1) + ReadAddr(2) + ReadQty(2) + WriteAddr(2) + WriteQty(2)
/// + ByteCount(1) + N × 2 ≤ 253 → N ≤ 121
pub const MAX_RW_WRITE_REGISTERS: usize = 121;

// ============================================================================
// Coil Operation Limits
// ============================================================================

/// Maximum coils for FC01/FC02 (Read Coils/Discrete Inputs)
pub const MAX_READ_COILS: usize = 2000;

/// Maximum coils for FC15 (Write Multiple Coils), 0x7B0
pub const MAX_WRITE_COILS: usize = 1968;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Write Multiple Coils (FC15)
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Read/Write Multiple Registers (FC23)
pub const FC_READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Illegal Function
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Illegal Data Address
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Illegal Data Value
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Server Device Failure
pub const EXCEPTION_SERVER_DEVICE_FAILURE: u8 = 0x04;

/// Acknowledge
pub const EXCEPTION_ACKNOWLEDGE: u8 = 0x05;

/// Server Device Busy
pub const EXCEPTION_SERVER_DEVICE_BUSY: u8 = 0x06;

/// Memory Parity Error
pub const EXCEPTION_MEMORY_PARITY_ERROR: u8 = 0x08;

/// Gateway Path Unavailable
pub const EXCEPTION_GATEWAY_PATH_UNAVAILABLE: u8 = 0x0A;

/// Gateway Target Device Failed to Respond
pub const EXCEPTION_GATEWAY_TARGET_FAILED: u8 = 0x0B;
