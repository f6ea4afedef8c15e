//! Modbus protocol definitions and message types
//!
//! [`ModbusRequest`] and [`ModbusResponse`] are the framing-independent view of
//! a transaction. The frame codecs turn requests into bytes and bytes into
//! responses; the client only ever deals with these two types.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::constants::{
    EXCEPTION_ACKNOWLEDGE, EXCEPTION_GATEWAY_PATH_UNAVAILABLE, EXCEPTION_GATEWAY_TARGET_FAILED,
    EXCEPTION_ILLEGAL_DATA_ADDRESS, EXCEPTION_ILLEGAL_DATA_VALUE, EXCEPTION_ILLEGAL_FUNCTION,
    EXCEPTION_MEMORY_PARITY_ERROR, EXCEPTION_SERVER_DEVICE_BUSY, EXCEPTION_SERVER_DEVICE_FAILURE,
    FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS,
    FC_READ_WRITE_MULTIPLE_REGISTERS, FC_WRITE_MULTIPLE_COILS, FC_WRITE_MULTIPLE_REGISTERS,
    FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER, MAX_READ_COILS, MAX_READ_REGISTERS,
    MAX_RW_WRITE_REGISTERS, MAX_WRITE_COILS, MAX_WRITE_REGISTERS,
};
use crate::error::{ModbusError, ModbusResult};
use crate::utils::{pack_bits, registers_to_bytes, unpack_bits};

/// Modbus slave/unit identifier
pub type SlaveId = u8;

/// Modbus function codes supported by the master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModbusFunction {
    /// Read Coils (0x01)
    ReadCoils = FC_READ_COILS,
    /// Read Discrete Inputs (0x02)
    ReadDiscreteInputs = FC_READ_DISCRETE_INPUTS,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = FC_READ_HOLDING_REGISTERS,
    /// Read Input Registers (0x04)
    ReadInputRegisters = FC_READ_INPUT_REGISTERS,
    /// Write Single Coil (0x05)
    WriteSingleCoil = FC_WRITE_SINGLE_COIL,
    /// Write Single Register (0x06)
    WriteSingleRegister = FC_WRITE_SINGLE_REGISTER,
    /// Write Multiple Coils (0x0F)
    WriteMultipleCoils = FC_WRITE_MULTIPLE_COILS,
    /// Write Multiple Registers (0x10)
    WriteMultipleRegisters = FC_WRITE_MULTIPLE_REGISTERS,
    /// Read/Write Multiple Registers (0x17)
    ReadWriteMultipleRegisters = FC_READ_WRITE_MULTIPLE_REGISTERS,
}

impl ModbusFunction {
    /// Convert from the wire byte
    pub fn from_u8(value: u8) -> ModbusResult<Self> {
        match value {
            FC_READ_COILS => Ok(Self::ReadCoils),
            FC_READ_DISCRETE_INPUTS => Ok(Self::ReadDiscreteInputs),
            FC_READ_HOLDING_REGISTERS => Ok(Self::ReadHoldingRegisters),
            FC_READ_INPUT_REGISTERS => Ok(Self::ReadInputRegisters),
            FC_WRITE_SINGLE_COIL => Ok(Self::WriteSingleCoil),
            FC_WRITE_SINGLE_REGISTER => Ok(Self::WriteSingleRegister),
            FC_WRITE_MULTIPLE_COILS => Ok(Self::WriteMultipleCoils),
            FC_WRITE_MULTIPLE_REGISTERS => Ok(Self::WriteMultipleRegisters),
            FC_READ_WRITE_MULTIPLE_REGISTERS => Ok(Self::ReadWriteMultipleRegisters),
            _ => Err(ModbusError::invalid_function(value)),
        }
    }

    /// Convert to the wire byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Functions whose response carries a byte-count-prefixed payload
    pub fn is_read_function(self) -> bool {
        matches!(
            self,
            Self::ReadCoils
                | Self::ReadDiscreteInputs
                | Self::ReadHoldingRegisters
                | Self::ReadInputRegisters
                | Self::ReadWriteMultipleRegisters
        )
    }

    /// Functions that modify device state
    pub fn is_write_function(self) -> bool {
        matches!(
            self,
            Self::WriteSingleCoil
                | Self::WriteSingleRegister
                | Self::WriteMultipleCoils
                | Self::WriteMultipleRegisters
                | Self::ReadWriteMultipleRegisters
        )
    }

    /// Bit-addressed reads (coils and discrete inputs)
    pub fn is_bit_read(self) -> bool {
        matches!(self, Self::ReadCoils | Self::ReadDiscreteInputs)
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadCoils => "Read Coils",
            Self::ReadDiscreteInputs => "Read Discrete Inputs",
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteSingleRegister => "Write Single Register",
            Self::WriteMultipleCoils => "Write Multiple Coils",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
            Self::ReadWriteMultipleRegisters => "Read/Write Multiple Registers",
        }
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.to_u8())
    }
}

/// Exception codes a remote unit may answer with.
///
/// Codes outside the standard set are kept as [`ExceptionCode::Unknown`] so
/// nothing the device reported is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    /// No exception (0x00)
    None,
    /// Illegal Function (0x01)
    IllegalFunction,
    /// Illegal Data Address (0x02)
    IllegalDataAddress,
    /// Illegal Data Value (0x03)
    IllegalDataValue,
    /// Slave Device Failure (0x04)
    SlaveDeviceFailure,
    /// Acknowledge (0x05)
    Acknowledge,
    /// Slave Device Busy (0x06)
    SlaveDeviceBusy,
    /// Memory Parity Error (0x08)
    MemoryParityError,
    /// Gateway Path Unavailable (0x0A)
    GatewayPathUnavailable,
    /// Gateway Target Device Failed to Respond (0x0B)
    GatewayTargetDeviceFailedToRespond,
    /// Any other code
    Unknown(u8),
}

impl ExceptionCode {
    /// Convert to the wire byte
    pub fn to_u8(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::IllegalFunction => EXCEPTION_ILLEGAL_FUNCTION,
            Self::IllegalDataAddress => EXCEPTION_ILLEGAL_DATA_ADDRESS,
            Self::IllegalDataValue => EXCEPTION_ILLEGAL_DATA_VALUE,
            Self::SlaveDeviceFailure => EXCEPTION_SERVER_DEVICE_FAILURE,
            Self::Acknowledge => EXCEPTION_ACKNOWLEDGE,
            Self::SlaveDeviceBusy => EXCEPTION_SERVER_DEVICE_BUSY,
            Self::MemoryParityError => EXCEPTION_MEMORY_PARITY_ERROR,
            Self::GatewayPathUnavailable => EXCEPTION_GATEWAY_PATH_UNAVAILABLE,
            Self::GatewayTargetDeviceFailedToRespond => EXCEPTION_GATEWAY_TARGET_FAILED,
            Self::Unknown(code) => code,
        }
    }

    /// Short name
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::IllegalFunction => "Illegal Function",
            Self::IllegalDataAddress => "Illegal Data Address",
            Self::IllegalDataValue => "Illegal Data Value",
            Self::SlaveDeviceFailure => "Slave Device Failure",
            Self::Acknowledge => "Acknowledge",
            Self::SlaveDeviceBusy => "Slave Device Busy",
            Self::MemoryParityError => "Memory Parity Error",
            Self::GatewayPathUnavailable => "Gateway Path Unavailable",
            Self::GatewayTargetDeviceFailedToRespond => "Gateway Target Device Failed to Respond",
            Self::Unknown(_) => "Unknown Exception",
        }
    }

    /// Longer description of what the remote unit is reporting
    pub fn description(self) -> &'static str {
        match self {
            Self::None => "No exception",
            Self::IllegalFunction => {
                "The function code received in the query is not an allowable action for the server"
            }
            Self::IllegalDataAddress => {
                "The data address received in the query is not an allowable address for the server"
            }
            Self::IllegalDataValue => {
                "A value contained in the query data field is not an allowable value for the server"
            }
            Self::SlaveDeviceFailure => {
                "An unrecoverable error occurred while the server was performing the requested action"
            }
            Self::Acknowledge => {
                "The server accepted the request but needs a long time to process it"
            }
            Self::SlaveDeviceBusy => "The server is processing a long-duration program command",
            Self::MemoryParityError => "The server detected a parity error in its memory",
            Self::GatewayPathUnavailable => {
                "The gateway was unable to allocate an internal communication path"
            }
            Self::GatewayTargetDeviceFailedToRespond => {
                "No response was obtained from the target device behind the gateway"
            }
            Self::Unknown(_) => "Exception code outside the standard set",
        }
    }
}

impl From<u8> for ExceptionCode {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::None,
            EXCEPTION_ILLEGAL_FUNCTION => Self::IllegalFunction,
            EXCEPTION_ILLEGAL_DATA_ADDRESS => Self::IllegalDataAddress,
            EXCEPTION_ILLEGAL_DATA_VALUE => Self::IllegalDataValue,
            EXCEPTION_SERVER_DEVICE_FAILURE => Self::SlaveDeviceFailure,
            EXCEPTION_ACKNOWLEDGE => Self::Acknowledge,
            EXCEPTION_SERVER_DEVICE_BUSY => Self::SlaveDeviceBusy,
            EXCEPTION_MEMORY_PARITY_ERROR => Self::MemoryParityError,
            EXCEPTION_GATEWAY_PATH_UNAVAILABLE => Self::GatewayPathUnavailable,
            EXCEPTION_GATEWAY_TARGET_FAILED => Self::GatewayTargetDeviceFailedToRespond,
            other => Self::Unknown(other),
        }
    }
}

impl From<ExceptionCode> for u8 {
    fn from(code: ExceptionCode) -> Self {
        code.to_u8()
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.to_u8())
    }
}

// ============================================================================
// Request
// ============================================================================

/// A framing-independent Modbus request.
///
/// Payload conventions:
///
/// | Function | Payload |
/// |----------|---------|
/// | reads | empty |
/// | 0x05 | 1 byte, non-zero = ON |
/// | 0x06 | 2 bytes, big-endian value |
/// | 0x0F | packed coil bytes, `quantity` = coil count |
/// | 0x10 | big-endian register bytes, `quantity` = register count |
/// | 0x17 | write address(2) + write quantity(2) + register bytes, `quantity` = read count |
#[derive(Debug, Clone, PartialEq)]
pub struct ModbusRequest {
    unit_id: SlaveId,
    function: ModbusFunction,
    address: u16,
    quantity: u16,
    data: Bytes,
    timestamp: DateTime<Utc>,
}

impl ModbusRequest {
    /// Build a request from its raw parts
    pub fn new(
        unit_id: SlaveId,
        function: ModbusFunction,
        address: u16,
        quantity: u16,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            unit_id,
            function,
            address,
            quantity,
            data: data.into(),
            timestamp: Utc::now(),
        }
    }

    /// Read request for FC01-04
    pub fn read(unit_id: SlaveId, function: ModbusFunction, address: u16, quantity: u16) -> Self {
        Self::new(unit_id, function, address, quantity, Bytes::new())
    }

    /// Write Single Coil (FC05)
    pub fn write_single_coil(unit_id: SlaveId, address: u16, value: bool) -> Self {
        Self::new(
            unit_id,
            ModbusFunction::WriteSingleCoil,
            address,
            1,
            vec![if value { 0xFF } else { 0x00 }],
        )
    }

    /// Write Single Register (FC06)
    pub fn write_single_register(unit_id: SlaveId, address: u16, value: u16) -> Self {
        Self::new(
            unit_id,
            ModbusFunction::WriteSingleRegister,
            address,
            1,
            value.to_be_bytes().to_vec(),
        )
    }

    /// Write Multiple Coils (FC15)
    pub fn write_multiple_coils(unit_id: SlaveId, address: u16, values: &[bool]) -> Self {
        Self::new(
            unit_id,
            ModbusFunction::WriteMultipleCoils,
            address,
            values.len() as u16,
            pack_bits(values),
        )
    }

    /// Write Multiple Registers (FC16)
    pub fn write_multiple_registers(unit_id: SlaveId, address: u16, values: &[u16]) -> Self {
        Self::new(
            unit_id,
            ModbusFunction::WriteMultipleRegisters,
            address,
            values.len() as u16,
            registers_to_bytes(values),
        )
    }

    /// Read/Write Multiple Registers (FC23)
    pub fn read_write_multiple_registers(
        unit_id: SlaveId,
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        values: &[u16],
    ) -> Self {
        let mut data = Vec::with_capacity(4 + values.len() * 2);
        data.extend_from_slice(&write_address.to_be_bytes());
        data.extend_from_slice(&(values.len() as u16).to_be_bytes());
        data.extend_from_slice(&registers_to_bytes(values));
        Self::new(
            unit_id,
            ModbusFunction::ReadWriteMultipleRegisters,
            read_address,
            read_quantity,
            data,
        )
    }

    /// Unit id the request is addressed to
    #[inline]
    pub fn unit_id(&self) -> SlaveId {
        self.unit_id
    }

    /// Function code
    #[inline]
    pub fn function(&self) -> ModbusFunction {
        self.function
    }

    /// Starting address (read address for FC23)
    #[inline]
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Item count (read count for FC23)
    #[inline]
    pub fn quantity(&self) -> u16 {
        self.quantity
    }

    /// Function-specific payload
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Creation time
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Write-side quantity of a FC23 request, read from its payload header
    pub fn write_quantity(&self) -> Option<u16> {
        match (self.function, self.data.get(2..4)) {
            (ModbusFunction::ReadWriteMultipleRegisters, Some(qty)) => {
                Some(u16::from_be_bytes([qty[0], qty[1]]))
            }
            _ => None,
        }
    }

    /// Check the quantity bounds and payload shape for the function.
    ///
    /// Failures are [`ModbusError::InvalidArgument`] and never worth retrying.
    pub fn validate(&self) -> ModbusResult<()> {
        let quantity = self.quantity as usize;
        if quantity == 0 {
            return Err(ModbusError::invalid_argument(format!(
                "{}: quantity must be greater than zero",
                self.function
            )));
        }

        let limit = match self.function {
            ModbusFunction::ReadCoils | ModbusFunction::ReadDiscreteInputs => MAX_READ_COILS,
            ModbusFunction::ReadHoldingRegisters
            | ModbusFunction::ReadInputRegisters
            | ModbusFunction::ReadWriteMultipleRegisters => MAX_READ_REGISTERS,
            ModbusFunction::WriteMultipleCoils => MAX_WRITE_COILS,
            ModbusFunction::WriteMultipleRegisters => MAX_WRITE_REGISTERS,
            ModbusFunction::WriteSingleCoil | ModbusFunction::WriteSingleRegister => 1,
        };
        if quantity > limit {
            return Err(ModbusError::invalid_argument(format!(
                "{}: quantity {} exceeds limit {}",
                self.function, quantity, limit
            )));
        }

        let expected_len = match self.function {
            ModbusFunction::WriteSingleCoil => Some(1),
            ModbusFunction::WriteSingleRegister => Some(2),
            ModbusFunction::WriteMultipleCoils => Some(quantity.div_ceil(8)),
            ModbusFunction::WriteMultipleRegisters => Some(quantity * 2),
            ModbusFunction::ReadWriteMultipleRegisters => {
                let write_qty = self.write_quantity().ok_or_else(|| {
                    ModbusError::invalid_argument(
                        "Read/Write Multiple Registers: missing write header",
                    )
                })? as usize;
                if write_qty == 0 || write_qty > MAX_RW_WRITE_REGISTERS {
                    return Err(ModbusError::invalid_argument(format!(
                        "Read/Write Multiple Registers: write quantity {} outside 1..={}",
                        write_qty, MAX_RW_WRITE_REGISTERS
                    )));
                }
                Some(4 + write_qty * 2)
            }
            _ => None,
        };
        if let Some(expected) = expected_len {
            if self.data.len() != expected {
                return Err(ModbusError::invalid_argument(format!(
                    "{}: payload is {} bytes, expected {}",
                    self.function,
                    self.data.len(),
                    expected
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Response
// ============================================================================

/// A parsed Modbus response.
///
/// `data` holds the PDU bytes after the function code: byte count and values
/// for reads, the echoed address and value/quantity for writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModbusResponse {
    unit_id: SlaveId,
    function: ModbusFunction,
    data: Bytes,
    exception: Option<ExceptionCode>,
    raw: Bytes,
    timestamp: DateTime<Utc>,
}

impl ModbusResponse {
    /// A normal response
    pub fn new_success(
        unit_id: SlaveId,
        function: ModbusFunction,
        data: impl Into<Bytes>,
        raw: impl Into<Bytes>,
    ) -> Self {
        Self {
            unit_id,
            function,
            data: data.into(),
            exception: None,
            raw: raw.into(),
            timestamp: Utc::now(),
        }
    }

    /// An exception response
    pub fn new_exception(
        unit_id: SlaveId,
        function: ModbusFunction,
        code: ExceptionCode,
        raw: impl Into<Bytes>,
    ) -> Self {
        Self {
            unit_id,
            function,
            data: Bytes::new(),
            exception: Some(code),
            raw: raw.into(),
            timestamp: Utc::now(),
        }
    }

    /// Unit id the response came from
    #[inline]
    pub fn unit_id(&self) -> SlaveId {
        self.unit_id
    }

    /// Function code, with the exception bit cleared
    #[inline]
    pub fn function(&self) -> ModbusFunction {
        self.function
    }

    /// Payload after the function code
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Whether the unit answered with an exception
    #[inline]
    pub fn is_error(&self) -> bool {
        self.exception.is_some()
    }

    /// Exception code of an error response
    #[inline]
    pub fn exception_code(&self) -> Option<ExceptionCode> {
        self.exception
    }

    /// Full frame as received
    #[inline]
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Parse time
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Convert an exception response into the matching error
    pub fn into_result(self) -> ModbusResult<Self> {
        match self.exception {
            Some(code) => Err(ModbusError::exception(self.function, self.unit_id, code)),
            None => Ok(self),
        }
    }

    /// Byte-count-prefixed payload of a read response
    fn counted_payload(&self) -> ModbusResult<&[u8]> {
        if let Some(code) = self.exception {
            return Err(ModbusError::exception(self.function, self.unit_id, code));
        }
        let (&byte_count, rest) = self
            .data
            .split_first()
            .ok_or_else(|| ModbusError::communication("Empty response payload"))?;
        let byte_count = byte_count as usize;
        if rest.len() < byte_count {
            return Err(ModbusError::communication(format!(
                "Response declares {} data bytes but carries {}",
                byte_count,
                rest.len()
            )));
        }
        Ok(&rest[..byte_count])
    }

    /// Registers of a FC03/FC04/FC23 response
    pub fn parse_registers(&self) -> ModbusResult<Vec<u16>> {
        let payload = self.counted_payload()?;
        if payload.len() % 2 != 0 {
            return Err(ModbusError::communication(format!(
                "Odd register byte count: {}",
                payload.len()
            )));
        }
        Ok(crate::utils::bytes_to_registers(payload))
    }

    /// First `quantity` bits of a FC01/FC02 response
    pub fn parse_bits(&self, quantity: usize) -> ModbusResult<Vec<bool>> {
        let payload = self.counted_payload()?;
        if payload.len() < quantity.div_ceil(8) {
            return Err(ModbusError::communication(format!(
                "{} bits requested but response carries {} bytes",
                quantity,
                payload.len()
            )));
        }
        Ok(unpack_bits(payload, quantity))
    }
}
