//! Modbus PDU construction
//!
//! The PDU (function code + data) is identical for RTU and TCP; only the
//! envelope differs. [`PduBuilder::from_request`] is the single place where a
//! [`ModbusRequest`] is laid out on the wire. PDUs live in a fixed stack array,
//! so building one never allocates.

use tracing::debug;

use crate::constants::{COIL_OFF, COIL_ON, MAX_PDU_SIZE};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{ModbusFunction, ModbusRequest};

/// PDU with stack-allocated fixed array
#[derive(Debug, Clone)]
pub struct ModbusPdu {
    data: [u8; MAX_PDU_SIZE],
    len: usize,
}

impl ModbusPdu {
    /// Create an empty PDU
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PDU_SIZE],
            len: 0,
        }
    }

    /// Create a PDU from a byte slice
    pub fn from_slice(data: &[u8]) -> ModbusResult<Self> {
        let mut pdu = Self::new();
        pdu.extend(data)?;
        Ok(pdu)
    }

    /// Push a single byte
    #[inline]
    pub fn push(&mut self, byte: u8) -> ModbusResult<()> {
        if self.len >= MAX_PDU_SIZE {
            return Err(ModbusError::protocol("PDU buffer full"));
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> ModbusResult<()> {
        self.extend(&value.to_be_bytes())
    }

    /// Extend with a byte slice
    #[inline]
    pub fn extend(&mut self, data: &[u8]) -> ModbusResult<()> {
        if self.len + data.len() > MAX_PDU_SIZE {
            return Err(ModbusError::protocol(format!(
                "PDU would exceed max size: {} + {} > {}",
                self.len,
                data.len(),
                MAX_PDU_SIZE
            )));
        }
        self.data[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    /// Get immutable data slice
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Get current length
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get function code (first byte)
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }

    /// Human-readable function code description, exception bit ignored
    pub fn function_code_description(fc: u8) -> &'static str {
        ModbusFunction::from_u8(fc & 0x7F)
            .map(ModbusFunction::name)
            .unwrap_or("Unknown Function")
    }
}

impl Default for ModbusPdu {
    fn default() -> Self {
        Self::new()
    }
}

/// PDU builder - fluent API
pub struct PduBuilder {
    pdu: ModbusPdu,
}

impl Default for PduBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PduBuilder {
    /// Create a new builder
    #[inline]
    pub fn new() -> Self {
        Self {
            pdu: ModbusPdu::new(),
        }
    }

    /// Set function code
    #[inline]
    pub fn function(mut self, function: ModbusFunction) -> ModbusResult<Self> {
        self.pdu.push(function.to_u8())?;
        Ok(self)
    }

    /// Add a big-endian 16-bit word (address, quantity or value)
    #[inline]
    pub fn word(mut self, value: u16) -> ModbusResult<Self> {
        self.pdu.push_u16(value)?;
        Ok(self)
    }

    /// Add a byte
    #[inline]
    pub fn byte(mut self, b: u8) -> ModbusResult<Self> {
        self.pdu.push(b)?;
        Ok(self)
    }

    /// Add a byte count followed by the bytes themselves
    pub fn counted(mut self, data: &[u8]) -> ModbusResult<Self> {
        let count = u8::try_from(data.len()).map_err(|_| {
            ModbusError::protocol(format!("Data block of {} bytes exceeds byte count field", data.len()))
        })?;
        self.pdu.push(count)?;
        self.pdu.extend(data)?;
        Ok(self)
    }

    /// Build the PDU
    #[inline]
    pub fn build(self) -> ModbusPdu {
        if let Some(fc) = self.pdu.function_code() {
            debug!(
                "PDU built: FC={:02X} ({}), total_len={}",
                fc,
                ModbusPdu::function_code_description(fc),
                self.pdu.len()
            );
        }
        self.pdu
    }

    /// Lay out any request as a PDU.
    ///
    /// Fails with [`ModbusError::InvalidArgument`] when a write request lacks
    /// its payload, and with [`ModbusError::Protocol`] when the result would
    /// exceed 253 bytes.
    pub fn from_request(request: &ModbusRequest) -> ModbusResult<ModbusPdu> {
        let function = request.function();
        let data = request.data().as_ref();

        match function {
            ModbusFunction::ReadCoils
            | ModbusFunction::ReadDiscreteInputs
            | ModbusFunction::ReadHoldingRegisters
            | ModbusFunction::ReadInputRegisters => {
                Self::build_read_request(function, request.address(), request.quantity())
            }
            ModbusFunction::WriteSingleCoil => {
                let &state = data.first().ok_or_else(|| missing_payload(function))?;
                Self::build_write_single_coil(request.address(), state != 0)
            }
            ModbusFunction::WriteSingleRegister => {
                let value = data
                    .get(..2)
                    .map(|b| u16::from_be_bytes([b[0], b[1]]))
                    .ok_or_else(|| missing_payload(function))?;
                Self::build_write_single_register(request.address(), value)
            }
            ModbusFunction::WriteMultipleCoils | ModbusFunction::WriteMultipleRegisters => {
                if data.is_empty() {
                    return Err(missing_payload(function));
                }
                Self::build_write_multiple(function, request.address(), request.quantity(), data)
            }
            ModbusFunction::ReadWriteMultipleRegisters => {
                if data.len() < 4 {
                    return Err(missing_payload(function));
                }
                let write_address = u16::from_be_bytes([data[0], data[1]]);
                let write_quantity = u16::from_be_bytes([data[2], data[3]]);
                Self::build_read_write_multiple(
                    request.address(),
                    request.quantity(),
                    write_address,
                    write_quantity,
                    &data[4..],
                )
            }
        }
    }

    /// Read PDU for FC01-04: `fc, addr, qty`
    pub fn build_read_request(
        function: ModbusFunction,
        start_address: u16,
        quantity: u16,
    ) -> ModbusResult<ModbusPdu> {
        Ok(PduBuilder::new()
            .function(function)?
            .word(start_address)?
            .word(quantity)?
            .build())
    }

    /// Write single coil PDU (FC05): `fc, addr, 0xFF|0x00, 0x00`
    pub fn build_write_single_coil(address: u16, value: bool) -> ModbusResult<ModbusPdu> {
        Ok(PduBuilder::new()
            .function(ModbusFunction::WriteSingleCoil)?
            .word(address)?
            .word(if value { COIL_ON } else { COIL_OFF })?
            .build())
    }

    /// Write single register PDU (FC06): `fc, addr, value`
    pub fn build_write_single_register(address: u16, value: u16) -> ModbusResult<ModbusPdu> {
        Ok(PduBuilder::new()
            .function(ModbusFunction::WriteSingleRegister)?
            .word(address)?
            .word(value)?
            .build())
    }

    /// Multi-write PDU (FC15/FC16): `fc, addr, qty, byteCount, data`
    pub fn build_write_multiple(
        function: ModbusFunction,
        address: u16,
        quantity: u16,
        data: &[u8],
    ) -> ModbusResult<ModbusPdu> {
        Ok(PduBuilder::new()
            .function(function)?
            .word(address)?
            .word(quantity)?
            .counted(data)?
            .build())
    }

    /// Read/write PDU (FC23):
    /// `fc, readAddr, readQty, writeAddr, writeQty, byteCount, writeData`
    pub fn build_read_write_multiple(
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        write_quantity: u16,
        write_data: &[u8],
    ) -> ModbusResult<ModbusPdu> {
        Ok(PduBuilder::new()
            .function(ModbusFunction::ReadWriteMultipleRegisters)?
            .word(read_address)?
            .word(read_quantity)?
            .word(write_address)?
            .word(write_quantity)?
            .counted(write_data)?
            .build())
    }
}

fn missing_payload(function: ModbusFunction) -> ModbusError {
    ModbusError::invalid_argument(format!("{}: request payload is missing", function))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdu_basic_operations() {
        let mut pdu = ModbusPdu::new();
        assert!(pdu.is_empty());

        pdu.push(0x03).unwrap();
        pdu.push_u16(0x0100).unwrap();
        pdu.push_u16(0x000A).unwrap();

        assert_eq!(pdu.function_code(), Some(0x03));
        assert_eq!(pdu.as_slice(), &[0x03, 0x01, 0x00, 0x00, 0x0A]);
    }

    #[test]
    fn test_pdu_overflow() {
        let mut pdu = ModbusPdu::from_slice(&[0u8; MAX_PDU_SIZE]).unwrap();
        assert!(matches!(pdu.push(0x01), Err(ModbusError::Protocol { .. })));
        assert!(ModbusPdu::from_slice(&[0u8; MAX_PDU_SIZE + 1]).is_err());
    }

    #[test]
    fn test_function_code_description() {
        assert_eq!(ModbusPdu::function_code_description(0x83), "Read Holding Registers");
        assert_eq!(ModbusPdu::function_code_description(0x17), "Read/Write Multiple Registers");
        assert_eq!(ModbusPdu::function_code_description(0x2B), "Unknown Function");
    }

    #[test]
    fn test_read_request_layout() {
        let req = ModbusRequest::read(5, ModbusFunction::ReadHoldingRegisters, 0x0064, 10);
        let pdu = PduBuilder::from_request(&req).unwrap();
        assert_eq!(pdu.as_slice(), &[0x03, 0x00, 0x64, 0x00, 0x0A]);
    }

    #[test]
    fn test_write_single_coil_layout() {
        let on = ModbusRequest::write_single_coil(1, 0x00AC, true);
        assert_eq!(
            PduBuilder::from_request(&on).unwrap().as_slice(),
            &[0x05, 0x00, 0xAC, 0xFF, 0x00]
        );

        let off = ModbusRequest::write_single_coil(1, 0x00AC, false);
        assert_eq!(
            PduBuilder::from_request(&off).unwrap().as_slice(),
            &[0x05, 0x00, 0xAC, 0x00, 0x00]
        );
    }

    #[test]
    fn test_write_single_register_layout() {
        let req = ModbusRequest::write_single_register(1, 0x0001, 0x0003);
        assert_eq!(
            PduBuilder::from_request(&req).unwrap().as_slice(),
            &[0x06, 0x00, 0x01, 0x00, 0x03]
        );
    }

    #[test]
    fn test_write_multiple_layout() {
        let req = ModbusRequest::write_multiple_registers(1, 0x0001, &[0x000A, 0x0102]);
        assert_eq!(
            PduBuilder::from_request(&req).unwrap().as_slice(),
            &[0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );

        let coils = [true, false, true, true, false, false, true, true, true, false];
        let req = ModbusRequest::write_multiple_coils(1, 0x0013, &coils);
        assert_eq!(
            PduBuilder::from_request(&req).unwrap().as_slice(),
            &[0x0F, 0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01]
        );
    }

    #[test]
    fn test_read_write_layout() {
        let req = ModbusRequest::read_write_multiple_registers(1, 0x0003, 6, 0x000E, &[0x00FF, 0x00FF, 0x00FF]);
        assert_eq!(
            PduBuilder::from_request(&req).unwrap().as_slice(),
            &[
                0x17, 0x00, 0x03, 0x00, 0x06, 0x00, 0x0E, 0x00, 0x03, 0x06, 0x00, 0xFF, 0x00,
                0xFF, 0x00, 0xFF
            ]
        );
    }

    #[test]
    fn test_missing_payload_is_invalid_argument() {
        let cases = [
            ModbusRequest::new(1, ModbusFunction::WriteSingleCoil, 0, 1, Vec::new()),
            ModbusRequest::new(1, ModbusFunction::WriteSingleRegister, 0, 1, vec![0x01]),
            ModbusRequest::new(1, ModbusFunction::WriteMultipleRegisters, 0, 1, Vec::new()),
            ModbusRequest::new(1, ModbusFunction::ReadWriteMultipleRegisters, 0, 1, vec![0, 0, 0]),
        ];
        for req in cases {
            assert!(
                matches!(PduBuilder::from_request(&req), Err(ModbusError::InvalidArgument { .. })),
                "{:?}",
                req.function()
            );
        }
    }

    #[test]
    fn test_oversized_payload_is_protocol_error() {
        let values = vec![0u16; 130];
        let req = ModbusRequest::write_multiple_registers(1, 0, &values);
        assert!(matches!(
            PduBuilder::from_request(&req),
            Err(ModbusError::Protocol { .. })
        ));
    }
}
