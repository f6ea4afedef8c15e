//! Frame codecs for the two Modbus framings
//!
//! Both framings wrap the same PDU:
//! - **RTU**: `[unit][pdu...][crcLo][crcHi]`
//! - **TCP**: `[tidHi][tidLo][0][0][lenHi][lenLo][unit][pdu...]`, `len = pdu + 1`
//!
//! A codec only turns requests into bytes and bytes into responses. Moving the
//! bytes is the transport's job, so RTU framing over a TCP socket is simply an
//! [`RtuFrameCodec`] paired with a TCP transport.

use std::sync::atomic::{AtomicU16, Ordering};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::constants::{
    EXCEPTION_FLAG, MBAP_HEADER_LEN, MODBUS_PROTOCOL_ID, RTU_CRC_LEN, RTU_EXCEPTION_FRAME_LEN,
    RTU_MIN_FRAME_LEN, TCP_EXCEPTION_FRAME_LEN,
};
use crate::error::{ModbusError, ModbusResult};
use crate::logging::{log_frame, FrameDirection};
use crate::pdu::PduBuilder;
use crate::protocol::{ExceptionCode, ModbusFunction, ModbusRequest, ModbusResponse, SlaveId};
use crate::utils::{crc16, validate_crc16};

/// Encoding and decoding of one Modbus framing.
///
/// Implementations are shared by reference between requests, so any
/// per-frame state (the TCP transaction counter) must be interior and
/// thread-safe.
pub trait FrameCodec: Send + Sync {
    /// Short framing name used in logs
    fn name(&self) -> &'static str;

    /// Serialize a request into a complete wire frame
    fn build_request(&self, request: &ModbusRequest) -> ModbusResult<Bytes>;

    /// Parse a complete response frame.
    ///
    /// Exception responses come back as `Ok` with [`ModbusResponse::is_error`]
    /// set; malformed frames are [`ModbusError::Communication`].
    fn parse_response(&self, frame: &[u8], request: &ModbusRequest) -> ModbusResult<ModbusResponse>;

    /// Cheap structural check run before parsing
    fn validate_response(&self, frame: &[u8]) -> bool;

    /// Length in bytes of a normal (non-exception) response to `request`
    fn expected_response_length(&self, request: &ModbusRequest) -> usize;
}

/// Length of a normal response PDU, function code included
fn response_pdu_len(request: &ModbusRequest) -> usize {
    let quantity = request.quantity() as usize;
    match request.function() {
        ModbusFunction::ReadCoils | ModbusFunction::ReadDiscreteInputs => {
            2 + quantity.div_ceil(8)
        }
        ModbusFunction::ReadHoldingRegisters
        | ModbusFunction::ReadInputRegisters
        | ModbusFunction::ReadWriteMultipleRegisters => 2 + 2 * quantity,
        ModbusFunction::WriteSingleCoil
        | ModbusFunction::WriteSingleRegister
        | ModbusFunction::WriteMultipleCoils
        | ModbusFunction::WriteMultipleRegisters => 5,
    }
}

/// Decode the PDU portion of a response frame shared by both framings.
fn parse_pdu(
    unit_id: SlaveId,
    pdu: &[u8],
    raw: &[u8],
    request: &ModbusRequest,
) -> ModbusResult<ModbusResponse> {
    let (&fc, rest) = pdu
        .split_first()
        .ok_or_else(|| ModbusError::communication("Response carries no function code"))?;

    let function = ModbusFunction::from_u8(fc & !EXCEPTION_FLAG).map_err(|_| {
        ModbusError::communication(format!("Unknown function code in response: 0x{:02X}", fc))
    })?;
    if function != request.function() {
        warn!(
            "Response function {} does not match request function {}",
            function,
            request.function()
        );
    }

    let raw = Bytes::copy_from_slice(raw);
    if fc & EXCEPTION_FLAG != 0 {
        let &code = rest
            .first()
            .ok_or_else(|| ModbusError::communication("Exception response without code"))?;
        let code = ExceptionCode::from(code);
        debug!("Exception response from unit {}: {} -> {}", unit_id, function, code);
        return Ok(ModbusResponse::new_exception(unit_id, function, code, raw));
    }

    debug!(
        "Response from unit {}: {}, {} data bytes",
        unit_id,
        function,
        rest.len()
    );
    Ok(ModbusResponse::new_success(
        unit_id,
        function,
        Bytes::copy_from_slice(rest),
        raw,
    ))
}

// ============================================================================
// RTU
// ============================================================================

/// RTU framing: unit id, PDU, CRC-16/Modbus low byte first
#[derive(Debug, Clone, Copy, Default)]
pub struct RtuFrameCodec;

impl RtuFrameCodec {
    /// Create an RTU codec
    pub fn new() -> Self {
        Self
    }
}

impl FrameCodec for RtuFrameCodec {
    fn name(&self) -> &'static str {
        "RTU"
    }

    fn build_request(&self, request: &ModbusRequest) -> ModbusResult<Bytes> {
        let pdu = PduBuilder::from_request(request)?;

        let mut frame = BytesMut::with_capacity(1 + pdu.len() + RTU_CRC_LEN);
        frame.put_u8(request.unit_id());
        frame.put_slice(pdu.as_slice());
        let crc = crc16(&frame);
        frame.put_u16_le(crc);

        log_frame(FrameDirection::Send, self.name(), request.unit_id(), &frame);
        Ok(frame.freeze())
    }

    fn parse_response(&self, frame: &[u8], request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        log_frame(FrameDirection::Receive, self.name(), request.unit_id(), frame);

        if frame.len() < RTU_MIN_FRAME_LEN {
            return Err(ModbusError::communication(format!(
                "RTU frame too short: {} bytes",
                frame.len()
            )));
        }
        if !validate_crc16(frame) {
            return Err(ModbusError::communication("RTU CRC mismatch"));
        }
        if frame.len() < RTU_MIN_FRAME_LEN + 1 {
            return Err(ModbusError::communication("RTU frame has no function code"));
        }
        if frame[1] & EXCEPTION_FLAG != 0 && frame.len() < RTU_EXCEPTION_FRAME_LEN {
            return Err(ModbusError::communication(format!(
                "RTU exception frame too short: {} bytes",
                frame.len()
            )));
        }

        parse_pdu(frame[0], &frame[1..frame.len() - RTU_CRC_LEN], frame, request)
    }

    fn validate_response(&self, frame: &[u8]) -> bool {
        validate_crc16(frame)
    }

    fn expected_response_length(&self, request: &ModbusRequest) -> usize {
        1 + response_pdu_len(request) + RTU_CRC_LEN
    }
}

// ============================================================================
// TCP
// ============================================================================

/// TCP framing: MBAP header with a wrapping transaction counter
#[derive(Debug, Default)]
pub struct TcpFrameCodec {
    transaction_id: AtomicU16,
}

impl TcpFrameCodec {
    /// Create a TCP codec; the first frame carries transaction id 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the counter so the next frame carries `id + 1`
    pub fn with_initial_transaction_id(id: u16) -> Self {
        Self {
            transaction_id: AtomicU16::new(id),
        }
    }

    /// Transaction id of the most recently built frame
    pub fn last_transaction_id(&self) -> u16 {
        self.transaction_id.load(Ordering::Relaxed)
    }

    fn next_transaction_id(&self) -> u16 {
        self.transaction_id
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1)
    }
}

impl FrameCodec for TcpFrameCodec {
    fn name(&self) -> &'static str {
        "TCP"
    }

    fn build_request(&self, request: &ModbusRequest) -> ModbusResult<Bytes> {
        let pdu = PduBuilder::from_request(request)?;
        let transaction_id = self.next_transaction_id();

        let mut frame = BytesMut::with_capacity(MBAP_HEADER_LEN + 1 + pdu.len());
        frame.put_u16(transaction_id);
        frame.put_u16(MODBUS_PROTOCOL_ID);
        frame.put_u16((pdu.len() + 1) as u16);
        frame.put_u8(request.unit_id());
        frame.put_slice(pdu.as_slice());

        debug!("TCP frame built: transaction_id={}", transaction_id);
        log_frame(FrameDirection::Send, self.name(), request.unit_id(), &frame);
        Ok(frame.freeze())
    }

    fn parse_response(&self, frame: &[u8], request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        log_frame(FrameDirection::Receive, self.name(), request.unit_id(), frame);

        if frame.len() < MBAP_HEADER_LEN {
            return Err(ModbusError::communication(format!(
                "TCP frame too short: {} bytes",
                frame.len()
            )));
        }

        let transaction_id = u16::from_be_bytes([frame[0], frame[1]]);
        let protocol_id = u16::from_be_bytes([frame[2], frame[3]]);
        let length = u16::from_be_bytes([frame[4], frame[5]]) as usize;

        if protocol_id != MODBUS_PROTOCOL_ID {
            return Err(ModbusError::communication(format!(
                "Invalid protocol id: {}",
                protocol_id
            )));
        }
        if MBAP_HEADER_LEN + length > frame.len() {
            return Err(ModbusError::communication(format!(
                "MBAP length {} exceeds received {} bytes",
                length,
                frame.len() - MBAP_HEADER_LEN
            )));
        }
        if length < 2 {
            return Err(ModbusError::communication(format!(
                "MBAP length {} leaves no room for unit id and function code",
                length
            )));
        }
        if frame[MBAP_HEADER_LEN + 1] & EXCEPTION_FLAG != 0 && frame.len() < TCP_EXCEPTION_FRAME_LEN {
            return Err(ModbusError::communication(format!(
                "TCP exception frame too short: {} bytes",
                frame.len()
            )));
        }

        let expected = self.last_transaction_id();
        if transaction_id != expected {
            warn!(
                "Transaction id mismatch: expected {}, received {}",
                expected, transaction_id
            );
        }

        let unit_id = frame[MBAP_HEADER_LEN];
        let pdu_end = MBAP_HEADER_LEN + length;
        parse_pdu(unit_id, &frame[MBAP_HEADER_LEN + 1..pdu_end], frame, request)
    }

    fn validate_response(&self, frame: &[u8]) -> bool {
        if frame.len() < MBAP_HEADER_LEN {
            return false;
        }
        let protocol_id = u16::from_be_bytes([frame[2], frame[3]]);
        let length = u16::from_be_bytes([frame[4], frame[5]]) as usize;
        protocol_id == MODBUS_PROTOCOL_ID && frame.len() >= MBAP_HEADER_LEN + length
    }

    fn expected_response_length(&self, request: &ModbusRequest) -> usize {
        MBAP_HEADER_LEN + 1 + response_pdu_len(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn rtu_frame(content: &[u8]) -> Vec<u8> {
        let mut frame = content.to_vec();
        frame.extend_from_slice(&crc16(content).to_le_bytes());
        frame
    }

    fn read_holding(unit: u8, address: u16, quantity: u16) -> ModbusRequest {
        ModbusRequest::read(unit, ModbusFunction::ReadHoldingRegisters, address, quantity)
    }

    // ===== RTU =====

    #[test]
    fn test_rtu_build_read_request() {
        let codec = RtuFrameCodec::new();
        let frame = codec.build_request(&read_holding(5, 0x0064, 10)).unwrap();

        let crc = crc16(&[0x05, 0x03, 0x00, 0x64, 0x00, 0x0A]);
        assert_eq!(
            frame.as_ref(),
            &[0x05, 0x03, 0x00, 0x64, 0x00, 0x0A, (crc & 0xFF) as u8, (crc >> 8) as u8]
        );
    }

    #[test]
    fn test_rtu_known_frame() {
        let codec = RtuFrameCodec::new();
        let frame = codec.build_request(&read_holding(1, 0, 10)).unwrap();
        assert_eq!(frame.as_ref(), &[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD]);
    }

    #[test]
    fn test_rtu_parse_read_response() {
        let codec = RtuFrameCodec::new();
        let request = read_holding(1, 0, 2);
        let frame = rtu_frame(&[0x01, 0x03, 0x04, 0x12, 0x34, 0x56, 0x78]);

        let response = codec.parse_response(&frame, &request).unwrap();
        assert!(!response.is_error());
        assert_eq!(response.unit_id(), 1);
        assert_eq!(response.function(), ModbusFunction::ReadHoldingRegisters);
        assert_eq!(response.data().as_ref(), &[0x04, 0x12, 0x34, 0x56, 0x78]);
        assert_eq!(response.raw().as_ref(), frame.as_slice());
        assert_eq!(response.parse_registers().unwrap(), vec![0x1234, 0x5678]);
    }

    #[test]
    fn test_rtu_parse_exception_response() {
        let codec = RtuFrameCodec::new();
        let request = read_holding(1, 0, 2);
        let frame = rtu_frame(&[0x01, 0x83, 0x02]);

        let response = codec.parse_response(&frame, &request).unwrap();
        assert!(response.is_error());
        assert_eq!(response.function(), ModbusFunction::ReadHoldingRegisters);
        assert_eq!(response.exception_code(), Some(ExceptionCode::IllegalDataAddress));
    }

    #[test]
    fn test_rtu_corrupted_crc() {
        let codec = RtuFrameCodec::new();
        let request = read_holding(1, 0, 2);
        let mut frame = rtu_frame(&[0x01, 0x03, 0x04, 0x12, 0x34, 0x56, 0x78]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        assert!(!codec.validate_response(&frame));
        assert!(matches!(
            codec.parse_response(&frame, &request),
            Err(ModbusError::Communication { .. })
        ));
    }

    #[test]
    fn test_rtu_short_frames() {
        let codec = RtuFrameCodec::new();
        let request = read_holding(1, 0, 2);

        assert!(codec.parse_response(&[0x01, 0x03], &request).is_err());
        // Valid CRC but nothing after the unit id
        assert!(codec.parse_response(&rtu_frame(&[0x01]), &request).is_err());
        // Exception flag without a code byte
        let err = codec.parse_response(&rtu_frame(&[0x01, 0x83]), &request);
        assert!(matches!(err, Err(ModbusError::Communication { .. })));
    }

    #[test]
    fn test_rtu_unknown_function_in_response() {
        let codec = RtuFrameCodec::new();
        let request = read_holding(1, 0, 1);
        let frame = rtu_frame(&[0x01, 0x2B, 0x00]);
        assert!(matches!(
            codec.parse_response(&frame, &request),
            Err(ModbusError::Communication { .. })
        ));
    }

    #[test]
    fn test_rtu_expected_response_length() {
        let codec = RtuFrameCodec::new();
        assert_eq!(codec.expected_response_length(&read_holding(1, 0, 10)), 25);
        let coils = ModbusRequest::read(1, ModbusFunction::ReadCoils, 0, 10);
        assert_eq!(codec.expected_response_length(&coils), 7);
        let write = ModbusRequest::write_single_register(1, 0, 7);
        assert_eq!(codec.expected_response_length(&write), 8);
        let write = ModbusRequest::write_multiple_registers(1, 0, &[1, 2, 3]);
        assert_eq!(codec.expected_response_length(&write), 8);
    }

    // ===== TCP =====

    #[test]
    fn test_tcp_build_request() {
        let codec = TcpFrameCodec::new();
        let frame = codec.build_request(&read_holding(1, 0x0000, 10)).unwrap();
        assert_eq!(
            frame.as_ref(),
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]
        );
        assert_eq!(codec.last_transaction_id(), 1);
    }

    #[test]
    fn test_tcp_transaction_id_increments() {
        let codec = TcpFrameCodec::new();
        let request = read_holding(1, 0, 1);
        let first = codec.build_request(&request).unwrap();
        let second = codec.build_request(&request).unwrap();

        let tid = |f: &Bytes| u16::from_be_bytes([f[0], f[1]]);
        assert_eq!(tid(&second), tid(&first).wrapping_add(1));
    }

    #[test]
    fn test_tcp_transaction_id_wraps() {
        let codec = TcpFrameCodec::with_initial_transaction_id(65534);
        let request = read_holding(1, 0, 1);

        let ids: Vec<u16> = (0..3)
            .map(|_| {
                let f = codec.build_request(&request).unwrap();
                u16::from_be_bytes([f[0], f[1]])
            })
            .collect();
        assert_eq!(ids, vec![65535, 0, 1]);
    }

    #[test]
    fn test_tcp_transaction_ids_unique_across_threads() {
        let codec = Arc::new(TcpFrameCodec::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let codec = Arc::clone(&codec);
                std::thread::spawn(move || {
                    let request = read_holding(1, 0, 1);
                    (0..250)
                        .map(|_| {
                            let f = codec.build_request(&request).unwrap();
                            u16::from_be_bytes([f[0], f[1]])
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<u16> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_tcp_parse_read_response() {
        let codec = TcpFrameCodec::new();
        let request = read_holding(1, 0, 2);
        let frame = [
            0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, 0x12, 0x34, 0x56, 0x78,
        ];

        assert!(codec.validate_response(&frame));
        let response = codec.parse_response(&frame, &request).unwrap();
        assert_eq!(response.data().as_ref(), &[0x04, 0x12, 0x34, 0x56, 0x78]);
        assert_eq!(response.parse_registers().unwrap(), vec![0x1234, 0x5678]);
    }

    #[test]
    fn test_tcp_parse_ignores_trailing_bytes() {
        let codec = TcpFrameCodec::new();
        let request = read_holding(1, 0, 1);
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x2A, 0xEE];
        let response = codec.parse_response(&frame, &request).unwrap();
        assert_eq!(response.parse_registers().unwrap(), vec![42]);
    }

    #[test]
    fn test_tcp_parse_exception_response() {
        let codec = TcpFrameCodec::new();
        let request = read_holding(1, 0, 2);
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x02];

        let response = codec.parse_response(&frame, &request).unwrap();
        assert!(response.is_error());
        assert_eq!(response.function(), ModbusFunction::ReadHoldingRegisters);
        assert_eq!(response.exception_code(), Some(ExceptionCode::IllegalDataAddress));
    }

    #[test]
    fn test_tcp_malformed_frames() {
        let codec = TcpFrameCodec::new();
        let request = read_holding(1, 0, 2);

        // Too short for the MBAP header
        assert!(codec.parse_response(&[0x00, 0x01, 0x00], &request).is_err());
        // Non-zero protocol id
        let frame = [0x00, 0x01, 0x00, 0x01, 0x00, 0x03, 0x01, 0x03, 0x00];
        assert!(!codec.validate_response(&frame));
        assert!(matches!(
            codec.parse_response(&frame, &request),
            Err(ModbusError::Communication { .. })
        ));
        // Declared length longer than the frame
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x09, 0x01, 0x03, 0x04];
        assert!(!codec.validate_response(&frame));
        assert!(codec.parse_response(&frame, &request).is_err());
        // Declared length too small for unit id + function code
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x01];
        assert!(codec.parse_response(&frame, &request).is_err());
        // Exception flag without a code byte
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x01, 0x83];
        assert!(codec.parse_response(&frame, &request).is_err());
    }

    #[test]
    fn test_tcp_expected_response_length() {
        let codec = TcpFrameCodec::new();
        assert_eq!(codec.expected_response_length(&read_holding(1, 0, 10)), 29);
        let coils = ModbusRequest::read(1, ModbusFunction::ReadDiscreteInputs, 0, 9);
        assert_eq!(codec.expected_response_length(&coils), 11);
        let write = ModbusRequest::write_single_coil(1, 0, true);
        assert_eq!(codec.expected_response_length(&write), 12);
    }

    #[test]
    fn test_build_rejects_missing_payload() {
        let request = ModbusRequest::new(1, ModbusFunction::WriteSingleRegister, 0, 1, Vec::new());
        assert!(matches!(
            RtuFrameCodec::new().build_request(&request),
            Err(ModbusError::InvalidArgument { .. })
        ));
        assert!(matches!(
            TcpFrameCodec::new().build_request(&request),
            Err(ModbusError::InvalidArgument { .. })
        ));
    }
}
