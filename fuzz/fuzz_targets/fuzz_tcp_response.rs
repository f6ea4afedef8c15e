#![no_main]

use libfuzzer_sys::fuzz_target;
use modbus_master::{FrameCodec, ModbusFunction, ModbusRequest, TcpFrameCodec};

fuzz_target!(|frame: &[u8]| {
    let request = ModbusRequest::read(1, ModbusFunction::ReadInputRegisters, 0, 10);
    let codec = TcpFrameCodec::new();

    let _ = codec.validate_response(frame);
    if let Ok(response) = codec.parse_response(frame, &request) {
        let _ = response.parse_registers();
        let _ = response.into_result();
    }
});
