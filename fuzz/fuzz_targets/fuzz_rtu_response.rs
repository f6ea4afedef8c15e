#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use modbus_master::{FrameCodec, ModbusFunction, ModbusRequest, RtuFrameCodec};

#[derive(Debug, Arbitrary)]
struct Input {
    function: u8,
    quantity: u16,
    frame: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let function = ModbusFunction::from_u8(input.function).unwrap_or(ModbusFunction::ReadHoldingRegisters);
    let request = ModbusRequest::read(1, function, 0, input.quantity);
    let codec = RtuFrameCodec::new();

    // Must never panic, whatever the bytes
    let _ = codec.validate_response(&input.frame);
    if let Ok(response) = codec.parse_response(&input.frame, &request) {
        let _ = response.parse_registers();
        let _ = response.parse_bits(input.quantity as usize);
    }
});
