//! End-to-end client tests against an in-process register map.
//!
//! `SimulatedDevice` implements the transport trait and answers frames the
//! way a device would, so requests travel through the real frame codecs,
//! the executor and the register codec.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio_test::{assert_err, assert_ok};

use modbus_master::codec::RegisterValue;
use modbus_master::utils::{crc16, pack_bits, unpack_bits};
use modbus_master::{
    register_value, ByteOrder, ClientConfig, DataType, ExceptionCode, GenericModbusClient,
    ModbusClient, ModbusError, ModbusResult, ModbusTransport, ModbusValue, RtuFrameCodec,
    TcpFrameCodec,
};

#[derive(Clone, Copy, PartialEq)]
enum Framing {
    Rtu,
    Tcp,
}

/// Faults injected before the device answers normally
enum Fault {
    Timeout,
    Busy,
    CorruptCrc,
}

struct SimulatedDevice {
    framing: Framing,
    unit_id: u8,
    registers: Vec<u16>,
    coils: Vec<bool>,
    faults: VecDeque<Fault>,
    requests: usize,
    connected: bool,
    timeout: Duration,
}

impl SimulatedDevice {
    fn new(framing: Framing) -> Self {
        Self {
            framing,
            unit_id: 1,
            registers: vec![0; 512],
            coils: vec![false; 512],
            faults: VecDeque::new(),
            requests: 0,
            connected: false,
            timeout: Duration::from_secs(1),
        }
    }

    fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push_back(fault);
        self
    }

    /// Split a request frame into (header, unit, pdu)
    fn unframe<'a>(&self, frame: &'a [u8]) -> (&'a [u8], u8, &'a [u8]) {
        match self.framing {
            Framing::Rtu => {
                let body = &frame[..frame.len() - 2];
                let crc = u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
                assert_eq!(crc, crc16(body), "request CRC");
                (&[], body[0], &body[1..])
            }
            Framing::Tcp => {
                let length = u16::from_be_bytes([frame[4], frame[5]]) as usize;
                assert_eq!(frame.len(), 6 + length, "MBAP length");
                (&frame[..4], frame[6], &frame[7..])
            }
        }
    }

    fn frame(&self, header: &[u8], unit: u8, pdu: &[u8]) -> Vec<u8> {
        match self.framing {
            Framing::Rtu => {
                let mut out = vec![unit];
                out.extend_from_slice(pdu);
                let crc = crc16(&out);
                out.extend_from_slice(&crc.to_le_bytes());
                out
            }
            Framing::Tcp => {
                let mut out = header.to_vec();
                out.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
                out.push(unit);
                out.extend_from_slice(pdu);
                out
            }
        }
    }

    fn word(pdu: &[u8], offset: usize) -> usize {
        u16::from_be_bytes([pdu[offset], pdu[offset + 1]]) as usize
    }

    fn registers_payload(&self, function: u8, address: usize, quantity: usize) -> Vec<u8> {
        let mut pdu = vec![function, (quantity * 2) as u8];
        for value in &self.registers[address..address + quantity] {
            pdu.extend_from_slice(&value.to_be_bytes());
        }
        pdu
    }

    fn write_registers(&mut self, address: usize, bytes: &[u8]) {
        for (i, chunk) in bytes.chunks_exact(2).enumerate() {
            self.registers[address + i] = u16::from_be_bytes([chunk[0], chunk[1]]);
        }
    }

    /// Response PDU for a request PDU
    fn handle(&mut self, pdu: &[u8]) -> Vec<u8> {
        let function = pdu[0];
        let address = Self::word(pdu, 1);
        match function {
            0x01 | 0x02 => {
                let quantity = Self::word(pdu, 3);
                let bits = pack_bits(&self.coils[address..address + quantity]);
                let mut out = vec![function, bits.len() as u8];
                out.extend_from_slice(&bits);
                out
            }
            0x03 | 0x04 => {
                let quantity = Self::word(pdu, 3);
                if address + quantity > self.registers.len() {
                    return vec![function | 0x80, 0x02];
                }
                self.registers_payload(function, address, quantity)
            }
            0x05 => {
                self.coils[address] = pdu[3] == 0xFF;
                pdu.to_vec()
            }
            0x06 => {
                self.registers[address] = Self::word(pdu, 3) as u16;
                pdu.to_vec()
            }
            0x0F => {
                let quantity = Self::word(pdu, 3);
                let bits = unpack_bits(&pdu[6..], quantity);
                self.coils[address..address + quantity].copy_from_slice(&bits);
                pdu[..5].to_vec()
            }
            0x10 => {
                let count = pdu[5] as usize;
                self.write_registers(address, &pdu[6..6 + count]);
                pdu[..5].to_vec()
            }
            0x17 => {
                let quantity = Self::word(pdu, 3);
                let write_address = Self::word(pdu, 5);
                let count = pdu[9] as usize;
                self.write_registers(write_address, &pdu[10..10 + count]);
                self.registers_payload(function, address, quantity)
            }
            _ => vec![function | 0x80, 0x01],
        }
    }
}

impl ModbusTransport for SimulatedDevice {
    fn connect(&mut self) -> impl Future<Output = ModbusResult<bool>> + Send {
        self.connected = true;
        async { Ok(true) }
    }

    fn disconnect(&mut self) -> impl Future<Output = ModbusResult<()>> + Send {
        self.connected = false;
        async { Ok(()) }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send_receive(&mut self, request: &[u8]) -> impl Future<Output = ModbusResult<Bytes>> + Send {
        self.requests += 1;
        let (header, unit, pdu) = self.unframe(request);
        let header = header.to_vec();
        let pdu = pdu.to_vec();

        let reply = match self.faults.pop_front() {
            Some(Fault::Timeout) => Err(ModbusError::timeout("send_receive", 1000)),
            Some(Fault::Busy) => Ok(self.frame(&header, unit, &[pdu[0] | 0x80, 0x06])),
            Some(Fault::CorruptCrc) => {
                let response = self.handle(&pdu);
                let mut frame = self.frame(&header, unit, &response);
                let last = frame.len() - 1;
                frame[last] ^= 0xFF;
                Ok(frame)
            }
            None if unit != self.unit_id => Err(ModbusError::timeout("send_receive", 1000)),
            None => {
                let response = self.handle(&pdu);
                Ok(self.frame(&header, unit, &response))
            }
        };
        async move { reply.map(Bytes::from) }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Meter {
    voltage: f32,
    current: f32,
    energy: u32,
    status: u16,
}

register_value!(Meter {
    voltage: f32,
    current: f32,
    energy: u32,
    status: u16,
});

async fn connected_rtu(device: SimulatedDevice) -> GenericModbusClient<RtuFrameCodec, SimulatedDevice> {
    let mut client = GenericModbusClient::new(RtuFrameCodec::new(), device);
    assert_ok!(client.connect().await);
    client
}

async fn connected_tcp(device: SimulatedDevice) -> GenericModbusClient<TcpFrameCodec, SimulatedDevice> {
    let mut client = GenericModbusClient::new(TcpFrameCodec::new(), device);
    assert_ok!(client.connect().await);
    client
}

/// Write and read back through every register and coil function
async fn exercise<C: ModbusClient>(client: &mut C) {
    assert_ok!(client.write_06(1, 10, 0xBEEF).await);
    assert_ok!(client.write_10(1, 11, &[1, 2, 3]).await);
    assert_eq!(
        assert_ok!(client.read_03(1, 10, 4).await),
        vec![0xBEEF, 1, 2, 3]
    );
    assert_eq!(assert_ok!(client.read_04(1, 12, 2).await), vec![2, 3]);

    let pattern = [true, false, true, true, false, false, true, false, true];
    assert_ok!(client.write_0f(1, 20, &pattern).await);
    assert_ok!(client.write_05(1, 29, true).await);
    let coils = assert_ok!(client.read_01(1, 20, 10).await);
    assert_eq!(&coils[..9], &pattern);
    assert!(coils[9]);
    assert_eq!(assert_ok!(client.read_02(1, 20, 3).await), vec![true, false, true]);

    let read = assert_ok!(client.read_write_17(1, 40, 2, 40, &[7, 8]).await);
    assert_eq!(read, vec![7, 8]);
}

#[tokio::test]
async fn rtu_round_trip_all_functions() {
    let mut client = connected_rtu(SimulatedDevice::new(Framing::Rtu)).await;
    exercise(&mut client).await;
    assert_eq!(client.get_stats().errors, 0);
}

#[tokio::test]
async fn tcp_round_trip_all_functions() {
    let mut client = connected_tcp(SimulatedDevice::new(Framing::Tcp)).await;
    exercise(&mut client).await;
    // one transaction id per request
    assert_eq!(
        client.codec().last_transaction_id() as usize,
        client.transport().requests
    );
}

#[tokio::test]
async fn typed_values_in_every_byte_order() {
    let mut client = connected_tcp(SimulatedDevice::new(Framing::Tcp)).await;

    for (i, order) in ByteOrder::ALL.into_iter().enumerate() {
        let address = 100 + 10 * i as u16;
        let values = [1.5f64, -273.15];
        assert_ok!(client.write_multiple_registers_as(1, address, &values, order).await);
        let back: Vec<f64> = assert_ok!(client.read_holding_registers_as(1, address, 2, order).await);
        assert_eq!(back, values);
    }
}

#[tokio::test]
async fn word_swapped_float_layout_on_the_wire() {
    let mut client = connected_rtu(SimulatedDevice::new(Framing::Rtu)).await;

    assert_ok!(
        client
            .write_single_register_as(1, 0, &25.0f32, ByteOrder::BigEndianSwap)
            .await
    );
    assert_eq!(&client.transport().registers[..2], &[0x0000, 0x41C8]);

    let raw = assert_ok!(client.read_03(1, 0, 2).await);
    assert_eq!(
        ModbusValue::decode(&raw, DataType::F32, ByteOrder::BigEndianSwap),
        Ok(ModbusValue::F32(25.0))
    );
}

#[tokio::test]
async fn struct_values_round_trip() {
    let mut client = connected_rtu(SimulatedDevice::new(Framing::Rtu)).await;
    let meter = Meter {
        voltage: 230.1,
        current: 4.25,
        energy: 123_456,
        status: 0x0003,
    };
    let registers = <Meter as RegisterValue>::SIZE.div_ceil(2);
    assert_eq!(registers, 7);

    assert_ok!(
        client
            .write_multiple_registers_as(1, 200, std::slice::from_ref(&meter), ByteOrder::LittleEndianSwap)
            .await
    );
    let back: Vec<Meter> = assert_ok!(
        client
            .read_input_registers_as(1, 200, 1, ByteOrder::LittleEndianSwap)
            .await
    );
    assert_eq!(back, vec![meter]);
}

#[tokio::test(start_paused = true)]
async fn transient_faults_are_retried() {
    let device = SimulatedDevice::new(Framing::Rtu)
        .with_fault(Fault::Timeout)
        .with_fault(Fault::Busy)
        .with_fault(Fault::CorruptCrc);
    let mut client = connected_rtu(device).await;

    assert_ok!(client.write_06(1, 5, 99).await);
    assert_eq!(client.transport().requests, 4);
    assert_eq!(client.transport().registers[5], 99);

    let stats = client.get_stats();
    assert_eq!(stats.retries, 3);
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.exceptions, 1);
}

#[tokio::test]
async fn device_exception_is_not_retried() {
    let mut client = connected_tcp(SimulatedDevice::new(Framing::Tcp)).await;

    let err = assert_err!(client.read_03(1, 500, 20).await);
    assert_eq!(err.exception_code(), Some(ExceptionCode::IllegalDataAddress));
    assert_eq!(client.transport().requests, 1);
}

#[tokio::test(start_paused = true)]
async fn silent_unit_exhausts_retries() {
    let config = ClientConfig::new()
        .with_retries(1)
        .with_retry_base_delay(Duration::from_millis(10));
    let mut client =
        GenericModbusClient::with_config(RtuFrameCodec::new(), SimulatedDevice::new(Framing::Rtu), config);
    assert_ok!(client.connect().await);

    let err = assert_err!(client.read_03(9, 0, 1).await);
    assert!(matches!(err, ModbusError::Timeout { .. }));
    assert_eq!(client.transport().requests, 2);
}

#[tokio::test]
async fn bounds_fail_before_io() {
    let mut client = connected_rtu(SimulatedDevice::new(Framing::Rtu)).await;

    assert_err!(client.read_03(1, 0, 126).await);
    assert_err!(client.read_01(1, 0, 2001).await);
    assert_err!(client.write_10(1, 0, &[0; 124]).await);
    assert_err!(client.write_0f(1, 0, &[false; 1969]).await);
    assert_eq!(client.transport().requests, 0);
}

#[tokio::test]
async fn close_disposes_client() {
    let mut client = connected_tcp(SimulatedDevice::new(Framing::Tcp)).await;
    assert!(client.is_connected());

    assert_ok!(client.close().await);
    assert!(!client.transport().is_connected());
    assert_eq!(client.read_03(1, 0, 1).await, Err(ModbusError::Disposed));
}
