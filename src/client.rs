//! High-level Modbus client and request executor
//!
//! Modbus TCP and RTU share the same application layer (PDU) and differ only
//! in framing:
//! - **TCP**: MBAP Header + PDU
//! - **RTU**: Slave ID + PDU + CRC
//!
//! [`GenericModbusClient`] pairs a [`FrameCodec`] with a [`ModbusTransport`],
//! so the application logic is written once for both framings. RTU over TCP
//! is just [`RtuFrameCodec`] paired with a TCP transport.
//!
//! # API Naming Convention
//!
//! | Function Code | Primary Name | Semantic Alias |
//! |---------------|--------------|----------------|
//! | 0x01 | `read_01()` | `read_coils()` |
//! | 0x02 | `read_02()` | `read_discrete_inputs()` |
//! | 0x03 | `read_03()` | `read_holding_registers()` |
//! | 0x04 | `read_04()` | `read_input_registers()` |
//! | 0x05 | `write_05()` | `write_single_coil()` |
//! | 0x06 | `write_06()` | `write_single_register()` |
//! | 0x0F | `write_0f()` | `write_multiple_coils()` |
//! | 0x10 | `write_10()` | `write_multiple_registers()` |
//! | 0x17 | `read_write_17()` | `read_write_multiple_registers()` |
//!
//! # Request execution
//!
//! Every operation goes through [`GenericModbusClient::execute_request`]:
//!
//! 1. `Disposed` after [`ModbusClient::close`], `Connection` when the transport is down
//! 2. Bounds validation, failing with `InvalidArgument` before any I/O
//! 3. Up to `retries + 1` attempts of build, send, validate and parse
//! 4. Timeouts, communication errors and "device busy" exceptions are retried
//!    after a linear backoff of `100ms × (attempt + 1)`
//! 5. The cancellation token is checked before each attempt and raced
//!    against both the transport call and the backoff sleep
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use modbus_master::{ByteOrder, GenericModbusClient, ModbusClient, ModbusResult, TcpFrameCodec};
//!
//! async fn poll(transport: impl modbus_master::ModbusTransport) -> ModbusResult<()> {
//!     let mut client = GenericModbusClient::new(TcpFrameCodec::new(), transport);
//!     client.connect().await?;
//!
//!     // Read 10 holding registers from unit 1, starting at address 0
//!     let registers = client.read_03(1, 0, 10).await?;
//!
//!     // Two IEEE-754 floats stored word-swapped
//!     let temps: Vec<f32> = client
//!         .read_holding_registers_as(1, 100, 2, ByteOrder::BigEndianSwap)
//!         .await?;
//!
//!     client.write_06(1, 100, 0x1234).await?;
//!     client.close().await
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bytes::ByteOrder;
use crate::codec::{from_registers, to_registers, total_register_count, RegisterValue};
use crate::config::ClientConfig;
use crate::constants::{MAX_READ_REGISTERS, MAX_WRITE_COILS, MAX_WRITE_REGISTERS};
use crate::error::{ModbusError, ModbusResult};
use crate::frame::{FrameCodec, RtuFrameCodec, TcpFrameCodec};
use crate::protocol::{ModbusFunction, ModbusRequest, ModbusResponse, SlaveId};
use crate::retry::{AttemptState, RetryPolicy};
use crate::transport::{ModbusTransport, TransportStats};

/// Async interface for the standard Modbus master functions.
///
/// # Protocol Limits
///
/// | Operation | Limit |
/// |-----------|-------|
/// | Read Coils (0x01) | 2000 coils |
/// | Read Discrete Inputs (0x02) | 2000 bits |
/// | Read Holding Registers (0x03) | 125 registers |
/// | Read Input Registers (0x04) | 125 registers |
/// | Write Multiple Coils (0x0F) | 1968 coils |
/// | Write Multiple Registers (0x10) | 123 registers |
/// | Read/Write Multiple Registers (0x17) | 125 read, 121 written |
///
/// Requests outside these limits fail with [`ModbusError::InvalidArgument`]
/// before anything is sent.
pub trait ModbusClient: Send + Sync {
    /// Read coils (function code 0x01).
    ///
    /// # Arguments
    ///
    /// * `slave_id` - The Modbus slave/unit ID
    /// * `address` - Starting coil address
    /// * `quantity` - Number of coils to read (1-2000)
    fn read_01(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send;

    /// Read discrete inputs (function code 0x02).
    fn read_02(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send;

    /// Read holding registers (function code 0x03).
    ///
    /// # Arguments
    ///
    /// * `slave_id` - The Modbus slave/unit ID
    /// * `address` - Starting register address
    /// * `quantity` - Number of registers to read (1-125)
    fn read_03(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Read input registers (function code 0x04).
    fn read_04(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Write single coil (function code 0x05).
    fn write_05(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        value: bool,
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write single register (function code 0x06).
    fn write_06(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        value: u16,
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write multiple coils (function code 0x0F), 1-1968 values.
    fn write_0f(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[bool],
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write multiple registers (function code 0x10), 1-123 values.
    fn write_10(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write then read registers in one transaction (function code 0x17).
    ///
    /// The device performs the write before the read.
    fn read_write_17(
        &mut self,
        slave_id: SlaveId,
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Whether the underlying transport is connected.
    fn is_connected(&self) -> bool;

    /// Close the transport and dispose of the client.
    ///
    /// Every later operation fails with [`ModbusError::Disposed`].
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Request counters since the client was created.
    fn get_stats(&self) -> TransportStats;

    // ===== Semantic name aliases (for readability) =====

    /// Alias for `read_01` - Read coils
    #[inline]
    fn read_coils(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send {
        self.read_01(slave_id, address, quantity)
    }

    /// Alias for `read_02` - Read discrete inputs
    #[inline]
    fn read_discrete_inputs(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send {
        self.read_02(slave_id, address, quantity)
    }

    /// Alias for `read_03` - Read holding registers
    #[inline]
    fn read_holding_registers(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send {
        self.read_03(slave_id, address, quantity)
    }

    /// Alias for `read_04` - Read input registers
    #[inline]
    fn read_input_registers(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send {
        self.read_04(slave_id, address, quantity)
    }

    /// Alias for `write_05` - Write single coil
    #[inline]
    fn write_single_coil(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        value: bool,
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        self.write_05(slave_id, address, value)
    }

    /// Alias for `write_06` - Write single register
    #[inline]
    fn write_single_register(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        value: u16,
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        self.write_06(slave_id, address, value)
    }

    /// Alias for `write_0f` - Write multiple coils
    #[inline]
    fn write_multiple_coils(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[bool],
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        self.write_0f(slave_id, address, values)
    }

    /// Alias for `write_10` - Write multiple registers
    #[inline]
    fn write_multiple_registers(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        self.write_10(slave_id, address, values)
    }

    /// Alias for `read_write_17` - Read/write multiple registers
    #[inline]
    fn read_write_multiple_registers(
        &mut self,
        slave_id: SlaveId,
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send {
        self.read_write_17(slave_id, read_address, read_quantity, write_address, values)
    }

    // ===== Typed register access =====

    /// Read `count` values of `V` from holding registers.
    ///
    /// The register quantity is `ceil(V::SIZE × count / 2)` and must not
    /// exceed 125.
    fn read_holding_registers_as<V: RegisterValue + Send>(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        count: usize,
        order: ByteOrder,
    ) -> impl Future<Output = ModbusResult<Vec<V>>> + Send {
        async move {
            let quantity = read_quantity_for::<V>(count)?;
            let registers = self.read_03(slave_id, address, quantity).await?;
            from_registers(&registers, count, order)
        }
    }

    /// Read `count` values of `V` from input registers.
    fn read_input_registers_as<V: RegisterValue + Send>(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        count: usize,
        order: ByteOrder,
    ) -> impl Future<Output = ModbusResult<Vec<V>>> + Send {
        async move {
            let quantity = read_quantity_for::<V>(count)?;
            let registers = self.read_04(slave_id, address, quantity).await?;
            from_registers(&registers, count, order)
        }
    }

    /// Write one value of `V`.
    ///
    /// Uses function 0x06 when `V` fits in a single register and 0x10 otherwise.
    fn write_single_register_as<V: RegisterValue + Sync>(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        value: &V,
        order: ByteOrder,
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        let registers = to_registers(std::slice::from_ref(value), order);
        async move {
            match registers.as_slice() {
                [single] => self.write_06(slave_id, address, *single).await,
                _ => self.write_10(slave_id, address, &registers).await,
            }
        }
    }

    /// Write consecutive values of `V`; the total must fit in 123 registers.
    fn write_multiple_registers_as<V: RegisterValue + Sync>(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[V],
        order: ByteOrder,
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        let registers = to_registers(values, order);
        async move {
            if registers.is_empty() || registers.len() > MAX_WRITE_REGISTERS {
                return Err(ModbusError::invalid_argument(format!(
                    "{} values need {} registers, allowed 1-{}",
                    values.len(),
                    registers.len(),
                    MAX_WRITE_REGISTERS
                )));
            }
            self.write_10(slave_id, address, &registers).await
        }
    }
}

/// Register quantity for `count` values of `V`, bounded by the read limit
fn read_quantity_for<V: RegisterValue>(count: usize) -> ModbusResult<u16> {
    if V::SIZE.checked_mul(count).is_none() {
        return Err(ModbusError::invalid_argument(format!(
            "{} values of {} bytes overflow the address space",
            count,
            V::SIZE
        )));
    }
    let quantity = total_register_count::<V>(count);
    if count == 0 || quantity == 0 || quantity > MAX_READ_REGISTERS {
        return Err(ModbusError::invalid_argument(format!(
            "{} values need {} registers, allowed 1-{}",
            count, quantity, MAX_READ_REGISTERS
        )));
    }
    // bounded by MAX_READ_REGISTERS above
    Ok(quantity as u16)
}

/// Array length as a request quantity within `1..=limit`
fn array_quantity(len: usize, limit: usize, what: &str) -> ModbusResult<u16> {
    if len == 0 || len > limit {
        return Err(ModbusError::invalid_argument(format!(
            "Invalid {} count: {} (allowed 1-{})",
            what, len, limit
        )));
    }
    u16::try_from(len).map_err(|_| ModbusError::invalid_argument(format!("{} count overflow", what)))
}

/// Modbus client over any framing and transport.
///
/// Holds the retry policy, the cancellation token and request counters. Each
/// operation takes `&mut self`, so at most one request is in flight per client.
pub struct GenericModbusClient<F: FrameCodec, T: ModbusTransport> {
    codec: F,
    transport: T,
    policy: RetryPolicy,
    cancel: CancellationToken,
    disposed: bool,
    stats: TransportStats,
}

/// Client using MBAP framing.
pub type ModbusTcpClient<T> = GenericModbusClient<TcpFrameCodec, T>;

/// Client using RTU framing, over a serial line or a TCP/UDP tunnel.
pub type ModbusRtuClient<T> = GenericModbusClient<RtuFrameCodec, T>;

impl<F: FrameCodec, T: ModbusTransport> GenericModbusClient<F, T> {
    /// Create a client with the default configuration
    pub fn new(codec: F, transport: T) -> Self {
        Self::with_config(codec, transport, ClientConfig::default())
    }

    /// Create a client and apply `config.timeout` to the transport
    pub fn with_config(codec: F, mut transport: T, config: ClientConfig) -> Self {
        transport.set_timeout(config.timeout);
        Self {
            codec,
            transport,
            policy: RetryPolicy::from(&config),
            cancel: CancellationToken::new(),
            disposed: false,
            stats: TransportStats::default(),
        }
    }

    /// Get a reference to the frame codec
    pub fn codec(&self) -> &F {
        &self.codec
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Retries after the first attempt
    pub fn retries(&self) -> u32 {
        self.policy.max_retries()
    }

    /// Change the retry count, keeping the backoff base
    pub fn set_retries(&mut self, retries: u32) {
        self.policy = RetryPolicy::new(retries, self.policy.base_delay());
    }

    /// Transport timeout
    pub fn timeout(&self) -> Duration {
        self.transport.timeout()
    }

    /// Change the transport timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.transport.set_timeout(timeout);
    }

    /// Active retry policy
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Token that cancels in-flight and future requests of this client
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Replace the cancellation token, e.g. with a child of a shutdown token
    pub fn set_cancel_token(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    /// Whether [`ModbusClient::close`] has been called
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Open the transport connection
    pub async fn connect(&mut self) -> ModbusResult<bool> {
        if self.disposed {
            return Err(ModbusError::Disposed);
        }
        let connected = self.transport.connect().await?;
        debug!("{} transport connect: {}", self.codec.name(), connected);
        Ok(connected)
    }

    /// Close the transport connection; the client stays usable after reconnecting
    pub async fn disconnect(&mut self) -> ModbusResult<()> {
        if self.disposed {
            return Err(ModbusError::Disposed);
        }
        self.transport.disconnect().await
    }

    /// Execute a request with validation, retries and cancellation.
    ///
    /// Exception responses are returned as [`ModbusError::Exception`].
    pub async fn execute_request(&mut self, request: ModbusRequest) -> ModbusResult<ModbusResponse> {
        if self.disposed {
            return Err(ModbusError::Disposed);
        }
        if !self.transport.is_connected() {
            return Err(ModbusError::connection("Transport is not connected"));
        }
        request.validate()?;

        debug!(
            "Executing {} for unit {} at address {}, quantity {}",
            request.function(),
            request.unit_id(),
            request.address(),
            request.quantity()
        );

        let mut state = self.policy.start();
        let mut outcome = None;
        while !state.is_terminal() {
            state = match state {
                AttemptState::Attempting { attempt } => {
                    let result = self.attempt(&request).await;
                    let next = match &result {
                        Ok(_) => self.policy.on_success(attempt),
                        Err(error) => {
                            self.stats.record_error(error);
                            self.policy.on_failure(attempt, error)
                        }
                    };
                    if let (AttemptState::Backoff { delay, .. }, Err(error)) = (&next, &result) {
                        warn!(
                            "{} attempt {}/{} failed: {}, retrying in {:?}",
                            request.function(),
                            attempt + 1,
                            self.policy.max_attempts(),
                            error,
                            delay
                        );
                    }
                    outcome = Some(result);
                    next
                }
                AttemptState::Backoff { attempt, delay } => {
                    self.stats.retries += 1;
                    self.backoff(delay).await?;
                    self.policy.after_backoff(attempt)
                }
                AttemptState::Succeeded { .. } | AttemptState::Failed { .. } => state,
            };
        }

        if let AttemptState::Succeeded { attempt } = state {
            if attempt > 0 {
                debug!("{} succeeded after {} retries", request.function(), attempt);
            }
        }
        outcome.unwrap_or_else(|| Err(ModbusError::protocol("Request finished without an attempt")))
    }

    /// One build, send, validate and parse cycle
    async fn attempt(&mut self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        if self.cancel.is_cancelled() {
            return Err(ModbusError::Cancelled);
        }

        let frame = self.codec.build_request(request)?;
        self.stats.record_sent(frame.len());

        let raw = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ModbusError::Cancelled),
            result = self.transport.send_receive(&frame) => result?,
        };
        self.stats.record_received(raw.len());

        if !self.codec.validate_response(&raw) {
            return Err(ModbusError::communication(format!(
                "Invalid {} response frame ({} bytes)",
                self.codec.name(),
                raw.len()
            )));
        }

        self.codec.parse_response(&raw, request)?.into_result()
    }

    /// Wait out a backoff delay unless cancelled first
    async fn backoff(&self, delay: Duration) -> ModbusResult<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ModbusError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    async fn read_bits(
        &mut self,
        slave_id: SlaveId,
        function: ModbusFunction,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        let request = ModbusRequest::read(slave_id, function, address, quantity);
        let response = self.execute_request(request).await?;
        response.parse_bits(quantity as usize)
    }

    async fn read_registers(
        &mut self,
        slave_id: SlaveId,
        function: ModbusFunction,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        let request = ModbusRequest::read(slave_id, function, address, quantity);
        let response = self.execute_request(request).await?;
        checked_registers(&response, quantity)
    }
}

/// Registers of a read response whose byte count must equal `2 × quantity`
fn checked_registers(response: &ModbusResponse, quantity: u16) -> ModbusResult<Vec<u16>> {
    let registers = response.parse_registers()?;
    if registers.len() != quantity as usize {
        return Err(ModbusError::communication(format!(
            "Expected {} registers ({} bytes), response carries {}",
            quantity,
            quantity as usize * 2,
            registers.len()
        )));
    }
    Ok(registers)
}

impl<F: FrameCodec, T: ModbusTransport> ModbusClient for GenericModbusClient<F, T> {
    async fn read_01(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.read_bits(slave_id, ModbusFunction::ReadCoils, address, quantity)
            .await
    }

    async fn read_02(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.read_bits(slave_id, ModbusFunction::ReadDiscreteInputs, address, quantity)
            .await
    }

    async fn read_03(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_registers(slave_id, ModbusFunction::ReadHoldingRegisters, address, quantity)
            .await
    }

    async fn read_04(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_registers(slave_id, ModbusFunction::ReadInputRegisters, address, quantity)
            .await
    }

    async fn write_05(&mut self, slave_id: SlaveId, address: u16, value: bool) -> ModbusResult<()> {
        let request = ModbusRequest::write_single_coil(slave_id, address, value);
        self.execute_request(request).await?;
        Ok(())
    }

    async fn write_06(&mut self, slave_id: SlaveId, address: u16, value: u16) -> ModbusResult<()> {
        let request = ModbusRequest::write_single_register(slave_id, address, value);
        self.execute_request(request).await?;
        Ok(())
    }

    async fn write_0f(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[bool],
    ) -> ModbusResult<()> {
        array_quantity(values.len(), MAX_WRITE_COILS, "coil")?;
        let request = ModbusRequest::write_multiple_coils(slave_id, address, values);
        self.execute_request(request).await?;
        Ok(())
    }

    async fn write_10(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        array_quantity(values.len(), MAX_WRITE_REGISTERS, "register")?;
        let request = ModbusRequest::write_multiple_registers(slave_id, address, values);
        self.execute_request(request).await?;
        Ok(())
    }

    async fn read_write_17(
        &mut self,
        slave_id: SlaveId,
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        values: &[u16],
    ) -> ModbusResult<Vec<u16>> {
        array_quantity(values.len(), crate::constants::MAX_RW_WRITE_REGISTERS, "write register")?;
        let request = ModbusRequest::read_write_multiple_registers(
            slave_id,
            read_address,
            read_quantity,
            write_address,
            values,
        );
        let response = self.execute_request(request).await?;
        checked_registers(&response, read_quantity)
    }

    fn is_connected(&self) -> bool {
        !self.disposed && self.transport.is_connected()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        if self.transport.is_connected() {
            self.transport.disconnect().await?;
        }
        debug!("{} client closed", self.codec.name());
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats
    }
}
