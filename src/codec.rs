//! # Register Codec
//!
//! Reinterprets a run of 16-bit registers (or their raw bytes) as typed
//! values under a configurable [`ByteOrder`].
//!
//! Values are serialized big-endian field by field through the
//! [`RegisterValue`] trait, so results never depend on the host byte order.
//! The layout transform is then applied to each value's bytes.
//!
//! ## Supported Types
//!
//! | Type | Bytes | Registers |
//! |------|-------|-----------|
//! | u8, i8 | 1 | 1 (zero-padded) |
//! | u16, i16 | 2 | 1 |
//! | u32, i32, f32 | 4 | 2 |
//! | u64, i64, f64 | 8 | 4 |
//! | `[T; N]` | N × T | ceil(N × T / 2) |
//! | structs via [`register_value!`](crate::register_value) | sum of fields | ceil(sum / 2) |
//!
//! ## Example
//!
//! ```rust
//! use modbus_master::{codec, ByteOrder};
//!
//! let regs = codec::to_registers(&[25.5f32], ByteOrder::BigEndianSwap);
//! let back: Vec<f32> = codec::from_registers(&regs, 1, ByteOrder::BigEndianSwap).unwrap();
//! assert_eq!(back, vec![25.5]);
//! ```

use crate::bytes::ByteOrder;
use crate::error::{ModbusError, ModbusResult};
use crate::utils::{bytes_to_registers, registers_to_bytes};

/// A fixed-size value that can be carried in Modbus registers.
///
/// Implement it for your own record types with
/// [`register_value!`](crate::register_value).
pub trait RegisterValue: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Write the big-endian encoding into the first `SIZE` bytes of `out`
    fn write_be(&self, out: &mut [u8]);

    /// Decode from the first `SIZE` big-endian bytes of `bytes`
    fn read_be(bytes: &[u8]) -> Self;

    /// Convert `SIZE` big-endian bytes to `order`, in place.
    ///
    /// Scalars transform as one unit. Composite values transform each
    /// element or field separately so their members keep their positions.
    fn reorder(bytes: &mut [u8], order: ByteOrder) {
        order.apply(&mut bytes[..Self::SIZE]);
    }
}

macro_rules! impl_register_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl RegisterValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn write_be(&self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_be_bytes());
                }

                #[inline]
                fn read_be(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_be_bytes(buf)
                }
            }
        )*
    };
}

impl_register_value!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl<T: RegisterValue, const N: usize> RegisterValue for [T; N] {
    const SIZE: usize = T::SIZE * N;

    fn write_be(&self, out: &mut [u8]) {
        for (value, chunk) in self.iter().zip(out.chunks_exact_mut(T::SIZE)) {
            value.write_be(chunk);
        }
    }

    fn read_be(bytes: &[u8]) -> Self {
        std::array::from_fn(|i| T::read_be(&bytes[i * T::SIZE..]))
    }

    fn reorder(bytes: &mut [u8], order: ByteOrder) {
        for chunk in bytes[..Self::SIZE].chunks_exact_mut(T::SIZE) {
            T::reorder(chunk, order);
        }
    }
}

/// Implement [`RegisterValue`] for a plain struct from its ordered field list.
///
/// Fields are laid out back to back in declaration order, each one encoded
/// and reordered by its own type.
///
/// ```rust
/// use modbus_master::{codec, register_value, ByteOrder};
///
/// #[derive(Debug, PartialEq)]
/// struct Reading {
///     voltage: f32,
///     status: u16,
/// }
///
/// register_value!(Reading { voltage: f32, status: u16 });
///
/// let regs = codec::to_registers(&[Reading { voltage: 230.0, status: 1 }], ByteOrder::BigEndian);
/// assert_eq!(regs.len(), 3);
/// ```
#[macro_export]
macro_rules! register_value {
    ($name:ident { $($field:ident : $ty:ty),+ $(,)? }) => {
        impl $crate::codec::RegisterValue for $name {
            const SIZE: usize = 0 $(+ <$ty as $crate::codec::RegisterValue>::SIZE)+;

            #[allow(unused_assignments)]
            fn write_be(&self, out: &mut [u8]) {
                let mut offset = 0;
                $(
                    <$ty as $crate::codec::RegisterValue>::write_be(&self.$field, &mut out[offset..]);
                    offset += <$ty as $crate::codec::RegisterValue>::SIZE;
                )+
            }

            #[allow(unused_assignments)]
            fn read_be(bytes: &[u8]) -> Self {
                let mut offset = 0;
                $(
                    let $field = <$ty as $crate::codec::RegisterValue>::read_be(&bytes[offset..]);
                    offset += <$ty as $crate::codec::RegisterValue>::SIZE;
                )+
                Self { $($field),+ }
            }

            #[allow(unused_assignments)]
            fn reorder(bytes: &mut [u8], order: $crate::bytes::ByteOrder) {
                let mut offset = 0;
                $(
                    let size = <$ty as $crate::codec::RegisterValue>::SIZE;
                    <$ty as $crate::codec::RegisterValue>::reorder(
                        &mut bytes[offset..offset + size],
                        order,
                    );
                    offset += size;
                )+
            }
        }
    };
}

// ============================================================================
// Register counts
// ============================================================================

/// Registers needed for one `T`: `ceil(T::SIZE / 2)`.
#[inline]
pub fn register_count_for<T: RegisterValue>() -> usize {
    T::SIZE.div_ceil(2)
}

/// Registers needed for `count` consecutive `T`s: `ceil(T::SIZE × count / 2)`.
///
/// Saturates at `usize::MAX / 2 + 1` when the byte length overflows, which is
/// far above any Modbus quantity limit.
#[inline]
pub fn total_register_count<T: RegisterValue>(count: usize) -> usize {
    T::SIZE.saturating_mul(count).div_ceil(2)
}

// ============================================================================
// Byte buffer API
// ============================================================================

/// Encode values into wire bytes laid out in `order`.
pub fn to_bytes<T: RegisterValue>(values: &[T], order: ByteOrder) -> Vec<u8> {
    if T::SIZE == 0 {
        return Vec::new();
    }
    let mut out = vec![0u8; T::SIZE * values.len()];
    for (value, chunk) in values.iter().zip(out.chunks_exact_mut(T::SIZE)) {
        value.write_be(chunk);
        T::reorder(chunk, order);
    }
    out
}

/// Decode `count` values from wire bytes laid out in `order`.
///
/// Fails with [`ModbusError::InvalidArgument`] when `bytes` is shorter than
/// `T::SIZE × count` or that product overflows. Extra trailing bytes are ignored.
pub fn from_bytes<T: RegisterValue>(
    bytes: &[u8],
    count: usize,
    order: ByteOrder,
) -> ModbusResult<Vec<T>> {
    let needed = T::SIZE.checked_mul(count).ok_or_else(|| {
        ModbusError::invalid_argument(format!(
            "{} values of {} bytes overflow the address space",
            count,
            T::SIZE
        ))
    })?;
    if bytes.len() < needed {
        return Err(ModbusError::invalid_argument(format!(
            "Need {} bytes for {} values of {} bytes, got {}",
            needed,
            count,
            T::SIZE,
            bytes.len()
        )));
    }
    if T::SIZE == 0 {
        return Ok((0..count).map(|_| T::read_be(&[])).collect());
    }

    let mut scratch = bytes[..needed].to_vec();
    Ok(scratch
        .chunks_exact_mut(T::SIZE)
        .map(|chunk| {
            T::reorder(chunk, order);
            T::read_be(chunk)
        })
        .collect())
}

// ============================================================================
// Register buffer API
// ============================================================================

/// Encode values into registers; an odd trailing byte is zero-padded.
pub fn to_registers<T: RegisterValue>(values: &[T], order: ByteOrder) -> Vec<u16> {
    let mut bytes = to_bytes(values, order);
    if bytes.len() % 2 != 0 {
        bytes.push(0);
    }
    bytes_to_registers(&bytes)
}

/// Decode `count` values from registers.
pub fn from_registers<T: RegisterValue>(
    registers: &[u16],
    count: usize,
    order: ByteOrder,
) -> ModbusResult<Vec<T>> {
    from_bytes(&registers_to_bytes(registers), count, order)
}

fn register_span<T: RegisterValue>(len: usize, address: usize) -> ModbusResult<std::ops::Range<usize>> {
    let end = address
        .checked_add(register_count_for::<T>())
        .filter(|&end| end <= len)
        .ok_or_else(|| {
            ModbusError::invalid_argument(format!(
                "{} registers at address {} exceed buffer of {}",
                register_count_for::<T>(),
                address,
                len
            ))
        })?;
    Ok(address..end)
}

/// Read one value starting at register `address`.
pub fn get_value<T: RegisterValue>(
    registers: &[u16],
    address: usize,
    order: ByteOrder,
) -> ModbusResult<T> {
    let span = register_span::<T>(registers.len(), address)?;
    let mut scratch = registers_to_bytes(&registers[span]);
    T::reorder(&mut scratch, order);
    Ok(T::read_be(&scratch))
}

/// Write one value starting at register `address`.
///
/// For odd-sized types the unused low byte of the last register is kept.
pub fn set_value<T: RegisterValue>(
    registers: &mut [u16],
    address: usize,
    value: &T,
    order: ByteOrder,
) -> ModbusResult<()> {
    let span = register_span::<T>(registers.len(), address)?;
    let mut scratch = registers_to_bytes(&registers[span.clone()]);
    value.write_be(&mut scratch);
    T::reorder(&mut scratch, order);
    registers[span].copy_from_slice(&bytes_to_registers(&scratch));
    Ok(())
}
