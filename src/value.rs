//! # Dynamic Register Values
//!
//! When the data type of a register block is only known at runtime (device
//! profiles, point tables) the generic codec cannot be called with a static
//! type. [`DataType`] names the type, and [`ModbusValue`] carries the decoded
//! result. Both go through the same [`codec`](crate::codec) engine as the
//! typed API, so the two always agree on layout.

use std::fmt;

use crate::bytes::ByteOrder;
use crate::codec::{get_value, register_count_for, to_registers};
use crate::error::{ModbusError, ModbusResult};

/// Register data type, parsed from the spellings found in point tables.
///
/// | Type | Registers | Aliases |
/// |------|-----------|---------|
/// | U16 | 1 | uint16, u16, word |
/// | I16 | 1 | int16, i16, short |
/// | U32 | 2 | uint32, u32, dword |
/// | I32 | 2 | int32, i32, long |
/// | F32 | 2 | float32, f32, float, real |
/// | U64 | 4 | uint64, u64, qword |
/// | I64 | 4 | int64, i64, longlong |
/// | F64 | 4 | float64, f64, double, lreal |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    U16,
    I16,
    U32,
    I32,
    F32,
    U64,
    I64,
    F64,
}

impl DataType {
    /// Parse a type name, case-insensitive
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uint16" | "u16" | "word" => Some(Self::U16),
            "int16" | "i16" | "short" => Some(Self::I16),
            "uint32" | "u32" | "dword" => Some(Self::U32),
            "int32" | "i32" | "long" => Some(Self::I32),
            "float32" | "f32" | "float" | "real" => Some(Self::F32),
            "uint64" | "u64" | "qword" => Some(Self::U64),
            "int64" | "i64" | "longlong" => Some(Self::I64),
            "float64" | "f64" | "double" | "lreal" => Some(Self::F64),
            _ => None,
        }
    }

    /// Registers occupied by one value
    pub fn register_count(self) -> usize {
        match self {
            Self::U16 => register_count_for::<u16>(),
            Self::I16 => register_count_for::<i16>(),
            Self::U32 => register_count_for::<u32>(),
            Self::I32 => register_count_for::<i32>(),
            Self::F32 => register_count_for::<f32>(),
            Self::U64 => register_count_for::<u64>(),
            Self::I64 => register_count_for::<i64>(),
            Self::F64 => register_count_for::<f64>(),
        }
    }

    /// Canonical short name
    pub fn name(self) -> &'static str {
        match self {
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::F32 => "f32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded register or coil value.
///
/// # Example
///
/// ```rust
/// use modbus_master::{ByteOrder, DataType, ModbusValue};
///
/// let value = ModbusValue::decode(&[0x41C8, 0x0000], DataType::F32, ByteOrder::BigEndian).unwrap();
/// assert_eq!(value, ModbusValue::F32(25.0));
/// assert_eq!(value.register_count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ModbusValue {
    /// Coil, discrete input or register bit
    Bool(bool),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    U64(u64),
    I64(i64),
    F64(f64),
}

impl ModbusValue {
    /// Decode the value at the start of `registers`.
    pub fn decode(registers: &[u16], data_type: DataType, order: ByteOrder) -> ModbusResult<Self> {
        Ok(match data_type {
            DataType::U16 => Self::U16(get_value(registers, 0, order)?),
            DataType::I16 => Self::I16(get_value(registers, 0, order)?),
            DataType::U32 => Self::U32(get_value(registers, 0, order)?),
            DataType::I32 => Self::I32(get_value(registers, 0, order)?),
            DataType::F32 => Self::F32(get_value(registers, 0, order)?),
            DataType::U64 => Self::U64(get_value(registers, 0, order)?),
            DataType::I64 => Self::I64(get_value(registers, 0, order)?),
            DataType::F64 => Self::F64(get_value(registers, 0, order)?),
        })
    }

    /// Extract bit `bit` (0 = LSB) of a register as a boolean.
    pub fn decode_bit(register: u16, bit: u8) -> ModbusResult<Self> {
        if bit > 15 {
            return Err(ModbusError::invalid_argument(format!(
                "Invalid bit position: {} (must be 0-15)",
                bit
            )));
        }
        Ok(Self::Bool((register >> bit) & 0x01 != 0))
    }

    /// Encode into registers. Booleans live in coils and cannot be encoded.
    pub fn encode(&self, order: ByteOrder) -> ModbusResult<Vec<u16>> {
        Ok(match self {
            Self::Bool(_) => {
                return Err(ModbusError::invalid_argument(
                    "Boolean values are written as coils, not registers",
                ))
            }
            Self::U16(v) => to_registers(&[*v], order),
            Self::I16(v) => to_registers(&[*v], order),
            Self::U32(v) => to_registers(&[*v], order),
            Self::I32(v) => to_registers(&[*v], order),
            Self::F32(v) => to_registers(&[*v], order),
            Self::U64(v) => to_registers(&[*v], order),
            Self::I64(v) => to_registers(&[*v], order),
            Self::F64(v) => to_registers(&[*v], order),
        })
    }

    /// Data type of a register value; `None` for booleans
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Bool(_) => None,
            Self::U16(_) => Some(DataType::U16),
            Self::I16(_) => Some(DataType::I16),
            Self::U32(_) => Some(DataType::U32),
            Self::I32(_) => Some(DataType::I32),
            Self::F32(_) => Some(DataType::F32),
            Self::U64(_) => Some(DataType::U64),
            Self::I64(_) => Some(DataType::I64),
            Self::F64(_) => Some(DataType::F64),
        }
    }

    /// Registers occupied; 0 for booleans (coils use separate addressing)
    #[inline]
    pub fn register_count(&self) -> usize {
        self.data_type().map_or(0, DataType::register_count)
    }

    /// Convert to f64 for uniform numeric handling
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::U16(v) => f64::from(*v),
            Self::I16(v) => f64::from(*v),
            Self::U32(v) => f64::from(*v),
            Self::I32(v) => f64::from(*v),
            Self::F32(v) => f64::from(*v),
            Self::U64(v) => *v as f64,
            Self::I64(v) => *v as f64,
            Self::F64(v) => *v,
        }
    }
}

impl fmt::Display for ModbusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::U16(v) => write!(f, "{}", v),
            Self::I16(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::I32(v) => write!(f, "{}", v),
            Self::F32(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ModbusValue {
                fn from(v: $ty) -> Self {
                    ModbusValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive!(
    bool => Bool,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    f32 => F32,
    u64 => U64,
    i64 => I64,
    f64 => F64,
);
