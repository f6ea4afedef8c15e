//! # Byte Order Handling for Modbus
//!
//! Unified byte/word order representation for multi-register values.
//! Supports the ABCD, DCBA, CDAB and BADC layouts found in PLCs and meters.
//!
//! ## Naming Convention
//!
//! Uses ABCD notation where A is the most significant byte. For the 32-bit
//! value `0x12345678` the bytes on the wire are:
//! - `BigEndian (ABCD)`: \[0x12, 0x34, 0x56, 0x78\]
//! - `LittleEndian (DCBA)`: \[0x78, 0x56, 0x34, 0x12\]
//! - `BigEndianSwap (CDAB)`: \[0x56, 0x78, 0x12, 0x34\]
//! - `LittleEndianSwap (BADC)`: \[0x34, 0x12, 0x78, 0x56\]
//!
//! ## Legacy axes
//!
//! Device profiles describe the same four layouts in two other ways, both
//! of which convert into [`ByteOrder`]:
//! - a byte order inside each register ([`RegisterByteOrder`]) combined with
//!   a word order across registers ([`WordOrder`]);
//! - a single [`ModbusEndianness`] setting.

use std::fmt;

/// Wire layout of a multi-byte value.
///
/// # Example
///
/// ```rust
/// use modbus_master::ByteOrder;
///
/// let order = ByteOrder::from_str("CDAB").unwrap();
/// assert_eq!(order, ByteOrder::BigEndianSwap);
/// assert!(order.has_word_swap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// ABCD: most significant byte first
    #[default]
    BigEndian,

    /// DCBA: the whole value reversed
    LittleEndian,

    /// CDAB: big-endian words, least significant word first
    BigEndianSwap,

    /// BADC: words in order, bytes swapped inside each word
    LittleEndianSwap,
}

impl ByteOrder {
    /// All layouts, for exhaustive iteration
    pub const ALL: [ByteOrder; 4] = [
        ByteOrder::BigEndian,
        ByteOrder::LittleEndian,
        ByteOrder::BigEndianSwap,
        ByteOrder::LittleEndianSwap,
    ];

    /// Parse the common string spellings.
    ///
    /// - "ABCD", "AB-CD", "BE", "BIG_ENDIAN" → BigEndian
    /// - "DCBA", "DC-BA", "LE", "LITTLE_ENDIAN" → LittleEndian
    /// - "CDAB", "CD-AB", "BIG_ENDIAN_SWAP" → BigEndianSwap
    /// - "BADC", "BA-DC", "LITTLE_ENDIAN_SWAP", "MID_LITTLE_ENDIAN" → LittleEndianSwap
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "ABCD" | "BE" | "BIGENDIAN" | "ABCDEFGH" => Some(Self::BigEndian),
            "DCBA" | "LE" | "LITTLEENDIAN" | "HGFEDCBA" => Some(Self::LittleEndian),
            "CDAB" | "BIGENDIANSWAP" | "GHEFCDAB" => Some(Self::BigEndianSwap),
            "BADC" | "LITTLEENDIANSWAP" | "MIDLITTLEENDIAN" | "BADCFEHG" => {
                Some(Self::LittleEndianSwap)
            }
            _ => None,
        }
    }

    /// Get descriptive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD (Big-Endian)",
            Self::LittleEndian => "DCBA (Little-Endian)",
            Self::BigEndianSwap => "CDAB (Big-Endian Swap)",
            Self::LittleEndianSwap => "BADC (Little-Endian Swap)",
        }
    }

    /// Check if bytes inside each register are most significant first.
    #[inline]
    pub fn is_big_endian(&self) -> bool {
        matches!(self, Self::BigEndian | Self::BigEndianSwap)
    }

    /// Check if bytes inside each register are least significant first.
    #[inline]
    pub fn is_little_endian(&self) -> bool {
        !self.is_big_endian()
    }

    /// Check if words deviate from their byte order's natural sequence.
    #[inline]
    pub fn has_word_swap(&self) -> bool {
        matches!(self, Self::BigEndianSwap | Self::LittleEndianSwap)
    }

    /// Combine a per-register byte order with a cross-register word order.
    pub fn from_parts(bytes: RegisterByteOrder, words: WordOrder) -> Self {
        match (bytes, words) {
            (RegisterByteOrder::BigEndian, WordOrder::HighFirst) => Self::BigEndian,
            (RegisterByteOrder::BigEndian, WordOrder::LowFirst) => Self::BigEndianSwap,
            (RegisterByteOrder::LittleEndian, WordOrder::HighFirst) => Self::LittleEndianSwap,
            (RegisterByteOrder::LittleEndian, WordOrder::LowFirst) => Self::LittleEndian,
        }
    }

    /// Split into per-register byte order and word order.
    pub fn parts(&self) -> (RegisterByteOrder, WordOrder) {
        match self {
            Self::BigEndian => (RegisterByteOrder::BigEndian, WordOrder::HighFirst),
            Self::BigEndianSwap => (RegisterByteOrder::BigEndian, WordOrder::LowFirst),
            Self::LittleEndianSwap => (RegisterByteOrder::LittleEndian, WordOrder::HighFirst),
            Self::LittleEndian => (RegisterByteOrder::LittleEndian, WordOrder::LowFirst),
        }
    }

    /// Convert big-endian value bytes to this layout, in place.
    ///
    /// Every layout is its own inverse, so the same call converts wire bytes
    /// back to big-endian. Word operations cover the even-length prefix; a
    /// trailing odd byte stays where it is.
    pub fn apply(&self, bytes: &mut [u8]) {
        let even = bytes.len() & !1;
        match self {
            Self::BigEndian => {}
            Self::LittleEndian => bytes.reverse(),
            Self::BigEndianSwap => {
                let words = even / 2;
                for i in 0..words / 2 {
                    let j = words - 1 - i;
                    bytes.swap(2 * i, 2 * j);
                    bytes.swap(2 * i + 1, 2 * j + 1);
                }
            }
            Self::LittleEndianSwap => {
                for word in bytes[..even].chunks_exact_mut(2) {
                    word.swap(0, 1);
                }
            }
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Legacy configuration axes
// ============================================================================

/// Byte order inside a single 16-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RegisterByteOrder {
    /// High byte first (the Modbus standard)
    #[default]
    BigEndian,
    /// Low byte first
    LittleEndian,
}

/// Order of 16-bit words in a multi-register value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WordOrder {
    /// Most significant word at the lowest address
    #[default]
    HighFirst,
    /// Least significant word at the lowest address
    LowFirst,
}

/// Single-setting endianness found in older device profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModbusEndianness {
    /// ABCD
    #[default]
    BigEndian,
    /// DCBA
    LittleEndian,
    /// BADC: bytes swapped inside each word, word order kept
    MidLittleEndian,
}

impl From<ModbusEndianness> for ByteOrder {
    fn from(endianness: ModbusEndianness) -> Self {
        match endianness {
            ModbusEndianness::BigEndian => ByteOrder::BigEndian,
            ModbusEndianness::LittleEndian => ByteOrder::LittleEndian,
            ModbusEndianness::MidLittleEndian => ByteOrder::LittleEndianSwap,
        }
    }
}

impl From<(RegisterByteOrder, WordOrder)> for ByteOrder {
    fn from((bytes, words): (RegisterByteOrder, WordOrder)) -> Self {
        ByteOrder::from_parts(bytes, words)
    }
}

// ============================================================================
// Tests
// ============================================================================
