//! Bit, register and CRC helpers shared by the frame codecs and the client

use crate::constants::RTU_MIN_FRAME_LEN;

// ============================================================================
// CRC-16/Modbus
// ============================================================================

/// Bit-at-a-time CRC-16/MODBUS (reflected polynomial 0x8005, init 0xFFFF)
const MODBUS_CRC: crc::Crc<u16, crc::NoTable> =
    crc::Crc::<u16, crc::NoTable>::new(&crc::CRC_16_MODBUS);

/// Compute the CRC-16/Modbus of `data`.
///
/// The result goes on the wire low byte first.
///
/// ```rust
/// use modbus_master::utils::crc16;
///
/// let crc = crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]);
/// assert_eq!(crc.to_le_bytes(), [0xC5, 0xCD]);
/// ```
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    MODBUS_CRC.checksum(data)
}

/// Check the trailing little-endian CRC of an RTU frame.
///
/// Frames shorter than three bytes never validate.
#[must_use]
pub fn validate_crc16(frame: &[u8]) -> bool {
    if frame.len() < RTU_MIN_FRAME_LEN {
        return false;
    }
    let (content, trailer) = frame.split_at(frame.len() - 2);
    crc16(content) == u16::from_le_bytes([trailer[0], trailer[1]])
}

// ============================================================================
// Bit packing
// ============================================================================

/// Pack booleans into bytes, LSB first: bit `i` lands in bit `i % 8` of byte `i / 8`.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Unpack `count` booleans from LSB-first packed bytes.
///
/// Bits past the end of `bytes` read as `false`.
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| {
            bytes
                .get(i / 8)
                .is_some_and(|byte| byte & (1 << (i % 8)) != 0)
        })
        .collect()
}

// ============================================================================
// Register packing
// ============================================================================

/// Serialize registers high byte first.
pub fn registers_to_bytes(registers: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(registers.len() * 2);
    for &register in registers {
        bytes.extend_from_slice(&register.to_be_bytes());
    }
    bytes
}

/// Read big-endian registers; a trailing odd byte is ignored.
pub fn bytes_to_registers(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_crc16_known_frames() {
        assert_eq!(crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]), 0xCDC5);
        assert_eq!(crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0x0A84);
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn test_validate_crc16() {
        let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD];
        assert!(validate_crc16(&frame));

        let mut corrupted = frame;
        corrupted[3] ^= 0x01;
        assert!(!validate_crc16(&corrupted));

        assert!(!validate_crc16(&[0xFF, 0xFF]));
        assert!(!validate_crc16(&[]));
    }

    #[test]
    fn test_pack_bits() {
        let bits = [true, false, true, true, false, false, true, true, true, false];
        assert_eq!(pack_bits(&bits), vec![0xCD, 0x01]);
        assert!(pack_bits(&[]).is_empty());
    }

    #[test]
    fn test_unpack_bits_pads_with_false() {
        assert_eq!(unpack_bits(&[0x05], 4), vec![true, false, true, false]);
        assert_eq!(
            unpack_bits(&[0x01], 10),
            vec![true, false, false, false, false, false, false, false, false, false]
        );
        assert!(unpack_bits(&[0xFF], 0).is_empty());
    }

    #[test]
    fn test_register_packing() {
        assert_eq!(registers_to_bytes(&[0x1234, 0xABCD]), vec![0x12, 0x34, 0xAB, 0xCD]);
        assert_eq!(bytes_to_registers(&[0x12, 0x34, 0xAB, 0xCD]), vec![0x1234, 0xABCD]);
        assert_eq!(bytes_to_registers(&[0x12, 0x34, 0x56]), vec![0x1234]);
    }

    proptest! {
        #[test]
        fn prop_crc16_matches_bitwise_loop(data in proptest::collection::vec(any::<u8>(), 0..300)) {
            let expected = data.iter().fold(0xFFFF_u16, |mut crc, &byte| {
                crc ^= u16::from(byte);
                for _ in 0..8 {
                    crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
                }
                crc
            });
            prop_assert_eq!(crc16(&data), expected);
        }

        #[test]
        fn prop_appended_crc_validates(data in proptest::collection::vec(any::<u8>(), 1..256)) {
            let mut frame = data.clone();
            frame.extend_from_slice(&crc16(&data).to_le_bytes());
            prop_assert!(validate_crc16(&frame));
        }

        #[test]
        fn prop_bits_survive_packing(bits in proptest::collection::vec(any::<bool>(), 0..2000)) {
            let packed = pack_bits(&bits);
            prop_assert_eq!(packed.len(), bits.len().div_ceil(8));
            prop_assert_eq!(unpack_bits(&packed, bits.len()), bits);
        }
    }
}
