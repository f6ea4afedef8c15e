//! Frame logging helpers
//!
//! The library never installs a subscriber; it emits `tracing` events and
//! leaves collection to the application. Raw frames go out at `trace` level
//! so hex dumps cost nothing unless explicitly enabled.

use std::fmt;

use tracing::{enabled, trace, Level};

/// Direction of a frame relative to the master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    /// Master to unit
    Send,
    /// Unit to master
    Receive,
}

impl fmt::Display for FrameDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameDirection::Send => write!(f, "TX"),
            FrameDirection::Receive => write!(f, "RX"),
        }
    }
}

/// Format bytes as space-separated upper-case hex pairs.
///
/// ```rust
/// use modbus_master::logging::format_hex;
///
/// assert_eq!(format_hex(&[0x01, 0x03, 0xAB]), "01 03 AB");
/// ```
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Emit a hex dump of a wire frame at `trace` level.
pub fn log_frame(direction: FrameDirection, framing: &str, unit_id: u8, data: &[u8]) {
    if enabled!(Level::TRACE) {
        trace!(
            "[MODBUS-{}] {} unit:{} {}",
            framing,
            direction,
            unit_id,
            format_hex(data)
        );
    }
}
