//! Common types shared between the decoder, the statistics and the transport.
//!
//! Frame layout (offsets from the start of a pre-link-stripped frame):
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0x00    2B    header
//! 0x02    5B    ASN (absolute slot number)
//! 0x07    8B    destination address
//! 0x0F    8B    source address (previous hop)
//! 0x17    ..    residual payload
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the link header preceding the ASN.
pub const HEADER_LENGTH: usize = 2;

/// Size of an absolute slot number on the wire.
pub const ASN_LENGTH: usize = 5;

/// Size of an extended (EUI-64) mesh address.
pub const ADDRESS_LENGTH: usize = 8;

/// Smallest frame from which header, ASN and both addresses can be read.
pub const MIN_FRAME_LENGTH: usize = HEADER_LENGTH + ASN_LENGTH + 2 * ADDRESS_LENGTH;

/// ASCII marker closing every latency probe payload.
pub const PROBE_MARKER: &str = "uinject";

/// A residual must be strictly longer than this to be checked for a probe.
pub const PROBE_MIN_RESIDUAL: usize = 37;

/// Bytes at the end of the residual that hold probe fields; the node id low byte is `[-17]`.
pub const PROBE_TAIL_LENGTH: usize = 17;

/// Radio slot duration in milliseconds.
pub const SLOT_DURATION_MS: f64 = 20.0;

/// Number of slots in one slotframe.
pub const SLOTS_PER_SLOTFRAME: u32 = 64;

/// Kind of event produced by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Application data received from the mesh.
    Data,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Data => write!(f, "data"),
        }
    }
}

/// An 8-byte mesh address as carried in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// Build an address from exactly eight bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; ADDRESS_LENGTH] = bytes.try_into().ok()?;
        Some(Self(octets))
    }

    /// The raw address bytes.
    pub fn octets(&self) -> [u8; ADDRESS_LENGTH] {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", unpadded_hex(&self.0))
    }
}

/// Render bytes as `0x..` fragments without zero padding, back to back.
///
/// This is the format collectors have always logged addresses in, e.g.
/// `[0x14, 0x05]` renders as `0x140x5`.
pub fn unpadded_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:#x}", b)).collect()
}
