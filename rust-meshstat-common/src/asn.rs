//! Absolute slot number (ASN) codec.
//!
//! An ASN is a 40-bit slot counter carried as five bytes: a one-byte rollover
//! epoch and two little-endian 16-bit words forming the low 32 bits. Two
//! layouts exist on the wire and they are not interchangeable:
//!
//! * header layout: `epoch, word_a, word_b`
//! * probe layout:  `word_a, word_b, epoch`

use serde::{Deserialize, Serialize};

use crate::types::ASN_LENGTH;

/// Returned by [`difference`] when the two timestamps lie in different epochs.
pub const ASN_ROLLOVER_SENTINEL: i64 = 0xFFFF_FFFF;

/// A decoded absolute slot number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Asn {
    /// Rollover epoch (bits 32..40).
    pub epoch: u8,
    /// Bits 0..16.
    pub word_a: u16,
    /// Bits 16..32.
    pub word_b: u16,
}

impl Asn {
    pub fn new(epoch: u8, word_a: u16, word_b: u16) -> Self {
        Self { epoch, word_a, word_b }
    }

    /// Full 40-bit slot count.
    pub fn slots(&self) -> u64 {
        (u64::from(self.epoch) << 32) | (u64::from(self.word_b) << 16) | u64::from(self.word_a)
    }
}

/// Decode the ASN carried right after the frame header (`epoch, word_a, word_b`).
pub fn decode_header_asn(bytes: &[u8; ASN_LENGTH]) -> Asn {
    Asn {
        epoch: bytes[0],
        word_a: u16::from_le_bytes([bytes[1], bytes[2]]),
        word_b: u16::from_le_bytes([bytes[3], bytes[4]]),
    }
}

/// Decode an ASN in probe layout (`word_a, word_b, epoch`).
pub fn decode_probe_asn(bytes: &[u8; ASN_LENGTH]) -> Asn {
    Asn {
        word_a: u16::from_le_bytes([bytes[0], bytes[1]]),
        word_b: u16::from_le_bytes([bytes[2], bytes[3]]),
        epoch: bytes[4],
    }
}

/// Signed slot distance from `earlier` to `later`.
///
/// Across an epoch boundary the distance cannot be computed from this encoding
/// and [`ASN_ROLLOVER_SENTINEL`] is returned instead. The result is negative
/// when `later` actually precedes `earlier`.
pub fn difference(earlier: Asn, later: Asn) -> i64 {
    if earlier.epoch != later.epoch {
        return ASN_ROLLOVER_SENTINEL;
    }
    0x10000 * (i64::from(later.word_b) - i64::from(earlier.word_b))
        + (i64::from(later.word_a) - i64::from(earlier.word_a))
}

/// Whether a value returned by [`difference`] signals an epoch rollover.
pub fn is_rollover(delta: i64) -> bool {
    delta == ASN_ROLLOVER_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_differ() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05];

        let header = decode_header_asn(&bytes);
        assert_eq!(header, Asn::new(0x01, 0x0302, 0x0504));

        let probe = decode_probe_asn(&bytes);
        assert_eq!(probe, Asn::new(0x05, 0x0201, 0x0403));
    }

    #[test]
    fn test_slots() {
        let asn = Asn::new(0x02, 0x0001, 0x0003);
        assert_eq!(asn.slots(), 0x02_0003_0001);
    }

    #[test]
    fn test_difference_same_epoch() {
        let earlier = Asn::new(0, 0xFFF0, 0x0001);
        let later = Asn::new(0, 0x0010, 0x0002);
        // carry from word_a into word_b
        assert_eq!(difference(earlier, later), 0x20);
        assert_eq!(difference(earlier, later), (later.slots() - earlier.slots()) as i64);
    }

    #[test]
    fn test_difference_is_antisymmetric() {
        let pairs = [
            (Asn::new(3, 100, 7), Asn::new(3, 5, 9)),
            (Asn::new(0, 0, 0), Asn::new(0, 0xFFFF, 0xFFFF)),
            (Asn::new(9, 42, 42), Asn::new(9, 42, 42)),
        ];
        for (a, b) in pairs {
            let forward = difference(a, b);
            assert_eq!(forward, 0x10000 * (i64::from(b.word_b) - i64::from(a.word_b)) + (i64::from(b.word_a) - i64::from(a.word_a)));
            assert_eq!(difference(b, a), -forward);
        }
    }

    #[test]
    fn test_difference_negative() {
        let earlier = Asn::new(1, 10, 0);
        let later = Asn::new(1, 4, 0);
        assert_eq!(difference(earlier, later), -6);
        assert!(!is_rollover(difference(earlier, later)));
    }

    #[test]
    fn test_difference_rollover_sentinel() {
        let earlier = Asn::new(0, 0, 0);
        for later in [Asn::new(1, 0, 0), Asn::new(0xFF, 0xFFFF, 0xFFFF), Asn::new(2, 17, 3)] {
            assert_eq!(difference(earlier, later), 0xFFFF_FFFF);
            assert_eq!(difference(later, earlier), ASN_ROLLOVER_SENTINEL);
            assert!(is_rollover(difference(earlier, later)));
        }
    }
}
