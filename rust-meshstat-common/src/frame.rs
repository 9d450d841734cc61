//! Fixed-offset frame decoding and latency probe extraction.
//!
//! Frames arrive with the link layer already stripped down to a short header,
//! the ASN, both addresses and the residual payload. All offsets are fixed;
//! only the overall length is checked up front.

use bytes::Bytes;
use log::debug;
use std::ops::Range;

use crate::asn::{decode_header_asn, decode_probe_asn, Asn};
use crate::error::{Error, FieldRange};
use crate::settings::DecoderSettings;
use crate::types::{Address, ADDRESS_LENGTH, ASN_LENGTH, PROBE_TAIL_LENGTH};


/* ---------------------------------------------------------------- *
 * Probe layout, counted back from the end of the residual
 * ---------------------------------------------------------------- */

const PROBE_NODE_ID_LOW: usize = PROBE_TAIL_LENGTH;
const PROBE_NODE_ID_HIGH: usize = 16;
const PROBE_NUM_CELLS_USED: usize = 15;
const PROBE_ASN_START: usize = 14;
const PROBE_ASN_END: usize = 9;
const PROBE_COUNTER_LOW: usize = 9;
const PROBE_COUNTER_HIGH: usize = 8;

/// A frame split into its fixed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub header: Bytes,
    /// ASN in header layout.
    pub asn: Asn,
    /// The five ASN bytes as received.
    pub asn_bytes: [u8; ASN_LENGTH],
    /// Full link-layer destination.
    pub destination: Address,
    /// Previous mesh hop, not the original sender.
    pub source: Address,
    pub residual: Bytes,
}

/// Fields of a latency probe found at the end of a residual payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyProbe {
    pub node_id: String,
    pub num_cells_used: u8,
    /// ASN stamped by the sender, in probe layout.
    pub asn: Asn,
    pub asn_bytes: [u8; ASN_LENGTH],
    /// Sequence number assigned by the sender.
    pub counter: u16,
}

/// Check that the frame is at least as long as the header.
pub fn validate(frame: &[u8], header_length: usize) -> Result<(), Error> {
    if frame.len() < header_length {
        return Err(Error::TooShort {
            len: frame.len(),
            min: header_length,
        });
    }
    Ok(())
}

/// Split a frame into header, ASN, addresses and residual.
///
/// Slicing is zero-copy: every field of the result shares `frame`'s buffer.
pub fn decode_frame(frame: Bytes, settings: &DecoderSettings) -> Result<DecodedFrame, Error> {
    debug!("received data {:?}", frame.as_ref());

    validate(&frame, settings.header_length)?;

    let asn_start = settings.header_length;
    let dest_start = asn_start + ASN_LENGTH;
    let source_start = dest_start + ADDRESS_LENGTH;
    let residual_start = source_start + ADDRESS_LENGTH;

    let header = frame.slice(0..settings.header_length);

    let asn_bytes: [u8; ASN_LENGTH] = field(&frame, "asn", asn_start..dest_start)?
        .try_into()
        .map_err(|_| out_of_range(&frame, "asn", asn_start..dest_start))?;
    let asn = decode_header_asn(&asn_bytes);

    let destination = address(&frame, "destination", dest_start..source_start)?;
    debug!("destination address of the packet is {}", destination);

    let source = address(&frame, "source", source_start..residual_start)?;
    debug!("source address (just previous hop) of the packet is {}", source);

    let residual = frame.slice(residual_start..);
    debug!("packet without source, dest and asn {:?}", residual.as_ref());

    Ok(DecodedFrame {
        header,
        asn,
        asn_bytes,
        destination,
        source,
        residual,
    })
}

/// Whether `residual` ends with the probe marker and is long enough to hold a probe.
pub fn has_probe(residual: &[u8], settings: &DecoderSettings) -> bool {
    residual.len() > settings.probe_min_residual
        && residual.ends_with(settings.probe_marker.as_bytes())
}

/// Read the latency probe carried at the end of `residual`, if there is one.
pub fn extract_probe(residual: &[u8], settings: &DecoderSettings) -> Result<Option<LatencyProbe>, Error> {
    if !has_probe(residual, settings) {
        return Ok(None);
    }

    let num_cells_used = tail_byte(residual, "num_cells_used", PROBE_NUM_CELLS_USED)?;

    let asn_range = tail_range(residual, "probe_asn", PROBE_ASN_START, PROBE_ASN_END)?;
    let asn_bytes: [u8; ASN_LENGTH] = residual[asn_range]
        .try_into()
        .map_err(|_| tail_out_of_range(residual, "probe_asn", PROBE_ASN_START, PROBE_ASN_END))?;

    let counter = u16::from(tail_byte(residual, "counter", PROBE_COUNTER_LOW)?)
        + 256 * u16::from(tail_byte(residual, "counter", PROBE_COUNTER_HIGH)?);

    let node_id = node_id(
        tail_byte(residual, "node_id", PROBE_NODE_ID_HIGH)?,
        tail_byte(residual, "node_id", PROBE_NODE_ID_LOW)?,
    );

    Ok(Some(LatencyProbe {
        node_id,
        num_cells_used,
        asn: decode_probe_asn(&asn_bytes),
        asn_bytes,
        counter,
    }))
}

/// Node identifier: the high byte then the low byte, each as unpadded lowercase hex.
///
/// Not reversible: `(0x1, 0x23)` and `(0x12, 0x3)` both give `"123"`.
pub fn node_id(high: u8, low: u8) -> String {
    format!("{:x}{:x}", high, low)
}

/* ---------------------------------------------------------------- *
 * Helpers
 * ---------------------------------------------------------------- */

fn out_of_range(buf: &[u8], field: &'static str, range: Range<usize>) -> Error {
    Error::FieldOutOfRange {
        field,
        range: FieldRange::Head(range),
        len: buf.len(),
    }
}

fn field<'a>(buf: &'a [u8], name: &'static str, range: Range<usize>) -> Result<&'a [u8], Error> {
    buf.get(range.clone()).ok_or_else(|| out_of_range(buf, name, range))
}

fn address(buf: &[u8], name: &'static str, range: Range<usize>) -> Result<Address, Error> {
    let bytes = field(buf, name, range.clone())?;
    Address::from_slice(bytes).ok_or_else(|| out_of_range(buf, name, range))
}

/// Byte `back` positions from the end of `buf` (`back == 1` is the last byte).
fn tail_byte(buf: &[u8], name: &'static str, back: usize) -> Result<u8, Error> {
    let range = tail_range(buf, name, back, back - 1)?;
    Ok(buf[range.start])
}

/// The range `buf[len - from_back .. len - to_back]`.
fn tail_range(buf: &[u8], name: &'static str, from_back: usize, to_back: usize) -> Result<Range<usize>, Error> {
    match (buf.len().checked_sub(from_back), buf.len().checked_sub(to_back)) {
        (Some(start), Some(end)) => Ok(start..end),
        _ => Err(tail_out_of_range(buf, name, from_back, to_back)),
    }
}

fn tail_out_of_range(buf: &[u8], field: &'static str, from_back: usize, to_back: usize) -> Error {
    Error::FieldOutOfRange {
        field,
        range: FieldRange::Tail { from_back, to_back },
        len: buf.len(),
    }
}
