//! Error types for meshstat.

use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Position of a fixed-offset field within a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRange {
    /// Byte offsets from the start of the buffer.
    Head(Range<usize>),
    /// `buf[len - from_back .. len - to_back]`, counted back from the end.
    Tail { from_back: usize, to_back: usize },
}

impl fmt::Display for FieldRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRange::Head(range) => write!(f, "bytes {}..{}", range.start, range.end),
            FieldRange::Tail { from_back, to_back } => {
                write!(f, "bytes -{}..-{} from the end", from_back, to_back)
            }
        }
    }
}

/// All possible errors that can occur while decoding frames or publishing reports.
///
/// An ASN rollover between two compared timestamps is not represented here:
/// [`crate::asn::difference`] reports it with a sentinel value instead.
#[derive(Error, Debug)]
pub enum Error {
    /// The frame is shorter than the link header; nothing was decoded.
    #[error("frame too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    /// A fixed-offset field lies outside the bytes actually received.
    #[error("field `{field}` out of range: {range} of a {len}-byte buffer")]
    FieldOutOfRange {
        field: &'static str,
        range: FieldRange,
        len: usize,
    },

    /// The report could not be encoded for publication.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The telemetry sink refused the publication.
    #[error("sink error: {0}")]
    Sink(String),

    /// Invalid settings.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
