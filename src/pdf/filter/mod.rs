//! PDF stream filters
//!
//! Decode/encode of stream payloads through a chain of named filters.
//! The byte-oriented round-trip filters are implemented here; image codecs
//! (DCT, JPX, JBIG2, CCITT) belong to external collaborators and are
//! reported as unsupported rather than silently passed through.

pub mod ascii85;
pub mod asciihex;
pub mod chain;
pub mod flate;
pub mod lzw;
pub mod predictor;
pub mod runlength;

pub use ascii85::{decode_ascii85, encode_ascii85};
pub use asciihex::{decode_ascii_hex, encode_ascii_hex};
pub use chain::{FilterChain, decode_stream_payload};
pub use flate::{decode_flate, encode_flate};
pub use lzw::{decode_lzw, encode_lzw};
pub use runlength::{decode_run_length, encode_run_length};

use crate::pdf::object::Dict;

/// The filters this crate can decode itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// FlateDecode - zlib/deflate compression (most common)
    Flate,
    /// LZWDecode - Lempel-Ziv-Welch compression
    Lzw,
    /// ASCII85Decode - base-85 encoding
    Ascii85,
    /// ASCIIHexDecode - hexadecimal encoding
    AsciiHex,
    /// RunLengthDecode - run-length encoding
    RunLength,
}

impl FilterKind {
    /// Parse a filter name (full or abbreviated form)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FlateDecode" | "Fl" => Some(FilterKind::Flate),
            "LZWDecode" | "LZW" => Some(FilterKind::Lzw),
            "ASCII85Decode" | "A85" => Some(FilterKind::Ascii85),
            "ASCIIHexDecode" | "AHx" => Some(FilterKind::AsciiHex),
            "RunLengthDecode" | "RL" => Some(FilterKind::RunLength),
            _ => None,
        }
    }

    /// The canonical PDF name for this filter
    pub fn to_name(self) -> &'static str {
        match self {
            FilterKind::Flate => "FlateDecode",
            FilterKind::Lzw => "LZWDecode",
            FilterKind::Ascii85 => "ASCII85Decode",
            FilterKind::AsciiHex => "ASCIIHexDecode",
            FilterKind::RunLength => "RunLengthDecode",
        }
    }
}

/// Capability query: can this crate decode the named filter itself?
pub fn is_supported(name: &str) -> bool {
    FilterKind::from_name(name).is_some()
}

/// Per-filter decode parameters (`/DecodeParms`).
///
/// Missing entries mean "use the filter defaults", never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeParams {
    pub predictor: i64,
    pub colors: i64,
    pub bits_per_component: i64,
    pub columns: i64,
    pub early_change: i64,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: 1,
        }
    }
}

impl DecodeParams {
    /// Read parameters from a `/DecodeParms` dictionary
    pub fn from_dict(dict: &Dict) -> Self {
        let defaults = Self::default();
        Self {
            predictor: dict.get_int("Predictor").unwrap_or(defaults.predictor),
            colors: dict.get_int("Colors").unwrap_or(defaults.colors),
            bits_per_component: dict
                .get_int("BitsPerComponent")
                .unwrap_or(defaults.bits_per_component),
            columns: dict.get_int("Columns").unwrap_or(defaults.columns),
            early_change: dict.get_int("EarlyChange").unwrap_or(defaults.early_change),
        }
    }
}
