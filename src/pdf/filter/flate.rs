//! FlateDecode (zlib/deflate) filter

use super::DecodeParams;
use super::predictor::undo_predictor;
use crate::base::error::{Error, Result};
use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::io::Read;

/// Decode FlateDecode compressed data, applying any predictor
pub fn decode_flate(data: &[u8], params: Option<&DecodeParams>) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::format(format!("FlateDecode failed: {}", e)))?;

    match params {
        Some(p) if p.predictor > 1 => undo_predictor(&out, p),
        _ => Ok(out),
    }
}

/// Encode data with FlateDecode (no predictor)
pub fn encode_flate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let compression = match level {
        0 => Compression::none(),
        1..=3 => Compression::fast(),
        4..=6 => Compression::default(),
        _ => Compression::best(),
    };

    let mut encoder = ZlibEncoder::new(data, compression);
    let mut out = Vec::new();
    encoder
        .read_to_end(&mut out)
        .map_err(|e| Error::format(format!("FlateDecode encode failed: {}", e)))?;
    Ok(out)
}
