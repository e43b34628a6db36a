//! LZWDecode filter

use super::DecodeParams;
use super::predictor::undo_predictor;
use crate::base::error::{Error, Result};

/// Decode LZW compressed data, applying any predictor
pub fn decode_lzw(data: &[u8], params: Option<&DecodeParams>) -> Result<Vec<u8>> {
    let early_change = params.map(|p| p.early_change != 0).unwrap_or(true);

    // PDF's LZW is the TIFF variant: MSB-first codes, EarlyChange selecting
    // when the code width bumps.
    let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(
        weezl::BitOrder::Msb,
        if early_change { 8 } else { 9 },
    );
    let out = decoder
        .decode(data)
        .map_err(|e| Error::format(format!("LZWDecode failed: {:?}", e)))?;

    match params {
        Some(p) if p.predictor > 1 => undo_predictor(&out, p),
        _ => Ok(out),
    }
}

/// Encode data with LZW compression
pub fn encode_lzw(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
    encoder
        .encode(data)
        .map_err(|e| Error::format(format!("LZWEncode failed: {:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lzw_round_trip() {
        let original = b"ABCABCABCABCABCABC";
        let compressed = encode_lzw(original).unwrap();
        assert_eq!(decode_lzw(&compressed, None).unwrap(), original);
    }

    #[test]
    fn test_lzw_empty() {
        let compressed = encode_lzw(&[]).unwrap();
        assert_eq!(decode_lzw(&compressed, None).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_lzw_binary_data() {
        let original: Vec<u8> = (0..=255).cycle().take(1000).collect();
        let compressed = encode_lzw(&original).unwrap();
        assert_eq!(decode_lzw(&compressed, None).unwrap(), original);
    }
}
