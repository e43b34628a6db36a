//! Predictor post-processing for Flate/LZW streams
//!
//! Xref streams in the wild almost always use PNG Up (predictor 12), so this
//! is load-bearing for document parsing, not an optional nicety.

use super::DecodeParams;
use crate::base::error::{Error, Result};

/// Undo the predictor declared in the decode parameters
pub fn undo_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => undo_tiff(data, params),
        10..=15 => undo_png(data, params),
        other => Err(Error::unsupported(format!("predictor {}", other))),
    }
}

/// Bytes per complete pixel, at least 1
fn bytes_per_pixel(params: &DecodeParams) -> usize {
    ((params.colors.max(1) * params.bits_per_component.max(1) + 7) / 8).max(1) as usize
}

/// Bytes per row of samples
fn bytes_per_row(params: &DecodeParams) -> usize {
    ((params.colors.max(1) * params.bits_per_component.max(1) * params.columns.max(1) + 7) / 8)
        as usize
}

fn undo_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::unsupported(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_len = bytes_per_row(params);
    let bpp = bytes_per_pixel(params);
    if row_len == 0 {
        return Ok(data.to_vec());
    }

    let mut out = data.to_vec();
    for row in out.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(out)
}

fn undo_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = bytes_per_row(params);
    let bpp = bytes_per_pixel(params);
    if row_len == 0 {
        return Ok(Vec::new());
    }

    // Each encoded row carries a leading filter-type byte.
    let stride = row_len + 1;
    let mut out = Vec::with_capacity(data.len() / stride * row_len);
    let mut prior = vec![0u8; row_len];

    for encoded in data.chunks(stride) {
        if encoded.len() < 2 {
            break;
        }
        let filter = encoded[0];
        let mut row = encoded[1..].to_vec();
        row.resize(row_len, 0);

        match filter {
            0 => {}
            1 => {
                for i in bpp..row_len {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            }
            2 => {
                for i in 0..row_len {
                    row[i] = row[i].wrapping_add(prior[i]);
                }
            }
            3 => {
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                    let up = prior[i] as u16;
                    row[i] = row[i].wrapping_add(((left + up) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] } else { 0 };
                    let up = prior[i];
                    let up_left = if i >= bpp { prior[i - bpp] } else { 0 };
                    row[i] = row[i].wrapping_add(paeth(left, up, up_left));
                }
            }
            other => {
                return Err(Error::format(format!(
                    "PNG predictor: unknown filter type {}",
                    other
                )));
            }
        }

        out.extend_from_slice(&row);
        prior = row;
    }

    Ok(out)
}

/// PNG Paeth predictor function
fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let p = left as i16 + up as i16 - up_left as i16;
    let pa = (p - left as i16).abs();
    let pb = (p - up as i16).abs();
    let pc = (p - up_left as i16).abs();
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        up_left
    }
}
