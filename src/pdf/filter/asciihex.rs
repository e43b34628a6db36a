//! ASCIIHexDecode filter

use crate::base::error::{Error, Result};

/// Decode ASCIIHex encoded data (ends at `>` or end of input)
pub fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for &byte in data {
        if byte == b'>' {
            break;
        }
        if byte.is_ascii_whitespace() {
            continue;
        }
        let nibble = match byte {
            b'0'..=b'9' => byte - b'0',
            b'A'..=b'F' => byte - b'A' + 10,
            b'a'..=b'f' => byte - b'a' + 10,
            other => {
                return Err(Error::format(format!(
                    "ASCIIHex: invalid byte 0x{:02X}",
                    other
                )));
            }
        };
        match pending.take() {
            None => pending = Some(nibble),
            Some(high) => out.push((high << 4) | nibble),
        }
    }

    // An odd final digit behaves as if followed by 0.
    if let Some(high) = pending {
        out.push(high << 4);
    }

    Ok(out)
}

/// Encode data with ASCIIHex, terminated by `>`
pub fn encode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = Vec::with_capacity(data.len() * 2 + 1);
    for &byte in data {
        out.push(DIGITS[(byte >> 4) as usize]);
        out.push(DIGITS[(byte & 0x0F) as usize]);
    }
    out.push(b'>');
    Ok(out)
}
