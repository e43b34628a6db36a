//! ASCII85Decode filter

use crate::base::error::{Error, Result};

/// Decode ASCII85 encoded data (ends at `~>` or end of input)
pub fn decode_ascii85(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group: u32 = 0;
    let mut count = 0usize;

    for &byte in data {
        match byte {
            b if b.is_ascii_whitespace() => continue,
            b'~' => break,
            b'z' => {
                if count != 0 {
                    return Err(Error::format("ASCII85: 'z' inside a group"));
                }
                out.extend_from_slice(&[0, 0, 0, 0]);
            }
            b'!'..=b'u' => {
                group = group
                    .checked_mul(85)
                    .and_then(|g| g.checked_add((byte - b'!') as u32))
                    .ok_or_else(|| Error::format("ASCII85: group overflow"))?;
                count += 1;
                if count == 5 {
                    out.extend_from_slice(&group.to_be_bytes());
                    group = 0;
                    count = 0;
                }
            }
            other => {
                return Err(Error::format(format!(
                    "ASCII85: invalid byte 0x{:02X}",
                    other
                )));
            }
        }
    }

    // A trailing partial group of n chars yields n-1 bytes, padded with 'u'.
    if count == 1 {
        return Err(Error::format("ASCII85: single trailing character"));
    }
    if count > 0 {
        for _ in count..5 {
            group = group.saturating_mul(85).saturating_add(84);
        }
        let bytes = group.to_be_bytes();
        out.extend_from_slice(&bytes[..count - 1]);
    }

    Ok(out)
}

/// Encode data with ASCII85, terminated by `~>`
pub fn encode_ascii85(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 5 / 4 + 2);

    for chunk in data.chunks(4) {
        let mut group: u32 = 0;
        for (i, &byte) in chunk.iter().enumerate() {
            group |= (byte as u32) << (24 - i * 8);
        }

        if group == 0 && chunk.len() == 4 {
            out.push(b'z');
            continue;
        }

        let mut digits = [0u8; 5];
        let mut rest = group;
        for slot in digits.iter_mut().rev() {
            *slot = (rest % 85) as u8 + b'!';
            rest /= 85;
        }

        let keep = if chunk.len() == 4 { 5 } else { chunk.len() + 1 };
        out.extend_from_slice(&digits[..keep]);
    }

    out.extend_from_slice(b"~>");
    Ok(out)
}
