//! RunLengthDecode filter

use crate::base::error::{Error, Result};

/// End-of-data marker byte
const EOD: u8 = 128;

/// Decode RunLength encoded data
pub fn decode_run_length(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let tag = data[pos];
        pos += 1;

        if tag == EOD {
            break;
        }
        if tag < EOD {
            // Literal run of tag + 1 bytes
            let count = tag as usize + 1;
            let chunk = data
                .get(pos..pos + count)
                .ok_or_else(|| Error::format("RunLengthDecode: truncated literal run"))?;
            out.extend_from_slice(chunk);
            pos += count;
        } else {
            // One byte repeated 257 - tag times
            let count = 257 - tag as usize;
            let byte = *data
                .get(pos)
                .ok_or_else(|| Error::format("RunLengthDecode: truncated repeat run"))?;
            pos += 1;
            out.resize(out.len() + count, byte);
        }
    }

    Ok(out)
}

/// Encode data with RunLength
pub fn encode_run_length(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        // Measure the run of identical bytes at pos (capped at 128).
        let byte = data[pos];
        let mut run = 1;
        while run < 128 && pos + run < data.len() && data[pos + run] == byte {
            run += 1;
        }

        if run >= 2 {
            out.push((257 - run) as u8);
            out.push(byte);
            pos += run;
            continue;
        }

        // Collect literals until a run of 3+ starts or the cap is hit.
        let start = pos;
        pos += 1;
        while pos < data.len() && pos - start < 128 {
            if pos + 2 < data.len() && data[pos] == data[pos + 1] && data[pos] == data[pos + 2] {
                break;
            }
            pos += 1;
        }
        out.push((pos - start - 1) as u8);
        out.extend_from_slice(&data[start..pos]);
    }

    out.push(EOD);
    Ok(out)
}
