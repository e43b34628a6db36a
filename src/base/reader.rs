//! Binary reader over a byte slice
//!
//! Foundation for all binary table parsing: endian-aware fixed-width reads,
//! the TrueType fixed-point formats, variable byte-width fields (xref
//! streams) and bit-level reads for packed flag fields.
//!
//! Every read either consumes exactly its width or fails with `Error::Eof`
//! and consumes nothing.

use crate::base::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// A binary reader positioned in a byte slice.
///
/// Multi-byte integers default to big-endian (PDF and TrueType byte order);
/// little-endian variants carry an `_le` suffix.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    // Bit accumulator for read_bits; byte-level reads leave it untouched.
    bits: u32,
    avail: u8,
}

impl<'a> Reader<'a> {
    /// Create a reader at the start of the data
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bits: 0,
            avail: 0,
        }
    }

    /// Create a reader at a specific offset
    pub fn new_at(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            pos: offset,
            bits: 0,
            avail: 0,
        }
    }

    /// Current offset in bytes
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Number of bytes remaining
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check whether the reader is at the end of the data
    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Jump to an absolute offset; clears any pending bit-read state
    pub fn seek(&mut self, offset: usize) {
        self.pos = offset;
        self.align();
    }

    /// Discard any partially consumed bits
    pub fn align(&mut self) {
        self.bits = 0;
        self.avail = 0;
    }

    /// Consume exactly `n` bytes, or fail without consuming
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::Eof)?;
        let slice = self.data.get(self.pos..end).ok_or(Error::Eof)?;
        self.pos = end;
        Ok(slice)
    }

    /// Skip `n` bytes, failing if fewer remain
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// The remaining data from the current offset
    pub fn tail(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or(&[])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(self.take(8)?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    /// Read a 16.16 fixed-point number (TrueType `Fixed`)
    pub fn read_fixed(&mut self) -> Result<f32> {
        Ok(self.read_i32()? as f32 / 65536.0)
    }

    /// Read a 2.14 fixed-point number (TrueType `F2Dot14`)
    pub fn read_f2dot14(&mut self) -> Result<f32> {
        Ok(self.read_i16()? as f32 / 16384.0)
    }

    /// Read a 4-byte ASCII tag
    pub fn read_tag(&mut self) -> Result<[u8; 4]> {
        let bytes = self.take(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Read an unsigned big-endian integer of `n` bytes, 0..=8.
    ///
    /// A zero-width field reads as 0 without consuming (xref-stream W entries
    /// may have width zero).
    pub fn read_uint(&mut self, n: usize) -> Result<u64> {
        if n > 8 {
            return Err(Error::argument(format!("integer width {} out of range", n)));
        }
        let mut value = 0u64;
        for &byte in self.take(n)? {
            value = (value << 8) | byte as u64;
        }
        Ok(value)
    }

    /// Read `n` bits (1..=32) from the most-significant end of the stream.
    ///
    /// Whole bytes are pulled into an accumulator as needed; `align` or any
    /// `seek` discards a partially consumed byte.
    pub fn read_bits(&mut self, n: u8) -> Result<u32> {
        if n == 0 || n > 32 {
            return Err(Error::argument(format!("bit width {} out of range", n)));
        }
        // Check up front so a failed read consumes nothing.
        let needed = (n.saturating_sub(self.avail) as usize).div_ceil(8);
        if self.remaining() < needed {
            return Err(Error::Eof);
        }
        let mut value: u64 = self.bits as u64;
        let mut have = self.avail;
        while have < n {
            value = (value << 8) | self.take(1)?[0] as u64;
            have += 8;
        }
        let extra = have - n;
        let result = (value >> extra) as u32;
        self.avail = extra;
        self.bits = (value & ((1u64 << extra) - 1)) as u32;
        Ok(result)
    }
}
