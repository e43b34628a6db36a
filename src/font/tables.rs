//! Scalar font tables: head, maxp, hhea, hmtx, loca, name
//!
//! Each parser takes the raw table bytes and produces a plain struct. The
//! face owns the lazy-parse-and-cache discipline; parsers here just read.

use crate::base::error::{Error, Result};
use crate::base::reader::Reader;
use tracing::warn;

/// Font header table
#[derive(Debug, Clone)]
pub struct Head {
    pub units_per_em: u16,
    /// 0 = short (u16 halved) loca offsets, 1 = long (u32)
    pub index_to_loc_format: i16,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

const HEAD_MAGIC: u32 = 0x5F0F3CF5;

impl Head {
    pub fn parse(data: &[u8]) -> Result<Head> {
        let mut r = Reader::new(data);
        r.skip(4)?; // version
        r.skip(4)?; // fontRevision
        r.skip(4)?; // checksumAdjustment
        let magic = r.read_u32()?;
        if magic != HEAD_MAGIC {
            // Some subsetters zero this; the rest of the table still reads.
            warn!(magic, "head table magic mismatch");
        }
        r.skip(2)?; // flags
        let units_per_em = r.read_u16()?;
        r.skip(16)?; // created + modified
        let x_min = r.read_i16()?;
        let y_min = r.read_i16()?;
        let x_max = r.read_i16()?;
        let y_max = r.read_i16()?;
        r.skip(2)?; // macStyle
        r.skip(2)?; // lowestRecPPEM
        r.skip(2)?; // fontDirectionHint
        let index_to_loc_format = r.read_i16()?;

        if units_per_em == 0 {
            return Err(Error::font("head: unitsPerEm is zero"));
        }
        Ok(Head {
            units_per_em,
            index_to_loc_format,
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }
}

/// Maximum profile table (only the glyph count matters here)
#[derive(Debug, Clone, Copy)]
pub struct Maxp {
    pub num_glyphs: u16,
}

impl Maxp {
    pub fn parse(data: &[u8]) -> Result<Maxp> {
        let mut r = Reader::new(data);
        r.skip(4)?; // version (0.5 for CFF, 1.0 for glyf)
        let num_glyphs = r.read_u16()?;
        Ok(Maxp { num_glyphs })
    }
}

/// Horizontal header table
#[derive(Debug, Clone, Copy)]
pub struct Hhea {
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub number_of_h_metrics: u16,
}

impl Hhea {
    pub fn parse(data: &[u8]) -> Result<Hhea> {
        let mut r = Reader::new(data);
        r.skip(4)?; // version
        let ascender = r.read_i16()?;
        let descender = r.read_i16()?;
        let line_gap = r.read_i16()?;
        r.skip(2)?; // advanceWidthMax
        r.skip(2)?; // minLeftSideBearing
        r.skip(2)?; // minRightSideBearing
        r.skip(2)?; // xMaxExtent
        r.skip(6)?; // caretSlopeRise/Run, caretOffset
        r.skip(8)?; // reserved
        r.skip(2)?; // metricDataFormat
        let number_of_h_metrics = r.read_u16()?;
        Ok(Hhea {
            ascender,
            descender,
            line_gap,
            number_of_h_metrics,
        })
    }
}

/// Horizontal metrics table
#[derive(Debug, Clone, Default)]
pub struct Hmtx {
    advances: Vec<u16>,
    bearings: Vec<i16>,
}

impl Hmtx {
    /// Parse with counts from hhea and maxp. Glyphs past
    /// `number_of_h_metrics` repeat the last advance width.
    pub fn parse(data: &[u8], number_of_h_metrics: u16, num_glyphs: u16) -> Result<Hmtx> {
        let metrics = number_of_h_metrics.min(num_glyphs) as usize;
        let mut r = Reader::new(data);
        let mut advances = Vec::with_capacity(metrics);
        let mut bearings = Vec::with_capacity(num_glyphs as usize);

        for _ in 0..metrics {
            advances.push(r.read_u16()?);
            bearings.push(r.read_i16()?);
        }
        for _ in metrics..num_glyphs as usize {
            match r.read_i16() {
                Ok(lsb) => bearings.push(lsb),
                // Trailing bearings are optional in damaged fonts.
                Err(_) => break,
            }
        }

        Ok(Hmtx { advances, bearings })
    }

    /// Advance width in font units
    pub fn advance(&self, glyph: u16) -> u16 {
        self.advances
            .get(glyph as usize)
            .or_else(|| self.advances.last())
            .copied()
            .unwrap_or(0)
    }

    /// Left side bearing in font units
    pub fn side_bearing(&self, glyph: u16) -> i16 {
        self.bearings.get(glyph as usize).copied().unwrap_or(0)
    }
}

/// Glyph location table: byte ranges into glyf
#[derive(Debug, Clone, Default)]
pub struct Loca {
    offsets: Vec<u32>,
}

impl Loca {
    pub fn parse(data: &[u8], long_format: bool, num_glyphs: u16) -> Result<Loca> {
        let count = num_glyphs as usize + 1;
        let mut r = Reader::new(data);
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            let offset = if long_format {
                r.read_u32()?
            } else {
                // Short offsets store half the byte offset.
                r.read_u16()? as u32 * 2
            };
            offsets.push(offset);
        }
        Ok(Loca { offsets })
    }

    /// Byte range of a glyph in the glyf table.
    ///
    /// An empty range is a valid glyph with no outline. A backwards range is
    /// corrupt and reads as empty.
    pub fn range(&self, glyph: u16) -> Option<(usize, usize)> {
        let start = *self.offsets.get(glyph as usize)? as usize;
        let end = *self.offsets.get(glyph as usize + 1)? as usize;
        if end < start {
            warn!(glyph, start, end, "loca range is backwards");
            return Some((start, start));
        }
        Some((start, end))
    }

    pub fn glyph_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}

/// Extract the PostScript name (name ID 6) from the name table.
///
/// Windows Unicode entries are UTF-16BE; Macintosh entries are treated as
/// Latin-1, which covers every PostScript name in practice (they are
/// restricted to printable ASCII anyway).
pub fn postscript_name(data: &[u8]) -> Option<String> {
    let mut r = Reader::new(data);
    r.skip(2).ok()?; // format
    let count = r.read_u16().ok()?;
    let string_offset = r.read_u16().ok()? as usize;

    let mut fallback: Option<(usize, usize)> = None;
    for _ in 0..count {
        let platform = r.read_u16().ok()?;
        let encoding = r.read_u16().ok()?;
        r.skip(2).ok()?; // language
        let name_id = r.read_u16().ok()?;
        let length = r.read_u16().ok()? as usize;
        let offset = r.read_u16().ok()? as usize;
        if name_id != 6 {
            continue;
        }
        let span = (string_offset + offset, length);
        if platform == 3 && (encoding == 1 || encoding == 10) {
            let bytes = data.get(span.0..span.0 + span.1)?;
            return Some(decode_utf16_be(bytes));
        }
        fallback.get_or_insert(span);
    }

    let (start, len) = fallback?;
    let bytes = data.get(start..start + len)?;
    Some(bytes.iter().map(|&b| b as char).collect())
}

fn decode_utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_head_parse() {
        let head = Head::parse(&head_bytes(2048, true)).unwrap();
        assert_eq!(head.units_per_em, 2048);
        assert_eq!(head.index_to_loc_format, 1);
        assert_eq!(head.x_min, -100);
        assert_eq!(head.y_max, 800);
    }

    #[test]
    fn test_head_zero_upem_rejected() {
        assert!(Head::parse(&head_bytes(0, false)).is_err());
    }

    #[test]
    fn test_head_truncated() {
        let bytes = head_bytes(1000, false);
        assert!(Head::parse(&bytes[..20]).is_err());
    }

    #[test]
    fn test_maxp_parse() {
        let maxp = Maxp::parse(&maxp_bytes(1234)).unwrap();
        assert_eq!(maxp.num_glyphs, 1234);
    }

    #[test]
    fn test_hhea_parse() {
        let hhea = Hhea::parse(&hhea_bytes(3)).unwrap();
        assert_eq!(hhea.ascender, 750);
        assert_eq!(hhea.descender, -250);
        assert_eq!(hhea.number_of_h_metrics, 3);
    }

    #[test]
    fn test_hmtx_parse_and_repeat() {
        // Two full metrics, then bearings only for glyphs 2 and 3.
        let mut data = Vec::new();
        for (adv, lsb) in [(500u16, 10i16), (600, 20)] {
            data.extend_from_slice(&adv.to_be_bytes());
            data.extend_from_slice(&lsb.to_be_bytes());
        }
        data.extend_from_slice(&30i16.to_be_bytes());
        data.extend_from_slice(&40i16.to_be_bytes());

        let hmtx = Hmtx::parse(&data, 2, 4).unwrap();
        assert_eq!(hmtx.advance(0), 500);
        assert_eq!(hmtx.advance(1), 600);
        // Monospace tail repeats the last advance.
        assert_eq!(hmtx.advance(2), 600);
        assert_eq!(hmtx.advance(3), 600);
        assert_eq!(hmtx.side_bearing(0), 10);
        assert_eq!(hmtx.side_bearing(3), 40);
        assert_eq!(hmtx.side_bearing(99), 0);
    }

    #[test]
    fn test_loca_short_format() {
        // Short offsets are halved: stored [0, 10, 10, 30].
        let mut data = Vec::new();
        for v in [0u16, 10, 10, 30] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let loca = Loca::parse(&data, false, 3).unwrap();
        assert_eq!(loca.glyph_count(), 3);
        assert_eq!(loca.range(0), Some((0, 20)));
        // Equal offsets: a valid empty glyph.
        assert_eq!(loca.range(1), Some((20, 20)));
        assert_eq!(loca.range(2), Some((20, 60)));
        assert_eq!(loca.range(3), None);
    }

    #[test]
    fn test_loca_long_format_backwards_range() {
        let mut data = Vec::new();
        for v in [100u32, 40] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let loca = Loca::parse(&data, true, 1).unwrap();
        // Corrupt backwards range degrades to empty, not an error.
        assert_eq!(loca.range(0), Some((100, 100)));
    }

    #[test]
    fn test_postscript_name_windows_utf16() {
        // name table: one record, (3,1), nameID 6, "AbcFont".
        let text: Vec<u8> = "AbcFont".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_be_bytes()); // format
        data.extend_from_slice(&1u16.to_be_bytes()); // count
        data.extend_from_slice(&18u16.to_be_bytes()); // stringOffset
        for v in [3u16, 1, 0x409, 6, text.len() as u16, 0] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(&text);

        assert_eq!(postscript_name(&data).as_deref(), Some("AbcFont"));
    }

    #[test]
    fn test_postscript_name_mac_fallback() {
        let text = b"MacName";
        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&18u16.to_be_bytes());
        for v in [1u16, 0, 0, 6, text.len() as u16, 0] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(text);

        assert_eq!(postscript_name(&data).as_deref(), Some("MacName"));
    }

    #[test]
    fn test_postscript_name_absent() {
        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&6u16.to_be_bytes());
        assert_eq!(postscript_name(&data), None);
    }
}
