//! Character-to-glyph mapping (cmap)
//!
//! Subtable formats 0, 4, 6 and 12 cover practically every embedded font.
//! Lookup selection prefers unicode-capable subtables in a fixed priority
//! order; symbol and legacy subtables are last resorts.

use crate::base::error::{Error, Result};
use crate::base::reader::Reader;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Platform/encoding pairs in lookup-preference order: unicode full range,
/// then unicode BMP, then legacy Macintosh, then Windows symbol.
const UNICODE_PRIORITY: &[(u16, u16)] = &[
    (0, 4), // Unicode 2.0 full repertoire
    (3, 10), // Windows, UCS-4
    (0, 3), // Unicode 2.0 BMP
    (3, 1), // Windows, UCS-2
    (1, 0), // Macintosh
    (3, 0), // Windows symbol
];

/// One cmap subtable with its platform/encoding identity
#[derive(Debug)]
pub struct CmapSubtable {
    pub platform: u16,
    pub encoding: u16,
    mapping: Mapping,
}

#[derive(Debug)]
enum Mapping {
    /// Format 0: byte encoding table
    ByteTable(Box<[u8; 256]>),
    /// Format 4: segment mapping to delta values
    Segments(SegmentMap),
    /// Format 6: trimmed table
    Trimmed { first: u16, glyphs: Vec<u16> },
    /// Format 12: segmented coverage
    Groups(Vec<(u32, u32, u32)>),
}

#[derive(Debug)]
struct SegmentMap {
    end: Vec<u16>,
    start: Vec<u16>,
    delta: Vec<i16>,
    range_offset: Vec<u16>,
    glyph_array: Vec<u16>,
}

impl SegmentMap {
    fn glyph_id(&self, code: u32) -> u16 {
        if code > 0xFFFF {
            return 0;
        }
        let code = code as u16;
        let seg_count = self.end.len();
        let Some(i) = (0..seg_count).find(|&i| self.end[i] >= code) else {
            return 0;
        };
        if self.start[i] > code {
            return 0;
        }

        if self.range_offset[i] == 0 {
            (code as i32 + self.delta[i] as i32) as u16
        } else {
            // The offset is relative to the idRangeOffset slot in the file;
            // rebased onto the parsed glyph array.
            let index = self.range_offset[i] as usize / 2 + (code - self.start[i]) as usize
                - (seg_count - i);
            match self.glyph_array.get(index) {
                Some(0) | None => 0,
                Some(&gid) => (gid as i32 + self.delta[i] as i32) as u16,
            }
        }
    }

    fn collect_codes(&self, glyph: u16, out: &mut Vec<u32>) {
        for i in 0..self.end.len() {
            for code in self.start[i]..=self.end[i] {
                if code == 0xFFFF {
                    break;
                }
                if self.glyph_id(code as u32) == glyph {
                    out.push(code as u32);
                }
            }
        }
    }
}

impl CmapSubtable {
    /// Map a code point to a glyph index; 0 (.notdef) when unmapped
    pub fn glyph_id(&self, code: u32) -> u16 {
        match &self.mapping {
            Mapping::ByteTable(table) => {
                if code < 256 {
                    table[code as usize] as u16
                } else {
                    0
                }
            }
            Mapping::Segments(segments) => segments.glyph_id(code),
            Mapping::Trimmed { first, glyphs } => {
                let first = *first as u32;
                if code >= first && code < first + glyphs.len() as u32 {
                    glyphs[(code - first) as usize]
                } else {
                    0
                }
            }
            Mapping::Groups(groups) => groups
                .iter()
                .find(|(start, end, _)| *start <= code && code <= *end)
                .map(|(start, _, glyph)| (glyph + (code - start)) as u16)
                .unwrap_or(0),
        }
    }

    /// All code points mapping to a glyph index
    pub fn char_codes(&self, glyph: u16) -> Vec<u32> {
        let mut out = Vec::new();
        match &self.mapping {
            Mapping::ByteTable(table) => {
                for (code, &gid) in table.iter().enumerate() {
                    if gid as u16 == glyph && glyph != 0 {
                        out.push(code as u32);
                    }
                }
            }
            Mapping::Segments(segments) => {
                if glyph != 0 {
                    segments.collect_codes(glyph, &mut out);
                }
            }
            Mapping::Trimmed { first, glyphs } => {
                for (i, &gid) in glyphs.iter().enumerate() {
                    if gid == glyph && glyph != 0 {
                        out.push(*first as u32 + i as u32);
                    }
                }
            }
            Mapping::Groups(groups) => {
                for (start, end, start_glyph) in groups {
                    let glyph = glyph as u32;
                    if glyph >= *start_glyph && glyph - start_glyph <= end - start {
                        out.push(start + (glyph - start_glyph));
                    }
                }
            }
        }
        out
    }
}

/// The parsed cmap table: all subtables, eagerly decoded
#[derive(Debug)]
pub struct Cmap {
    subtables: Vec<CmapSubtable>,
}

impl Cmap {
    pub fn parse(data: &[u8]) -> Result<Cmap> {
        let mut r = Reader::new(data);
        r.skip(2)?; // version
        let count = r.read_u16()?;

        let mut subtables = Vec::new();
        for _ in 0..count {
            let platform = r.read_u16()?;
            let encoding = r.read_u16()?;
            let offset = r.read_u32()? as usize;

            match parse_subtable(data, offset) {
                Ok(mapping) => subtables.push(CmapSubtable {
                    platform,
                    encoding,
                    mapping,
                }),
                Err(err) => {
                    // One undecodable subtable does not sink the table.
                    warn!(platform, encoding, %err, "skipping cmap subtable");
                }
            }
        }

        if subtables.is_empty() {
            return Err(Error::font("cmap has no decodable subtables"));
        }
        Ok(Cmap { subtables })
    }

    pub fn subtables(&self) -> &[CmapSubtable] {
        &self.subtables
    }

    /// Pick the best subtable per the fixed unicode-preference order.
    ///
    /// Strict mode fails when nothing in the priority list matches;
    /// non-strict mode falls back to the first subtable.
    pub fn unicode_subtable_index(&self, strict: bool) -> Result<usize> {
        for &(platform, encoding) in UNICODE_PRIORITY {
            if let Some(i) = self
                .subtables
                .iter()
                .position(|s| s.platform == platform && s.encoding == encoding)
            {
                return Ok(i);
            }
        }
        if strict {
            Err(Error::font("no unicode cmap subtable"))
        } else {
            Ok(0)
        }
    }
}

fn parse_subtable(data: &[u8], offset: usize) -> Result<Mapping> {
    let mut r = Reader::new_at(data, offset);
    let format = r.read_u16()?;
    match format {
        0 => {
            r.skip(4)?; // length, language
            let bytes = r.take(256)?;
            let mut table = [0u8; 256];
            table.copy_from_slice(bytes);
            Ok(Mapping::ByteTable(Box::new(table)))
        }
        4 => {
            let length = r.read_u16()? as usize;
            // The glyph id array runs to the declared end of the subtable.
            let table_end = (offset + length).min(data.len());
            r.skip(2)?; // language
            let seg_count = (r.read_u16()? / 2) as usize;
            if seg_count == 0 {
                return Err(Error::font("cmap format 4 with zero segments"));
            }
            r.skip(6)?; // searchRange, entrySelector, rangeShift
            let mut end = Vec::with_capacity(seg_count);
            for _ in 0..seg_count {
                end.push(r.read_u16()?);
            }
            r.skip(2)?; // reservedPad
            let mut start = Vec::with_capacity(seg_count);
            for _ in 0..seg_count {
                start.push(r.read_u16()?);
            }
            let mut delta = Vec::with_capacity(seg_count);
            for _ in 0..seg_count {
                delta.push(r.read_i16()?);
            }
            let mut range_offset = Vec::with_capacity(seg_count);
            for _ in 0..seg_count {
                range_offset.push(r.read_u16()?);
            }
            let mut glyph_array = Vec::new();
            while r.offset() + 2 <= table_end {
                glyph_array.push(r.read_u16()?);
            }
            Ok(Mapping::Segments(SegmentMap {
                end,
                start,
                delta,
                range_offset,
                glyph_array,
            }))
        }
        6 => {
            r.skip(4)?; // length, language
            let first = r.read_u16()?;
            let count = r.read_u16()?;
            let mut glyphs = Vec::with_capacity(count as usize);
            for _ in 0..count {
                glyphs.push(r.read_u16()?);
            }
            Ok(Mapping::Trimmed { first, glyphs })
        }
        12 => {
            r.skip(10)?; // reserved, length, language
            let n_groups = r.read_u32()?;
            // A sanity bound: each group is 12 bytes.
            if n_groups as usize > r.remaining() / 12 {
                return Err(Error::font("cmap format 12 group count overruns table"));
            }
            let mut groups = Vec::with_capacity(n_groups as usize);
            for _ in 0..n_groups {
                let start = r.read_u32()?;
                let end = r.read_u32()?;
                let glyph = r.read_u32()?;
                if end < start {
                    return Err(Error::font("cmap format 12 group is backwards"));
                }
                groups.push((start, end, glyph));
            }
            Ok(Mapping::Groups(groups))
        }
        other => Err(Error::unsupported(format!("cmap subtable format {}", other))),
    }
}

/// A character-to-glyph lookup bound to one subtable, optionally composed
/// with enabled GSUB single substitutions.
#[derive(Debug, Clone)]
pub struct CmapLookup {
    cmap: Arc<Cmap>,
    index: usize,
    substitution: Option<Arc<HashMap<u16, u16>>>,
}

impl CmapLookup {
    pub(crate) fn new(
        cmap: Arc<Cmap>,
        index: usize,
        substitution: Option<Arc<HashMap<u16, u16>>>,
    ) -> Self {
        Self {
            cmap,
            index,
            substitution,
        }
    }

    fn subtable(&self) -> &CmapSubtable {
        &self.cmap.subtables()[self.index]
    }

    /// The best glyph for a code point: cmap lookup, then any enabled
    /// substitution applied transparently.
    pub fn glyph_id(&self, code: u32) -> u16 {
        let base = self.subtable().glyph_id(code);
        match &self.substitution {
            Some(map) => map.get(&base).copied().unwrap_or(base),
            None => base,
        }
    }

    /// Code points mapping to a glyph (pre-substitution identity)
    pub fn char_codes(&self, glyph: u16) -> Vec<u32> {
        self.subtable().char_codes(glyph)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_format0_lookup() {
        let cmap =
            Cmap::parse(&build_cmap(&[(1, 0, format0_subtable(&[(65, 7), (66, 8)]))])).unwrap();
        let sub = &cmap.subtables()[0];
        assert_eq!(sub.glyph_id(65), 7);
        assert_eq!(sub.glyph_id(66), 8);
        assert_eq!(sub.glyph_id(67), 0);
        assert_eq!(sub.glyph_id(1000), 0);
        assert_eq!(sub.char_codes(7), vec![65]);
    }

    #[test]
    fn test_format4_delta_lookup() {
        // Codes 0x41..=0x44 map with delta -0x40: A -> glyph 1, etc.
        let cmap =
            Cmap::parse(&build_cmap(&[(3, 1, format4_subtable(0x41, 0x44, -0x40))])).unwrap();
        let sub = &cmap.subtables()[0];
        assert_eq!(sub.glyph_id(0x41), 1);
        assert_eq!(sub.glyph_id(0x44), 4);
        assert_eq!(sub.glyph_id(0x45), 0);
        assert_eq!(sub.glyph_id(0x40), 0);
        assert_eq!(sub.char_codes(2), vec![0x42]);
    }

    #[test]
    fn test_format6_lookup() {
        let cmap =
            Cmap::parse(&build_cmap(&[(0, 3, format6_subtable(0x20, &[3, 0, 5]))])).unwrap();
        let sub = &cmap.subtables()[0];
        assert_eq!(sub.glyph_id(0x20), 3);
        assert_eq!(sub.glyph_id(0x21), 0);
        assert_eq!(sub.glyph_id(0x22), 5);
        assert_eq!(sub.glyph_id(0x23), 0);
        assert_eq!(sub.char_codes(5), vec![0x22]);
    }

    #[test]
    fn test_format12_lookup() {
        let groups = [(0x1F600, 0x1F603, 100), (0x41, 0x41, 1)];
        let cmap = Cmap::parse(&build_cmap(&[(3, 10, format12_subtable(&groups))])).unwrap();
        let sub = &cmap.subtables()[0];
        assert_eq!(sub.glyph_id(0x1F600), 100);
        assert_eq!(sub.glyph_id(0x1F603), 103);
        assert_eq!(sub.glyph_id(0x1F604), 0);
        assert_eq!(sub.glyph_id(0x41), 1);
        assert_eq!(sub.char_codes(102), vec![0x1F602]);
    }

    #[test]
    fn test_priority_order_prefers_unicode_full() {
        let cmap = Cmap::parse(&build_cmap(&[
            (3, 1, format4_subtable(0x41, 0x44, -0x40)),
            (3, 10, format12_subtable(&[(0x41, 0x41, 9)])),
        ]))
        .unwrap();
        // (3,10) outranks (3,1) in the priority order.
        let index = cmap.unicode_subtable_index(true).unwrap();
        assert_eq!(cmap.subtables()[index].encoding, 10);
    }

    #[test]
    fn test_priority_macintosh_over_windows_symbol() {
        // The fixed order puts Macintosh (1,0) ahead of Windows symbol (3,0).
        let cmap = Cmap::parse(&build_cmap(&[
            (3, 0, format6_subtable(0xF020, &[11, 12])),
            (1, 0, format0_subtable(&[(65, 5)])),
        ]))
        .unwrap();

        let index = cmap.unicode_subtable_index(true).unwrap();
        let chosen = &cmap.subtables()[index];
        assert_eq!((chosen.platform, chosen.encoding), (1, 0));
    }

    #[test]
    fn test_strict_mode_errors_without_match() {
        // (2, 2) matches nothing in the priority list.
        let cmap = Cmap::parse(&build_cmap(&[(2, 2, format0_subtable(&[(65, 5)]))])).unwrap();
        assert!(cmap.unicode_subtable_index(true).is_err());
        // Non-strict falls back to the first subtable.
        assert_eq!(cmap.unicode_subtable_index(false).unwrap(), 0);
    }

    #[test]
    fn test_undecodable_subtable_skipped() {
        // First record points at format 2 (unsupported), second is fine.
        let cmap = Cmap::parse(&build_cmap(&[
            (3, 1, {
                let mut bad = Vec::new();
                bad.extend_from_slice(&2u16.to_be_bytes());
                bad.extend_from_slice(&[0u8; 8]);
                bad
            }),
            (1, 0, format0_subtable(&[(65, 5)])),
        ]))
        .unwrap();
        assert_eq!(cmap.subtables().len(), 1);
    }

    #[test]
    fn test_all_subtables_bad_is_error() {
        let mut bad = Vec::new();
        bad.extend_from_slice(&2u16.to_be_bytes());
        bad.extend_from_slice(&[0u8; 4]);
        assert!(Cmap::parse(&build_cmap(&[(3, 1, bad)])).is_err());
    }

    #[test]
    fn test_lookup_with_substitution() {
        let cmap =
            Arc::new(Cmap::parse(&build_cmap(&[(1, 0, format0_subtable(&[(65, 7)]))])).unwrap());
        let mut subst = HashMap::new();
        subst.insert(7u16, 42u16);

        let plain = CmapLookup::new(cmap.clone(), 0, None);
        assert_eq!(plain.glyph_id(65), 7);

        let substituted = CmapLookup::new(cmap, 0, Some(Arc::new(subst)));
        assert_eq!(substituted.glyph_id(65), 42);
        // Unmapped glyphs pass through unchanged.
        assert_eq!(substituted.glyph_id(66), 0);
    }
}
