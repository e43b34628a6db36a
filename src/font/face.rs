//! Font face - sfnt container with lazy table parsing
//!
//! A `FontFace` owns the raw font program and a directory of table records.
//! Each table is parsed on first access and memoized; a damaged table logs a
//! warning and behaves as absent so one bad table never takes down the whole
//! font. Derived scalars fall back (1000 units/em, 0 glyphs) the same way.

use crate::base::error::{Error, Result};
use crate::base::reader::Reader;
use crate::font::cmap::{Cmap, CmapLookup};
use crate::font::glyf::{self, GlyphOutline};
use crate::font::gsub::GsubData;
use crate::font::script;
use crate::font::tables::{self, Head, Hhea, Hmtx, Loca, Maxp};
use crate::font::Tag;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::warn;

/// Table directory record
#[derive(Debug, Clone, Copy)]
pub struct TableRecord {
    pub tag: Tag,
    pub offset: u32,
    pub length: u32,
}

const SFNT_VERSION_TRUETYPE: u32 = 0x0001_0000;
const SFNT_VERSION_OTTO: u32 = u32::from_be_bytes(*b"OTTO");
const SFNT_VERSION_TRUE: u32 = u32::from_be_bytes(*b"true");
const SFNT_VERSION_TTCF: u32 = u32::from_be_bytes(*b"ttcf");

/// A parsed sfnt font program.
///
/// All lazy caches use race-free memoization: concurrent first access parses
/// at most once per table and every caller observes the same value. The
/// backing bytes are immutable, so there is no shared read position to lock.
pub struct FontFace {
    data: Bytes,
    directory: HashMap<Tag, TableRecord>,

    head: OnceLock<Option<Arc<Head>>>,
    maxp: OnceLock<Option<Arc<Maxp>>>,
    hhea: OnceLock<Option<Arc<Hhea>>>,
    hmtx: OnceLock<Option<Arc<Hmtx>>>,
    loca: OnceLock<Option<Arc<Loca>>>,
    cmap: OnceLock<Option<Arc<Cmap>>>,
    gsub: OnceLock<Option<Arc<GsubData>>>,
    ps_name: OnceLock<Option<String>>,

    units: OnceLock<u16>,
    glyph_count: OnceLock<u16>,

    outlines: Mutex<HashMap<u16, Arc<GlyphOutline>>>,
    /// Single-glyph substitutions applied at the cmap boundary once GSUB
    /// features are enabled on this face.
    substitution: Mutex<Option<Arc<HashMap<u16, u16>>>>,
}

impl FontFace {
    /// Parse the table directory of an sfnt font program
    pub fn parse(data: Bytes) -> Result<Self> {
        let mut r = Reader::new(&data);
        let mut version = r.read_u32()?;

        if version == SFNT_VERSION_TTCF {
            // TrueType collection: take the first face; record offsets are
            // absolute, so the shared byte buffer works unchanged.
            r.skip(4)?; // ttc version
            let num_fonts = r.read_u32()?;
            if num_fonts == 0 {
                return Err(Error::font("empty TrueType collection"));
            }
            let first = r.read_u32()? as usize;
            r.seek(first);
            version = r.read_u32()?;
        }

        if !matches!(
            version,
            SFNT_VERSION_TRUETYPE | SFNT_VERSION_OTTO | SFNT_VERSION_TRUE
        ) {
            return Err(Error::font(format!(
                "unrecognized sfnt version 0x{:08X}",
                version
            )));
        }

        let num_tables = r.read_u16()?;
        r.skip(6)?; // searchRange, entrySelector, rangeShift

        let mut directory = HashMap::with_capacity(num_tables as usize);
        for _ in 0..num_tables {
            let tag = Tag(r.read_tag()?);
            r.skip(4)?; // checksum
            let offset = r.read_u32()?;
            let length = r.read_u32()?;

            let end = offset as u64 + length as u64;
            if end > data.len() as u64 {
                warn!(%tag, offset, length, "table record outside font data");
                continue;
            }
            directory.insert(tag, TableRecord { tag, offset, length });
        }

        Ok(Self {
            data,
            directory,
            head: OnceLock::new(),
            maxp: OnceLock::new(),
            hhea: OnceLock::new(),
            hmtx: OnceLock::new(),
            loca: OnceLock::new(),
            cmap: OnceLock::new(),
            gsub: OnceLock::new(),
            ps_name: OnceLock::new(),
            units: OnceLock::new(),
            glyph_count: OnceLock::new(),
            outlines: Mutex::new(HashMap::new()),
            substitution: Mutex::new(None),
        })
    }

    /// Raw bytes of a table, if present
    pub fn table_bytes(&self, tag: Tag) -> Option<&[u8]> {
        let record = self.directory.get(&tag)?;
        self.data
            .get(record.offset as usize..(record.offset + record.length) as usize)
    }

    pub fn has_table(&self, tag: Tag) -> bool {
        self.directory.contains_key(&tag)
    }

    /// Tags present in the directory
    pub fn tables(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.directory.keys().copied().collect();
        tags.sort();
        tags
    }

    /// Whether glyph outlines use CFF charstrings instead of glyf.
    /// CFF outline extraction is a capability this crate does not provide.
    pub fn is_cff(&self) -> bool {
        self.has_table(Tag::CFF) || self.has_table(Tag::CFF2)
    }

    pub fn has_glyph_outlines(&self) -> bool {
        self.has_table(Tag::GLYF) && self.has_table(Tag::LOCA)
    }

    // ------------------------------------------------------------------
    // Lazily parsed tables
    // ------------------------------------------------------------------

    fn parse_table<T>(
        &self,
        tag: Tag,
        parse: impl FnOnce(&[u8]) -> Result<T>,
    ) -> Option<Arc<T>> {
        let bytes = self.table_bytes(tag)?;
        match parse(bytes) {
            Ok(table) => Some(Arc::new(table)),
            Err(err) => {
                // Degrade to "table absent" rather than failing the font.
                warn!(%tag, %err, "table failed to parse");
                None
            }
        }
    }

    pub fn head(&self) -> Option<Arc<Head>> {
        self.head
            .get_or_init(|| self.parse_table(Tag::HEAD, Head::parse))
            .clone()
    }

    pub fn maxp(&self) -> Option<Arc<Maxp>> {
        self.maxp
            .get_or_init(|| self.parse_table(Tag::MAXP, Maxp::parse))
            .clone()
    }

    pub fn hhea(&self) -> Option<Arc<Hhea>> {
        self.hhea
            .get_or_init(|| self.parse_table(Tag::HHEA, Hhea::parse))
            .clone()
    }

    pub fn hmtx(&self) -> Option<Arc<Hmtx>> {
        self.hmtx
            .get_or_init(|| {
                let metrics = self.hhea()?.number_of_h_metrics;
                let glyphs = self.num_glyphs();
                self.parse_table(Tag::HMTX, |data| Hmtx::parse(data, metrics, glyphs))
            })
            .clone()
    }

    pub fn loca(&self) -> Option<Arc<Loca>> {
        self.loca
            .get_or_init(|| {
                let long = self.head().map(|h| h.index_to_loc_format != 0)?;
                let glyphs = self.num_glyphs();
                self.parse_table(Tag::LOCA, |data| Loca::parse(data, long, glyphs))
            })
            .clone()
    }

    pub fn cmap(&self) -> Option<Arc<Cmap>> {
        self.cmap
            .get_or_init(|| self.parse_table(Tag::CMAP, Cmap::parse))
            .clone()
    }

    pub fn gsub(&self) -> Option<Arc<GsubData>> {
        self.gsub
            .get_or_init(|| self.parse_table(Tag::GSUB, GsubData::parse))
            .clone()
    }

    /// The PostScript name from the name table, memoized
    pub fn postscript_name(&self) -> Option<&str> {
        self.ps_name
            .get_or_init(|| {
                self.table_bytes(Tag::NAME)
                    .and_then(tables::postscript_name)
            })
            .as_deref()
    }

    /// Units per em, falling back to 1000 when head is absent or broken
    pub fn units_per_em(&self) -> u16 {
        *self
            .units
            .get_or_init(|| self.head().map(|h| h.units_per_em).unwrap_or(1000))
    }

    /// Glyph count, falling back to 0 when maxp is absent or broken
    pub fn num_glyphs(&self) -> u16 {
        *self
            .glyph_count
            .get_or_init(|| self.maxp().map(|m| m.num_glyphs).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Metrics and outlines
    // ------------------------------------------------------------------

    /// Advance width in font units
    pub fn advance_width(&self, glyph: u16) -> u16 {
        self.hmtx().map(|h| h.advance(glyph)).unwrap_or(0)
    }

    /// Left side bearing in font units
    pub fn left_side_bearing(&self, glyph: u16) -> i16 {
        self.hmtx().map(|h| h.side_bearing(glyph)).unwrap_or(0)
    }

    /// Decode a glyph outline, cached per glyph id.
    ///
    /// The cache lock is never held across the decode, so two threads racing
    /// on first access may both decode; they insert equal outlines and one
    /// wins, which is harmless.
    pub fn glyph(&self, glyph: u16) -> Result<Arc<GlyphOutline>> {
        if let Some(outline) = self.outlines.lock().unwrap().get(&glyph) {
            return Ok(outline.clone());
        }
        let outline = Arc::new(glyf::decode_glyph(self, glyph, 0)?);
        let mut cache = self.outlines.lock().unwrap();
        Ok(cache.entry(glyph).or_insert(outline).clone())
    }

    // ------------------------------------------------------------------
    // Character mapping and substitution
    // ------------------------------------------------------------------

    /// Enable GSUB features at the cmap boundary: subsequent lookups apply
    /// the features' single-glyph substitutions transparently.
    pub fn enable_substitution_features(&self, features: &[Tag]) {
        let map = self
            .gsub()
            .map(|g| g.single_substitutions(features))
            .unwrap_or_default();
        *self.substitution.lock().unwrap() = Some(Arc::new(map));
    }

    /// A unicode-preferring character-to-glyph lookup.
    ///
    /// Strict mode fails when no unicode-capable subtable exists; non-strict
    /// mode silently falls back to the first available subtable.
    pub fn unicode_lookup(&self, strict: bool) -> Result<CmapLookup> {
        let cmap = self
            .cmap()
            .ok_or_else(|| Error::font("font has no cmap table"))?;
        let index = cmap.unicode_subtable_index(strict)?;
        let substitution = self.substitution.lock().unwrap().clone();
        Ok(CmapLookup::new(cmap, index, substitution))
    }

    /// Apply the font's script-specific substitutions and reordering to a
    /// glyph sequence. Without usable GSUB data this is the identity.
    pub fn shape(&self, glyphs: Vec<u16>) -> Vec<u16> {
        match self.gsub() {
            Some(gsub) => script::shape_with(self, &gsub, glyphs),
            None => glyphs,
        }
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("tables", &self.tables())
            .field("units_per_em", &self.units_per_em())
            .field("num_glyphs", &self.num_glyphs())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Builds complete synthetic sfnt fonts for tests

    use super::*;

    /// Assemble an sfnt byte blob from (tag, table bytes) pairs
    pub fn build_font(tables: &[(Tag, Vec<u8>)]) -> Bytes {
        let num = tables.len() as u16;
        let mut header = Vec::new();
        header.extend_from_slice(&SFNT_VERSION_TRUETYPE.to_be_bytes());
        header.extend_from_slice(&num.to_be_bytes());
        // searchRange / entrySelector / rangeShift are ignored by the parser.
        header.extend_from_slice(&[0u8; 6]);

        let mut offset = 12 + 16 * tables.len();
        let mut body = Vec::new();
        for (tag, data) in tables {
            header.extend_from_slice(tag.as_bytes());
            header.extend_from_slice(&0u32.to_be_bytes()); // checksum
            header.extend_from_slice(&(offset as u32).to_be_bytes());
            header.extend_from_slice(&(data.len() as u32).to_be_bytes());
            body.extend_from_slice(data);
            offset += data.len();
        }

        header.extend_from_slice(&body);
        Bytes::from(header)
    }

    /// A minimal well-formed face: head/maxp/hhea/hmtx with `num_glyphs`
    /// glyphs, no outlines or cmap.
    pub fn minimal_tables(num_glyphs: u16) -> Vec<(Tag, Vec<u8>)> {
        use crate::font::tables::test_support::*;
        let mut hmtx = Vec::new();
        for i in 0..num_glyphs {
            hmtx.extend_from_slice(&(500 + i * 10).to_be_bytes());
            hmtx.extend_from_slice(&(10i16).to_be_bytes());
        }
        vec![
            (Tag::HEAD, head_bytes(1000, false)),
            (Tag::MAXP, maxp_bytes(num_glyphs)),
            (Tag::HHEA, hhea_bytes(num_glyphs)),
            (Tag::HMTX, hmtx),
        ]
    }
}
