//! GSUB glyph substitution
//!
//! Extraction walks script -> language system -> feature -> lookup and
//! flattens the supported lookup types into one map per feature from input
//! glyph sequence to output glyph sequence. Application tokenizes a glyph
//! run against a feature's keys, longest match first, and replaces matched
//! tokens in place.

use crate::base::error::{Error, Result};
use crate::base::hash::HashList;
use crate::base::reader::Reader;
use crate::font::Tag;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A glyph-index sequence used as key and value in feature maps
pub type GlyphSequence = HashList<u16>;
pub type SequenceMap = HashMap<GlyphSequence, GlyphSequence>;

/// Scripts this engine understands, in selection priority order. Complex
/// scripts come first: their data is only usable when chosen, while Latin
/// shaping degrades gracefully.
const SCRIPT_PRIORITY: &[Tag] = &[
    Tag::new(b"bng2"),
    Tag::new(b"beng"),
    Tag::new(b"latn"),
    Tag::new(b"DFLT"),
];

const NO_REQUIRED_FEATURE: u16 = 0xFFFF;

/// One feature's flattened substitutions plus its tokenizer key order
#[derive(Debug, Default)]
pub struct FeatureSubst {
    map: SequenceMap,
    /// Keys sorted longest first; same-length ties prefer the sequence that
    /// compares greater read back-to-front.
    keys: Vec<GlyphSequence>,
}

impl FeatureSubst {
    fn finish(map: SequenceMap) -> Self {
        let mut keys: Vec<GlyphSequence> = map.keys().cloned().collect();
        keys.sort_by(sequence_order);
        Self { map, keys }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn get(&self, key: &GlyphSequence) -> Option<&GlyphSequence> {
        self.map.get(key)
    }
}

/// Tokenizer key order: longest first, then reverse-lexicographic descending.
///
/// The secondary tie-break recreates "longest, then most specific" matching;
/// it has no normative source and is pinned down here so it can be validated
/// against real font vectors in one place.
pub(crate) fn sequence_order(a: &GlyphSequence, b: &GlyphSequence) -> Ordering {
    b.len()
        .cmp(&a.len())
        .then_with(|| b.as_slice().iter().rev().cmp(a.as_slice().iter().rev()))
}

/// Extracted GSUB data for the selected script
#[derive(Debug, Default)]
pub struct GsubData {
    script: Option<Tag>,
    features: HashMap<Tag, FeatureSubst>,
}

impl GsubData {
    /// Parse a GSUB table, extracting the best-matching script.
    ///
    /// A font whose scripts all fall outside the supported set yields a
    /// no-op engine, not an error.
    pub fn parse(data: &[u8]) -> Result<GsubData> {
        let mut r = Reader::new(data);
        let major = r.read_u16()?;
        let _minor = r.read_u16()?;
        if major != 1 {
            return Err(Error::unsupported(format!("GSUB version {}", major)));
        }
        let script_list = r.read_u16()? as usize;
        let feature_list = r.read_u16()? as usize;
        let lookup_list = r.read_u16()? as usize;

        // Script records: tag -> absolute script table offset.
        let mut sr = Reader::new_at(data, script_list);
        let script_count = sr.read_u16()?;
        let mut available = Vec::with_capacity(script_count as usize);
        for _ in 0..script_count {
            let tag = Tag(sr.read_tag()?);
            let offset = sr.read_u16()? as usize;
            available.push((tag, script_list + offset));
        }

        let chosen = SCRIPT_PRIORITY
            .iter()
            .find_map(|want| available.iter().find(|(tag, _)| tag == want).copied());
        let Some((script_tag, script_offset)) = chosen else {
            let scripts: Vec<Tag> = available.iter().map(|(t, _)| *t).collect();
            debug!(?scripts, "no supported GSUB script; substitution disabled");
            return Ok(GsubData::default());
        };

        // Default language system plus every named one.
        let mut st = Reader::new_at(data, script_offset);
        let default_lang_sys = st.read_u16()? as usize;
        let lang_sys_count = st.read_u16()?;
        let mut lang_sys = Vec::new();
        if default_lang_sys != 0 {
            lang_sys.push(script_offset + default_lang_sys);
        }
        for _ in 0..lang_sys_count {
            st.skip(4)?; // language tag
            let offset = st.read_u16()? as usize;
            lang_sys.push(script_offset + offset);
        }

        let mut feature_indices: Vec<u16> = Vec::new();
        for offset in lang_sys {
            let mut lr = Reader::new_at(data, offset);
            lr.skip(2)?; // lookupOrder (reserved)
            let required = lr.read_u16()?;
            if required != NO_REQUIRED_FEATURE {
                feature_indices.push(required);
            }
            let count = lr.read_u16()?;
            for _ in 0..count {
                feature_indices.push(lr.read_u16()?);
            }
        }
        feature_indices.sort_unstable();
        feature_indices.dedup();

        // Feature records and lookup offsets.
        let mut fr = Reader::new_at(data, feature_list);
        let feature_count = fr.read_u16()?;
        let mut feature_records = Vec::with_capacity(feature_count as usize);
        for _ in 0..feature_count {
            let tag = Tag(fr.read_tag()?);
            let offset = fr.read_u16()? as usize;
            feature_records.push((tag, feature_list + offset));
        }

        let mut lr = Reader::new_at(data, lookup_list);
        let lookup_count = lr.read_u16()?;
        let mut lookup_offsets = Vec::with_capacity(lookup_count as usize);
        for _ in 0..lookup_count {
            lookup_offsets.push(lookup_list + lr.read_u16()? as usize);
        }

        // Flatten each referenced feature's lookups into one sequence map.
        let mut maps: HashMap<Tag, SequenceMap> = HashMap::new();
        for index in feature_indices {
            let Some(&(tag, offset)) = feature_records.get(index as usize) else {
                warn!(index, "feature index outside feature list");
                continue;
            };
            let map = maps.entry(tag).or_default();

            let mut ft = Reader::new_at(data, offset);
            ft.skip(2)?; // featureParams
            let lookup_index_count = ft.read_u16()?;
            for _ in 0..lookup_index_count {
                let li = ft.read_u16()? as usize;
                let Some(&lookup_offset) = lookup_offsets.get(li) else {
                    warn!(feature = %tag, lookup = li, "lookup index outside lookup list");
                    continue;
                };
                if let Err(err) = extract_lookup(data, lookup_offset, map) {
                    // One damaged lookup loses itself, not the feature.
                    warn!(feature = %tag, %err, "skipping damaged lookup");
                }
            }
        }

        let features = maps
            .into_iter()
            .map(|(tag, map)| (tag, FeatureSubst::finish(map)))
            .collect();

        Ok(GsubData {
            script: Some(script_tag),
            features,
        })
    }

    /// The selected script, if any matched
    pub fn script(&self) -> Option<Tag> {
        self.script
    }

    pub fn feature(&self, tag: Tag) -> Option<&FeatureSubst> {
        self.features.get(&tag)
    }

    pub fn feature_tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.features.keys().copied().collect();
        tags.sort();
        tags
    }

    /// Apply one feature to a glyph sequence: split into maximal tokens
    /// matching the feature's keys (longest first), replace matches, pass
    /// everything else through.
    pub fn apply_feature(&self, tag: Tag, glyphs: &[u16]) -> Vec<u16> {
        let Some(feature) = self.features.get(&tag) else {
            return glyphs.to_vec();
        };
        // An empty alternative set would tokenize forever; skip outright.
        if feature.is_empty() {
            return glyphs.to_vec();
        }

        let mut out = Vec::with_capacity(glyphs.len());
        let mut i = 0;
        while i < glyphs.len() {
            let rest = &glyphs[i..];
            match feature.keys.iter().find(|key| key.is_prefix_of(rest)) {
                Some(key) => {
                    let replacement = &feature.map[key];
                    out.extend(replacement.iter());
                    i += key.len();
                }
                None => {
                    out.push(glyphs[i]);
                    i += 1;
                }
            }
        }
        out
    }

    /// Apply an ordered list of feature tags. Features the font lacks, and
    /// features that extracted nothing, are skipped with a diagnostic.
    pub fn apply(&self, order: &[Tag], mut glyphs: Vec<u16>) -> Vec<u16> {
        for &tag in order {
            match self.features.get(&tag) {
                Some(feature) if !feature.is_empty() => {
                    glyphs = self.apply_feature(tag, &glyphs);
                }
                Some(_) => debug!(feature = %tag, "feature extracted no substitutions"),
                None => debug!(feature = %tag, "feature not present; skipped"),
            }
        }
        glyphs
    }

    /// Merge the 1:1 substitutions of the given features (applied in order,
    /// later features winning) for composition at the cmap boundary.
    pub fn single_substitutions(&self, order: &[Tag]) -> HashMap<u16, u16> {
        let mut merged = HashMap::new();
        for &tag in order {
            if let Some(feature) = self.features.get(&tag) {
                for (key, value) in &feature.map {
                    if key.len() == 1 && value.len() == 1 {
                        merged.insert(key.first().unwrap(), value.first().unwrap());
                    }
                }
            }
        }
        merged
    }

    /// Every output glyph a feature can produce (used for script post-passes
    /// that key off feature products, e.g. Bengali init forms).
    pub fn feature_outputs(&self, tag: Tag) -> Vec<u16> {
        let mut out: Vec<u16> = self
            .features
            .get(&tag)
            .map(|f| f.map.values().flat_map(|v| v.iter()).collect())
            .unwrap_or_default();
        out.sort_unstable();
        out.dedup();
        out
    }
}

// ----------------------------------------------------------------------
// Binary extraction
// ----------------------------------------------------------------------

fn extract_lookup(data: &[u8], offset: usize, map: &mut SequenceMap) -> Result<()> {
    let mut r = Reader::new_at(data, offset);
    let lookup_type = r.read_u16()?;
    let _flag = r.read_u16()?;
    let count = r.read_u16()?;
    for _ in 0..count {
        let sub = offset + r.read_u16()? as usize;
        extract_subtable(data, sub, lookup_type, map)?;
    }
    Ok(())
}

fn extract_subtable(
    data: &[u8],
    offset: usize,
    lookup_type: u16,
    map: &mut SequenceMap,
) -> Result<()> {
    match lookup_type {
        1 => extract_single(data, offset, map),
        2 => extract_multiple(data, offset, map),
        3 => extract_alternate(data, offset, map),
        4 => extract_ligature(data, offset, map),
        7 => {
            // Extension wrapper: unwrap to the real subtable.
            let mut r = Reader::new_at(data, offset);
            let format = r.read_u16()?;
            if format != 1 {
                warn!(format, "unknown extension substitution format");
                return Ok(());
            }
            let wrapped_type = r.read_u16()?;
            if wrapped_type == 7 {
                warn!("extension lookup wrapping another extension; skipped");
                return Ok(());
            }
            let wrapped_offset = r.read_u32()? as usize;
            extract_subtable(data, offset + wrapped_offset, wrapped_type, map)
        }
        5 | 6 | 8 => {
            debug!(lookup_type, "contextual substitution not extracted");
            Ok(())
        }
        other => {
            warn!(lookup_type = other, "unknown GSUB lookup type");
            Ok(())
        }
    }
}

fn extract_single(data: &[u8], offset: usize, map: &mut SequenceMap) -> Result<()> {
    let mut r = Reader::new_at(data, offset);
    let format = r.read_u16()?;
    let coverage_offset = r.read_u16()? as usize;
    let coverage = parse_coverage(data, offset + coverage_offset)?;

    match format {
        1 => {
            let delta = r.read_i16()?;
            for glyph in coverage {
                // Modular arithmetic per the spec: the delta wraps.
                let out = (glyph as i32 + delta as i32).rem_euclid(0x10000) as u16;
                insert_mapping(map, HashList::single(glyph), HashList::single(out));
            }
        }
        2 => {
            let glyph_count = r.read_u16()? as usize;
            if glyph_count != coverage.len() {
                warn!(
                    glyph_count,
                    coverage = coverage.len(),
                    "single substitution size mismatch; skipped"
                );
                return Ok(());
            }
            for glyph in coverage {
                let substitute = r.read_u16()?;
                insert_mapping(map, HashList::single(glyph), HashList::single(substitute));
            }
        }
        other => warn!(format = other, "unknown single substitution format"),
    }
    Ok(())
}

fn extract_multiple(data: &[u8], offset: usize, map: &mut SequenceMap) -> Result<()> {
    let mut r = Reader::new_at(data, offset);
    let format = r.read_u16()?;
    if format != 1 {
        warn!(format, "unknown multiple substitution format");
        return Ok(());
    }
    let coverage_offset = r.read_u16()? as usize;
    let sequence_count = r.read_u16()? as usize;
    let coverage = parse_coverage(data, offset + coverage_offset)?;
    if sequence_count != coverage.len() {
        warn!(
            sequence_count,
            coverage = coverage.len(),
            "multiple substitution size mismatch; skipped"
        );
        return Ok(());
    }

    for glyph in coverage {
        let sequence_offset = offset + r.read_u16()? as usize;
        let mut sr = Reader::new_at(data, sequence_offset);
        let count = sr.read_u16()? as usize;
        let mut sequence = Vec::with_capacity(count);
        for _ in 0..count {
            sequence.push(sr.read_u16()?);
        }
        insert_mapping(map, HashList::single(glyph), HashList::from(sequence));
    }
    Ok(())
}

fn extract_alternate(data: &[u8], offset: usize, map: &mut SequenceMap) -> Result<()> {
    let mut r = Reader::new_at(data, offset);
    let format = r.read_u16()?;
    if format != 1 {
        warn!(format, "unknown alternate substitution format");
        return Ok(());
    }
    let coverage_offset = r.read_u16()? as usize;
    let set_count = r.read_u16()? as usize;
    let coverage = parse_coverage(data, offset + coverage_offset)?;
    if set_count != coverage.len() {
        warn!(
            set_count,
            coverage = coverage.len(),
            "alternate substitution size mismatch; skipped"
        );
        return Ok(());
    }

    for glyph in coverage {
        let set_offset = offset + r.read_u16()? as usize;
        let mut sr = Reader::new_at(data, set_offset);
        let count = sr.read_u16()? as usize;
        // First alternate that differs from the input guards against
        // identity loops.
        for _ in 0..count {
            let alternate = sr.read_u16()?;
            if alternate != glyph {
                insert_mapping(map, HashList::single(glyph), HashList::single(alternate));
                break;
            }
        }
    }
    Ok(())
}

fn extract_ligature(data: &[u8], offset: usize, map: &mut SequenceMap) -> Result<()> {
    let mut r = Reader::new_at(data, offset);
    let format = r.read_u16()?;
    if format != 1 {
        warn!(format, "unknown ligature substitution format");
        return Ok(());
    }
    let coverage_offset = r.read_u16()? as usize;
    let set_count = r.read_u16()? as usize;
    let coverage = parse_coverage(data, offset + coverage_offset)?;
    if set_count != coverage.len() {
        warn!(
            set_count,
            coverage = coverage.len(),
            "ligature substitution size mismatch; skipped"
        );
        return Ok(());
    }

    for first_glyph in coverage {
        let set_offset = offset + r.read_u16()? as usize;
        let mut sr = Reader::new_at(data, set_offset);
        let ligature_count = sr.read_u16()? as usize;
        for _ in 0..ligature_count {
            let ligature_offset = set_offset + sr.read_u16()? as usize;
            let mut lr = Reader::new_at(data, ligature_offset);
            let ligature_glyph = lr.read_u16()?;
            let component_count = lr.read_u16()? as usize;
            if component_count == 0 {
                warn!(first_glyph, "ligature with zero components; skipped");
                continue;
            }
            // The key is the full input sequence: first glyph from the
            // coverage, remaining components inline.
            let mut key = Vec::with_capacity(component_count);
            key.push(first_glyph);
            for _ in 1..component_count {
                key.push(lr.read_u16()?);
            }
            insert_mapping(
                map,
                HashList::from(key),
                HashList::single(ligature_glyph),
            );
        }
    }
    Ok(())
}

fn parse_coverage(data: &[u8], offset: usize) -> Result<Vec<u16>> {
    let mut r = Reader::new_at(data, offset);
    let format = r.read_u16()?;
    match format {
        1 => {
            let count = r.read_u16()? as usize;
            let mut glyphs = Vec::with_capacity(count);
            for _ in 0..count {
                glyphs.push(r.read_u16()?);
            }
            Ok(glyphs)
        }
        2 => {
            let range_count = r.read_u16()? as usize;
            let mut glyphs = Vec::new();
            for _ in 0..range_count {
                let start = r.read_u16()?;
                let end = r.read_u16()?;
                r.skip(2)?; // startCoverageIndex
                if end < start {
                    warn!(start, end, "backwards coverage range; skipped");
                    continue;
                }
                glyphs.extend(start..=end);
            }
            Ok(glyphs)
        }
        other => Err(Error::format(format!("coverage format {}", other))),
    }
}

/// Last write wins on conflicting keys, with a diagnostic.
fn insert_mapping(map: &mut SequenceMap, key: GlyphSequence, value: GlyphSequence) {
    if let Some(previous) = map.insert(key.clone(), value.clone()) {
        if previous != value {
            debug!(
                key = ?key.as_slice(),
                old = ?previous.as_slice(),
                new = ?value.as_slice(),
                "conflicting substitution; last write wins"
            );
        }
    }
}

// ----------------------------------------------------------------------
// Test scaffolding: binary GSUB assembly
// ----------------------------------------------------------------------
