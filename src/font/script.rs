//! Script-specific shaping workers
//!
//! Each worker composes the generic feature-ordered substitution with a
//! script post-pass. Latin needs no post-pass; Bengali repositions pre-base
//! vowel signs and splits two-part vowel signs around their consonant.

use crate::font::cmap::CmapLookup;
use crate::font::face::FontFace;
use crate::font::gsub::GsubData;
use crate::font::Tag;
use std::collections::{HashMap, HashSet};

const INIT: Tag = Tag::new(b"init");

/// Feature order for Latin text
const LATIN_FEATURES: &[Tag] = &[Tag::new(b"ccmp"), Tag::new(b"liga"), Tag::new(b"clig")];

/// Feature order for Bengali text, substitution features first, positional
/// and halant forms before presentation forms.
const BENGALI_FEATURES: &[Tag] = &[
    Tag::new(b"nukt"),
    Tag::new(b"akhn"),
    Tag::new(b"rphf"),
    Tag::new(b"blwf"),
    Tag::new(b"half"),
    Tag::new(b"pstf"),
    Tag::new(b"vatu"),
    Tag::new(b"cjct"),
    INIT,
    Tag::new(b"pres"),
    Tag::new(b"abvs"),
    Tag::new(b"blws"),
    Tag::new(b"psts"),
    Tag::new(b"haln"),
    Tag::new(b"liga"),
    Tag::new(b"clig"),
];

/// A script worker: ordered features plus an optional reordering post-pass
pub trait ScriptShaper {
    /// The fixed feature application order for this script
    fn feature_order(&self) -> &[Tag];

    /// Apply substitutions then any script-specific reordering
    fn apply_transforms(&self, gsub: &GsubData, glyphs: Vec<u16>) -> Vec<u16> {
        gsub.apply(self.feature_order(), glyphs)
    }
}

/// Latin: plain feature application, no reordering
pub struct LatinShaper;

impl ScriptShaper for LatinShaper {
    fn feature_order(&self) -> &[Tag] {
        LATIN_FEATURES
    }
}

/// Bengali: feature application plus vowel-sign reordering.
///
/// The "before-half" set holds glyphs whose visual form precedes the
/// consonant they attach to (i-kar, e-kar, ai-kar), extended at apply time
/// with whatever the init feature produces. Two-part vowel signs (o-kar,
/// ou-kar) decompose into components placed around the preceding glyph.
pub struct BengaliShaper {
    before_half: HashSet<u16>,
    two_part: HashMap<u16, (u16, u16)>,
}

// Pre-base vowel signs: i-kar, e-kar, ai-kar.
const BENGALI_BEFORE_HALF: &[u32] = &[0x09BF, 0x09C7, 0x09C8];
// Two-part signs and their components: o-kar = e-kar + aa-kar,
// ou-kar = e-kar + au-length-mark.
const BENGALI_TWO_PART: &[(u32, u32, u32)] =
    &[(0x09CB, 0x09C7, 0x09BE), (0x09CC, 0x09C7, 0x09D7)];

impl BengaliShaper {
    /// Build the worker from a font face, mapping the relevant code points
    /// through its base character map.
    pub fn new(face: &FontFace) -> Self {
        let lookup = face.unicode_lookup(false).ok();
        let glyph = |code: u32| -> Option<u16> {
            let gid = lookup.as_ref().map(|l| CmapLookup::glyph_id(l, code))?;
            (gid != 0).then_some(gid)
        };

        let before_half = BENGALI_BEFORE_HALF.iter().filter_map(|&c| glyph(c)).collect();
        let two_part = BENGALI_TWO_PART
            .iter()
            .filter_map(|&(sign, before, after)| {
                Some((glyph(sign)?, (glyph(before)?, glyph(after)?)))
            })
            .collect();

        Self {
            before_half,
            two_part,
        }
    }

    /// Build the worker from explicit glyph sets (no cmap involved)
    pub fn from_glyph_sets(
        before_half: HashSet<u16>,
        two_part: HashMap<u16, (u16, u16)>,
    ) -> Self {
        Self {
            before_half,
            two_part,
        }
    }

    fn reorder(&self, gsub: &GsubData, mut glyphs: Vec<u16>) -> Vec<u16> {
        // Sequences shorter than two glyphs have nothing to reorder.
        if glyphs.len() < 2 {
            return glyphs;
        }

        let mut before_half = self.before_half.clone();
        before_half.extend(gsub.feature_outputs(INIT));

        // Pass 1: pre-base glyphs swap with their immediate predecessor.
        let mut i = 0;
        while i + 1 < glyphs.len() {
            if before_half.contains(&glyphs[i + 1]) {
                glyphs.swap(i, i + 1);
            }
            i += 1;
        }

        // Pass 2: two-part signs split into before/after components around
        // the preceding glyph.
        let mut i = 0;
        while i < glyphs.len() {
            if let Some(&(before, after)) = self.two_part.get(&glyphs[i]) {
                glyphs[i] = after;
                glyphs.insert(i.saturating_sub(1), before);
                i += 2;
            } else {
                i += 1;
            }
        }

        glyphs
    }
}

impl ScriptShaper for BengaliShaper {
    fn feature_order(&self) -> &[Tag] {
        BENGALI_FEATURES
    }

    fn apply_transforms(&self, gsub: &GsubData, glyphs: Vec<u16>) -> Vec<u16> {
        let substituted = gsub.apply(self.feature_order(), glyphs);
        self.reorder(gsub, substituted)
    }
}

/// Shape a glyph run with the worker matching the font's selected script
pub fn shape_with(face: &FontFace, gsub: &GsubData, glyphs: Vec<u16>) -> Vec<u16> {
    match gsub.script() {
        Some(tag) if tag == Tag::new(b"beng") || tag == Tag::new(b"bng2") => {
            BengaliShaper::new(face).apply_transforms(gsub, glyphs)
        }
        Some(_) => LatinShaper.apply_transforms(gsub, glyphs),
        None => glyphs,
    }
}
