//! Glyph outline decoding from the glyf table
//!
//! Simple glyphs carry run-length-encoded flags and delta-coded coordinates;
//! composite glyphs assemble transformed copies of other glyphs. Composite
//! nesting is depth-limited so a crafted font cannot recurse forever.

use crate::base::error::{Error, Result};
use crate::base::geometry::Point;
use crate::base::path::Path;
use crate::base::reader::Reader;
use crate::font::face::FontFace;
use std::sync::OnceLock;
use tracing::warn;

// Simple glyph flag bits
const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const REPEAT: u8 = 0x08;
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

// Composite glyph flag bits
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const ARGS_ARE_XY_VALUES: u16 = 0x0002;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// Bound on composite nesting; beyond this the glyph fails, not the font.
const MAX_COMPOSITE_DEPTH: u32 = 8;

/// A single contour sentinel meaning "intentionally empty glyph", emitted by
/// some PDF generators.
const EMPTY_GLYPH_SENTINEL: u16 = 0xFFFF;

/// One decoded outline point in font units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphPoint {
    pub x: f32,
    pub y: f32,
    pub on_curve: bool,
}

/// A decoded glyph outline: contours of points, plus the header bbox
#[derive(Debug, Default)]
pub struct GlyphOutline {
    pub glyph: u16,
    /// Header bounding box (x_min, y_min, x_max, y_max); None for empty glyphs
    pub bbox: Option<(i16, i16, i16, i16)>,
    pub contours: Vec<Vec<GlyphPoint>>,
    path: OnceLock<Path>,
}

impl GlyphOutline {
    fn empty(glyph: u16) -> Self {
        Self {
            glyph,
            bbox: None,
            contours: Vec::new(),
            path: OnceLock::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.contours.iter().map(Vec::len).sum()
    }

    /// The outline as a vector path, computed once and cached.
    pub fn path(&self) -> &Path {
        self.path.get_or_init(|| build_path(&self.contours))
    }
}

/// Decode one glyph from the face's glyf table.
///
/// `depth` tracks composite nesting; callers start at 0.
pub fn decode_glyph(face: &FontFace, glyph: u16, depth: u32) -> Result<GlyphOutline> {
    if depth > MAX_COMPOSITE_DEPTH {
        return Err(Error::limit(format!(
            "composite glyph nesting beyond {} levels",
            MAX_COMPOSITE_DEPTH
        )));
    }
    if face.num_glyphs() != 0 && glyph >= face.num_glyphs() {
        return Err(Error::font(format!("glyph {} out of range", glyph)));
    }

    let loca = face
        .loca()
        .ok_or_else(|| Error::font("font has no usable loca table"))?;
    let glyf = face
        .table_bytes(crate::font::Tag::GLYF)
        .ok_or_else(|| Error::font("font has no glyf table"))?;

    let (start, end) = loca
        .range(glyph)
        .ok_or_else(|| Error::font(format!("glyph {} missing from loca", glyph)))?;
    if start == end {
        // Valid glyph with no outline (space and friends).
        return Ok(GlyphOutline::empty(glyph));
    }
    let slice = glyf
        .get(start..end.min(glyf.len()))
        .ok_or_else(|| Error::font(format!("glyph {} range outside glyf", glyph)))?;

    let mut r = Reader::new(slice);
    let num_contours = r.read_i16()?;
    let x_min = r.read_i16()?;
    let y_min = r.read_i16()?;
    let x_max = r.read_i16()?;
    let y_max = r.read_i16()?;

    let mut outline = if num_contours >= 0 {
        decode_simple(
            &mut r,
            glyph,
            num_contours as u16,
            face.left_side_bearing(glyph),
            x_min,
        )?
    } else {
        decode_composite(face, &mut r, glyph, depth)?
    };

    if !outline.is_empty() {
        outline.bbox = Some((x_min, y_min, x_max, y_max));
    }
    Ok(outline)
}

fn decode_simple(
    r: &mut Reader<'_>,
    glyph: u16,
    num_contours: u16,
    lsb: i16,
    x_min: i16,
) -> Result<GlyphOutline> {
    let mut end_points = Vec::with_capacity(num_contours as usize);
    for _ in 0..num_contours {
        end_points.push(r.read_u16()?);
    }

    // Known generator quirk: one contour ending at 0xFFFF is an
    // intentionally empty glyph, not an error.
    if end_points.len() == 1 && end_points[0] == EMPTY_GLYPH_SENTINEL {
        return Ok(GlyphOutline::empty(glyph));
    }

    // End-point indices must be strictly increasing.
    for pair in end_points.windows(2) {
        if pair[1] <= pair[0] {
            return Err(Error::format(format!(
                "glyph {}: contour end points not increasing",
                glyph
            )));
        }
    }

    let point_count = match end_points.last() {
        Some(&last) => last as usize + 1,
        None => return Ok(GlyphOutline::empty(glyph)),
    };

    // Hinting bytecode is skipped, never executed.
    let instruction_len = r.read_u16()? as usize;
    r.skip(instruction_len)?;

    // Flags, run-length encoded via the REPEAT bit.
    let mut flags = Vec::with_capacity(point_count);
    while flags.len() < point_count {
        let flag = r.read_u8()?;
        flags.push(flag);
        if flag & REPEAT != 0 {
            let mut count = r.read_u8()? as usize;
            if flags.len() + count > point_count {
                warn!(glyph, "flag repeat overruns point count");
                count = point_count - flags.len();
            }
            for _ in 0..count {
                flags.push(flag);
            }
        }
    }

    // X deltas: the short/positive bits pick the encoding per point.
    let mut xs = Vec::with_capacity(point_count);
    // The first point is positioned relative to lsb - xMin.
    let mut x = (lsb - x_min) as i32;
    for &flag in &flags {
        let delta = if flag & X_SHORT != 0 {
            let magnitude = r.read_u8()? as i32;
            if flag & X_SAME_OR_POSITIVE != 0 {
                magnitude
            } else {
                -magnitude
            }
        } else if flag & X_SAME_OR_POSITIVE != 0 {
            0
        } else {
            r.read_i16()? as i32
        };
        x += delta;
        xs.push(x);
    }

    // Y deltas use the same scheme with their own flag bits.
    let mut ys = Vec::with_capacity(point_count);
    let mut y = 0i32;
    for &flag in &flags {
        let delta = if flag & Y_SHORT != 0 {
            let magnitude = r.read_u8()? as i32;
            if flag & Y_SAME_OR_POSITIVE != 0 {
                magnitude
            } else {
                -magnitude
            }
        } else if flag & Y_SAME_OR_POSITIVE != 0 {
            0
        } else {
            r.read_i16()? as i32
        };
        y += delta;
        ys.push(y);
    }

    // Split the flat point list into contours at the end-point indices.
    let mut contours = Vec::with_capacity(end_points.len());
    let mut from = 0usize;
    for &end in &end_points {
        let to = end as usize + 1;
        let contour: Vec<GlyphPoint> = (from..to)
            .map(|i| GlyphPoint {
                x: xs[i] as f32,
                y: ys[i] as f32,
                on_curve: flags[i] & ON_CURVE != 0,
            })
            .collect();
        contours.push(contour);
        from = to;
    }

    Ok(GlyphOutline {
        glyph,
        bbox: None,
        contours,
        path: OnceLock::new(),
    })
}

fn decode_composite(
    face: &FontFace,
    r: &mut Reader<'_>,
    glyph: u16,
    depth: u32,
) -> Result<GlyphOutline> {
    let mut contours = Vec::new();

    loop {
        let flags = r.read_u16()?;
        let component = r.read_u16()?;

        let (arg1, arg2) = if flags & ARG_1_AND_2_ARE_WORDS != 0 {
            (r.read_i16()? as i32, r.read_i16()? as i32)
        } else {
            (r.read_i8()? as i32, r.read_i8()? as i32)
        };

        // 2x2 transform, row-major [a b; c d], defaulting to identity.
        let (mut a, mut b, mut c, mut d) = (1.0f32, 0.0f32, 0.0f32, 1.0f32);
        if flags & WE_HAVE_A_SCALE != 0 {
            let scale = r.read_f2dot14()?;
            a = scale;
            d = scale;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            a = r.read_f2dot14()?;
            d = r.read_f2dot14()?;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            a = r.read_f2dot14()?;
            b = r.read_f2dot14()?;
            c = r.read_f2dot14()?;
            d = r.read_f2dot14()?;
        }

        let (dx, dy) = if flags & ARGS_ARE_XY_VALUES != 0 {
            (arg1 as f32, arg2 as f32)
        } else {
            // Point-matching composition is vanishingly rare; place the
            // component unshifted rather than failing the glyph.
            warn!(glyph, component, "point-matching composite args ignored");
            (0.0, 0.0)
        };

        if component == glyph {
            warn!(glyph, "composite glyph references itself; skipping component");
        } else {
            let child = decode_glyph(face, component, depth + 1)?;
            for contour in &child.contours {
                let transformed: Vec<GlyphPoint> = contour
                    .iter()
                    .map(|p| GlyphPoint {
                        x: a * p.x + c * p.y + dx,
                        y: b * p.x + d * p.y + dy,
                        on_curve: p.on_curve,
                    })
                    .collect();
                contours.push(transformed);
            }
        }

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }

    Ok(GlyphOutline {
        glyph,
        bbox: None,
        contours,
        path: OnceLock::new(),
    })
}

/// Convert quadratic TrueType contours into a path.
///
/// Consecutive off-curve points imply an on-curve midpoint between them; a
/// contour with no on-curve point starts at the midpoint of its first and
/// last points.
fn build_path(contours: &[Vec<GlyphPoint>]) -> Path {
    let mut path = Path::with_capacity(contours.iter().map(|c| c.len() + 2).sum());

    for contour in contours {
        if contour.is_empty() {
            continue;
        }

        let as_point = |p: &GlyphPoint| Point::new(p.x, p.y);

        // Pick the starting on-curve point, synthesizing one if necessary.
        let first_on = contour.iter().position(|p| p.on_curve);
        let (start, skip) = match first_on {
            Some(i) => (as_point(&contour[i]), i + 1),
            None => (
                as_point(&contour[contour.len() - 1]).midpoint(as_point(&contour[0])),
                0,
            ),
        };

        path.move_to(start);
        let mut pending: Option<Point> = None;

        for i in 0..contour.len() {
            let p = &contour[(skip + i) % contour.len()];
            let pt = as_point(p);
            if p.on_curve {
                match pending.take() {
                    Some(control) => path.quad_to(control, pt),
                    None => path.line_to(pt),
                }
            } else {
                if let Some(control) = pending.take() {
                    path.quad_to(control, control.midpoint(pt));
                }
                pending = Some(pt);
            }
        }

        // Close back to the start, through a trailing control if present.
        match pending {
            Some(control) => path.quad_to(control, start),
            None => path.line_to(start),
        }
        path.close();
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::path::PathElement;
    use crate::font::face::test_support::build_font;
    use crate::font::face::FontFace;
    use crate::font::tables::test_support::*;
    use crate::font::Tag;

    /// Encode a simple glyph: 1 contour, 4 points (on, off, on, off), mixed
    /// short/long vectors. Matches the decode-determinism scenario.
    fn sample_simple_glyph() -> Vec<u8> {
        let mut g = Vec::new();
        g.extend_from_slice(&1i16.to_be_bytes()); // numberOfContours
        for v in [0i16, 0, 100, 100] {
            g.extend_from_slice(&v.to_be_bytes()); // bbox
        }
        g.extend_from_slice(&3u16.to_be_bytes()); // endPtsOfContours
        g.extend_from_slice(&0u16.to_be_bytes()); // instructionLength
        // flags: p0 on + short positive x/y; p1 off + short positive x, y same;
        // p2 on + long x, short negative y... keep each explicit.
        g.push(ON_CURVE | X_SHORT | Y_SHORT | X_SAME_OR_POSITIVE | Y_SAME_OR_POSITIVE);
        g.push(X_SHORT | X_SAME_OR_POSITIVE | Y_SAME_OR_POSITIVE);
        g.push(ON_CURVE);
        g.push(X_SHORT | Y_SHORT);
        // x data: p0 short +10; p1 short +50; p2 long -20; p3 short -15
        g.push(10);
        g.push(50);
        g.extend_from_slice(&(-20i16).to_be_bytes());
        g.push(15);
        // y data: p0 short +5; p1 same (0); p2 long +80; p3 short -30
        g.push(5);
        g.extend_from_slice(&80i16.to_be_bytes());
        g.push(30);
        g
    }

    fn font_with_glyphs(glyphs: &[Vec<u8>]) -> FontFace {
        let mut glyf = Vec::new();
        let mut loca = Vec::new();
        for g in glyphs {
            loca.extend_from_slice(&((glyf.len() / 2) as u16).to_be_bytes());
            glyf.extend_from_slice(g);
            if glyf.len() % 2 != 0 {
                glyf.push(0);
            }
        }
        loca.extend_from_slice(&((glyf.len() / 2) as u16).to_be_bytes());

        let n = glyphs.len() as u16;
        let mut hmtx = Vec::new();
        for _ in 0..n {
            hmtx.extend_from_slice(&600u16.to_be_bytes());
            hmtx.extend_from_slice(&0i16.to_be_bytes());
        }

        let tables = vec![
            (Tag::HEAD, head_bytes(1000, false)),
            (Tag::MAXP, maxp_bytes(n)),
            (Tag::HHEA, hhea_bytes(n)),
            (Tag::HMTX, hmtx),
            (Tag::LOCA, loca),
            (Tag::GLYF, glyf),
        ];
        FontFace::parse(build_font(&tables)).unwrap()
    }

    #[test]
    fn test_simple_glyph_decode() {
        let face = font_with_glyphs(&[sample_simple_glyph()]);
        let outline = face.glyph(0).unwrap();

        assert_eq!(outline.contours.len(), 1);
        let points = &outline.contours[0];
        assert_eq!(points.len(), 4);

        // lsb = 0, xMin = 0, so x starts from 0 and accumulates deltas.
        assert_eq!((points[0].x, points[0].y), (10.0, 5.0));
        assert!(points[0].on_curve);
        assert_eq!((points[1].x, points[1].y), (60.0, 5.0));
        assert!(!points[1].on_curve);
        assert_eq!((points[2].x, points[2].y), (40.0, 85.0));
        assert!(points[2].on_curve);
        assert_eq!((points[3].x, points[3].y), (25.0, 55.0));
        assert!(!points[3].on_curve);

        assert_eq!(outline.bbox, Some((0, 0, 100, 100)));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let face = font_with_glyphs(&[sample_simple_glyph()]);
        let a = decode_glyph(&face, 0, 0).unwrap();
        let b = decode_glyph(&face, 0, 0).unwrap();
        assert_eq!(a.contours, b.contours);
    }

    #[test]
    fn test_empty_sentinel_glyph() {
        // One contour whose end point is 0xFFFF: intentionally empty.
        let mut g = Vec::new();
        g.extend_from_slice(&1i16.to_be_bytes());
        for _ in 0..4 {
            g.extend_from_slice(&0i16.to_be_bytes());
        }
        g.extend_from_slice(&0xFFFFu16.to_be_bytes());

        let face = font_with_glyphs(&[g]);
        let outline = face.glyph(0).unwrap();
        assert!(outline.is_empty());
        assert_eq!(outline.point_count(), 0);
    }

    #[test]
    fn test_zero_length_loca_range_is_empty_glyph() {
        let face = font_with_glyphs(&[Vec::new(), sample_simple_glyph()]);
        let outline = face.glyph(0).unwrap();
        assert!(outline.is_empty());
        assert!(!face.glyph(1).unwrap().is_empty());
    }

    #[test]
    fn test_non_increasing_endpoints_rejected() {
        let mut g = Vec::new();
        g.extend_from_slice(&2i16.to_be_bytes());
        for _ in 0..4 {
            g.extend_from_slice(&0i16.to_be_bytes());
        }
        g.extend_from_slice(&5u16.to_be_bytes());
        g.extend_from_slice(&3u16.to_be_bytes()); // decreasing

        let face = font_with_glyphs(&[g]);
        assert!(face.glyph(0).is_err());
    }

    #[test]
    fn test_lsb_offset_applied() {
        // Same glyph bytes, but hmtx carries lsb 40 and head bbox xMin is 0,
        // so the baseline start shifts by 40.
        let mut glyf = sample_simple_glyph();
        if glyf.len() % 2 != 0 {
            glyf.push(0);
        }
        let mut loca = Vec::new();
        loca.extend_from_slice(&0u16.to_be_bytes());
        loca.extend_from_slice(&((glyf.len() / 2) as u16).to_be_bytes());
        let mut hmtx = Vec::new();
        hmtx.extend_from_slice(&600u16.to_be_bytes());
        hmtx.extend_from_slice(&40i16.to_be_bytes());

        let tables = vec![
            (Tag::HEAD, head_bytes(1000, false)),
            (Tag::MAXP, maxp_bytes(1)),
            (Tag::HHEA, hhea_bytes(1)),
            (Tag::HMTX, hmtx),
            (Tag::LOCA, loca),
            (Tag::GLYF, glyf),
        ];
        let face = FontFace::parse(build_font(&tables)).unwrap();
        let outline = face.glyph(0).unwrap();
        assert_eq!(outline.contours[0][0].x, 50.0); // 40 + 10
    }

    /// Composite glyph with one component, unscaled, offset by (dx, dy)
    fn composite_glyph(component: u16, dx: i16, dy: i16, more: bool) -> Vec<u8> {
        let mut g = Vec::new();
        g.extend_from_slice(&(-1i16).to_be_bytes());
        for _ in 0..4 {
            g.extend_from_slice(&0i16.to_be_bytes());
        }
        let mut flags = ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES;
        if more {
            flags |= MORE_COMPONENTS;
        }
        g.extend_from_slice(&flags.to_be_bytes());
        g.extend_from_slice(&component.to_be_bytes());
        g.extend_from_slice(&dx.to_be_bytes());
        g.extend_from_slice(&dy.to_be_bytes());
        g
    }

    #[test]
    fn test_composite_glyph_offsets_component() {
        let mut composite = composite_glyph(0, 100, -50, true);
        // Second component: the same base shifted the other way.
        composite.extend_from_slice(&composite_glyph(0, -10, 0, false)[10..]);

        let face = font_with_glyphs(&[sample_simple_glyph(), composite]);
        let outline = face.glyph(1).unwrap();

        assert_eq!(outline.contours.len(), 2);
        assert_eq!(outline.contours[0][0].x, 110.0); // 10 + 100
        assert_eq!(outline.contours[0][0].y, -45.0); // 5 - 50
        assert_eq!(outline.contours[1][0].x, 0.0); // 10 - 10
    }

    #[test]
    fn test_composite_depth_limit() {
        // Glyph 1 includes glyph 2 includes glyph 3... past the limit.
        let chain_len = MAX_COMPOSITE_DEPTH as u16 + 3;
        let mut glyphs = vec![sample_simple_glyph()];
        for i in 1..=chain_len {
            let target = if i == chain_len { 0 } else { i + 1 };
            glyphs.push(composite_glyph(target, 0, 0, false));
        }
        let face = font_with_glyphs(&glyphs);

        let result = face.glyph(1);
        assert!(matches!(result, Err(Error::Limit(_))));
        // The simple glyph at the end of the chain still decodes alone.
        assert!(face.glyph(0).is_ok());
    }

    #[test]
    fn test_self_referential_composite_skips() {
        let face = font_with_glyphs(&[composite_glyph(0, 5, 5, false)]);
        let outline = face.glyph(0).unwrap();
        assert!(outline.is_empty());
    }

    #[test]
    fn test_path_building() {
        let face = font_with_glyphs(&[sample_simple_glyph()]);
        let outline = face.glyph(0).unwrap();
        let path = outline.path();

        assert!(matches!(path.elements()[0], PathElement::MoveTo(_)));
        assert!(matches!(path.elements().last(), Some(PathElement::Close)));
        // Off-curve points produce quadratic segments.
        assert!(
            path.elements()
                .iter()
                .any(|e| matches!(e, PathElement::QuadTo(_, _)))
        );
        // The path is cached: same allocation on second call.
        assert!(std::ptr::eq(path, outline.path()));
    }

    #[test]
    fn test_path_all_off_curve_contour() {
        // A contour of only off-curve points still builds a closed path.
        let mut g = Vec::new();
        g.extend_from_slice(&1i16.to_be_bytes());
        for _ in 0..4 {
            g.extend_from_slice(&0i16.to_be_bytes());
        }
        g.extend_from_slice(&2u16.to_be_bytes()); // 3 points
        g.extend_from_slice(&0u16.to_be_bytes());
        g.push(X_SHORT | Y_SHORT | X_SAME_OR_POSITIVE | Y_SAME_OR_POSITIVE);
        g.push(X_SHORT | Y_SHORT | X_SAME_OR_POSITIVE | Y_SAME_OR_POSITIVE);
        g.push(X_SHORT | Y_SHORT | X_SAME_OR_POSITIVE);
        g.extend_from_slice(&[10, 20, 10]); // x deltas
        g.extend_from_slice(&[0, 30, 10]); // y deltas (last negative)

        let face = font_with_glyphs(&[g]);
        let outline = face.glyph(0).unwrap();
        let path = outline.path();
        assert!(matches!(path.elements()[0], PathElement::MoveTo(_)));
        assert!(!path.is_empty());
    }

    #[test]
    fn test_glyph_out_of_range() {
        let face = font_with_glyphs(&[sample_simple_glyph()]);
        assert!(face.glyph(5).is_err());
    }

    #[test]
    fn test_truncated_glyph_data_fails_cleanly() {
        let mut g = sample_simple_glyph();
        g.truncate(g.len() - 3);
        let face = font_with_glyphs(&[g]);
        assert!(matches!(face.glyph(0), Err(Error::Eof)));
    }
}
