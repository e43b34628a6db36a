#![allow(clippy::manual_range_contains)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::type_complexity)]

//! PdfGlyph - PDF indirect-object model and embedded font engine
//!
//! This library parses the PDF file structure (cross-reference tables,
//! indirect objects, stream filters) and resolves embedded TrueType/OpenType
//! font programs into renderable glyph outlines, including GSUB glyph
//! substitution for complex scripts.
//!
//! # Modules
//!
//! - `base` - Byte sources, binary readers, paths, errors
//! - `pdf` - PDF object graph: lexer, parser, xref, object store, filters
//! - `font` - sfnt table model, glyph outlines, cmap, GSUB, script shaping
//!
//! Rendering, rasterization and encryption are external collaborators: this
//! crate produces object graphs and vector outlines, nothing pixel-shaped.

pub mod base;
pub mod font;
pub mod pdf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
