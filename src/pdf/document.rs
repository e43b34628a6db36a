//! PDF document loading
//!
//! Walks the file structure (header, startxref, the chain of cross-reference
//! sections) and produces an `ObjectStore` over the raw bytes. Incremental
//! updates are honored by reading sections newest-first; the first section to
//! claim an object number wins.

use crate::base::error::{Error, Result};
use crate::base::reader::Reader;
use crate::base::stream::Stream;
use crate::font::face::FontFace;
use crate::pdf::filter::decode_stream_payload;
use crate::pdf::object::{Dict, ObjRef, Object};
use crate::pdf::parser::{self, Parser};
use crate::pdf::store::ObjectStore;
use crate::pdf::xref::{XrefEntry, XrefTable};
use bytes::Bytes;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// A loaded PDF document
pub struct Document {
    store: ObjectStore,
    trailer: Dict,
    version: String,
}

impl Document {
    /// Open a document from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut stream = Stream::open_file_mapped(path)?;
        let data = stream.read_all()?;
        Self::from_bytes(data)
    }

    /// Open a document from an already loaded stream
    pub fn from_stream(stream: &mut Stream) -> Result<Self> {
        Self::from_bytes(stream.read_all()?)
    }

    /// Open a document from raw bytes
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let version = parser::parse_header(&data)?;

        let mut xref = XrefTable::new();
        let mut trailer = Dict::new();
        let mut next = Some(parser::find_startxref(&data)?);
        let mut visited = HashSet::new();

        while let Some(offset) = next {
            if !visited.insert(offset) {
                warn!(offset, "cross-reference chain loops; stopping");
                break;
            }
            let section = load_xref_section(&data, offset)?;
            for entry in section.entries {
                xref.insert_if_absent(entry);
            }
            if section.dict.contains_key("XRefStm") {
                // Hybrid-reference file; the classic chain stays authoritative.
                debug!(offset, "ignoring hybrid /XRefStm pointer");
            }
            next = section.dict.get_int("Prev").and_then(|p| {
                if p >= 0 && (p as usize) < data.len() {
                    Some(p as u64)
                } else {
                    warn!(prev = p, "invalid /Prev offset; stopping chain walk");
                    None
                }
            });
            // Newest trailer wins key-by-key.
            for (key, value) in section.dict.iter() {
                if !trailer.contains_key(key.as_str()) {
                    trailer.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(Self {
            store: ObjectStore::new(data, xref),
            trailer,
            version,
        })
    }

    /// The PDF version from the file header (e.g. "1.7")
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The merged trailer dictionary
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ObjectStore {
        &mut self.store
    }

    /// Resolve an indirect reference through the object store
    pub fn resolve(&self, r: ObjRef) -> Result<Object> {
        self.store.resolve(r)
    }

    /// The document catalog (the trailer's /Root dictionary)
    pub fn catalog(&self) -> Result<Dict> {
        let root = self
            .trailer
            .get("Root")
            .and_then(Object::as_ref_obj)
            .ok_or_else(|| Error::format("trailer has no /Root reference"))?;
        match self.resolve(root)? {
            Object::Dict(dict) => Ok(dict),
            _ => Err(Error::format("/Root is not a dictionary")),
        }
    }

    /// Materialize an embedded font program (a FontFile2/FontFile3 stream)
    /// into a parsed font face.
    pub fn embedded_font(&self, font_file: ObjRef) -> Result<FontFace> {
        let obj = self.resolve(font_file)?;
        let stream = obj
            .as_stream()
            .ok_or_else(|| Error::font(format!("{} is not a font stream", font_file)))?;
        let program = self.store.decode_stream(stream)?;
        FontFace::parse(Bytes::from(program))
    }
}

struct XrefSection {
    entries: Vec<XrefEntry>,
    dict: Dict,
}

/// Load one cross-reference section, classic table or xref stream
fn load_xref_section(data: &[u8], offset: u64) -> Result<XrefSection> {
    let start = offset as usize;
    if start >= data.len() {
        return Err(Error::format(format!("xref offset {} out of range", offset)));
    }
    let slice = &data[start..];
    let is_classic = slice
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|i| slice[i..].starts_with(b"xref"))
        .unwrap_or(false);

    if is_classic {
        let (entries, dict) = Parser::new_at(data, start).parse_xref_section()?;
        Ok(XrefSection { entries, dict })
    } else {
        load_xref_stream(data, start)
    }
}

fn load_xref_stream(data: &[u8], offset: usize) -> Result<XrefSection> {
    // At bootstrap no store exists, so indirect /Length cannot resolve; the
    // parser falls back to scanning for endstream in that case.
    let mut parser = Parser::new_at(data, offset);
    let (_, _, obj) = parser.parse_indirect_object(&|_| None)?;
    let stream = obj
        .as_stream()
        .ok_or_else(|| Error::format("xref offset does not hold an xref stream"))?;
    let dict = stream.dict.clone();

    if dict.get_name("Type").map(|n| n.as_str()) != Some("XRef") {
        warn!("xref stream missing /Type /XRef");
    }

    let widths = dict
        .get("W")
        .and_then(Object::as_array)
        .ok_or_else(|| Error::format("xref stream missing /W"))?;
    if widths.len() < 3 {
        return Err(Error::format("/W must have three elements"));
    }
    let w: Vec<usize> = widths
        .iter()
        .take(3)
        .map(|o| o.as_int().unwrap_or(0).clamp(0, 8) as usize)
        .collect();
    let row_len: usize = w.iter().sum();
    if row_len == 0 {
        return Err(Error::format("/W describes empty entries"));
    }

    let size = dict.get_int("Size").unwrap_or(0);
    let index: Vec<i64> = dict
        .get("Index")
        .and_then(Object::as_array)
        .map(|a| a.iter().filter_map(Object::as_int).collect())
        .unwrap_or_else(|| vec![0, size]);

    let payload = decode_stream_payload(&dict, &stream.data, &|_| Object::Null)?;
    let mut reader = Reader::new(&payload);
    let mut entries = Vec::new();

    for range in index.chunks(2) {
        let (start, count) = match range {
            [s, c] if *s >= 0 && *c >= 0 => (*s as u32, *c as u32),
            _ => return Err(Error::format("invalid /Index pair")),
        };
        for i in 0..count {
            if reader.remaining() < row_len {
                warn!("xref stream shorter than /Index declares");
                break;
            }
            let num = start + i;
            // Width-0 type field defaults to 1 (in use).
            let kind = if w[0] == 0 { 1 } else { reader.read_uint(w[0])? };
            let field2 = reader.read_uint(w[1])?;
            let field3 = reader.read_uint(w[2])?;

            let entry = match kind {
                0 => XrefEntry::free(num, field3 as u16),
                1 => XrefEntry::in_use(num, field3 as u16, field2),
                2 => XrefEntry::in_stream(num, field2 as u32, field3 as u16),
                other => {
                    // Unknown types read as null references per the spec.
                    debug!(num, kind = other, "unknown xref stream entry type");
                    XrefEntry::free(num, 0)
                }
            };
            entries.push(entry);
        }
    }

    Ok(XrefSection { entries, dict })
}
