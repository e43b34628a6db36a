//! Indirect object store
//!
//! Maps (object number, generation) to lazily parsed data objects. Dangling
//! references resolve to null per PDF semantics; a corrupt object at one
//! offset does not poison the rest of the table. Registered and replaced
//! objects live beside the originals until a writer serializes them.

use crate::base::error::{Error, Result};
use crate::pdf::filter::decode_stream_payload;
use crate::pdf::object::{Dict, Name, ObjRef, Object, StreamObject};
use crate::pdf::parser::Parser;
use crate::pdf::xref::{XrefEntry, XrefTable};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

/// The indirect object store: xref table plus lazily materialized objects.
///
/// Reads are safe from multiple threads sharing one store; the backing bytes
/// are immutable and the caches take a lock only around map access, never
/// across a parse, so concurrent first access at worst parses twice and both
/// threads observe an equal object.
pub struct ObjectStore {
    data: Bytes,
    xref: XrefTable,
    /// Objects parsed from the file
    cache: Mutex<HashMap<u32, Object>>,
    /// Objects registered or replaced during editing
    modified: Mutex<HashMap<u32, Object>>,
    /// Pre-xref-stream compatibility: allow recycling free slots
    reuse_free_slots: bool,
}

impl ObjectStore {
    /// Create a store over raw file bytes with a parsed xref table
    pub fn new(data: Bytes, xref: XrefTable) -> Self {
        Self {
            data,
            xref,
            cache: Mutex::new(HashMap::new()),
            modified: Mutex::new(HashMap::new()),
            reuse_free_slots: false,
        }
    }

    /// Create an empty store for building documents from scratch
    pub fn empty() -> Self {
        Self::new(Bytes::new(), XrefTable::new())
    }

    /// Allow recycling freed object numbers (pre-PDF-1.5 writers only).
    /// Retired slots stay retired either way.
    pub fn set_reuse_free_slots(&mut self, reuse: bool) {
        self.reuse_free_slots = reuse;
    }

    pub fn xref(&self) -> &XrefTable {
        &self.xref
    }

    /// Raw file bytes backing this store
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// One entry per object number in `[0, max]`, free entries synthesized
    pub fn entries(&self) -> Vec<XrefEntry> {
        self.xref.entries().collect()
    }

    /// Largest object number the store knows about
    pub fn max_object_number(&self) -> u32 {
        self.xref.max_num()
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Resolve a reference to its data object.
    ///
    /// Missing, freed, generation-mismatched and out-of-range references all
    /// resolve to `Object::Null`; only a syntactically broken object at a
    /// live offset reports an error. Children are returned as references,
    /// never recursed into.
    pub fn resolve(&self, r: ObjRef) -> Result<Object> {
        if let Some(obj) = self.modified.lock().unwrap().get(&r.num) {
            return Ok(obj.clone());
        }
        if let Some(obj) = self.cache.lock().unwrap().get(&r.num) {
            return Ok(obj.clone());
        }

        let entry = match self.xref.get(r.num) {
            Some(entry) => *entry,
            // Dangling references are harmless per the PDF spec.
            None => return Ok(Object::Null),
        };
        if entry.is_free() || entry.generation != r.generation {
            return Ok(Object::Null);
        }

        let obj = match entry.kind {
            crate::pdf::xref::XrefKind::Offset(offset) => self.parse_at(r.num, offset)?,
            crate::pdf::xref::XrefKind::InStream { container, index } => {
                self.parse_in_stream(r.num, container, index)?
            }
            crate::pdf::xref::XrefKind::Free => Object::Null,
        };

        self.cache.lock().unwrap().insert(r.num, obj.clone());
        Ok(obj)
    }

    /// Resolve, following one level of indirection if `obj` is a reference
    pub fn resolve_value(&self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Ref(r) => self.resolve(*r),
            other => Ok(other.clone()),
        }
    }

    /// Decode a stream object's payload through its filter chain
    pub fn decode_stream(&self, stream: &StreamObject) -> Result<Vec<u8>> {
        decode_stream_payload(&stream.dict, &stream.data, &|r| {
            self.resolve(r).unwrap_or(Object::Null)
        })
    }

    fn parse_at(&self, num: u32, offset: u64) -> Result<Object> {
        if offset as usize >= self.data.len() {
            warn!(num, offset, "xref offset beyond end of file");
            return Ok(Object::Null);
        }
        let mut parser = Parser::new_at(&self.data, offset as usize);
        // /Length may be indirect; resolve it, refusing self-reference.
        let resolver = |r: ObjRef| {
            if r.num == num {
                return None;
            }
            self.resolve(r).ok().and_then(|o| o.as_int())
        };
        let (parsed_num, _, obj) = parser.parse_indirect_object(&resolver)?;
        if parsed_num != num {
            warn!(
                expected = num,
                found = parsed_num,
                offset,
                "object number mismatch at xref offset"
            );
        }
        Ok(obj)
    }

    fn parse_in_stream(&self, num: u32, container: u32, index: u16) -> Result<Object> {
        // The container itself must sit at a file offset; an object stream
        // nested in an object stream is invalid and would recurse forever.
        match self.xref.get(container).map(|e| e.kind) {
            Some(crate::pdf::xref::XrefKind::Offset(_)) => {}
            other => {
                warn!(num, container, ?other, "invalid object stream container");
                return Ok(Object::Null);
            }
        }

        let container_obj = self.resolve(ObjRef::new(container, 0))?;
        let stream = match container_obj.as_stream() {
            Some(s) => s,
            None => {
                warn!(num, container, "object stream container is not a stream");
                return Ok(Object::Null);
            }
        };

        let count = stream.dict.get_int("N").unwrap_or(0);
        let first = stream.dict.get_int("First").unwrap_or(0);
        if count < 0 || first < 0 || index as i64 >= count {
            warn!(num, container, index, "object stream index out of range");
            return Ok(Object::Null);
        }

        let decoded = self.decode_stream(stream)?;

        // Header: N pairs of (object number, offset relative to First).
        let mut header = Parser::new(&decoded);
        let mut slot = None;
        for i in 0..count {
            let obj_num = match header.parse_object()? {
                Object::Int(n) => n,
                other => {
                    return Err(Error::syntax(format!(
                        "object stream header: expected number, got {:?}",
                        other
                    )));
                }
            };
            let rel_offset = match header.parse_object()? {
                Object::Int(n) => n,
                other => {
                    return Err(Error::syntax(format!(
                        "object stream header: expected offset, got {:?}",
                        other
                    )));
                }
            };
            if i == index as i64 {
                slot = Some((obj_num, rel_offset));
            }
        }

        let (obj_num, rel_offset) = slot.expect("index checked against count");
        if obj_num != num as i64 {
            warn!(
                expected = num,
                found = obj_num,
                container,
                "object stream slot number mismatch"
            );
        }

        let abs = (first + rel_offset) as usize;
        if abs >= decoded.len() {
            warn!(num, container, "object stream offset beyond payload");
            return Ok(Object::Null);
        }
        Parser::new_at(&decoded, abs).parse_object()
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Register a new object, allocating the next unused number
    pub fn register(&mut self, obj: Object) -> ObjRef {
        let num = self.xref.allocate(self.reuse_free_slots);
        self.xref.set(XrefEntry::in_use(num, 0, 0));
        self.modified.lock().unwrap().insert(num, obj);
        ObjRef::new(num, 0)
    }

    /// Replace the object behind an existing reference (marks it modified)
    pub fn update(&mut self, r: ObjRef, obj: Object) -> Result<()> {
        if !self.xref.contains(r.num) {
            return Err(Error::argument(format!("update of unknown object {}", r)));
        }
        self.xref.set(XrefEntry::in_use(r.num, r.generation, 0));
        self.cache.lock().unwrap().remove(&r.num);
        self.modified.lock().unwrap().insert(r.num, obj);
        Ok(())
    }

    /// Mark an object free with an unreusable generation. Idempotent; the
    /// number is never recycled in this session.
    pub fn unregister(&mut self, r: ObjRef) {
        self.modified.lock().unwrap().remove(&r.num);
        self.cache.lock().unwrap().remove(&r.num);
        self.xref.retire(r.num);
    }

    /// Whether this object has been registered or replaced in this session
    pub fn is_modified(&self, num: u32) -> bool {
        self.modified.lock().unwrap().contains_key(&num)
    }
}

// ----------------------------------------------------------------------
// Foreign-object import
// ----------------------------------------------------------------------

/// Controls for deep-cloning a foreign object graph
#[derive(Debug, Clone, Default)]
pub struct CloneRules {
    /// Dictionary keys that are not followed (their entries are dropped).
    /// Skipping `Parent` keeps an import from dragging a whole page tree in.
    pub skip_keys: Vec<Name>,
}

impl CloneRules {
    pub fn skipping(keys: &[&str]) -> Self {
        Self {
            skip_keys: keys.iter().map(|k| Name::new(k)).collect(),
        }
    }

    fn skips(&self, key: &Name) -> bool {
        self.skip_keys.iter().any(|k| k == key)
    }
}

/// Deep-clones objects from one store into another.
///
/// The foreign-to-local reference map doubles as the dedup cache: importing
/// the same foreign object twice yields the same local reference, and
/// self-referential graphs terminate because the local number is registered
/// (as a placeholder) before the children are cloned.
pub struct Importer<'s> {
    source: &'s ObjectStore,
    rules: CloneRules,
    map: HashMap<ObjRef, ObjRef>,
}

impl<'s> Importer<'s> {
    pub fn new(source: &'s ObjectStore, rules: CloneRules) -> Self {
        Self {
            source,
            rules,
            map: HashMap::new(),
        }
    }

    /// Import a foreign object graph, returning its local reference
    pub fn import(&mut self, dest: &mut ObjectStore, foreign: ObjRef) -> Result<ObjRef> {
        if let Some(&local) = self.map.get(&foreign) {
            return Ok(local);
        }

        // Register the placeholder before descending: a cycle back to
        // `foreign` then short-circuits through the map.
        let local = dest.register(Object::Null);
        self.map.insert(foreign, local);

        let obj = self.source.resolve(foreign)?;
        let cloned = self.clone_object(dest, &obj)?;
        dest.update(local, cloned)?;
        Ok(local)
    }

    fn clone_object(&mut self, dest: &mut ObjectStore, obj: &Object) -> Result<Object> {
        Ok(match obj {
            Object::Ref(r) => Object::Ref(self.import(dest, *r)?),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.clone_object(dest, item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Object::Dict(dict) => Object::Dict(self.clone_dict(dest, dict)?),
            Object::Stream(stream) => Object::Stream(StreamObject {
                dict: self.clone_dict(dest, &stream.dict)?,
                data: stream.data.clone(),
            }),
            other => other.clone(),
        })
    }

    fn clone_dict(&mut self, dest: &mut ObjectStore, dict: &Dict) -> Result<Dict> {
        let mut out = Dict::new();
        for (key, value) in dict.iter() {
            if self.rules.skips(key) {
                continue;
            }
            out.insert(key.clone(), self.clone_object(dest, value)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::object::PdfString;
    use crate::pdf::xref::GEN_UNREUSABLE;

    fn store_from(data: &[u8], entries: &[XrefEntry]) -> ObjectStore {
        let mut xref = XrefTable::new();
        for entry in entries {
            xref.set(*entry);
        }
        ObjectStore::new(Bytes::copy_from_slice(data), xref)
    }

    #[test]
    fn test_register_resolve_round_trip() {
        let mut store = ObjectStore::empty();
        let mut dict = Dict::new();
        dict.insert(Name::new("Kind"), Object::Name(Name::new("Test")));
        dict.insert(
            Name::new("Payload"),
            Object::Array(vec![Object::Int(1), Object::Real(2.5)]),
        );
        let original = Object::Dict(dict);

        let r = store.register(original.clone());
        assert_eq!(store.resolve(r).unwrap(), original);
    }

    #[test]
    fn test_register_allocates_sequential_numbers() {
        let mut store = ObjectStore::empty();
        let r1 = store.register(Object::Int(1));
        let r2 = store.register(Object::Int(2));
        assert_eq!(r1, ObjRef::new(1, 0));
        assert_eq!(r2, ObjRef::new(2, 0));
    }

    #[test]
    fn test_unregister_twice_is_idempotent() {
        let mut store = ObjectStore::empty();
        let r = store.register(Object::Int(7));

        store.unregister(r);
        let entry = *store.xref().get(r.num).unwrap();
        assert!(entry.is_free());
        assert_eq!(entry.generation, GEN_UNREUSABLE);

        // Second call must not panic and must leave the entry unchanged.
        store.unregister(r);
        assert_eq!(*store.xref().get(r.num).unwrap(), entry);
        assert_eq!(store.resolve(r).unwrap(), Object::Null);
    }

    #[test]
    fn test_freed_numbers_not_recycled() {
        let mut store = ObjectStore::empty();
        let r1 = store.register(Object::Int(1));
        store.unregister(r1);
        let r2 = store.register(Object::Int(2));
        assert_ne!(r1.num, r2.num);
    }

    #[test]
    fn test_resolve_from_file_bytes() {
        let data = b"junk 1 0 obj << /Type /Catalog /Pages 3 0 R >> endobj";
        let store = store_from(data, &[XrefEntry::in_use(1, 0, 5)]);

        let obj = store.resolve(ObjRef::new(1, 0)).unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get_name("Type").unwrap().as_str(), "Catalog");
        // Children stay references.
        assert_eq!(
            dict.get("Pages").unwrap().as_ref_obj(),
            Some(ObjRef::new(3, 0))
        );
    }

    #[test]
    fn test_resolve_dangling_is_null() {
        let data = b"1 0 obj 42 endobj";
        let store = store_from(
            data,
            &[XrefEntry::in_use(1, 0, 0), XrefEntry::free(2, GEN_UNREUSABLE)],
        );

        // Free entry, generation mismatch, out of range: all null.
        assert_eq!(store.resolve(ObjRef::new(2, 0)).unwrap(), Object::Null);
        assert_eq!(store.resolve(ObjRef::new(1, 9)).unwrap(), Object::Null);
        assert_eq!(store.resolve(ObjRef::new(99, 0)).unwrap(), Object::Null);
    }

    #[test]
    fn test_resolve_caches() {
        let data = b"1 0 obj (cached) endobj";
        let store = store_from(data, &[XrefEntry::in_use(1, 0, 0)]);

        let first = store.resolve(ObjRef::new(1, 0)).unwrap();
        let second = store.resolve(ObjRef::new(1, 0)).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.cache.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_corrupt_offset_reports_error() {
        let data = b"1 0 obj << /Broken endobj";
        let store = store_from(
            data,
            &[XrefEntry::in_use(1, 0, 0), XrefEntry::in_use(2, 0, 30)],
        );

        assert!(store.resolve(ObjRef::new(1, 0)).is_err());
        // The broken object does not prevent resolving others; offset 30 is
        // out of range, which degrades to null.
        assert_eq!(store.resolve(ObjRef::new(2, 0)).unwrap(), Object::Null);
    }

    #[test]
    fn test_update_replaces_object() {
        let mut store = ObjectStore::empty();
        let r = store.register(Object::Int(1));
        store.update(r, Object::Int(99)).unwrap();
        assert_eq!(store.resolve(r).unwrap(), Object::Int(99));
        assert!(store.is_modified(r.num));

        assert!(store.update(ObjRef::new(50, 0), Object::Null).is_err());
    }

    #[test]
    fn test_indirect_stream_length() {
        let data: &[u8] =
            b"1 0 obj << /Length 2 0 R >> stream\nabcde\nendstream endobj 2 0 obj 5 endobj";
        let pos = data.windows(7).position(|w| w == b"2 0 obj").unwrap();
        let store = store_from(
            data,
            &[
                XrefEntry::in_use(1, 0, 0),
                XrefEntry::in_use(2, 0, pos as u64),
            ],
        );

        let obj = store.resolve(ObjRef::new(1, 0)).unwrap();
        assert_eq!(obj.as_stream().unwrap().data, b"abcde");
    }

    #[test]
    fn test_resolve_object_stream_member() {
        // Container stream 1 holds objects 5 and 6.
        let payload = b"5 0 6 3 (A) (BB)";
        let first = 8usize; // "5 0 6 3 " is 8 bytes
        let body = format!(
            "1 0 obj << /Type /ObjStm /N 2 /First {} /Length {} >> stream\n",
            first,
            payload.len()
        );
        let mut data = body.into_bytes();
        data.extend_from_slice(payload);
        data.extend_from_slice(b"\nendstream endobj");

        let store = store_from(
            &data,
            &[
                XrefEntry::in_use(1, 0, 0),
                XrefEntry::in_stream(5, 1, 0),
                XrefEntry::in_stream(6, 1, 1),
            ],
        );

        let a = store.resolve(ObjRef::new(5, 0)).unwrap();
        assert_eq!(a.as_string().unwrap().as_bytes(), b"A");
        let b = store.resolve(ObjRef::new(6, 0)).unwrap();
        assert_eq!(b.as_string().unwrap().as_bytes(), b"BB");
    }

    #[test]
    fn test_object_stream_bad_container_degrades() {
        // Container points at itself as a compressed object.
        let store = store_from(b"", &[XrefEntry::in_stream(5, 5, 0)]);
        assert_eq!(store.resolve(ObjRef::new(5, 0)).unwrap(), Object::Null);
    }

    #[test]
    fn test_decode_stream_payload() {
        let mut dict = Dict::new();
        dict.insert(Name::new("Filter"), Object::Name(Name::new("ASCIIHexDecode")));
        let stream = StreamObject {
            dict,
            data: b"4869>".to_vec(),
        };
        let store = ObjectStore::empty();
        assert_eq!(store.decode_stream(&stream).unwrap(), b"Hi");
    }

    #[test]
    fn test_import_simple_graph() {
        let mut src = ObjectStore::empty();
        let leaf = src.register(Object::String(PdfString::new(b"leaf".to_vec())));
        let mut dict = Dict::new();
        dict.insert(Name::new("Child"), Object::Ref(leaf));
        let root = src.register(Object::Dict(dict));

        let mut dest = ObjectStore::empty();
        let mut importer = Importer::new(&src, CloneRules::default());
        let local = importer.import(&mut dest, root).unwrap();

        let obj = dest.resolve(local).unwrap();
        let child_ref = obj.as_dict().unwrap().get("Child").unwrap().as_ref_obj().unwrap();
        let child = dest.resolve(child_ref).unwrap();
        assert_eq!(child.as_string().unwrap().as_bytes(), b"leaf");
    }

    #[test]
    fn test_import_dedups_shared_subgraph() {
        let mut src = ObjectStore::empty();
        let shared = src.register(Object::Int(42));
        let mut d1 = Dict::new();
        d1.insert(Name::new("S"), Object::Ref(shared));
        let a = src.register(Object::Dict(d1));
        let mut d2 = Dict::new();
        d2.insert(Name::new("S"), Object::Ref(shared));
        let b = src.register(Object::Dict(d2));

        let mut dest = ObjectStore::empty();
        let mut importer = Importer::new(&src, CloneRules::default());
        let la = importer.import(&mut dest, a).unwrap();
        let lb = importer.import(&mut dest, b).unwrap();

        let sa = dest.resolve(la).unwrap().as_dict().unwrap().get("S").unwrap().as_ref_obj();
        let sb = dest.resolve(lb).unwrap().as_dict().unwrap().get("S").unwrap().as_ref_obj();
        // Both parents point at one imported copy.
        assert_eq!(sa, sb);
        // Shared leaf imported once: 42 lives behind exactly one number.
        assert_eq!(dest.resolve(sa.unwrap()).unwrap(), Object::Int(42));
    }

    #[test]
    fn test_import_breaks_cycles() {
        let mut src = ObjectStore::empty();
        let a = src.register(Object::Null);
        let b = src.register(Object::Null);
        let mut da = Dict::new();
        da.insert(Name::new("Next"), Object::Ref(b));
        src.update(a, Object::Dict(da)).unwrap();
        let mut db = Dict::new();
        db.insert(Name::new("Next"), Object::Ref(a));
        src.update(b, Object::Dict(db)).unwrap();

        let mut dest = ObjectStore::empty();
        let mut importer = Importer::new(&src, CloneRules::default());
        let la = importer.import(&mut dest, a).unwrap();

        // The cycle closes onto the placeholder-allocated numbers.
        let next = dest.resolve(la).unwrap().as_dict().unwrap().get("Next").unwrap().as_ref_obj().unwrap();
        let back = dest.resolve(next).unwrap().as_dict().unwrap().get("Next").unwrap().as_ref_obj().unwrap();
        assert_eq!(back, la);
    }

    #[test]
    fn test_import_skip_keys() {
        let mut src = ObjectStore::empty();
        let parent = src.register(Object::Int(0));
        let mut dict = Dict::new();
        dict.insert(Name::new("Parent"), Object::Ref(parent));
        dict.insert(Name::new("Value"), Object::Int(5));
        let node = src.register(Object::Dict(dict));

        let mut dest = ObjectStore::empty();
        let mut importer = Importer::new(&src, CloneRules::skipping(&["Parent"]));
        let local = importer.import(&mut dest, node).unwrap();

        let obj = dest.resolve(local).unwrap();
        let d = obj.as_dict().unwrap();
        assert!(d.get("Parent").is_none());
        assert_eq!(d.get_int("Value"), Some(5));
    }
}
