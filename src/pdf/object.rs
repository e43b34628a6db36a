//! PDF object types
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Interned Name Implementation
// ============================================================================

/// Interned PDF Name with shared storage
///
/// PDF names are frequently repeated (Type, Length, Filter, ...). This
/// implementation uses `Arc<str>` for zero-copy cloning and sharing.
/// Common names are pre-interned for fast comparison.
#[derive(Debug, Clone, Eq)]
pub struct Name(Arc<str>);

impl Name {
    /// Create a new name, potentially sharing storage with existing names
    pub fn new(s: &str) -> Self {
        if let Some(interned) = Self::get_interned(s) {
            return interned;
        }
        Self(Arc::from(s))
    }

    /// Create from owned String
    pub fn from_string(s: String) -> Self {
        if let Some(interned) = Self::get_interned(&s) {
            return interned;
        }
        Self(Arc::from(s))
    }

    /// Get the name string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get Arc for zero-copy sharing
    pub fn arc(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }

    /// Check if this is a standard interned name (cheap pointer comparison)
    pub fn is_interned(&self) -> bool {
        COMMON_NAMES
            .iter()
            .any(|(_, arc)| Arc::ptr_eq(&self.0, arc))
    }

    /// Try to get a pre-interned common name
    fn get_interned(s: &str) -> Option<Self> {
        COMMON_NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, arc)| Self(Arc::clone(arc)))
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        // Fast path: pointer equality for interned names
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.0.as_ref() == other.0.as_ref()
    }
}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_ref().hash(state);
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

// ============================================================================
// Pre-interned Common PDF Names
// ============================================================================

use std::sync::LazyLock;

/// Common PDF names pre-interned for fast comparison
static COMMON_NAMES: LazyLock<Vec<(&'static str, Arc<str>)>> = LazyLock::new(|| {
    vec![
        // Document structure (most common)
        ("Type", Arc::from("Type")),
        ("Subtype", Arc::from("Subtype")),
        ("Length", Arc::from("Length")),
        ("Filter", Arc::from("Filter")),
        ("DecodeParms", Arc::from("DecodeParms")),
        ("Parent", Arc::from("Parent")),
        ("Kids", Arc::from("Kids")),
        ("Count", Arc::from("Count")),
        // Page structure
        ("Catalog", Arc::from("Catalog")),
        ("Pages", Arc::from("Pages")),
        ("Page", Arc::from("Page")),
        ("Resources", Arc::from("Resources")),
        ("Contents", Arc::from("Contents")),
        // Fonts
        ("Font", Arc::from("Font")),
        ("BaseFont", Arc::from("BaseFont")),
        ("FontDescriptor", Arc::from("FontDescriptor")),
        ("FontFile2", Arc::from("FontFile2")),
        ("FontFile3", Arc::from("FontFile3")),
        ("DescendantFonts", Arc::from("DescendantFonts")),
        ("Encoding", Arc::from("Encoding")),
        ("ToUnicode", Arc::from("ToUnicode")),
        // Filters
        ("FlateDecode", Arc::from("FlateDecode")),
        ("ASCII85Decode", Arc::from("ASCII85Decode")),
        ("ASCIIHexDecode", Arc::from("ASCIIHexDecode")),
        ("LZWDecode", Arc::from("LZWDecode")),
        ("RunLengthDecode", Arc::from("RunLengthDecode")),
        // Decode parameters
        ("Predictor", Arc::from("Predictor")),
        ("Columns", Arc::from("Columns")),
        ("Colors", Arc::from("Colors")),
        ("BitsPerComponent", Arc::from("BitsPerComponent")),
        ("EarlyChange", Arc::from("EarlyChange")),
        // Trailer / xref
        ("Root", Arc::from("Root")),
        ("Info", Arc::from("Info")),
        ("Size", Arc::from("Size")),
        ("Prev", Arc::from("Prev")),
        ("Index", Arc::from("Index")),
        ("W", Arc::from("W")),
        ("XRef", Arc::from("XRef")),
        ("XRefStm", Arc::from("XRefStm")),
        // Object streams
        ("ObjStm", Arc::from("ObjStm")),
        ("N", Arc::from("N")),
        ("First", Arc::from("First")),
    ]
});

// ============================================================================
// Strings, references, containers
// ============================================================================

/// How a string was written in the file; preserved for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// `(literal)` syntax
    Literal,
    /// `<hex>` syntax
    Hex,
}

/// A PDF string: raw bytes plus the syntax it came from
#[derive(Debug, Clone)]
pub struct PdfString {
    data: Vec<u8>,
    format: StringFormat,
}

impl PdfString {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            format: StringFormat::Literal,
        }
    }

    pub fn hex(data: Vec<u8>) -> Self {
        Self {
            data,
            format: StringFormat::Hex,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn format(&self) -> StringFormat {
        self.format
    }
}

impl PartialEq for PdfString {
    fn eq(&self, other: &Self) -> bool {
        // Syntax is a serialization detail, not part of the value.
        self.data == other.data
    }
}

/// Indirect object reference: object number plus generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    pub num: u32,
    pub generation: u16,
}

impl ObjRef {
    pub fn new(num: u32, generation: u16) -> Self {
        Self { num, generation }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.generation)
    }
}

/// Dictionary preserving insertion order.
///
/// Lookup ignores order; serialization must not, so entries keep the order
/// they were inserted in. Replacing a value keeps its original slot.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Vec<(Name, Object)>,
}

impl Dict {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace; replacement keeps the entry's position
    pub fn insert(&mut self, key: Name, value: Object) -> Option<Object> {
        for (k, v) in &mut self.entries {
            if *k == key {
                return Some(std::mem::replace(v, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        let idx = self.entries.iter().position(|(k, _)| k.as_str() == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Convenience: integer value for a key
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_int)
    }

    /// Convenience: name value for a key
    pub fn get_name(&self, key: &str) -> Option<&Name> {
        self.get(key).and_then(Object::as_name)
    }
}

impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        // Structural equality: same keys mapped to equal values, any order.
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k.as_str()) == Some(v))
    }
}

impl FromIterator<(Name, Object)> for Dict {
    fn from_iter<I: IntoIterator<Item = (Name, Object)>>(iter: I) -> Self {
        let mut dict = Dict::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

/// A stream object: dictionary header plus raw (still encoded) payload
#[derive(Debug, Clone, PartialEq)]
pub struct StreamObject {
    pub dict: Dict,
    pub data: Vec<u8>,
}

pub type Array = Vec<Object>;

/// The PDF data object sum type
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Object {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    String(PdfString),
    Name(Name),
    Array(Array),
    Dict(Dict),
    Stream(StreamObject),
    Ref(ObjRef),
}

impl Object {
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }
    pub fn as_bool(&self) -> Option<bool> {
        if let Object::Bool(b) = self { Some(*b) } else { None }
    }
    pub fn as_int(&self) -> Option<i64> {
        if let Object::Int(i) = self { Some(*i) } else { None }
    }
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            Object::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
    pub fn as_name(&self) -> Option<&Name> {
        if let Object::Name(n) = self { Some(n) } else { None }
    }
    pub fn as_string(&self) -> Option<&PdfString> {
        if let Object::String(s) = self { Some(s) } else { None }
    }
    pub fn as_array(&self) -> Option<&Array> {
        if let Object::Array(a) = self { Some(a) } else { None }
    }
    pub fn as_dict(&self) -> Option<&Dict> {
        if let Object::Dict(d) = self { Some(d) } else { None }
    }
    pub fn as_stream(&self) -> Option<&StreamObject> {
        if let Object::Stream(s) = self { Some(s) } else { None }
    }
    pub fn as_ref_obj(&self) -> Option<ObjRef> {
        if let Object::Ref(r) = self { Some(*r) } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_interning() {
        let n1 = Name::new("Type");
        let n2 = Name::new("Type");
        assert!(n1.is_interned());
        assert!(n2.is_interned());
        assert!(Arc::ptr_eq(&n1.arc(), &n2.arc()));
    }

    #[test]
    fn test_name_non_interned() {
        let n1 = Name::new("UncommonName12345");
        let n2 = Name::new("UncommonName12345");
        assert!(!n1.is_interned());
        assert_eq!(n1, n2);
    }

    #[test]
    fn test_name_display() {
        assert_eq!(format!("{}", Name::new("Pages")), "/Pages");
    }

    #[test]
    fn test_pdf_string_formats() {
        let lit = PdfString::new(b"Hello".to_vec());
        let hex = PdfString::hex(b"Hello".to_vec());
        assert_eq!(lit.format(), StringFormat::Literal);
        assert_eq!(hex.format(), StringFormat::Hex);
        // Equality ignores the serialization format.
        assert_eq!(lit, hex);
        assert_eq!(lit.as_str(), Some("Hello"));
    }

    #[test]
    fn test_pdf_string_invalid_utf8() {
        let s = PdfString::new(vec![0xFF, 0xFE]);
        assert_eq!(s.as_str(), None);
        assert_eq!(s.as_bytes(), &[0xFF, 0xFE]);
    }

    #[test]
    fn test_obj_ref() {
        let r1 = ObjRef::new(5, 0);
        let r2 = ObjRef::new(5, 0);
        let r3 = ObjRef::new(5, 1);
        assert_eq!(r1, r2);
        assert_ne!(r1, r3);
        assert_eq!(format!("{}", r1), "5 0 R");
    }

    #[test]
    fn test_dict_preserves_insertion_order() {
        let mut dict = Dict::new();
        dict.insert(Name::new("Zebra"), Object::Int(1));
        dict.insert(Name::new("Alpha"), Object::Int(2));
        dict.insert(Name::new("Mid"), Object::Int(3));

        let keys: Vec<&str> = dict.keys().map(Name::as_str).collect();
        assert_eq!(keys, vec!["Zebra", "Alpha", "Mid"]);
    }

    #[test]
    fn test_dict_replace_keeps_position() {
        let mut dict = Dict::new();
        dict.insert(Name::new("A"), Object::Int(1));
        dict.insert(Name::new("B"), Object::Int(2));
        let old = dict.insert(Name::new("A"), Object::Int(9));

        assert_eq!(old, Some(Object::Int(1)));
        let keys: Vec<&str> = dict.keys().map(Name::as_str).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(dict.get_int("A"), Some(9));
    }

    #[test]
    fn test_dict_equality_ignores_order() {
        let mut a = Dict::new();
        a.insert(Name::new("X"), Object::Int(1));
        a.insert(Name::new("Y"), Object::Int(2));

        let mut b = Dict::new();
        b.insert(Name::new("Y"), Object::Int(2));
        b.insert(Name::new("X"), Object::Int(1));

        assert_eq!(a, b);

        b.insert(Name::new("X"), Object::Int(3));
        assert_ne!(a, b);
    }

    #[test]
    fn test_dict_remove() {
        let mut dict = Dict::new();
        dict.insert(Name::new("A"), Object::Bool(true));
        assert_eq!(dict.remove("A"), Some(Object::Bool(true)));
        assert_eq!(dict.remove("A"), None);
        assert!(dict.is_empty());
    }

    #[test]
    fn test_object_accessors() {
        assert!(Object::Null.is_null());
        assert_eq!(Object::Bool(true).as_bool(), Some(true));
        assert_eq!(Object::Int(42).as_int(), Some(42));
        assert_eq!(Object::Int(42).as_real(), Some(42.0));
        assert_eq!(Object::Real(2.5).as_real(), Some(2.5));
        assert_eq!(Object::Real(2.5).as_int(), None);
        assert_eq!(
            Object::Ref(ObjRef::new(3, 0)).as_ref_obj(),
            Some(ObjRef::new(3, 0))
        );
    }

    #[test]
    fn test_object_stream_variant() {
        let mut dict = Dict::new();
        dict.insert(Name::new("Length"), Object::Int(5));
        let obj = Object::Stream(StreamObject {
            dict,
            data: b"Hello".to_vec(),
        });

        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.data, b"Hello");
        assert_eq!(stream.dict.get_int("Length"), Some(5));
    }

    #[test]
    fn test_complex_nested_structure() {
        let mut inner = Dict::new();
        inner.insert(
            Name::new("Key"),
            Object::String(PdfString::new(b"Value".to_vec())),
        );

        let arr = vec![Object::Int(1), Object::Real(2.5), Object::Dict(inner)];
        let mut outer = Dict::new();
        outer.insert(Name::new("Array"), Object::Array(arr));

        let got = outer.get("Array").unwrap().as_array().unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].as_int(), Some(1));
    }
}
