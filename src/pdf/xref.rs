//! Cross-reference table - indirect object location tracking
//!
//! Maps object numbers to file offsets (or object-stream slots). Sections
//! from incremental updates merge newest-first: the first entry seen for an
//! object number wins, later (older) sections cannot override it.

use std::collections::HashMap;

/// Generation number marking a slot as permanently retired.
///
/// Matches the PDF convention for object 0 and modern incremental-update
/// practice: freed numbers are not recycled within a session.
pub const GEN_UNREUSABLE: u16 = u16::MAX;

/// Where an object lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefKind {
    /// Free slot
    Free,
    /// Byte offset of `num gen obj` in the file
    Offset(u64),
    /// Compressed in an object stream: container object number + index
    InStream { container: u32, index: u16 },
}

/// Cross-reference table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefEntry {
    pub num: u32,
    pub generation: u16,
    pub kind: XrefKind,
}

impl XrefEntry {
    /// Create a free entry
    pub fn free(num: u32, generation: u16) -> Self {
        Self {
            num,
            generation,
            kind: XrefKind::Free,
        }
    }

    /// Create an in-use entry at a byte offset
    pub fn in_use(num: u32, generation: u16, offset: u64) -> Self {
        Self {
            num,
            generation,
            kind: XrefKind::Offset(offset),
        }
    }

    /// Create an entry for an object inside an object stream
    pub fn in_stream(num: u32, container: u32, index: u16) -> Self {
        Self {
            num,
            // Compressed objects always have generation 0
            generation: 0,
            kind: XrefKind::InStream { container, index },
        }
    }

    pub fn is_free(&self) -> bool {
        self.kind == XrefKind::Free
    }

    pub fn is_in_use(&self) -> bool {
        !self.is_free()
    }

    pub fn offset(&self) -> Option<u64> {
        match self.kind {
            XrefKind::Offset(o) => Some(o),
            _ => None,
        }
    }
}

/// Cross-reference table
#[derive(Debug, Default)]
pub struct XrefTable {
    lookup: HashMap<u32, XrefEntry>,
    max_num: u32,
}

impl XrefTable {
    pub fn new() -> Self {
        Self {
            lookup: HashMap::new(),
            max_num: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lookup: HashMap::with_capacity(capacity),
            max_num: 0,
        }
    }

    /// Insert an entry unconditionally (editing path)
    pub fn set(&mut self, entry: XrefEntry) {
        self.max_num = self.max_num.max(entry.num);
        self.lookup.insert(entry.num, entry);
    }

    /// Insert only if the object number is unseen.
    ///
    /// Loading walks xref sections newest-first, so the first section to
    /// mention an object owns it.
    pub fn insert_if_absent(&mut self, entry: XrefEntry) {
        self.max_num = self.max_num.max(entry.num);
        self.lookup.entry(entry.num).or_insert(entry);
    }

    pub fn get(&self, num: u32) -> Option<&XrefEntry> {
        self.lookup.get(&num)
    }

    pub fn contains(&self, num: u32) -> bool {
        self.lookup.contains_key(&num)
    }

    /// Mark an object free with the unreusable generation sentinel.
    ///
    /// Unknown numbers and already-free entries are left as they are, so the
    /// operation is idempotent.
    pub fn retire(&mut self, num: u32) {
        if let Some(entry) = self.lookup.get_mut(&num) {
            entry.kind = XrefKind::Free;
            entry.generation = GEN_UNREUSABLE;
        } else if num <= self.max_num {
            self.lookup.insert(num, XrefEntry::free(num, GEN_UNREUSABLE));
        }
    }

    /// Allocate the next unused object number.
    ///
    /// With `reuse_free` (pre-xref-stream compatibility), a free slot whose
    /// generation has not been retired is recycled first.
    pub fn allocate(&mut self, reuse_free: bool) -> u32 {
        if reuse_free {
            let mut reusable: Vec<u32> = self
                .lookup
                .values()
                .filter(|e| e.is_free() && e.num != 0 && e.generation < GEN_UNREUSABLE)
                .map(|e| e.num)
                .collect();
            reusable.sort_unstable();
            if let Some(num) = reusable.first().copied() {
                return num;
            }
        }
        self.max_num += 1;
        self.max_num
    }

    pub fn max_num(&self) -> u32 {
        self.max_num
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// One entry per object number in `[0, max]`, synthesizing free entries
    /// for gaps. The PDF spec requires the table to be dense; damaged files
    /// are repaired by treating missing numbers as free.
    pub fn entries(&self) -> impl Iterator<Item = XrefEntry> + '_ {
        (0..=self.max_num).map(move |num| {
            self.lookup
                .get(&num)
                .copied()
                .unwrap_or_else(|| XrefEntry::free(num, GEN_UNREUSABLE))
        })
    }

    pub fn in_use_count(&self) -> usize {
        self.lookup.values().filter(|e| e.is_in_use()).count()
    }

    pub fn free_count(&self) -> usize {
        self.lookup.values().filter(|e| e.is_free()).count()
    }
}
