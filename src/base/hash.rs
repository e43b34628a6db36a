//! HashList - immutable hashed sequences
//!
//! Glyph-index sequences serve as both keys and values in the GSUB feature
//! maps, so they are hashed constantly. A `HashList` stores the sequence
//! immutably (single element inline, no heap allocation) and memoizes its
//! hash on first use; the memo stays valid because the sequence can never be
//! mutated in place.

use smallvec::SmallVec;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// An immutable sequence with a memoized hash.
#[derive(Debug, Clone, Default)]
pub struct HashList<T: Copy + Eq + Hash> {
    items: SmallVec<[T; 1]>,
    cached_hash: OnceLock<u64>,
}

impl<T: Copy + Eq + Hash> HashList<T> {
    /// Create a single-element list (stored inline)
    pub fn single(item: T) -> Self {
        Self {
            items: SmallVec::from_buf([item]),
            cached_hash: OnceLock::new(),
        }
    }

    /// Create a list from a slice
    pub fn from_slice(items: &[T]) -> Self {
        Self {
            items: SmallVec::from_slice(items),
            cached_hash: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.items.get(index).copied()
    }

    pub fn first(&self) -> Option<T> {
        self.items.first().copied()
    }

    pub fn last(&self) -> Option<T> {
        self.items.last().copied()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.items.iter().copied()
    }

    /// Whether this sequence is a prefix of `other`
    pub fn is_prefix_of(&self, other: &[T]) -> bool {
        other.len() >= self.items.len() && other[..self.items.len()] == *self.items
    }

    fn memoized_hash(&self) -> u64 {
        *self.cached_hash.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            self.items.as_slice().hash(&mut hasher);
            hasher.finish()
        })
    }
}

impl<T: Copy + Eq + Hash> PartialEq for HashList<T> {
    fn eq(&self, other: &Self) -> bool {
        // Computed hashes disagree only for unequal sequences.
        if let (Some(a), Some(b)) = (self.cached_hash.get(), other.cached_hash.get()) {
            if a != b {
                return false;
            }
        }
        self.items == other.items
    }
}

impl<T: Copy + Eq + Hash> Eq for HashList<T> {}

impl<T: Copy + Eq + Hash> Hash for HashList<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.memoized_hash());
    }
}

impl<T: Copy + Eq + Hash> From<Vec<T>> for HashList<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items: SmallVec::from_vec(items),
            cached_hash: OnceLock::new(),
        }
    }
}
