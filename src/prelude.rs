//! Shared imports and collection aliases.
//!
//! Hash-based collections use `FxHasher` throughout; ordered maps are
//! `IndexMap`s keyed the same way so iteration follows insertion order.

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

pub use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    fmt,
    rc::{Rc, Weak},
};

// ═══════════════════════════════════════════════════════════════════════════════
// Hash maps
// ═══════════════════════════════════════════════════════════════════════════════

pub use rustc_hash::{FxHashMap, FxHashSet};

pub type IndexMap<K, V> =
    indexmap::IndexMap<K, V, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

/// Create an empty IndexMap
#[inline]
pub fn index_map_new<K, V>() -> IndexMap<K, V>
where
    K: std::hash::Hash + Eq,
{
    indexmap::IndexMap::with_hasher(Default::default())
}
