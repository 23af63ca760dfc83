//! Dictionary storage (spec §3 "Dictionary", §4.B).
//!
//! The source represents a dictionary as a fixed-capacity open-addressed
//! hash block with an optional chained extension, grown by linking a new,
//! larger block when an insertion would overflow. `indexmap::IndexMap`
//! gives the same externally-observable behavior -- insertion order
//! preserved, O(1) amortized insert/lookup/remove, grows by reallocating a
//! bigger table -- without hand-rolling open addressing; `lopdf` (the
//! parser this core hosts) already leans on `indexmap` for exactly this
//! reason, so the dependency is not a new one for the dependency graph as a
//! whole, only for this crate directly.

use indexmap::IndexMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{core_err, CoreErrorKind, Result};
use crate::name_cache::{with_name_cache, NameId};
use crate::value::{Access, Object, Value};

/// Hard ceiling on a literal dictionary's entry count (spec's `MAXPSDICT`).
pub const MAX_DICT_CAPACITY: usize = 65_535;

bitflags::bitflags! {
    /// Flags accepted by `insert_hash` (spec §4.B).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InsertFlags: u8 {
        /// The key must be a name; otherwise fails with `typecheck`.
        const NAMED = 0b001;
        /// Bypass the writability check on the dictionary itself.
        const DICT_ACCESS = 0b010;
        /// Bypass the readability check on the key.
        const KEY_ACCESS = 0b100;
    }
}

static NEXT_DICT_ID: AtomicU64 = AtomicU64::new(1);

/// A name-keyed mapping, order-preserving, with a fast single-entry lookup
/// cache cooperating with the name cache's `fast_extract_hash_name`.
#[derive(Debug, Clone)]
pub struct Dictionary {
    id: u64,
    entries: IndexMap<NameId, Object>,
    access: Access,
    /// Save level this dictionary's physical block was allocated at --
    /// used only to stamp fast-path pointers so a restore can invalidate
    /// them (spec §9 "Save/restore coupling" notes the exact COW mechanics
    /// are out of scope; this crate exposes the stamp the hooks need).
    pub save_level: u32,
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::with_capacity(0, 0).expect("capacity 0 is always in range")
    }
}

impl Dictionary {
    /// `create_dict` (spec §4.A): range-checks `capacity`, allocates the
    /// backing table, and tags it with `save_level`.
    pub fn with_capacity(capacity: usize, save_level: u32) -> Result<Self> {
        if capacity > MAX_DICT_CAPACITY {
            return core_err(CoreErrorKind::RangeCheck, "create_dict: capacity exceeds MAXPSDICT");
        }
        Ok(Dictionary {
            id: NEXT_DICT_ID.fetch_add(1, Ordering::Relaxed),
            entries: IndexMap::with_capacity(capacity),
            access: Access::default(),
            save_level,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `insert_hash`: place `key`/`value` into the dict. The block is
    /// extended automatically by `IndexMap`'s own growth policy, which is
    /// the idiomatic stand-in for the source's "allocate a new, larger
    /// block and link the old one".
    pub fn insert_hash(&mut self, key: NameId, value: Object, flags: InsertFlags) -> Result<Option<Object>> {
        if !flags.contains(InsertFlags::DICT_ACCESS) && !self.access.contains(Access::WRITABLE) {
            return core_err(CoreErrorKind::InvalidAccess, "insert_hash: dictionary is not writable");
        }
        with_name_cache(|c| c.invalidate_fast_path(key));
        Ok(self.entries.insert(key, value))
    }

    /// `extract_hash`: general extract, honoring access permissions unless
    /// the caller passes `KEY_ACCESS`.
    pub fn extract_hash(&self, key: NameId, flags: InsertFlags) -> Result<Option<&Object>> {
        if !flags.contains(InsertFlags::KEY_ACCESS) && !self.access.contains(Access::READABLE) {
            return core_err(CoreErrorKind::InvalidAccess, "extract_hash: dictionary is not readable");
        }
        Ok(self.entries.get(&key))
    }

    /// `fast_extract_hash_name`: skips the permission check and consults
    /// the name's one-entry fast pointer before falling back to the slow
    /// path. Always correct even when the pointer is stale.
    pub fn fast_extract_hash_name(&self, key: NameId) -> Option<&Object> {
        if let Some(idx) = with_name_cache(|c| c.fast_path(key, self.id, self.save_level)) {
            if let Some((k, v)) = self.entries.get_index(idx) {
                if *k == key {
                    return Some(v);
                }
            }
        }
        let found = self.entries.get_full(&key);
        if let Some((idx, _, _)) = found {
            with_name_cache(|c| c.set_fast_path(key, self.id, self.save_level, idx));
        }
        found.map(|(_, _, v)| v)
    }

    /// `remove_hash`: mark the slot empty and invalidate the name's fast
    /// pointer. `IndexMap::shift_remove` preserves the contract that
    /// remaining entries keep their relative order, matching "iteration
    /// visits present slots only".
    pub fn remove_hash(&mut self, key: NameId, check_access: bool) -> Result<Option<Object>> {
        if check_access && !self.access.contains(Access::WRITABLE) {
            return core_err(CoreErrorKind::InvalidAccess, "remove_hash: dictionary is not writable");
        }
        with_name_cache(|c| c.invalidate_fast_path(key));
        Ok(self.entries.shift_remove(&key))
    }

    /// `walk_dictionary`: call `f(key, value)` for each live slot; an early
    /// `false` return stops the walk and is itself returned.
    pub fn walk<F: FnMut(NameId, &Object) -> bool>(&self, mut f: F) -> bool {
        for (k, v) in self.entries.iter() {
            if !f(*k, v) {
                return false;
            }
        }
        true
    }

    pub fn walk_mut<F: FnMut(NameId, &mut Object) -> bool>(&mut self, mut f: F) -> bool {
        for (k, v) in self.entries.iter_mut() {
            if !f(*k, v) {
                return false;
            }
        }
        true
    }

    /// `walk_dictionary_sorted`: same contract as `walk`, after sorting by
    /// interned name bytes. Caller guarantees no mutation during the walk.
    pub fn walk_sorted<F: FnMut(NameId, &Object) -> bool>(&self, mut f: F) -> bool {
        let mut keys: Vec<NameId> = self.entries.keys().copied().collect();
        keys.sort_by_key(|k| with_name_cache(|c| c.bytes(*k)));
        for k in keys {
            if let Some(v) = self.entries.get(&k) {
                if !f(k, v) {
                    return false;
                }
            }
        }
        true
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, NameId, Object> {
        self.entries.iter()
    }
}

/// Structural equality per `compare_objects` (spec §4.B): identity, access
/// bits, and save-level are not part of a dictionary's value, only its
/// entries are.
impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

/// Build the "6-real identity matrix array" auxiliary constructor (spec
/// §4.A). Matrices are otherwise opaque to the core; this is the one
/// compound-value shape the core is asked to construct directly.
pub fn identity_matrix(save_level: u32) -> Vec<Object> {
    [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
        .into_iter()
        .map(|n| Object::new(Value::Real(n), save_level))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name_cache::intern;

    #[test]
    fn insert_then_extract_round_trips() {
        let mut d = Dictionary::with_capacity(4, 0).unwrap();
        let k = intern(b"Type").unwrap();
        d.insert_hash(k, Object::literal(Value::Name(intern(b"Page").unwrap())), InsertFlags::empty())
            .unwrap();
        let got = d.extract_hash(k, InsertFlags::empty()).unwrap().unwrap();
        assert_eq!(got.value, Value::Name(intern(b"Page").unwrap()));
    }

    #[test]
    fn remove_then_extract_returns_nothing() {
        let mut d = Dictionary::with_capacity(4, 0).unwrap();
        let k = intern(b"Foo").unwrap();
        d.insert_hash(k, Object::literal(Value::Int(1)), InsertFlags::empty()).unwrap();
        d.remove_hash(k, true).unwrap();
        assert!(d.extract_hash(k, InsertFlags::empty()).unwrap().is_none());
    }

    #[test]
    fn capacity_zero_is_allowed_and_extends() {
        let mut d = Dictionary::with_capacity(0, 0).unwrap();
        assert_eq!(d.len(), 0);
        for i in 0..50 {
            let k = intern(format!("K{i}").as_bytes()).unwrap();
            d.insert_hash(k, Object::literal(Value::Int(i)), InsertFlags::empty()).unwrap();
        }
        assert_eq!(d.len(), 50);
    }

    #[test]
    fn capacity_over_limit_fails() {
        assert!(Dictionary::with_capacity(MAX_DICT_CAPACITY + 1, 0).is_err());
    }

    #[test]
    fn fast_path_is_advisory_and_correct_even_when_stale() {
        let mut d = Dictionary::with_capacity(4, 0).unwrap();
        let k = intern(b"A").unwrap();
        d.insert_hash(k, Object::literal(Value::Int(1)), InsertFlags::empty()).unwrap();
        // warm the fast path
        assert_eq!(d.fast_extract_hash_name(k).unwrap().value, Value::Int(1));
        // mutate through a different path; fast pointer gets invalidated
        d.insert_hash(k, Object::literal(Value::Int(2)), InsertFlags::empty()).unwrap();
        assert_eq!(d.fast_extract_hash_name(k).unwrap().value, Value::Int(2));
    }

    #[test]
    fn walk_early_exit_propagates() {
        let mut d = Dictionary::with_capacity(4, 0).unwrap();
        for i in 0..5 {
            let k = intern(format!("K{i}").as_bytes()).unwrap();
            d.insert_hash(k, Object::literal(Value::Int(i)), InsertFlags::empty()).unwrap();
        }
        let mut seen = 0;
        let completed = d.walk(|_, _| {
            seen += 1;
            seen < 3
        });
        assert!(!completed);
        assert_eq!(seen, 3);
    }
}
