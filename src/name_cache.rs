//! Process-wide interned name cache (spec §3 "Name Cache", §4.B, §9).
//!
//! All name equality in the core is pointer/id equality on the records kept
//! here; the cache is a module-level singleton, mutated only on the
//! interpretation thread (spec §5). Short names (<=255 bytes) and long names
//! (<=65535 bytes) are logically distinct sets, mirroring the source's
//! separate hash tables, even though both land in the same `NameId` space
//! here -- the distinction only matters for the length-based limit checks
//! performed at intern time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{core_err, CoreErrorKind, Result};

/// Maximum byte length of a "short" name. Names at or under this length are
/// eligible for the fast single-entry lookup path used by
/// `fast_extract_hash_name`.
pub const MAX_SHORT_NAME_LEN: usize = 255;
/// Hard ceiling on interned name length (PDF name objects are bounded in
/// practice; this mirrors the "long name" set's own limit).
pub const MAX_LONG_NAME_LEN: usize = 65535;

/// Opaque handle to an interned name. Two `NameId`s compare equal iff they
/// name the same interned bytes -- this *is* pointer equality, just
/// expressed as an integer index instead of a raw pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameId(u32);

/// The fast one-entry cache a `NameRecord` keeps: "the last dictionary value
/// found under this name", used by `fast_extract_hash_name`. Stamped with
/// the save level it was captured at so a restore can tell it's stale
/// without having to walk every name.
#[derive(Debug, Clone, Default)]
struct FastPath {
    /// Identity of the dictionary this fast pointer was captured against.
    dict_id: u64,
    save_level: u32,
    slot: Option<usize>,
}

struct NameRecord {
    bytes: Rc<[u8]>,
    fast: FastPath,
}

#[derive(Default)]
struct NameCacheInner {
    by_bytes: HashMap<Rc<[u8]>, NameId>,
    records: Vec<NameRecord>,
}

/// The interned name pool. In a multithreaded port this would need a mutex;
/// the core itself is single-threaded (spec §5), so a `RefCell` behind a
/// thread-local is enough and avoids locking overhead on every dictionary
/// lookup.
#[derive(Default)]
pub struct NameCache {
    inner: RefCell<NameCacheInner>,
}

thread_local! {
    static GLOBAL_NAME_CACHE: NameCache = NameCache::default();
}

impl NameCache {
    /// Intern `bytes`, returning the `NameId` for it (creating a fresh
    /// record if this is the first time these bytes have been seen).
    pub fn intern(&self, bytes: &[u8]) -> Result<NameId> {
        if bytes.len() > MAX_LONG_NAME_LEN {
            return core_err(CoreErrorKind::LimitCheck, "intern: name exceeds MAX_LONG_NAME_LEN");
        }
        let mut inner = self.inner.borrow_mut();
        if let Some(id) = inner.by_bytes.get(bytes) {
            return Ok(*id);
        }
        let rc: Rc<[u8]> = Rc::from(bytes);
        let id = NameId(inner.records.len() as u32);
        inner.records.push(NameRecord {
            bytes: rc.clone(),
            fast: FastPath::default(),
        });
        inner.by_bytes.insert(rc, id);
        Ok(id)
    }

    pub fn bytes(&self, id: NameId) -> Rc<[u8]> {
        self.inner.borrow().records[id.0 as usize].bytes.clone()
    }

    pub fn is_short(&self, id: NameId) -> bool {
        self.inner.borrow().records[id.0 as usize].bytes.len() <= MAX_SHORT_NAME_LEN
    }

    /// Record "value at `slot` in dictionary `dict_id` was last found under
    /// this name", for use by `fast_extract_hash_name`.
    pub fn set_fast_path(&self, id: NameId, dict_id: u64, save_level: u32, slot: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.records[id.0 as usize].fast = FastPath {
            dict_id,
            save_level,
            slot: Some(slot),
        };
    }

    /// Fetch the fast pointer if it's still valid for `dict_id` at
    /// `save_level`. The pointer is purely advisory: callers fall back to
    /// the slow path on `None` and the result is always correct either way.
    pub fn fast_path(&self, id: NameId, dict_id: u64, save_level: u32) -> Option<usize> {
        let inner = self.inner.borrow();
        let fast = &inner.records[id.0 as usize].fast;
        if fast.dict_id == dict_id && fast.save_level == save_level {
            fast.slot
        } else {
            None
        }
    }

    /// Invalidate the fast pointer for `id` -- called whenever a removal or
    /// free touches the (dict, name) pair the pointer referred to.
    pub fn invalidate_fast_path(&self, id: NameId) {
        let mut inner = self.inner.borrow_mut();
        inner.records[id.0 as usize].fast = FastPath::default();
    }

    /// Drop every fast-path pointer stamped at or above `save_level`. Called
    /// on restore (spec §9 "Save/restore coupling"); this is the name
    /// cache's `purge_ncache` entry point.
    pub fn purge_ncache(&self, save_level: u32) {
        let mut inner = self.inner.borrow_mut();
        for rec in inner.records.iter_mut() {
            if rec.fast.save_level >= save_level {
                rec.fast = FastPath::default();
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.borrow().records.len()
    }
}

/// Access the process-wide interned name cache.
pub fn with_name_cache<R>(f: impl FnOnce(&NameCache) -> R) -> R {
    GLOBAL_NAME_CACHE.with(f)
}

/// Convenience wrapper: intern `s` against the global cache.
pub fn intern(bytes: &[u8]) -> Result<NameId> {
    with_name_cache(|c| c.intern(bytes))
}
