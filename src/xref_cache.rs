//! The xref cache's storage and lifetime-tagging policy (spec §3 "Xref
//! Cache Entry", §4.C). This module owns the bucket array and the
//! `LastAccessId` state machine; it does not know how to *load* an object
//! on a miss (that needs a parser) or how to *close* a stream's filter
//! chain (that needs the stream subsystem) -- both of those are wired in by
//! `ExecutionContext` in `src/context.rs`, which is the only thing that
//! holds both collaborators at once.

use crate::name_cache::{intern, NameId};
use crate::value::{Object, Value};

/// Number of hash buckets backing the cache (spec's `XREF_CACHE_SIZE`).
pub const XREF_CACHE_SIZE: usize = 256;

/// The most-negative sentinel: "lives the whole document".
pub const PERMANENT: i64 = i64::MIN;

/// The lifetime tag on a cache entry (spec §3, §4.C state machine).
///
/// - non-negative: a page id; the entry survives as long as it's been used
///   on a recent page.
/// - negative (but not `PERMANENT`): `-depth`; the entry survives as long
///   as the current structural walk is at least that deep.
/// - `PERMANENT`: survives the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LastAccessId(pub i64);

impl LastAccessId {
    pub const fn page(id: i32) -> Self {
        LastAccessId(id as i64)
    }

    pub const fn depth(d: i32) -> Self {
        LastAccessId(-(d as i64))
    }

    pub const fn permanent() -> Self {
        LastAccessId(PERMANENT)
    }

    pub fn is_permanent(self) -> bool {
        self.0 == PERMANENT
    }

    pub fn is_page(self) -> bool {
        self.0 >= 0
    }

    pub fn is_depth(self) -> bool {
        self.0 < 0 && !self.is_permanent()
    }

    pub fn page_id(self) -> Option<i32> {
        self.is_page().then_some(self.0 as i32)
    }

    /// `-lastAccessId`, the walk depth this entry is protected to.
    pub fn depth_value(self) -> Option<i32> {
        self.is_depth().then_some((-self.0) as i32)
    }

    /// lastAccessId only ever becomes *more restrictive* (smaller, in
    /// signed terms) -- this is the comparison `lookup_xref`/the recursive
    /// assignment use to decide whether an update is allowed.
    pub fn more_restrictive_than(self, other: LastAccessId) -> bool {
        self.0 < other.0
    }
}

/// A single resolved indirect object held in the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub objnum: i32,
    pub gen: u16,
    pub value: Object,
    pub last_access: LastAccessId,
    /// True if this entry holds only the stream's dictionary (the
    /// "cheap dict-only load" half of the two-phase pattern in spec §4.C
    /// step 3).
    pub stream_dict_only: bool,
    pub flushable: bool,
}

#[derive(Default)]
struct Bucket {
    entries: Vec<CacheEntry>,
}

impl Bucket {
    fn move_to_front(&mut self, idx: usize) {
        if idx != 0 {
            let e = self.entries.remove(idx);
            self.entries.insert(0, e);
        }
    }
}

/// The cache itself: `XREF_CACHE_SIZE` singly-linked (here, `Vec`-backed)
/// buckets indexed by `objnum & (XREF_CACHE_SIZE - 1)`.
pub struct XrefCache {
    buckets: Vec<Bucket>,
    /// Cached result of `measure_sweepable_xrefs`; recomputed once per
    /// page (spec §4.C low-memory handler).
    sweepable_size_cache: Option<usize>,
}

fn bucket_index(objnum: i32) -> usize {
    (objnum as u32 as usize) & (XREF_CACHE_SIZE - 1)
}

fn names_excluded_from_recursion() -> [NameId; 4] {
    [
        intern(b"DataSource").unwrap(),
        intern(b"Resources").unwrap(),
        intern(b"HqnCacheSlot").unwrap(),
        intern(b"Thresholds").unwrap(),
    ]
}

impl XrefCache {
    pub fn new() -> Self {
        let mut buckets = Vec::with_capacity(XREF_CACHE_SIZE);
        buckets.resize_with(XREF_CACHE_SIZE, Bucket::default);
        XrefCache {
            buckets,
            sweepable_size_cache: None,
        }
    }

    /// Find an entry for `(objnum, gen)` matching `stream_dict_only`,
    /// moving it to the front of its bucket on hit (LRU discipline, spec
    /// §4.C step 2).
    pub fn find_mut(&mut self, objnum: i32, gen: u16, stream_dict_only: bool) -> Option<&mut CacheEntry> {
        let bucket = &mut self.buckets[bucket_index(objnum)];
        let idx = bucket
            .entries
            .iter()
            .position(|e| e.objnum == objnum && e.gen == gen && e.stream_dict_only == stream_dict_only)?;
        bucket.move_to_front(idx);
        bucket.entries.get_mut(0)
    }

    pub fn find(&self, objnum: i32, gen: u16, stream_dict_only: bool) -> Option<&CacheEntry> {
        self.buckets[bucket_index(objnum)]
            .entries
            .iter()
            .find(|e| e.objnum == objnum && e.gen == gen && e.stream_dict_only == stream_dict_only)
    }

    /// Find any entry for `objnum` regardless of generation/stream-dict
    /// flag -- used by the `HqnCacheSlot`-keyed explicit operations.
    pub fn find_by_objnum_mut(&mut self, objnum: i32) -> Option<&mut CacheEntry> {
        self.buckets[bucket_index(objnum)].entries.iter_mut().find(|e| e.objnum == objnum)
    }

    /// Remove and return the entry matching `(objnum, gen, stream_dict_only)`
    /// (spec §4.C step 3: "the existing entry is freed ... a fresh load
    /// proceeds").
    pub fn remove(&mut self, objnum: i32, gen: u16, stream_dict_only: bool) -> Option<CacheEntry> {
        let bucket = &mut self.buckets[bucket_index(objnum)];
        let idx = bucket
            .entries
            .iter()
            .position(|e| e.objnum == objnum && e.gen == gen && e.stream_dict_only == stream_dict_only)?;
        self.sweepable_size_cache = None;
        Some(bucket.entries.remove(idx))
    }

    /// Insert a freshly-loaded entry at the head of its bucket (spec §4.C
    /// step 4).
    pub fn insert(&mut self, entry: CacheEntry) {
        self.sweepable_size_cache = None;
        self.buckets[bucket_index(entry.objnum)].entries.insert(0, entry);
    }

    /// Recursively lower `objnum`'s cache entry (if present) to at most
    /// `new_id`, then recurse into its value's already-cached indirect
    /// children, skipping the blacklisted stream-dictionary keys. Mirrors
    /// `pdf_set_xref_last_access_recurse`; bounded by `max_depth` (the
    /// execution context's recursion-depth ceiling).
    pub fn set_last_access_recursive(&mut self, objnum: i32, gen: u16, new_id: LastAccessId, max_depth: u32) -> bool {
        self.set_last_access_recursive_inner(objnum, gen, new_id, max_depth, 0)
    }

    fn set_last_access_recursive_inner(
        &mut self,
        objnum: i32,
        gen: u16,
        new_id: LastAccessId,
        max_depth: u32,
        depth: u32,
    ) -> bool {
        if depth > max_depth {
            return false;
        }
        // An object can be cached dict-only, fully, or both; update whichever
        // entries exist for this objnum/gen.
        let bucket = &mut self.buckets[bucket_index(objnum)];
        let mut touched_values: Vec<Value> = Vec::new();
        let mut any_updated = false;
        for entry in bucket.entries.iter_mut().filter(|e| e.objnum == objnum && e.gen == gen) {
            // A page->page reassignment (forward or back) or any move to a
            // strictly more restrictive id is allowed, mirroring
            // `pdf_set_xref_last_access`'s `lastAccessId >= 0 || pageId <
            // lastAccessId` guard.
            let allowed = entry.last_access.is_page() || new_id.more_restrictive_than(entry.last_access);
            if allowed && entry.last_access != new_id {
                entry.last_access = new_id;
                any_updated = true;
            }
            // The walk into this entry's children always continues, whether
            // or not this entry itself changed -- ground truth recurses into
            // substructure unconditionally and only gates the update of each
            // child it finds along the way.
            touched_values.push(entry.value.value.clone());
        }
        if any_updated {
            self.sweepable_size_cache = None;
        }
        let excluded = names_excluded_from_recursion();
        for value in touched_values {
            self.recurse_into_value(&value, &excluded, new_id, max_depth, depth + 1);
        }
        any_updated
    }

    fn recurse_into_value(&mut self, value: &Value, excluded: &[NameId; 4], new_id: LastAccessId, max_depth: u32, depth: u32) {
        match value {
            Value::Reference(r) => {
                self.set_last_access_recursive_inner(r.objnum, r.gen, new_id, max_depth, depth);
            }
            Value::Array(a) | Value::LongArray(a) | Value::PackedArray(a) => {
                for obj in a {
                    self.recurse_into_value(&obj.value, excluded, new_id, max_depth, depth);
                }
            }
            Value::Dictionary(d) => {
                d.walk(|k, obj| {
                    if !excluded.contains(&k) {
                        self.recurse_into_value(&obj.value, excluded, new_id, max_depth, depth);
                    }
                    true
                });
            }
            _ => {}
        }
    }

    /// `sweep_xref(ctx, closing, depth)`'s bucket walk (the decision of
    /// *which* entries to mark flushable); the caller still has to run the
    /// deferred flush afterwards.
    pub fn mark_sweepable(&mut self, closing: bool, depth: Option<i32>, current_page_id: i32) {
        for bucket in self.buckets.iter_mut() {
            for entry in bucket.entries.iter_mut() {
                if entry.last_access.is_permanent() {
                    continue;
                }
                let should_flush = if closing {
                    true
                } else if let Some(d) = depth {
                    if d < 0 {
                        entry.last_access.is_page() && entry.last_access.page_id() != Some(current_page_id)
                    } else {
                        entry.last_access.is_depth() && entry.last_access.depth_value().unwrap() > d
                    }
                } else {
                    false
                };
                if should_flush {
                    entry.flushable = true;
                }
            }
        }
        self.sweepable_size_cache = None;
    }

    /// `sweep_xrefpage(ctx, pageId)`: mark every entry tagged with `page_id`
    /// flushable, except those the `protect` callback says to keep (spec's
    /// ICC-cache protection callback).
    pub fn mark_sweepable_for_page(&mut self, page_id: i32, mut protect: impl FnMut(i32) -> bool) {
        for bucket in self.buckets.iter_mut() {
            for entry in bucket.entries.iter_mut() {
                if entry.last_access.page_id() == Some(page_id) && !protect(entry.objnum) {
                    entry.flushable = true;
                }
            }
        }
        self.sweepable_size_cache = None;
    }

    /// `reset_xref(ctx)`: zero every non-negative lastAccessId.
    pub fn reset(&mut self) {
        for bucket in self.buckets.iter_mut() {
            for entry in bucket.entries.iter_mut() {
                if entry.last_access.is_page() {
                    entry.last_access = LastAccessId::page(0);
                }
            }
        }
        self.sweepable_size_cache = None;
    }

    /// Drain every entry currently marked flushable, handing each to `f` so
    /// the caller can run its type-specific teardown (closing filter
    /// chains for streams, just dropping everything else). Returns the
    /// number of entries removed.
    pub fn drain_flushable(&mut self, mut f: impl FnMut(CacheEntry)) -> usize {
        let mut removed = 0;
        for bucket in self.buckets.iter_mut() {
            let mut i = 0;
            while i < bucket.entries.len() {
                if bucket.entries[i].flushable {
                    let entry = bucket.entries.remove(i);
                    removed += 1;
                    f(entry);
                } else {
                    i += 1;
                }
            }
        }
        self.sweepable_size_cache = None;
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.entries.is_empty())
    }

    pub fn total_entries(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }

    /// `pdf_xrefcache_dumppage`-equivalent diagnostic (SPEC_FULL supplement):
    /// object numbers currently tagged with `page_id`.
    pub fn objnums_on_page(&self, page_id: i32) -> Vec<i32> {
        self.buckets
            .iter()
            .flat_map(|b| b.entries.iter())
            .filter(|e| e.last_access.page_id() == Some(page_id))
            .map(|e| e.objnum)
            .collect()
    }

    /// `pdf_xrefpagetotals`-equivalent diagnostic (SPEC_FULL supplement):
    /// (min_page, max_page) currently represented, or `None` if the cache
    /// has no page-tagged entries.
    pub fn page_histogram(&self) -> Option<(i32, i32)> {
        let mut min = None;
        let mut max = None;
        for entry in self.buckets.iter().flat_map(|b| b.entries.iter()) {
            if let Some(p) = entry.last_access.page_id() {
                min = Some(min.map_or(p, |m: i32| m.min(p)));
                max = Some(max.map_or(p, |m: i32| m.max(p)));
            }
        }
        min.zip(max)
    }

    /// `measure_sweepable_xrefs`: size (in entry count, a stand-in for the
    /// original's byte accounting) of cache entries eligible for
    /// `sweep_xref(ctx, false, -1)`. Cached until the next mutation.
    pub fn measure_sweepable(&mut self, current_page_id: i32) -> usize {
        if let Some(cached) = self.sweepable_size_cache {
            return cached;
        }
        let count = self
            .buckets
            .iter()
            .flat_map(|b| b.entries.iter())
            .filter(|e| e.last_access.is_page() && e.last_access.page_id() != Some(current_page_id))
            .count();
        self.sweepable_size_cache = Some(count);
        count
    }

    /// `xref_explicit_purge`: mark a single entry (by objnum, any
    /// generation/dict-only variant) flushable.
    pub fn explicit_purge(&mut self, objnum: i32) {
        for entry in self.buckets[bucket_index(objnum)].entries.iter_mut().filter(|e| e.objnum == objnum) {
            entry.flushable = true;
        }
    }

    /// `xref_explicit_access`: promote (never demote) an entry's lifetime,
    /// cascading into whatever it references. Mirrors `pdf_xrefexplicitaccess`
    /// calling through to `pdf_set_xref_last_access`, not just the bare
    /// assignment it used to perform -- promoting a stream no longer left the
    /// objects it points at exposed to the next sweep.
    pub fn explicit_access(&mut self, objnum: i32, new_id: LastAccessId, max_depth: u32) {
        let gens: Vec<u16> = self.buckets[bucket_index(objnum)]
            .entries
            .iter()
            .filter(|e| e.objnum == objnum)
            .map(|e| e.gen)
            .collect();
        for gen in gens {
            self.set_last_access_recursive_inner(objnum, gen, new_id, max_depth, 0);
        }
    }

    /// `xref_this_page_only`: force an entry to the current page.
    pub fn this_page_only(&mut self, objnum: i32, page_id: i32) {
        for entry in self.buckets[bucket_index(objnum)].entries.iter_mut().filter(|e| e.objnum == objnum) {
            entry.last_access = LastAccessId::page(page_id);
        }
        self.sweepable_size_cache = None;
    }

    /// `pdf_xrefexplicitaccess_dictmatch`: promote (never demote) every
    /// cached dictionary entry whose value structurally equals `dict`, for
    /// a stream whose `HqnCacheSlot` hasn't been stamped yet so
    /// `explicit_access` can't key off an objnum directly.
    pub fn explicit_access_by_dict_match(&mut self, dict: &Value, new_id: LastAccessId) {
        for bucket in self.buckets.iter_mut() {
            for entry in bucket.entries.iter_mut() {
                if &entry.value.value == dict && new_id.more_restrictive_than(entry.last_access) {
                    entry.last_access = new_id;
                }
            }
        }
        self.sweepable_size_cache = None;
    }
}

impl Default for XrefCache {
    fn default() -> Self {
        Self::new()
    }
}
