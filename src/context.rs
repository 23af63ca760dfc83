//! Execution & Marking Contexts (spec §4.E), the orchestration layer that
//! owns everything else in this crate: the two accounted pools, the xref
//! table/cache pair, the stream registry, and a LIFO stack of marking
//! contexts. Grounded on the teacher's document-level state
//! (`pdf_document.rs`) generalized from "the thing being written" to "the
//! thing being interpreted", with the nested-scope shape of
//! `pdf_page.rs`/`pdf_layer.rs` carried over for `MarkingContext`.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace, warn};

use crate::dict::Dictionary;
use crate::error::{core_err, CoreErrorKind, Error, Result};
use crate::filter::FilterKind;
use crate::gc::ContextBase;
use crate::memory::PoolPair;
use crate::params::CoreParams;
use crate::pool;
use crate::registry::{resolve_filter, EmptyRegistry, FilterRegistry};
use crate::stream::{FilterStage, StreamEntry, StreamTable};
use crate::value::{Object, StreamId, Value};
use crate::xref::{Use, XrefTable};
use crate::xref_cache::{CacheEntry, LastAccessId, XrefCache};

/// `PDF_MAX_RECURSION_DEPTH` (spec §3).
pub const MAX_RECURSION_DEPTH: u32 = 32;
/// `PDF_MAX_MC_NESTCOUNT` (spec §3). The placeholder outermost context
/// occupies level 0, so a caller may nest `MAX_MC_NESTCOUNT` more.
pub const MAX_MC_NESTCOUNT: u32 = 32;
/// Baseline save level below which `begin_execution_context` refuses to
/// start (spec §4.E: "Requires corectx.savelevel > SAVELEVELINC").
pub const SAVELEVELINC: u32 = 0;
/// `RES_N_CACHE_ENTRIES` (spec's supplemented `swpdf.h` constant).
pub const RES_N_CACHE_ENTRIES: usize = 3;

/// The three fixed resource-cache slots a marking context keeps warm (spec
/// §3 "a small fixed cache of frequently-referenced resources"; names
/// fixed by the supplemented `RES_DEFAULTGRAY`/`RES_DEFAULTRGB`/
/// `RES_DEFAULTCMYK` constants).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceCacheSlot {
    DefaultGray = 0,
    DefaultRgb = 1,
    DefaultCmyk = 2,
}

/// `streamtype` a marking context is opened for (spec §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkingContextKind {
    Page,
    Form,
    CharProc,
    Pattern,
}

/// Capability table a hosting client supplies (spec §9 "Methods struct").
/// Every hook is optional -- a client only interested in, say, marking
/// context tracking can leave the execution-context hooks as no-ops by
/// using `NullMethods`.
pub trait ExecutionMethods {
    fn begin_execution_context(&mut self, _ctx_id: u64) -> Result<()> {
        Ok(())
    }
    fn end_execution_context(&mut self, _ctx_id: u64) -> Result<()> {
        Ok(())
    }
    fn purge_execution_context(&mut self, _ctx_id: u64, _save_level: u32) -> Result<()> {
        Ok(())
    }
    fn begin_marking_context(&mut self, _ctx_id: u64, _mc_level: u32) -> Result<()> {
        Ok(())
    }
    fn end_marking_context(&mut self, _ctx_id: u64, _mc_level: u32) -> Result<bool> {
        Ok(true)
    }
}

/// The default, no-op method table.
pub struct NullMethods;
impl ExecutionMethods for NullMethods {}

static NEXT_CTX_ID: AtomicU64 = AtomicU64::new(1);

/// A scope within an execution context: a page, form, pattern, or Type 3
/// glyph (spec §3, §4.E).
pub struct MarkingContext {
    pub level: u32,
    pub kind: MarkingContextKind,
    /// Inherited by element-copy from the parent at `begin_marking_context`
    /// time (spec: "Inherit parent mc's resource-list head ... by element
    /// copy, not by reference").
    pub resource_list: Vec<Dictionary>,
    pub resource_cache: [Option<Object>; RES_N_CACHE_ENTRIES],
    /// `(stream, saved position)` pairs awaiting restore at `end`. Keyed so
    /// a second rewind of the same stream within this mc is a no-op (the
    /// decided resolution of spec §9's open question: first rewind wins).
    restore_files: Vec<(StreamId, u64)>,
}

impl MarkingContext {
    fn placeholder() -> Self {
        MarkingContext {
            level: 0,
            kind: MarkingContextKind::Page,
            resource_list: Vec::new(),
            resource_cache: [None, None, None],
            restore_files: Vec::new(),
        }
    }

    fn child(&self, kind: MarkingContextKind) -> Self {
        MarkingContext {
            level: self.level + 1,
            kind,
            resource_list: self.resource_list.clone(),
            resource_cache: self.resource_cache.clone(),
            restore_files: Vec::new(),
        }
    }

    pub fn resource(&self, slot: ResourceCacheSlot) -> Option<&Object> {
        self.resource_cache[slot as usize].as_ref()
    }

    pub fn set_resource(&mut self, slot: ResourceCacheSlot, value: Object) {
        self.resource_cache[slot as usize] = Some(value);
    }
}

/// What `lookup_xref` hands back: the resolved object, plus whether this
/// objnum was already on the in-progress resolution stack (cyclic), plus
/// whether this call pushed a fresh entry the caller must pop.
pub struct LookupOutcome {
    pub object: Object,
    pub already_resolved: bool,
    pushed: bool,
}

/// Per-document runtime state envelope (spec §3 "Execution Context").
pub struct ExecutionContext<M: ExecutionMethods = NullMethods> {
    pub id: u64,
    doc: lopdf::Document,
    xref: XrefTable,
    cache: XrefCache,
    streams: StreamTable,
    pub pools: PoolPair,
    pub params: CoreParams,
    registry: Box<dyn FilterRegistry>,
    methods: M,
    pub save_level: u32,
    /// -1 until a real page is started (spec §3).
    pub page_id: i32,
    resolution_stack: Vec<i32>,
    mc_stack: Vec<MarkingContext>,
    lowmem_redo_streams: bool,
    purgeable_streams_cache: Option<usize>,
    ended: bool,
}

impl<M: ExecutionMethods> ExecutionContext<M> {
    /// `begin_execution_context(base, methods, corectx)` (spec §4.E).
    /// Links the new context onto `base` before handing it back; the caller
    /// must pass the same base to `end` so it can unlink again.
    pub fn begin(doc: lopdf::Document, params: CoreParams, methods: M, save_level: u32, base: &mut ContextBase) -> Result<Self> {
        if save_level <= SAVELEVELINC {
            return core_err(CoreErrorKind::Undefined, "begin_execution_context: save level at or below SAVELEVELINC");
        }
        let xref = XrefTable::from_lopdf(&doc);
        let id = NEXT_CTX_ID.fetch_add(1, Ordering::Relaxed);
        let mut ctx = ExecutionContext {
            id,
            doc,
            xref,
            cache: XrefCache::new(),
            streams: StreamTable::new(),
            pools: PoolPair::new(),
            params,
            registry: Box::new(EmptyRegistry),
            methods,
            save_level,
            page_id: -1,
            resolution_stack: Vec::new(),
            mc_stack: Vec::new(),
            lowmem_redo_streams: false,
            purgeable_streams_cache: None,
            ended: false,
        };
        ctx.methods.begin_execution_context(ctx.id)?;
        ctx.mc_stack.push(MarkingContext::placeholder());
        base.register(ctx.id);
        debug!("execution context {} begun at save level {} on base {:?}", ctx.id, save_level, base.name);
        Ok(ctx)
    }

    pub fn set_registry(&mut self, registry: Box<dyn FilterRegistry>) {
        self.registry = registry;
    }

    /// `end_execution_context(ctx, base)` (spec §4.E). Tears down the
    /// structure pool (but not the object pool -- that waits for `purge`)
    /// and unlinks from `base`.
    pub fn end(&mut self, base: &mut ContextBase) -> Result<()> {
        self.flush_streams();
        while self.mc_stack.len() > 1 {
            self.end_marking_context()?;
        }
        // end the placeholder itself
        self.mc_stack.pop();
        self.methods.end_execution_context(self.id)?;
        base.unregister(self.id);
        self.pools.structure.free(self.pools.structure.allocated());
        self.ended = true;
        debug!("execution context {} ended", self.id);
        Ok(())
    }

    /// `purge_execution_contexts(savelevel)`'s per-context half: a restore
    /// to `savelevel` destroys the object pool of any ended context that
    /// was itself begun at or after that level (purging everything still
    /// live is just `purge(0)`).
    pub fn purge(&mut self, save_level: u32) -> Result<()> {
        self.methods.purge_execution_context(self.id, save_level)?;
        if self.ended && self.save_level >= save_level {
            self.pools.object.free(self.pools.object.allocated());
        }
        Ok(())
    }

    pub fn is_fully_reclaimed(&self) -> bool {
        self.ended && self.pools.is_fully_reclaimed()
    }

    // ---- Marking contexts (spec §4.E) ----

    pub fn begin_marking_context(&mut self, resource: Option<Dictionary>, kind: MarkingContextKind) -> Result<()> {
        if self.mc_stack.len() as u32 > MAX_MC_NESTCOUNT {
            return core_err(CoreErrorKind::LimitCheck, "begin_marking_context: PDF_MAX_MC_NESTCOUNT exceeded");
        }
        let parent = self.mc_stack.last().expect("placeholder always present");
        let mut mc = parent.child(kind);
        self.methods.begin_marking_context(self.id, mc.level)?;
        if let Some(r) = resource {
            mc.resource_list.push(r);
        }
        trace!("begin marking context level {}", mc.level);
        self.mc_stack.push(mc);
        Ok(())
    }

    /// `end_marking_context`. Best-effort per spec §9's open question: both
    /// the client callback and stream restore always run, even if the
    /// first fails; the return value is their logical AND.
    pub fn end_marking_context(&mut self) -> Result<bool> {
        if self.mc_stack.len() <= 1 {
            return core_err(CoreErrorKind::Undefined, "end_marking_context: no open marking context to end");
        }
        let level = self.mc_stack.last().unwrap().level;
        let client_ok = self.methods.end_marking_context(self.id, level).unwrap_or(false);
        let restore_ok = self.restore_streams();
        let mc = self.mc_stack.pop().expect("checked non-placeholder above");
        drop(mc);
        Ok(client_ok && restore_ok)
    }

    pub fn current_mc(&self) -> &MarkingContext {
        self.mc_stack.last().expect("placeholder always present")
    }

    pub fn current_mc_mut(&mut self) -> &mut MarkingContext {
        self.mc_stack.last_mut().expect("placeholder always present")
    }

    // ---- Object allocator (spec §4.A) ----

    pub fn create_dict(&mut self, capacity: usize) -> Result<Object> {
        pool::create_dict(capacity, self.save_level)
    }

    pub fn create_array(&mut self, length: usize) -> Result<Object> {
        pool::create_array(length, self.save_level)
    }

    /// `free_value`. Recursion bounded by `MAX_RECURSION_DEPTH`; exceeding
    /// it silently stops descending rather than failing (spec §4.A, §7).
    pub fn free_value(&mut self, obj: Object) {
        self.free_value_inner(obj, 0);
    }

    fn free_value_inner(&mut self, obj: Object, depth: u32) {
        if depth > MAX_RECURSION_DEPTH {
            return;
        }
        match obj.value {
            Value::Array(items) | Value::LongArray(items) | Value::PackedArray(items) => {
                for item in items {
                    self.free_value_inner(item, depth + 1);
                }
            }
            Value::Dictionary(dict) => {
                let entries: Vec<Object> = dict.iter().map(|(_, v)| v.clone()).collect();
                for item in entries {
                    self.free_value_inner(item, depth + 1);
                }
            }
            Value::Stream(id) => self.release_stream_reference(id),
            _ => {}
        }
    }

    /// §4.D interaction: releasing a stream reference marks its cache
    /// entry flushable if it's not on the current page; a stream with no
    /// cache slot is freed eagerly.
    fn release_stream_reference(&mut self, id: StreamId) {
        let hqn_slot = self.streams.get(id).ok().and_then(|e| e.hqn_cache_slot);
        match hqn_slot {
            Some(objnum) => {
                let still_current = self
                    .cache
                    .find_by_objnum_mut(objnum)
                    .map(|e| e.last_access.page_id() == Some(self.page_id))
                    .unwrap_or(false);
                if !still_current {
                    self.cache.explicit_purge(objnum);
                }
            }
            None => {
                let _ = self.streams.close(id);
            }
        }
    }

    /// `copy_value`. Simple values are bit-copied; compounds recurse into
    /// freshly-allocated destinations; streams are never deep-copied, only
    /// access-promoted and reference-copied (spec §4.A).
    pub fn copy_value(&mut self, src: &Object, dst_save_level: u32) -> Result<Object> {
        self.copy_value_inner(src, dst_save_level, 0)
    }

    fn copy_value_inner(&mut self, src: &Object, dst_save_level: u32, depth: u32) -> Result<Object> {
        if depth > MAX_RECURSION_DEPTH {
            return core_err(CoreErrorKind::LimitCheck, "copy_value: PDF_MAX_RECURSION_DEPTH exceeded");
        }
        let value = match &src.value {
            Value::Array(items) => Value::Array(self.copy_items(items, dst_save_level, depth)?),
            Value::LongArray(items) => Value::LongArray(self.copy_items(items, dst_save_level, depth)?),
            Value::PackedArray(items) => Value::PackedArray(self.copy_items(items, dst_save_level, depth)?),
            Value::Dictionary(dict) => {
                let mut dst = Dictionary::with_capacity(dict.len(), dst_save_level)?;
                let entries: Vec<_> = dict.iter().map(|(k, v)| (k, v.clone())).collect();
                for (key, value) in entries {
                    let copied = self.copy_value_inner(&value, dst_save_level, depth + 1)?;
                    dst.insert_hash(key, copied, crate::dict::InsertFlags::DICT_ACCESS)?;
                }
                Value::Dictionary(dst)
            }
            Value::Stream(id) => {
                if let Some(objnum) = self.streams.get(*id).ok().and_then(|e| e.hqn_cache_slot) {
                    self.cache.explicit_access(objnum, LastAccessId::page(self.page_id), MAX_RECURSION_DEPTH);
                }
                Value::Stream(*id)
            }
            other => other.clone(),
        };
        Ok(Object::new(value, dst_save_level))
    }

    fn copy_items(&mut self, items: &[Object], dst_save_level: u32, depth: u32) -> Result<Vec<Object>> {
        items.iter().map(|o| self.copy_value_inner(o, dst_save_level, depth + 1)).collect()
    }

    // ---- Xref cache & sweeper (spec §4.C) ----

    fn excluded_stream_keys() -> Result<[crate::name_cache::NameId; 4]> {
        Ok([
            crate::name_cache::intern(b"DataSource")?,
            crate::name_cache::intern(b"Resources")?,
            crate::name_cache::intern(b"HqnCacheSlot")?,
            crate::name_cache::intern(b"Thresholds")?,
        ])
    }

    /// `lookup_xref(ctx, objnum, gen, stream_dict_only)` (spec §4.C).
    pub fn lookup_xref(&mut self, objnum: i32, gen: u16, stream_dict_only: bool) -> Result<LookupOutcome> {
        if let Some(entry) = self.cache.find_mut(objnum, gen, stream_dict_only) {
            let old_id = entry.last_access;
            let stream_id = match entry.value.value {
                Value::Stream(id) => Some(id),
                _ => None,
            };
            let new_id = if old_id.is_page() { LastAccessId::page(self.page_id) } else { old_id };
            if let Some(id) = stream_id {
                // best-effort rewind; a stream without a decoded cache yet
                // has nothing to rewind.
                if let Ok(stream) = self.streams.get_mut(id) {
                    stream.rewind();
                }
            }
            // Recurse while the cache still holds the entry's prior
            // lastAccessId -- `set_last_access_recursive` performs the
            // top-level assignment itself, same as `pdf_set_xref_last_access`
            // mutating `cache->lastAccessId` before recursing into
            // `cache->pdfobj`.
            self.cache.set_last_access_recursive(objnum, gen, new_id, MAX_RECURSION_DEPTH);
            let value = self
                .cache
                .find(objnum, gen, stream_dict_only)
                .expect("entry still present immediately after its own update")
                .value
                .clone();
            let already = self.resolution_stack.contains(&objnum);
            let pushed = if !already {
                self.resolution_stack.push(objnum);
                true
            } else {
                false
            };
            return Ok(LookupOutcome { object: value, already_resolved: already, pushed });
        }

        // miss, or a hit with the wrong stream_dict_only flag (spec step 3):
        if let Some(stale) = self.cache.remove(objnum, gen, !stream_dict_only) {
            if let Value::Stream(id) = stale.value.value {
                let _ = self.streams.close(id);
            }
        }
        self.load_miss(objnum, gen, stream_dict_only)
    }

    fn load_miss(&mut self, objnum: i32, gen: u16, stream_dict_only: bool) -> Result<LookupOutcome> {
        let entry = self.xref.get(objnum).copied();
        let value = match entry.map(|e| e.entry) {
            None | Some(Use::Uninitialised) => Object::literal(Value::Null),
            Some(Use::Free { .. }) => Object::literal(Value::Null),
            Some(Use::Used { .. }) | Some(Use::Compressed { .. }) => self.decode_indirect(objnum, gen, stream_dict_only)?,
        };
        let page_id = LastAccessId::page(self.page_id);
        self.cache.insert(CacheEntry {
            objnum,
            gen,
            value: value.clone(),
            last_access: page_id,
            stream_dict_only,
            flushable: false,
        });
        // A freshly-loaded entry still has to cascade into anything it
        // references that's already cached from an earlier page (a shared
        // object loaded once and pointed at from several pages).
        self.cache.set_last_access_recursive(objnum, gen, page_id, MAX_RECURSION_DEPTH);
        let already = self.resolution_stack.contains(&objnum);
        let pushed = if !already {
            self.resolution_stack.push(objnum);
            true
        } else {
            false
        };
        trace!("xref cache miss for {objnum} {gen} loaded fresh entry");
        Ok(LookupOutcome { object: value, already_resolved: already, pushed })
    }

    fn decode_indirect(&mut self, objnum: i32, gen: u16, stream_dict_only: bool) -> Result<Object> {
        let lopdf_obj = self
            .doc
            .get_object((objnum as u32, gen))
            .map_err(Error::Parse)?
            .clone();
        if stream_dict_only {
            if let lopdf::Object::Stream(ref s) = lopdf_obj {
                let mut unused = |_d: Dictionary, _f: Vec<Vec<u8>>, _r: Vec<u8>| -> Result<StreamId> { unreachable!("dict-only load never converts a Stream variant") };
                let dict = crate::convert::convert_object(&lopdf::Object::Dictionary(s.dict.clone()), self.save_level, &mut unused)?;
                return Ok(dict);
            }
        }
        let registry: &dyn FilterRegistry = self.registry.as_ref();
        let streams = &mut self.streams;
        let mut register = move |dict: Dictionary, filter_names: Vec<Vec<u8>>, raw: Vec<u8>| -> Result<StreamId> {
            let chain = resolve_chain(registry, &filter_names)?;
            let mut entry = StreamEntry::new(objnum, gen, dict, chain, raw, false);
            entry.hqn_cache_slot = Some(objnum);
            Ok(streams.open(entry))
        };
        crate::convert::convert_object(&lopdf_obj, self.save_level, &mut register)
    }

    /// `resolve_indirect` / `resolve_xrefs` (spec §4.A, §4.C).
    pub fn resolve_indirect(&mut self, obj: &Object) -> Result<Object> {
        self.resolve_inner(obj, 0)
    }

    fn resolve_inner(&mut self, obj: &Object, depth: u32) -> Result<Object> {
        if depth > MAX_RECURSION_DEPTH {
            return core_err(CoreErrorKind::LimitCheck, "resolve_indirect: PDF_MAX_RECURSION_DEPTH exceeded");
        }
        match &obj.value {
            Value::Reference(r) => {
                let outcome = self.lookup_xref(r.objnum, r.gen, false)?;
                if outcome.already_resolved {
                    // cyclic: stop descending, leave the reference in place.
                    return Ok(Object::new(Value::Reference(*r), obj.save_level));
                }
                let resolved = self.resolve_inner(&outcome.object, depth + 1)?;
                if outcome.pushed {
                    self.resolution_stack.retain(|&n| n != r.objnum);
                }
                Ok(resolved)
            }
            Value::Array(items) => Ok(Object::new(Value::Array(self.resolve_items(items, depth)?), obj.save_level)),
            Value::LongArray(items) => Ok(Object::new(Value::LongArray(self.resolve_items(items, depth)?), obj.save_level)),
            Value::PackedArray(items) => Ok(Object::new(Value::PackedArray(self.resolve_items(items, depth)?), obj.save_level)),
            Value::Dictionary(dict) => {
                let mut out = Dictionary::with_capacity(dict.len(), dict.save_level)?;
                let entries: Vec<_> = dict.iter().map(|(k, v)| (k, v.clone())).collect();
                for (key, value) in entries {
                    let resolved = self.resolve_inner(&value, depth + 1)?;
                    out.insert_hash(key, resolved, crate::dict::InsertFlags::DICT_ACCESS)?;
                }
                Ok(Object::new(Value::Dictionary(out), obj.save_level))
            }
            Value::Stream(id) => {
                self.resolve_stream_dict(*id, depth)?;
                Ok(obj.clone())
            }
            _ => Ok(obj.clone()),
        }
    }

    fn resolve_items(&mut self, items: &[Object], depth: u32) -> Result<Vec<Object>> {
        items.iter().map(|o| self.resolve_inner(o, depth + 1)).collect()
    }

    /// Resolve a stream's own dictionary in place, skipping the keys spec
    /// §3/§9 name as known back-references (`DataSource`, `Resources`,
    /// `HqnCacheSlot`, `Thresholds`).
    fn resolve_stream_dict(&mut self, id: StreamId, depth: u32) -> Result<()> {
        let excluded = Self::excluded_stream_keys()?;
        let original = match self.streams.get(id) {
            Ok(entry) => entry.dict.clone(),
            Err(_) => return Ok(()),
        };
        let mut resolved = Dictionary::with_capacity(original.len(), original.save_level)?;
        let entries: Vec<_> = original.iter().map(|(k, v)| (k, v.clone())).collect();
        for (key, value) in entries {
            let next = if excluded.contains(&key) {
                value
            } else {
                self.resolve_inner(&value, depth + 1)?
            };
            resolved.insert_hash(key, next, crate::dict::InsertFlags::DICT_ACCESS)?;
        }
        if let Ok(entry) = self.streams.get_mut(id) {
            entry.dict = resolved;
        }
        Ok(())
    }

    pub fn sweep_xref(&mut self, closing: bool, depth: Option<i32>) {
        self.cache.mark_sweepable(closing, depth, self.page_id);
        self.deferred_xrefcache_flush();
    }

    pub fn sweep_xrefpage(&mut self, page_id: i32) {
        self.cache.mark_sweepable_for_page(page_id, |_objnum| false);
        self.deferred_xrefcache_flush();
    }

    pub fn reset_xref(&mut self) {
        self.cache.reset();
    }

    /// `deferred_xrefcache_flush`: closes filter chains for flushed
    /// streams, frees everything else, and flags the purgeable-streams
    /// measurement stale.
    pub fn deferred_xrefcache_flush(&mut self) {
        let streams = &mut self.streams;
        let mut any_stream_closed = false;
        let freed = self.cache.drain_flushable(|entry| {
            if let Value::Stream(id) = entry.value.value {
                let _ = streams.close(id);
                any_stream_closed = true;
            }
        });
        if freed > 0 {
            trace!("deferred flush freed {freed} xref cache entries");
        }
        if any_stream_closed {
            self.lowmem_redo_streams = true;
        }
        self.purge_streams();
    }

    pub fn xref_explicit_purge(&mut self, objnum: i32) {
        self.cache.explicit_purge(objnum);
    }

    pub fn xref_explicit_access(&mut self, objnum: i32, permanent: bool) {
        let id = if permanent { LastAccessId::permanent() } else { LastAccessId::page(self.page_id) };
        self.cache.explicit_access(objnum, id, MAX_RECURSION_DEPTH);
    }

    pub fn xref_explicit_access_stream(&mut self, stream: StreamId, permanent: bool) {
        if let Some(objnum) = self.streams.get(stream).ok().and_then(|e| e.hqn_cache_slot) {
            self.xref_explicit_access(objnum, permanent);
        }
    }

    pub fn xref_this_page_only(&mut self, stream: StreamId) {
        if let Some(objnum) = self.streams.get(stream).ok().and_then(|e| e.hqn_cache_slot) {
            self.cache.this_page_only(objnum, self.page_id);
        }
    }

    /// `pdf_xrefexplicitaccess_dictmatch`: promote whichever cache entry
    /// holds a dictionary structurally equal to `dict`, for streams not
    /// yet stamped with a `HqnCacheSlot`.
    pub fn xref_explicit_access_dict_match(&mut self, dict: &Dictionary, permanent: bool) {
        let id = if permanent { LastAccessId::permanent() } else { LastAccessId::page(self.page_id) };
        self.cache.explicit_access_by_dict_match(&Value::Dictionary(dict.clone()), id);
    }

    pub fn page_histogram(&self) -> Option<(i32, i32)> {
        self.cache.page_histogram()
    }

    pub fn objnums_on_page(&self, page_id: i32) -> Vec<i32> {
        self.cache.objnums_on_page(page_id)
    }

    // ---- Stream / filter chain (spec §4.D) ----

    /// `create_filter_list`: resolve each name (expanding abbreviations,
    /// consulting the registry) and build the chain in order.
    pub fn create_filter_list(&mut self, objnum: i32, gen: u16, dict: Dictionary, names: &[Vec<u8>], raw: Vec<u8>) -> Result<StreamId> {
        let chain = resolve_chain(self.registry.as_ref(), names)?;
        let mut dict = dict;
        if chain.iter().any(|f| f.kind == FilterKind::FlateDecode) {
            self.ensure_checksum_flag(&mut dict)?;
        }
        let mut entry = StreamEntry::new(objnum, gen, dict, chain, raw, false);
        entry.hqn_cache_slot = Some(objnum);
        let id = self.streams.open(entry);
        self.lowmem_redo_streams = true;
        debug!("created filter chain for object {objnum} with {} stages", names.len());
        Ok(id)
    }

    fn ensure_checksum_flag(&mut self, dict: &mut Dictionary) -> Result<()> {
        let key = crate::name_cache::intern(b"ErrorOnChecksumFailure")?;
        dict.insert_hash(key, Object::literal(Value::Bool(self.params.error_on_flate_checksum_failure)), crate::dict::InsertFlags::DICT_ACCESS)?;
        Ok(())
    }

    /// `rewind_stream`. Records the stream's pre-rewind position on the
    /// current marking context's restore list the first time it's rewound
    /// within that scope; later rewinds of the same stream are a no-op on
    /// the restore list (first-rewind-wins, per spec §9's resolved open
    /// question).
    pub fn rewind_stream(&mut self, id: StreamId) -> Result<bool> {
        let is_open = self.streams.get(id).map(|e| e.is_open()).unwrap_or(false);
        if !is_open {
            return Ok(false);
        }
        let mc = self.mc_stack.last_mut().expect("placeholder always present");
        if !mc.restore_files.iter().any(|(sid, _)| *sid == id) {
            mc.restore_files.push((id, 0));
        }
        if let Ok(entry) = self.streams.get_mut(id) {
            entry.rewind();
        }
        Ok(true)
    }

    /// `restore_streams`: drains the current marking context's restore
    /// list. Continues through the whole list even after a failure (spec
    /// §7 propagation policy).
    fn restore_streams(&mut self) -> bool {
        let entries = std::mem::take(&mut self.mc_stack.last_mut().expect("placeholder always present").restore_files);
        let mut ok = true;
        for (id, _position) in entries {
            match self.streams.get_mut(id) {
                Ok(entry) if entry.is_open() => entry.rewind(),
                _ => ok = false,
            }
        }
        ok
    }

    /// `flush_streams`: unconditionally close every open stream.
    pub fn flush_streams(&mut self) {
        self.streams = StreamTable::new();
    }

    /// `purge_streams`: in this architecture `StreamTable::close` already
    /// reclaims a slot immediately, so there is nothing left to sweep up
    /// separately; this resets the low-memory proxy bookkeeping the way
    /// the source's `purge_streams` does (`lowmemStreamCount = 0`).
    pub fn purge_streams(&mut self) -> bool {
        self.purgeable_streams_cache = None;
        false
    }

    /// `measure_purgeable_streams`.
    pub fn measure_purgeable_streams(&mut self) -> usize {
        if !self.lowmem_redo_streams {
            if let Some(cached) = self.purgeable_streams_cache {
                return cached;
            }
        }
        let measured = self.streams.measure_purgeable();
        self.purgeable_streams_cache = Some(measured);
        self.lowmem_redo_streams = false;
        measured
    }

    /// Low-memory release (spec §4.C "Low-memory handler"): sweep cache
    /// entries from pages other than the current one until `requested`
    /// (approximate, counted in `size_of::<Object>()` units) has been
    /// freed or nothing more is reclaimable.
    pub fn low_memory_release(&mut self, requested: usize) -> usize {
        const UNIT: usize = std::mem::size_of::<Object>();
        let sweepable = self.cache.measure_sweepable(self.page_id);
        let mut freed = 0;
        if sweepable > 0 {
            self.sweep_xref(false, Some(-1));
            freed += sweepable * UNIT;
        }
        if freed < requested {
            let before = self.streams.measure_purgeable();
            self.purge_streams();
            let after = self.streams.measure_purgeable();
            freed += before.saturating_sub(after);
        }
        if freed < requested {
            warn!("low_memory_release: requested {requested} bytes, only reclaimed {freed}");
        }
        freed
    }
}

/// Resolve a stream's `Filter` names to a chain, trying the external
/// registry first for each name (spec §4.D step 2).
fn resolve_chain(registry: &dyn FilterRegistry, names: &[Vec<u8>]) -> Result<Vec<FilterStage>> {
    names.iter().map(|n| resolve_filter(registry, n).map(|t| FilterStage { kind: t.kind })).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_doc(doc: lopdf::Document) -> ExecutionContext<NullMethods> {
        let mut base = ContextBase::new("test");
        ExecutionContext::begin(doc, CoreParams::default(), NullMethods, 1, &mut base).unwrap()
    }

    fn minimal_doc() -> lopdf::Document {
        lopdf::Document::with_version("1.7")
    }

    #[test]
    fn begin_rejects_save_level_at_baseline() {
        let mut base = ContextBase::new("test");
        let result = ExecutionContext::begin(minimal_doc(), CoreParams::default(), NullMethods, 0, &mut base);
        assert!(result.is_err());
    }

    #[test]
    fn begin_then_end_then_purge_fully_reclaims() {
        let mut base = ContextBase::new("test");
        let mut ctx = ExecutionContext::begin(minimal_doc(), CoreParams::default(), NullMethods, 1, &mut base).unwrap();
        ctx.pools.object.alloc(64);
        ctx.end(&mut base).unwrap();
        ctx.purge(0).unwrap();
        assert!(ctx.is_fully_reclaimed());
    }

    #[test]
    fn marking_contexts_are_lifo() {
        let mut ctx = ctx_with_doc(minimal_doc());
        ctx.begin_marking_context(None, MarkingContextKind::Page).unwrap();
        ctx.begin_marking_context(None, MarkingContextKind::Form).unwrap();
        assert!(ctx.end_marking_context().unwrap());
        assert!(ctx.end_marking_context().unwrap());
        // ending once more would end the placeholder, which is invalid
        assert!(ctx.end_marking_context().is_err());
    }

    #[test]
    fn marking_context_nest_limit_enforced() {
        let mut ctx = ctx_with_doc(minimal_doc());
        for _ in 0..MAX_MC_NESTCOUNT {
            ctx.begin_marking_context(None, MarkingContextKind::Page).unwrap();
        }
        assert!(ctx.begin_marking_context(None, MarkingContextKind::Page).is_err());
    }

    #[test]
    fn free_value_on_simple_value_is_a_no_op() {
        let mut ctx = ctx_with_doc(minimal_doc());
        ctx.free_value(Object::literal(Value::Int(5)));
    }

    #[test]
    fn copy_value_round_trips_structurally() {
        let mut ctx = ctx_with_doc(minimal_doc());
        let original = Object::literal(Value::Array(vec![Object::literal(Value::Int(1)), Object::literal(Value::Int(2))]));
        let copy = ctx.copy_value(&original, 0).unwrap();
        assert_eq!(original.value, copy.value);
    }

    #[test]
    fn rewind_stream_is_idempotent_within_a_marking_context() {
        let mut ctx = ctx_with_doc(minimal_doc());
        let id = ctx
            .streams_for_test()
            .open(StreamEntry::new(1, 0, Dictionary::default(), vec![], vec![1, 2, 3], false));
        ctx.rewind_stream(id).unwrap();
        ctx.rewind_stream(id).unwrap();
        assert_eq!(ctx.current_mc().restore_files.len(), 1);
    }
}

#[cfg(test)]
impl<M: ExecutionMethods> ExecutionContext<M> {
    fn streams_for_test(&mut self) -> &mut StreamTable {
        &mut self.streams
    }
}
