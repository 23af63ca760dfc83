//! The memory manager abstraction (spec §6: "create/destroy pools with
//! specified policies, allocate/free within pools, report peak usage").
//!
//! The core itself never calls a raw allocator directly -- every `Value`,
//! `Dictionary`, and cache entry is ordinary Rust heap memory owned by its
//! container, freed by `Drop` the normal way. What this module tracks is
//! the *accounting* the spec's invariants are stated in terms of (spec §8
//! invariant 3: "total allocations in the context's pools are zero" after
//! teardown) -- a lightweight counter per pool, bumped/lowered alongside
//! the real allocations so the counters stay true without the pools
//! actually owning memory via an arena.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Which of an execution context's two pools an allocation belongs to
/// (spec §3 "Execution Context": "an object memory pool, a structure
/// memory pool").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Value bodies, strings, arrays, dictionary blocks.
    Object,
    /// Contexts, xref tables, cache entries, stream handles.
    Structure,
}

/// A size-accounted allocation pool. `alloc`/`free` move `allocated` up or
/// down; `peak` only ever rises, matching "report peak usage".
#[derive(Debug, Default)]
pub struct Pool {
    kind_label: &'static str,
    allocated: AtomicUsize,
    peak: AtomicUsize,
}

impl Pool {
    pub fn new(kind: PoolKind) -> Self {
        Pool {
            kind_label: match kind {
                PoolKind::Object => "object",
                PoolKind::Structure => "structure",
            },
            allocated: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn alloc(&self, bytes: usize) {
        let new_total = self.allocated.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak.fetch_max(new_total, Ordering::Relaxed);
    }

    pub fn free(&self, bytes: usize) {
        self.allocated.fetch_sub(bytes.min(self.allocated.load(Ordering::Relaxed)), Ordering::Relaxed);
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    pub fn label(&self) -> &'static str {
        self.kind_label
    }
}

/// A pool pair, one per execution context (spec §3/§5 "Two memory pools
/// per execution context").
#[derive(Debug, Default)]
pub struct PoolPair {
    pub object: Pool,
    pub structure: Pool,
}

impl PoolPair {
    pub fn new() -> Self {
        PoolPair {
            object: Pool::new(PoolKind::Object),
            structure: Pool::new(PoolKind::Structure),
        }
    }

    /// Both pools empty -- the condition spec §8 invariant 3 requires after
    /// `end_execution_context` + `purge_execution_contexts(∞)`.
    pub fn is_fully_reclaimed(&self) -> bool {
        self.object.allocated() == 0 && self.structure.allocated() == 0
    }
}
