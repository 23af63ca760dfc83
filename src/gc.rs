//! GC root registration and context bases (spec §6 "a GC/scanning
//! framework: create a root with a scan callback"; spec §4.E "Context
//! registration").
//!
//! The core itself owns everything it allocates (ordinary Rust ownership),
//! so there is no literal mark-sweep collector here -- what a host
//! integrates with is an *external* collector (e.g. the PostScript VM's),
//! which needs to know how to walk into the core's live state to find
//! anything it, in turn, is keeping alive. `scan_context` is that walk.

use crate::context::{ExecutionContext, ExecutionMethods};
use crate::error::{core_err, CoreErrorKind, Result};
use crate::name_cache::NameId;

/// At most two registered bases: one each for input and output PDF (spec
/// §4.E "Context registration").
pub const MAX_XCONTEXT_BASE: usize = 2;

/// What a `scan_context` callback is handed for each live value reachable
/// from a context: enough to let an external collector mark it live.
/// Only `Name` and `Reference`-shaped things are meaningful GC roots from
/// the outside; everything else (ints, strings, dict blocks) is private
/// to this crate's own ownership graph.
#[derive(Debug, Clone, Copy)]
pub enum GcRoot {
    Name(NameId),
    Objnum(i32),
}

/// A scan callback, invoked once per GC root discovered while walking a
/// base's registered contexts and their marking contexts.
pub trait GcScanner {
    fn visit(&mut self, root: GcRoot);
}

/// A no-op scanner, useful as a default when no external collector is
/// wired up (e.g. in unit tests).
pub struct NullScanner;

impl GcScanner for NullScanner {
    fn visit(&mut self, _root: GcRoot) {}
}

/// One of the (at most `MAX_XCONTEXT_BASE`) registered context bases. Each
/// base owns the list of execution context ids a `scan_context` callback
/// should walk when asked to find roots.
#[derive(Debug, Default)]
pub struct ContextBase {
    pub name: &'static str,
    context_ids: Vec<u64>,
}

impl ContextBase {
    pub fn new(name: &'static str) -> Self {
        ContextBase { name, context_ids: Vec::new() }
    }

    pub fn register(&mut self, ctx_id: u64) {
        self.context_ids.push(ctx_id);
    }

    pub fn unregister(&mut self, ctx_id: u64) {
        self.context_ids.retain(|&id| id != ctx_id);
    }

    pub fn context_ids(&self) -> &[u64] {
        &self.context_ids
    }
}

/// The process-wide registry of bases. Registering a third base fails with
/// *limitcheck*, mirroring `MAX_XCONTEXT_BASE`'s hard ceiling.
#[derive(Default)]
pub struct BaseRegistry {
    bases: Vec<ContextBase>,
}

impl BaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_base(&mut self, name: &'static str) -> Result<usize> {
        if self.bases.len() >= MAX_XCONTEXT_BASE {
            return core_err(CoreErrorKind::LimitCheck, "add_base: MAX_XCONTEXT_BASE exceeded");
        }
        self.bases.push(ContextBase::new(name));
        Ok(self.bases.len() - 1)
    }

    pub fn base_mut(&mut self, idx: usize) -> Option<&mut ContextBase> {
        self.bases.get_mut(idx)
    }

    pub fn bases(&self) -> &[ContextBase] {
        &self.bases
    }
}

/// `purge_execution_contexts(savelevel)` (spec §4.E): for every context
/// registered on `base`, call its `purge_execution_context` method and
/// destroy its object pool if it's been ended and was begun at or after
/// `savelevel`. The caller supplies the live contexts themselves -- this
/// registry only ever tracked their ids, never owned them.
pub fn purge_execution_contexts<M: ExecutionMethods>(base: &ContextBase, contexts: &mut [&mut ExecutionContext<M>], save_level: u32) -> Result<()> {
    for ctx in contexts.iter_mut() {
        if base.context_ids().contains(&ctx.id) {
            ctx.purge(save_level)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_most_two_bases_allowed() {
        let mut reg = BaseRegistry::new();
        reg.add_base("input").unwrap();
        reg.add_base("output").unwrap();
        assert!(reg.add_base("third").is_err());
    }

    #[test]
    fn register_then_unregister_context_id() {
        let mut reg = BaseRegistry::new();
        let idx = reg.add_base("input").unwrap();
        let base = reg.base_mut(idx).unwrap();
        base.register(7);
        assert_eq!(base.context_ids(), &[7]);
        base.unregister(7);
        assert!(base.context_ids().is_empty());
    }

    #[test]
    fn begin_links_onto_the_base_and_end_unlinks() {
        use crate::context::{ExecutionContext, NullMethods};
        use crate::params::CoreParams;

        let mut base = ContextBase::new("input");
        let mut ctx: ExecutionContext<NullMethods> =
            ExecutionContext::begin(lopdf::Document::with_version("1.7"), CoreParams::default(), NullMethods, 1, &mut base).unwrap();
        assert_eq!(base.context_ids(), &[ctx.id]);

        ctx.end(&mut base).unwrap();
        assert!(base.context_ids().is_empty());
    }

    #[test]
    fn purge_execution_contexts_purges_only_ended_contexts_registered_on_the_base() {
        use crate::context::{ExecutionContext, NullMethods};
        use crate::params::CoreParams;

        let mut base = ContextBase::new("input");
        let mut ctx: ExecutionContext<NullMethods> =
            ExecutionContext::begin(lopdf::Document::with_version("1.7"), CoreParams::default(), NullMethods, 1, &mut base).unwrap();
        ctx.pools.object.alloc(64);
        ctx.end(&mut base).unwrap();

        // `end` already unlinked it, so re-register to exercise the walk
        // (a real caller would purge before the base forgets the context).
        base.register(ctx.id);
        purge_execution_contexts(&base, &mut [&mut ctx], 0).unwrap();
        assert!(ctx.is_fully_reclaimed());
    }
}
