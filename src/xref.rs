//! The xref table itself (spec §3 "Indirect Object"): a map from object
//! number to where (or whether) its content lives. This is deliberately
//! separate from the *cache* (`src/xref_cache.rs`), which holds resolved
//! `Value`s; this module holds only the locator entries a parser produces
//! while reading a file's cross-reference section.

use std::collections::HashMap;

/// `(objnum, gen, use, payload)` from spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Use {
    Uninitialised,
    Free { next_free_objnum: i32, gen: u16 },
    Used { offset: u64 },
    Compressed { stream_objnum: i32, index_in_stream: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectObject {
    pub objnum: i32,
    pub gen: u16,
    pub entry: Use,
}

/// Map of object number to its xref entry, as produced by the (out of
/// scope) PDF syntax parser and consumed by `lookup_xref` (spec §4.C).
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    entries: HashMap<i32, IndirectObject>,
}

impl XrefTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, obj: IndirectObject) {
        self.entries.insert(obj.objnum, obj);
    }

    pub fn get(&self, objnum: i32) -> Option<&IndirectObject> {
        self.entries.get(&objnum)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a table from a parsed `lopdf::Document`'s own xref info: every
    /// object `lopdf` successfully loaded becomes a `Used` entry at gen 0
    /// (the generation lopdf normalizes to once a document is in memory);
    /// anything referenced from the trailer/pages tree but absent from
    /// `doc.objects` is left unrepresented, which `lookup_xref` treats the
    /// same way the source treats a miss against an uninitialised slot.
    pub fn from_lopdf(doc: &lopdf::Document) -> Self {
        let mut table = XrefTable::new();
        for (id, _) in doc.objects.iter() {
            table.insert(IndirectObject {
                objnum: id.0 as i32,
                gen: id.1,
                entry: Use::Used { offset: 0 },
            });
        }
        table
    }
}
