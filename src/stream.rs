//! The stream registry (spec §3 "Stream", §4.D). A `Value::Stream` is a
//! non-owning `StreamId` into the table this module keeps; the table owns
//! the raw bytes and the constructed filter chain, and is itself owned by
//! whichever `ExecutionContext` opened the stream (spec §9).

use crate::dict::Dictionary;
use crate::error::{core_err, CoreErrorKind, Result};
use crate::filter::{decode_one, FilterKind};
use crate::value::StreamId;

/// One link in a stream's filter chain, in application order (spec §4.D:
/// "filters apply in array order, first to last").
#[derive(Debug, Clone)]
pub struct FilterStage {
    pub kind: FilterKind,
}

/// A stream's decode state. Built from a stream dictionary's `Filter`
/// (single name or array) and paired `DecodeParms`; `raw` is the encoded
/// bytes as they sit in the file, `decoded` is filled in lazily the first
/// time the chain is run (spec's "decode on demand, cache the result").
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub objnum: i32,
    pub gen: u16,
    pub dict: Dictionary,
    pub chain: Vec<FilterStage>,
    pub raw: Vec<u8>,
    decoded: Option<Vec<u8>>,
    /// Set once this stream's dict-only cache entry has been promoted to a
    /// full load (spec §4.C step 3's "dict-only, then full" two-phase
    /// pattern).
    pub dict_only: bool,
    /// The xref cache objnum this stream's dictionary was stamped with at
    /// creation time -- the source's `HqnCacheSlot` (spec glossary). `None`
    /// for a stream with no backing cache entry, which is freed eagerly
    /// instead of going through the deferred-flush dance (spec §4.D).
    pub hqn_cache_slot: Option<i32>,
    pub rewindable: bool,
    open: bool,
}

impl StreamEntry {
    pub fn new(objnum: i32, gen: u16, dict: Dictionary, chain: Vec<FilterStage>, raw: Vec<u8>, dict_only: bool) -> Self {
        StreamEntry {
            objnum,
            gen,
            dict,
            chain,
            raw,
            decoded: None,
            dict_only,
            hqn_cache_slot: None,
            rewindable: true,
            open: true,
        }
    }

    /// Run the whole chain, caching the result. Image-terminal filters
    /// (CCITT/DCT/JPX) stop the chain at opaque bytes, matching spec §4.D.
    pub fn decode(&mut self) -> Result<&[u8]> {
        if self.decoded.is_none() {
            let mut bytes = self.raw.clone();
            for stage in &self.chain {
                bytes = decode_one(stage.kind, &bytes)?;
                if stage.kind.is_terminal_opaque() {
                    break;
                }
            }
            self.decoded = Some(bytes);
        }
        Ok(self.decoded.as_deref().unwrap())
    }

    /// `measure_purgeable_streams`'s per-entry contribution: raw bytes plus
    /// any cached decoded bytes plus one filter-handle's worth of fixed
    /// overhead per chain stage (spec §4.D low-memory accounting).
    pub fn measure(&self) -> usize {
        const FILTER_HANDLE_OVERHEAD: usize = std::mem::size_of::<FilterStage>();
        self.raw.len() + self.decoded.as_ref().map_or(0, |d| d.len()) + self.chain.len() * FILTER_HANDLE_OVERHEAD
    }

    /// `pdf_rewindstream`: discard the decoded cache so the next `decode`
    /// call reruns the chain from `raw`.
    pub fn rewind(&mut self) {
        self.decoded = None;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Close the filter chain. Idempotent; closing an already-closed stream
    /// is a no-op, matching the source's "close is safe to call twice".
    pub fn close(&mut self) {
        self.open = false;
        self.decoded = None;
    }
}

/// Build a stream's filter chain from its dictionary's `Filter` entry,
/// which PDF allows as either a single name or an array of names (spec
/// §4.D: "Filter may be a bare name or an array").
pub fn build_chain(filter_names: &[Vec<u8>]) -> Result<Vec<FilterStage>> {
    filter_names
        .iter()
        .map(|name| Ok(FilterStage { kind: FilterKind::from_name(name)? }))
        .collect()
}

/// The registry of streams opened by one execution context. Slots are
/// reused (spec §4.D: "closing a stream releases its slot for reuse"),
/// keyed by a monotonically issued `StreamId` rather than by array index
/// directly, so a stale `StreamId` held elsewhere fails loudly instead of
/// silently addressing a different stream.
#[derive(Default)]
pub struct StreamTable {
    entries: Vec<Option<StreamEntry>>,
    next_generation: Vec<u32>,
}

impl StreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, entry: StreamEntry) -> StreamId {
        for (idx, slot) in self.entries.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(entry);
                return StreamId(encode_slot(idx, self.next_generation[idx]));
            }
        }
        let idx = self.entries.len();
        self.entries.push(Some(entry));
        self.next_generation.push(0);
        StreamId(encode_slot(idx, 0))
    }

    pub fn get(&self, id: StreamId) -> Result<&StreamEntry> {
        let (idx, gen) = decode_slot(id.0);
        match self.entries.get(idx).and_then(|s| s.as_ref()) {
            Some(entry) if self.next_generation[idx] == gen => Ok(entry),
            _ => core_err(CoreErrorKind::UndefinedResource, "get: stale or unknown StreamId"),
        }
    }

    pub fn get_mut(&mut self, id: StreamId) -> Result<&mut StreamEntry> {
        let (idx, gen) = decode_slot(id.0);
        if self.next_generation.get(idx).copied() != Some(gen) {
            return core_err(CoreErrorKind::UndefinedResource, "get_mut: stale or unknown StreamId");
        }
        match self.entries.get_mut(idx).and_then(|s| s.as_mut()) {
            Some(entry) => Ok(entry),
            None => core_err(CoreErrorKind::UndefinedResource, "get_mut: slot empty"),
        }
    }

    /// Close and free a stream's slot, bumping its generation so any
    /// outstanding `StreamId` into it becomes detectably stale.
    pub fn close(&mut self, id: StreamId) -> Result<()> {
        let (idx, gen) = decode_slot(id.0);
        if self.next_generation.get(idx).copied() != Some(gen) {
            return core_err(CoreErrorKind::UndefinedResource, "close: stale or unknown StreamId");
        }
        if let Some(entry) = self.entries[idx].as_mut() {
            entry.close();
        }
        self.entries[idx] = None;
        // Keep this in the same 8-bit range `encode_slot` packs into a
        // `StreamId`, or a slot's generation silently diverges from what
        // any `StreamId` minted from it can ever compare equal to again.
        self.next_generation[idx] = (self.next_generation[idx] + 1) & 0xFF;
        Ok(())
    }

    pub fn open_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// `measure_purgeable_streams`: total accounting across every open
    /// stream entry (spec §4.D).
    pub fn measure_purgeable(&self) -> usize {
        self.entries.iter().flatten().map(|e| e.measure()).sum()
    }
}

/// Pack (slot index, generation) into the `i32` a `StreamId` carries. 24
/// bits of index, 8 of generation is ample for any single document's
/// concurrently open stream count.
fn encode_slot(idx: usize, generation: u32) -> i32 {
    ((generation & 0xFF) << 24 | (idx as u32 & 0x00FF_FFFF)) as i32
}

fn decode_slot(packed: i32) -> (usize, u32) {
    let bits = packed as u32;
    ((bits & 0x00FF_FFFF) as usize, (bits >> 24) & 0xFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flate_stream(raw: Vec<u8>) -> StreamEntry {
        StreamEntry::new(1, 0, Dictionary::default(), vec![FilterStage { kind: FilterKind::FlateDecode }], raw, false)
    }

    #[test]
    fn open_then_get_round_trips() {
        let mut table = StreamTable::new();
        let id = table.open(flate_stream(vec![]));
        assert!(table.get(id).is_ok());
    }

    #[test]
    fn close_frees_slot_for_reuse() {
        let mut table = StreamTable::new();
        let id = table.open(flate_stream(vec![]));
        table.close(id).unwrap();
        assert_eq!(table.open_count(), 0);
        let id2 = table.open(flate_stream(vec![]));
        assert!(table.get(id2).is_ok());
    }

    #[test]
    fn stale_id_after_close_is_rejected() {
        let mut table = StreamTable::new();
        let id = table.open(flate_stream(vec![]));
        table.close(id).unwrap();
        assert!(table.get(id).is_err());
    }

    #[test]
    fn generation_wraps_without_rejecting_the_live_id() {
        let mut table = StreamTable::new();
        let mut id = table.open(flate_stream(vec![]));
        // Cycle the same slot past a generation wraparound; each freshly
        // opened id must still resolve.
        for _ in 0..300 {
            table.close(id).unwrap();
            id = table.open(flate_stream(vec![]));
            assert!(table.get(id).is_ok());
        }
    }

    #[test]
    fn abbreviation_and_full_name_build_the_same_chain() {
        let a = build_chain(&[b"Fl".to_vec()]).unwrap();
        let b = build_chain(&[b"FlateDecode".to_vec()]).unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].kind, b[0].kind);
    }

    #[test]
    fn rewind_forces_rerun_of_chain() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"abc").unwrap();
        let raw = enc.finish().unwrap();
        let mut entry = flate_stream(raw);
        assert_eq!(entry.decode().unwrap(), b"abc");
        entry.rewind();
        assert_eq!(entry.decode().unwrap(), b"abc");
    }
}
