//! Shared scaffolding for the integration suite: building a minimal
//! `lopdf::Document` with specific indirect objects in place, and starting
//! an `ExecutionContext` over it.

use lopdf::Object as LopdfObject;
use pdfcore::context::ExecutionContext;
use pdfcore::context::NullMethods;
use pdfcore::gc::ContextBase;
use pdfcore::params::CoreParams;

pub fn empty_doc() -> lopdf::Document {
    lopdf::Document::with_version("1.7")
}

/// Insert a dictionary object at `objnum` (generation 0).
pub fn put_dict(doc: &mut lopdf::Document, objnum: u32, entries: Vec<(&str, LopdfObject)>) {
    let mut dict = lopdf::Dictionary::new();
    for (k, v) in entries {
        dict.set(k, v);
    }
    doc.objects.insert((objnum, 0), LopdfObject::Dictionary(dict));
}

/// Insert a stream object at `objnum` (generation 0). `filter` is written as
/// the stream dict's `Filter` entry verbatim (bare name, array, or omitted
/// by passing `None`).
pub fn put_stream(doc: &mut lopdf::Document, objnum: u32, filter: Option<LopdfObject>, content: Vec<u8>) {
    let mut dict = lopdf::Dictionary::new();
    if let Some(f) = filter {
        dict.set("Filter", f);
    }
    let stream = lopdf::Stream::new(dict, content);
    doc.objects.insert((objnum, 0), LopdfObject::Stream(stream));
}

/// Begins a context on a throwaway base -- most tests here only care about
/// the context itself, not the base-linking bookkeeping `begin`/`end` does
/// on the side (see `execution_lifecycle.rs` for tests of that).
pub fn begin_ctx(doc: lopdf::Document) -> ExecutionContext<NullMethods> {
    let mut base = ContextBase::new("test");
    ExecutionContext::begin(doc, CoreParams::default(), NullMethods, 1, &mut base).expect("begin_execution_context")
}
