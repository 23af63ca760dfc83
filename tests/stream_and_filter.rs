//! Filter-chain creation, rewinding, and the low-memory size accounting
//! that leans on it.

mod support;

use pdfcore::context::MarkingContextKind;
use pdfcore::dict::Dictionary;
use pdfcore::stream::FilterStage;

use support::{begin_ctx, empty_doc};

#[test]
fn filter_list_creation_expands_abbreviations_in_order() {
    let mut ctx = begin_ctx(empty_doc());
    let dict = Dictionary::with_capacity(0, 0).unwrap();
    let names = vec![b"A85".to_vec(), b"Fl".to_vec()];
    let id = ctx.create_filter_list(1, 0, dict, &names, b"raw".to_vec()).unwrap();

    // the stream is registered, open, and rewindable (rewind_stream returns
    // true only for an open stream)
    assert!(ctx.rewind_stream(id).unwrap());
}

#[test]
fn measure_purgeable_streams_accounts_for_each_chain_stage() {
    let mut ctx = begin_ctx(empty_doc());
    let dict = Dictionary::with_capacity(0, 0).unwrap();
    ctx.create_filter_list(1, 0, dict, &[b"Fl".to_vec()], b"raw".to_vec()).unwrap();

    let measured = ctx.measure_purgeable_streams();
    assert!(measured >= std::mem::size_of::<FilterStage>());
}

#[test]
fn create_filter_list_rejects_an_unrecognized_name() {
    let mut ctx = begin_ctx(empty_doc());
    let dict = Dictionary::with_capacity(0, 0).unwrap();
    let result = ctx.create_filter_list(1, 0, dict, &[b"NotAFilter".to_vec()], b"raw".to_vec());
    assert!(result.is_err());
}

#[test]
fn a_second_rewind_within_one_marking_context_does_not_break_the_restore() {
    let mut ctx = begin_ctx(empty_doc());
    ctx.begin_marking_context(None, MarkingContextKind::Page).unwrap();

    let dict = Dictionary::with_capacity(0, 0).unwrap();
    let id = ctx.create_filter_list(1, 0, dict, &[], b"abc".to_vec()).unwrap();

    assert!(ctx.rewind_stream(id).unwrap());
    assert!(ctx.rewind_stream(id).unwrap());

    // end_marking_context is the AND of the client hook and the restore
    // pass; both succeed here even though the stream was rewound twice.
    assert!(ctx.end_marking_context().unwrap());
}
