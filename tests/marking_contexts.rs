//! Marking-context nesting: LIFO discipline and resource inheritance by
//! element-copy rather than by reference.

mod support;

use pdfcore::context::{MarkingContextKind, ResourceCacheSlot, MAX_MC_NESTCOUNT};
use pdfcore::name_cache::intern;
use pdfcore::{Object, Value};

use support::{begin_ctx, empty_doc};

#[test]
fn begin_end_nesting_is_lifo_and_a_mismatched_end_fails() {
    let mut ctx = begin_ctx(empty_doc());
    ctx.begin_marking_context(None, MarkingContextKind::Page).unwrap();
    ctx.begin_marking_context(None, MarkingContextKind::Form).unwrap();
    ctx.begin_marking_context(None, MarkingContextKind::CharProc).unwrap();

    assert!(ctx.end_marking_context().unwrap());
    assert!(ctx.end_marking_context().unwrap());
    assert!(ctx.end_marking_context().unwrap());
    // every begin has now been matched; one more end has nothing to close
    assert!(ctx.end_marking_context().is_err());
}

#[test]
fn nesting_exactly_at_the_limit_succeeds_one_more_fails() {
    let mut ctx = begin_ctx(empty_doc());
    for _ in 0..MAX_MC_NESTCOUNT {
        ctx.begin_marking_context(None, MarkingContextKind::Page).unwrap();
    }
    assert!(ctx.begin_marking_context(None, MarkingContextKind::Page).is_err());
}

#[test]
fn child_resource_cache_is_inherited_by_copy_not_by_reference() {
    let mut ctx = begin_ctx(empty_doc());
    ctx.begin_marking_context(None, MarkingContextKind::Page).unwrap();

    let gray_name = intern(b"DeviceGray").unwrap();
    ctx.current_mc_mut().set_resource(ResourceCacheSlot::DefaultGray, Object::literal(Value::Name(gray_name)));

    ctx.begin_marking_context(None, MarkingContextKind::Form).unwrap();
    assert_eq!(
        ctx.current_mc().resource(ResourceCacheSlot::DefaultGray).unwrap().value,
        Value::Name(gray_name)
    );

    let rgb_name = intern(b"DeviceRGB").unwrap();
    ctx.current_mc_mut().set_resource(ResourceCacheSlot::DefaultGray, Object::literal(Value::Name(rgb_name)));
    ctx.end_marking_context().unwrap();

    // the parent's slot was untouched by the child's mutation
    assert_eq!(
        ctx.current_mc().resource(ResourceCacheSlot::DefaultGray).unwrap().value,
        Value::Name(gray_name)
    );
}
