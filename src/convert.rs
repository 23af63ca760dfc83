//! Converts `lopdf`'s parsed object tree into this crate's `Value` tree
//! (spec §4.A, grounded on the pattern `deserialize.rs` uses to walk a
//! `lopdf::Document` into `printpdf` types -- match on `lopdf::Object`
//! variants, recurse into compounds, special-case `Stream`).
//!
//! `lopdf` has already done the hard parsing work (tokenizing, xref
//! resolution, object-stream decompression); this module's only job is
//! relabeling its `Object`/`Dictionary` into ours, registering any stream
//! payload with the caller's stream table along the way.

use lopdf::Object as LopdfObject;

use crate::dict::{Dictionary, InsertFlags};
use crate::error::Result;
use crate::name_cache::intern;
use crate::value::{Object, Reference, Value};

/// Callback invoked for each `lopdf::Stream` encountered during
/// conversion: given the stream's already-converted dictionary, its
/// `Filter` names (bare name or array, not yet abbreviation-expanded),
/// and its raw (still-encoded) bytes, register it and hand back the
/// `StreamId` to embed in the `Value::Stream` placeholder. Kept as a
/// closure rather than a trait so callers (just `ExecutionContext`, today)
/// don't need a named type for a single call site.
pub type RegisterStream<'a> = dyn FnMut(Dictionary, Vec<Vec<u8>>, Vec<u8>) -> Result<crate::value::StreamId> + 'a;

pub fn convert_object(src: &LopdfObject, save_level: u32, register_stream: &mut RegisterStream) -> Result<Object> {
    let value = convert_value(src, save_level, register_stream)?;
    Ok(Object::new(value, save_level))
}

fn convert_value(src: &LopdfObject, save_level: u32, register_stream: &mut RegisterStream) -> Result<Value> {
    Ok(match src {
        LopdfObject::Null => Value::Null,
        LopdfObject::Boolean(b) => Value::Bool(*b),
        LopdfObject::Integer(i) => Value::Int(*i as i32),
        LopdfObject::Real(r) => Value::Real(*r as f64),
        LopdfObject::Name(n) => Value::Name(intern(n)?),
        LopdfObject::String(bytes, _) => {
            if bytes.len() <= crate::pool::MAX_STRING_LEN {
                Value::String(bytes.clone())
            } else {
                Value::LongString(bytes.clone())
            }
        }
        LopdfObject::Reference(id) => Value::Reference(Reference::new(id.0 as i32, id.1)),
        LopdfObject::Array(items) => {
            let converted: Result<Vec<Object>> = items.iter().map(|o| convert_object(o, save_level, register_stream)).collect();
            let converted = converted?;
            if converted.len() <= crate::pool::MAX_ARRAY_LEN {
                Value::Array(converted)
            } else {
                Value::LongArray(converted)
            }
        }
        LopdfObject::Dictionary(dict) => Value::Dictionary(convert_dict(dict, save_level, register_stream)?),
        LopdfObject::Stream(stream) => {
            let filter_names = filter_names_of(&stream.dict);
            let dict = convert_dict(&stream.dict, save_level, register_stream)?;
            let raw = stream.content.clone();
            let id = register_stream(dict, filter_names, raw)?;
            Value::Stream(id)
        }
    })
}

fn convert_dict(src: &lopdf::Dictionary, save_level: u32, register_stream: &mut RegisterStream) -> Result<Dictionary> {
    let mut dict = Dictionary::with_capacity(src.len(), save_level)?;
    for (key, value) in src.iter() {
        let name_id = intern(key)?;
        let converted = convert_object(value, save_level, register_stream)?;
        dict.insert_hash(name_id, converted, InsertFlags::DICT_ACCESS)?;
    }
    Ok(dict)
}

/// Read a stream dictionary's `Filter` entry (bare name or array of names)
/// as the list `build_chain` wants (spec §4.D: "Filter may be a bare name
/// or an array").
pub fn filter_names_of(dict: &lopdf::Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(LopdfObject::Name(n)) => vec![n.clone()],
        Ok(LopdfObject::Array(items)) => items
            .iter()
            .filter_map(|o| match o {
                LopdfObject::Name(n) => Some(n.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_convert_directly() {
        let mut noop = |_d: Dictionary, _f: Vec<Vec<u8>>, _r: Vec<u8>| -> Result<crate::value::StreamId> { unreachable!() };
        let v = convert_object(&LopdfObject::Integer(42), 0, &mut noop).unwrap();
        assert_eq!(v.value, Value::Int(42));
    }

    #[test]
    fn reference_converts_with_gen() {
        let mut noop = |_d: Dictionary, _f: Vec<Vec<u8>>, _r: Vec<u8>| -> Result<crate::value::StreamId> { unreachable!() };
        let v = convert_object(&LopdfObject::Reference((7, 2)), 0, &mut noop).unwrap();
        assert_eq!(v.value, Value::Reference(Reference::new(7, 2)));
    }

    #[test]
    fn filter_names_reads_array_or_bare_name() {
        let mut d = lopdf::Dictionary::new();
        d.set("Filter", LopdfObject::Name(b"FlateDecode".to_vec()));
        assert_eq!(filter_names_of(&d), vec![b"FlateDecode".to_vec()]);
    }
}
