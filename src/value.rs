//! The tagged value union at the heart of the object model (spec §3
//! "Value", §4.A). Compound values are ordinary owned Rust trees
//! (`Box`/`Vec`/`Dictionary`); the only indirection kept out-of-band is the
//! stream, whose heavyweight filter-chain state lives in the execution
//! context and is referenced here by a `StreamId` (see `src/stream.rs` and
//! spec §9 "Stream lifetime vs. value lifetime").

use bitflags::bitflags;

use crate::dict::Dictionary;
use crate::name_cache::NameId;

/// `(objnum, gen)` -- identifies an indirect object in the xref table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub objnum: i32,
    pub gen: u16,
}

impl Reference {
    pub fn new(objnum: i32, gen: u16) -> Self {
        Reference { objnum, gen }
    }
}

/// Opaque handle into an execution context's stream list / xref cache slot
/// (the source's `HqnCacheSlot`). A `Value::Stream` never owns filter-chain
/// state directly; see spec §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub i32);

bitflags! {
    /// Access-permission bits carried by every value (spec §3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        const READABLE   = 0b001;
        const WRITABLE   = 0b010;
        const EXECUTABLE = 0b100;
    }
}

impl Default for Access {
    fn default() -> Self {
        // A freshly created literal value is fully accessible; the PDF
        // syntax layer never marks anything executable, only the (out of
        // scope) PostScript-level interpreter does.
        Access::READABLE | Access::WRITABLE
    }
}

/// The tagged union itself. `String`/`LongString` and `Array`/`LongArray`
/// are kept as distinct variants (rather than collapsed to one, unbounded
/// Rust `Vec`/`String`) purely to preserve the spec's length-limit
/// distinction at *creation* time (`create_string` vs. `create_longstring`,
/// see `src/pool.rs`); once created, both are read identically.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Real(f64),
    Name(NameId),
    /// <= 65535 bytes, created via `create_string`.
    String(Vec<u8>),
    /// Arbitrary length, created via `create_longstring`.
    LongString(Vec<u8>),
    /// <= 65535 elements, created via `create_array`.
    Array(Vec<Object>),
    /// Arbitrary length, created via `create_longarray`.
    LongArray(Vec<Object>),
    /// A packed (read-only, compactly stored) array -- produced by the
    /// parser for literal arrays that are never mutated in place.
    PackedArray(Vec<Object>),
    Dictionary(Dictionary),
    /// Non-owning handle to a stream's filter chain.
    Stream(StreamId),
    Reference(Reference),
    Operator(NameId),
    FileOffset(u64),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::Name(_) => "name",
            Value::String(_) => "string",
            Value::LongString(_) => "longstring",
            Value::Array(_) => "array",
            Value::LongArray(_) => "longarray",
            Value::PackedArray(_) => "packedarray",
            Value::Dictionary(_) => "dictionary",
            Value::Stream(_) => "stream",
            Value::Reference(_) => "reference",
            Value::Operator(_) => "operator",
            Value::FileOffset(_) => "fileoffset",
        }
    }

    /// Compound values are the ones whose free/copy/resolve must recurse.
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::LongArray(_) | Value::PackedArray(_) | Value::Dictionary(_)
        )
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Value::Stream(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Reference(_))
    }

    pub fn as_reference(&self) -> Option<Reference> {
        match self {
            Value::Reference(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Value::Array(a) | Value::LongArray(a) | Value::PackedArray(a) => Some(a),
            _ => None,
        }
    }
}

/// A value together with the access bits and save-level tag the source's
/// `OBJECT` struct carries alongside every value (spec §3, §9). Access
/// permissions and save-level are preserved across lookup but ignored by
/// equality comparison (`compare_objects`), matching the spec's explicit
/// invariant in §4.B.
#[derive(Debug, Clone)]
pub struct Object {
    pub value: Value,
    pub access: Access,
    pub save_level: u32,
}

impl Object {
    pub fn new(value: Value, save_level: u32) -> Self {
        Object {
            value,
            access: Access::default(),
            save_level,
        }
    }

    pub fn literal(value: Value) -> Self {
        Object::new(value, 0)
    }
}

/// Structural equality per spec's `compare_objects`: access bits and
/// save-level are ignored, only the value graph matters. Streams compare by
/// identity (their `StreamId`), as spec §8's round-trip law states.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_equality_ignores_access_and_save_level() {
        let mut a = Object::new(Value::Int(4), 0);
        let mut b = Object::new(Value::Int(4), 7);
        b.access = Access::READABLE;
        a.access = Access::READABLE | Access::WRITABLE | Access::EXECUTABLE;
        assert_eq!(a, b);
    }

    #[test]
    fn streams_are_distinguished_by_id() {
        let a = Object::literal(Value::Stream(StreamId(1)));
        let b = Object::literal(Value::Stream(StreamId(2)));
        assert_ne!(a, b);
    }
}
