//! Object creation (spec §4.A `create_dict`/`create_array`/`create_string`/
//! `create_longstring`).
//!
//! The recursive operations that need whole-context state -- `free_value`,
//! `copy_value`, `resolve_indirect` -- live on `ExecutionContext` in
//! `src/context.rs`, since they consult the recursion-depth counter and (for
//! streams) the xref cache. This module only holds the constructors and
//! the length/capacity ceilings they enforce.

use crate::dict::Dictionary;
use crate::error::{core_err, CoreErrorKind, Result};
use crate::value::{Object, Value};

/// Hard ceiling on a literal array's element count (spec's `MAXPSARRAY`).
pub const MAX_ARRAY_LEN: usize = 65_535;
/// Hard ceiling on a short string's byte length (spec's `MAXPSSTRING`).
pub const MAX_STRING_LEN: usize = 65_535;

/// `create_dict(ctx, capacity)`.
pub fn create_dict(capacity: usize, save_level: u32) -> Result<Object> {
    let dict = Dictionary::with_capacity(capacity, save_level)?;
    Ok(Object::new(Value::Dictionary(dict), save_level))
}

/// `create_array(ctx, length)`: length > MAXPSARRAY fails with `limitcheck`.
pub fn create_array(length: usize, save_level: u32) -> Result<Object> {
    if length > MAX_ARRAY_LEN {
        return core_err(CoreErrorKind::LimitCheck, "create_array: length exceeds MAXPSARRAY");
    }
    let elems = (0..length).map(|_| Object::new(Value::Null, save_level)).collect();
    Ok(Object::new(Value::Array(elems), save_level))
}

/// `create_longarray(ctx, length)`: arbitrary length, no ceiling.
pub fn create_longarray(length: usize, save_level: u32) -> Result<Object> {
    let elems = (0..length).map(|_| Object::new(Value::Null, save_level)).collect();
    Ok(Object::new(Value::LongArray(elems), save_level))
}

/// `create_string(ctx, length)`: length > MAXPSSTRING fails with `limitcheck`.
pub fn create_string(length: usize, save_level: u32) -> Result<Object> {
    if length > MAX_STRING_LEN {
        return core_err(CoreErrorKind::LimitCheck, "create_string: length exceeds MAXPSSTRING");
    }
    Ok(Object::new(Value::String(vec![0u8; length]), save_level))
}

/// `create_longstring(ctx, length)`: arbitrary length.
pub fn create_longstring(length: usize, save_level: u32) -> Result<Object> {
    Ok(Object::new(Value::LongString(vec![0u8; length]), save_level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_length_zero_is_fine() {
        let o = create_array(0, 0).unwrap();
        assert_eq!(o.value.as_array().unwrap().len(), 0);
    }

    #[test]
    fn array_over_limit_fails() {
        assert!(create_array(MAX_ARRAY_LEN + 1, 0).is_err());
    }

    #[test]
    fn longarray_over_short_limit_succeeds() {
        assert!(create_longarray(MAX_ARRAY_LEN + 1, 0).is_ok());
    }

    #[test]
    fn string_length_zero_is_fine() {
        let o = create_string(0, 0).unwrap();
        match o.value {
            Value::String(ref s) => assert!(s.is_empty()),
            _ => panic!("wrong variant"),
        }
    }
}
