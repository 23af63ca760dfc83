//! The filter registry (spec §6 "a filter registry: look up a filter
//! template by name, external or built-in"). `create_filter` consults an
//! external registry first, falling back to the built-in one that ships
//! with this crate (spec §4.D step 2).

use crate::error::{core_err, CoreErrorKind, Result};
use crate::filter::FilterKind;

/// A filter template: enough to construct a `FilterStage` for a given
/// name. The built-in registry's templates are exactly `FilterKind`'s
/// variants; an external registry can supply additional named filters
/// (e.g. a vendor-specific image codec) that resolve to the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterTemplate {
    pub kind: FilterKind,
}

/// Capability an embedding application can supply to extend filter
/// resolution beyond the built-ins (spec §6's "external filter registry").
pub trait FilterRegistry {
    fn lookup(&self, name: &[u8]) -> Option<FilterTemplate>;
}

/// A registry with no external entries; every lookup falls through to the
/// built-in table.
pub struct EmptyRegistry;

impl FilterRegistry for EmptyRegistry {
    fn lookup(&self, _name: &[u8]) -> Option<FilterTemplate> {
        None
    }
}

/// Resolve `name` to a `FilterTemplate`, trying `external` first (spec
/// §4.D step 2: "first in the external filter registry, then in the
/// built-in registry"), expanding the standard abbreviations along the way.
pub fn resolve_filter(external: &dyn FilterRegistry, name: &[u8]) -> Result<FilterTemplate> {
    if let Some(template) = external.lookup(name) {
        return Ok(template);
    }
    match FilterKind::from_name(name) {
        Ok(kind) => Ok(FilterTemplate { kind }),
        Err(_) => core_err(CoreErrorKind::Undefined, "resolve_filter: name not in external or built-in registry"),
    }
}
