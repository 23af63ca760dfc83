//! Errors for pdfcore
//!
//! error_chain and failure are certainly nice, but completely overengineered
//! for this use-case. For example, neither of them allow error localization
//! the way the eight PostScript-derived error kinds below do. So, as in the
//! rest of this crate's lineage: just enums, `From` + pattern matching.

use std::error::Error as IError;
use std::fmt;
use std::io::Error as IoError;

macro_rules! impl_from {
    ($from:ident, $to:ident::$variant:ident) => {
        impl From<$from> for $to {
            fn from(err: $from) -> Self {
                $to::$variant(err.into())
            }
        }
    };
}

/// The eight abstract error kinds from the execution core's error design
/// (see spec §7). These are the only kinds any core operation can fail
/// with; they do not carry positional/file information themselves (that
/// is layered on by `Error::Core`'s `context` field).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CoreErrorKind {
    /// Memory allocation failed.
    VmError,
    /// A hard bound was exceeded (recursion depth, nesting, string/array length).
    LimitCheck,
    /// A numeric argument was out of range.
    RangeCheck,
    /// An object had the wrong type for the operation.
    TypeCheck,
    /// A name (typically a filter) was not found.
    Undefined,
    /// An indirect reference resolved to nothing.
    UndefinedResource,
    /// The parser returned nothing when a value was expected.
    UndefinedResult,
    /// A permission-protected value was accessed without override.
    InvalidAccess,
}

impl fmt::Display for CoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use CoreErrorKind::*;
        write!(
            f,
            "{}",
            match self {
                VmError => "vmerror",
                LimitCheck => "limitcheck",
                RangeCheck => "rangecheck",
                TypeCheck => "typecheck",
                Undefined => "undefined",
                UndefinedResource => "undefinedresource",
                UndefinedResult => "undefinedresult",
                InvalidAccess => "invalidaccess",
            }
        )
    }
}

impl IError for CoreErrorKind {}

/// A core error: one of the eight kinds, with a short static description
/// of which operation raised it. Mirrors the source's "boolean return plus
/// thread-local error code" design as an explicit `Result<T, Error>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoreError {
    pub kind: CoreErrorKind,
    pub context: &'static str,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, context: &'static str) -> Self {
        CoreError { kind, context }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.context)
    }
}

impl IError for CoreError {}

#[derive(Debug)]
pub enum Error {
    /// External: std::io::Error (file/device boundary)
    Io(IoError),
    /// External: lopdf parse/write error (the hosted PDF syntax parser)
    Parse(lopdf::Error),
    /// Core execution error (spec §7 kinds)
    Core(CoreError),
}

impl_from!(IoError, Error::Io);
impl_from!(lopdf::Error, Error::Parse);
impl_from!(CoreError, Error::Core);

impl From<(CoreErrorKind, &'static str)> for Error {
    fn from((kind, context): (CoreErrorKind, &'static str)) -> Self {
        Error::Core(CoreError::new(kind, context))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{e}"),
            Error::Parse(e) => write!(f, "{e}"),
            Error::Core(e) => write!(f, "{e}"),
        }
    }
}

impl IError for Error {}

pub type Result<T> = ::std::result::Result<T, Error>;

/// Shorthand used throughout the core to build a `CoreError` at the call site.
#[inline]
pub fn core_err<T>(kind: CoreErrorKind, context: &'static str) -> Result<T> {
    Err(Error::Core(CoreError::new(kind, context)))
}
