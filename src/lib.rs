//! # pdfcore
//!
//! A PDF execution core: the object allocator, dictionary/name cache,
//! xref cache and sweeper, stream/filter chain, and execution/marking
//! context layer that sits beneath a PDF interpreter. This crate hosts
//! `lopdf` as its syntax parser and re-expresses the parsed tree as its
//! own accounted, cycle-safe value graph.
//!
//! ## Layout
//!
//! - [`value`] / [`dict`] -- the tagged value union and the name-keyed
//!   dictionary it's built from.
//! - [`name_cache`] -- process-wide name interning.
//! - [`pool`] -- `create_dict`/`create_array`/`create_string` constructors.
//! - [`xref`] / [`xref_cache`] -- the locator table and the resolved-value
//!   cache with its page-lifetime sweeper.
//! - [`filter`] / [`stream`] / [`registry`] -- filter chains and the
//!   stream table they decode into.
//! - [`memory`] / [`gc`] -- pool accounting and context-base bookkeeping.
//! - [`params`] -- the parameter surface clients can tune.
//! - [`convert`] -- relabels a parsed `lopdf::Document` into this crate's
//!   value tree.
//! - [`context`] -- `ExecutionContext`/`MarkingContext`, which own and
//!   orchestrate everything above.

#![allow(dead_code)]

pub mod context;
pub mod convert;
pub mod dict;
pub mod error;
pub mod filter;
pub mod gc;
pub mod memory;
pub mod name_cache;
pub mod params;
pub mod pool;
pub mod registry;
pub mod stream;
pub mod value;
pub mod xref;
pub mod xref_cache;

pub use context::{ExecutionContext, ExecutionMethods, MarkingContext, MarkingContextKind, NullMethods};
pub use dict::Dictionary;
pub use error::{CoreError, CoreErrorKind, Error, Result};
pub use params::CoreParams;
pub use value::{Access, Object, Reference, StreamId, Value};
