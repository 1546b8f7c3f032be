//! # GML-LS Core
//!
//! The incremental analysis backend that underpins the GML-LS binary, in a
//! separate library so that tests and benchmarks have something to link against.
//!
//! Every document edit flows through the same pipeline:
//! [matching](pipeline::matching) → [syntax diagnostics](pipeline::syntax) →
//! [semantic passes](passes) → [reconciliation](reconcile) against the shared
//! [symbol store](store). The [session controller](session) serializes that
//! pipeline per document.

use std::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;

pub mod config;
pub mod error;
pub mod gml;
pub mod lines;
pub mod passes;
pub mod pipeline;
pub mod reconcile;
pub mod server;
pub mod session;
pub mod setup;
pub mod store;
pub mod util;
pub mod workspace;

#[cfg(test)]
mod test;

pub use error::Error;

pub type ErrorBox = Box<dyn std::error::Error + Send + Sync>;
pub type UnitResult = Result<(), Error>;
pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;
