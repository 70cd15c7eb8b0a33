//! Shared identifier types for the memoload module-load cache.
//!
//! The cache itself is generic over its key and dependency types. This crate
//! provides the concrete ones most hosts use: interned labels, evaluation
//! context fingerprints, and the module and low-level dependency keys built
//! from them.

#![warn(missing_docs)]

pub mod context;
pub mod key;
pub mod label;

pub use context::{ContextHasher, EvalContext};
pub use key::{DepKey, DepKind, ModuleKey};
pub use label::{Label, LabelTable};
