//! Incremental module-load cache.
//!
//! Memoizes the result of loading a configuration module together with the
//! dependency structure the host evaluation engine needs to invalidate it:
//! the low-level keys the module looked up itself, and the cached entries of
//! the modules it loaded. Entries are canonicalized per module key, so racing
//! workers that load the same module converge on one shared entry, and a
//! deduplicating traversal hands the full dependency closure back to the host.

#![warn(missing_docs)]

pub mod builder;
pub mod entry;
pub mod error;
pub mod interner;
pub mod modules;
pub mod session;
pub mod traversal;

pub use builder::{BuilderState, EntryBuilder};
pub use entry::{CacheEntry, CacheKey, DependencyGroup, EntryRef};
pub use error::{CacheError, FaultCause};
pub use interner::{EntryInterner, InternerStats};
pub use modules::{ModuleBuilder, ModuleCache, ModuleEntry, ResolvedDep};
pub use session::LoadCache;
pub use traversal::{
    sink_fn, traverse, DependencyGroupSink, FnSink, InterruptFlag, Interrupted, Interruptible,
    Traversal, TraversalStats,
};
