//! Parsing and validation of `memoload.toml`.
//!
//! Produces a strongly-typed [`MemoloadConfig`] whose `[cache]` section
//! controls how the module-load interner holds and shards its table.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use types::{CacheConfig, MemoloadConfig, Retention};
