//! Configuration types deserialized from `memoload.toml`.

use serde::Deserialize;

/// The top-level configuration parsed from `memoload.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoloadConfig {
    /// Module-load cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Settings for the module-load interner.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// How the interner holds canonical entries.
    #[serde(default)]
    pub retention: Retention,
    /// Table capacity to reserve up front.
    #[serde(default)]
    pub initial_capacity: usize,
    /// Number of lock shards. Must be a power of two greater than one.
    /// Left unset, the table picks a count from the available parallelism.
    #[serde(default)]
    pub shards: Option<usize>,
}

/// Whether the interner keeps canonical entries alive on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retention {
    /// Entries stay cached until evicted or the table is cleared.
    #[default]
    Strong,
    /// Entries are cached only while some caller still holds them.
    Weak,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_config() {
        let config = CacheConfig::default();
        assert_eq!(config.retention, Retention::Strong);
        assert_eq!(config.initial_capacity, 0);
        assert!(config.shards.is_none());
    }

    #[test]
    fn retention_parses_lowercase() {
        let config: CacheConfig = toml::from_str("retention = \"weak\"").unwrap();
        assert_eq!(config.retention, Retention::Weak);
    }
}
