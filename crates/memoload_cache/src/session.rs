//! Session-scoped owner of the module-load cache.

use std::fmt;
use std::sync::Arc;

use memoload_config::CacheConfig;
use tracing::info;

use crate::builder::EntryBuilder;
use crate::entry::{CacheKey, EntryRef};
use crate::interner::{EntryInterner, InternerStats};

/// The module-load cache for one evaluation session.
///
/// Cloning is cheap and every clone shares the same table, so a host can hand
/// one to each evaluation worker. The host decides when the table is
/// invalidated; nothing in here evicts on its own.
pub struct LoadCache<K, V, D> {
    interner: Arc<EntryInterner<K, V, D>>,
}

impl<K, V, D> LoadCache<K, V, D>
where
    K: CacheKey,
    V: fmt::Debug,
    D: fmt::Debug,
{
    /// Creates an empty cache configured by `config`.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            interner: Arc::new(EntryInterner::with_config(config)),
        }
    }

    /// Starts recording a new module evaluation.
    pub fn builder(&self) -> EntryBuilder<K, V, D> {
        EntryBuilder::new(Arc::clone(&self.interner))
    }

    /// The cached entry for `key`, if one is live.
    pub fn get(&self, key: &K) -> Option<EntryRef<K, V, D>> {
        self.interner.get(key)
    }

    /// Drops `key` from the cache. Returns `true` if it was present.
    pub fn evict(&self, key: &K) -> bool {
        self.interner.evict(key)
    }

    /// Forgets every cached entry. Returns how many slots were cleared.
    pub fn invalidate_all(&self) -> usize {
        let cleared = self.interner.clear();
        info!(cleared, "invalidated module-load cache");
        cleared
    }

    /// Drops bookkeeping for released entries under weak retention.
    pub fn purge_dead(&self) -> usize {
        self.interner.purge_dead()
    }

    /// Interner activity counters.
    pub fn stats(&self) -> InternerStats {
        self.interner.stats()
    }

    /// The underlying interner.
    pub fn interner(&self) -> &Arc<EntryInterner<K, V, D>> {
        &self.interner
    }
}

impl<K, V, D> Clone for LoadCache<K, V, D> {
    fn clone(&self) -> Self {
        Self {
            interner: Arc::clone(&self.interner),
        }
    }
}

impl<K, V, D> Default for LoadCache<K, V, D>
where
    K: CacheKey,
    V: fmt::Debug,
    D: fmt::Debug,
{
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoload_config::Retention;

    type Cache = LoadCache<&'static str, u32, &'static str>;

    type Entry = EntryRef<&'static str, u32, &'static str>;

    fn load(cache: &Cache, key: &'static str, value: u32) -> Entry {
        let mut b = cache.builder();
        b.set_key(key).unwrap().set_value(value).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn clones_share_one_table() {
        let cache = Cache::default();
        let other = cache.clone();
        let entry = load(&cache, "//a:x.cfg", 1);
        assert!(Arc::ptr_eq(&entry, &other.get(&"//a:x.cfg").unwrap()));
    }

    #[test]
    fn invalidate_all_clears_entries() {
        let cache = Cache::default();
        load(&cache, "//a:x.cfg", 1);
        load(&cache, "//b:x.cfg", 2);
        assert_eq!(cache.invalidate_all(), 2);
        assert!(cache.get(&"//a:x.cfg").is_none());

        let rebuilt = load(&cache, "//a:x.cfg", 3);
        assert_eq!(*rebuilt.value(), 3);
    }

    #[test]
    fn evict_single_key() {
        let cache = Cache::default();
        load(&cache, "//a:x.cfg", 1);
        load(&cache, "//b:x.cfg", 2);
        assert!(cache.evict(&"//a:x.cfg"));
        assert!(cache.get(&"//a:x.cfg").is_none());
        assert!(cache.get(&"//b:x.cfg").is_some());
    }

    #[test]
    fn weak_config_releases_unheld_entries() {
        let cache = Cache::new(&CacheConfig {
            retention: Retention::Weak,
            ..CacheConfig::default()
        });
        let held = load(&cache, "//held:x.cfg", 1);
        load(&cache, "//gone:x.cfg", 2);
        assert!(cache.get(&"//gone:x.cfg").is_none());
        assert_eq!(cache.purge_dead(), 1);
        assert!(Arc::ptr_eq(&held, &cache.get(&"//held:x.cfg").unwrap()));
    }

    #[test]
    fn stats_count_reuse() {
        let cache = Cache::default();
        load(&cache, "//a:x.cfg", 1);
        load(&cache, "//a:x.cfg", 2);
        let stats = cache.stats();
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.slots, 1);
    }
}
