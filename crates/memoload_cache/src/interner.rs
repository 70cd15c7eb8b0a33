//! Canonicalization table for cache entries.
//!
//! The [`EntryInterner`] is the single piece of state shared between
//! evaluation workers. It maps each module key to the one entry every caller
//! agrees on. Inserting is an atomic "insert if absent, else return the
//! existing entry" so workers that raced to load the same module all end up
//! holding the same instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use memoload_config::{CacheConfig, Retention};
use tracing::{debug, trace, warn};

use crate::entry::{CacheEntry, CacheKey, EntryRef};

/// How a table slot holds its entry.
enum Slot<K, V, D> {
    Strong(EntryRef<K, V, D>),
    Weak(Weak<CacheEntry<K, V, D>>),
}

impl<K, V, D> Slot<K, V, D> {
    fn new(entry: &EntryRef<K, V, D>, retention: Retention) -> Self {
        match retention {
            Retention::Strong => Slot::Strong(Arc::clone(entry)),
            Retention::Weak => Slot::Weak(Arc::downgrade(entry)),
        }
    }

    /// The entry, if it is still alive.
    fn live(&self) -> Option<EntryRef<K, V, D>> {
        match self {
            Slot::Strong(entry) => Some(Arc::clone(entry)),
            Slot::Weak(entry) => entry.upgrade(),
        }
    }

    fn is_dead(&self) -> bool {
        match self {
            Slot::Strong(_) => false,
            Slot::Weak(entry) => entry.strong_count() == 0,
        }
    }
}

/// Counters describing interner activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InternerStats {
    /// Candidates that became canonical.
    pub inserted: u64,
    /// Candidates discarded because a live entry already existed.
    pub reused: u64,
    /// Slots currently in the table, including dead weak slots not yet purged.
    pub slots: usize,
}

/// Concurrency-safe table guaranteeing at most one canonical
/// [`CacheEntry`] per key.
pub struct EntryInterner<K, V, D> {
    table: DashMap<K, Slot<K, V, D>>,
    retention: Retention,
    inserted: AtomicU64,
    reused: AtomicU64,
}

impl<K: CacheKey, V, D> EntryInterner<K, V, D> {
    /// Creates an empty interner with the given retention.
    pub fn new(retention: Retention) -> Self {
        Self::from_table(DashMap::new(), retention)
    }

    /// Creates an interner sized and sharded according to `config`.
    ///
    /// A shard count that is not a power of two greater than one is ignored
    /// and the table falls back to its default sharding.
    pub fn with_config(config: &CacheConfig) -> Self {
        let table = match config.shards {
            Some(shards) if shards > 1 && shards.is_power_of_two() => {
                DashMap::with_capacity_and_shard_amount(config.initial_capacity, shards)
            }
            Some(shards) => {
                warn!(shards, "ignoring invalid interner shard count");
                DashMap::with_capacity(config.initial_capacity)
            }
            None => DashMap::with_capacity(config.initial_capacity),
        };
        Self::from_table(table, config.retention)
    }

    fn from_table(table: DashMap<K, Slot<K, V, D>>, retention: Retention) -> Self {
        Self {
            table,
            retention,
            inserted: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Returns the canonical entry for `candidate`'s key.
    ///
    /// If no live entry exists, `candidate` is stored and returned. Otherwise
    /// `candidate` is dropped and the existing entry is returned. Every caller
    /// interning or looking up the same key gets the same instance until the
    /// key is evicted.
    pub fn intern_or_get(&self, candidate: EntryRef<K, V, D>) -> EntryRef<K, V, D> {
        match self.table.entry(candidate.key().clone()) {
            Entry::Occupied(mut occupied) => {
                if let Some(existing) = occupied.get().live() {
                    self.reused.fetch_add(1, Ordering::Relaxed);
                    debug!(key = ?candidate.key(), "discarding duplicate cache entry candidate");
                    return existing;
                }
                // Weak slot whose entry has been released: the candidate takes over.
                occupied.insert(Slot::new(&candidate, self.retention));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::new(&candidate, self.retention));
            }
        }
        self.inserted.fetch_add(1, Ordering::Relaxed);
        trace!(key = ?candidate.key(), "interned cache entry");
        candidate
    }

    /// The live canonical entry for `key`, if any.
    pub fn get(&self, key: &K) -> Option<EntryRef<K, V, D>> {
        self.table.get(key).and_then(|slot| slot.live())
    }

    /// Removes `key` from the table. Returns `true` if a slot was removed.
    ///
    /// Holders of the evicted entry keep it; the next build for `key`
    /// becomes canonical instead of being collapsed into it.
    pub fn evict(&self, key: &K) -> bool {
        self.table.remove(key).is_some()
    }

    /// Removes every slot. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let slots = self.table.len();
        self.table.clear();
        slots
    }

    /// Drops weak slots whose entries have been released. Returns how many
    /// were removed. Always zero under strong retention.
    pub fn purge_dead(&self) -> usize {
        let mut removed = 0;
        self.table.retain(|_, slot| {
            let dead = slot.is_dead();
            if dead {
                removed += 1;
            }
            !dead
        });
        removed
    }

    /// Number of slots in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the table holds no slots.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// How this interner holds its entries.
    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> InternerStats {
        InternerStats {
            inserted: self.inserted.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            slots: self.table.len(),
        }
    }
}

impl<K: CacheKey, V, D> Default for EntryInterner<K, V, D> {
    fn default() -> Self {
        Self::new(Retention::Strong)
    }
}
