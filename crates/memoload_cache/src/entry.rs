//! Immutable cache entries and the dependency groups they record.
//!
//! A [`CacheEntry`] is one node of the module-load dependency DAG: the value
//! a module evaluated to, the low-level keys it looked up directly, and the
//! already-cached entries of the modules it loaded. Entries are only ever
//! created by [`EntryBuilder`](crate::EntryBuilder) and shared through
//! [`EntryRef`] handles, since the same module is routinely reachable from
//! many parents.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Bounds every module key must satisfy.
pub trait CacheKey: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

/// Shared handle to a canonical cache entry.
pub type EntryRef<K, V, D> = Arc<CacheEntry<K, V, D>>;

/// An ordered, non-empty batch of low-level dependency keys that were looked
/// up together.
///
/// The order of keys is kept exactly as recorded. Cloning is cheap: the keys
/// live behind a shared slice.
pub struct DependencyGroup<D>(Arc<[D]>);

impl<D> DependencyGroup<D> {
    /// Creates a group, or returns `None` if `deps` is empty.
    pub fn new(deps: impl IntoIterator<Item = D>) -> Option<Self> {
        let deps: Arc<[D]> = deps.into_iter().collect();
        if deps.is_empty() {
            None
        } else {
            Some(Self(deps))
        }
    }

    /// Creates a group holding a single key.
    pub fn single(dep: D) -> Self {
        Self(Arc::from(vec![dep]))
    }

    /// The keys in recorded order.
    pub fn as_slice(&self) -> &[D] {
        &self.0
    }
}

impl<D> Clone for DependencyGroup<D> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<D> Deref for DependencyGroup<D> {
    type Target = [D];

    fn deref(&self) -> &[D] {
        &self.0
    }
}

impl<D: PartialEq> PartialEq for DependencyGroup<D> {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}

impl<D: Eq> Eq for DependencyGroup<D> {}

impl<D: fmt::Debug> fmt::Debug for DependencyGroup<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// A module's cached load result together with everything it depends on.
///
/// Immutable once built. Equality and hashing look at the key only: two
/// entries for the same module are the same entry as far as the cache is
/// concerned, whatever they computed. The interner relies on this to collapse
/// racing computations of one module into a single canonical instance.
pub struct CacheEntry<K, V, D> {
    key: K,
    value: V,
    direct_deps: Box<[DependencyGroup<D>]>,
    transitive_deps: Box<[EntryRef<K, V, D>]>,
}

impl<K, V, D> CacheEntry<K, V, D> {
    pub(crate) fn new(
        key: K,
        value: V,
        direct_deps: Box<[DependencyGroup<D>]>,
        transitive_deps: Box<[EntryRef<K, V, D>]>,
    ) -> Self {
        Self {
            key,
            value,
            direct_deps,
            transitive_deps,
        }
    }

    /// The module this entry caches.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The loaded value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Dependency groups looked up directly while loading, in recorded order.
    pub fn direct_deps(&self) -> &[DependencyGroup<D>] {
        &self.direct_deps
    }

    /// Entries of transitively loaded modules, in recorded order.
    ///
    /// May contain the same entry more than once; traversal deduplicates.
    pub fn transitive_deps(&self) -> &[EntryRef<K, V, D>] {
        &self.transitive_deps
    }
}

impl<K: PartialEq, V, D> PartialEq for CacheEntry<K, V, D> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Eq, V, D> Eq for CacheEntry<K, V, D> {}

impl<K: Hash, V, D> Hash for CacheEntry<K, V, D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<K: fmt::Debug, V: fmt::Debug, D: fmt::Debug> fmt::Debug for CacheEntry<K, V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Transitive entries print as keys; printing them in full would walk
        // the whole DAG once per path.
        let transitive: Vec<&K> = self.transitive_deps.iter().map(|e| &e.key).collect();
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("direct_deps", &self.direct_deps)
            .field("transitive_deps", &transitive)
            .finish()
    }
}

impl<K, V, D> Drop for CacheEntry<K, V, D> {
    // Unwinds exclusively owned dependency chains with an explicit stack so
    // releasing a deep DAG does not recurse once per level.
    fn drop(&mut self) {
        let mut pending: Vec<EntryRef<K, V, D>> =
            std::mem::take(&mut self.transitive_deps).into_vec();
        while let Some(dep) = pending.pop() {
            if let Some(mut inner) = Arc::into_inner(dep) {
                pending.extend(std::mem::take(&mut inner.transitive_deps).into_vec());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    type Entry = CacheEntry<&'static str, u32, &'static str>;

    fn leaf(key: &'static str, value: u32) -> Arc<Entry> {
        Arc::new(CacheEntry::new(
            key,
            value,
            vec![DependencyGroup::single("file")].into_boxed_slice(),
            Box::default(),
        ))
    }

    #[test]
    fn empty_group_rejected() {
        assert!(DependencyGroup::<u8>::new(Vec::new()).is_none());
    }

    #[test]
    fn group_keeps_order() {
        let group = DependencyGroup::new(["x2", "x3", "x1"]).unwrap();
        assert_eq!(group.as_slice(), &["x2", "x3", "x1"]);
        assert_eq!(group.len(), 3);
    }

    #[test]
    fn group_clone_shares_storage() {
        let group = DependencyGroup::new([1, 2]).unwrap();
        let clone = group.clone();
        assert!(std::ptr::eq(group.as_slice(), clone.as_slice()));
    }

    #[test]
    fn equality_is_by_key_only() {
        let a = leaf("//a:defs.cfg", 1);
        let b = leaf("//a:defs.cfg", 2);
        let c = leaf("//c:defs.cfg", 1);
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);

        let mut set = HashSet::new();
        set.insert(Arc::clone(&a));
        assert!(set.contains(&b));
        assert!(!set.contains(&c));
    }

    #[test]
    fn debug_lists_transitive_keys() {
        let child = leaf("//child:x.cfg", 0);
        let parent = Entry::new(
            "//parent:x.cfg",
            1,
            Box::default(),
            vec![child].into_boxed_slice(),
        );
        let shown = format!("{parent:?}");
        assert!(shown.contains("//parent:x.cfg"));
        assert!(shown.contains("transitive_deps: [\"//child:x.cfg\"]"));
    }

    #[test]
    fn shared_dependency_survives_parent_drop() {
        let shared = leaf("//shared:x.cfg", 7);
        let parent = Entry::new(
            "//parent:x.cfg",
            1,
            Box::default(),
            vec![Arc::clone(&shared)].into_boxed_slice(),
        );
        drop(parent);
        assert_eq!(Arc::strong_count(&shared), 1);
        assert_eq!(*shared.value(), 7);
    }

    #[test]
    fn dropping_deep_chain_does_not_overflow() {
        let mut tip: Arc<CacheEntry<u32, (), u32>> =
            Arc::new(CacheEntry::new(0, (), Box::default(), Box::default()));
        for depth in 1..200_000u32 {
            tip = Arc::new(CacheEntry::new(
                depth,
                (),
                Box::default(),
                vec![tip].into_boxed_slice(),
            ));
        }
        drop(tip);
    }
}
