//! The cache specialised to configuration modules.
//!
//! [`ModuleCache`] pairs a [`LoadCache`] keyed by [`ModuleKey`] with the
//! [`LabelTable`] those keys are labelled in, so a host can go from module
//! paths to cached entries and from emitted dependency groups back to text.

use std::fmt;
use std::sync::Arc;

use memoload_common::{DepKey, DepKind, EvalContext, LabelTable, ModuleKey};
use memoload_config::CacheConfig;

use crate::builder::EntryBuilder;
use crate::entry::{DependencyGroup, EntryRef};
use crate::session::LoadCache;
use crate::traversal::{sink_fn, InterruptFlag, Interrupted, Interruptible, Traversal};

/// Canonical entry for a configuration module.
pub type ModuleEntry<V> = EntryRef<ModuleKey, V, DepKey>;

/// Builder for one configuration module's entry.
pub type ModuleBuilder<V> = EntryBuilder<ModuleKey, V, DepKey>;

/// A dependency as the host sees it once labels are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDep {
    /// What the dependency refers to.
    pub kind: DepKind,
    /// Target text, or `<unknown>` for a label from another table.
    pub target: String,
}

/// Module-load cache with its label table.
///
/// Clones share both the table and the cache.
pub struct ModuleCache<V> {
    labels: Arc<LabelTable>,
    cache: LoadCache<ModuleKey, V, DepKey>,
}

impl<V: fmt::Debug> ModuleCache<V> {
    /// Creates an empty cache configured by `config`.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            labels: Arc::new(LabelTable::new()),
            cache: LoadCache::new(config),
        }
    }

    /// The label table keys are built in.
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// The underlying generic cache.
    pub fn cache(&self) -> &LoadCache<ModuleKey, V, DepKey> {
        &self.cache
    }

    /// Key for `path` evaluated under `context`.
    pub fn module_key(&self, path: &str, context: EvalContext) -> ModuleKey {
        ModuleKey::in_table(&self.labels, path, context)
    }

    /// Key for a low-level dependency on `target`.
    pub fn dep(&self, kind: DepKind, target: &str) -> DepKey {
        DepKey::in_table(&self.labels, kind, target)
    }

    /// Starts recording a module evaluation.
    pub fn builder(&self) -> ModuleBuilder<V> {
        self.cache.builder()
    }

    /// The cached entry for `path` under `context`, if any.
    ///
    /// Does not add `path` to the label table on a miss.
    pub fn lookup(&self, path: &str, context: EvalContext) -> Option<ModuleEntry<V>> {
        let path = self.labels.find(path)?;
        self.cache.get(&ModuleKey::new(path, context))
    }

    /// Renders `key` as `path@context`.
    pub fn describe(&self, key: &ModuleKey) -> String {
        key.display(&self.labels)
    }

    /// Resolves the dependency closure of `roots` into labelled groups.
    ///
    /// Modules shared between roots are reported once. Stops with
    /// `Interrupted` as soon as `flag` is raised.
    pub fn resolve_closure<'a>(
        &self,
        roots: impl IntoIterator<Item = &'a ModuleEntry<V>>,
        flag: &InterruptFlag,
    ) -> Result<Vec<Vec<ResolvedDep>>, Interrupted>
    where
        V: 'a,
    {
        let mut resolved = Vec::new();
        let collect = sink_fn(|group: &DependencyGroup<DepKey>| {
            resolved.push(group.iter().map(|dep| self.resolve(dep)).collect());
            Ok(())
        });
        let mut sink = Interruptible::new(collect, flag.clone());
        let mut traversal = Traversal::new();
        for root in roots {
            traversal.visit(&**root, &mut sink)?;
        }
        drop(sink);
        Ok(resolved)
    }

    fn resolve(&self, dep: &DepKey) -> ResolvedDep {
        ResolvedDep {
            kind: dep.kind,
            target: self.labels.text(dep.target).unwrap_or("<unknown>").to_string(),
        }
    }
}

impl<V> Clone for ModuleCache<V> {
    fn clone(&self) -> Self {
        Self {
            labels: Arc::clone(&self.labels),
            cache: self.cache.clone(),
        }
    }
}

impl<V: fmt::Debug> Default for ModuleCache<V> {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
