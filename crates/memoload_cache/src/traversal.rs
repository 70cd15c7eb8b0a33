//! Dependency-closure walks over cache entries.
//!
//! A traversal emits every direct-dependency group reachable from a root
//! entry to a [`DependencyGroupSink`], visiting each module key at most once.
//! The entry graph is a DAG with heavy sharing, so the visited set is what
//! keeps the cost linear in the number of distinct modules rather than the
//! number of paths.
//!
//! The walk is depth-first in recorded order: an entry's own groups first,
//! then each not-yet-visited transitive entry in the order its parent listed
//! it. It uses an explicit stack, so graph depth is bounded by memory rather
//! than the thread's stack.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::entry::{CacheEntry, CacheKey, DependencyGroup, EntryRef};

/// Returned when a traversal is cancelled before it completes.
///
/// Groups emitted before the interruption were already delivered; the
/// caller decides whether to discard them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("dependency traversal interrupted")]
pub struct Interrupted;

/// Receives dependency groups during a traversal.
///
/// Returning `Err(Interrupted)` stops the traversal immediately.
pub trait DependencyGroupSink<D> {
    /// Accepts the next group.
    fn accept(&mut self, group: &DependencyGroup<D>) -> Result<(), Interrupted>;
}

impl<D> DependencyGroupSink<D> for Vec<DependencyGroup<D>> {
    fn accept(&mut self, group: &DependencyGroup<D>) -> Result<(), Interrupted> {
        self.push(group.clone());
        Ok(())
    }
}

impl<D, S: DependencyGroupSink<D> + ?Sized> DependencyGroupSink<D> for &mut S {
    fn accept(&mut self, group: &DependencyGroup<D>) -> Result<(), Interrupted> {
        (**self).accept(group)
    }
}

/// A sink backed by a closure. Built with [`sink_fn`].
pub struct FnSink<F>(F);

impl<D, F> DependencyGroupSink<D> for FnSink<F>
where
    F: FnMut(&DependencyGroup<D>) -> Result<(), Interrupted>,
{
    fn accept(&mut self, group: &DependencyGroup<D>) -> Result<(), Interrupted> {
        (self.0)(group)
    }
}

/// Wraps a closure as a [`DependencyGroupSink`].
pub fn sink_fn<D, F>(f: F) -> FnSink<F>
where
    F: FnMut(&DependencyGroup<D>) -> Result<(), Interrupted>,
{
    FnSink(f)
}

/// Shared flag raised to cancel in-flight traversals, e.g. on shutdown.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Sink adapter that checks an [`InterruptFlag`] before every group.
pub struct Interruptible<S> {
    inner: S,
    flag: InterruptFlag,
}

impl<S> Interruptible<S> {
    /// Wraps `inner`, interrupting once `flag` is raised.
    pub fn new(inner: S, flag: InterruptFlag) -> Self {
        Self { inner, flag }
    }

    /// Returns the wrapped sink.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<D, S: DependencyGroupSink<D>> DependencyGroupSink<D> for Interruptible<S> {
    fn accept(&mut self, group: &DependencyGroup<D>) -> Result<(), Interrupted> {
        if self.flag.is_raised() {
            return Err(Interrupted);
        }
        self.inner.accept(group)
    }
}

/// Counters gathered during a traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Distinct entries whose groups were emitted.
    pub entries_visited: usize,
    /// Groups delivered to the sink.
    pub groups_emitted: usize,
    /// Edges skipped because their key was already visited.
    pub duplicates_skipped: usize,
}

impl TraversalStats {
    fn since(self, before: TraversalStats) -> TraversalStats {
        TraversalStats {
            entries_visited: self.entries_visited - before.entries_visited,
            groups_emitted: self.groups_emitted - before.groups_emitted,
            duplicates_skipped: self.duplicates_skipped - before.duplicates_skipped,
        }
    }
}

/// A traversal whose visited set persists across [`visit`](Self::visit)
/// calls.
///
/// Visiting several roots through one `Traversal` emits each shared module
/// once overall, which is what a host registering the dependencies of many
/// loads at once wants. Each concurrent caller uses its own `Traversal`.
pub struct Traversal<K> {
    visited: HashSet<K>,
    stats: TraversalStats,
}

impl<K: CacheKey> Traversal<K> {
    /// Creates a traversal with an empty visited set.
    pub fn new() -> Self {
        Self {
            visited: HashSet::new(),
            stats: TraversalStats::default(),
        }
    }

    /// Emits the dependency closure of `root` to `sink`, skipping keys
    /// already visited by this traversal.
    ///
    /// Returns the counters for this call alone; [`stats`](Self::stats)
    /// keeps the running totals.
    pub fn visit<V, D, S>(
        &mut self,
        root: &CacheEntry<K, V, D>,
        sink: &mut S,
    ) -> Result<TraversalStats, Interrupted>
    where
        S: DependencyGroupSink<D> + ?Sized,
    {
        let before = self.stats;
        if !self.visited.insert(root.key().clone()) {
            self.stats.duplicates_skipped += 1;
            return Ok(self.stats.since(before));
        }
        self.emit(root, sink)?;

        let mut stack: Vec<std::slice::Iter<'_, EntryRef<K, V, D>>> =
            vec![root.transitive_deps().iter()];
        while let Some(children) = stack.last_mut() {
            let Some(child) = children.next() else {
                stack.pop();
                continue;
            };
            if self.visited.insert(child.key().clone()) {
                self.emit(child, sink)?;
                stack.push(child.transitive_deps().iter());
            } else {
                self.stats.duplicates_skipped += 1;
            }
        }

        let walked = self.stats.since(before);
        debug!(
            root = ?root.key(),
            entries = walked.entries_visited,
            groups = walked.groups_emitted,
            skipped = walked.duplicates_skipped,
            total_entries = self.stats.entries_visited,
            "dependency traversal complete"
        );
        Ok(walked)
    }

    fn emit<V, D, S>(
        &mut self,
        entry: &CacheEntry<K, V, D>,
        sink: &mut S,
    ) -> Result<(), Interrupted>
    where
        S: DependencyGroupSink<D> + ?Sized,
    {
        self.stats.entries_visited += 1;
        for group in entry.direct_deps() {
            sink.accept(group)?;
            self.stats.groups_emitted += 1;
        }
        Ok(())
    }

    /// Returns `true` if `key` was visited.
    pub fn has_visited(&self, key: &K) -> bool {
        self.visited.contains(key)
    }

    /// Number of distinct keys visited so far.
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Counters accumulated over every `visit` call.
    pub fn stats(&self) -> TraversalStats {
        self.stats
    }
}

impl<K: CacheKey> Default for Traversal<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits the dependency closure of `root` to `sink` with a fresh visited set.
pub fn traverse<K, V, D, S>(
    root: &CacheEntry<K, V, D>,
    sink: &mut S,
) -> Result<TraversalStats, Interrupted>
where
    K: CacheKey,
    S: DependencyGroupSink<D> + ?Sized,
{
    Traversal::new().visit(root, sink)
}

impl<K: CacheKey, V, D> CacheEntry<K, V, D> {
    /// Emits this entry's dependency closure to `sink`. See [`traverse`].
    pub fn traverse<S>(&self, sink: &mut S) -> Result<TraversalStats, Interrupted>
    where
        S: DependencyGroupSink<D> + ?Sized,
    {
        traverse(self, sink)
    }
}
