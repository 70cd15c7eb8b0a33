//! Staged construction of cache entries.
//!
//! An [`EntryBuilder`] records what one module evaluation looked up, then
//! hands the finished entry to the interner. It moves through
//! [`BuilderState`]s in one direction only:
//!
//! ```text
//! Empty -> AccumulatingDirect -> AccumulatingTransitive -> Built
//!   \______________\_______________________\____________-> Faulted
//! ```
//!
//! Direct dependencies must all be recorded before the first transitive entry
//! is attached, because the host engine replays dependency registrations in
//! recorded order when it resumes an interrupted evaluation. A builder that
//! saw an evaluation fault, or was driven out of order, never produces an
//! entry.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::entry::{CacheEntry, CacheKey, DependencyGroup, EntryRef};
use crate::error::{CacheError, FaultCause, ProtocolViolation};
use crate::interner::EntryInterner;

/// Where a builder is in its protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Nothing recorded yet.
    Empty,
    /// Recording direct dependency groups.
    AccumulatingDirect,
    /// At least one transitive entry attached; direct deps are closed.
    AccumulatingTransitive,
    /// An entry was produced.
    Built,
    /// An evaluation fault or protocol violation was recorded.
    Faulted,
}

/// Single-owner builder for one module's [`CacheEntry`].
///
/// Not meant to be shared between evaluation workers; each worker creates
/// its own from the session's [`EntryInterner`].
pub struct EntryBuilder<K, V, D> {
    interner: Arc<EntryInterner<K, V, D>>,
    state: BuilderState,
    key: Option<K>,
    value: Option<V>,
    direct_deps: Vec<DependencyGroup<D>>,
    transitive_deps: Vec<EntryRef<K, V, D>>,
    fault: Option<FaultCause>,
}

impl<K, V, D> EntryBuilder<K, V, D>
where
    K: CacheKey,
    V: fmt::Debug,
    D: fmt::Debug,
{
    /// Creates an empty builder that will intern into `interner`.
    pub fn new(interner: Arc<EntryInterner<K, V, D>>) -> Self {
        Self {
            interner,
            state: BuilderState::Empty,
            key: None,
            value: None,
            direct_deps: Vec::new(),
            transitive_deps: Vec::new(),
            fault: None,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// The pending key, if set.
    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    /// Returns `true` once a fault or protocol violation has been recorded.
    pub fn is_faulted(&self) -> bool {
        self.state == BuilderState::Faulted
    }

    /// Sets the module key. May be called once.
    pub fn set_key(&mut self, key: K) -> Result<&mut Self, CacheError> {
        self.ensure_not_built()?;
        if self.key.is_some() {
            return Err(self.violation(|state| CacheError::KeyAlreadySet { state }));
        }
        self.key = Some(key);
        Ok(self)
    }

    /// Sets the loaded value. May be called once.
    pub fn set_value(&mut self, value: V) -> Result<&mut Self, CacheError> {
        self.ensure_not_built()?;
        if self.value.is_some() {
            return Err(self.violation(|state| CacheError::ValueAlreadySet { state }));
        }
        self.value = Some(value);
        Ok(self)
    }

    /// Records a single low-level dependency as its own group.
    pub fn add_direct_dep(&mut self, dep: D) -> Result<&mut Self, CacheError> {
        self.push_direct(Some(DependencyGroup::single(dep)))
    }

    /// Records a batch of low-level dependencies looked up together.
    ///
    /// The batch must not be empty.
    pub fn add_direct_deps(
        &mut self,
        deps: impl IntoIterator<Item = D>,
    ) -> Result<&mut Self, CacheError> {
        self.push_direct(DependencyGroup::new(deps))
    }

    fn push_direct(
        &mut self,
        group: Option<DependencyGroup<D>>,
    ) -> Result<&mut Self, CacheError> {
        match self.state {
            BuilderState::Built => Err(self.already_built()),
            // The evaluation already failed; nothing recorded now can be cached.
            BuilderState::Faulted => Ok(self),
            BuilderState::AccumulatingTransitive => {
                Err(self.violation(|state| CacheError::DirectDepAfterTransitive { state }))
            }
            BuilderState::Empty | BuilderState::AccumulatingDirect => {
                let Some(group) = group else {
                    return Err(self.violation(|state| CacheError::EmptyDependencyGroup { state }));
                };
                self.direct_deps.push(group);
                self.state = BuilderState::AccumulatingDirect;
                Ok(self)
            }
        }
    }

    /// Attaches the entry of a module this evaluation loaded.
    ///
    /// Closes the direct-dependency phase for good. The same entry may be
    /// attached more than once.
    pub fn add_transitive_dep(
        &mut self,
        entry: EntryRef<K, V, D>,
    ) -> Result<&mut Self, CacheError> {
        match self.state {
            BuilderState::Built => Err(self.already_built()),
            BuilderState::Faulted => Ok(self),
            BuilderState::Empty
            | BuilderState::AccumulatingDirect
            | BuilderState::AccumulatingTransitive => {
                self.transitive_deps.push(entry);
                self.state = BuilderState::AccumulatingTransitive;
                Ok(self)
            }
        }
    }

    /// Records that the evaluation failed. The last recorded cause wins.
    ///
    /// Has no effect on a builder that already produced its entry.
    pub fn note_fault<E>(&mut self, cause: E) -> &mut Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if self.state == BuilderState::Built {
            debug!(key = ?self.key, "ignoring fault noted after build");
            return self;
        }
        self.fault = Some(Arc::new(cause));
        self.state = BuilderState::Faulted;
        self
    }

    /// Builds the entry and returns the canonical instance for its key.
    ///
    /// Fails with a contract violation if a fault was recorded, if the key or
    /// value is missing, or if this builder was already built. When another
    /// worker already interned an entry for the same key, that entry is
    /// returned and this one is dropped.
    pub fn build(&mut self) -> Result<EntryRef<K, V, D>, CacheError> {
        match self.state {
            BuilderState::Built => return Err(self.already_built()),
            BuilderState::Faulted => {
                let cause = self.fault.clone().unwrap_or_else(|| {
                    Arc::new(ProtocolViolation("faulted without a recorded cause".to_string()))
                });
                debug!(key = ?self.key, %cause, "refusing to cache faulted evaluation");
                let key = match &self.key {
                    Some(key) => format!("{key:?}"),
                    None => "<unset>".to_string(),
                };
                return Err(CacheError::Faulted {
                    key,
                    state: format!("{self:?}"),
                    cause,
                });
            }
            BuilderState::Empty
            | BuilderState::AccumulatingDirect
            | BuilderState::AccumulatingTransitive => {}
        }
        if self.key.is_none() {
            return Err(self.violation(|state| CacheError::MissingKey { state }));
        }
        let Some(value) = self.value.take() else {
            return Err(self.violation(|state| CacheError::MissingValue { state }));
        };
        let Some(key) = self.key.take() else {
            return Err(self.violation(|state| CacheError::MissingKey { state }));
        };

        let candidate = Arc::new(CacheEntry::new(
            key,
            value,
            std::mem::take(&mut self.direct_deps).into_boxed_slice(),
            std::mem::take(&mut self.transitive_deps).into_boxed_slice(),
        ));
        self.state = BuilderState::Built;
        Ok(self.interner.intern_or_get(candidate))
    }

    fn ensure_not_built(&self) -> Result<(), CacheError> {
        if self.state == BuilderState::Built {
            return Err(self.already_built());
        }
        Ok(())
    }

    fn already_built(&self) -> CacheError {
        CacheError::AlreadyBuilt {
            state: format!("{self:?}"),
        }
    }

    /// Poisons the builder and returns the error describing the violation.
    fn violation(&mut self, make: impl FnOnce(String) -> CacheError) -> CacheError {
        let err = make(format!("{self:?}"));
        debug!(error = %err, "builder contract violation");
        self.fault = Some(Arc::new(ProtocolViolation(err.to_string())));
        self.state = BuilderState::Faulted;
        err
    }
}

impl<K: fmt::Debug, V: fmt::Debug, D: fmt::Debug> fmt::Debug for EntryBuilder<K, V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transitive: Vec<&K> = self.transitive_deps.iter().map(|e| e.key()).collect();
        f.debug_struct("EntryBuilder")
            .field("state", &self.state)
            .field("key", &self.key)
            .field("value", &self.value)
            .field("direct_deps", &self.direct_deps)
            .field("transitive_deps", &transitive)
            .field("fault", &self.fault.as_ref().map(|cause| cause.to_string()))
            .finish()
    }
}
