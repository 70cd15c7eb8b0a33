//! Error types for building cache entries.

use std::sync::Arc;

/// The recorded reason a module evaluation failed.
///
/// Shared so the same cause can be reported from every failed `build()`
/// without cloning the underlying error.
pub type FaultCause = Arc<dyn std::error::Error + Send + Sync>;

/// Errors returned by [`EntryBuilder`](crate::EntryBuilder).
///
/// Every variant is a contract violation: the caller drove the builder
/// protocol in a way it does not allow, and each carries the builder's full
/// state at the time. [`CacheError::Faulted`] is the one a correct host is
/// expected to trigger occasionally, by calling `build()` on an evaluation
/// that failed; [`CacheError::is_fault`] picks it out.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// `build()` was called before a key was set.
    #[error("expected key to be set: {state}")]
    MissingKey {
        /// Builder state at the time of the call.
        state: String,
    },

    /// `build()` was called before a value was set.
    #[error("expected value to be set: {state}")]
    MissingValue {
        /// Builder state at the time of the call.
        state: String,
    },

    /// The key was set a second time.
    #[error("key may only be set once: {state}")]
    KeyAlreadySet {
        /// Builder state at the time of the call.
        state: String,
    },

    /// The value was set a second time.
    #[error("value may only be set once: {state}")]
    ValueAlreadySet {
        /// Builder state at the time of the call.
        state: String,
    },

    /// A direct dependency was recorded after a transitive entry was attached.
    #[error("expected transitive deps to be loaded last: {state}")]
    DirectDepAfterTransitive {
        /// Builder state at the time of the call.
        state: String,
    },

    /// A dependency group with no keys was recorded.
    #[error("dependency groups must contain at least one key: {state}")]
    EmptyDependencyGroup {
        /// Builder state at the time of the call.
        state: String,
    },

    /// The builder was used after it already produced an entry.
    #[error("builder already produced an entry: {state}")]
    AlreadyBuilt {
        /// Builder state at the time of the call.
        state: String,
    },

    /// `build()` was called after an evaluation fault was recorded.
    #[error("refusing to cache a value computed in error for {key}: {cause}: {state}")]
    Faulted {
        /// The module key, or `<unset>`.
        key: String,
        /// Builder state at the time of the call.
        state: String,
        /// The recorded fault.
        #[source]
        cause: FaultCause,
    },
}

impl CacheError {
    /// Returns `true` for errors caused by misuse of the builder protocol.
    ///
    /// This holds for every variant, including [`CacheError::Faulted`].
    pub fn is_contract_violation(&self) -> bool {
        match self {
            CacheError::MissingKey { .. }
            | CacheError::MissingValue { .. }
            | CacheError::KeyAlreadySet { .. }
            | CacheError::ValueAlreadySet { .. }
            | CacheError::DirectDepAfterTransitive { .. }
            | CacheError::EmptyDependencyGroup { .. }
            | CacheError::AlreadyBuilt { .. }
            | CacheError::Faulted { .. } => true,
        }
    }

    /// Returns `true` if `build()` was refused because of a recorded fault.
    pub fn is_fault(&self) -> bool {
        matches!(self, CacheError::Faulted { .. })
    }

    /// The recorded fault, for [`CacheError::Faulted`].
    pub fn fault_cause(&self) -> Option<&FaultCause> {
        match self {
            CacheError::Faulted { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Fault recorded on a builder after a contract violation, so the builder
/// can never go on to produce an entry.
#[derive(Debug, thiserror::Error)]
#[error("builder poisoned by contract violation: {0}")]
pub(crate) struct ProtocolViolation(pub(crate) String);
