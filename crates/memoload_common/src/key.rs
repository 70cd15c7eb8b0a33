//! Concrete module and dependency keys.

use serde::{Deserialize, Serialize};

use crate::context::EvalContext;
use crate::label::{Label, LabelTable};

/// Identifies one loadable module: its path plus the context it is evaluated
/// under.
///
/// The same file loaded under two different contexts is two distinct modules.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ModuleKey {
    /// Module path.
    pub path: Label,
    /// Evaluation context.
    pub context: EvalContext,
}

impl ModuleKey {
    /// Creates a key from an already-labelled path.
    pub fn new(path: Label, context: EvalContext) -> Self {
        Self { path, context }
    }

    /// Labels `path` in `table` and builds a key for it.
    pub fn in_table(table: &LabelTable, path: &str, context: EvalContext) -> Self {
        Self::new(table.label(path), context)
    }

    /// Renders the key as `path@context`, resolving the path through `table`.
    pub fn display(&self, table: &LabelTable) -> String {
        let path = table.text(self.path).unwrap_or("<unknown>");
        format!("{path}@{}", self.context)
    }
}

/// The kind of thing a low-level dependency points at.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepKind {
    /// A source file's contents.
    File,
    /// A package lookup (does the package exist, where is it rooted).
    Package,
    /// A repository or workspace-level mapping.
    Repository,
    /// An environment variable or client setting.
    Environment,
    /// Another module's load result.
    Module,
}

/// A single dependency edge understood by the host evaluation engine.
///
/// Finer grained than [`ModuleKey`]: loading one module typically looks up
/// many of these.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DepKey {
    /// What the dependency refers to.
    pub kind: DepKind,
    /// The dependency target.
    pub target: Label,
}

impl DepKey {
    /// Creates a dependency key.
    pub fn new(kind: DepKind, target: Label) -> Self {
        Self { kind, target }
    }

    /// Labels `target` in `table` and builds a key for it.
    pub fn in_table(table: &LabelTable, kind: DepKind, target: &str) -> Self {
        Self::new(kind, table.label(target))
    }
}
