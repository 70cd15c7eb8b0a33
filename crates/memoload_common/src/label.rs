//! Interned labels for module paths and dependency targets.

use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Serialize};

/// A module path or dependency target, interned in a [`LabelTable`].
///
/// Keys built from labels compare and hash in constant time, which matters
/// because every cache lookup and every traversal step hashes a key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(Spur);

/// Session-wide table of labels, shared by every evaluation worker.
///
/// The same text always yields the same [`Label`], whichever worker saw it
/// first.
#[derive(Debug, Default)]
pub struct LabelTable {
    labels: ThreadedRodeo,
}

impl LabelTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the label for `text`, adding it on first sight.
    pub fn label(&self, text: &str) -> Label {
        Label(self.labels.get_or_intern(text))
    }

    /// Returns the label for `text` if it was ever added.
    ///
    /// Lookups use this so that probing for an unknown module does not grow
    /// the table.
    pub fn find(&self, text: &str) -> Option<Label> {
        self.labels.get(text).map(Label)
    }

    /// The text of `label`, or `None` if it came from another table.
    pub fn text(&self, label: Label) -> Option<&str> {
        self.labels.try_resolve(&label.0)
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if no label was added yet.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_text_round_trips() {
        let table = LabelTable::new();
        let label = table.label("//pkg:defs.cfg");
        assert_eq!(table.text(label), Some("//pkg:defs.cfg"));
    }

    #[test]
    fn same_text_same_label() {
        let table = LabelTable::new();
        assert_eq!(table.label("//lib:rules.cfg"), table.label("//lib:rules.cfg"));
        assert_ne!(table.label("//lib:rules.cfg"), table.label("//lib:other.cfg"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn find_does_not_add() {
        let table = LabelTable::new();
        assert!(table.find("//missing:x.cfg").is_none());
        assert!(table.is_empty());
        let label = table.label("//present:x.cfg");
        assert_eq!(table.find("//present:x.cfg"), Some(label));
    }

    #[test]
    fn foreign_label_has_no_text() {
        let small = LabelTable::new();
        let big = LabelTable::new();
        big.label("a");
        let foreign = big.label("b");
        assert!(small.text(foreign).is_none());
    }

    #[test]
    fn workers_agree_on_labels() {
        let table = LabelTable::new();
        let labels: Vec<Label> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| table.label("//shared:common.cfg")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(labels.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn serde_roundtrip() {
        let table = LabelTable::new();
        let label = table.label("//a:defs.cfg");
        let json = serde_json::to_string(&label).unwrap();
        let back: Label = serde_json::from_str(&json).unwrap();
        assert_eq!(label, back);
    }
}
