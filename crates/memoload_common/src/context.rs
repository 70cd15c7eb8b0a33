//! Fingerprints of the context a module is evaluated under.

use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

/// Summary of everything besides its path that can change what a module
/// evaluates to: language flags, repository mapping, builtins version.
///
/// Two loads of one path under equal contexts are the same module; under
/// different contexts they are unrelated cache entries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvalContext(u128);

impl EvalContext {
    /// Starts describing a context.
    pub fn describe() -> ContextHasher {
        ContextHasher::new()
    }

    /// The context with no settings at all.
    pub fn bare() -> Self {
        ContextHasher::new().finish()
    }

    /// The raw 128-bit fingerprint.
    pub fn fingerprint(self) -> u128 {
        self.0
    }
}

impl fmt::Display for EvalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvalContext({:08x}..)", (self.0 >> 96) as u32)
    }
}

/// Incremental XXH3 hasher behind [`EvalContext::describe`].
///
/// Every field is tagged with its kind and length-prefixed, so neither
/// reordering text between fields nor swapping a setting for a repository
/// mapping with the same text collides.
pub struct ContextHasher {
    state: Xxh3,
}

impl ContextHasher {
    const SETTING: u8 = 1;
    const REPOSITORY: u8 = 2;
    const BUILTINS: u8 = 3;

    fn new() -> Self {
        Self { state: Xxh3::new() }
    }

    /// Mixes in a language or client setting.
    pub fn setting(mut self, name: &str, value: &str) -> Self {
        self.field(Self::SETTING, name);
        self.field(Self::SETTING, value);
        self
    }

    /// Mixes in one repository mapping entry.
    pub fn repository(mut self, apparent: &str, canonical: &str) -> Self {
        self.field(Self::REPOSITORY, apparent);
        self.field(Self::REPOSITORY, canonical);
        self
    }

    /// Mixes in the version of the builtins modules are evaluated against.
    pub fn builtins(mut self, version: &str) -> Self {
        self.field(Self::BUILTINS, version);
        self
    }

    /// Finishes the fingerprint.
    pub fn finish(self) -> EvalContext {
        EvalContext(self.state.digest128())
    }

    fn field(&mut self, tag: u8, text: &str) {
        self.state.update(&[tag]);
        self.state.update(&(text.len() as u64).to_le_bytes());
        self.state.update(text.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lang(version: &str) -> EvalContext {
        EvalContext::describe().setting("lang", version).finish()
    }

    #[test]
    fn same_settings_same_context() {
        assert_eq!(lang("2"), lang("2"));
        assert_ne!(lang("2"), lang("3"));
        assert_ne!(lang("2"), EvalContext::bare());
    }

    #[test]
    fn field_boundaries_matter() {
        let a = EvalContext::describe().setting("ab", "c").finish();
        let b = EvalContext::describe().setting("a", "bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn field_kind_matters() {
        let setting = EvalContext::describe().setting("main", "@main").finish();
        let repo = EvalContext::describe().repository("main", "@main").finish();
        assert_ne!(setting, repo);
    }

    #[test]
    fn order_matters() {
        let a = EvalContext::describe().builtins("7").setting("lang", "2").finish();
        let b = EvalContext::describe().setting("lang", "2").builtins("7").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_full_hex() {
        let shown = EvalContext::bare().to_string();
        assert_eq!(shown.len(), 32);
        assert!(shown.chars().all(|c| c.is_ascii_hexdigit()));
        let parsed = u128::from_str_radix(&shown, 16).unwrap();
        assert_eq!(parsed, EvalContext::bare().fingerprint());
    }

    #[test]
    fn debug_is_abbreviated() {
        let shown = format!("{:?}", lang("2"));
        assert!(shown.starts_with("EvalContext("));
        assert!(shown.ends_with("..)"));
        assert!(shown.len() < 32);
    }

    #[test]
    fn serde_roundtrip() {
        let ctx = lang("2");
        let json = serde_json::to_string(&ctx).unwrap();
        let back: EvalContext = serde_json::from_str(&json).unwrap();
        assert_eq!(ctx, back);
    }
}
