//! Conversation alias resolution seam.

use std::collections::HashMap;

use omnichat_core::EngineError;

/// Normalizes alias-form conversation identifiers to canonical ones.
///
/// Implementations are expected to answer from a locally synced table; the
/// engine resolves inside event dispatch, before any store lookup. An error
/// drops the event rather than polluting the wrong conversation's state.
pub trait AliasResolver: Send + Sync {
    fn resolve(&self, alias: &str) -> Result<String, EngineError>;
}

/// Table-backed resolver used by tests and the smoke binary.
#[derive(Debug, Clone, Default)]
pub struct StaticAliasResolver {
    table: HashMap<String, String>,
}

impl StaticAliasResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one alias -> canonical mapping.
    pub fn insert(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.table.insert(alias.into(), canonical.into());
    }
}

impl FromIterator<(String, String)> for StaticAliasResolver {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            table: iter.into_iter().collect(),
        }
    }
}

impl AliasResolver for StaticAliasResolver {
    fn resolve(&self, alias: &str) -> Result<String, EngineError> {
        self.table.get(alias).cloned().ok_or_else(|| {
            EngineError::resolve(
                "alias_unknown",
                format!("no canonical id known for alias '{alias}'"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_aliases() {
        let mut resolver = StaticAliasResolver::new();
        resolver.insert("99887766554433@lid", "15551234567@s.whatsapp.net");

        assert_eq!(
            resolver.resolve("99887766554433@lid").expect("known alias"),
            "15551234567@s.whatsapp.net"
        );
    }

    #[test]
    fn unknown_alias_is_a_resolve_error() {
        let resolver = StaticAliasResolver::new();
        let err = resolver.resolve("nobody@lid").expect_err("must fail");
        assert_eq!(err.code, "alias_unknown");
    }
}
