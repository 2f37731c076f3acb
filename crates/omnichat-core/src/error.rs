use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad failure category matching how the engine recovers.
///
/// No category is user-visible; every failure path is degrade-and-log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EngineErrorCategory {
    /// Malformed bus event payload; the event is dropped.
    Parse,
    /// A conversation identifier could not be normalized; the event is
    /// dropped rather than guessed at.
    Resolve,
    /// Durable storage unavailable or write rejected; read-state continues
    /// in memory only.
    Storage,
    /// Outbound fire-and-forget call failed; never retried, never rolled
    /// back.
    Rpc,
    /// Internal invariant break.
    Internal,
}

/// Stable error payload used across the engine boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct EngineError {
    /// High-level error category.
    pub category: EngineErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl EngineError {
    /// Construct a new engine error.
    pub fn new(
        category: EngineErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Malformed event payload.
    pub fn parse(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EngineErrorCategory::Parse, code, message)
    }

    /// Identifier-resolution failure.
    pub fn resolve(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EngineErrorCategory::Resolve, code, message)
    }

    /// Local persistence failure.
    pub fn storage(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EngineErrorCategory::Storage, code, message)
    }

    /// Outbound call failure.
    pub fn rpc(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EngineErrorCategory::Rpc, code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_helper_categories_stable() {
        assert_eq!(
            EngineError::parse("bad_payload", "x").category,
            EngineErrorCategory::Parse
        );
        assert_eq!(
            EngineError::resolve("alias_unknown", "x").category,
            EngineErrorCategory::Resolve
        );
        assert_eq!(
            EngineError::storage("write_rejected", "x").category,
            EngineErrorCategory::Storage
        );
    }

    #[test]
    fn formats_category_code_and_message() {
        let err = EngineError::rpc("mark_read_failed", "connection reset");
        assert_eq!(err.to_string(), "Rpc:mark_read_failed: connection reset");
    }
}
