//! Opaque identities for requests, results and artifacts.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an execution node or stored artifact.
///
/// Keys are never part of a content hash: two artifacts with different keys
/// and identical content hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Fresh random key (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A usable key is non-blank and contains no whitespace or path separators.
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
            && !self
                .0
                .chars()
                .any(|c| c.is_whitespace() || c == '/' || c == '\\')
    }
}

impl Default for ArtifactKey {
    fn default() -> Self {
        Self::generate()
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ArtifactKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}
