//! Keyed artifact store for curations and previous-attempt contexts.
//!
//! The engine writes through this boundary but never depends on reads
//! succeeding: history remains the source of truth.

mod file;
mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileArtifactStore;
pub use memory::InMemoryArtifactStore;

use crate::curation::CurationNode;
use crate::previous::PreviousAttemptContext;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid artifact key '{0}'")]
    InvalidKey(String),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "artifact", rename_all = "snake_case")]
pub enum StoredArtifact {
    Curation(CurationNode),
    PreviousAttempt(PreviousAttemptContext),
}

impl StoredArtifact {
    pub fn as_curation(&self) -> Option<&CurationNode> {
        match self {
            Self::Curation(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_previous_attempt(&self) -> Option<&PreviousAttemptContext> {
        match self {
            Self::PreviousAttempt(previous) => Some(previous),
            _ => None,
        }
    }
}

/// Content address of a curation: `content:<hash>`.
pub fn content_key(hash: &str) -> String {
    format!("content:{}", hash)
}

/// Key of the previous-attempt context built for a node: `previous:<context_id>`.
pub fn previous_key(context_id: &str) -> String {
    format!("previous:{}", context_id)
}

#[cfg_attr(test, mockall::automock)]
pub trait ArtifactStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<StoredArtifact>>;

    fn put(&self, key: &str, artifact: StoredArtifact) -> StoreResult<()>;
}

pub(crate) fn check_key(key: &str) -> StoreResult<()> {
    if key.trim().is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(content_key("abc"), "content:abc");
        assert_eq!(previous_key("node-1"), "previous:node-1");
    }

    #[test]
    fn test_blank_key_rejected() {
        assert!(matches!(check_key(" "), Err(StoreError::InvalidKey(_))));
        assert!(check_key("content:x").is_ok());
    }
}
