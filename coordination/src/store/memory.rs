use std::collections::HashMap;
use std::sync::RwLock;

use super::{check_key, ArtifactStore, StoreError, StoreResult, StoredArtifact};

/// Process-local store. The default for tests and single-process runs.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    entries: RwLock<HashMap<String, StoredArtifact>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn get(&self, key: &str) -> StoreResult<Option<StoredArtifact>> {
        check_key(key)?;
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, artifact: StoredArtifact) -> StoreResult<()> {
        check_key(key)?;
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(key.to_string(), artifact);
        Ok(())
    }
}
