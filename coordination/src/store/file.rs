use std::path::{Path, PathBuf};

use tracing::debug;

use super::{check_key, ArtifactStore, StoreResult, StoredArtifact};

/// One pretty-printed JSON file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Creates `root` if missing.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize(key)))
    }
}

/// Map a key onto a portable file name.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

impl ArtifactStore for FileArtifactStore {
    fn get(&self, key: &str) -> StoreResult<Option<StoredArtifact>> {
        check_key(key)?;
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn put(&self, key: &str, artifact: StoredArtifact) -> StoreResult<()> {
        check_key(key)?;
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(&artifact)?;
        // Write-then-rename so readers never see a partial file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        debug!(key, path = %path.display(), "artifact stored");
        Ok(())
    }
}
