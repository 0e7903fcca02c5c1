use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{check_key, LocalStore};

/// Directory-backed document store: one `<key>.json` file per key.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a crash mid-write never leaves a torn document.
#[derive(Debug)]
pub struct DirLocalStore {
    root: PathBuf,
}

impl DirLocalStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened local store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        check_key(key)?;
        let unsafe_char = key.chars().any(|c| matches!(c, '/' | '\\' | '\0'));
        if unsafe_char || key.starts_with('.') {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "not usable as a file name".into(),
            });
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl LocalStore for DirLocalStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let doc = serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(doc))
    }

    fn put(&self, key: &str, document: &Value) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let bytes = serde_json::to_vec(document).map_err(|e| StoreError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(key, len = bytes.len(), "document written");
        Ok(())
    }

    fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.path_for(key)?.exists())
    }
}
