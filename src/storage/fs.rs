use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{extension_for_mime, BlobStore, StorageError};

/// Filesystem-backed blob store. Blobs live under `root/uploads/` with
/// uuid-based names, so keys never collide and never reveal upload names.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reject keys that could escape the store root.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty()
            || key.starts_with('/')
            || key.contains("..")
            || key.contains('\\')
            || key.contains('\0')
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, bytes: &[u8], mime_type: &str) -> Result<String, StorageError> {
        let key = format!("uploads/{}.{}", Uuid::new_v4(), extension_for_mime(mime_type));
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        tracing::debug!(key = %key, bytes = bytes.len(), "Blob stored");
        Ok(key)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        if !path.exists() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if !path.exists() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }
}

/// Convenience for callers holding a `&Path`.
impl From<&Path> for FsBlobStore {
    fn from(root: &Path) -> Self {
        Self::new(root)
    }
}
