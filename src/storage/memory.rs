use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use super::{extension_for_mime, BlobStore, StorageError};

/// In-memory blob store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().expect("blob store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, bytes: &[u8], mime_type: &str) -> Result<String, StorageError> {
        let key = format!("uploads/{}.{}", Uuid::new_v4(), extension_for_mime(mime_type));
        self.blobs
            .lock()
            .expect("blob store poisoned")
            .insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .lock()
            .expect("blob store poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.blobs
            .lock()
            .expect("blob store poisoned")
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}
