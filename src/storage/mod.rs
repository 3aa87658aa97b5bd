//! Blob storage boundary.
//!
//! The pipeline only assumes `get` returns exactly the bytes previously
//! `put`; where the bytes live (filesystem, object store) is behind the
//! `BlobStore` trait so the orchestrator is testable with fakes.

pub mod fs;
pub mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Key-addressed blob storage.
pub trait BlobStore: Send + Sync {
    /// Store bytes, returning the key under which they can be fetched.
    fn put(&self, bytes: &[u8], mime_type: &str) -> Result<String, StorageError>;

    /// Fetch exactly the bytes previously stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// File extension for a stored blob, derived from its declared mime type.
pub(crate) fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/heic" | "image/heif" => "heic",
        "image/tiff" => "tiff",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        _ => "bin",
    }
}
