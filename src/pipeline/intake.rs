//! Intake and record lifecycle: batch creation, upload ingestion,
//! soft-delete/restore and hard deletion.
//!
//! Ingestion only makes an image eligible for validation: bytes are
//! durably stored, the record enters `processing` with a started
//! `processing_info`, and batch counters are recomputed. Running the chain
//! is the worker's job.

use rusqlite::Connection;
use uuid::Uuid;

use crate::config::ValidationConfig;
use crate::db::repository::{
    batch as batch_repo, image as image_repo, now, processing_info as processing_repo,
};
use crate::db::DatabaseError;
use crate::models::{BatchRecord, BatchStatus, ImageRecord, ImageStatus, ProcessingInfo};
use crate::storage::{BlobStore, StorageError};
use thiserror::Error;

use super::aggregate;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("File type not allowed. Allowed types: {allowed}")]
    UnsupportedMediaType { mime_type: String, allowed: String },

    #[error("File too large: {size} bytes exceeds {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A file as received from the (excluded) upload surface.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Outcome of a multi-file ingest: per-file successes and failures.
#[derive(Debug)]
pub struct IntakeReport {
    pub images: Vec<ImageRecord>,
    pub failures: Vec<(String, String)>,
}

impl IntakeReport {
    pub fn success_count(&self) -> usize {
        self.images.len()
    }

    pub fn error_count(&self) -> usize {
        self.failures.len()
    }
}

pub fn create_batch(
    conn: &Connection,
    user_id: &str,
    name: &str,
    description: Option<&str>,
) -> Result<BatchRecord, IntakeError> {
    let batch = BatchRecord {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        name: name.to_string(),
        description: description.map(str::to_string),
        status: BatchStatus::Processing,
        total_images: 0,
        processed_images: 0,
        accepted_images: 0,
        rejected_images: 0,
        errored_images: 0,
        completed_at: None,
        created_at: now(),
    };
    batch_repo::insert_batch(conn, &batch)?;
    tracing::info!(batch_id = %batch.id, user_id, "Batch created");
    Ok(batch)
}

/// Accept one upload into a batch: policy-check the declared type and
/// size, store the bytes, create the `processing` image record.
pub fn ingest_image(
    conn: &Connection,
    store: &dyn BlobStore,
    config: &ValidationConfig,
    batch_id: &Uuid,
    user_id: &str,
    upload: UploadedImage,
) -> Result<ImageRecord, IntakeError> {
    batch_repo::get_batch(conn, batch_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Batch".into(),
        id: batch_id.to_string(),
    })?;

    let mime_type = upload.mime_type.trim().to_ascii_lowercase();
    if !config.is_mime_allowed(&mime_type) {
        return Err(IntakeError::UnsupportedMediaType {
            mime_type,
            allowed: config.allowed_mime_types.join(", "),
        });
    }

    let size = upload.bytes.len() as u64;
    if size > config.max_upload_bytes {
        return Err(IntakeError::TooLarge {
            size,
            max: config.max_upload_bytes,
        });
    }

    let storage_key = store.put(&upload.bytes, &mime_type)?;

    let image = ImageRecord {
        id: Uuid::new_v4(),
        batch_id: *batch_id,
        user_id: user_id.to_string(),
        original_name: upload.file_name,
        size_bytes: size as i64,
        mime_type,
        width: None,
        height: None,
        storage_key,
        status: ImageStatus::Processing,
        rejection_reason: None,
        hash: None,
        sharpness_score: None,
        tags: Vec::new(),
        is_deleted: false,
        created_at: now(),
    };
    image_repo::insert_image(conn, &image)?;
    processing_repo::insert_processing_info(
        conn,
        &ProcessingInfo {
            image_id: image.id,
            started_at: now(),
            completed_at: None,
            elapsed_ms: None,
            error: None,
            converted_format: false,
        },
    )?;

    aggregate::recompute_batch(conn, batch_id)?;

    tracing::info!(
        image_id = %image.id,
        batch_id = %batch_id,
        file = %image.original_name,
        bytes = size,
        "Image ingested"
    );
    Ok(image)
}

/// Ingest several uploads, collecting per-file failures instead of
/// stopping at the first one.
pub fn ingest_images(
    conn: &Connection,
    store: &dyn BlobStore,
    config: &ValidationConfig,
    batch_id: &Uuid,
    user_id: &str,
    uploads: Vec<UploadedImage>,
) -> Result<IntakeReport, IntakeError> {
    let mut report = IntakeReport {
        images: Vec::new(),
        failures: Vec::new(),
    };

    for upload in uploads {
        let file_name = upload.file_name.clone();
        match ingest_image(conn, store, config, batch_id, user_id, upload) {
            Ok(image) => report.images.push(image),
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "Upload refused at intake");
                report.failures.push((file_name, e.to_string()));
            }
        }
    }

    Ok(report)
}

/// Logically remove an image. Status is untouched; counters are
/// recomputed over the remaining children.
pub fn soft_delete_image(conn: &Connection, image_id: &Uuid) -> Result<(), IntakeError> {
    let image = image_repo::get_image(conn, image_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Image".into(),
        id: image_id.to_string(),
    })?;
    image_repo::soft_delete_image(conn, image_id)?;
    aggregate::recompute_batch(conn, &image.batch_id)?;
    Ok(())
}

pub fn restore_image(conn: &Connection, image_id: &Uuid) -> Result<(), IntakeError> {
    let image =
        image_repo::get_image_any(conn, image_id)?.ok_or_else(|| DatabaseError::NotFound {
            entity_type: "Image".into(),
            id: image_id.to_string(),
        })?;
    image_repo::restore_image(conn, image_id)?;
    aggregate::recompute_batch(conn, &image.batch_id)?;
    Ok(())
}

/// Remove an image, its dependent rows and its stored bytes.
pub fn delete_image(
    conn: &Connection,
    store: &dyn BlobStore,
    image_id: &Uuid,
) -> Result<(), IntakeError> {
    let image =
        image_repo::get_image_any(conn, image_id)?.ok_or_else(|| DatabaseError::NotFound {
            entity_type: "Image".into(),
            id: image_id.to_string(),
        })?;

    let key = image_repo::hard_delete_image(conn, image_id)?;
    if let Err(e) = store.delete(&key) {
        tracing::warn!(key = %key, error = %e, "Blob already gone during image deletion");
    }
    aggregate::recompute_batch(conn, &image.batch_id)?;
    Ok(())
}

/// Remove a batch with all of its images and their stored bytes.
pub fn delete_batch(
    conn: &Connection,
    store: &dyn BlobStore,
    batch_id: &Uuid,
) -> Result<(), IntakeError> {
    let keys = batch_repo::delete_batch_cascade(conn, batch_id)?;
    for key in keys {
        if let Err(e) = store.delete(&key) {
            tracing::warn!(key = %key, error = %e, "Blob already gone during batch deletion");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::storage::MemoryBlobStore;

    fn jpeg_upload(name: &str) -> UploadedImage {
        UploadedImage {
            file_name: name.to_string(),
            mime_type: "image/jpeg".to_string(),
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00],
        }
    }

    fn setup() -> (Connection, MemoryBlobStore, ValidationConfig, Uuid) {
        let conn = open_memory_database().unwrap();
        let store = MemoryBlobStore::new();
        let config = ValidationConfig::default();
        let batch = create_batch(&conn, "user-1", "Profile Pictures", None).unwrap();
        (conn, store, config, batch.id)
    }

    #[test]
    fn ingest_stores_bytes_and_creates_processing_record() {
        let (conn, store, config, batch_id) = setup();

        let image =
            ingest_image(&conn, &store, &config, &batch_id, "user-1", jpeg_upload("a.jpg"))
                .unwrap();

        assert_eq!(image.status, ImageStatus::Processing);
        assert_eq!(store.get(&image.storage_key).unwrap(), jpeg_upload("a.jpg").bytes);

        let info = processing_repo::get_processing_info(&conn, &image.id)
            .unwrap()
            .unwrap();
        assert!(info.completed_at.is_none());

        let batch = batch_repo::get_batch(&conn, &batch_id).unwrap().unwrap();
        assert_eq!(batch.total_images, 1);
        assert_eq!(batch.processed_images, 0);
    }

    #[test]
    fn disallowed_mime_refused() {
        let (conn, store, config, batch_id) = setup();
        let upload = UploadedImage {
            file_name: "clip.gif".into(),
            mime_type: "image/gif".into(),
            bytes: vec![1, 2, 3],
        };

        let result = ingest_image(&conn, &store, &config, &batch_id, "user-1", upload);
        assert!(matches!(result, Err(IntakeError::UnsupportedMediaType { .. })));
        assert!(store.is_empty(), "refused upload must not be stored");
    }

    #[test]
    fn oversized_upload_refused() {
        let (conn, store, mut config, batch_id) = setup();
        config.max_upload_bytes = 4;

        let result =
            ingest_image(&conn, &store, &config, &batch_id, "user-1", jpeg_upload("big.jpg"));
        assert!(matches!(result, Err(IntakeError::TooLarge { .. })));
    }

    #[test]
    fn unknown_batch_refused() {
        let (conn, store, config, _) = setup();
        let result = ingest_image(
            &conn,
            &store,
            &config,
            &Uuid::new_v4(),
            "user-1",
            jpeg_upload("a.jpg"),
        );
        assert!(matches!(
            result,
            Err(IntakeError::Database(DatabaseError::NotFound { .. }))
        ));
    }

    #[test]
    fn multi_ingest_collects_failures() {
        let (conn, store, config, batch_id) = setup();
        let uploads = vec![
            jpeg_upload("good.jpg"),
            UploadedImage {
                file_name: "bad.gif".into(),
                mime_type: "image/gif".into(),
                bytes: vec![1],
            },
        ];

        let report =
            ingest_images(&conn, &store, &config, &batch_id, "user-1", uploads).unwrap();
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.failures[0].0, "bad.gif");
    }

    #[test]
    fn soft_delete_and_restore_recompute_counters() {
        let (conn, store, config, batch_id) = setup();
        let image =
            ingest_image(&conn, &store, &config, &batch_id, "user-1", jpeg_upload("a.jpg"))
                .unwrap();

        soft_delete_image(&conn, &image.id).unwrap();
        let batch = batch_repo::get_batch(&conn, &batch_id).unwrap().unwrap();
        assert_eq!(batch.total_images, 0);

        restore_image(&conn, &image.id).unwrap();
        let batch = batch_repo::get_batch(&conn, &batch_id).unwrap().unwrap();
        assert_eq!(batch.total_images, 1);
    }

    #[test]
    fn hard_delete_removes_blob_and_rows() {
        let (conn, store, config, batch_id) = setup();
        let image =
            ingest_image(&conn, &store, &config, &batch_id, "user-1", jpeg_upload("a.jpg"))
                .unwrap();

        delete_image(&conn, &store, &image.id).unwrap();
        assert!(store.is_empty());
        assert!(image_repo::get_image_any(&conn, &image.id).unwrap().is_none());

        let batch = batch_repo::get_batch(&conn, &batch_id).unwrap().unwrap();
        assert_eq!(batch.total_images, 0);
    }

    #[test]
    fn delete_batch_clears_store() {
        let (conn, store, config, batch_id) = setup();
        ingest_image(&conn, &store, &config, &batch_id, "user-1", jpeg_upload("a.jpg")).unwrap();
        ingest_image(&conn, &store, &config, &batch_id, "user-1", jpeg_upload("b.jpg")).unwrap();

        delete_batch(&conn, &store, &batch_id).unwrap();
        assert!(store.is_empty());
        assert!(batch_repo::get_batch(&conn, &batch_id).unwrap().is_none());
    }
}
