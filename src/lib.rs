//! Photogate — validation core of a photo-intake service.
//!
//! Uploaded images are ingested into batches, driven through a fixed
//! chain of quality checks (format normalization, geometry, perceptual
//! near-duplicate detection, sharpness, face geometry) to a single
//! terminal verdict, and rolled up into per-batch summaries. The HTTP
//! surface, durable object storage and the face detection model itself
//! are external collaborators behind the `storage` and `faces`
//! boundaries.

pub mod config;
pub mod db;
pub mod faces;
pub mod models;
pub mod pipeline;
pub mod storage;

pub use config::ValidationConfig;
pub use faces::{DetectedFace, FaceBox, FaceDetector, HttpFaceDetector};
pub use models::{BatchRecord, BatchStatus, ImageRecord, ImageStatus};
pub use pipeline::aggregate::recompute_batch;
pub use pipeline::orchestrator::ImageValidator;
pub use pipeline::worker::{RetryPolicy, ValidationWorker};
pub use storage::{BlobStore, FsBlobStore};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and tests that want log output.
/// Honors RUST_LOG, defaulting to the crate's info level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
