//! The validation core: per-image check chain and batch aggregation.
//!
//! Stage modules are leaf-first: `normalize` → `geometry` → `phash` →
//! `duplicate` → `sharpness` → `face_check`, driven in that fixed order by
//! `orchestrator`. `aggregate` folds per-image outcomes into batch
//! summaries; `intake` creates the records the chain operates on; `worker`
//! is the task boundary that runs chains off-thread.
//!
//! Two disjoint fault classes flow through here. Content-policy failures
//! (bad geometry, duplicate, blur, face policy) are ordinary values —
//! `StageOutcome::Reject` — and end as `Rejected` with a human-readable
//! reason. Infrastructure failures (undecodable bytes, storage or database
//! faults) are `Err(ValidationError)` and end as `Error`.

pub mod aggregate;
pub mod duplicate;
pub mod face_check;
pub mod geometry;
pub mod intake;
pub mod normalize;
pub mod orchestrator;
pub mod phash;
pub mod sharpness;
pub mod worker;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Image not found: {0}")]
    ImageNotFound(Uuid),

    #[error("Image {id} already has terminal status {status}")]
    AlreadyTerminal { id: Uuid, status: String },

    #[error("Format conversion failed: {0}")]
    Conversion(String),

    #[error("Fingerprint comparison failed: {0}")]
    Comparison(String),
}

/// Verdict of a single content-policy check. Rejections carry the full
/// human-readable reason that ends up on the image record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Pass,
    Reject(String),
}

impl StageOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Reject(reason) => Some(reason),
        }
    }
}
