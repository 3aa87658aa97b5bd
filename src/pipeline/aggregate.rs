//! Batch aggregation.
//!
//! Always a full recomputation from the batch's current non-deleted
//! children — never a delta — so redundant or concurrently interleaved
//! invocations converge on the same answer (last writer wins on identical
//! input). The completion timestamp is set on the transition into a
//! terminal status, kept while the batch stays terminal, and cleared if
//! new in-flight children pull it back to processing.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{batch as batch_repo, image as image_repo, now};
use crate::db::DatabaseError;
use crate::models::{BatchCounters, BatchStatus, ImageStatus};

/// Recompute a batch's counters and derived status. Safe to call after
/// every image's terminal transition, including concurrently.
pub fn recompute_batch(conn: &Connection, batch_id: &Uuid) -> Result<BatchStatus, DatabaseError> {
    let current = batch_repo::get_batch(conn, batch_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Batch".into(),
        id: batch_id.to_string(),
    })?;

    let mut counters = BatchCounters::default();
    for (status, count) in image_repo::status_counts(conn, batch_id)? {
        counters.total += count;
        match status {
            ImageStatus::Validated => counters.accepted += count,
            ImageStatus::Rejected => counters.rejected += count,
            ImageStatus::Error => counters.errored += count,
            ImageStatus::Processing => {}
        }
    }

    let status = counters.derive_status();
    let completed_at = match (current.status.is_terminal(), status.is_terminal()) {
        (_, false) => None,
        (true, true) => current.completed_at.or_else(|| Some(now())),
        (false, true) => Some(now()),
    };

    batch_repo::update_batch_rollup(conn, batch_id, &counters, status, completed_at)?;

    tracing::debug!(
        batch_id = %batch_id,
        status = status.as_str(),
        total = counters.total,
        processed = counters.processed(),
        accepted = counters.accepted,
        rejected = counters.rejected,
        errored = counters.errored,
        "Batch rollup recomputed"
    );

    Ok(status)
}
