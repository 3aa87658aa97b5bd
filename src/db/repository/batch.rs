use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::{BatchCounters, BatchRecord, BatchStatus};

const BATCH_COLUMNS: &str = "id, user_id, name, description, status, total_images, \
     processed_images, accepted_images, rejected_images, errored_images, completed_at, created_at";

pub fn insert_batch(conn: &Connection, batch: &BatchRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO batches (id, user_id, name, description, status, total_images,
         processed_images, accepted_images, rejected_images, errored_images, completed_at,
         created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            batch.id.to_string(),
            batch.user_id,
            batch.name,
            batch.description,
            batch.status.as_str(),
            batch.total_images,
            batch.processed_images,
            batch.accepted_images,
            batch.rejected_images,
            batch.errored_images,
            batch.completed_at.as_ref().map(fmt_ts),
            fmt_ts(&batch.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_batch(conn: &Connection, id: &Uuid) -> Result<Option<BatchRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = ?1"))?;
    match stmt.query_row(params![id.to_string()], map_row) {
        Ok(row) => Ok(Some(batch_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List batches, newest first, optionally restricted to one user and/or
/// one status.
pub fn list_batches(
    conn: &Connection,
    user_id: Option<&str>,
    status: Option<BatchStatus>,
    limit: u32,
    offset: u32,
) -> Result<Vec<BatchRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BATCH_COLUMNS} FROM batches
         WHERE (?1 IS NULL OR user_id = ?1)
           AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at DESC, id
         LIMIT ?3 OFFSET ?4"
    ))?;
    let rows = stmt.query_map(
        params![user_id, status.map(|s| s.as_str()), limit, offset],
        map_row,
    )?;

    let mut batches = Vec::new();
    for row in rows {
        batches.push(batch_from_row(row?)?);
    }
    Ok(batches)
}

/// Overwrite a batch's derived rollup (counters, status, completion time).
/// Only the aggregator calls this; external callers never mutate status
/// directly.
pub fn update_batch_rollup(
    conn: &Connection,
    id: &Uuid,
    counters: &BatchCounters,
    status: BatchStatus,
    completed_at: Option<NaiveDateTime>,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE batches SET status = ?2, total_images = ?3, processed_images = ?4,
         accepted_images = ?5, rejected_images = ?6, errored_images = ?7, completed_at = ?8
         WHERE id = ?1",
        params![
            id.to_string(),
            status.as_str(),
            counters.total,
            counters.processed(),
            counters.accepted,
            counters.rejected,
            counters.errored,
            completed_at.as_ref().map(fmt_ts),
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Batch".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Delete a batch and every dependent row of its images. Returns the blob
/// storage keys of the removed images so the caller can clear the store.
pub fn delete_batch_cascade(conn: &Connection, id: &Uuid) -> Result<Vec<String>, DatabaseError> {
    let id_str = id.to_string();

    let mut stmt = conn.prepare("SELECT storage_key FROM images WHERE batch_id = ?1")?;
    let keys: Vec<String> = stmt
        .query_map(params![id_str], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();
    drop(stmt);

    conn.execute(
        "DELETE FROM validation_results WHERE image_id IN (SELECT id FROM images WHERE batch_id = ?1)",
        params![id_str],
    )?;
    conn.execute(
        "DELETE FROM face_info WHERE image_id IN (SELECT id FROM images WHERE batch_id = ?1)",
        params![id_str],
    )?;
    conn.execute(
        "DELETE FROM processing_info WHERE image_id IN (SELECT id FROM images WHERE batch_id = ?1)",
        params![id_str],
    )?;
    let deleted_images = conn.execute("DELETE FROM images WHERE batch_id = ?1", params![id_str])?;

    let deleted = conn.execute("DELETE FROM batches WHERE id = ?1", params![id_str])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Batch".into(),
            id: id_str,
        });
    }

    tracing::info!(batch_id = %id, images = deleted_images, "Batch deleted with all images");
    Ok(keys)
}

// Internal row type for BatchRecord mapping
struct BatchRow {
    id: String,
    user_id: String,
    name: String,
    description: Option<String>,
    status: String,
    total_images: u32,
    processed_images: u32,
    accepted_images: u32,
    rejected_images: u32,
    errored_images: u32,
    completed_at: Option<String>,
    created_at: String,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BatchRow> {
    Ok(BatchRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        total_images: row.get(5)?,
        processed_images: row.get(6)?,
        accepted_images: row.get(7)?,
        rejected_images: row.get(8)?,
        errored_images: row.get(9)?,
        completed_at: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn batch_from_row(row: BatchRow) -> Result<BatchRecord, DatabaseError> {
    Ok(BatchRecord {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        user_id: row.user_id,
        name: row.name,
        description: row.description,
        status: BatchStatus::from_str(&row.status)?,
        total_images: row.total_images,
        processed_images: row.processed_images,
        accepted_images: row.accepted_images,
        rejected_images: row.rejected_images,
        errored_images: row.errored_images,
        completed_at: row.completed_at.as_deref().map(parse_ts),
        created_at: parse_ts(&row.created_at),
    })
}
