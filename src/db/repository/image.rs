use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::{ImageRecord, ImageStatus};

const IMAGE_COLUMNS: &str = "id, batch_id, user_id, original_name, size_bytes, mime_type, \
     width, height, storage_key, status, rejection_reason, hash, sharpness_score, tags, \
     is_deleted, created_at";

pub fn insert_image(conn: &Connection, image: &ImageRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO images (id, batch_id, user_id, original_name, size_bytes, mime_type,
         width, height, storage_key, status, rejection_reason, hash, sharpness_score, tags,
         is_deleted, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            image.id.to_string(),
            image.batch_id.to_string(),
            image.user_id,
            image.original_name,
            image.size_bytes,
            image.mime_type,
            image.width,
            image.height,
            image.storage_key,
            image.status.as_str(),
            image.rejection_reason,
            image.hash,
            image.sharpness_score,
            serde_json::to_string(&image.tags).unwrap_or_else(|_| "[]".into()),
            image.is_deleted as i32,
            fmt_ts(&image.created_at),
        ],
    )?;
    Ok(())
}

/// Get a non-deleted image by id.
pub fn get_image(conn: &Connection, id: &Uuid) -> Result<Option<ImageRecord>, DatabaseError> {
    query_one(
        conn,
        &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?1 AND is_deleted = 0"),
        params![id.to_string()],
    )
}

/// Get an image by id, including soft-deleted ones (restore path).
pub fn get_image_any(conn: &Connection, id: &Uuid) -> Result<Option<ImageRecord>, DatabaseError> {
    query_one(
        conn,
        &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?1"),
        params![id.to_string()],
    )
}

pub fn list_images_by_batch(
    conn: &Connection,
    batch_id: &Uuid,
) -> Result<Vec<ImageRecord>, DatabaseError> {
    query_many(
        conn,
        &format!(
            "SELECT {IMAGE_COLUMNS} FROM images
             WHERE batch_id = ?1 AND is_deleted = 0
             ORDER BY created_at, id"
        ),
        params![batch_id.to_string()],
    )
}

pub fn list_images_by_user(
    conn: &Connection,
    user_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<ImageRecord>, DatabaseError> {
    query_many(
        conn,
        &format!(
            "SELECT {IMAGE_COLUMNS} FROM images
             WHERE user_id = ?1 AND is_deleted = 0
             ORDER BY created_at DESC, id
             LIMIT ?2 OFFSET ?3"
        ),
        params![user_id, limit, offset],
    )
}

pub fn list_deleted_images(
    conn: &Connection,
    limit: u32,
    offset: u32,
) -> Result<Vec<ImageRecord>, DatabaseError> {
    query_many(
        conn,
        &format!(
            "SELECT {IMAGE_COLUMNS} FROM images
             WHERE is_deleted = 1
             ORDER BY created_at DESC, id
             LIMIT ?1 OFFSET ?2"
        ),
        params![limit, offset],
    )
}

/// Images still awaiting a terminal outcome (restart re-drive path).
pub fn pending_images(conn: &Connection) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM images WHERE status = 'processing' AND is_deleted = 0 ORDER BY created_at",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        let id = row?;
        ids.push(
            Uuid::parse_str(&id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        );
    }
    Ok(ids)
}

/// Record the raster facts discovered during normalization.
pub fn update_raster_metadata(
    conn: &Connection,
    id: &Uuid,
    width: u32,
    height: u32,
    mime_type: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE images SET width = ?2, height = ?3, mime_type = ?4 WHERE id = ?1",
        params![id.to_string(), width, height, mime_type],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Image".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Persist fingerprint and sharpness score together (both exist once the
/// chain has reached the sharpness stage).
pub fn set_fingerprint(
    conn: &Connection,
    id: &Uuid,
    hash: &str,
    sharpness_score: f64,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE images SET hash = ?2, sharpness_score = ?3 WHERE id = ?1",
        params![id.to_string(), hash, sharpness_score],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Image".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Transition an image out of `processing` exactly once. The WHERE guard
/// makes a second transition a constraint violation rather than a silent
/// overwrite.
pub fn set_terminal_status(
    conn: &Connection,
    id: &Uuid,
    status: ImageStatus,
    rejection_reason: Option<&str>,
) -> Result<(), DatabaseError> {
    debug_assert!(status.is_terminal());
    let rows = conn.execute(
        "UPDATE images SET status = ?2, rejection_reason = ?3
         WHERE id = ?1 AND status = 'processing'",
        params![id.to_string(), status.as_str(), rejection_reason],
    )?;
    if rows == 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "image {id} is not in processing status"
        )));
    }
    Ok(())
}

/// Exact-fingerprint match among the batch's accepted, non-deleted images
/// (cheap first pass of duplicate detection).
pub fn find_exact_hash(
    conn: &Connection,
    batch_id: &Uuid,
    exclude_image: &Uuid,
    hash: &str,
) -> Result<Option<Uuid>, DatabaseError> {
    let result: Result<String, _> = conn.query_row(
        "SELECT id FROM images
         WHERE batch_id = ?1 AND hash = ?2 AND id != ?3
           AND status = 'validated' AND is_deleted = 0
         LIMIT 1",
        params![batch_id.to_string(), hash, exclude_image.to_string()],
        |row| row.get(0),
    );

    match result {
        Ok(id) => Ok(Some(
            Uuid::parse_str(&id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        )),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Fingerprints of the batch's accepted, non-deleted images (full pairwise
/// pass of duplicate detection).
pub fn accepted_fingerprints(
    conn: &Connection,
    batch_id: &Uuid,
    exclude_image: &Uuid,
) -> Result<Vec<(Uuid, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, hash FROM images
         WHERE batch_id = ?1 AND id != ?2 AND hash IS NOT NULL
           AND status = 'validated' AND is_deleted = 0
         ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map(
        params![batch_id.to_string(), exclude_image.to_string()],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;

    let mut fingerprints = Vec::new();
    for row in rows {
        let (id, hash) = row?;
        let id =
            Uuid::parse_str(&id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
        fingerprints.push((id, hash));
    }
    Ok(fingerprints)
}

/// Per-status counts over a batch's non-deleted children, for aggregation.
pub fn status_counts(
    conn: &Connection,
    batch_id: &Uuid,
) -> Result<Vec<(ImageStatus, u32)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM images
         WHERE batch_id = ?1 AND is_deleted = 0
         GROUP BY status",
    )?;
    let rows = stmt.query_map(params![batch_id.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
    })?;

    let mut counts = Vec::new();
    for row in rows {
        let (status, count) = row?;
        counts.push((ImageStatus::from_str(&status)?, count));
    }
    Ok(counts)
}

/// Mark an image logically removed. Does not touch `status`.
pub fn soft_delete_image(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE images SET is_deleted = 1 WHERE id = ?1 AND is_deleted = 0",
        params![id.to_string()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Image".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn restore_image(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE images SET is_deleted = 0 WHERE id = ?1 AND is_deleted = 1",
        params![id.to_string()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Image".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Remove an image and all dependent rows. Returns the blob storage key so
/// the caller can delete the stored bytes as well.
pub fn hard_delete_image(conn: &Connection, id: &Uuid) -> Result<String, DatabaseError> {
    let image = get_image_any(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Image".into(),
        id: id.to_string(),
    })?;

    let id_str = id.to_string();
    conn.execute("DELETE FROM validation_results WHERE image_id = ?1", params![id_str])?;
    conn.execute("DELETE FROM face_info WHERE image_id = ?1", params![id_str])?;
    conn.execute("DELETE FROM processing_info WHERE image_id = ?1", params![id_str])?;
    conn.execute("DELETE FROM images WHERE id = ?1", params![id_str])?;

    tracing::info!(image_id = %id, "Image hard-deleted with all dependent rows");
    Ok(image.storage_key)
}

// Internal row type for ImageRecord mapping
struct ImageRow {
    id: String,
    batch_id: String,
    user_id: String,
    original_name: String,
    size_bytes: i64,
    mime_type: String,
    width: Option<u32>,
    height: Option<u32>,
    storage_key: String,
    status: String,
    rejection_reason: Option<String>,
    hash: Option<String>,
    sharpness_score: Option<f64>,
    tags: String,
    is_deleted: i32,
    created_at: String,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageRow> {
    Ok(ImageRow {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        user_id: row.get(2)?,
        original_name: row.get(3)?,
        size_bytes: row.get(4)?,
        mime_type: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
        storage_key: row.get(8)?,
        status: row.get(9)?,
        rejection_reason: row.get(10)?,
        hash: row.get(11)?,
        sharpness_score: row.get(12)?,
        tags: row.get(13)?,
        is_deleted: row.get(14)?,
        created_at: row.get(15)?,
    })
}

fn image_from_row(row: ImageRow) -> Result<ImageRecord, DatabaseError> {
    Ok(ImageRecord {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        batch_id: Uuid::parse_str(&row.batch_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        user_id: row.user_id,
        original_name: row.original_name,
        size_bytes: row.size_bytes,
        mime_type: row.mime_type,
        width: row.width,
        height: row.height,
        storage_key: row.storage_key,
        status: ImageStatus::from_str(&row.status)?,
        rejection_reason: row.rejection_reason,
        hash: row.hash,
        sharpness_score: row.sharpness_score,
        tags: serde_json::from_str(&row.tags).unwrap_or_default(),
        is_deleted: row.is_deleted != 0,
        created_at: parse_ts(&row.created_at),
    })
}

fn query_one(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Option<ImageRecord>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    match stmt.query_row(params, map_row) {
        Ok(row) => Ok(Some(image_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn query_many(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<ImageRecord>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map_row)?;

    let mut images = Vec::new();
    for row in rows {
        images.push(image_from_row(row?)?);
    }
    Ok(images)
}
