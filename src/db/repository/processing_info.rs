use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::ProcessingInfo;

pub fn insert_processing_info(
    conn: &Connection,
    info: &ProcessingInfo,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO processing_info (image_id, started_at, completed_at, elapsed_ms, error,
         converted_format)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            info.image_id.to_string(),
            fmt_ts(&info.started_at),
            info.completed_at.as_ref().map(fmt_ts),
            info.elapsed_ms,
            info.error,
            info.converted_format as i32,
        ],
    )?;
    Ok(())
}

pub fn get_processing_info(
    conn: &Connection,
    image_id: &Uuid,
) -> Result<Option<ProcessingInfo>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT image_id, started_at, completed_at, elapsed_ms, error, converted_format
         FROM processing_info WHERE image_id = ?1",
    )?;

    let result = stmt.query_row(params![image_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<i64>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, i32>(5)?,
        ))
    });

    match result {
        Ok((id, started, completed, elapsed_ms, error, converted)) => Ok(Some(ProcessingInfo {
            image_id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            started_at: parse_ts(&started),
            completed_at: completed.as_deref().map(parse_ts),
            elapsed_ms,
            error,
            converted_format: converted != 0,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Stamp completion time, elapsed duration and (for `Error` outcomes) the
/// fault text. Always called exactly once per terminal transition.
pub fn complete_processing(
    conn: &Connection,
    image_id: &Uuid,
    completed_at: NaiveDateTime,
    elapsed_ms: i64,
    error: Option<&str>,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE processing_info SET completed_at = ?2, elapsed_ms = ?3, error = ?4
         WHERE image_id = ?1",
        params![image_id.to_string(), fmt_ts(&completed_at), elapsed_ms, error],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ProcessingInfo".into(),
            id: image_id.to_string(),
        });
    }
    Ok(())
}

/// Note that the normalizer re-encoded the upload into the canonical format.
pub fn set_converted_format(conn: &Connection, image_id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE processing_info SET converted_format = 1 WHERE image_id = ?1",
        params![image_id.to_string()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ProcessingInfo".into(),
            id: image_id.to_string(),
        });
    }
    Ok(())
}
