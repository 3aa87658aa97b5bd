use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::{CheckKind, ValidationRecord};

/// Append one audit row. Rows are never updated or deleted individually —
/// the trail is append-only.
pub fn append_validation_result(
    conn: &Connection,
    record: &ValidationRecord,
) -> Result<(), DatabaseError> {
    let detail = record
        .detail
        .as_ref()
        .map(|d| serde_json::to_string(d).unwrap_or_default());

    conn.execute(
        "INSERT INTO validation_results (id, image_id, kind, passed, value, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id.to_string(),
            record.image_id.to_string(),
            record.kind.as_str(),
            record.passed as i32,
            record.value,
            detail,
            fmt_ts(&record.created_at),
        ],
    )?;
    Ok(())
}

/// An image's audit trail in execution order.
pub fn list_validation_results(
    conn: &Connection,
    image_id: &Uuid,
) -> Result<Vec<ValidationRecord>, DatabaseError> {
    query_results(
        conn,
        "SELECT id, image_id, kind, passed, value, detail, created_at
         FROM validation_results WHERE image_id = ?1 ORDER BY rowid",
        image_id,
    )
}

/// Only the checks that failed (at most one per image, since the chain
/// stops at the first failure).
pub fn list_failed_validations(
    conn: &Connection,
    image_id: &Uuid,
) -> Result<Vec<ValidationRecord>, DatabaseError> {
    query_results(
        conn,
        "SELECT id, image_id, kind, passed, value, detail, created_at
         FROM validation_results WHERE image_id = ?1 AND passed = 0 ORDER BY rowid",
        image_id,
    )
}

fn query_results(
    conn: &Connection,
    sql: &str,
    image_id: &Uuid,
) -> Result<Vec<ValidationRecord>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![image_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i32>(3)?,
            row.get::<_, Option<f64>>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, image_id, kind, passed, value, detail, created_at) = row?;
        records.push(ValidationRecord {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            image_id: Uuid::parse_str(&image_id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            kind: CheckKind::from_str(&kind)?,
            passed: passed != 0,
            value,
            detail: detail.and_then(|d| serde_json::from_str(&d).ok()),
            created_at: parse_ts(&created_at),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::now;
    use crate::db::sqlite::open_memory_database;

    fn seed_image(conn: &Connection) -> Uuid {
        let batch_id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO batches (id, user_id, name, status, created_at)
             VALUES (?1, 'u1', 'B', 'processing', '2026-08-01 10:00:00')",
            params![batch_id.to_string()],
        )
        .unwrap();
        let image_id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO images (id, batch_id, user_id, original_name, size_bytes, mime_type,
             storage_key, status, created_at)
             VALUES (?1, ?2, 'u1', 'a.jpg', 10, 'image/jpeg', 'k', 'processing',
             '2026-08-01 10:00:00')",
            params![image_id.to_string(), batch_id.to_string()],
        )
        .unwrap();
        image_id
    }

    fn make_record(image_id: Uuid, kind: CheckKind, passed: bool) -> ValidationRecord {
        ValidationRecord {
            id: Uuid::new_v4(),
            image_id,
            kind,
            passed,
            value: Some(42.0),
            detail: Some(serde_json::json!({"threshold": 10})),
            created_at: now(),
        }
    }

    #[test]
    fn trail_preserves_execution_order() {
        let conn = open_memory_database().unwrap();
        let image_id = seed_image(&conn);

        append_validation_result(&conn, &make_record(image_id, CheckKind::Geometry, true)).unwrap();
        append_validation_result(&conn, &make_record(image_id, CheckKind::HashDuplicate, true))
            .unwrap();
        append_validation_result(&conn, &make_record(image_id, CheckKind::Sharpness, false))
            .unwrap();

        let trail = list_validation_results(&conn, &image_id).unwrap();
        assert_eq!(trail.len(), 3);
        assert_eq!(trail[0].kind, CheckKind::Geometry);
        assert_eq!(trail[1].kind, CheckKind::HashDuplicate);
        assert_eq!(trail[2].kind, CheckKind::Sharpness);
        assert!(!trail[2].passed);
    }

    #[test]
    fn failed_listing_filters_passed_checks() {
        let conn = open_memory_database().unwrap();
        let image_id = seed_image(&conn);

        append_validation_result(&conn, &make_record(image_id, CheckKind::Geometry, true)).unwrap();
        append_validation_result(&conn, &make_record(image_id, CheckKind::FaceCount, false))
            .unwrap();

        let failed = list_failed_validations(&conn, &image_id).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].kind, CheckKind::FaceCount);
    }

    #[test]
    fn detail_payload_round_trips() {
        let conn = open_memory_database().unwrap();
        let image_id = seed_image(&conn);
        append_validation_result(&conn, &make_record(image_id, CheckKind::Sharpness, true))
            .unwrap();

        let trail = list_validation_results(&conn, &image_id).unwrap();
        let detail = trail[0].detail.as_ref().unwrap();
        assert_eq!(detail["threshold"], 10);
        assert_eq!(trail[0].value, Some(42.0));
    }

    #[test]
    fn empty_trail_for_unknown_image() {
        let conn = open_memory_database().unwrap();
        assert!(list_validation_results(&conn, &Uuid::new_v4()).unwrap().is_empty());
    }
}
