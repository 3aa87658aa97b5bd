use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::faces::FaceBox;
use crate::models::FaceInfo;

/// Insert or overwrite an image's face metrics. Metrics are stored
/// regardless of the validation verdict.
pub fn upsert_face_info(conn: &Connection, info: &FaceInfo) -> Result<(), DatabaseError> {
    let bounding_box = info
        .bounding_box
        .as_ref()
        .map(|b| serde_json::to_string(b).unwrap_or_default());

    conn.execute(
        "INSERT INTO face_info (image_id, face_count, primary_area_pct, confidence, bounding_box)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(image_id) DO UPDATE SET
             face_count = excluded.face_count,
             primary_area_pct = excluded.primary_area_pct,
             confidence = excluded.confidence,
             bounding_box = excluded.bounding_box",
        params![
            info.image_id.to_string(),
            info.face_count,
            info.primary_area_pct,
            info.confidence,
            bounding_box,
        ],
    )?;
    Ok(())
}

pub fn get_face_info(conn: &Connection, image_id: &Uuid) -> Result<Option<FaceInfo>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT image_id, face_count, primary_area_pct, confidence, bounding_box
         FROM face_info WHERE image_id = ?1",
    )?;

    let result = stmt.query_row(params![image_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, u32>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    });

    match result {
        Ok((id, face_count, primary_area_pct, confidence, bounding_box)) => {
            let bounding_box: Option<FaceBox> =
                bounding_box.and_then(|json| serde_json::from_str(&json).ok());
            Ok(Some(FaceInfo {
                image_id: Uuid::parse_str(&id)
                    .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
                face_count,
                primary_area_pct,
                confidence,
                bounding_box,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
