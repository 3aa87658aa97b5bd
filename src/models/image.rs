use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{CheckKind, ImageStatus};
use crate::faces::FaceBox;

/// An uploaded image and its validation state.
///
/// `width`, `height` and `mime_type` describe the raster after
/// normalization and are filled in as the pipeline progresses;
/// `original_name`, `size_bytes` and `storage_key` are immutable
/// upload-time facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub user_id: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub storage_key: String,
    pub status: ImageStatus,
    /// Set if and only if `status == Rejected`.
    pub rejection_reason: Option<String>,
    /// Perceptual fingerprint, populated once the chain reaches the
    /// sharpness stage.
    pub hash: Option<String>,
    pub sharpness_score: Option<f64>,
    pub tags: Vec<String>,
    /// Logical removal; orthogonal to `status`.
    pub is_deleted: bool,
    pub created_at: NaiveDateTime,
}

/// Per-image processing bookkeeping (one-to-one with `ImageRecord`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingInfo {
    pub image_id: Uuid,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub elapsed_ms: Option<i64>,
    /// Infrastructure fault detail; set only for `Error` outcomes.
    pub error: Option<String>,
    /// True when the normalizer re-encoded an alternate format.
    pub converted_format: bool,
}

/// Face metrics from the remote detector (zero-or-one per image).
/// Persisted regardless of verdict so rejected images keep their metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceInfo {
    pub image_id: Uuid,
    pub face_count: u32,
    /// Largest face's area as a percentage of total image area.
    pub primary_area_pct: f64,
    pub confidence: f64,
    pub bounding_box: Option<FaceBox>,
}

/// One row of the append-only audit trail: a single check that ran,
/// whether it passed, and any numeric/structured detail. Never mutated
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: Uuid,
    pub image_id: Uuid,
    pub kind: CheckKind,
    pub passed: bool,
    pub value: Option<f64>,
    pub detail: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_record_serde_round_trip() {
        let record = ImageRecord {
            id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            user_id: "user-1".into(),
            original_name: "portrait.jpg".into(),
            size_bytes: 204_800,
            mime_type: "image/jpeg".into(),
            width: Some(1920),
            height: Some(1080),
            storage_key: "uploads/abc.jpg".into(),
            status: ImageStatus::Validated,
            rejection_reason: None,
            hash: Some("f".repeat(64)),
            sharpness_score: Some(152.5),
            tags: vec!["profile".into()],
            is_deleted: false,
            created_at: chrono::NaiveDate::from_ymd_opt(2026, 8, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: ImageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, record.id);
        assert_eq!(parsed.status, ImageStatus::Validated);
        assert_eq!(parsed.hash.as_deref().map(str::len), Some(64));
    }

    #[test]
    fn validation_record_detail_is_structured() {
        let record = ValidationRecord {
            id: Uuid::new_v4(),
            image_id: Uuid::new_v4(),
            kind: CheckKind::Geometry,
            passed: false,
            value: None,
            detail: Some(serde_json::json!({"width": 100, "height": 100})),
            created_at: chrono::NaiveDate::from_ymd_opt(2026, 8, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"kind\":\"geometry\""));
        assert!(json.contains("\"width\":100"));
    }
}
