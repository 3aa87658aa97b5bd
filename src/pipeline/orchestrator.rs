//! Validation orchestrator — drives one image through the fixed chain
//! Normalize → Geometry → Hash → Duplicate → Sharpness → Face detection →
//! Face geometry, stopping at the first failing stage.
//!
//! State machine: `processing` → { `validated`, `rejected`, `error` },
//! exactly one transition. Policy failures become `rejected` with the
//! failing stage's reason; normalizer/storage faults become `error` with
//! the fault text on `processing_info`. Every check that ran leaves one
//! audit row whether or not it halted the chain; timestamps and elapsed
//! duration are recorded for every outcome. The batch rollup is recomputed
//! after each terminal transition.

use std::sync::Arc;
use std::time::Instant;

use rusqlite::Connection;
use uuid::Uuid;

use crate::config::ValidationConfig;
use crate::db::repository::{
    face_info as face_repo, image as image_repo, now, processing_info as processing_repo,
    validation_result as audit_repo,
};
use crate::faces::FaceDetector;
use crate::models::{CheckKind, FaceInfo, ImageRecord, ImageStatus, ValidationRecord};
use crate::storage::BlobStore;

use super::{
    aggregate, duplicate, face_check, geometry, normalize, phash, sharpness, StageOutcome,
    ValidationError,
};

/// Runs validation chains. Collaborators are injected so the orchestrator
/// is testable with in-memory fakes.
pub struct ImageValidator {
    blob_store: Arc<dyn BlobStore>,
    face_detector: Arc<dyn FaceDetector>,
    config: ValidationConfig,
}

impl ImageValidator {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        face_detector: Arc<dyn FaceDetector>,
        config: ValidationConfig,
    ) -> Self {
        Self {
            blob_store,
            face_detector,
            config,
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Run the full chain once and return the terminal status.
    ///
    /// Calling this on an image that already reached a terminal status is
    /// a caller error and leaves the record untouched.
    pub fn validate(
        &self,
        conn: &Connection,
        image_id: &Uuid,
    ) -> Result<ImageStatus, ValidationError> {
        let started = Instant::now();

        let image = image_repo::get_image(conn, image_id)?
            .ok_or(ValidationError::ImageNotFound(*image_id))?;
        if image.status.is_terminal() {
            return Err(ValidationError::AlreadyTerminal {
                id: *image_id,
                status: image.status.as_str().to_string(),
            });
        }

        let chain_result = self.run_chain(conn, &image);
        let elapsed_ms = started.elapsed().as_millis() as i64;

        let status = match chain_result {
            Ok(StageOutcome::Pass) => {
                image_repo::set_terminal_status(conn, image_id, ImageStatus::Validated, None)?;
                processing_repo::complete_processing(conn, image_id, now(), elapsed_ms, None)?;
                tracing::info!(image_id = %image_id, elapsed_ms, "Image validated");
                ImageStatus::Validated
            }
            Ok(StageOutcome::Reject(reason)) => {
                image_repo::set_terminal_status(
                    conn,
                    image_id,
                    ImageStatus::Rejected,
                    Some(reason.as_str()),
                )?;
                processing_repo::complete_processing(conn, image_id, now(), elapsed_ms, None)?;
                tracing::info!(image_id = %image_id, reason = %reason, elapsed_ms, "Image rejected");
                ImageStatus::Rejected
            }
            Err(e) => {
                tracing::error!(image_id = %image_id, error = %e, elapsed_ms, "Image validation failed");
                let error_text = e.to_string();
                image_repo::set_terminal_status(conn, image_id, ImageStatus::Error, None)?;
                processing_repo::complete_processing(
                    conn,
                    image_id,
                    now(),
                    elapsed_ms,
                    Some(error_text.as_str()),
                )?;
                ImageStatus::Error
            }
        };

        aggregate::recompute_batch(conn, &image.batch_id)?;
        Ok(status)
    }

    /// The stage sequence. Policy verdicts come back as `Ok(outcome)`;
    /// only infrastructure faults use the error channel.
    fn run_chain(
        &self,
        conn: &Connection,
        image: &ImageRecord,
    ) -> Result<StageOutcome, ValidationError> {
        let bytes = self.blob_store.get(&image.storage_key)?;

        // Normalize: decode once; alternate encodings become canonical JPEG
        let normalized = normalize::normalize(&bytes, &image.mime_type, self.config.jpeg_quality)?;
        if normalized.converted {
            processing_repo::set_converted_format(conn, &image.id)?;
        }
        image_repo::update_raster_metadata(
            conn,
            &image.id,
            normalized.width,
            normalized.height,
            &normalized.mime_type,
        )?;

        // Geometry
        let outcome = geometry::check_dimensions(
            normalized.width,
            normalized.height,
            self.config.min_width,
            self.config.min_height,
        );
        self.record_check(
            conn,
            &image.id,
            CheckKind::Geometry,
            &outcome,
            None,
            Some(serde_json::json!({
                "width": normalized.width,
                "height": normalized.height,
                "min_width": self.config.min_width,
                "min_height": self.config.min_height,
            })),
        )?;
        if !outcome.passed() {
            return Ok(outcome);
        }

        // Fingerprint + duplicate scan (batch-scoped)
        let hash = phash::fingerprint(&normalized.image);
        let duplicate_of = duplicate::find_duplicate(
            conn,
            &image.batch_id,
            &image.id,
            &hash,
            self.config.duplicate_distance_threshold,
        )?;
        let outcome = match duplicate_of {
            Some(prior) => StageOutcome::Reject(format!(
                "Duplicate image detected. Similar to image with ID: {prior}"
            )),
            None => StageOutcome::Pass,
        };
        self.record_check(
            conn,
            &image.id,
            CheckKind::HashDuplicate,
            &outcome,
            None,
            Some(serde_json::json!({
                "hash": hash,
                "duplicate_of": duplicate_of.map(|id| id.to_string()),
            })),
        )?;
        if !outcome.passed() {
            return Ok(outcome);
        }

        // Sharpness. Fingerprint and score persist together from here on,
        // whether or not the threshold check passes.
        let score = sharpness::sharpness_score(&normalized.image.to_luma8());
        image_repo::set_fingerprint(conn, &image.id, &hash, score)?;
        let outcome = sharpness::evaluate(score, self.config.sharpness_threshold);
        self.record_check(
            conn,
            &image.id,
            CheckKind::Sharpness,
            &outcome,
            Some(score),
            Some(serde_json::json!({"threshold": self.config.sharpness_threshold})),
        )?;
        if !outcome.passed() {
            return Ok(outcome);
        }

        // Remote face detection — the only network stage. No locks or
        // open transactions are held across this call. A detector fault
        // means zero faces (fail-closed), never a propagated error.
        let faces = match self.face_detector.detect(&normalized.bytes) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(
                    image_id = %image.id,
                    error = %e,
                    "Face detection unavailable; treating as zero faces"
                );
                Vec::new()
            }
        };

        // Metrics are stored regardless of the verdict below.
        let summary = face_check::summarize(&faces);
        face_repo::upsert_face_info(
            conn,
            &FaceInfo {
                image_id: image.id,
                face_count: summary.face_count,
                primary_area_pct: summary.primary_area_pct,
                confidence: summary.confidence,
                bounding_box: summary.bounding_box.clone(),
            },
        )?;

        let outcome = face_check::evaluate_count(&summary);
        self.record_check(
            conn,
            &image.id,
            CheckKind::FaceCount,
            &outcome,
            Some(f64::from(summary.face_count)),
            None,
        )?;
        if !outcome.passed() {
            return Ok(outcome);
        }

        let outcome = face_check::evaluate_area(&summary, self.config.min_face_area_pct);
        self.record_check(
            conn,
            &image.id,
            CheckKind::FaceArea,
            &outcome,
            Some(summary.primary_area_pct),
            Some(serde_json::json!({"min_area_pct": self.config.min_face_area_pct})),
        )?;
        if !outcome.passed() {
            return Ok(outcome);
        }

        Ok(StageOutcome::Pass)
    }

    fn record_check(
        &self,
        conn: &Connection,
        image_id: &Uuid,
        kind: CheckKind,
        outcome: &StageOutcome,
        value: Option<f64>,
        detail: Option<serde_json::Value>,
    ) -> Result<(), ValidationError> {
        audit_repo::append_validation_result(
            conn,
            &ValidationRecord {
                id: Uuid::new_v4(),
                image_id: *image_id,
                kind,
                passed: outcome.passed(),
                value,
                detail,
                created_at: now(),
            },
        )?;
        Ok(())
    }
}
