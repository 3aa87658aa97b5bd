//! Face geometry policy over the remote detector's result.
//!
//! The summary keeps the largest face for the record (metrics are stored
//! even for rejected images); keeping it does not waive the multi-face
//! rule — any count other than exactly one rejects.

use crate::faces::{DetectedFace, FaceBox};

use super::StageOutcome;

/// Condensed detector result: face count plus the largest face's metrics.
#[derive(Debug, Clone)]
pub struct FaceSummary {
    pub face_count: u32,
    /// Largest face's area as a percentage of the image (0 when no faces).
    pub primary_area_pct: f64,
    pub confidence: f64,
    pub bounding_box: Option<FaceBox>,
}

/// Reduce a detector response to the stored face metrics.
pub fn summarize(faces: &[DetectedFace]) -> FaceSummary {
    let primary = faces.iter().max_by(|a, b| {
        a.bounding_box
            .area()
            .partial_cmp(&b.bounding_box.area())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    match primary {
        Some(face) => FaceSummary {
            face_count: faces.len() as u32,
            // Bounding box dimensions are fractions of the image, so the
            // box area is already the image-area fraction.
            primary_area_pct: face.bounding_box.area() * 100.0,
            confidence: face.confidence,
            bounding_box: Some(face.bounding_box.clone()),
        },
        None => FaceSummary {
            face_count: 0,
            primary_area_pct: 0.0,
            confidence: 0.0,
            bounding_box: None,
        },
    }
}

/// Face-count policy: exactly one face.
pub fn evaluate_count(summary: &FaceSummary) -> StageOutcome {
    match summary.face_count {
        0 => StageOutcome::Reject("No faces detected in the image".to_string()),
        1 => StageOutcome::Pass,
        n => StageOutcome::Reject(format!("Multiple faces detected: {n} faces found")),
    }
}

/// Face-area policy: the single face must cover at least `min_area_pct`
/// of the image. Only meaningful after the count check passed.
pub fn evaluate_area(summary: &FaceSummary, min_area_pct: f64) -> StageOutcome {
    if summary.primary_area_pct < min_area_pct {
        StageOutcome::Reject(format!(
            "Face too small. Face area: {:.2}%, Minimum required: {}%",
            summary.primary_area_pct, min_area_pct
        ))
    } else {
        StageOutcome::Pass
    }
}
