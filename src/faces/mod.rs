//! Face detection boundary.
//!
//! The detector is an opaque remote capability: given image bytes it
//! returns zero or more faces, each with a bounding box expressed as
//! fractions of the image dimensions and a confidence score. It may fail
//! or time out — the orchestrator folds those faults into the zero-faces
//! path (fail-closed), so nothing above this module needs to care.

pub mod remote;

pub use remote::HttpFaceDetector;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceDetectorError {
    #[error("Cannot reach face detection service at {0}")]
    Connection(String),

    #[error("Face detection timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Face detection request failed: {0}")]
    Request(String),

    #[error("Face detection service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed face detection response: {0}")]
    ResponseParsing(String),
}

/// Face bounding box as fractions of the image dimensions (0.0–1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
}

impl FaceBox {
    /// Fractional area (0.0–1.0) of the image covered by this box.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// One detected face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bounding_box: FaceBox,
    pub confidence: f64,
}

/// Remote face detection capability.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>, FaceDetectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_box_area() {
        let bbox = FaceBox {
            width: 0.5,
            height: 0.4,
            left: 0.1,
            top: 0.1,
        };
        assert!((bbox.area() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn detected_face_serde_round_trip() {
        let face = DetectedFace {
            bounding_box: FaceBox {
                width: 0.3,
                height: 0.3,
                left: 0.35,
                top: 0.2,
            },
            confidence: 99.2,
        };
        let json = serde_json::to_string(&face).unwrap();
        let parsed: DetectedFace = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.bounding_box, face.bounding_box);
    }

    #[test]
    fn trait_is_object_safe() {
        fn _assert(_: &dyn FaceDetector) {}
    }
}
