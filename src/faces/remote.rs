use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{DetectedFace, FaceDetector, FaceDetectorError};

/// HTTP client for a face detection service.
///
/// The request ships the image as base64 JSON; the response is the
/// detector's face list. The timeout doubles as the fail-closed boundary:
/// a slow or unreachable service surfaces as an error here, which the
/// orchestrator treats as zero faces.
pub struct HttpFaceDetector {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpFaceDetector {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }
}

/// Request body for POST /v1/detect
#[derive(Serialize)]
struct DetectRequest<'a> {
    image: &'a str,
}

/// Response body from POST /v1/detect
#[derive(Deserialize)]
struct DetectResponse {
    faces: Vec<DetectedFace>,
}

impl FaceDetector for HttpFaceDetector {
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>, FaceDetectorError> {
        let url = format!("{}/v1/detect", self.base_url);
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let body = DetectRequest { image: &encoded };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                FaceDetectorError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                FaceDetectorError::Timeout {
                    seconds: self.timeout_secs,
                }
            } else {
                FaceDetectorError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FaceDetectorError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DetectResponse = response
            .json()
            .map_err(|e| FaceDetectorError::ResponseParsing(e.to_string()))?;

        tracing::debug!(faces = parsed.faces.len(), "Face detection response received");
        Ok(parsed.faces)
    }
}
