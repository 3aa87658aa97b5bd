use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Photogate";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is not set
pub fn default_log_filter() -> &'static str {
    "photogate=info"
}

/// Every knob the validation pipeline exposes. Callers construct one per
/// deployment; stages receive the values they need as plain arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum accepted raster dimensions.
    pub min_width: u32,
    pub min_height: u32,
    /// Mean-squared Laplacian response below which an image is rejected
    /// as blurry.
    pub sharpness_threshold: f64,
    /// Minimum percentage of the image the (single) face must cover.
    pub min_face_area_pct: f64,
    /// Hamming distance at or below which two fingerprints are duplicates.
    pub duplicate_distance_threshold: u32,
    /// Declared mime types accepted at intake.
    pub allowed_mime_types: Vec<String>,
    /// Upload size cap in bytes.
    pub max_upload_bytes: u64,
    /// Quality used when re-encoding alternate formats to JPEG.
    pub jpeg_quality: u8,
    /// Timeout for the remote face detection call.
    pub face_timeout_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_width: 250,
            min_height: 250,
            sharpness_threshold: 10.0,
            min_face_area_pct: 4.0,
            duplicate_distance_threshold: 3,
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/heic".to_string(),
            ],
            max_upload_bytes: 10 * 1024 * 1024,
            jpeg_quality: 90,
            face_timeout_secs: 30,
        }
    }
}

impl ValidationConfig {
    /// Build a config from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_width: env_parse("MIN_IMAGE_WIDTH", defaults.min_width),
            min_height: env_parse("MIN_IMAGE_HEIGHT", defaults.min_height),
            sharpness_threshold: env_parse("BLUR_THRESHOLD", defaults.sharpness_threshold),
            min_face_area_pct: env_parse("MIN_FACE_AREA_PERCENT", defaults.min_face_area_pct),
            duplicate_distance_threshold: env_parse(
                "DUPLICATE_DISTANCE_THRESHOLD",
                defaults.duplicate_distance_threshold,
            ),
            allowed_mime_types: std::env::var("ALLOWED_MIME_TYPES")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.allowed_mime_types),
            max_upload_bytes: env_parse("MAX_FILE_SIZE", defaults.max_upload_bytes),
            jpeg_quality: env_parse("JPEG_QUALITY", defaults.jpeg_quality),
            face_timeout_secs: env_parse("FACE_DETECT_TIMEOUT_SECS", defaults.face_timeout_secs),
        }
    }

    pub fn is_mime_allowed(&self, mime_type: &str) -> bool {
        let normalized = mime_type.trim().to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|m| m == &normalized)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
