//! Format normalization — first stage of the chain.
//!
//! Uploads declared as an alternate encoding are decoded and re-encoded as
//! canonical JPEG at a fixed quality before any analysis runs; JPEG and
//! PNG pass through byte-identical. Either way the raster is decoded
//! exactly once here and handed to the downstream stages, so an
//! undecodable buffer fails the chain up front with a `Conversion` error
//! (terminal `Error`, not `Rejected` — a format fault is not a content
//! fault).

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use super::ValidationError;

/// Canonical raster encoding produced by conversion.
pub const CANONICAL_MIME: &str = "image/jpeg";

/// Declared mime types that are re-encoded to the canonical format.
pub const ALTERNATE_ENCODINGS: &[&str] = &[
    "image/heic",
    "image/heif",
    "image/tiff",
    "image/bmp",
    "image/webp",
];

/// Result of normalization: canonical bytes plus the decoded raster the
/// rest of the chain works on.
pub struct Normalized {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub image: DynamicImage,
    pub width: u32,
    pub height: u32,
    pub converted: bool,
}

pub fn is_alternate_encoding(mime_type: &str) -> bool {
    let normalized = mime_type.trim().to_ascii_lowercase();
    ALTERNATE_ENCODINGS.contains(&normalized.as_str())
}

/// Decode the upload and, for alternate encodings, re-encode it as JPEG at
/// `jpeg_quality`.
pub fn normalize(
    buffer: &[u8],
    declared_mime: &str,
    jpeg_quality: u8,
) -> Result<Normalized, ValidationError> {
    let decoded = image::load_from_memory(buffer).map_err(|e| {
        ValidationError::Conversion(format!("Failed to decode {declared_mime} buffer: {e}"))
    })?;
    let width = decoded.width();
    let height = decoded.height();

    if !is_alternate_encoding(declared_mime) {
        return Ok(Normalized {
            bytes: buffer.to_vec(),
            mime_type: declared_mime.trim().to_ascii_lowercase(),
            image: decoded,
            width,
            height,
            converted: false,
        });
    }

    // JPEG has no alpha channel; flatten before encoding.
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality);
    rgb.write_with_encoder(encoder).map_err(|e| {
        ValidationError::Conversion(format!(
            "Failed to convert {declared_mime} to {CANONICAL_MIME}: {e}"
        ))
    })?;

    tracing::debug!(
        from = declared_mime,
        to = CANONICAL_MIME,
        width,
        height,
        "Converted alternate encoding"
    );

    Ok(Normalized {
        bytes: out.into_inner(),
        mime_type: CANONICAL_MIME.to_string(),
        image: rgb,
        width,
        height,
        converted: true,
    })
}
