//! Sharpness analysis via Laplacian edge response.
//!
//! The discrete Laplacian (center −4, orthogonal neighbors +1, corners 0)
//! responds strongly at intensity edges. Sharp images carry lots of
//! high-frequency content, so the mean of the squared responses over all
//! interior pixels is a usable focus proxy: higher means sharper. This is
//! the most expensive stage — a full 3×3 traversal of the raster — so the
//! kernel runs over raw row slices instead of per-pixel accessor calls.

use image::GrayImage;

use super::StageOutcome;

/// Mean squared Laplacian response over interior pixels (1-px border
/// excluded). Images smaller than 3×3 have no interior and score 0.
pub fn sharpness_score(image: &GrayImage) -> f64 {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let w = width as usize;
    let h = height as usize;
    let data = image.as_raw();

    // |response| ≤ 4*255 = 1020, squared ≤ ~1.04e6; an i64 accumulator
    // holds the sum for any raster the decoder will produce.
    let mut sum_sq: i64 = 0;

    for y in 1..h - 1 {
        let above = &data[(y - 1) * w..y * w];
        let row = &data[y * w..(y + 1) * w];
        let below = &data[(y + 1) * w..(y + 2) * w];

        for x in 1..w - 1 {
            let response = i64::from(above[x]) + i64::from(below[x]) + i64::from(row[x - 1])
                + i64::from(row[x + 1])
                - 4 * i64::from(row[x]);
            sum_sq += response * response;
        }
    }

    let count = ((w - 2) * (h - 2)) as f64;
    sum_sq as f64 / count
}

/// Compare a score against the configured threshold.
pub fn evaluate(score: f64, threshold: f64) -> StageOutcome {
    if score < threshold {
        StageOutcome::Reject(format!(
            "Image is too blurry. Sharpness score: {score:.2}, Threshold: {threshold}"
        ))
    } else {
        StageOutcome::Pass
    }
}
