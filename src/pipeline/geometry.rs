//! Raster dimension policy. Pure function, no I/O.

use super::StageOutcome;

/// Check decoded dimensions against the configured minimums. The reason
/// embeds both the requirement and the actual size.
pub fn check_dimensions(
    width: u32,
    height: u32,
    min_width: u32,
    min_height: u32,
) -> StageOutcome {
    if width < min_width || height < min_height {
        StageOutcome::Reject(format!(
            "Image resolution too small. Minimum required: {min_width}x{min_height}, \
             Got: {width}x{height}"
        ))
    } else {
        StageOutcome::Pass
    }
}
