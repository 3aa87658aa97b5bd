//! Perceptual fingerprinting.
//!
//! A gradient hash: the image is reduced to a small grayscale grid and
//! each bit records whether intensity rises between horizontal neighbors.
//! Near-duplicates (recompressed, lightly edited) keep almost all of their
//! bits; unrelated images share about half by chance. The fingerprint is
//! 256 bits, encoded as a fixed 64-character lowercase hex string —
//! identical input bytes always produce the identical string.

use image::imageops::FilterType;
use image::DynamicImage;

/// Fingerprint grid: GRID×GRID bits from a (GRID+1)×GRID downsample.
const GRID: u32 = 16;

/// Fingerprint width in bits.
pub const FINGERPRINT_BITS: usize = (GRID * GRID) as usize;

/// Fingerprint length as a hex string.
pub const FINGERPRINT_LEN: usize = FINGERPRINT_BITS / 4;

/// Compute the perceptual fingerprint of a decoded image.
pub fn fingerprint(image: &DynamicImage) -> String {
    // Triangle (bilinear) filtering averages neighborhoods, which is what
    // makes the hash stable under recompression noise.
    let small = image::imageops::resize(&image.to_luma8(), GRID + 1, GRID, FilterType::Triangle);

    let mut hex = String::with_capacity(FINGERPRINT_LEN);
    let mut nibble = 0u8;
    let mut bits_in_nibble = 0;

    for y in 0..GRID {
        for x in 0..GRID {
            let left = small.get_pixel(x, y).0[0];
            let right = small.get_pixel(x + 1, y).0[0];
            nibble = (nibble << 1) | u8::from(right > left);
            bits_in_nibble += 1;
            if bits_in_nibble == 4 {
                hex.push(char::from_digit(u32::from(nibble), 16).unwrap_or('0'));
                nibble = 0;
                bits_in_nibble = 0;
            }
        }
    }

    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage};

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, _| {
            image::Luma([((x * 255) / width.max(1)) as u8])
        }))
    }

    fn checkerboard(width: u32, height: u32, cell: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                image::Luma([255u8])
            } else {
                image::Luma([0u8])
            }
        }))
    }

    fn bit_distance(a: &str, b: &str) -> u32 {
        a.chars()
            .zip(b.chars())
            .map(|(ca, cb)| (ca.to_digit(16).unwrap() ^ cb.to_digit(16).unwrap()).count_ones())
            .sum()
    }

    #[test]
    fn fingerprint_has_fixed_length() {
        let hash = fingerprint(&gradient_image(640, 480));
        assert_eq!(hash.len(), FINGERPRINT_LEN);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let img = checkerboard(320, 240, 16);
        assert_eq!(fingerprint(&img), fingerprint(&img));
    }

    #[test]
    fn identical_pixels_identical_fingerprint() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_fn(300, 300, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }));
        let copy = rgb.clone();
        assert_eq!(fingerprint(&rgb), fingerprint(&copy));
    }

    #[test]
    fn recompression_keeps_fingerprint_close() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(400, 300, |x, y| {
            image::Rgb([((x + y) % 256) as u8, (x % 256) as u8, (y % 256) as u8])
        }));
        let original = fingerprint(&img);

        // Re-encode as JPEG at a lower quality and hash the decoded result
        let mut out = std::io::Cursor::new(Vec::new());
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 70);
        img.write_with_encoder(encoder).unwrap();
        let recompressed = image::load_from_memory(&out.into_inner()).unwrap();
        let second = fingerprint(&recompressed);

        let distance = bit_distance(&original, &second);
        assert!(
            distance <= 16,
            "recompression moved {distance} of {FINGERPRINT_BITS} bits"
        );
    }

    #[test]
    fn distinct_content_is_far_apart() {
        let a = fingerprint(&gradient_image(320, 240));
        let b = fingerprint(&checkerboard(320, 240, 20));
        let distance = bit_distance(&a, &b);
        assert!(
            distance > 32,
            "unrelated images only {distance} bits apart"
        );
    }

    #[test]
    fn tiny_image_still_hashes() {
        let hash = fingerprint(&checkerboard(4, 4, 1));
        assert_eq!(hash.len(), FINGERPRINT_LEN);
    }
}
