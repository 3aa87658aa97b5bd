//! Near-duplicate detection, scoped to a single batch.
//!
//! A new fingerprint is compared against the fingerprints of images in
//! the same batch that already reached the accepted terminal state: an
//! exact-match query first (indexed, cheap), then a full pairwise Hamming
//! scan. Duplicates are never detected across batches.
//!
//! Concurrency caveat: the accepted set is read without any batch-level
//! lock, so two near-duplicates validated at the same time can each miss
//! the other's fingerprint and both be accepted. Duplicates are only
//! guaranteed against images that were already terminal when the scan ran.

use rusqlite::Connection;
use uuid::Uuid;

use super::ValidationError;
use crate::db::repository::image as image_repo;

/// Bitwise Hamming distance between two equal-length hex fingerprints.
///
/// A length mismatch or non-hex character means the stored fingerprints
/// are corrupt — a system bug, never something an upload can trigger.
pub fn hamming_distance(a: &str, b: &str) -> Result<u32, ValidationError> {
    if a.len() != b.len() {
        return Err(ValidationError::Comparison(format!(
            "fingerprint lengths differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let mut distance = 0u32;
    for (ca, cb) in a.chars().zip(b.chars()) {
        let na = hex_digit(ca)?;
        let nb = hex_digit(cb)?;
        distance += (na ^ nb).count_ones();
    }
    Ok(distance)
}

fn hex_digit(c: char) -> Result<u32, ValidationError> {
    c.to_digit(16).ok_or_else(|| {
        ValidationError::Comparison(format!("non-hex character '{c}' in fingerprint"))
    })
}

/// Find an accepted image in the batch whose fingerprint is within
/// `threshold` bits of `hash`. Returns the earlier image's id.
pub fn find_duplicate(
    conn: &Connection,
    batch_id: &Uuid,
    image_id: &Uuid,
    hash: &str,
    threshold: u32,
) -> Result<Option<Uuid>, ValidationError> {
    // Exact match first — the common duplicate (same file re-uploaded)
    // resolves with one indexed query.
    if let Some(existing) = image_repo::find_exact_hash(conn, batch_id, image_id, hash)? {
        return Ok(Some(existing));
    }

    for (candidate_id, candidate_hash) in
        image_repo::accepted_fingerprints(conn, batch_id, image_id)?
    {
        match hamming_distance(hash, &candidate_hash) {
            Ok(distance) if distance <= threshold => {
                tracing::debug!(
                    image_id = %image_id,
                    duplicate_of = %candidate_id,
                    distance,
                    threshold,
                    "Near-duplicate fingerprint found"
                );
                return Ok(Some(candidate_id));
            }
            Ok(_) => {}
            Err(e) => {
                // Corrupt stored fingerprint: skip the candidate rather
                // than fail the whole image.
                tracing::warn!(
                    candidate_id = %candidate_id,
                    error = %e,
                    "Fingerprint comparison failed, skipping candidate"
                );
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{batch as batch_repo, image as image_repo, now};
    use crate::db::sqlite::open_memory_database;
    use crate::models::{BatchRecord, BatchStatus, ImageRecord, ImageStatus};

    #[test]
    fn distance_is_zero_for_identical() {
        let hash = "a3f0".repeat(16);
        assert_eq!(hamming_distance(&hash, &hash).unwrap(), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = "00ff".repeat(16);
        let b = "0f0f".repeat(16);
        assert_eq!(
            hamming_distance(&a, &b).unwrap(),
            hamming_distance(&b, &a).unwrap()
        );
    }

    #[test]
    fn distance_counts_bits_not_characters() {
        // 'f' vs '0' differs in 4 bits but 1 character position
        assert_eq!(hamming_distance("f0", "00").unwrap(), 4);
        assert_eq!(hamming_distance("10", "00").unwrap(), 1);
        assert_eq!(hamming_distance("30", "00").unwrap(), 2);
    }

    #[test]
    fn length_mismatch_is_comparison_error() {
        let result = hamming_distance("abcd", "abc");
        assert!(matches!(result, Err(ValidationError::Comparison(_))));
    }

    #[test]
    fn non_hex_is_comparison_error() {
        let result = hamming_distance("zz", "00");
        assert!(matches!(result, Err(ValidationError::Comparison(_))));
    }

    fn seed_batch(conn: &Connection) -> Uuid {
        let batch = BatchRecord {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            name: "B".into(),
            description: None,
            status: BatchStatus::Processing,
            total_images: 0,
            processed_images: 0,
            accepted_images: 0,
            rejected_images: 0,
            errored_images: 0,
            completed_at: None,
            created_at: now(),
        };
        batch_repo::insert_batch(conn, &batch).unwrap();
        batch.id
    }

    fn seed_accepted(conn: &Connection, batch_id: Uuid, hash: &str) -> Uuid {
        let image = ImageRecord {
            id: Uuid::new_v4(),
            batch_id,
            user_id: "user-1".into(),
            original_name: "a.jpg".into(),
            size_bytes: 1,
            mime_type: "image/jpeg".into(),
            width: Some(500),
            height: Some(500),
            storage_key: format!("uploads/{}.jpg", Uuid::new_v4()),
            status: ImageStatus::Validated,
            rejection_reason: None,
            hash: Some(hash.to_string()),
            sharpness_score: Some(100.0),
            tags: Vec::new(),
            is_deleted: false,
            created_at: now(),
        };
        image_repo::insert_image(conn, &image).unwrap();
        image.id
    }

    /// Flip the lowest bits of the final hex char so the result differs by
    /// exactly `bits` bits from `hash`.
    fn flip_trailing_bits(hash: &str, bits: u32) -> String {
        assert!(bits <= 4);
        let mut out: Vec<char> = hash.chars().collect();
        let last = out.last().copied().unwrap();
        let flipped = last.to_digit(16).unwrap() ^ ((1 << bits) - 1);
        *out.last_mut().unwrap() = char::from_digit(flipped, 16).unwrap();
        out.into_iter().collect()
    }

    #[test]
    fn exact_match_found_first() {
        let conn = open_memory_database().unwrap();
        let batch_id = seed_batch(&conn);
        let hash = "5a".repeat(32);
        let existing = seed_accepted(&conn, batch_id, &hash);

        let hit = find_duplicate(&conn, &batch_id, &Uuid::new_v4(), &hash, 3).unwrap();
        assert_eq!(hit, Some(existing));
    }

    #[test]
    fn two_bits_within_threshold_is_duplicate() {
        let conn = open_memory_database().unwrap();
        let batch_id = seed_batch(&conn);
        let hash = "5a".repeat(32);
        let existing = seed_accepted(&conn, batch_id, &hash);

        let probe = flip_trailing_bits(&hash, 2);
        assert_eq!(hamming_distance(&hash, &probe).unwrap(), 2);

        let hit = find_duplicate(&conn, &batch_id, &Uuid::new_v4(), &probe, 3).unwrap();
        assert_eq!(hit, Some(existing));
    }

    #[test]
    fn five_bits_beyond_threshold_is_not_duplicate() {
        let conn = open_memory_database().unwrap();
        let batch_id = seed_batch(&conn);
        let hash = "5a".repeat(32);
        seed_accepted(&conn, batch_id, &hash);

        // Flip 4 bits in the last char and 1 in the first: 5 bits total
        let mut probe = flip_trailing_bits(&hash, 4);
        let first = probe.chars().next().unwrap();
        let flipped_first = char::from_digit(first.to_digit(16).unwrap() ^ 0x1, 16).unwrap();
        probe.replace_range(0..1, &flipped_first.to_string());
        assert_eq!(hamming_distance(&hash, &probe).unwrap(), 5);

        let hit = find_duplicate(&conn, &batch_id, &Uuid::new_v4(), &probe, 3).unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn detection_is_batch_scoped() {
        let conn = open_memory_database().unwrap();
        let batch_a = seed_batch(&conn);
        let batch_b = seed_batch(&conn);
        let hash = "c3".repeat(32);
        seed_accepted(&conn, batch_a, &hash);

        let hit = find_duplicate(&conn, &batch_b, &Uuid::new_v4(), &hash, 3).unwrap();
        assert!(hit.is_none(), "duplicates must never match across batches");
    }

    #[test]
    fn corrupt_candidate_is_skipped_not_fatal() {
        let conn = open_memory_database().unwrap();
        let batch_id = seed_batch(&conn);
        // Stored fingerprint with the wrong length
        seed_accepted(&conn, batch_id, "abcd");
        let good = seed_accepted(&conn, batch_id, &"11".repeat(32));

        let probe = flip_trailing_bits(&"11".repeat(32), 1);
        let hit = find_duplicate(&conn, &batch_id, &Uuid::new_v4(), &probe, 3).unwrap();
        assert_eq!(hit, Some(good));
    }

    #[test]
    fn empty_batch_has_no_duplicates() {
        let conn = open_memory_database().unwrap();
        let batch_id = seed_batch(&conn);
        let hit =
            find_duplicate(&conn, &batch_id, &Uuid::new_v4(), &"00".repeat(32), 3).unwrap();
        assert!(hit.is_none());
    }
}
