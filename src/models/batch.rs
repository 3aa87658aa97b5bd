use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::BatchStatus;

/// A user-defined grouping of images, validated and aggregated together.
///
/// Counters are derived values: they are only ever recomputed from the
/// batch's current non-deleted children, never adjusted in place, so they
/// cannot drift from ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: BatchStatus,
    pub total_images: u32,
    pub processed_images: u32,
    pub accepted_images: u32,
    pub rejected_images: u32,
    pub errored_images: u32,
    /// Set exactly on the transition into a terminal status.
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// Counter snapshot computed over a batch's non-deleted children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounters {
    pub total: u32,
    pub accepted: u32,
    pub rejected: u32,
    pub errored: u32,
}

impl BatchCounters {
    pub fn processed(&self) -> u32 {
        self.accepted + self.rejected + self.errored
    }

    pub fn in_flight(&self) -> u32 {
        self.total - self.processed()
    }

    /// Derive the batch status: `Processing` while any child is
    /// non-terminal (or the batch is empty), else `Completed` unless at
    /// least one child errored.
    pub fn derive_status(&self) -> BatchStatus {
        if self.total == 0 || self.processed() < self.total {
            BatchStatus::Processing
        } else if self.errored > 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_identities_hold() {
        let counters = BatchCounters {
            total: 7,
            accepted: 3,
            rejected: 1,
            errored: 1,
        };
        assert_eq!(counters.processed(), 5);
        assert_eq!(counters.in_flight(), 2);
        assert_eq!(counters.total, counters.processed() + counters.in_flight());
    }

    #[test]
    fn empty_batch_stays_processing() {
        assert_eq!(BatchCounters::default().derive_status(), BatchStatus::Processing);
    }

    #[test]
    fn in_flight_children_keep_batch_processing() {
        let counters = BatchCounters {
            total: 3,
            accepted: 2,
            ..Default::default()
        };
        assert_eq!(counters.derive_status(), BatchStatus::Processing);
    }

    #[test]
    fn all_terminal_without_errors_completes() {
        let counters = BatchCounters {
            total: 5,
            accepted: 3,
            rejected: 2,
            errored: 0,
        };
        assert_eq!(counters.derive_status(), BatchStatus::Completed);
    }

    #[test]
    fn any_error_fails_the_batch() {
        let counters = BatchCounters {
            total: 5,
            accepted: 3,
            rejected: 1,
            errored: 1,
        };
        assert_eq!(counters.derive_status(), BatchStatus::Failed);
    }

    #[test]
    fn batch_record_serde_round_trip() {
        let record = BatchRecord {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            name: "Profile Pictures".into(),
            description: Some("Potential profile pictures".into()),
            status: BatchStatus::Processing,
            total_images: 4,
            processed_images: 2,
            accepted_images: 1,
            rejected_images: 1,
            errored_images: 0,
            completed_at: None,
            created_at: chrono::NaiveDate::from_ymd_opt(2026, 8, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: BatchRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "Profile Pictures");
        assert_eq!(parsed.status, BatchStatus::Processing);
    }
}
