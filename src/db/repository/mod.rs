pub mod batch;
pub mod face_info;
pub mod image;
pub mod processing_info;
pub mod validation_result;

use chrono::NaiveDateTime;

/// Timestamp format used for every TEXT datetime column.
/// `%.f` tolerates both bare seconds and fractional seconds on read.
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

pub(crate) fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub(crate) fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trip() {
        let ts = chrono::NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_opt(14, 30, 5)
            .unwrap();
        assert_eq!(parse_ts(&fmt_ts(&ts)), ts);
    }

    #[test]
    fn timestamp_round_trip_with_fraction() {
        let ts = chrono::NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_milli_opt(14, 30, 5, 250)
            .unwrap();
        assert_eq!(parse_ts(&fmt_ts(&ts)), ts);
    }

    #[test]
    fn iso_t_separator_accepted() {
        let ts = parse_ts("2026-08-07T14:30:05");
        assert_eq!(ts.format("%H:%M:%S").to_string(), "14:30:05");
    }
}
