//! Timestamp helpers for the two date formats Mensago uses on the wire and
//! in keycard fields: `Timestamp` (`YYYYMMDDThhmmssZ`) and `Expires`
//! (`YYYYMMDD`).

use chrono::{DateTime, Duration, NaiveDate, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DATE_FORMAT: &str = "%Y%m%d";

/// Returns the current UTC time formatted as a keycard `Timestamp` field.
pub fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Returns the current UTC time, back-dated by five minutes, formatted as a
/// keycard `Timestamp` field.
///
/// User entries apply this cushion on `chain()` so that a slightly
/// fast-clocked client never produces an entry whose `Timestamp` is ahead of
/// the server's view of "now".
pub fn now_timestamp_backdated(minutes: i64) -> String {
    (Utc::now() - Duration::minutes(minutes))
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Parses a keycard `Timestamp` field (`YYYYMMDDThhmmssZ`).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%SZ")
                .ok()
                .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
        })
}

/// Returns an `Expires` field (`YYYYMMDD`) `days` in the future of `from`.
pub fn expires_after(from: &DateTime<Utc>, days: i64) -> String {
    (*from + Duration::days(days)).format(DATE_FORMAT).to_string()
}

/// Parses an `Expires` field (`YYYYMMDD`).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Returns the current date formatted as an `Expires` field.
pub fn today() -> String {
    Utc::now().format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips() {
        let ts = now_timestamp();
        assert!(parse_timestamp(&ts).is_some());
        assert_eq!(ts.len(), 16);
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn backdated_timestamp_is_earlier() {
        let now = parse_timestamp(&now_timestamp()).unwrap();
        let back = parse_timestamp(&now_timestamp_backdated(5)).unwrap();
        assert!(back <= now);
        assert!((now - back).num_seconds() >= 290);
    }

    #[test]
    fn expires_after_adds_days() {
        let base = parse_timestamp("20240101T000000Z").unwrap();
        assert_eq!(expires_after(&base, 365), "20241231");
    }

    #[test]
    fn date_round_trips() {
        let d = today();
        assert!(parse_date(&d).is_some());
        assert_eq!(d.len(), 8);
    }
}
