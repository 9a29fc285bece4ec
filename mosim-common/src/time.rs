//! Timestamp and session identifier utilities

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Compact UTC stamp used as the session id prefix (`20251018T142530`)
pub fn compact_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S").to_string()
}

/// Generate a session id of the form `<compact stamp>_<8 hex chars>`
///
/// The stamp makes ids sort chronologically; the UUID suffix keeps two
/// recordings finished within the same second apart.
pub fn generate_session_id(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", compact_stamp(at), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // After 2000-01-01, before 2100-01-01
        assert!(timestamp.timestamp() > 946_684_800);
        assert!(timestamp.timestamp() < 4_102_444_800);
    }

    #[test]
    fn test_compact_stamp_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(compact_stamp(at), "20250307T090501");
    }

    #[test]
    fn test_generate_session_id_shape() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        let id = generate_session_id(at);

        let (stamp, suffix) = id.split_once('_').unwrap();
        assert_eq!(stamp, "20250307T090501");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_session_id_unique_within_same_second() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        assert_ne!(generate_session_id(at), generate_session_id(at));
    }
}
