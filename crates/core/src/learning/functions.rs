use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{Session, SessionId};

/// Generate a new user identifier.
pub fn generate_user_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a random session identifier.
pub fn generate_session_id() -> SessionId {
    SessionId::new(Uuid::new_v4().to_string())
}

/// Completion percentage of `completed` out of `total` topics.
///
/// A zero total yields `0.0`, and the result is clamped to `[0, 100]`.
pub fn completion_percentage(completed: usize, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    clamp_percentage(completed as f64 / total as f64 * 100.0)
}

/// Clamp a percentage to `[0, 100]`, mapping NaN to `0.0`.
pub fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Check if a session has expired.
pub fn is_session_expired(session: &Session, now: DateTime<Utc>) -> bool {
    session.expires_at <= now
}

/// Calculate session expiry from creation time and TTL, truncated to whole seconds.
pub fn calculate_expiry(created_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let expiry = created_at + ttl;
    DateTime::from_timestamp(expiry.timestamp(), 0).unwrap_or(expiry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session_expiring_at(expires_at: DateTime<Utc>) -> Session {
        Session {
            user_id: "user-1".to_string(),
            session_id: generate_session_id(),
            session_token: "token".to_string(),
            created_at: expires_at - Duration::hours(1),
            expires_at,
            device_info: None,
            ip_address: None,
        }
    }

    #[test]
    fn completion_percentage_of_half() {
        assert_eq!(completion_percentage(2, 4), 50.0);
    }

    #[test]
    fn completion_percentage_zero_total_is_zero() {
        assert_eq!(completion_percentage(0, 0), 0.0);
        assert_eq!(completion_percentage(3, 0), 0.0);
    }

    #[test]
    fn completion_percentage_stays_in_range() {
        for total in 0..20u32 {
            for completed in 0..30usize {
                let pct = completion_percentage(completed, total);
                assert!((0.0..=100.0).contains(&pct), "{completed}/{total} gave {pct}");
            }
        }
    }

    #[test]
    fn clamp_percentage_handles_nan() {
        assert_eq!(clamp_percentage(f64::NAN), 0.0);
        assert_eq!(clamp_percentage(250.0), 100.0);
    }

    #[test]
    fn is_session_expired_returns_false_for_future_expiry() {
        let now = Utc::now();
        let session = session_expiring_at(now + Duration::hours(1));
        assert!(!is_session_expired(&session, now));
    }

    #[test]
    fn is_session_expired_returns_true_for_past_expiry() {
        let now = Utc::now();
        let session = session_expiring_at(now - Duration::hours(1));
        assert!(is_session_expired(&session, now));
    }

    #[test]
    fn is_session_expired_returns_true_at_exact_expiry() {
        let now = Utc::now();
        let session = session_expiring_at(now);
        assert!(is_session_expired(&session, now));
    }

    #[test]
    fn calculate_expiry_truncates_to_seconds() {
        let created = Utc.timestamp_opt(1_700_000_000, 750_000_000).unwrap();
        let expiry = calculate_expiry(created, Duration::days(7));
        assert_eq!(expiry.timestamp(), 1_700_000_000 + 7 * 24 * 3600);
        assert_eq!(expiry.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(generate_user_id(), generate_user_id());
        assert_ne!(generate_session_id(), generate_session_id());
    }
}
