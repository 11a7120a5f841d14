//! Conversation gate: whether a client and technician may still talk about a
//! request, and when their thread is due for deletion.

use chrono::{DateTime, Duration, Utc};

use crate::models::RequestStatus;

/// Days a conversation survives after its request is completed.
pub const RETENTION_DAYS: i64 = 7;

pub fn retention_window() -> Duration {
    Duration::days(RETENTION_DAYS)
}

/// Chat is open while the request is active, and for the retention window
/// after completion (inclusive).
pub fn chat_allowed(
    status: RequestStatus,
    completed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if status.is_active() {
        return true;
    }
    match (status, completed_at) {
        (RequestStatus::Completed, Some(completed_at)) => {
            now - completed_at <= retention_window()
        }
        _ => false,
    }
}

/// Deletion deadline implied by the request state alone.
///
/// Active requests never expire. Completed requests expire one retention
/// window after completion. Everything else yields no deadline here; the
/// lifecycle manager stamps cancelled requests itself.
pub fn expiry_deadline(
    status: RequestStatus,
    completed_at: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (status, completed_at) {
        (RequestStatus::Completed, Some(completed_at)) => Some(completed_at + retention_window()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_active_statuses_always_allow_chat() {
        assert!(chat_allowed(RequestStatus::Accepted, None, now()));
        assert!(chat_allowed(RequestStatus::InProgress, None, now()));
        assert_eq!(expiry_deadline(RequestStatus::Accepted, None), None);
        assert_eq!(expiry_deadline(RequestStatus::InProgress, None), None);
    }

    #[test]
    fn test_closed_or_unassigned_statuses_block_chat() {
        assert!(!chat_allowed(RequestStatus::Pending, None, now()));
        assert!(!chat_allowed(RequestStatus::Cancelled, None, now()));
        assert!(!chat_allowed(RequestStatus::Completed, None, now()));
        assert_eq!(expiry_deadline(RequestStatus::Cancelled, None), None);
        assert_eq!(expiry_deadline(RequestStatus::Completed, None), None);
    }

    #[test]
    fn test_completion_window_is_inclusive() {
        let exactly = now() - retention_window();
        assert!(chat_allowed(RequestStatus::Completed, Some(exactly), now()));

        let just_past = exactly - Duration::seconds(1);
        assert!(!chat_allowed(
            RequestStatus::Completed,
            Some(just_past),
            now()
        ));

        let recent = now() - Duration::days(2);
        assert!(chat_allowed(RequestStatus::Completed, Some(recent), now()));
    }

    #[test]
    fn test_completed_deadline_is_completion_plus_window() {
        let completed_at = now();
        assert_eq!(
            expiry_deadline(RequestStatus::Completed, Some(completed_at)),
            Some(completed_at + Duration::days(7))
        );
    }
}
