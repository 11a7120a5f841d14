//! Request lifecycle: which status changes are allowed, who may make them, and
//! what they do to `completedAt` and conversation deadlines.

use chrono::{DateTime, Utc};

use super::gate;
use crate::errors::AppError;
use crate::models::{RequestStatus, ServiceRequest, User};

/// Statuses a participant may request explicitly. `accepted` is only reached
/// through offer acceptance or admin assignment.
pub const UPDATABLE_STATUSES: [RequestStatus; 3] = [
    RequestStatus::InProgress,
    RequestStatus::Completed,
    RequestStatus::Cancelled,
];

/// Parse a requested status, rejecting anything outside [`UPDATABLE_STATUSES`].
pub fn parse_status_update(raw: &str) -> Result<RequestStatus, AppError> {
    RequestStatus::parse(raw)
        .filter(|status| UPDATABLE_STATUSES.contains(status))
        .ok_or_else(|| AppError::Validation(format!("Status '{}' is not allowed", raw)))
}

/// Caller must be the client, the assigned technician or an admin; the
/// request must have a technician and still be open.
pub fn authorize_status_update(request: &ServiceRequest, user: &User) -> Result<(), AppError> {
    let is_participant = request.is_client(&user.id) || request.is_assigned_technician(&user.id);
    if !is_participant && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to update this request".to_string(),
        ));
    }
    if request.technician.is_none() {
        return Err(AppError::Validation(
            "The request has no technician assigned".to_string(),
        ));
    }
    if request.status.is_terminal() {
        return Err(AppError::Validation(format!(
            "The request is already {}",
            request.status.as_str()
        )));
    }
    Ok(())
}

/// Effect of moving a request to a new status.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: RequestStatus,
    pub completed_at: Option<DateTime<Utc>>,
    /// New `expiresAt` for every conversation on the request; `None` clears it
    pub conversation_expiry: Option<DateTime<Utc>>,
}

pub fn plan_status_change(new_status: RequestStatus, now: DateTime<Utc>) -> StatusChange {
    let completed_at = (new_status == RequestStatus::Completed).then_some(now);
    let conversation_expiry = match new_status {
        RequestStatus::Cancelled => Some(now + gate::retention_window()),
        _ => gate::expiry_deadline(new_status, completed_at),
    };
    StatusChange {
        status: new_status,
        completed_at,
        conversation_expiry,
    }
}
