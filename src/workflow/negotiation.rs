//! Offer negotiation rules: who may bid, who sees which offers, and when an
//! offer may be accepted or rejected.

use crate::errors::AppError;
use crate::models::{
    GroupedOffers, OfferStatus, OwnOffer, RequestStatus, Role, ServiceOffer, ServiceRequest, User,
};

/// Nobody bids on their own request; otherwise technicians and admins may
/// bid on any request that is still open. Returns the validated amount.
pub fn authorize_submission(
    request: &ServiceRequest,
    user: &User,
    amount: Option<f64>,
) -> Result<f64, AppError> {
    if request.is_client(&user.id) {
        return Err(AppError::Validation(
            "You cannot make an offer on your own request".to_string(),
        ));
    }
    if !matches!(user.role, Role::Technician | Role::Superadmin) {
        return Err(AppError::forbidden());
    }
    if request.status.is_terminal() {
        return Err(AppError::Validation(format!(
            "The request is already {}",
            request.status.as_str()
        )));
    }
    match amount {
        Some(amount) if amount.is_finite() && amount > 0.0 => Ok(amount),
        _ => Err(AppError::Validation(
            "Amount must be a positive number".to_string(),
        )),
    }
}

/// Which offers on a request a caller may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferVisibility {
    All,
    OwnOnly,
}

pub fn offer_visibility(
    request: &ServiceRequest,
    user: &User,
    has_own_offer: bool,
) -> Result<OfferVisibility, AppError> {
    if request.is_client(&user.id) || request.is_assigned_technician(&user.id) || user.is_admin()
    {
        return Ok(OfferVisibility::All);
    }
    if user.role == Role::Technician && has_own_offer {
        return Ok(OfferVisibility::OwnOnly);
    }
    Err(AppError::forbidden())
}

/// Only the owning client resolves offers.
pub fn authorize_resolution(
    request: &ServiceRequest,
    user: &User,
    action: &str,
) -> Result<(), AppError> {
    if request.is_client(&user.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Only the client can {} an offer",
            action
        )))
    }
}

/// A technician is chosen once, while the request is still pending. After
/// that only an admin assignment can change who does the work.
pub fn ensure_acceptable(request: &ServiceRequest) -> Result<(), AppError> {
    match request.status {
        RequestStatus::Pending => Ok(()),
        other => Err(AppError::Validation(format!(
            "Offers can no longer be accepted on a request that is {}",
            other.as_str()
        ))),
    }
}

pub fn ensure_rejectable(offer: &ServiceOffer) -> Result<(), AppError> {
    if offer.status == OfferStatus::Accepted {
        return Err(AppError::Validation(
            "An accepted offer cannot be rejected".to_string(),
        ));
    }
    Ok(())
}

/// Bucket offers by status, preserving input order within each bucket.
pub fn group_offers(offers: Vec<OwnOffer>) -> GroupedOffers {
    let mut grouped = GroupedOffers::default();
    for offer in offers {
        match offer.status {
            OfferStatus::Pending => grouped.pending.push(offer),
            OfferStatus::Accepted => grouped.accepted.push(offer),
            OfferStatus::Rejected => grouped.rejected.push(offer),
        }
    }
    grouped
}
