//! Offer API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;

use super::requests::load_request;
use super::{ApiJson, ApiResult};
use crate::auth::{require_role, CurrentUser};
use crate::errors::AppError;
use crate::models::{CreateOfferRequest, GroupedOffers, Role, ServiceOffer, ServiceRequest};
use crate::workflow::negotiation::{self, OfferVisibility};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OfferEnvelope {
    pub offer: ServiceOffer,
}

#[derive(Debug, Serialize)]
pub struct OffersEnvelope<T: Serialize> {
    pub offers: T,
}

#[derive(Debug, Serialize)]
pub struct AcceptedOffer {
    pub offer: ServiceOffer,
    pub request: ServiceRequest,
}

/// POST /api/service-request/{id}/offers - Submit an offer.
pub async fn submit_offer(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CreateOfferRequest>,
) -> Result<(StatusCode, Json<OfferEnvelope>), AppError> {
    let request = load_request(&state, &id).await?;
    let amount = negotiation::authorize_submission(&request, &user, body.amount)?;

    let message = body
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    let offer = state
        .repo
        .create_offer(&request.id, &user.id, amount, message)
        .await?;

    tracing::info!(request_id = %request.id, offer_id = %offer.id, "Offer submitted");
    Ok((StatusCode::CREATED, Json(OfferEnvelope { offer })))
}

/// GET /api/service-request/{id}/offers - Offers the caller may see, newest first.
pub async fn list_offers(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<OffersEnvelope<Vec<ServiceOffer>>> {
    let request = load_request(&state, &id).await?;
    let has_own_offer = state.repo.has_offer(&request.id, &user.id).await?;

    let offers = match negotiation::offer_visibility(&request, &user, has_own_offer)? {
        OfferVisibility::All => state.repo.list_offers(&request.id, None).await?,
        OfferVisibility::OwnOnly => state.repo.list_offers(&request.id, Some(&user.id)).await?,
    };
    Ok(Json(OffersEnvelope { offers }))
}

/// PATCH /api/service-request/{id}/offers/{offer_id}/accept - Choose the winning offer.
pub async fn accept_offer(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((id, offer_id)): Path<(String, String)>,
) -> ApiResult<AcceptedOffer> {
    let request = load_request(&state, &id).await?;
    negotiation::authorize_resolution(&request, &user, "accept")?;

    let offer = load_offer(&state, &offer_id, &request.id).await?;
    negotiation::ensure_acceptable(&request)?;

    let (offer, request) = state.repo.accept_offer(&request, &offer).await?;
    Ok(Json(AcceptedOffer { offer, request }))
}

/// PATCH /api/service-request/{id}/offers/{offer_id}/reject - Turn an offer down.
pub async fn reject_offer(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((id, offer_id)): Path<(String, String)>,
) -> ApiResult<OfferEnvelope> {
    let request = load_request(&state, &id).await?;
    negotiation::authorize_resolution(&request, &user, "reject")?;

    let offer = load_offer(&state, &offer_id, &request.id).await?;
    negotiation::ensure_rejectable(&offer)?;

    let offer = state.repo.reject_offer(&offer).await?;
    Ok(Json(OfferEnvelope { offer }))
}

/// GET /api/offers/mine - The calling technician's offers, grouped by status.
pub async fn list_my_offers(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<OffersEnvelope<GroupedOffers>> {
    require_role(&user, &[Role::Technician])?;

    let offers = state.repo.list_offers_by_technician(&user.id).await?;
    Ok(Json(OffersEnvelope {
        offers: negotiation::group_offers(offers),
    }))
}

async fn load_offer(
    state: &AppState,
    offer_id: &str,
    request_id: &str,
) -> Result<ServiceOffer, AppError> {
    state
        .repo
        .get_offer_for_request(offer_id, request_id)
        .await?
        .ok_or_else(|| AppError::not_found("Offer"))
}
