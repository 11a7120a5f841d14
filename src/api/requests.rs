//! Service request API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;

use super::{ApiJson, ApiResult};
use crate::auth::{require_role, CurrentUser};
use crate::db::{NewServiceRequest, RequestScope};
use crate::errors::AppError;
use crate::models::{
    AssignTechnicianRequest, CreateServiceRequest, NearbyRequest, Role, ServiceRequest,
    UpdateStatusRequest,
};
use crate::workflow::{lifecycle, nearby};
use crate::AppState;

/// Open requests considered for a technician's nearby feed.
const NEARBY_CANDIDATES: i64 = 50;

#[derive(Debug, Serialize)]
pub struct RequestEnvelope {
    pub request: ServiceRequest,
}

#[derive(Debug, Serialize)]
pub struct RequestsEnvelope<T: Serialize> {
    pub requests: Vec<T>,
}

/// POST /api/service-request - Create a request (clients only).
pub async fn create_request(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(body): ApiJson<CreateServiceRequest>,
) -> Result<(StatusCode, Json<RequestEnvelope>), AppError> {
    require_role(&user, &[Role::Client])?;

    let new_request = validate_new_request(body)?;
    let request = state
        .repo
        .create_service_request(&user.id, new_request)
        .await?;

    tracing::info!(request_id = %request.id, client_id = %user.id, "Service request created");
    Ok((StatusCode::CREATED, Json(RequestEnvelope { request })))
}

fn validate_new_request(body: CreateServiceRequest) -> Result<NewServiceRequest, AppError> {
    let required = [
        ("title", &body.title),
        ("description", &body.description),
        ("category", &body.category),
        ("address", &body.address),
        ("contactName", &body.contact_name),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{} is required", name)));
        }
    }
    let scheduled_at = body
        .scheduled_at
        .ok_or_else(|| AppError::Validation("scheduledAt is required".to_string()))?;

    let category_details = match body.category_details {
        Some(details @ serde_json::Value::Object(_)) => details,
        Some(serde_json::Value::Null) | None => serde_json::json!({}),
        Some(_) => {
            return Err(AppError::Validation(
                "categoryDetails must be an object".to_string(),
            ))
        }
    };

    Ok(NewServiceRequest {
        title: body.title.trim().to_string(),
        description: body.description.trim().to_string(),
        category: body.category.trim().to_string(),
        address: body.address.trim().to_string(),
        scheduled_at,
        contact_name: body.contact_name.trim().to_string(),
        contact_phone: body.contact_phone,
        notes: body.notes,
        category_details,
    })
}

/// GET /api/service-request - Requests visible to the caller.
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<RequestsEnvelope<ServiceRequest>> {
    let scope = match user.role {
        Role::Client => RequestScope::OwnedBy(&user.id),
        Role::Technician => RequestScope::AssignedTo(&user.id),
        Role::Superadmin => RequestScope::All,
    };
    let requests = state.repo.list_service_requests(scope).await?;
    Ok(Json(RequestsEnvelope { requests }))
}

/// GET /api/service-request/nearby - Open requests ranked for a technician.
pub async fn list_nearby_requests(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<RequestsEnvelope<NearbyRequest>> {
    require_role(&user, &[Role::Technician])?;

    let candidates = state.repo.list_open_requests(NEARBY_CANDIDATES).await?;
    let requests = nearby::rank(&user, candidates);
    Ok(Json(RequestsEnvelope { requests }))
}

/// GET /api/service-request/{id} - Read a request.
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RequestEnvelope> {
    let request = load_request(&state, &id).await?;
    Ok(Json(RequestEnvelope { request }))
}

/// PATCH /api/service-request/{id}/assign - Force-assign a technician (admins only).
pub async fn assign_technician(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AssignTechnicianRequest>,
) -> ApiResult<RequestEnvelope> {
    require_role(&user, &[Role::Superadmin])?;

    let technician_id = body.technician_id.trim();
    if technician_id.is_empty() {
        return Err(AppError::Validation("technicianId is required".to_string()));
    }

    let request = load_request(&state, &id).await?;
    let technician = state
        .repo
        .get_technician(technician_id)
        .await?
        .ok_or_else(|| AppError::not_found("Technician"))?;

    let request = state.repo.assign_technician(&request, &technician.id).await?;

    tracing::info!(request_id = %request.id, technician_id = %technician.id, "Technician assigned");
    Ok(Json(RequestEnvelope { request }))
}

/// PATCH /api/service-request/{id}/status - Advance a request's status.
pub async fn update_status(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateStatusRequest>,
) -> ApiResult<RequestEnvelope> {
    let new_status = lifecycle::parse_status_update(&body.status)?;
    let request = load_request(&state, &id).await?;
    lifecycle::authorize_status_update(&request, &user)?;

    let change = lifecycle::plan_status_change(new_status, Utc::now());
    let request = state.repo.apply_status_change(&request, &change).await?;

    Ok(Json(RequestEnvelope { request }))
}

pub(super) async fn load_request(state: &AppState, id: &str) -> Result<ServiceRequest, AppError> {
    state
        .repo
        .get_service_request(id)
        .await?
        .ok_or_else(|| AppError::not_found("Service request"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: serde_json::Value) -> CreateServiceRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_validate_new_request() {
        let valid = body(serde_json::json!({
            "title": " Leaking faucet ",
            "description": "Kitchen faucet drips",
            "category": "plumbing",
            "address": "Roma Norte, CDMX",
            "scheduledAt": "2026-05-01T10:00:00Z",
            "contactName": "Ana"
        }));
        let request = validate_new_request(valid).unwrap();
        assert_eq!(request.title, "Leaking faucet");
        assert_eq!(request.category_details, serde_json::json!({}));

        let missing_contact = body(serde_json::json!({
            "title": "Leaking faucet",
            "description": "Kitchen faucet drips",
            "category": "plumbing",
            "address": "Roma Norte, CDMX",
            "scheduledAt": "2026-05-01T10:00:00Z"
        }));
        let err = validate_new_request(missing_contact).unwrap_err();
        assert_eq!(err.message(), "contactName is required");

        let unscheduled = body(serde_json::json!({
            "title": "Leaking faucet",
            "description": "Kitchen faucet drips",
            "category": "plumbing",
            "address": "Roma Norte, CDMX",
            "contactName": "Ana"
        }));
        assert!(matches!(
            validate_new_request(unscheduled),
            Err(AppError::Validation(_))
        ));
    }
}
