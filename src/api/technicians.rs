//! Technician directory endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::users::UserEnvelope;
use super::{ApiJson, ApiQuery, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{RegisterTechnicianRequest, Role, User};
use crate::AppState;

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

/// Directory query parameters.
#[derive(Debug, Deserialize)]
pub struct TechnicianQuery {
    /// Free-text search; when absent every technician is listed.
    #[serde(default)]
    pub q: Option<String>,
    /// Exact specialty filter.
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct TechniciansEnvelope {
    pub technicians: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct TechnicianEnvelope {
    pub technician: User,
}

/// GET /api/technicians - List or search technicians.
pub async fn list_technicians(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<TechnicianQuery>,
) -> ApiResult<TechniciansEnvelope> {
    let specialty = params.specialty.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let query = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let technicians = match query {
        Some(q) => {
            let limit = params.limit.unwrap_or(20).clamp(1, MAX_SEARCH_LIMIT);
            let hits = state.search.search(q, limit, params.offset)?;

            let mut technicians = Vec::with_capacity(hits.len());
            for hit in hits {
                if let Some(technician) = state.repo.get_technician(&hit.user_id).await? {
                    technicians.push(technician);
                }
            }
            technicians
                .into_iter()
                .filter(|t| t.offers_specialty(specialty))
                .collect()
        }
        None => {
            let all = state.repo.list_technicians(specialty).await?;
            let limit = params.limit.unwrap_or(usize::MAX);
            all.into_iter().skip(params.offset).take(limit).collect()
        }
    };

    Ok(Json(TechniciansEnvelope { technicians }))
}

/// GET /api/technicians/{id} - Read a technician's public profile.
pub async fn get_technician(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TechnicianEnvelope> {
    let technician = state
        .repo
        .get_technician(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Technician"))?;
    Ok(Json(TechnicianEnvelope { technician }))
}

/// POST /api/technicians/register - Turn the caller into a technician.
pub async fn register_technician(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(body): ApiJson<RegisterTechnicianRequest>,
) -> Result<(StatusCode, Json<UserEnvelope>), AppError> {
    let mut user = user;
    let rating = user
        .technician_profile
        .as_ref()
        .map(|p| p.rating)
        .unwrap_or_default();

    if let Some(avatar) = body.avatar.clone().filter(|a| !a.trim().is_empty()) {
        user.profile.avatar = Some(avatar);
    }
    user.role = Role::Technician;
    user.technician_profile = Some(body.into_profile(rating));

    let user = state.repo.update_user(&user).await?;

    if let Err(e) = state.search.index_technician(&user).await {
        tracing::warn!("Failed to index technician {}: {}", user.id, e);
    }

    tracing::info!(user_id = %user.id, "Technician registered");
    Ok((StatusCode::CREATED, Json(UserEnvelope { user })))
}
