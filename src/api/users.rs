//! User API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;

use super::{ApiJson, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{Role, UpdateUserRequest, User};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: User,
}

/// GET /api/users/{id} - Read a user.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<UserEnvelope> {
    let user = state
        .repo
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(UserEnvelope { user }))
}

/// PUT /api/users/{id} - Update a profile (self or admin).
pub async fn update_user(
    State(state): State<AppState>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> ApiResult<UserEnvelope> {
    if caller.id != id && !caller.is_admin() {
        return Err(AppError::forbidden());
    }

    let mut user = state
        .repo
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    if let Some(patch) = &body.profile {
        patch.apply(&mut user.profile);
    }

    if let Some(client_profile) = body.client_profile {
        if let Some(addresses) = client_profile.addresses {
            user.client_profile.addresses = addresses;
        }
        if let Some(favorites) = client_profile.favorites {
            for favorite in &favorites {
                if state.repo.get_technician(favorite).await?.is_none() {
                    return Err(AppError::Validation(format!(
                        "Favorite {} is not a technician",
                        favorite
                    )));
                }
            }
            user.client_profile.favorites = favorites;
        }
    }

    if let Some(role) = body.role.filter(|_| caller.is_admin()) {
        user.role = role;
        if role == Role::Technician && user.technician_profile.is_none() {
            user.technician_profile = Some(Default::default());
        }
    }

    let user = state.repo.update_user(&user).await?;

    if let Err(e) = state.search.index_technician(&user).await {
        tracing::warn!("Failed to re-index user {}: {}", user.id, e);
    }

    Ok(Json(UserEnvelope { user }))
}
