//! REST API module.
//!
//! Handlers validate input, consult the workflow rules and shape the JSON
//! envelopes the web client expects (`{ request }`, `{ offers }`, ...).

mod conversations;
mod offers;
mod requests;
mod technicians;
mod users;

pub use conversations::*;
pub use offers::*;
pub use requests::*;
pub use technicians::*;
pub use users::*;

use axum::{extract::FromRequest, extract::FromRequestParts, Json};
use serde::Serialize;

use crate::errors::AppError;

/// JSON body extractor whose rejections render as `{ message }`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections render as `{ message }`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Handler result carrying a JSON body.
pub type ApiResult<T> = Result<Json<T>, AppError>;

/// GET /api/health - Liveness probe.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "FixFinder API",
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}
