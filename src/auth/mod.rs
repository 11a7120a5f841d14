//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs issued by the identity service; this module only
//! verifies them and resolves the caller.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Role, User};
use crate::AppState;

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Expiry, seconds since the epoch
    pub exp: usize,
}

/// The authenticated caller, placed in request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Verify signature and expiry, returning the user id.
pub fn decode_token(token: &str, secret: &[u8]) -> Result<String, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    Ok(data.claims.sub)
}

#[cfg(test)]
pub fn encode_token(user_id: &str, secret: &[u8], ttl: chrono::Duration) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp().max(0) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .expect("token encoding")
}

/// Middleware for protected routes.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))?;

    let user_id = decode_token(token, state.config.jwt_secret.as_bytes())?;

    let user = state
        .repo
        .get_user(&user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

    tracing::debug!(user_id = %user.id, role = user.role.as_str(), "Authenticated request");

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Fail with 403 unless the user holds one of `roles`.
pub fn require_role(user: &User, roles: &[Role]) -> Result<(), AppError> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::test_support::user_with;
    use chrono::Duration;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn test_decode_valid_token() {
        let token = encode_token("user-1", SECRET, Duration::hours(1));
        assert_eq!(decode_token(&token, SECRET).unwrap(), "user-1");
    }

    #[test]
    fn test_decode_rejects_wrong_secret() {
        let token = encode_token("user-1", SECRET, Duration::hours(1));
        let err = decode_token(&token, b"other-secret").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_decode_rejects_expired_token() {
        let token = encode_token("user-1", SECRET, Duration::hours(-2));
        assert!(decode_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_token("not-a-jwt", SECRET).is_err());
    }

    #[test]
    fn test_require_role() {
        let technician = user_with("tech-1", Role::Technician);
        assert!(require_role(&technician, &[Role::Technician, Role::Superadmin]).is_ok());

        let err = require_role(&technician, &[Role::Client]).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
