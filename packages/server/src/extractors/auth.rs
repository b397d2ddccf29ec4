use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Authenticated organizer extracted from the `Authorization: Bearer <token>`
/// header.
///
/// Add this as a handler parameter to require authentication on admin
/// routes. Token issuance (login, password reset) lives in the identity
/// service; this backend only verifies.
pub struct AuthOrganizer {
    pub organizer_id: i32,
    pub email: String,
}

impl FromRequestParts<AppState> for AuthOrganizer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenMissing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;

        let claims = jwt::verify(token, &state.config.auth.jwt_secret)
            .map_err(|_| AppError::TokenInvalid)?;

        Ok(AuthOrganizer {
            organizer_id: claims.oid,
            email: claims.sub,
        })
    }
}
