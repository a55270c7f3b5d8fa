use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::jwt;
use crate::error::AppError;
use crate::AppState;
use fieldops_shared::User;

/// Authenticated user extractor
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Extract Bearer token from Authorization header
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized("Missing authorization header".to_string()).into_response()
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("Invalid authorization format".to_string()).into_response()
        })?;

        // Verify JWT token
        let token_data = jwt::verify_jwt(token).map_err(|e| AppError::from(e).into_response())?;

        // Load user from database
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, is_active, created_at FROM users WHERE id = $1 AND is_active = true",
        )
        .bind(token_data.claims.sub)
        .fetch_optional(&state.db_pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()).into_response())?
        .ok_or_else(|| {
            AppError::Unauthorized("User not found or inactive".to_string()).into_response()
        })?;

        Ok(AuthUser(user))
    }
}
