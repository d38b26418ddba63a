use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::{error::AppError, state::AppState, users::repo_types::User};

/// Validates the bearer token and resolves its subject to a stored user.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Read Authorization header
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))?;

        let subject = state.jwt.validate(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::credentials()
        })?;

        match state.users.find_by_name(&subject).await? {
            Some(user) => Ok(AuthUser(user)),
            None => {
                warn!(%subject, "token subject has no user");
                Err(AppError::credentials())
            }
        }
    }
}
