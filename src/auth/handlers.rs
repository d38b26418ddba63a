use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument};

use super::dto::{TokenRequest, TokenResponse};
use crate::{error::AppError, extract::AppForm, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/token", post(login_for_access_token))
}

#[instrument(skip(state, form), fields(username = %form.username))]
pub async fn login_for_access_token(
    State(state): State<AppState>,
    AppForm(form): AppForm<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .users
        .authenticate(&form.username, &form.password)
        .await?;

    let access_token = state.jwt.issue(&user.name)?;
    info!(user_id = user.id, "access token issued");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}
