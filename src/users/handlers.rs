use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{MessageResponse, UserInput},
    repo_types::User,
};
use crate::{auth::extractors::AuthUser, error::AppError, extract::{AppJson, AppPath}, state::AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_user))
        .route("/:id", get(read_user).put(update_user).delete(delete_user))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<UserInput>,
) -> Result<Json<User>, AppError> {
    let user = state.users.create(payload).await?;
    Ok(Json(user))
}

/// Any authenticated caller may read any user.
#[instrument(skip(state, caller), fields(caller = %caller.0.name))]
pub async fn read_user(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<i32>,
) -> Result<Json<User>, AppError> {
    let user = state.users.get(id).await?;
    Ok(Json(user))
}

#[instrument(skip(state, caller, payload), fields(caller = %caller.0.name))]
pub async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<UserInput>,
) -> Result<Json<User>, AppError> {
    let user = state.users.update(id, payload).await?;
    Ok(Json(user))
}

#[instrument(skip(state, caller), fields(caller = %caller.0.name))]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    state.users.delete(id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully".into(),
    }))
}
