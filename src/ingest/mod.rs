pub mod dto;
pub mod handlers;
pub mod payload;
pub mod pipeline;
pub mod subscriber;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::ingest_routes()
}
