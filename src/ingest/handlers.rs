use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use super::{
    dto::{PublishTemperatureRequest, PublishTemperatureResponse},
    payload::SensorPayload,
};
use crate::{
    auth::extractors::AuthUser, error::AppError, extract::AppJson, readings::utc_now_naive,
    state::AppState,
};

pub fn ingest_routes() -> Router<AppState> {
    Router::new().route("/publish-temperature", post(publish_temperature))
}

/// Publishes the value to the sensor topic and stores it directly. The subscriber
/// will usually store the echoed message a second time; that duplicate is expected.
#[instrument(skip(state, caller, body), fields(caller = %caller.0.name, value = body.value))]
pub async fn publish_temperature(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(body): AppJson<PublishTemperatureRequest>,
) -> Result<Json<PublishTemperatureResponse>, AppError> {
    let payload = SensorPayload { value: body.value }
        .to_bytes()
        .map_err(anyhow::Error::from)?;
    match state.publisher.publish(payload) {
        Ok(()) => info!("temperature published"),
        Err(e) => warn!(error = %format!("{e:#}"), "temperature publish failed, storing anyway"),
    }

    let reading = state.readings.insert(body.value, utc_now_naive()).await?;
    info!(reading_id = reading.id, "temperature stored via api");

    Ok(Json(PublishTemperatureResponse {
        message: "Temperature published and stored successfully".into(),
        data: reading,
    }))
}
