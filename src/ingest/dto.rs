use serde::{Deserialize, Serialize};

use crate::readings::repo_types::Reading;

#[derive(Debug, Deserialize)]
pub struct PublishTemperatureRequest {
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct PublishTemperatureResponse {
    pub message: String,
    pub data: Reading,
}
