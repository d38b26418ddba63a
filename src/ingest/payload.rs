use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire shape on the sensor topic: `{"value": <number>}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorPayload {
    pub value: f64,
}

impl SensorPayload {
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("payload has no numeric \"value\" field")]
    MissingValue,
}

/// Extra fields are ignored; `value` must be a JSON number.
pub fn parse(payload: &[u8]) -> Result<f64, PayloadError> {
    let doc: Value = serde_json::from_slice(payload)?;
    doc.get("value")
        .and_then(Value::as_f64)
        .ok_or(PayloadError::MissingValue)
}
