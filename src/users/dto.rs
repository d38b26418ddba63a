use serde::{Deserialize, Serialize};

/// Body of signup and update. Update is a full overwrite, so every field is required.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
