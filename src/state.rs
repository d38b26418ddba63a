use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::{jwt::JwtKeys, password::CredentialHasher};
use crate::config::AppConfig;
use crate::readings::repo::ReadingRepo;
use crate::transport::SensorPublisher;
use crate::users::{repo::PgUserRepo, services::UserService};

/// Everything a request handler can reach. Built once in `main` and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub readings: Arc<dyn ReadingRepo>,
    pub publisher: Arc<dyn SensorPublisher>,
    pub jwt: JwtKeys,
}

impl AppState {
    pub fn init(
        config: &AppConfig,
        db: PgPool,
        readings: Arc<dyn ReadingRepo>,
        publisher: Arc<dyn SensorPublisher>,
    ) -> anyhow::Result<Self> {
        let hasher = CredentialHasher::new(&config.password)?;
        let users = UserService::new(Arc::new(PgUserRepo::new(db)), hasher);
        Ok(Self::from_parts(
            users,
            readings,
            publisher,
            JwtKeys::from_config(&config.jwt),
        ))
    }

    pub fn from_parts(
        users: UserService,
        readings: Arc<dyn ReadingRepo>,
        publisher: Arc<dyn SensorPublisher>,
        jwt: JwtKeys,
    ) -> Self {
        Self {
            users,
            readings,
            publisher,
            jwt,
        }
    }
}
