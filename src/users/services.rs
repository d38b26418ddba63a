use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tracing::{info, warn};

use super::dto::UserInput;
use super::repo::{RepoError, UserRepo};
use super::repo_types::{User, UserFields};
use crate::auth::password::CredentialHasher;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("email {0} is already in use")]
    DuplicateEmail(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type UserResult<T> = Result<T, UserError>;

/// CRUD and credential checks over the user store.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepo>,
    hasher: CredentialHasher,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepo>, hasher: CredentialHasher) -> Self {
        Self { repo, hasher }
    }

    pub async fn create(&self, input: UserInput) -> UserResult<User> {
        // Cheap early exit before hashing; the unique constraint still decides races.
        if self.repo.find_by_email(&input.email).await?.is_some() {
            warn!(email = %input.email, "email already registered");
            return Err(UserError::DuplicateEmail(input.email));
        }
        let fields = self.fields_from(input).await?;
        let email = fields.email.clone();
        match self.repo.insert(fields).await {
            Ok(user) => {
                info!(user_id = user.id, "user created");
                Ok(user)
            }
            Err(RepoError::UniqueViolation) => {
                warn!(%email, "email already registered");
                Err(UserError::DuplicateEmail(email))
            }
            Err(RepoError::Other(e)) => Err(UserError::Internal(e.context("insert user"))),
        }
    }

    pub async fn get(&self, id: i32) -> UserResult<User> {
        self.repo.find_by_id(id).await?.ok_or(UserError::NotFound)
    }

    /// Full overwrite. The password is re-hashed even when it did not change.
    pub async fn update(&self, id: i32, input: UserInput) -> UserResult<User> {
        let fields = self.fields_from(input).await?;
        let email = fields.email.clone();
        match self.repo.update(id, fields).await {
            Ok(Some(user)) => {
                info!(user_id = user.id, "user updated");
                Ok(user)
            }
            Ok(None) => Err(UserError::NotFound),
            Err(RepoError::UniqueViolation) => {
                warn!(user_id = id, %email, "email already registered");
                Err(UserError::DuplicateEmail(email))
            }
            Err(RepoError::Other(e)) => Err(UserError::Internal(e.context("update user"))),
        }
    }

    pub async fn delete(&self, id: i32) -> UserResult<()> {
        if self.repo.delete(id).await? {
            info!(user_id = id, "user deleted");
            Ok(())
        } else {
            Err(UserError::NotFound)
        }
    }

    /// Looks the user up by name and checks the password.
    pub async fn authenticate(&self, username: &str, password: &str) -> UserResult<User> {
        let user = self.repo.find_by_name(username).await?;
        let hasher = self.hasher.clone();
        let password = password.to_string();

        let verified = match user {
            Some(user) => tokio::task::spawn_blocking(move || {
                let ok = hasher.verify(&password, &user.hashed_password);
                ok.then_some(user)
            })
            .await
            .context("verify task")?,
            None => {
                tokio::task::spawn_blocking(move || hasher.verify_dummy(&password))
                    .await
                    .context("verify task")?;
                None
            }
        };

        verified.ok_or_else(|| {
            warn!(username, "login rejected");
            UserError::InvalidCredentials
        })
    }

    /// Resolves a token subject to a stored user.
    pub async fn find_by_name(&self, name: &str) -> UserResult<Option<User>> {
        Ok(self.repo.find_by_name(name).await?)
    }

    async fn fields_from(&self, input: UserInput) -> anyhow::Result<UserFields> {
        let hasher = self.hasher.clone();
        let UserInput {
            name,
            email,
            password,
        } = input;
        let hashed_password = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .context("hash task")??;
        Ok(UserFields {
            name,
            email,
            hashed_password,
        })
    }
}
