use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use super::repo_types::{User, UserFields};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::UniqueViolation,
            _ => RepoError::Other(anyhow::Error::new(err)),
        }
    }
}

/// Typed access to the `users` table.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: i32) -> anyhow::Result<Option<User>>;
    /// Names are not unique; the lowest id wins.
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn insert(&self, fields: UserFields) -> Result<User, RepoError>;
    /// `Ok(None)` when no row has this id.
    async fn update(&self, id: i32, fields: UserFields) -> Result<Option<User>, RepoError>;
    /// `Ok(false)` when no row has this id.
    async fn delete(&self, id: i32) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: i32) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, hashed_password
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, hashed_password
            FROM users
            WHERE name = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .context("find user by name")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, hashed_password
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn insert(&self, fields: UserFields) -> Result<User, RepoError> {
        // Dropping the transaction on the error path rolls it back.
        let mut tx = self.db.begin().await.context("begin tx")?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, hashed_password)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, hashed_password
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.hashed_password)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await.context("commit tx")?;
        Ok(user)
    }

    async fn update(&self, id: i32, fields: UserFields) -> Result<Option<User>, RepoError> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = $1, email = $2, hashed_password = $3
             WHERE id = $4
            RETURNING id, name, email, hashed_password
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.hashed_password)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await.context("commit tx")?;
        Ok(user)
    }

    async fn delete(&self, id: i32) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(result.rows_affected() > 0)
    }
}
