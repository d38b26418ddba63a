use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use super::repo_types::Reading;

/// Append-only access to the `readings` table.
#[async_trait]
pub trait ReadingRepo: Send + Sync {
    async fn insert(&self, value: f64, timestamp: PrimitiveDateTime) -> anyhow::Result<Reading>;
}

#[derive(Clone)]
pub struct PgReadingRepo {
    db: PgPool,
}

impl PgReadingRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReadingRepo for PgReadingRepo {
    async fn insert(&self, value: f64, timestamp: PrimitiveDateTime) -> anyhow::Result<Reading> {
        let reading = sqlx::query_as::<_, Reading>(
            r#"
            INSERT INTO readings (value, timestamp)
            VALUES ($1, $2)
            RETURNING id, value, timestamp
            "#,
        )
        .bind(value)
        .bind(timestamp)
        .fetch_one(&self.db)
        .await
        .context("insert reading")?;
        Ok(reading)
    }
}
