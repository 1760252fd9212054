//! PostgreSQL backend for the `labels` relation.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::DbError;
use crate::labels::{Target, TargetKind};

use super::LabelDb;

/// Schema owned by this backend. Target rows cascade away with their owner
/// when the `services`/`users` tables carry the matching foreign keys.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS labels (
    id             BIGSERIAL PRIMARY KEY,
    key            TEXT NOT NULL,
    value          TEXT NOT NULL CHECK (value <> ''),
    tgt_service_id UUID,
    tgt_user_id    UUID,
    CHECK ((tgt_service_id IS NULL) <> (tgt_user_id IS NULL)),
    UNIQUE (key, tgt_service_id),
    UNIQUE (key, tgt_user_id)
)
"#;

#[derive(Clone, Debug)]
pub struct PgLabelDb {
    pool: PgPool,
}

impl PgLabelDb {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `labels` table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn kind_column(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Service => "tgt_service_id",
        TargetKind::User => "tgt_user_id",
    }
}

#[async_trait]
impl LabelDb for PgLabelDb {
    async fn upsert(&self, key: &str, value: &str, target: &Target) -> Result<(), DbError> {
        let query = match target {
            Target::Service(_) => {
                r#"
                INSERT INTO labels (key, value, tgt_service_id) VALUES ($1, $2, $3)
                ON CONFLICT (key, tgt_service_id) DO UPDATE SET value = EXCLUDED.value
                "#
            }
            Target::User(_) => {
                r#"
                INSERT INTO labels (key, value, tgt_user_id) VALUES ($1, $2, $3)
                ON CONFLICT (key, tgt_user_id) DO UPDATE SET value = EXCLUDED.value
                "#
            }
        };

        sqlx::query(query)
            .bind(key)
            .bind(value)
            .bind(target.id())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str, target: &Target) -> Result<u64, DbError> {
        let query = match target {
            Target::Service(_) => "DELETE FROM labels WHERE key = $1 AND tgt_service_id = $2",
            Target::User(_) => "DELETE FROM labels WHERE key = $1 AND tgt_user_id = $2",
        };

        let result = sqlx::query(query)
            .bind(key)
            .bind(target.id())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn select_by_target(&self, target: &Target) -> Result<Vec<(String, String)>, DbError> {
        let query = format!(
            "SELECT key, value FROM labels WHERE {} = $1",
            kind_column(target.kind())
        );

        let rows = sqlx::query_as::<_, (String, String)>(&query)
            .bind(target.id())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn select_distinct_keys(&self) -> Result<Vec<String>, DbError> {
        let keys = sqlx::query_scalar::<_, String>("SELECT DISTINCT key FROM labels")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    async fn select_distinct_keys_for(&self, kind: TargetKind) -> Result<Vec<String>, DbError> {
        let query = format!(
            "SELECT DISTINCT key FROM labels WHERE {} IS NOT NULL",
            kind_column(kind)
        );

        let keys = sqlx::query_scalar::<_, String>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    async fn select_distinct_values(
        &self,
        key: &str,
        kind: Option<TargetKind>,
    ) -> Result<Vec<String>, DbError> {
        let query = match kind {
            Some(kind) => format!(
                "SELECT DISTINCT value FROM labels WHERE key = $1 AND {} IS NOT NULL",
                kind_column(kind)
            ),
            None => "SELECT DISTINCT value FROM labels WHERE key = $1".to_string(),
        };

        let values = sqlx::query_scalar::<_, String>(&query)
            .bind(key)
            .fetch_all(&self.pool)
            .await?;
        Ok(values)
    }
}
