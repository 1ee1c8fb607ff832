//! `ArtifactStore` over the `artifacts` table.

use async_trait::async_trait;
use casefile_core::error::DomainError;
use casefile_core::repository::{ArtifactRecord, ArtifactStore};
use chrono::{DateTime, Utc};

use crate::pg_store::{PgStore, db_error};

#[async_trait]
impl ArtifactStore for PgStore {
    async fn put_artifact(&self, artifact: &ArtifactRecord) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO artifacts (key, content_type, bytes, created_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (key) DO UPDATE \
             SET content_type = EXCLUDED.content_type, bytes = EXCLUDED.bytes, \
                 created_at = EXCLUDED.created_at",
        )
        .bind(&artifact.key)
        .bind(&artifact.content_type)
        .bind(&artifact.bytes)
        .bind(artifact.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn load_artifact(&self, key: &str) -> Result<Option<ArtifactRecord>, DomainError> {
        let row: Option<(String, String, Vec<u8>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT key, content_type, bytes, created_at FROM artifacts WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|(key, content_type, bytes, created_at)| ArtifactRecord {
            key,
            content_type,
            bytes,
            created_at,
        }))
    }
}
