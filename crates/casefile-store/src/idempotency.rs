//! `IdempotencyRepository` over the `idempotency_records` table.

use async_trait::async_trait;
use casefile_core::error::DomainError;
use casefile_core::repository::{IdempotencyRecord, IdempotencyRepository};
use chrono::{DateTime, Utc};

use crate::pg_store::{PgStore, db_error};

type IdempotencyRow = (String, String, String, serde_json::Value, DateTime<Utc>);

#[async_trait]
impl IdempotencyRepository for PgStore {
    async fn find_response(
        &self,
        owner: &str,
        endpoint: &str,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, DomainError> {
        let row: Option<IdempotencyRow> = sqlx::query_as(
            "SELECT owner, endpoint, key, response, created_at FROM idempotency_records \
             WHERE owner = $1 AND endpoint = $2 AND key = $3",
        )
        .bind(owner)
        .bind(endpoint)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|(owner, endpoint, key, response, created_at)| IdempotencyRecord {
            owner,
            endpoint,
            key,
            response,
            created_at,
        }))
    }

    async fn insert_response(
        &self,
        record: &IdempotencyRecord,
    ) -> Result<IdempotencyRecord, DomainError> {
        let inserted = sqlx::query(
            "INSERT INTO idempotency_records (owner, endpoint, key, response, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (owner, endpoint, key) DO NOTHING",
        )
        .bind(&record.owner)
        .bind(&record.endpoint)
        .bind(&record.key)
        .bind(&record.response)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if inserted.rows_affected() == 1 {
            return Ok(record.clone());
        }

        tracing::debug!(
            endpoint = %record.endpoint,
            "idempotency key already recorded, returning earlier response"
        );
        self.find_response(&record.owner, &record.endpoint, &record.key)
            .await?
            .ok_or_else(|| {
                DomainError::Infrastructure("idempotency record vanished after conflict".to_owned())
            })
    }
}
