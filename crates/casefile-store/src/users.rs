//! `UserRepository` over the `users` table.

use async_trait::async_trait;
use casefile_core::error::DomainError;
use casefile_core::repository::{UserRecord, UserRepository};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::pg_store::{PgStore, db_error, is_unique_violation};

type UserRow = (Uuid, String, String, Option<String>, DateTime<Utc>, DateTime<Utc>);

fn to_record(row: UserRow) -> UserRecord {
    let (id, email, password_hash, nickname, created_at, updated_at) = row;
    UserRecord {
        id,
        email,
        password_hash,
        nickname,
        created_at,
        updated_at,
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: &UserRecord) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, nickname, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.nickname)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::Conflict("email is already registered".to_owned())
            } else {
                db_error(e)
            }
        })?;
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, password_hash, nickname, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(to_record))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, password_hash, nickname, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(to_record))
    }

    async fn set_nickname(
        &self,
        user_id: Uuid,
        nickname: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let updated = sqlx::query("UPDATE users SET nickname = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id)
            .bind(nickname)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if updated.rows_affected() == 0 {
            return Err(DomainError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            });
        }
        Ok(())
    }
}
