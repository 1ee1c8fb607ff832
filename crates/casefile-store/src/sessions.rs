//! `SessionRepository` over the `sessions`, `messages`, `submissions` and
//! `results` tables.

use async_trait::async_trait;
use casefile_core::error::DomainError;
use casefile_core::repository::{
    HistoryRow, MessageRecord, ResultRecord, SessionRecord, SessionRepository, SubmissionRecord,
};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::pg_store::{PgStore, db_error, is_unique_violation};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    difficulty: String,
    turn_limit: i32,
    turns_used: i32,
    status: String,
    seed: String,
    worldview_text: String,
    attribute_text: String,
    prompt_version_init: String,
    prompt_version_chat: String,
    prompt_version_score: String,
    intro_image_url: Option<String>,
    truth_table: serde_json::Value,
    public_state: serde_json::Value,
    abuse_score: i32,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            difficulty: row.difficulty,
            turn_limit: row.turn_limit,
            turns_used: row.turns_used,
            status: row.status,
            seed: row.seed,
            worldview_text: row.worldview_text,
            attribute_text: row.attribute_text,
            prompt_version_init: row.prompt_version_init,
            prompt_version_chat: row.prompt_version_chat,
            prompt_version_score: row.prompt_version_score,
            intro_image_url: row.intro_image_url,
            truth_table: row.truth_table,
            public_state: row.public_state,
            abuse_score: row.abuse_score,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    session_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
    input_hash: String,
    abuse_flags: serde_json::Value,
}

impl From<MessageRow> for MessageRecord {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            role: row.role,
            content: row.content,
            created_at: row.created_at,
            input_hash: row.input_hash,
            abuse_flags: row.abuse_flags,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRowDb {
    session_id: Uuid,
    difficulty: String,
    status: String,
    created_at: DateTime<Utc>,
    score_total: Option<i32>,
    grade: Option<String>,
    share_image_url: Option<String>,
}

const SELECT_SESSION: &str = "SELECT id, user_id, difficulty, turn_limit, turns_used, status, \
     seed, worldview_text, attribute_text, prompt_version_init, prompt_version_chat, \
     prompt_version_score, intro_image_url, truth_table, public_state, abuse_score, version, \
     created_at, updated_at FROM sessions WHERE id = $1";

/// Writes the mutable session columns if the stored version still matches,
/// bumping it by one.
async fn apply_session(conn: &mut PgConnection, session: &SessionRecord) -> Result<(), DomainError> {
    let updated = sqlx::query(
        "UPDATE sessions \
         SET turns_used = $3, status = $4, public_state = $5, abuse_score = $6, \
             updated_at = $7, version = version + 1 \
         WHERE id = $1 AND version = $2",
    )
    .bind(session.id)
    .bind(session.version)
    .bind(session.turns_used)
    .bind(&session.status)
    .bind(&session.public_state)
    .bind(session.abuse_score)
    .bind(session.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    if updated.rows_affected() == 1 {
        return Ok(());
    }

    let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM sessions WHERE id = $1")
        .bind(session.id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;

    match actual {
        Some(actual) => {
            tracing::debug!(
                session_id = %session.id,
                expected = session.version,
                actual,
                "conditional session write lost"
            );
            Err(DomainError::ConcurrencyConflict {
                session_id: session.id,
                expected: session.version,
                actual,
            })
        }
        None => Err(DomainError::session_not_found(session.id)),
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn insert_session(&self, session: &SessionRecord) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, difficulty, turn_limit, turns_used, status, seed, \
             worldview_text, attribute_text, prompt_version_init, prompt_version_chat, \
             prompt_version_score, intro_image_url, truth_table, public_state, abuse_score, \
             version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.difficulty)
        .bind(session.turn_limit)
        .bind(session.turns_used)
        .bind(&session.status)
        .bind(&session.seed)
        .bind(&session.worldview_text)
        .bind(&session.attribute_text)
        .bind(&session.prompt_version_init)
        .bind(&session.prompt_version_chat)
        .bind(&session.prompt_version_score)
        .bind(&session.intro_image_url)
        .bind(&session.truth_table)
        .bind(&session.public_state)
        .bind(session.abuse_score)
        .bind(session.version)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::Conflict(format!("session {} already exists", session.id))
            } else {
                db_error(e)
            }
        })?;
        Ok(())
    }

    async fn load_session(&self, session_id: Uuid) -> Result<Option<SessionRecord>, DomainError> {
        let row: Option<SessionRow> = sqlx::query_as(SELECT_SESSION)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(SessionRecord::from))
    }

    async fn update_session(&self, session: &SessionRecord) -> Result<(), DomainError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        apply_session(&mut conn, session).await
    }

    async fn record_turn(
        &self,
        session: &SessionRecord,
        message: &MessageRecord,
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        apply_session(&mut tx, session).await?;

        sqlx::query(
            "INSERT INTO messages (id, session_id, role, content, created_at, input_hash, abuse_flags) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(message.id)
        .bind(message.session_id)
        .bind(&message.role)
        .bind(&message.content)
        .bind(message.created_at)
        .bind(&message.input_hash)
        .bind(&message.abuse_flags)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)
    }

    async fn latest_message(
        &self,
        session_id: Uuid,
    ) -> Result<Option<MessageRecord>, DomainError> {
        let row: Option<MessageRow> = sqlx::query_as(
            "SELECT id, session_id, role, content, created_at, input_hash, abuse_flags \
             FROM messages WHERE session_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(MessageRecord::from))
    }

    async fn record_submission(
        &self,
        session: &SessionRecord,
        submission: &SubmissionRecord,
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        apply_session(&mut tx, session).await?;

        sqlx::query(
            "INSERT INTO submissions (session_id, culprit, logic_text, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(submission.session_id)
        .bind(&submission.culprit)
        .bind(&submission.logic_text)
        .bind(submission.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::Conflict(format!(
                    "session {} already has a submission",
                    submission.session_id
                ))
            } else {
                db_error(e)
            }
        })?;

        tx.commit().await.map_err(db_error)
    }

    async fn load_submission(
        &self,
        session_id: Uuid,
    ) -> Result<Option<SubmissionRecord>, DomainError> {
        let row: Option<(Uuid, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT session_id, culprit, logic_text, created_at \
             FROM submissions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|(session_id, culprit, logic_text, created_at)| SubmissionRecord {
            session_id,
            culprit,
            logic_text,
            created_at,
        }))
    }

    async fn record_result(
        &self,
        session: &SessionRecord,
        result: &ResultRecord,
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        apply_session(&mut tx, session).await?;

        sqlx::query(
            "INSERT INTO results (session_id, score_total, breakdown, grade, result_text, \
             share_image_url, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(result.session_id)
        .bind(result.score_total)
        .bind(&result.breakdown)
        .bind(&result.grade)
        .bind(&result.result_text)
        .bind(&result.share_image_url)
        .bind(result.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::Conflict(format!(
                    "session {} already has a result",
                    result.session_id
                ))
            } else {
                db_error(e)
            }
        })?;

        tx.commit().await.map_err(db_error)
    }

    async fn set_intro_image(
        &self,
        session_id: Uuid,
        url: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let updated = sqlx::query(
            "UPDATE sessions SET intro_image_url = $2, updated_at = $3 \
             WHERE id = $1 AND intro_image_url IS NULL",
        )
        .bind(session_id)
        .bind(url)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(updated.rows_affected() == 1)
    }

    async fn list_history(&self, user_id: Uuid) -> Result<Vec<HistoryRow>, DomainError> {
        let rows: Vec<HistoryRowDb> = sqlx::query_as(
            "SELECT s.id AS session_id, s.difficulty, s.status, s.created_at, \
                    r.score_total, r.grade, r.share_image_url \
             FROM sessions s \
             LEFT JOIN results r ON r.session_id = s.id \
             WHERE s.user_id = $1 \
             ORDER BY s.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| HistoryRow {
                session_id: row.session_id,
                difficulty: row.difficulty,
                status: row.status,
                created_at: row.created_at,
                score_total: row.score_total,
                grade: row.grade,
                share_image_url: row.share_image_url,
            })
            .collect())
    }
}
