//! Test repositories — in-memory and failing implementations of every
//! repository trait.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use casefile_core::error::DomainError;
use casefile_core::repository::{
    ArtifactRecord, ArtifactStore, HistoryRow, IdempotencyRecord, IdempotencyRepository,
    MessageRecord, ResultRecord, SessionRecord, SessionRepository, SubmissionRecord,
    UserRecord, UserRepository,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<Uuid, SessionRecord>,
    messages: Vec<MessageRecord>,
    submissions: HashMap<Uuid, SubmissionRecord>,
    results: HashMap<Uuid, ResultRecord>,
    users: HashMap<Uuid, UserRecord>,
    idempotency: HashMap<(String, String, String), IdempotencyRecord>,
    artifacts: HashMap<String, ArtifactRecord>,
}

impl Tables {
    /// Applies the version-checked session write shared by every mutating
    /// session method.
    fn apply_session(&mut self, session: &SessionRecord) -> Result<(), DomainError> {
        let stored = self
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| DomainError::session_not_found(session.id))?;
        if stored.version != session.version {
            return Err(DomainError::ConcurrencyConflict {
                session_id: session.id,
                expected: session.version,
                actual: stored.version,
            });
        }
        let mut next = session.clone();
        next.version = session.version + 1;
        *stored = next;
        Ok(())
    }
}

/// A repository that keeps everything in memory and honours the same
/// conditional-write contract as the Postgres store.
///
/// Implements all four repository traits so one instance can back a whole
/// application in tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    /// Returns a snapshot of a stored session.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn session(&self, session_id: Uuid) -> Option<SessionRecord> {
        self.tables().sessions.get(&session_id).cloned()
    }

    /// Returns all messages of a session in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn messages(&self, session_id: Uuid) -> Vec<MessageRecord> {
        self.tables()
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Returns the stored result of a session.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn result(&self, session_id: Uuid) -> Option<ResultRecord> {
        self.tables().results.get(&session_id).cloned()
    }

    /// Number of stored sessions across all users.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.tables().sessions.len()
    }

    /// Returns the stored submission of a session.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn submission(&self, session_id: Uuid) -> Option<SubmissionRecord> {
        self.tables().submissions.get(&session_id).cloned()
    }

    /// Number of stored submissions across all sessions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn submission_count(&self) -> usize {
        self.tables().submissions.len()
    }

    /// Number of stored results across all sessions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.tables().results.len()
    }

    /// Number of stored idempotent responses.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn idempotency_count(&self) -> usize {
        self.tables().idempotency.len()
    }

    /// Returns every stored idempotent response body.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn idempotent_responses(&self) -> Vec<serde_json::Value> {
        self.tables()
            .idempotency
            .values()
            .map(|r| r.response.clone())
            .collect()
    }

    /// Simulates a concurrent writer by bumping a session's stored version.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn bump_version(&self, session_id: Uuid) {
        if let Some(session) = self.tables().sessions.get_mut(&session_id) {
            session.version += 1;
        }
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn insert_session(&self, session: &SessionRecord) -> Result<(), DomainError> {
        let mut tables = self.tables();
        if tables.sessions.contains_key(&session.id) {
            return Err(DomainError::Conflict(format!(
                "session {} already exists",
                session.id
            )));
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn load_session(&self, session_id: Uuid) -> Result<Option<SessionRecord>, DomainError> {
        Ok(self.session(session_id))
    }

    async fn update_session(&self, session: &SessionRecord) -> Result<(), DomainError> {
        self.tables().apply_session(session)
    }

    async fn record_turn(
        &self,
        session: &SessionRecord,
        message: &MessageRecord,
    ) -> Result<(), DomainError> {
        let mut tables = self.tables();
        tables.apply_session(session)?;
        tables.messages.push(message.clone());
        Ok(())
    }

    async fn latest_message(
        &self,
        session_id: Uuid,
    ) -> Result<Option<MessageRecord>, DomainError> {
        Ok(self
            .tables()
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .max_by_key(|m| m.created_at)
            .cloned())
    }

    async fn record_submission(
        &self,
        session: &SessionRecord,
        submission: &SubmissionRecord,
    ) -> Result<(), DomainError> {
        let mut tables = self.tables();
        if tables.submissions.contains_key(&submission.session_id) {
            return Err(DomainError::Conflict(format!(
                "session {} already has a submission",
                submission.session_id
            )));
        }
        tables.apply_session(session)?;
        tables
            .submissions
            .insert(submission.session_id, submission.clone());
        Ok(())
    }

    async fn load_submission(
        &self,
        session_id: Uuid,
    ) -> Result<Option<SubmissionRecord>, DomainError> {
        Ok(self.tables().submissions.get(&session_id).cloned())
    }

    async fn record_result(
        &self,
        session: &SessionRecord,
        result: &ResultRecord,
    ) -> Result<(), DomainError> {
        let mut tables = self.tables();
        if tables.results.contains_key(&result.session_id) {
            return Err(DomainError::Conflict(format!(
                "session {} already has a result",
                result.session_id
            )));
        }
        tables.apply_session(session)?;
        tables.results.insert(result.session_id, result.clone());
        Ok(())
    }

    async fn set_intro_image(
        &self,
        session_id: Uuid,
        url: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let mut tables = self.tables();
        match tables.sessions.get_mut(&session_id) {
            Some(session) if session.intro_image_url.is_none() => {
                session.intro_image_url = Some(url.to_owned());
                session.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_history(&self, user_id: Uuid) -> Result<Vec<HistoryRow>, DomainError> {
        let tables = self.tables();
        let mut rows: Vec<HistoryRow> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| {
                let result = tables.results.get(&s.id);
                HistoryRow {
                    session_id: s.id,
                    difficulty: s.difficulty.clone(),
                    status: s.status.clone(),
                    created_at: s.created_at,
                    score_total: result.map(|r| r.score_total),
                    grade: result.map(|r| r.grade.clone()),
                    share_image_url: result.and_then(|r| r.share_image_url.clone()),
                }
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &UserRecord) -> Result<(), DomainError> {
        let mut tables = self.tables();
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(DomainError::Conflict("email already registered".into()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, DomainError> {
        Ok(self.tables().users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DomainError> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn set_nickname(
        &self,
        user_id: Uuid,
        nickname: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut tables = self.tables();
        let user = tables.users.get_mut(&user_id).ok_or(DomainError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })?;
        user.nickname = Some(nickname.to_owned());
        user.updated_at = at;
        Ok(())
    }
}

#[async_trait]
impl IdempotencyRepository for InMemoryStore {
    async fn find_response(
        &self,
        owner: &str,
        endpoint: &str,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, DomainError> {
        Ok(self
            .tables()
            .idempotency
            .get(&(owner.to_owned(), endpoint.to_owned(), key.to_owned()))
            .cloned())
    }

    async fn insert_response(
        &self,
        record: &IdempotencyRecord,
    ) -> Result<IdempotencyRecord, DomainError> {
        let composite = (
            record.owner.clone(),
            record.endpoint.clone(),
            record.key.clone(),
        );
        Ok(self
            .tables()
            .idempotency
            .entry(composite)
            .or_insert_with(|| record.clone())
            .clone())
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn put_artifact(&self, artifact: &ArtifactRecord) -> Result<(), DomainError> {
        self.tables()
            .artifacts
            .insert(artifact.key.clone(), artifact.clone());
        Ok(())
    }

    async fn load_artifact(&self, key: &str) -> Result<Option<ArtifactRecord>, DomainError> {
        Ok(self.tables().artifacts.get(key).cloned())
    }
}

/// A repository whose every operation fails with an infrastructure error.
#[derive(Debug)]
pub struct FailingStore;

fn unavailable<T>() -> Result<T, DomainError> {
    Err(DomainError::Infrastructure("connection refused".into()))
}

#[async_trait]
impl SessionRepository for FailingStore {
    async fn insert_session(&self, _session: &SessionRecord) -> Result<(), DomainError> {
        unavailable()
    }

    async fn load_session(&self, _session_id: Uuid) -> Result<Option<SessionRecord>, DomainError> {
        unavailable()
    }

    async fn update_session(&self, _session: &SessionRecord) -> Result<(), DomainError> {
        unavailable()
    }

    async fn record_turn(
        &self,
        _session: &SessionRecord,
        _message: &MessageRecord,
    ) -> Result<(), DomainError> {
        unavailable()
    }

    async fn latest_message(
        &self,
        _session_id: Uuid,
    ) -> Result<Option<MessageRecord>, DomainError> {
        unavailable()
    }

    async fn record_submission(
        &self,
        _session: &SessionRecord,
        _submission: &SubmissionRecord,
    ) -> Result<(), DomainError> {
        unavailable()
    }

    async fn load_submission(
        &self,
        _session_id: Uuid,
    ) -> Result<Option<SubmissionRecord>, DomainError> {
        unavailable()
    }

    async fn record_result(
        &self,
        _session: &SessionRecord,
        _result: &ResultRecord,
    ) -> Result<(), DomainError> {
        unavailable()
    }

    async fn set_intro_image(
        &self,
        _session_id: Uuid,
        _url: &str,
        _at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        unavailable()
    }

    async fn list_history(&self, _user_id: Uuid) -> Result<Vec<HistoryRow>, DomainError> {
        unavailable()
    }
}

#[async_trait]
impl UserRepository for FailingStore {
    async fn insert_user(&self, _user: &UserRecord) -> Result<(), DomainError> {
        unavailable()
    }

    async fn find_user(&self, _user_id: Uuid) -> Result<Option<UserRecord>, DomainError> {
        unavailable()
    }

    async fn find_user_by_email(&self, _email: &str) -> Result<Option<UserRecord>, DomainError> {
        unavailable()
    }

    async fn set_nickname(
        &self,
        _user_id: Uuid,
        _nickname: &str,
        _at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        unavailable()
    }
}

#[async_trait]
impl IdempotencyRepository for FailingStore {
    async fn find_response(
        &self,
        _owner: &str,
        _endpoint: &str,
        _key: &str,
    ) -> Result<Option<IdempotencyRecord>, DomainError> {
        unavailable()
    }

    async fn insert_response(
        &self,
        _record: &IdempotencyRecord,
    ) -> Result<IdempotencyRecord, DomainError> {
        unavailable()
    }
}

#[async_trait]
impl ArtifactStore for FailingStore {
    async fn put_artifact(&self, _artifact: &ArtifactRecord) -> Result<(), DomainError> {
        unavailable()
    }

    async fn load_artifact(&self, _key: &str) -> Result<Option<ArtifactRecord>, DomainError> {
        unavailable()
    }
}
