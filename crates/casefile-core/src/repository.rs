//! Repository abstractions and their stored record types.
//!
//! Records are the persisted shape of each entity. Bounded contexts map them
//! to and from their own typed domain models; the store crate maps them to
//! and from tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// Stored representation of a game session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    /// Unique session identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Difficulty name (`Easy`, `Normal`, `Hard`, `Expert`).
    pub difficulty: String,
    /// Maximum number of accepted turns.
    pub turn_limit: i32,
    /// Turns consumed so far.
    pub turns_used: i32,
    /// Lifecycle status (`active`, `submitted`, `scored`).
    pub status: String,
    /// Opaque generation seed.
    pub seed: String,
    /// Worldview requested by the player.
    pub worldview_text: String,
    /// Player attribute requested by the player.
    pub attribute_text: String,
    /// Prompt template version used for initialization.
    pub prompt_version_init: String,
    /// Prompt template version used for chat turns.
    pub prompt_version_chat: String,
    /// Prompt template version used for scoring.
    pub prompt_version_score: String,
    /// Introductory image URL, set once after creation.
    pub intro_image_url: Option<String>,
    /// Hidden ground truth. Never exposed to clients.
    pub truth_table: serde_json::Value,
    /// Player-visible narrative state.
    pub public_state: serde_json::Value,
    /// Accumulated abuse flag count.
    pub abuse_score: i32,
    /// Optimistic concurrency version. Writes are conditional on this value.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Stored representation of a logged turn reply.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    /// Unique message identifier.
    pub id: Uuid,
    /// Parent session.
    pub session_id: Uuid,
    /// Speaker role; always `assistant` for persisted turns.
    pub role: String,
    /// Reply text.
    pub content: String,
    /// Creation time, used for rate limiting.
    pub created_at: DateTime<Utc>,
    /// Fingerprint of the player's normalized input.
    pub input_hash: String,
    /// Abuse flags computed for the player's input.
    pub abuse_flags: serde_json::Value,
}

/// Stored representation of a player's final answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    /// Session the submission belongs to.
    pub session_id: Uuid,
    /// Accused party.
    pub culprit: String,
    /// Free-form justification.
    pub logic_text: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Stored representation of a scoring outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    /// Session the result belongs to.
    pub session_id: Uuid,
    /// Total score.
    pub score_total: i32,
    /// Per-criterion breakdown.
    pub breakdown: serde_json::Value,
    /// Letter grade.
    pub grade: String,
    /// Narrative epilogue.
    pub result_text: String,
    /// Copy of the session's intro image URL.
    pub share_image_url: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// One row of a user's play history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    /// Session identifier.
    pub session_id: Uuid,
    /// Difficulty name.
    pub difficulty: String,
    /// Lifecycle status.
    pub status: String,
    /// Session creation time.
    pub created_at: DateTime<Utc>,
    /// Total score, if scored.
    pub score_total: Option<i32>,
    /// Grade, if scored.
    pub grade: Option<String>,
    /// Share image URL, if scored.
    pub share_image_url: Option<String>,
}

/// Stored representation of a player account.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    /// Unique user identifier.
    pub id: Uuid,
    /// Login email, unique.
    pub email: String,
    /// PHC-format password hash.
    pub password_hash: String,
    /// Display name.
    pub nickname: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// A previously produced response for an idempotent request.
#[derive(Debug, Clone, PartialEq)]
pub struct IdempotencyRecord {
    /// Owner scope (user id or normalized email).
    pub owner: String,
    /// Endpoint identifier (request path).
    pub endpoint: String,
    /// Client-supplied idempotency key.
    pub key: String,
    /// The serialized response body.
    pub response: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A stored binary artifact (e.g. an intro image).
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRecord {
    /// Storage key, e.g. `intro/{session_id}.png`.
    pub key: String,
    /// MIME type of `bytes`.
    pub content_type: String,
    /// Raw artifact content.
    pub bytes: Vec<u8>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Repository for sessions and their child entities.
///
/// Every mutating method that takes a `SessionRecord` is a conditional write:
/// it applies only if the stored version equals `session.version`, bumps the
/// stored version by one, and otherwise fails with
/// `DomainError::ConcurrencyConflict`. Child rows written alongside commit
/// atomically with the session update.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a newly created session.
    async fn insert_session(&self, session: &SessionRecord) -> Result<(), DomainError>;

    /// Load a session by ID.
    async fn load_session(&self, session_id: Uuid) -> Result<Option<SessionRecord>, DomainError>;

    /// Conditionally update session state.
    async fn update_session(&self, session: &SessionRecord) -> Result<(), DomainError>;

    /// Conditionally update session state and append a turn message.
    async fn record_turn(
        &self,
        session: &SessionRecord,
        message: &MessageRecord,
    ) -> Result<(), DomainError>;

    /// Load the most recently created message of a session.
    async fn latest_message(&self, session_id: Uuid)
    -> Result<Option<MessageRecord>, DomainError>;

    /// Conditionally update session state and insert its submission.
    async fn record_submission(
        &self,
        session: &SessionRecord,
        submission: &SubmissionRecord,
    ) -> Result<(), DomainError>;

    /// Load the submission of a session.
    async fn load_submission(
        &self,
        session_id: Uuid,
    ) -> Result<Option<SubmissionRecord>, DomainError>;

    /// Conditionally update session state and insert its result.
    async fn record_result(
        &self,
        session: &SessionRecord,
        result: &ResultRecord,
    ) -> Result<(), DomainError>;

    /// Set the intro image URL if it has not been set yet. Returns whether
    /// the URL was written.
    async fn set_intro_image(
        &self,
        session_id: Uuid,
        url: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// List a user's sessions joined with their results, newest first.
    async fn list_history(&self, user_id: Uuid) -> Result<Vec<HistoryRow>, DomainError>;
}

/// Repository for player accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `DomainError::Conflict` if the email is
    /// already registered.
    async fn insert_user(&self, user: &UserRecord) -> Result<(), DomainError>;

    /// Find a user by ID.
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, DomainError>;

    /// Find a user by normalized email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DomainError>;

    /// Set a user's nickname.
    async fn set_nickname(
        &self,
        user_id: Uuid,
        nickname: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError>;
}

/// Repository for idempotent responses.
#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    /// Find a stored response by its composite key.
    async fn find_response(
        &self,
        owner: &str,
        endpoint: &str,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, DomainError>;

    /// Insert a response if no record exists for its composite key.
    ///
    /// Returns the record that is persisted after the call: the given one if
    /// this call won, otherwise the one written by the earlier writer.
    async fn insert_response(
        &self,
        record: &IdempotencyRecord,
    ) -> Result<IdempotencyRecord, DomainError>;
}

/// Key-indexed storage for binary artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store (or replace) an artifact under its key.
    async fn put_artifact(&self, artifact: &ArtifactRecord) -> Result<(), DomainError>;

    /// Load an artifact by key.
    async fn load_artifact(&self, key: &str) -> Result<Option<ArtifactRecord>, DomainError>;
}
