//! Aggregate roots for the Session & Turn context.

use std::fmt;
use std::str::FromStr;

use casefile_core::error::DomainError;
use casefile_core::repository::SessionRecord;
use casefile_narrative::application::pipeline::PromptVersions;
use casefile_narrative::domain::state::PublicState;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::difficulty::Difficulty;

/// Abuse score at or above which a session's remaining turns are forfeited.
pub const ABUSE_THRESHOLD: i32 = 3;

/// Lifecycle status of a session. Transitions only move forward:
/// `Active` → `Submitted` → `Scored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Turns may be taken and a solution submitted.
    Active,
    /// A solution was submitted and awaits scoring.
    Submitted,
    /// The submission was scored; the session is final.
    Scored,
}

impl SessionStatus {
    /// Stable name, as stored.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Submitted => "submitted",
            Self::Scored => "scored",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "submitted" => Ok(Self::Submitted),
            "scored" => Ok(Self::Scored),
            other => Err(DomainError::Infrastructure(format!(
                "unknown session status: {other}"
            ))),
        }
    }
}

/// Everything needed to open a new session.
#[derive(Debug, Clone)]
pub struct NewSession {
    /// Identifier of the new session.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Chosen difficulty.
    pub difficulty: Difficulty,
    /// Opaque generation seed.
    pub seed: String,
    /// Worldview text.
    pub worldview_text: String,
    /// Player attribute text.
    pub attribute_text: String,
    /// Template versions in use.
    pub prompt_versions: PromptVersions,
    /// Hidden ground truth.
    pub truth_table: serde_json::Value,
    /// Initial public state.
    pub public_state: PublicState,
}

/// The aggregate root for one playthrough.
///
/// `turns_used`, `abuse_score` and `status` only change through the
/// methods below, which keep `turns_used <= turn_limit` and the status
/// monotonic.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Session identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Difficulty chosen at creation.
    pub difficulty: Difficulty,
    /// Maximum number of accepted turns.
    pub turn_limit: i32,
    turns_used: i32,
    status: SessionStatus,
    /// Opaque generation seed.
    pub seed: String,
    /// Worldview text.
    pub worldview_text: String,
    /// Player attribute text.
    pub attribute_text: String,
    /// Initialization template version.
    pub prompt_version_init: String,
    /// Chat template version.
    pub prompt_version_chat: String,
    /// Score template version.
    pub prompt_version_score: String,
    /// Intro image URL, once produced.
    pub intro_image_url: Option<String>,
    /// Hidden ground truth. Never exposed.
    pub truth_table: serde_json::Value,
    /// Player-visible state.
    pub public_state: PublicState,
    abuse_score: i32,
    /// Version the session was loaded at.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Opens a new active session with no turns used.
    #[must_use]
    pub fn open(new: NewSession, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            user_id: new.user_id,
            difficulty: new.difficulty,
            turn_limit: new.difficulty.turn_limit(),
            turns_used: 0,
            status: SessionStatus::Active,
            seed: new.seed,
            worldview_text: new.worldview_text,
            attribute_text: new.attribute_text,
            prompt_version_init: new.prompt_versions.init.to_owned(),
            prompt_version_chat: new.prompt_versions.chat.to_owned(),
            prompt_version_score: new.prompt_versions.score.to_owned(),
            intro_image_url: None,
            truth_table: new.truth_table,
            public_state: new.public_state,
            abuse_score: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a session from its stored record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the record holds an unknown
    /// difficulty or status, an out-of-range turn count, or a malformed
    /// public state.
    pub fn from_record(record: SessionRecord) -> Result<Self, DomainError> {
        let difficulty: Difficulty = record.difficulty.parse().map_err(|_| {
            DomainError::Infrastructure(format!("unknown difficulty: {}", record.difficulty))
        })?;
        let status: SessionStatus = record.status.parse()?;
        if !(0..=record.turn_limit).contains(&record.turns_used) {
            return Err(DomainError::Infrastructure(format!(
                "session {} has turns_used {} outside 0..={}",
                record.id, record.turns_used, record.turn_limit
            )));
        }
        let public_state: PublicState = serde_json::from_value(record.public_state)
            .map_err(|e| DomainError::Infrastructure(format!("malformed public state: {e}")))?;

        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            difficulty,
            turn_limit: record.turn_limit,
            turns_used: record.turns_used,
            status,
            seed: record.seed,
            worldview_text: record.worldview_text,
            attribute_text: record.attribute_text,
            prompt_version_init: record.prompt_version_init,
            prompt_version_chat: record.prompt_version_chat,
            prompt_version_score: record.prompt_version_score,
            intro_image_url: record.intro_image_url,
            truth_table: record.truth_table,
            public_state,
            abuse_score: record.abuse_score,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Converts the session into its stored record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the public state cannot be
    /// serialized.
    pub fn to_record(&self) -> Result<SessionRecord, DomainError> {
        let public_state = serde_json::to_value(&self.public_state)
            .map_err(|e| DomainError::Infrastructure(format!("public state serialization: {e}")))?;
        Ok(SessionRecord {
            id: self.id,
            user_id: self.user_id,
            difficulty: self.difficulty.as_str().to_owned(),
            turn_limit: self.turn_limit,
            turns_used: self.turns_used,
            status: self.status.as_str().to_owned(),
            seed: self.seed.clone(),
            worldview_text: self.worldview_text.clone(),
            attribute_text: self.attribute_text.clone(),
            prompt_version_init: self.prompt_version_init.clone(),
            prompt_version_chat: self.prompt_version_chat.clone(),
            prompt_version_score: self.prompt_version_score.clone(),
            intro_image_url: self.intro_image_url.clone(),
            truth_table: self.truth_table.clone(),
            public_state,
            abuse_score: self.abuse_score,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    /// Turns consumed so far.
    #[must_use]
    pub fn turns_used(&self) -> i32 {
        self.turns_used
    }

    /// Turns remaining; never negative.
    #[must_use]
    pub fn turns_left(&self) -> i32 {
        (self.turn_limit - self.turns_used).max(0)
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Accumulated abuse score.
    #[must_use]
    pub fn abuse_score(&self) -> i32 {
        self.abuse_score
    }

    /// Whether the abuse score has reached [`ABUSE_THRESHOLD`].
    #[must_use]
    pub fn is_abusive(&self) -> bool {
        self.abuse_score >= ABUSE_THRESHOLD
    }

    /// Hides sessions owned by other users behind `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if `user_id` is not the owner.
    pub fn ensure_owned_by(&self, user_id: Uuid) -> Result<(), DomainError> {
        if self.user_id == user_id {
            Ok(())
        } else {
            Err(DomainError::session_not_found(self.id))
        }
    }

    /// Requires the session to accept turns and submissions.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the session is active.
    pub fn ensure_active(&self) -> Result<(), DomainError> {
        self.ensure_status(SessionStatus::Active)
    }

    fn ensure_status(&self, expected: SessionStatus) -> Result<(), DomainError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(DomainError::InvalidState(format!(
                "session {} is {}, expected {expected}",
                self.id, self.status
            )))
        }
    }

    /// Adds an input's flag count to the abuse score.
    pub fn record_abuse(&mut self, delta: i32, now: DateTime<Utc>) {
        if delta > 0 {
            self.abuse_score += delta;
            self.updated_at = now;
        }
    }

    /// Forfeits all remaining turns.
    pub fn force_exhaust(&mut self, now: DateTime<Utc>) {
        self.turns_used = self.turn_limit;
        self.updated_at = now;
    }

    /// Consumes one turn.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the session is not active or
    /// has no turns left.
    pub fn consume_turn(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_active()?;
        if self.turns_left() == 0 {
            return Err(DomainError::InvalidState(format!(
                "session {} has no turns left",
                self.id
            )));
        }
        self.turns_used += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Moves an active session to `Submitted`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the session is active.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_active()?;
        self.status = SessionStatus::Submitted;
        self.updated_at = now;
        Ok(())
    }

    /// Moves a submitted session to `Scored`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the session is submitted.
    pub fn mark_scored(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_status(SessionStatus::Submitted)?;
        self.status = SessionStatus::Scored;
        self.updated_at = now;
        Ok(())
    }
}
