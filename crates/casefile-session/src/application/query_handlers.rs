//! Query handlers for the Session & Turn context.
//!
//! Read-only views. None of them ever include the hidden truth.

use casefile_core::error::DomainError;
use casefile_core::repository::SessionRepository;
use casefile_narrative::domain::state::PublicState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;

/// Player-facing view of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    /// Session identifier.
    pub session_id: Uuid,
    /// Difficulty name.
    pub difficulty: String,
    /// Lifecycle status.
    pub status: String,
    /// Turn budget.
    pub turn_limit: i32,
    /// Turns remaining.
    pub turns_left: i32,
    /// Current public state.
    pub public_state: PublicState,
    /// Intro image URL, if produced.
    pub intro_image_url: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// One entry of a player's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Session identifier.
    pub session_id: Uuid,
    /// Difficulty name.
    pub difficulty: String,
    /// Lifecycle status.
    pub status: String,
    /// Session creation time.
    pub created_at: DateTime<Utc>,
    /// Total score, once scored.
    pub score_total: Option<i32>,
    /// Grade, once scored.
    pub grade: Option<String>,
    /// Share image URL, once scored.
    pub share_image_url: Option<String>,
}

/// Retrieves a session owned by `user_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the session does not exist or belongs
/// to another user.
pub async fn get_session_by_id(
    session_id: Uuid,
    user_id: Uuid,
    repo: &dyn SessionRepository,
) -> Result<SessionView, DomainError> {
    let session = command_handlers::load_owned(repo, session_id, user_id).await?;
    Ok(SessionView {
        session_id: session.id,
        difficulty: session.difficulty.as_str().to_owned(),
        status: session.status().as_str().to_owned(),
        turn_limit: session.turn_limit,
        turns_left: session.turns_left(),
        intro_image_url: session.intro_image_url.clone(),
        created_at: session.created_at,
        public_state: session.public_state,
    })
}

/// Lists a user's sessions, newest first, with outcomes where scored.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store fails.
pub async fn list_history(
    user_id: Uuid,
    repo: &dyn SessionRepository,
) -> Result<Vec<HistoryEntry>, DomainError> {
    let rows = repo.list_history(user_id).await?;
    Ok(rows
        .into_iter()
        .map(|row| HistoryEntry {
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

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use casefile_core::error::DomainError;
    use casefile_core::repository::{
        ResultRecord, SessionRecord, SessionRepository, SubmissionRecord,
    };
    use casefile_test_support::{FailingStore, InMemoryStore};
    use uuid::Uuid;

    use crate::application::query_handlers::{get_session_by_id, list_history};

    fn session_record(user_id: Uuid, minutes: i64, status: &str) -> SessionRecord {
        let created_at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
            + Duration::minutes(minutes);
        SessionRecord {
            id: Uuid::new_v4(),
            user_id,
            difficulty: "Normal".to_owned(),
            turn_limit: 10,
            turns_used: 4,
            status: status.to_owned(),
            seed: "seed".to_owned(),
            worldview_text: "Victorian London".to_owned(),
            attribute_text: "retired inspector".to_owned(),
            prompt_version_init: "init_v1".to_owned(),
            prompt_version_chat: "chat_v1".to_owned(),
            prompt_version_score: "score_v1".to_owned(),
            intro_image_url: Some("https://cdn.example.com/artifacts/intro/x.png".to_owned()),
            truth_table: serde_json::json!({"culprit": "Mara"}),
            public_state: serde_json::json!({"visible_evidence": ["torn glove"], "initial_statements": {}}),
            abuse_score: 0,
            version: 0,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn test_get_session_by_id_returns_view_without_truth() {
        // Arrange
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        let record = session_record(user_id, 0, "active");
        store.insert_session(&record).await.unwrap();

        // Act
        let view = get_session_by_id(record.id, user_id, &store).await.unwrap();

        // Assert
        assert_eq!(view.session_id, record.id);
        assert_eq!(view.turns_left, 6);
        assert_eq!(view.public_state.visible_evidence, vec!["torn glove"]);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("truth_table").is_none());
        assert!(!json.to_string().contains("Mara"));
    }

    #[tokio::test]
    async fn test_get_session_by_id_returns_not_found_for_other_user() {
        // Arrange
        let store = InMemoryStore::new();
        let record = session_record(Uuid::new_v4(), 0, "active");
        store.insert_session(&record).await.unwrap();

        // Act
        let result = get_session_by_id(record.id, Uuid::new_v4(), &store).await;

        // Assert
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_history_returns_newest_first_with_outcomes() {
        // Arrange
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        let older = session_record(user_id, 0, "active");
        let newer = session_record(user_id, 5, "submitted");
        store.insert_session(&older).await.unwrap();
        store.insert_session(&newer).await.unwrap();
        store
            .insert_session(&session_record(Uuid::new_v4(), 10, "active"))
            .await
            .unwrap();

        let mut scored = newer.clone();
        scored.status = "scored".to_owned();
        store
            .record_submission(
                &newer,
                &SubmissionRecord {
                    session_id: newer.id,
                    culprit: "Mara".to_owned(),
                    logic_text: "glove".to_owned(),
                    created_at: newer.created_at,
                },
            )
            .await
            .unwrap();
        scored.version = 1;
        store
            .record_result(
                &scored,
                &ResultRecord {
                    session_id: newer.id,
                    score_total: 70,
                    breakdown: serde_json::json!({}),
                    grade: "B".to_owned(),
                    result_text: "Close.".to_owned(),
                    share_image_url: newer.intro_image_url.clone(),
                    created_at: newer.created_at,
                },
            )
            .await
            .unwrap();

        // Act
        let history = list_history(user_id, &store).await.unwrap();

        // Assert
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].session_id, newer.id);
        assert_eq!(history[0].status, "scored");
        assert_eq!(history[0].score_total, Some(70));
        assert_eq!(history[0].grade.as_deref(), Some("B"));
        assert_eq!(history[1].session_id, older.id);
        assert!(history[1].score_total.is_none());
    }

    #[tokio::test]
    async fn test_list_history_propagates_store_failure() {
        let result = list_history(Uuid::new_v4(), &FailingStore).await;
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
