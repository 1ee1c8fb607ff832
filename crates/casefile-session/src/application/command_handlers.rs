//! Command handlers for the Session & Turn context.
//!
//! Each handler loads the session, applies the domain transition, calls the
//! prompt pipeline where needed, and persists through a single conditional
//! write keyed on the version the session was loaded at.

use std::sync::Mutex;

use casefile_core::clock::Clock;
use casefile_core::command::Command;
use casefile_core::error::DomainError;
use casefile_core::generation::ArtifactProducer;
use casefile_core::repository::{
    ArtifactRecord, ArtifactStore, MessageRecord, ResultRecord, SessionRepository,
    SubmissionRecord,
};
use casefile_core::rng::DeterministicRng;
use casefile_narrative::application::pipeline::{
    ChatRequest, InitRequest, PromptPipeline, ScoreRequest,
};
use casefile_narrative::domain::state::PublicState;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::abuse;
use crate::domain::aggregates::{NewSession, Session};
use crate::domain::commands::{CreateSession, ScoreSession, SubmitSolution, TakeTurn};
use crate::domain::rate::ensure_turn_allowed;

/// Reply returned once a session has no turns left.
pub const EXHAUSTED_REPLY: &str =
    "Your time on the case has run out. Name the culprit with the clues you have.";

/// Phase hint sent with the reply that uses the last turn.
pub const SUBMIT_PHASE_HINT: &str = "submit";

/// Maximum length of a sanitized image keyword.
pub const MAX_KEYWORD_CHARS: usize = 20;

/// Worldview fragments that call for a short explanation of the world.
const WORLDVIEW_KEYWORDS: &[&str] = &[
    "near future",
    "near-future",
    "another world",
    "isekai",
    "medieval",
    "magic",
    "space",
    "cyber",
    "future",
    "steam",
    "steampunk",
];

/// Whether the worldview mentions a genre that warrants an explanation.
#[must_use]
pub fn world_explain_needed(worldview: &str) -> bool {
    let lowered = worldview.to_lowercase();
    WORLDVIEW_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Keeps letters and digits only, truncated to [`MAX_KEYWORD_CHARS`].
#[must_use]
pub fn sanitize_keyword(keyword: Option<&str>) -> String {
    keyword
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(MAX_KEYWORD_CHARS)
        .collect()
}

/// Where intro images are produced, stored, and served from.
pub struct IntroImages<'a> {
    /// Image backend.
    pub producer: &'a dyn ArtifactProducer,
    /// Artifact storage.
    pub store: &'a dyn ArtifactStore,
    /// Public base URL that artifact URLs are built on.
    pub public_base_url: &'a str,
}

/// Response to a successful session creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedSession {
    /// New session identifier.
    pub session_id: Uuid,
    /// Narrative introduction.
    pub intro_text: String,
    /// Intro image URL; absent if image production failed.
    pub intro_image_url: Option<String>,
    /// Initial public state.
    pub public_state: PublicState,
    /// Turn budget.
    pub turn_limit: i32,
    /// Turns left; equals `turn_limit`.
    pub turns_left: i32,
}

/// Response to a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    /// Narrator reply, fallback line, or exhaustion reply.
    pub reply_text: String,
    /// Current public state.
    pub public_state: PublicState,
    /// Turns left after this turn.
    pub turns_left: i32,
    /// Set when the client must move on to submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_submit: Option<bool>,
    /// Set to [`SUBMIT_PHASE_HINT`] when this turn used the last one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_hint: Option<String>,
}

impl TurnOutcome {
    fn exhausted(public_state: PublicState) -> Self {
        Self {
            reply_text: EXHAUSTED_REPLY.to_owned(),
            public_state,
            turns_left: 0,
            force_submit: Some(true),
            phase_hint: None,
        }
    }
}

/// Response to a successful scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreOutcome {
    /// Total score.
    pub score_total: i32,
    /// Per-criterion breakdown.
    pub breakdown: serde_json::Value,
    /// Letter grade.
    pub grade: String,
    /// Narrative epilogue.
    pub result_text: String,
    /// Copy of the intro image URL.
    pub share_image_url: Option<String>,
}

/// Loads a session and hides it unless `user_id` owns it.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the session is missing or owned by
/// someone else, or `DomainError::Infrastructure` if the record is corrupt.
pub(crate) async fn load_owned(
    repo: &dyn SessionRepository,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<Session, DomainError> {
    let record = repo
        .load_session(session_id)
        .await?
        .ok_or_else(|| DomainError::session_not_found(session_id))?;
    let session = Session::from_record(record)?;
    session.ensure_owned_by(user_id)?;
    Ok(session)
}

fn new_seed(clock: &dyn Clock, rng: &Mutex<dyn DeterministicRng>) -> Result<String, DomainError> {
    let mut rng = rng
        .lock()
        .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
    let hi = rng.next_u32_range(0, u32::MAX);
    let lo = rng.next_u32_range(0, u32::MAX);
    Ok(format!("{}-{hi:08x}{lo:08x}", clock.now().timestamp_millis()))
}

/// Handles the `CreateSession` command: generates the world, persists the
/// new session, then attaches an intro image.
///
/// # Errors
///
/// Returns `DomainError::Validation` for blank worldview or attribute text,
/// `DomainError::Upstream` if initialization fails, or a storage error if
/// the session cannot be inserted. Image failures are logged, not returned.
pub async fn handle_create_session(
    command: &CreateSession,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng>,
    repo: &dyn SessionRepository,
    pipeline: &PromptPipeline,
    images: &IntroImages<'_>,
) -> Result<CreatedSession, DomainError> {
    let worldview = command.worldview.trim();
    let attribute = command.attribute.trim();
    if worldview.is_empty() {
        return Err(DomainError::Validation("worldview must not be empty".into()));
    }
    if attribute.is_empty() {
        return Err(DomainError::Validation("attribute must not be empty".into()));
    }

    let seed = new_seed(clock, rng)?;
    let keyword = sanitize_keyword(command.image_keyword.as_deref());
    let init = pipeline
        .initialize(&InitRequest {
            worldview,
            player_attribute: attribute,
            difficulty: command.difficulty.as_str(),
            suspect_count: command.difficulty.suspect_count(),
            world_explain_needed: world_explain_needed(worldview),
            image_tags: &command.image_tags,
            image_keyword: &keyword,
        })
        .await?;

    let session = Session::open(
        NewSession {
            id: Uuid::new_v4(),
            user_id: command.user_id,
            difficulty: command.difficulty,
            seed,
            worldview_text: worldview.to_owned(),
            attribute_text: attribute.to_owned(),
            prompt_versions: pipeline.versions(),
            truth_table: init.truth_table,
            public_state: init.public_state_seed.into(),
        },
        clock.now(),
    );
    repo.insert_session(&session.to_record()?).await?;

    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        session_id = %session.id,
        difficulty = %session.difficulty,
        "session created"
    );

    let image_keyword = init
        .image_hints
        .keyword_suggested
        .as_deref()
        .map(|k| sanitize_keyword(Some(k)))
        .filter(|k| !k.is_empty())
        .unwrap_or(keyword);
    let image_tags = if init.image_hints.tags_suggested.is_empty() {
        &command.image_tags
    } else {
        &init.image_hints.tags_suggested
    };
    let intro_image_url =
        match attach_intro_image(session.id, image_tags, &image_keyword, clock, repo, images).await
        {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "intro image unavailable");
                None
            }
        };

    Ok(CreatedSession {
        session_id: session.id,
        intro_text: init.intro_text,
        intro_image_url,
        turn_limit: session.turn_limit,
        turns_left: session.turns_left(),
        public_state: session.public_state,
    })
}

async fn attach_intro_image(
    session_id: Uuid,
    tags: &[String],
    keyword: &str,
    clock: &dyn Clock,
    repo: &dyn SessionRepository,
    images: &IntroImages<'_>,
) -> Result<String, DomainError> {
    let artifact = images.producer.produce(tags, keyword).await?;
    let key = format!("intro/{session_id}.png");
    images
        .store
        .put_artifact(&ArtifactRecord {
            key: key.clone(),
            content_type: artifact.content_type,
            bytes: artifact.bytes,
            created_at: clock.now(),
        })
        .await?;

    let url = format!(
        "{}/artifacts/{key}",
        images.public_base_url.trim_end_matches('/')
    );
    repo.set_intro_image(session_id, &url, clock.now()).await?;
    Ok(url)
}

/// Handles the `TakeTurn` command.
///
/// Exhausted sessions and sessions pushed over the abuse threshold get
/// [`EXHAUSTED_REPLY`] with `force_submit` and no generation. Otherwise the
/// chat reply (or its fallback) is persisted together with the consumed turn.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for missing or foreign sessions,
/// `DomainError::InvalidState` unless the session is active,
/// `DomainError::RateLimited` inside the turn cooldown, and
/// `DomainError::ConcurrencyConflict` if the session changed concurrently.
pub async fn handle_take_turn(
    command: &TakeTurn,
    clock: &dyn Clock,
    repo: &dyn SessionRepository,
    pipeline: &PromptPipeline,
) -> Result<TurnOutcome, DomainError> {
    let mut session = load_owned(repo, command.session_id, command.user_id).await?;
    session.ensure_active()?;

    if session.turns_left() == 0 {
        info!(
            correlation_id = %command.correlation_id(),
            session_id = %session.id,
            "turn requested with no turns left"
        );
        return Ok(TurnOutcome::exhausted(session.public_state));
    }

    let now = clock.now();
    let last_message = repo.latest_message(session.id).await?;
    ensure_turn_allowed(last_message.as_ref().map(|m| m.created_at), now)?;

    let input = command.input_text.as_deref().unwrap_or_default();
    let report = abuse::detect(input, last_message.as_ref().map(|m| m.input_hash.as_str()));
    session.record_abuse(report.flags.count(), now);

    if session.is_abusive() {
        warn!(
            correlation_id = %command.correlation_id(),
            session_id = %session.id,
            abuse_score = session.abuse_score(),
            "abuse threshold reached, forfeiting remaining turns"
        );
        session.force_exhaust(now);
        repo.update_session(&session.to_record()?).await?;
        return Ok(TurnOutcome::exhausted(session.public_state));
    }

    let abuse_flags = report.flags.to_json();
    let reply = pipeline
        .chat(&ChatRequest {
            worldview: &session.worldview_text,
            player_attribute: &session.attribute_text,
            difficulty: session.difficulty.as_str(),
            turns_left: session.turns_left(),
            abuse_flags: &abuse_flags,
            public_state: &session.public_state,
            player_input: input,
        })
        .await;

    let replied_at = clock.now();
    session.consume_turn(replied_at)?;
    let message = MessageRecord {
        id: Uuid::new_v4(),
        session_id: session.id,
        role: "assistant".to_owned(),
        content: reply.text.clone(),
        created_at: replied_at,
        input_hash: report.fingerprint,
        abuse_flags,
    };
    repo.record_turn(&session.to_record()?, &message).await?;

    let turns_left = session.turns_left();
    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        session_id = %session.id,
        mode = ?command.mode,
        reply_source = ?reply.source,
        turns_left,
        "turn recorded"
    );

    Ok(TurnOutcome {
        reply_text: reply.text,
        public_state: session.public_state,
        turns_left,
        force_submit: None,
        phase_hint: (turns_left == 0).then(|| SUBMIT_PHASE_HINT.to_owned()),
    })
}

/// Handles the `SubmitSolution` command: stores the answer and moves the
/// session to `Submitted` in one write.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for missing or foreign sessions,
/// `DomainError::InvalidState` unless the session is active,
/// `DomainError::Validation` for a blank culprit or logic text, and
/// `DomainError::ConcurrencyConflict` if the session changed concurrently.
pub async fn handle_submit_solution(
    command: &SubmitSolution,
    clock: &dyn Clock,
    repo: &dyn SessionRepository,
) -> Result<(), DomainError> {
    let mut session = load_owned(repo, command.session_id, command.user_id).await?;
    session.ensure_active()?;

    let culprit = command.culprit.trim();
    let logic_text = command.logic_text.trim();
    if culprit.is_empty() {
        return Err(DomainError::Validation("culprit must not be empty".into()));
    }
    if logic_text.is_empty() {
        return Err(DomainError::Validation("logic_text must not be empty".into()));
    }

    let now = clock.now();
    session.submit(now)?;
    let submission = SubmissionRecord {
        session_id: session.id,
        culprit: culprit.to_owned(),
        logic_text: logic_text.to_owned(),
        created_at: now,
    };
    repo.record_submission(&session.to_record()?, &submission)
        .await?;

    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        session_id = %session.id,
        "solution submitted"
    );
    Ok(())
}

/// Handles the `ScoreSession` command: scores the submission and moves the
/// session to `Scored` in one write.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for missing or foreign sessions and for
/// sessions without a submission, `DomainError::InvalidState` unless the
/// session is submitted, `DomainError::Upstream` if scoring fails, and
/// `DomainError::ConcurrencyConflict` if the session changed concurrently.
pub async fn handle_score_session(
    command: &ScoreSession,
    clock: &dyn Clock,
    repo: &dyn SessionRepository,
    pipeline: &PromptPipeline,
) -> Result<ScoreOutcome, DomainError> {
    let mut session = load_owned(repo, command.session_id, command.user_id).await?;
    let submission = repo
        .load_submission(session.id)
        .await?
        .ok_or_else(|| DomainError::NotFound {
            entity: "submission",
            id: session.id.to_string(),
        })?;
    session.mark_scored(clock.now())?;

    let score = pipeline
        .score(&ScoreRequest {
            truth_table: &session.truth_table,
            culprit: &submission.culprit,
            logic_text: &submission.logic_text,
        })
        .await?;

    let now = clock.now();
    session.updated_at = now;
    let result = ResultRecord {
        session_id: session.id,
        score_total: score.score_total,
        breakdown: score.breakdown,
        grade: score.grade,
        result_text: score.result_text,
        share_image_url: session.intro_image_url.clone(),
        created_at: now,
    };
    repo.record_result(&session.to_record()?, &result).await?;

    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        session_id = %session.id,
        score_total = result.score_total,
        grade = %result.grade,
        "session scored"
    );

    Ok(ScoreOutcome {
        score_total: result.score_total,
        breakdown: result.breakdown,
        grade: result.grade,
        result_text: result.result_text,
        share_image_url: result.share_image_url,
    })
}
