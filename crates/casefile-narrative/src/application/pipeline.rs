//! The prompt pipeline: render, generate, parse, and apply fallback policy.
//!
//! Initialize and Score have no safe fallback and surface failures as
//! `DomainError::Upstream`. Chat never fails: any backend or parse failure,
//! and any guard violation, is replaced with [`FALLBACK_REPLY`]. Guard
//! failures count as "no violation".

use std::sync::Arc;

use casefile_core::error::DomainError;
use casefile_core::generation::{GenerationRequest, TextGenerator};
use serde::Serialize;
use tracing::{error, instrument, warn};

use crate::domain::outputs::{ChatOutput, GuardOutput, InitOutput, ScoreOutput};
use crate::domain::prompts::{CHAT_V1, GUARD_V1, INIT_V1, PromptTemplate, SCORE_V1};
use crate::domain::state::PublicState;

/// Reply substituted whenever chat generation fails or is guard-flagged.
pub const FALLBACK_REPLY: &str = "A silence falls over the room. This is not the moment for more words.";

/// Name used for the player in prompts.
pub const DEFAULT_NICKNAME: &str = "Player";

/// Turns-left threshold at or below which prompts signal time pressure.
pub const TIME_PRESSURE_TURNS: i32 = 3;

/// Template versions used by this pipeline, persisted on each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptVersions {
    /// Initialization template version.
    pub init: &'static str,
    /// Chat template version.
    pub chat: &'static str,
    /// Score template version.
    pub score: &'static str,
    /// Guard template version.
    pub guard: &'static str,
}

/// Inputs to the initialization role.
#[derive(Debug, Clone)]
pub struct InitRequest<'a> {
    /// Worldview chosen by the player.
    pub worldview: &'a str,
    /// Player attribute.
    pub player_attribute: &'a str,
    /// Difficulty name.
    pub difficulty: &'a str,
    /// Number of suspects for the difficulty.
    pub suspect_count: u32,
    /// Whether the worldview warrants an explanation.
    pub world_explain_needed: bool,
    /// Image tags chosen by the player.
    pub image_tags: &'a [String],
    /// Sanitized image keyword.
    pub image_keyword: &'a str,
}

/// Inputs to the chat role.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    /// Worldview of the session.
    pub worldview: &'a str,
    /// Player attribute of the session.
    pub player_attribute: &'a str,
    /// Difficulty name.
    pub difficulty: &'a str,
    /// Turns left before this turn is consumed.
    pub turns_left: i32,
    /// Abuse flags computed for the input.
    pub abuse_flags: &'a serde_json::Value,
    /// Current public state.
    pub public_state: &'a PublicState,
    /// The player's raw input.
    pub player_input: &'a str,
}

/// Inputs to the score role.
#[derive(Debug, Clone)]
pub struct ScoreRequest<'a> {
    /// Hidden truth of the session.
    pub truth_table: &'a serde_json::Value,
    /// Accused party.
    pub culprit: &'a str,
    /// Free-form justification.
    pub logic_text: &'a str,
}

/// Where a chat reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// Generated and passed the guard.
    Generated,
    /// Generation or parsing failed.
    Fallback,
    /// Generated but flagged by the guard.
    Guarded,
}

/// The reply to a chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// Text shown to the player.
    pub text: String,
    /// Where the text came from.
    pub source: ReplySource,
}

#[derive(Serialize)]
struct PlayerSubmission<'a> {
    culprit: &'a str,
    logic_text: &'a str,
}

/// Mediates between session state and the text-generation backend.
#[derive(Clone)]
pub struct PromptPipeline {
    generator: Arc<dyn TextGenerator>,
}

impl std::fmt::Debug for PromptPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptPipeline").finish_non_exhaustive()
    }
}

impl PromptPipeline {
    /// Creates a pipeline over the given backend.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Template versions this pipeline renders.
    #[must_use]
    pub fn versions(&self) -> PromptVersions {
        PromptVersions {
            init: INIT_V1.version,
            chat: CHAT_V1.version,
            score: SCORE_V1.version,
            guard: GUARD_V1.version,
        }
    }

    async fn generate(
        &self,
        template: PromptTemplate,
        variables: &[(&str, String)],
    ) -> Result<String, DomainError> {
        let request = GenerationRequest {
            role: template.role,
            prompt_version: template.version,
            prompt: template.render(variables),
        };
        self.generator.generate(&request).await
    }

    /// Generates the world, hidden truth, and intro text for a new session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Upstream` if the backend fails or its output
    /// cannot be parsed.
    #[instrument(skip(self, request), fields(difficulty = request.difficulty))]
    pub async fn initialize(&self, request: &InitRequest<'_>) -> Result<InitOutput, DomainError> {
        let image_tags = serde_json::to_string(request.image_tags)
            .map_err(|e| DomainError::Infrastructure(format!("tag serialization failed: {e}")))?;
        let variables = [
            ("nickname", DEFAULT_NICKNAME.to_owned()),
            ("worldview", request.worldview.to_owned()),
            ("player_attribute", request.player_attribute.to_owned()),
            ("difficulty", request.difficulty.to_owned()),
            ("suspect_count", request.suspect_count.to_string()),
            ("world_explain_needed", request.world_explain_needed.to_string()),
            ("image_tags", image_tags),
            ("image_keyword", request.image_keyword.to_owned()),
        ];

        let raw = self.generate(INIT_V1, &variables).await?;
        InitOutput::parse(&raw).map_err(|e| {
            error!(error = %e, "initialization output could not be parsed");
            DomainError::Upstream(format!("init_parse: {e}"))
        })
    }

    /// Produces the narrator's reply to a turn, guard-checked.
    ///
    /// Never fails: backend errors, malformed output, and guard violations
    /// all yield [`FALLBACK_REPLY`].
    #[instrument(skip(self, request), fields(turns_left = request.turns_left))]
    pub async fn chat(&self, request: &ChatRequest<'_>) -> ChatReply {
        let public_state = serde_json::to_string(request.public_state).unwrap_or_default();
        let variables = [
            ("nickname", DEFAULT_NICKNAME.to_owned()),
            ("worldview_short", request.worldview.to_owned()),
            ("player_attribute_short", request.player_attribute.to_owned()),
            ("difficulty", request.difficulty.to_owned()),
            ("turns_left", request.turns_left.to_string()),
            (
                "time_pressure",
                (request.turns_left <= TIME_PRESSURE_TURNS).to_string(),
            ),
            ("abuse_flags", request.abuse_flags.to_string()),
            ("public_state", public_state),
            ("target_npc", String::new()),
            ("last_messages_short", String::new()),
            ("player_input", request.player_input.to_owned()),
        ];

        let generated = match self.generate(CHAT_V1, &variables).await {
            Ok(raw) => ChatOutput::parse(&raw).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match generated {
            Ok(output) => {
                if self.guard(&output.reply_text).await {
                    warn!("guard flagged chat reply, substituting fallback");
                    ChatReply {
                        text: FALLBACK_REPLY.to_owned(),
                        source: ReplySource::Guarded,
                    }
                } else {
                    ChatReply {
                        text: output.reply_text,
                        source: ReplySource::Generated,
                    }
                }
            }
            Err(reason) => {
                warn!(%reason, "chat generation failed, substituting fallback");
                ChatReply {
                    text: FALLBACK_REPLY.to_owned(),
                    source: ReplySource::Fallback,
                }
            }
        }
    }

    /// Asks the backend whether `text` violates the rules. Fails open.
    #[instrument(skip(self, text))]
    pub async fn guard(&self, text: &str) -> bool {
        let raw = match self.generate(GUARD_V1, &[("text", text.to_owned())]).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "guard call failed, treating as no violation");
                return false;
            }
        };
        match GuardOutput::parse(&raw) {
            Ok(output) => output.is_violation(),
            Err(e) => {
                warn!(error = %e, "guard output unparseable, treating as no violation");
                false
            }
        }
    }

    /// Scores a submission against the hidden truth.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Upstream` if the backend fails or its output
    /// cannot be parsed.
    #[instrument(skip(self, request))]
    pub async fn score(&self, request: &ScoreRequest<'_>) -> Result<ScoreOutput, DomainError> {
        let submission = PlayerSubmission {
            culprit: request.culprit,
            logic_text: request.logic_text,
        };
        let player_submit = serde_json::to_string(&submission).map_err(|e| {
            DomainError::Infrastructure(format!("submission serialization failed: {e}"))
        })?;
        let variables = [
            ("truth_table_json", request.truth_table.to_string()),
            ("player_submit", player_submit),
        ];

        let raw = self.generate(SCORE_V1, &variables).await?;
        ScoreOutput::parse(&raw).map_err(|e| {
            error!(error = %e, "score output could not be parsed");
            DomainError::Upstream(format!("score_parse: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use casefile_core::generation::GenerationRole;
    use casefile_test_support::{FailingGenerator, ScriptedGenerator};
    use serde_json::json;

    fn chat_request<'a>(
        flags: &'a serde_json::Value,
        state: &'a PublicState,
        turns_left: i32,
    ) -> ChatRequest<'a> {
        ChatRequest {
            worldview: "foggy harbor town",
            player_attribute: "retired inspector",
            difficulty: "Normal",
            turns_left,
            abuse_flags: flags,
            public_state: state,
            player_input: "Where were you last night?",
        }
    }

    #[tokio::test]
    async fn test_chat_returns_generated_reply_when_guard_passes() {
        // Arrange
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(r#"{"reply_text": "I was at the lighthouse."}"#.to_owned()),
            Ok(r#"{"violations": []}"#.to_owned()),
        ]));
        let pipeline = PromptPipeline::new(generator.clone());
        let flags = json!({});
        let state = PublicState::default();

        // Act
        let reply = pipeline.chat(&chat_request(&flags, &state, 5)).await;

        // Assert
        assert_eq!(reply.text, "I was at the lighthouse.");
        assert_eq!(reply.source, ReplySource::Generated);
        let calls = generator.requests();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].role, GenerationRole::Chat);
        assert!(calls[0].prompt.contains("Where were you last night?"));
        assert!(calls[0].prompt.contains("Time pressure: false"));
        assert_eq!(calls[1].role, GenerationRole::Guard);
    }

    #[tokio::test]
    async fn test_chat_substitutes_fallback_when_guard_flags_reply() {
        // Arrange
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(r#"{"reply_text": "The culprit is Mara."}"#.to_owned()),
            Ok(r#"{"violations": ["reveals culprit"]}"#.to_owned()),
        ]));
        let pipeline = PromptPipeline::new(generator);
        let flags = json!({});
        let state = PublicState::default();

        // Act
        let reply = pipeline.chat(&chat_request(&flags, &state, 2)).await;

        // Assert
        assert_eq!(reply.text, FALLBACK_REPLY);
        assert_eq!(reply.source, ReplySource::Guarded);
    }

    #[tokio::test]
    async fn test_chat_substitutes_fallback_on_malformed_output() {
        // Arrange
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
            "I refuse to answer in JSON".to_owned(),
        )]));
        let pipeline = PromptPipeline::new(generator.clone());
        let flags = json!({});
        let state = PublicState::default();

        // Act
        let reply = pipeline.chat(&chat_request(&flags, &state, 2)).await;

        // Assert
        assert_eq!(reply.text, FALLBACK_REPLY);
        assert_eq!(reply.source, ReplySource::Fallback);
        assert_eq!(generator.requests().len(), 1);
        assert!(generator.requests()[0].prompt.contains("Time pressure: true"));
    }

    #[tokio::test]
    async fn test_chat_substitutes_fallback_on_backend_failure() {
        let pipeline = PromptPipeline::new(Arc::new(FailingGenerator));
        let flags = json!({});
        let state = PublicState::default();

        let reply = pipeline.chat(&chat_request(&flags, &state, 4)).await;

        assert_eq!(reply.text, FALLBACK_REPLY);
        assert_eq!(reply.source, ReplySource::Fallback);
    }

    #[tokio::test]
    async fn test_guard_fails_open_on_unparseable_output() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok("maybe?".to_owned())]));
        let pipeline = PromptPipeline::new(generator);

        assert!(!pipeline.guard("anything").await);
    }

    #[tokio::test]
    async fn test_guard_fails_open_on_backend_failure() {
        let pipeline = PromptPipeline::new(Arc::new(FailingGenerator));

        assert!(!pipeline.guard("anything").await);
    }

    #[tokio::test]
    async fn test_initialize_surfaces_parse_failure_as_upstream_error() {
        // Arrange
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
            "A story with no structured block".to_owned(),
        )]));
        let pipeline = PromptPipeline::new(generator);
        let tags = vec!["fog".to_owned()];

        // Act
        let result = pipeline
            .initialize(&InitRequest {
                worldview: "harbor",
                player_attribute: "inspector",
                difficulty: "Hard",
                suspect_count: 3,
                world_explain_needed: false,
                image_tags: &tags,
                image_keyword: "lighthouse",
            })
            .await;

        // Assert
        match result {
            Err(DomainError::Upstream(message)) => assert!(message.starts_with("init_parse")),
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_initialize_renders_request_variables() {
        // Arrange
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
            r#"Intro. {"truth_table": {"public_state_seed": {}}}"#.to_owned(),
        )]));
        let pipeline = PromptPipeline::new(generator.clone());
        let tags = vec!["fog".to_owned(), "pier".to_owned()];

        // Act
        let output = pipeline
            .initialize(&InitRequest {
                worldview: "harbor",
                player_attribute: "inspector",
                difficulty: "Hard",
                suspect_count: 3,
                world_explain_needed: true,
                image_tags: &tags,
                image_keyword: "lighthouse",
            })
            .await
            .unwrap();

        // Assert
        assert_eq!(output.intro_text, "Intro.");
        let prompt = &generator.requests()[0].prompt;
        assert!(prompt.contains("Number of suspects: 3"));
        assert!(prompt.contains(r#"["fog","pier"]"#));
        assert!(prompt.contains("Explain the world briefly before the case: true"));
    }

    #[tokio::test]
    async fn test_score_surfaces_backend_failure() {
        let pipeline = PromptPipeline::new(Arc::new(FailingGenerator));
        let truth = json!({"culprit": "Mara"});

        let result = pipeline
            .score(&ScoreRequest {
                truth_table: &truth,
                culprit: "Mara",
                logic_text: "The glove.",
            })
            .await;

        assert!(matches!(result, Err(DomainError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_score_parses_result() {
        // Arrange
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
            r#"{"score_total": 90, "breakdown": {"culprit": 50}, "grade": "S", "result_text": "Case closed."}"#
                .to_owned(),
        )]));
        let pipeline = PromptPipeline::new(generator.clone());
        let truth = json!({"culprit": "Mara"});

        // Act
        let output = pipeline
            .score(&ScoreRequest {
                truth_table: &truth,
                culprit: "Mara",
                logic_text: "The glove.",
            })
            .await
            .unwrap();

        // Assert
        assert_eq!(output.score_total, 90);
        assert_eq!(output.grade, "S");
        let prompt = &generator.requests()[0].prompt;
        assert!(prompt.contains(r#"{"culprit":"Mara","logic_text":"The glove."}"#));
    }
}
