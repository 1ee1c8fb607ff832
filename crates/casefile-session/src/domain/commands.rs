//! Commands for the Session & Turn context.

use casefile_core::command::Command;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::difficulty::Difficulty;

/// Command to open a new session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The requesting user.
    pub user_id: Uuid,
    /// Worldview text.
    pub worldview: String,
    /// Player attribute text.
    pub attribute: String,
    /// Chosen difficulty.
    pub difficulty: Difficulty,
    /// Image tags chosen by the player.
    pub image_tags: Vec<String>,
    /// Optional image keyword; sanitized before use.
    pub image_keyword: Option<String>,
}

impl Command for CreateSession {
    fn command_type(&self) -> &'static str {
        "session.create"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// How the player phrased a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnMode {
    /// Free text.
    #[default]
    Free,
    /// A suggested choice.
    Choice,
}

/// Command to take one turn.
#[derive(Debug, Clone)]
pub struct TakeTurn {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The requesting user.
    pub user_id: Uuid,
    /// The session.
    pub session_id: Uuid,
    /// How the input was phrased.
    pub mode: TurnMode,
    /// The player's input; absent is treated as empty.
    pub input_text: Option<String>,
}

impl Command for TakeTurn {
    fn command_type(&self) -> &'static str {
        "session.take_turn"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to submit a final answer.
#[derive(Debug, Clone)]
pub struct SubmitSolution {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The requesting user.
    pub user_id: Uuid,
    /// The session.
    pub session_id: Uuid,
    /// Accused party.
    pub culprit: String,
    /// Free-form justification.
    pub logic_text: String,
}

impl Command for SubmitSolution {
    fn command_type(&self) -> &'static str {
        "session.submit_solution"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to score a submitted session.
#[derive(Debug, Clone)]
pub struct ScoreSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The requesting user.
    pub user_id: Uuid,
    /// The session.
    pub session_id: Uuid,
}

impl Command for ScoreSession {
    fn command_type(&self) -> &'static str {
        "session.score"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
