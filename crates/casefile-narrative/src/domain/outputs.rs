//! Strict parsing of generation output, one typed result per role.
//!
//! Each parser either returns a fully validated value or a [`ParseError`];
//! there are no partially filled results.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::PublicStateSeed;

/// Why a completion could not be turned into a typed result.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The text contains no balanced `{...}` region.
    #[error("no JSON object found in output")]
    NoJsonBlock,

    /// The extracted region is not valid JSON of the expected shape.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A required field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// The reply text is empty.
    #[error("reply text is empty")]
    EmptyReply,
}

/// Locates the first balanced `{...}` region of `text`.
///
/// Braces inside JSON string literals are ignored. Returns the byte range of
/// the region, or `None` if no region closes.
#[must_use]
pub fn find_json_block(text: &str) -> Option<(usize, usize)> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + offset + 1));
                }
            }
            _ => {}
        }
    }
    None
}

fn json_block(text: &str) -> Result<&str, ParseError> {
    let (start, end) = find_json_block(text).ok_or(ParseError::NoJsonBlock)?;
    Ok(&text[start..end])
}

/// Image generation hints suggested by the initialization call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageHints {
    /// Suggested single keyword.
    #[serde(default)]
    pub keyword_suggested: Option<String>,
    /// Suggested tag list.
    #[serde(default)]
    pub tags_suggested: Vec<String>,
}

/// Parsed result of the initialization role.
#[derive(Debug, Clone, PartialEq)]
pub struct InitOutput {
    /// Narrative introduction shown to the player.
    pub intro_text: String,
    /// Hidden ground truth, stored verbatim.
    pub truth_table: serde_json::Value,
    /// Initial public state.
    pub public_state_seed: PublicStateSeed,
    /// Image hints, if the backend supplied any.
    pub image_hints: ImageHints,
}

#[derive(Deserialize)]
struct InitPayload {
    truth_table: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    image_hints: Option<ImageHints>,
}

impl InitOutput {
    /// Parses intro text plus embedded JSON block.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if no block exists, it is not valid JSON, or it
    /// lacks `truth_table.public_state_seed`.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let (start, end) = find_json_block(text).ok_or(ParseError::NoJsonBlock)?;
        let payload: InitPayload = serde_json::from_str(&text[start..end])?;
        let seed = payload
            .truth_table
            .get("public_state_seed")
            .cloned()
            .ok_or(ParseError::MissingField("truth_table.public_state_seed"))?;
        let public_state_seed: PublicStateSeed = serde_json::from_value(seed)?;
        let intro_text = format!("{}{}", &text[..start], &text[end..])
            .trim()
            .to_owned();

        Ok(Self {
            intro_text,
            truth_table: serde_json::Value::Object(payload.truth_table),
            public_state_seed,
            image_hints: payload.image_hints.unwrap_or_default(),
        })
    }
}

/// Parsed result of the chat role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatOutput {
    /// The narrator's reply.
    pub reply_text: String,
}

impl ChatOutput {
    /// Parses a chat completion.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if no block exists, it lacks `reply_text`, or
    /// the reply is blank.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let output: Self = serde_json::from_str(json_block(text)?)?;
        if output.reply_text.trim().is_empty() {
            return Err(ParseError::EmptyReply);
        }
        Ok(output)
    }
}

/// Parsed result of the guard role.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GuardOutput {
    /// Reported rule violations; empty when the reply is clean.
    pub violations: Vec<serde_json::Value>,
}

impl GuardOutput {
    /// Parses a guard completion.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if no block exists or it lacks `violations`.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(json_block(text)?)?)
    }

    /// Whether any violation was reported.
    #[must_use]
    pub fn is_violation(&self) -> bool {
        !self.violations.is_empty()
    }
}

/// Parsed result of the score role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutput {
    /// Total score.
    pub score_total: i32,
    /// Per-criterion breakdown.
    pub breakdown: serde_json::Value,
    /// Letter grade.
    pub grade: String,
    /// Narrative epilogue.
    pub result_text: String,
}

impl ScoreOutput {
    /// Parses a score completion.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if no block exists or any field is absent or of
    /// the wrong type.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let output: Self = serde_json::from_str(json_block(text)?)?;
        if output.breakdown.is_null() {
            return Err(ParseError::MissingField("breakdown"));
        }
        Ok(output)
    }
}
