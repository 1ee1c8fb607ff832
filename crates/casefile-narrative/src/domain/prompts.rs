//! Versioned prompt templates and `{{variable}}` rendering.

use std::borrow::Cow;
use std::sync::LazyLock;

use casefile_core::generation::GenerationRole;
use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("static pattern compiles"));

/// A versioned prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Template version identifier, persisted on sessions.
    pub version: &'static str,
    /// The role this template is used for.
    pub role: GenerationRole,
    body: &'static str,
}

/// World initialization template.
pub const INIT_V1: PromptTemplate = PromptTemplate {
    version: "init_v1",
    role: GenerationRole::Initialize,
    body: include_str!("../../prompts/init_v1.md"),
};

/// Chat turn template.
pub const CHAT_V1: PromptTemplate = PromptTemplate {
    version: "chat_v1",
    role: GenerationRole::Chat,
    body: include_str!("../../prompts/chat_v1.md"),
};

/// Guard classification template.
pub const GUARD_V1: PromptTemplate = PromptTemplate {
    version: "guard_v1",
    role: GenerationRole::Guard,
    body: include_str!("../../prompts/guard_v1.md"),
};

/// Scoring template.
pub const SCORE_V1: PromptTemplate = PromptTemplate {
    version: "score_v1",
    role: GenerationRole::Score,
    body: include_str!("../../prompts/score_v1.md"),
};

impl PromptTemplate {
    /// Substitutes every `{{name}}` occurrence with its value in one pass
    /// over the template. Substituted values are never scanned again.
    ///
    /// Placeholders without a matching variable are left untouched.
    #[must_use]
    pub fn render(&self, variables: &[(&str, String)]) -> String {
        render(self.body, variables)
    }
}

fn render(template: &str, variables: &[(&str, String)]) -> String {
    let rendered: Cow<'_, str> = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        variables
            .iter()
            .find(|(name, _)| *name == &caps[1])
            .map_or_else(|| caps[0].to_owned(), |(_, value)| value.clone())
    });
    rendered.into_owned()
}
