//! External generation backend abstractions.

use std::fmt;

use async_trait::async_trait;

use crate::error::DomainError;

/// The role a generation call plays in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationRole {
    /// Build the world, hidden truth, and intro text for a new session.
    Initialize,
    /// Produce the narrator's reply to a player turn.
    Chat,
    /// Classify a candidate reply for rule violations.
    Guard,
    /// Score a submission against the hidden truth.
    Score,
}

impl GenerationRole {
    /// Returns the stable name of this role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Chat => "chat",
            Self::Guard => "guard",
            Self::Score => "score",
        }
    }
}

impl fmt::Display for GenerationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully rendered prompt ready to send to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Role of the call; backends use it to pick a model.
    pub role: GenerationRole,
    /// Template version the prompt was rendered from.
    pub prompt_version: &'static str,
    /// The rendered prompt text.
    pub prompt: String,
}

/// A text-generation backend.
///
/// Implementations return the raw completion text. Whether that text is
/// well-formed is decided by the caller.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the request.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, DomainError>;
}

/// An opaque binary artifact produced by an external collaborator.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Raw content.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub content_type: String,
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("bytes", &format_args!("[{} bytes]", self.bytes.len()))
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Produces an intro image from tag and keyword hints.
#[async_trait]
pub trait ArtifactProducer: Send + Sync {
    /// Produce an image for the given hints.
    async fn produce(&self, tags: &[String], keyword: &str) -> Result<Artifact, DomainError>;
}
