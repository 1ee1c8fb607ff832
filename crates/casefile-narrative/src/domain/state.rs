//! Player-visible narrative state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The initial public state embedded in an initialization result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicStateSeed {
    /// Evidence the player can see from the start.
    #[serde(default)]
    pub visible_evidence: Vec<String>,
    /// Opening statement per character.
    #[serde(default)]
    pub initial_statements: BTreeMap<String, String>,
}

/// The only narrative state ever exposed to the player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicState {
    /// Evidence visible to the player.
    #[serde(default)]
    pub visible_evidence: Vec<String>,
    /// Opening statement per character.
    #[serde(default)]
    pub initial_statements: BTreeMap<String, String>,
    /// Evidence discovered during play.
    #[serde(default)]
    pub discoverables: Vec<String>,
}

impl From<PublicStateSeed> for PublicState {
    fn from(seed: PublicStateSeed) -> Self {
        Self {
            visible_evidence: seed.visible_evidence,
            initial_statements: seed.initial_statements,
            discoverables: Vec::new(),
        }
    }
}
