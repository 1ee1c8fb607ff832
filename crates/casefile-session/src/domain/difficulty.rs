//! Difficulty levels and the per-session budget they imply.

use std::fmt;
use std::str::FromStr;

use casefile_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Difficulty chosen at session creation. Fixes the turn budget and the
/// number of suspects for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    /// One suspect, ten turns.
    Easy,
    /// Two suspects, ten turns.
    Normal,
    /// Three suspects, fifteen turns.
    Hard,
    /// Four suspects, twenty turns.
    Expert,
}

impl Difficulty {
    /// Maximum number of accepted turns.
    #[must_use]
    pub fn turn_limit(self) -> i32 {
        match self {
            Self::Easy | Self::Normal => 10,
            Self::Hard => 15,
            Self::Expert => 20,
        }
    }

    /// Number of suspects the generated case contains.
    #[must_use]
    pub fn suspect_count(self) -> u32 {
        match self {
            Self::Easy => 1,
            Self::Normal => 2,
            Self::Hard => 3,
            Self::Expert => 4,
        }
    }

    /// Stable name, as stored and as sent to prompts.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Normal => "Normal",
            Self::Hard => "Hard",
            Self::Expert => "Expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Easy" => Ok(Self::Easy),
            "Normal" => Ok(Self::Normal),
            "Hard" => Ok(Self::Hard),
            "Expert" => Ok(Self::Expert),
            other => Err(DomainError::Validation(format!(
                "unknown difficulty: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_per_difficulty() {
        let budgets: Vec<(i32, u32)> = [
            Difficulty::Easy,
            Difficulty::Normal,
            Difficulty::Hard,
            Difficulty::Expert,
        ]
        .into_iter()
        .map(|d| (d.turn_limit(), d.suspect_count()))
        .collect();

        assert_eq!(budgets, vec![(10, 1), (10, 2), (15, 3), (20, 4)]);
    }

    #[test]
    fn test_from_str_round_trips_display() {
        for difficulty in [Difficulty::Easy, Difficulty::Expert] {
            assert_eq!(difficulty.to_string().parse::<Difficulty>().unwrap(), difficulty);
        }
    }

    #[test]
    fn test_from_str_rejects_unknown_name() {
        assert!(matches!(
            "Nightmare".parse::<Difficulty>(),
            Err(DomainError::Validation(_))
        ));
    }
}
