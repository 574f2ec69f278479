// Error types for the engine's validation boundaries.

use thiserror::Error;

use crate::model::TeamId;

/// A league setting that violates a cross-field invariant. Raised when
/// settings are saved or loaded, never while computing a handicap.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("invalid setting `{field}`: {message}")]
    Invalid { field: String, message: String },

    #[error("setting `{field}` is required when {required_by}")]
    Missing { field: String, required_by: String },

    #[error("unknown value `{value}` for setting `{field}`")]
    UnknownValue { field: String, value: String },
}

impl SettingsError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        SettingsError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn missing(field: &str, required_by: &str) -> Self {
        SettingsError::Missing {
            field: field.to_string(),
            required_by: required_by.to_string(),
        }
    }

    /// Name of the offending setting.
    pub fn field(&self) -> &str {
        match self {
            SettingsError::Invalid { field, .. }
            | SettingsError::Missing { field, .. }
            | SettingsError::UnknownValue { field, .. } => field,
        }
    }
}

/// A matchup rejected on a write path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchupError {
    #[error("matchup {matchup_id}: points {points_a} + {points_b} must total {expected}")]
    PointsTotal {
        matchup_id: i64,
        points_a: u32,
        points_b: u32,
        expected: u32,
    },

    #[error("matchup {matchup_id}: completed matchup is missing points")]
    MissingPoints { matchup_id: i64 },

    #[error("matchup {matchup_id}: forfeiting team {team_id} is not in this matchup")]
    ForfeitTeamNotInMatchup { matchup_id: i64, team_id: TeamId },

    #[error("matchup {matchup_id}: forfeit must award {expected} points to team {winner} and 0 to team {forfeiting}")]
    ForfeitPoints {
        matchup_id: i64,
        winner: TeamId,
        forfeiting: TeamId,
        expected: u32,
    },

    #[error("matchup {matchup_id}: team {team_id} cannot play itself")]
    SameTeam { matchup_id: i64, team_id: TeamId },

    #[error("matchup {matchup_id}: team {team_id} has no gross score to compare")]
    MissingScore { matchup_id: i64, team_id: TeamId },
}

/// A scorecard that does not match the holes in play for its week.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScorecardError {
    #[error("hole {hole} is not in play this week")]
    HoleNotInPlay { hole: u8 },

    #[error("hole {hole} was entered more than once")]
    DuplicateHole { hole: u8 },

    #[error("hole {hole} has no strokes recorded")]
    ZeroStrokes { hole: u8 },

    #[error("hole {hole}: stroke total is too large")]
    StrokesOverflow { hole: u8 },

    #[error("scorecard has {found} holes, expected {expected}")]
    Incomplete { expected: usize, found: usize },
}
