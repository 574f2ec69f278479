// League data model shared by every engine component.

use serde::{Deserialize, Serialize};

pub type TeamId = i64;

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// A league team with its cached handicap and season totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub handicap: f64,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub points: u32,
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>, handicap: f64) -> Self {
        Self {
            id,
            name: name.into(),
            handicap,
            wins: 0,
            losses: 0,
            ties: 0,
            points: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Weekly score entries
// ---------------------------------------------------------------------------

/// One team's result for one week. Read by the handicap engine as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyScoreEntry {
    pub team_id: TeamId,
    pub week: u32,
    pub gross: u32,
    pub handicap_used: f64,
    pub net: f64,
    pub position: Option<u32>,
    pub points: u32,
    #[serde(default)]
    pub is_sub: bool,
    #[serde(default)]
    pub is_dnp: bool,
}

impl WeeklyScoreEntry {
    /// Build a played entry, deriving the net score from gross and handicap.
    pub fn played(team_id: TeamId, week: u32, gross: u32, handicap_used: f64) -> Self {
        Self {
            team_id,
            week,
            gross,
            handicap_used,
            net: crate::scoring::net::net_score(gross, handicap_used),
            position: None,
            points: 0,
            is_sub: false,
            is_dnp: false,
        }
    }

    /// Build a did-not-play placeholder for a week.
    pub fn did_not_play(team_id: TeamId, week: u32) -> Self {
        Self {
            team_id,
            week,
            gross: 0,
            handicap_used: 0.0,
            net: 0.0,
            position: None,
            points: 0,
            is_sub: false,
            is_dnp: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Matchups
// ---------------------------------------------------------------------------

/// Lifecycle of a scheduled pairing. Only completed matchups count toward
/// the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchupStatus {
    Scheduled,
    Completed,
    Excluded,
}

impl MatchupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchupStatus::Scheduled => "scheduled",
            MatchupStatus::Completed => "completed",
            MatchupStatus::Excluded => "excluded",
        }
    }

    pub fn from_str_status(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(MatchupStatus::Scheduled),
            "completed" => Some(MatchupStatus::Completed),
            "excluded" => Some(MatchupStatus::Excluded),
            _ => None,
        }
    }
}

/// One team's half of a matchup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchupSide {
    pub team_id: TeamId,
    pub gross: Option<u32>,
    pub handicap: Option<f64>,
    pub net: Option<f64>,
    pub points: Option<u32>,
    #[serde(default)]
    pub is_sub: bool,
}

impl MatchupSide {
    pub fn new(team_id: TeamId) -> Self {
        Self {
            team_id,
            gross: None,
            handicap: None,
            net: None,
            points: None,
            is_sub: false,
        }
    }
}

/// A pairing of two teams for a week.
///
/// `forfeit` holds the id of the forfeiting team; `None` means the matchup
/// was played and is scored by net comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub id: i64,
    pub week: u32,
    pub team_a: MatchupSide,
    pub team_b: MatchupSide,
    pub forfeit: Option<TeamId>,
    pub status: MatchupStatus,
}

impl Matchup {
    pub fn scheduled(id: i64, week: u32, team_a: TeamId, team_b: TeamId) -> Self {
        Self {
            id,
            week,
            team_a: MatchupSide::new(team_a),
            team_b: MatchupSide::new(team_b),
            forfeit: None,
            status: MatchupStatus::Scheduled,
        }
    }

    pub fn is_forfeit(&self) -> bool {
        self.forfeit.is_some()
    }

    pub fn involves(&self, team_id: TeamId) -> bool {
        self.team_a.team_id == team_id || self.team_b.team_id == team_id
    }
}

// ---------------------------------------------------------------------------
// Leaderboard snapshots
// ---------------------------------------------------------------------------

/// A team's rank and handicap at the end of a week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub team_id: TeamId,
    pub rank: u32,
    pub handicap: f64,
}

/// Retained leaderboard state for one finalized week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub week: u32,
    pub entries: Vec<SnapshotEntry>,
}

impl LeaderboardSnapshot {
    pub fn entry_for(&self, team_id: TeamId) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.team_id == team_id)
    }
}
