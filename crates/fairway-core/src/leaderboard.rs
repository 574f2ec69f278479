// Season leaderboard: totals, ranking, and week-over-week movement.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{LeaderboardSnapshot, Matchup, MatchupStatus, SnapshotEntry, Team, TeamId};

/// Change relative to the previous week's snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Positive means the team moved up.
    pub rank_change: i64,
    /// Positive means the handicap dropped.
    pub handicap_change: f64,
}

/// One team's row on the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub team_id: TeamId,
    pub rank: u32,
    pub points: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub rounds_played: u32,
    pub handicap: f64,
    /// `None` when the team has no entry in the previous snapshot.
    pub movement: Option<Movement>,
}

impl Standing {
    fn empty(team_id: TeamId, handicap: f64) -> Self {
        Self {
            team_id,
            rank: 0,
            points: 0,
            wins: 0,
            losses: 0,
            ties: 0,
            rounds_played: 0,
            handicap,
            movement: None,
        }
    }

    /// `W-L-T` record string.
    pub fn record(&self) -> String {
        format!("{}-{}-{}", self.wins, self.losses, self.ties)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub week: u32,
    pub standings: Vec<Standing>,
}

impl Leaderboard {
    pub fn standing_for(&self, team_id: TeamId) -> Option<&Standing> {
        self.standings.iter().find(|s| s.team_id == team_id)
    }

    /// Snapshot to retain for next week's movement.
    pub fn snapshot(&self) -> LeaderboardSnapshot {
        LeaderboardSnapshot {
            week: self.week,
            entries: self
                .standings
                .iter()
                .map(|s| SnapshotEntry {
                    team_id: s.team_id,
                    rank: s.rank,
                    handicap: s.handicap,
                })
                .collect(),
        }
    }

    /// Copies of `teams` with season totals taken from this leaderboard.
    /// Teams missing from the leaderboard are returned unchanged.
    pub fn apply_to_teams(&self, teams: &[Team]) -> Vec<Team> {
        teams
            .iter()
            .map(|team| match self.standing_for(team.id) {
                Some(s) => Team {
                    wins: s.wins,
                    losses: s.losses,
                    ties: s.ties,
                    points: s.points,
                    ..team.clone()
                },
                None => team.clone(),
            })
            .collect()
    }
}

/// Leaderboard ordering: points desc, wins desc, team id asc.
pub fn compare_standings(a: &Standing, b: &Standing) -> Ordering {
    b.points
        .cmp(&a.points)
        .then(b.wins.cmp(&a.wins))
        .then(a.team_id.cmp(&b.team_id))
}

/// Fold every completed matchup up to and including `week` into a ranked
/// leaderboard.
///
/// `teams` supplies current handicaps and ensures teams without results
/// still appear. `previous` is the snapshot from the prior finalized week.
pub fn build_leaderboard(
    week: u32,
    matchups: &[Matchup],
    teams: &[Team],
    previous: Option<&LeaderboardSnapshot>,
) -> Leaderboard {
    let mut table: BTreeMap<TeamId, Standing> = teams
        .iter()
        .map(|t| (t.id, Standing::empty(t.id, t.handicap)))
        .collect();

    for matchup in matchups
        .iter()
        .filter(|m| m.status == MatchupStatus::Completed && m.week <= week)
    {
        let (Some(pa), Some(pb)) = (matchup.team_a.points, matchup.team_b.points) else {
            warn!("completed matchup {} has no points, skipping", matchup.id);
            continue;
        };
        record_result(&mut table, matchup.team_a.team_id, pa, pb);
        record_result(&mut table, matchup.team_b.team_id, pb, pa);
    }

    let mut standings: Vec<Standing> = table.into_values().collect();
    standings.sort_by(compare_standings);

    for (idx, standing) in standings.iter_mut().enumerate() {
        standing.rank = idx as u32 + 1;
        standing.movement = previous
            .and_then(|snap| snap.entry_for(standing.team_id))
            .map(|prev| Movement {
                rank_change: i64::from(prev.rank) - i64::from(standing.rank),
                handicap_change: prev.handicap - standing.handicap,
            });
    }

    Leaderboard { week, standings }
}

fn record_result(table: &mut BTreeMap<TeamId, Standing>, team_id: TeamId, own: u32, opponent: u32) {
    let standing = table.entry(team_id).or_insert_with(|| {
        warn!("team {team_id} appears in matchups but not in the team list");
        Standing::empty(team_id, 0.0)
    });
    standing.points = standing.points.saturating_add(own);
    match own.cmp(&opponent) {
        Ordering::Greater => standing.wins += 1,
        Ordering::Less => standing.losses += 1,
        Ordering::Equal => standing.ties += 1,
    }
    standing.rounds_played = standing.wins + standing.losses + standing.ties;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
