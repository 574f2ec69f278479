// Weekly league workflow: handicap refresh, point suggestions, finalization.
//
// Rules come from the engine in fairway-core; this module only gathers
// inputs from the store and writes results back.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use fairway_core::handicap::{compute_handicap_detail, HandicapComputation};
use fairway_core::leaderboard::{build_leaderboard, Leaderboard};
use fairway_core::model::{Matchup, MatchupSide, MatchupStatus, Team, TeamId, WeeklyScoreEntry};
use fairway_core::scoring::net::finishing_positions;
use fairway_core::scoring::points::{
    score_matchup, suggest_matchup_points, validate_matchup, PointSplit,
};
use fairway_core::MatchupError;
use fairway_store::{Database, PendingHandicap, WeekCommit};

use crate::config::League;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TeamHandicap {
    pub team: Team,
    pub computation: HandicapComputation,
}

/// Suggested points for one matchup, or why none can be given yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub matchup: Matchup,
    pub split: Result<PointSplit, MatchupError>,
}

#[derive(Debug, Clone)]
pub struct WeekSummary {
    pub week: u32,
    pub matchups: Vec<Matchup>,
    pub scores: Vec<WeeklyScoreEntry>,
    pub leaderboard: Leaderboard,
    /// Handicaps computed for the following week.
    pub next_handicaps: Vec<TeamHandicap>,
    /// How many of `next_handicaps` await approval.
    pub pending: usize,
}

// ---------------------------------------------------------------------------
// Handicaps
// ---------------------------------------------------------------------------

/// Every team's handicap for `week` from its stored history. Read-only.
pub fn preview_handicaps(db: &Database, league: &League, week: u32) -> Result<Vec<TeamHandicap>> {
    let teams = db.load_teams()?;
    let mut out = Vec::with_capacity(teams.len());
    for team in teams {
        let history = db.load_history(team.id)?;
        let computation = compute_handicap_detail(&history, &league.handicap, week);
        out.push(TeamHandicap { team, computation });
    }
    Ok(out)
}

/// Apply an admin-approved handicap to its team.
pub fn approve_handicap(db: &Database, team_id: TeamId, week: u32) -> Result<f64> {
    let value = db.approve_handicap(team_id, week)?;
    info!("Approved handicap {value} for team {team_id} (week {week})");
    Ok(value)
}

// ---------------------------------------------------------------------------
// Matchups
// ---------------------------------------------------------------------------

/// Schedule a new matchup between two existing teams.
pub fn schedule_matchup(db: &Database, week: u32, team_a: TeamId, team_b: TeamId) -> Result<Matchup> {
    ensure_open(db, week)?;
    let matchup = Matchup::scheduled(db.next_matchup_id()?, week, team_a, team_b);
    db.upsert_matchup(&matchup)?;
    info!("Scheduled matchup {} for week {week}: {team_a} vs {team_b}", matchup.id);
    Ok(matchup)
}

/// Admin override of a matchup's points. Rejected unless the total holds.
pub fn set_matchup_points(db: &Database, matchup_id: i64, points_a: u32, points_b: u32) -> Result<Matchup> {
    let mut matchup = load_open_matchup(db, matchup_id)?;
    matchup.team_a.points = Some(points_a);
    matchup.team_b.points = Some(points_b);
    validate_matchup(&matchup).context("override rejected")?;
    db.upsert_matchup(&matchup)?;
    info!("Matchup {matchup_id} points set to {points_a}-{points_b}");
    Ok(matchup)
}

pub fn record_forfeit(db: &Database, matchup_id: i64, forfeiting: TeamId) -> Result<Matchup> {
    let mut matchup = load_open_matchup(db, matchup_id)?;
    matchup.forfeit = Some(forfeiting);
    matchup.team_a.points = None;
    matchup.team_b.points = None;
    validate_matchup(&matchup).context("forfeit rejected")?;
    db.upsert_matchup(&matchup)?;
    info!("Matchup {matchup_id}: team {forfeiting} forfeits");
    Ok(matchup)
}

fn load_open_matchup(db: &Database, matchup_id: i64) -> Result<Matchup> {
    let matchup = db
        .load_matchup(matchup_id)?
        .with_context(|| format!("matchup {matchup_id} does not exist"))?;
    ensure_open(db, matchup.week)?;
    Ok(matchup)
}

fn ensure_open(db: &Database, week: u32) -> Result<()> {
    if db.is_week_finalized(week)? {
        bail!("week {week} is finalized");
    }
    Ok(())
}

/// Copy a team's recorded round into an unscored matchup side.
fn fill_side(side: &mut MatchupSide, scores: &HashMap<TeamId, &WeeklyScoreEntry>) {
    if side.gross.is_some() {
        return;
    }
    if let Some(entry) = scores.get(&side.team_id).filter(|e| !e.is_dnp) {
        side.gross = Some(entry.gross);
        side.handicap = Some(entry.handicap_used);
        side.is_sub = entry.is_sub;
    }
}

fn fill_from_scores(matchup: &Matchup, scores: &[WeeklyScoreEntry]) -> Matchup {
    let by_team: HashMap<TeamId, &WeeklyScoreEntry> =
        scores.iter().map(|e| (e.team_id, e)).collect();
    let mut filled = matchup.clone();
    fill_side(&mut filled.team_a, &by_team);
    fill_side(&mut filled.team_b, &by_team);
    filled
}

/// Suggested points for each matchup in `week`, using recorded scores.
pub fn suggest_week(db: &Database, league: &League, week: u32) -> Result<Vec<Suggestion>> {
    let scores = db.load_week_scores(week)?;
    let suggestions = db
        .load_week_matchups(week)?
        .iter()
        .filter(|m| m.status != MatchupStatus::Excluded)
        .map(|m| {
            let matchup = fill_from_scores(m, &scores);
            let split = suggest_matchup_points(&matchup, &league.points);
            Suggestion { matchup, split }
        })
        .collect();
    Ok(suggestions)
}

/// Final state of one matchup. Admin-entered points are kept once they pass
/// validation; otherwise the suggested split is applied.
fn settle_matchup(matchup: &Matchup, league: &League) -> Result<Matchup, MatchupError> {
    if matchup.status == MatchupStatus::Excluded {
        return Ok(matchup.clone());
    }
    let admin_points = matchup.team_a.points.is_some() && matchup.team_b.points.is_some();
    if admin_points && matchup.forfeit.is_none() {
        let mut settled = matchup.clone();
        settled.status = MatchupStatus::Completed;
        validate_matchup(&settled)?;
        return Ok(settled);
    }
    score_matchup(matchup, &league.points)
}

// ---------------------------------------------------------------------------
// Finalization
// ---------------------------------------------------------------------------

/// Close out `week`: settle matchups, assign finishing positions and points,
/// compute next week's handicaps, rank the leaderboard, and commit it all at
/// once.
pub fn finalize_week(db: &Database, league: &League, week: u32) -> Result<WeekSummary> {
    ensure_open(db, week)?;

    let teams = db.load_teams()?;
    let mut scores = db.load_week_scores(week)?;
    for team in &teams {
        if !scores.iter().any(|e| e.team_id == team.id) {
            debug!("team {} has no round in week {week}, recording DNP", team.id);
            scores.push(WeeklyScoreEntry::did_not_play(team.id, week));
        }
    }

    let mut matchups = Vec::new();
    for matchup in db.load_week_matchups(week)? {
        let filled = fill_from_scores(&matchup, &scores);
        let settled = settle_matchup(&filled, league)
            .with_context(|| format!("cannot finalize week {week}"))?;
        matchups.push(settled);
    }

    let positions: HashMap<TeamId, u32> = finishing_positions(&scores).into_iter().collect();
    for entry in &mut scores {
        entry.position = positions.get(&entry.team_id).copied();
        entry.points = points_earned(entry.team_id, &matchups);
    }

    // Next week's handicaps see this week's rounds.
    let mut next_handicaps = Vec::with_capacity(teams.len());
    let mut updated_teams = Vec::with_capacity(teams.len());
    for team in &teams {
        let mut history: Vec<WeeklyScoreEntry> = db
            .load_history(team.id)?
            .into_iter()
            .filter(|e| e.week != week)
            .collect();
        history.extend(scores.iter().filter(|e| e.team_id == team.id).cloned());
        history.sort_by_key(|e| e.week);

        let computation = compute_handicap_detail(&history, &league.handicap, week + 1);
        let mut updated = team.clone();
        if !computation.requires_approval {
            updated.handicap = computation.value;
        }
        updated_teams.push(updated);
        next_handicaps.push(TeamHandicap {
            team: team.clone(),
            computation,
        });
    }

    let season: Vec<Matchup> = db
        .load_matchups(week)?
        .into_iter()
        .filter(|m| m.week != week)
        .chain(matchups.iter().cloned())
        .collect();
    let previous = db.load_previous_snapshot(week)?;
    let leaderboard = build_leaderboard(week, &season, &updated_teams, previous.as_ref());

    let held: Vec<PendingHandicap> = next_handicaps
        .iter()
        .filter(|th| th.computation.requires_approval)
        .map(|th| PendingHandicap::from_computation(th.team.id, week + 1, &th.computation))
        .collect();
    let pending = held.len();

    db.commit_week(&WeekCommit {
        week,
        scores: scores.clone(),
        matchups: matchups.clone(),
        snapshot: leaderboard.snapshot(),
        teams: leaderboard.apply_to_teams(&updated_teams),
        pending: held,
    })?;

    if pending > 0 {
        warn!("{pending} handicaps for week {} await approval", week + 1);
    }

    info!(
        "Finalized week {week}: {} matchups, {} scores, leader {:?}",
        matchups.len(),
        scores.len(),
        leaderboard.standings.first().map(|s| s.team_id)
    );

    Ok(WeekSummary {
        week,
        matchups,
        scores,
        leaderboard,
        next_handicaps,
        pending,
    })
}

fn points_earned(team_id: TeamId, matchups: &[Matchup]) -> u32 {
    matchups
        .iter()
        .filter(|m| m.status == MatchupStatus::Completed)
        .filter_map(|m| {
            if m.team_a.team_id == team_id {
                m.team_a.points
            } else if m.team_b.team_id == team_id {
                m.team_b.points
            } else {
                None
            }
        })
        .fold(0, u32::saturating_add)
}

/// Leaderboard as of `week`, rebuilt from stored matchups.
pub fn leaderboard_for(db: &Database, week: u32) -> Result<Leaderboard> {
    let teams = db.load_teams()?;
    let matchups = db.load_matchups(week)?;
    let previous = db.load_previous_snapshot(week)?;
    Ok(build_leaderboard(week, &matchups, &teams, previous.as_ref()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
