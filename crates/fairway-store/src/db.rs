// SQLite persistence layer for teams, scores, matchups, and snapshots.

use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{info, warn};

use fairway_core::handicap::{HandicapBasis, HandicapComputation, HandicapSettings, HandicapSettingsRecord};
use fairway_core::model::{
    LeaderboardSnapshot, Matchup, MatchupSide, MatchupStatus, SnapshotEntry, Team, TeamId,
    WeeklyScoreEntry,
};
use fairway_core::scoring::points::{validate_matchup, PointsRule};

/// Everything produced by finalizing one week, written atomically.
#[derive(Debug, Clone)]
pub struct WeekCommit {
    pub week: u32,
    pub scores: Vec<WeeklyScoreEntry>,
    pub matchups: Vec<Matchup>,
    pub snapshot: LeaderboardSnapshot,
    pub teams: Vec<Team>,
    /// Next week's handicaps held for approval.
    pub pending: Vec<PendingHandicap>,
}

/// A computed handicap waiting for admin approval.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingHandicap {
    pub team_id: TeamId,
    pub week: u32,
    pub value: f64,
    pub basis: HandicapBasis,
}

impl PendingHandicap {
    pub fn from_computation(team_id: TeamId, week: u32, computation: &HandicapComputation) -> Self {
        Self {
            team_id,
            week,
            value: computation.value,
            basis: computation.basis,
        }
    }
}

/// SQLite-backed persistence for the league. The engine never touches this
/// directly; the application reads inputs from here and writes results back.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS teams (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                name     TEXT NOT NULL UNIQUE,
                handicap REAL NOT NULL DEFAULT 0,
                wins     INTEGER NOT NULL DEFAULT 0,
                losses   INTEGER NOT NULL DEFAULT 0,
                ties     INTEGER NOT NULL DEFAULT 0,
                points   INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS weekly_scores (
                team_id       INTEGER NOT NULL REFERENCES teams(id),
                week          INTEGER NOT NULL,
                gross         INTEGER NOT NULL,
                handicap_used REAL NOT NULL,
                net           REAL NOT NULL,
                position      INTEGER,
                points        INTEGER NOT NULL DEFAULT 0,
                is_sub        INTEGER NOT NULL DEFAULT 0,
                is_dnp        INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (team_id, week)
            );

            CREATE TABLE IF NOT EXISTS matchups (
                id              INTEGER PRIMARY KEY,
                week            INTEGER NOT NULL,
                team_a_id       INTEGER NOT NULL REFERENCES teams(id),
                team_a_gross    INTEGER,
                team_a_handicap REAL,
                team_a_net      REAL,
                team_a_points   INTEGER,
                team_a_is_sub   INTEGER NOT NULL DEFAULT 0,
                team_b_id       INTEGER NOT NULL REFERENCES teams(id),
                team_b_gross    INTEGER,
                team_b_handicap REAL,
                team_b_net      REAL,
                team_b_points   INTEGER,
                team_b_is_sub   INTEGER NOT NULL DEFAULT 0,
                is_forfeit      INTEGER NOT NULL DEFAULT 0,
                forfeit_team_id INTEGER REFERENCES teams(id),
                status          TEXT NOT NULL DEFAULT 'scheduled'
            );

            CREATE TABLE IF NOT EXISTS leaderboard_snapshots (
                week       INTEGER NOT NULL,
                team_id    INTEGER NOT NULL REFERENCES teams(id),
                rank       INTEGER NOT NULL,
                handicap   REAL NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (week, team_id)
            );

            CREATE TABLE IF NOT EXISTS pending_handicaps (
                team_id     INTEGER NOT NULL REFERENCES teams(id),
                week        INTEGER NOT NULL,
                value       REAL NOT NULL,
                basis       TEXT NOT NULL,
                computed_at TEXT NOT NULL,
                PRIMARY KEY (team_id, week)
            );

            CREATE TABLE IF NOT EXISTS finalized_weeks (
                week         INTEGER PRIMARY KEY,
                finalized_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS league_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_matchups_week ON matchups(week);
            CREATE INDEX IF NOT EXISTS idx_weekly_scores_week ON weekly_scores(week);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    /// Insert a team by name, or refresh its handicap if the name exists.
    /// Returns the team's row id.
    pub fn upsert_team(&self, name: &str, handicap: f64) -> Result<TeamId> {
        let conn = self.conn();
        let id: TeamId = conn
            .query_row(
                "INSERT INTO teams (name, handicap) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET handicap = excluded.handicap
                 RETURNING id",
                params![name, handicap],
                |row| row.get(0),
            )
            .context("failed to upsert team")?;
        Ok(id)
    }

    /// All teams ordered by id.
    pub fn load_teams(&self) -> Result<Vec<Team>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, handicap, wins, losses, ties, points FROM teams ORDER BY id",
            )
            .context("failed to prepare load_teams query")?;
        let teams = stmt
            .query_map([], team_from_row)
            .context("failed to query teams")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team rows")?;
        Ok(teams)
    }

    pub fn find_team_by_name(&self, name: &str) -> Result<Option<Team>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, handicap, wins, losses, ties, points FROM teams WHERE name = ?1",
            params![name],
            team_from_row,
        )
        .optional()
        .context("failed to look up team by name")
    }

    // ------------------------------------------------------------------
    // Weekly scores
    // ------------------------------------------------------------------

    /// Record or replace one team's entry for a week. Entries for finalized
    /// weeks are immutable.
    pub fn record_score(&self, entry: &WeeklyScoreEntry) -> Result<()> {
        let conn = self.conn();
        if week_finalized(&conn, entry.week)? {
            bail!("week {} is finalized; scores can no longer change", entry.week);
        }
        insert_score(&conn, entry)
    }

    /// A team's full history, oldest week first.
    pub fn load_history(&self, team_id: TeamId) -> Result<Vec<WeeklyScoreEntry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, week, gross, handicap_used, net, position, points, is_sub, is_dnp
                 FROM weekly_scores WHERE team_id = ?1 ORDER BY week",
            )
            .context("failed to prepare load_history query")?;
        let entries = stmt
            .query_map(params![team_id], score_from_row)
            .context("failed to query history")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map score rows")?;
        Ok(entries)
    }

    /// Every team's entry for one week, ordered by team id.
    pub fn load_week_scores(&self, week: u32) -> Result<Vec<WeeklyScoreEntry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, week, gross, handicap_used, net, position, points, is_sub, is_dnp
                 FROM weekly_scores WHERE week = ?1 ORDER BY team_id",
            )
            .context("failed to prepare load_week_scores query")?;
        let entries = stmt
            .query_map(params![week], score_from_row)
            .context("failed to query week scores")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map score rows")?;
        Ok(entries)
    }

    // ------------------------------------------------------------------
    // Matchups
    // ------------------------------------------------------------------

    /// Insert or replace a matchup after checking the points invariant.
    /// Admin corrections go through here too.
    pub fn upsert_matchup(&self, matchup: &Matchup) -> Result<()> {
        validate_matchup(matchup).context("matchup rejected")?;
        let conn = self.conn();
        insert_matchup(&conn, matchup)
    }

    /// Matchups for weeks `1..=up_to_week`, ordered by week then id.
    pub fn load_matchups(&self, up_to_week: u32) -> Result<Vec<Matchup>> {
        self.query_matchups("WHERE week <= ?1", up_to_week)
    }

    pub fn load_week_matchups(&self, week: u32) -> Result<Vec<Matchup>> {
        self.query_matchups("WHERE week = ?1", week)
    }

    pub fn load_matchup(&self, id: i64) -> Result<Option<Matchup>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {MATCHUP_COLUMNS} FROM matchups WHERE id = ?1"),
            params![id],
            matchup_from_row,
        )
        .optional()
        .with_context(|| format!("failed to load matchup {id}"))
    }

    /// Next free matchup id.
    pub fn next_matchup_id(&self) -> Result<i64> {
        let conn = self.conn();
        let id: i64 = conn
            .query_row("SELECT COALESCE(MAX(id), 0) + 1 FROM matchups", [], |row| {
                row.get(0)
            })
            .context("failed to allocate matchup id")?;
        Ok(id)
    }

    fn query_matchups(&self, filter: &str, week: u32) -> Result<Vec<Matchup>> {
        let conn = self.conn();
        let sql = format!("SELECT {MATCHUP_COLUMNS} FROM matchups {filter} ORDER BY week, id");
        let mut stmt = conn
            .prepare(&sql)
            .context("failed to prepare matchup query")?;
        let matchups = stmt
            .query_map(params![week], matchup_from_row)
            .context("failed to query matchups")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map matchup rows")?;
        Ok(matchups)
    }

    // ------------------------------------------------------------------
    // League settings
    // ------------------------------------------------------------------

    const HANDICAP_SETTINGS_KEY: &'static str = "handicap_settings";
    const POINTS_RULE_KEY: &'static str = "points_rule";

    /// Validate and store the league's handicap policy.
    pub fn save_handicap_settings(&self, record: &HandicapSettingsRecord) -> Result<()> {
        HandicapSettings::try_from(record.clone()).context("handicap settings rejected")?;
        let value = serde_json::to_value(record).context("failed to serialize handicap settings")?;
        self.save_state(Self::HANDICAP_SETTINGS_KEY, &value)
    }

    /// The stored handicap policy, if one has been saved.
    pub fn load_handicap_settings(&self) -> Result<Option<HandicapSettings>> {
        let Some(value) = self.load_state(Self::HANDICAP_SETTINGS_KEY)? else {
            return Ok(None);
        };
        let record: HandicapSettingsRecord =
            serde_json::from_value(value).context("failed to deserialize handicap settings")?;
        let settings = HandicapSettings::try_from(record)
            .context("stored handicap settings are no longer valid")?;
        Ok(Some(settings))
    }

    pub fn save_points_rule(&self, rule: &PointsRule) -> Result<()> {
        rule.validate().context("points rule rejected")?;
        let value = serde_json::to_value(rule).context("failed to serialize points rule")?;
        self.save_state(Self::POINTS_RULE_KEY, &value)
    }

    pub fn load_points_rule(&self) -> Result<Option<PointsRule>> {
        let Some(value) = self.load_state(Self::POINTS_RULE_KEY)? else {
            return Ok(None);
        };
        let rule = serde_json::from_value(value).context("failed to deserialize points rule")?;
        Ok(Some(rule))
    }

    /// Persist an arbitrary JSON value under `key`. Uses INSERT OR REPLACE so
    /// repeated saves overwrite the previous value.
    fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str =
            serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO league_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`.
    fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let json_str: Option<String> = conn
            .query_row(
                "SELECT value FROM league_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query league state")?;
        match json_str {
            Some(s) => {
                let value = serde_json::from_str(&s).context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Leaderboard snapshot for a finalized week.
    pub fn load_snapshot(&self, week: u32) -> Result<Option<LeaderboardSnapshot>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, rank, handicap FROM leaderboard_snapshots
                 WHERE week = ?1 ORDER BY rank",
            )
            .context("failed to prepare load_snapshot query")?;
        let entries = stmt
            .query_map(params![week], |row| {
                Ok(SnapshotEntry {
                    team_id: row.get(0)?,
                    rank: row.get(1)?,
                    handicap: row.get(2)?,
                })
            })
            .context("failed to query snapshot")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map snapshot rows")?;

        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(LeaderboardSnapshot { week, entries }))
    }

    /// Most recent snapshot strictly before `week`. Bye weeks leave gaps, so
    /// this is not always `week - 1`.
    pub fn load_previous_snapshot(&self, week: u32) -> Result<Option<LeaderboardSnapshot>> {
        let previous: Option<u32> = {
            let conn = self.conn();
            conn.query_row(
                "SELECT MAX(week) FROM leaderboard_snapshots WHERE week < ?1",
                params![week],
                |row| row.get(0),
            )
            .context("failed to find previous snapshot week")?
        };
        match previous {
            Some(prev) => self.load_snapshot(prev),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Pending handicaps
    // ------------------------------------------------------------------

    /// Hold a computed handicap until an admin approves it.
    pub fn load_pending_handicaps(&self, week: u32) -> Result<Vec<PendingHandicap>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, week, value, basis FROM pending_handicaps
                 WHERE week = ?1 ORDER BY team_id",
            )
            .context("failed to prepare pending handicap query")?;
        let rows = stmt
            .query_map(params![week], |row| {
                let basis_json: String = row.get(3)?;
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, basis_json))
            })
            .context("failed to query pending handicaps")?
            .collect::<std::result::Result<Vec<(TeamId, u32, f64, String)>, _>>()
            .context("failed to map pending handicap rows")?;

        rows.into_iter()
            .map(|(team_id, week, value, basis_json)| {
                let basis = serde_json::from_str(&basis_json)
                    .with_context(|| format!("bad handicap basis {basis_json}"))?;
                Ok(PendingHandicap {
                    team_id,
                    week,
                    value,
                    basis,
                })
            })
            .collect()
    }

    /// Apply a pending handicap to its team and clear it. Returns the
    /// approved value.
    pub fn approve_handicap(&self, team_id: TeamId, week: u32) -> Result<f64> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let value: f64 = tx
            .query_row(
                "SELECT value FROM pending_handicaps WHERE team_id = ?1 AND week = ?2",
                params![team_id, week],
                |row| row.get(0),
            )
            .optional()
            .context("failed to read pending handicap")?
            .with_context(|| format!("no pending handicap for team {team_id} in week {week}"))?;
        tx.execute(
            "UPDATE teams SET handicap = ?1 WHERE id = ?2",
            params![value, team_id],
        )
        .context("failed to apply approved handicap")?;
        tx.execute(
            "DELETE FROM pending_handicaps WHERE team_id = ?1 AND week = ?2",
            params![team_id, week],
        )
        .context("failed to clear pending handicap")?;
        tx.commit().context("failed to commit handicap approval")?;
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Week finalization
    // ------------------------------------------------------------------

    pub fn is_week_finalized(&self, week: u32) -> Result<bool> {
        let conn = self.conn();
        week_finalized(&conn, week)
    }

    /// Write a finalized week in a single transaction: score entries,
    /// matchups, the leaderboard snapshot, and team totals. Nothing is
    /// written if any matchup fails validation or any statement fails.
    pub fn commit_week(&self, commit: &WeekCommit) -> Result<()> {
        for matchup in &commit.matchups {
            validate_matchup(matchup).context("matchup rejected")?;
        }

        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        if week_finalized(&tx, commit.week)? {
            bail!("week {} is already finalized", commit.week);
        }

        for entry in &commit.scores {
            insert_score(&tx, entry)?;
        }
        for matchup in &commit.matchups {
            insert_matchup(&tx, matchup)?;
        }
        write_snapshot(&tx, &commit.snapshot)?;
        for team in &commit.teams {
            tx.execute(
                "UPDATE teams SET handicap = ?1, wins = ?2, losses = ?3, ties = ?4, points = ?5
                 WHERE id = ?6",
                params![team.handicap, team.wins, team.losses, team.ties, team.points, team.id],
            )
            .context("failed to update team totals")?;
        }
        for pending in &commit.pending {
            insert_pending(&tx, pending)?;
        }
        tx.execute(
            "INSERT INTO finalized_weeks (week, finalized_at) VALUES (?1, ?2)",
            params![commit.week, now_rfc3339()],
        )
        .context("failed to mark week finalized")?;

        tx.commit().context("failed to commit week")?;
        info!(
            "Week {} committed: {} scores, {} matchups, {} pending handicaps",
            commit.week,
            commit.scores.len(),
            commit.matchups.len(),
            commit.pending.len()
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping and shared statements
// ---------------------------------------------------------------------------

const MATCHUP_COLUMNS: &str = "id, week,
    team_a_id, team_a_gross, team_a_handicap, team_a_net, team_a_points, team_a_is_sub,
    team_b_id, team_b_gross, team_b_handicap, team_b_net, team_b_points, team_b_is_sub,
    is_forfeit, forfeit_team_id, status";

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn week_finalized(conn: &Connection, week: u32) -> Result<bool> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM finalized_weeks WHERE week = ?1)",
            params![week],
            |row| row.get(0),
        )
        .context("failed to check finalized weeks")?;
    Ok(exists)
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        handicap: row.get(2)?,
        wins: row.get(3)?,
        losses: row.get(4)?,
        ties: row.get(5)?,
        points: row.get(6)?,
    })
}

fn score_from_row(row: &Row<'_>) -> rusqlite::Result<WeeklyScoreEntry> {
    Ok(WeeklyScoreEntry {
        team_id: row.get(0)?,
        week: row.get(1)?,
        gross: row.get(2)?,
        handicap_used: row.get(3)?,
        net: row.get(4)?,
        position: row.get(5)?,
        points: row.get(6)?,
        is_sub: row.get(7)?,
        is_dnp: row.get(8)?,
    })
}

fn matchup_from_row(row: &Row<'_>) -> rusqlite::Result<Matchup> {
    let is_forfeit: bool = row.get(14)?;
    let forfeit_team_id: Option<TeamId> = row.get(15)?;
    let status_str: String = row.get(16)?;
    let id: i64 = row.get(0)?;

    let status = MatchupStatus::from_str_status(&status_str).unwrap_or_else(|| {
        warn!("matchup {id} has unknown status '{status_str}', treating as scheduled");
        MatchupStatus::Scheduled
    });
    let forfeit = if is_forfeit {
        if forfeit_team_id.is_none() {
            warn!("matchup {id} is flagged as a forfeit without a forfeiting team");
        }
        forfeit_team_id
    } else {
        None
    };

    Ok(Matchup {
        id,
        week: row.get(1)?,
        team_a: MatchupSide {
            team_id: row.get(2)?,
            gross: row.get(3)?,
            handicap: row.get(4)?,
            net: row.get(5)?,
            points: row.get(6)?,
            is_sub: row.get(7)?,
        },
        team_b: MatchupSide {
            team_id: row.get(8)?,
            gross: row.get(9)?,
            handicap: row.get(10)?,
            net: row.get(11)?,
            points: row.get(12)?,
            is_sub: row.get(13)?,
        },
        forfeit,
        status,
    })
}

fn insert_pending(conn: &Connection, pending: &PendingHandicap) -> Result<()> {
    let basis =
        serde_json::to_string(&pending.basis).context("failed to serialize handicap basis")?;
    conn.execute(
        "INSERT OR REPLACE INTO pending_handicaps (team_id, week, value, basis, computed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![pending.team_id, pending.week, pending.value, basis, now_rfc3339()],
    )
    .context("failed to save pending handicap")?;
    Ok(())
}

fn insert_score(conn: &Connection, entry: &WeeklyScoreEntry) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO weekly_scores
            (team_id, week, gross, handicap_used, net, position, points, is_sub, is_dnp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.team_id,
            entry.week,
            entry.gross,
            entry.handicap_used,
            entry.net,
            entry.position,
            entry.points,
            entry.is_sub,
            entry.is_dnp,
        ],
    )
    .context("failed to record weekly score")?;
    Ok(())
}

fn insert_matchup(conn: &Connection, m: &Matchup) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO matchups
            (id, week,
             team_a_id, team_a_gross, team_a_handicap, team_a_net, team_a_points, team_a_is_sub,
             team_b_id, team_b_gross, team_b_handicap, team_b_net, team_b_points, team_b_is_sub,
             is_forfeit, forfeit_team_id, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            m.id,
            m.week,
            m.team_a.team_id,
            m.team_a.gross,
            m.team_a.handicap,
            m.team_a.net,
            m.team_a.points,
            m.team_a.is_sub,
            m.team_b.team_id,
            m.team_b.gross,
            m.team_b.handicap,
            m.team_b.net,
            m.team_b.points,
            m.team_b.is_sub,
            m.is_forfeit(),
            m.forfeit,
            m.status.as_str(),
        ],
    )
    .with_context(|| format!("failed to write matchup {}", m.id))?;
    Ok(())
}

fn write_snapshot(tx: &Transaction<'_>, snapshot: &LeaderboardSnapshot) -> Result<()> {
    let created_at = now_rfc3339();
    for entry in &snapshot.entries {
        tx.execute(
            "INSERT OR REPLACE INTO leaderboard_snapshots (week, team_id, rank, handicap, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![snapshot.week, entry.team_id, entry.rank, entry.handicap, created_at],
        )
        .context("failed to write leaderboard snapshot")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fairway_core::handicap::compute_handicap_detail;
    use fairway_core::scoring::points::MarginTier;

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn two_teams(db: &Database) -> (TeamId, TeamId) {
        let a = db.upsert_team("Birdies", 4.0).unwrap();
        let b = db.upsert_team("Bogeys", 6.0).unwrap();
        (a, b)
    }

    fn scored_matchup(id: i64, week: u32, a: TeamId, b: TeamId, pa: u32, pb: u32) -> Matchup {
        let mut m = Matchup::scheduled(id, week, a, b);
        m.team_a.gross = Some(40);
        m.team_b.gross = Some(42);
        m.team_a.points = Some(pa);
        m.team_b.points = Some(pb);
        m.status = MatchupStatus::Completed;
        m
    }

    fn snapshot(week: u32, a: TeamId, b: TeamId) -> LeaderboardSnapshot {
        LeaderboardSnapshot {
            week,
            entries: vec![
                SnapshotEntry { team_id: a, rank: 1, handicap: 4.0 },
                SnapshotEntry { team_id: b, rank: 2, handicap: 6.0 },
            ],
        }
    }

    fn held_for(team_id: TeamId) -> PendingHandicap {
        PendingHandicap {
            team_id,
            week: 2,
            value: 3.0,
            basis: HandicapBasis::Computed,
        }
    }

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        for expected in [
            "teams",
            "weekly_scores",
            "matchups",
            "leaderboard_snapshots",
            "pending_handicaps",
            "finalized_weeks",
            "league_state",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table {expected}");
        }
    }

    #[test]
    fn upsert_team_is_idempotent_by_name() {
        let db = test_db();
        let first = db.upsert_team("Birdies", 4.0).unwrap();
        let second = db.upsert_team("Birdies", 5.0).unwrap();
        assert_eq!(first, second);
        let teams = db.load_teams().unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].handicap, 5.0);
        assert_eq!(db.find_team_by_name("Birdies").unwrap().unwrap().id, first);
        assert!(db.find_team_by_name("Nobody").unwrap().is_none());
    }

    #[test]
    fn history_round_trip_in_week_order() {
        let db = test_db();
        let (a, _) = two_teams(&db);
        db.record_score(&WeeklyScoreEntry::played(a, 2, 41, 4.0)).unwrap();
        db.record_score(&WeeklyScoreEntry::played(a, 1, 39, 4.0)).unwrap();
        db.record_score(&WeeklyScoreEntry::did_not_play(a, 3)).unwrap();

        let history = db.load_history(a).unwrap();
        assert_eq!(history.iter().map(|e| e.week).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(history[0].net, 35.0);
        assert!(history[2].is_dnp);
    }

    #[test]
    fn invalid_matchup_is_not_persisted() {
        let db = test_db();
        let (a, b) = two_teams(&db);
        let bad = scored_matchup(1, 1, a, b, 12, 12);
        assert!(db.upsert_matchup(&bad).is_err());
        assert!(db.load_matchups(10).unwrap().is_empty());
    }

    #[test]
    fn matchup_round_trip_including_forfeit() {
        let db = test_db();
        let (a, b) = two_teams(&db);
        db.upsert_matchup(&scored_matchup(1, 1, a, b, 12, 8)).unwrap();

        let mut forfeit = Matchup::scheduled(2, 2, a, b);
        forfeit.forfeit = Some(b);
        forfeit.team_a.points = Some(20);
        forfeit.team_b.points = Some(0);
        forfeit.status = MatchupStatus::Completed;
        db.upsert_matchup(&forfeit).unwrap();
        db.upsert_matchup(&Matchup::scheduled(3, 3, a, b)).unwrap();

        let loaded = db.load_matchups(2).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], scored_matchup(1, 1, a, b, 12, 8));
        assert_eq!(loaded[1], forfeit);
        assert_eq!(db.load_week_matchups(3).unwrap()[0].status, MatchupStatus::Scheduled);
    }

    #[test]
    fn settings_round_trip_and_rejection() {
        let db = test_db();
        assert!(db.load_handicap_settings().unwrap().is_none());

        let record = HandicapSettingsRecord {
            score_selection: "last_n".into(),
            score_count: Some(5),
            ..HandicapSettingsRecord::default()
        };
        db.save_handicap_settings(&record).unwrap();
        let loaded = db.load_handicap_settings().unwrap().unwrap();
        assert_eq!(loaded, HandicapSettings::try_from(record).unwrap());

        let bad = HandicapSettingsRecord {
            min_handicap: Some(20.0),
            ..HandicapSettingsRecord::default()
        };
        assert!(db.save_handicap_settings(&bad).is_err());
    }

    #[test]
    fn points_rule_round_trip() {
        let db = test_db();
        let rule = PointsRule::MarginTable {
            tiers: vec![
                MarginTier { min_margin: 0.0, winner_points: 12 },
                MarginTier { min_margin: 4.0, winner_points: 15 },
            ],
        };
        db.save_points_rule(&rule).unwrap();
        assert_eq!(db.load_points_rule().unwrap(), Some(rule));
        assert!(db.save_points_rule(&PointsRule::Fixed { winner_points: 9 }).is_err());
    }

    #[test]
    fn commit_week_writes_everything_and_freezes_scores() {
        let db = test_db();
        let (a, b) = two_teams(&db);
        let mut team_a = db.load_teams().unwrap()[0].clone();
        team_a.points = 12;
        team_a.wins = 1;

        let commit = WeekCommit {
            week: 1,
            scores: vec![
                WeeklyScoreEntry::played(a, 1, 40, 4.0),
                WeeklyScoreEntry::played(b, 1, 42, 6.0),
            ],
            matchups: vec![scored_matchup(1, 1, a, b, 12, 8)],
            snapshot: snapshot(1, a, b),
            teams: vec![team_a],
            pending: vec![],
        };
        db.commit_week(&commit).unwrap();

        assert!(db.is_week_finalized(1).unwrap());
        assert_eq!(db.load_week_scores(1).unwrap().len(), 2);
        assert_eq!(db.load_snapshot(1).unwrap(), Some(snapshot(1, a, b)));
        assert_eq!(db.load_teams().unwrap()[0].points, 12);

        let err = db.record_score(&WeeklyScoreEntry::played(a, 1, 50, 4.0)).unwrap_err();
        assert!(err.to_string().contains("finalized"));
        assert!(db.commit_week(&commit).is_err());
    }

    #[test]
    fn commit_week_is_all_or_nothing() {
        let db = test_db();
        let (a, b) = two_teams(&db);
        let commit = WeekCommit {
            week: 1,
            scores: vec![WeeklyScoreEntry::played(a, 1, 40, 4.0)],
            matchups: vec![scored_matchup(1, 1, a, b, 12, 8)],
            // Unknown team violates the snapshot's foreign key.
            snapshot: snapshot(1, a, 999),
            teams: vec![],
            pending: vec![held_for(a)],
        };
        assert!(db.commit_week(&commit).is_err());
        assert!(!db.is_week_finalized(1).unwrap());
        assert!(db.load_week_scores(1).unwrap().is_empty());
        assert!(db.load_matchups(1).unwrap().is_empty());
        assert!(db.load_pending_handicaps(2).unwrap().is_empty());

        // A pending row for an unknown team fails the whole week too.
        let commit = WeekCommit {
            snapshot: snapshot(1, a, b),
            pending: vec![held_for(a), held_for(999)],
            ..commit
        };
        assert!(db.commit_week(&commit).is_err());
        assert!(!db.is_week_finalized(1).unwrap());
        assert!(db.load_snapshot(1).unwrap().is_none());
        assert!(db.load_pending_handicaps(2).unwrap().is_empty());

        let commit = WeekCommit {
            pending: vec![held_for(a), held_for(b)],
            ..commit
        };
        db.commit_week(&commit).unwrap();
        assert!(db.is_week_finalized(1).unwrap());
        assert_eq!(db.load_pending_handicaps(2).unwrap(), vec![held_for(a), held_for(b)]);
    }

    #[test]
    fn commit_week_rejects_bad_points_before_writing() {
        let db = test_db();
        let (a, b) = two_teams(&db);
        let commit = WeekCommit {
            week: 1,
            scores: vec![WeeklyScoreEntry::played(a, 1, 40, 4.0)],
            matchups: vec![scored_matchup(1, 1, a, b, 15, 8)],
            snapshot: snapshot(1, a, b),
            teams: vec![],
            pending: vec![],
        };
        assert!(db.commit_week(&commit).is_err());
        assert!(db.load_week_scores(1).unwrap().is_empty());
    }

    #[test]
    fn pending_handicap_approval_updates_team() {
        let db = test_db();
        let (a, b) = two_teams(&db);
        let settings = HandicapSettings {
            require_approval: true,
            ..HandicapSettings::default()
        };
        let computation = compute_handicap_detail(&[WeeklyScoreEntry::played(a, 1, 33, 0.0)], &settings, 2);
        db.commit_week(&WeekCommit {
            week: 1,
            scores: vec![],
            matchups: vec![],
            snapshot: snapshot(1, a, b),
            teams: vec![],
            pending: vec![PendingHandicap::from_computation(a, 2, &computation)],
        })
        .unwrap();

        let pending = db.load_pending_handicaps(2).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].basis, HandicapBasis::Computed);

        let value = db.approve_handicap(a, 2).unwrap();
        assert_eq!(value, computation.value);
        assert_eq!(db.load_teams().unwrap()[0].handicap, value);
        assert!(db.load_pending_handicaps(2).unwrap().is_empty());
        assert!(db.approve_handicap(a, 2).is_err());
    }

    #[test]
    fn previous_snapshot_skips_bye_weeks() {
        let db = test_db();
        let (a, b) = two_teams(&db);
        assert!(db.load_previous_snapshot(2).unwrap().is_none());

        let commit = WeekCommit {
            week: 1,
            scores: vec![],
            matchups: vec![],
            snapshot: snapshot(1, a, b),
            teams: vec![],
            pending: vec![],
        };
        db.commit_week(&commit).unwrap();
        let prev = db.load_previous_snapshot(4).unwrap().unwrap();
        assert_eq!(prev.week, 1);
        assert!(db.load_previous_snapshot(1).unwrap().is_none());
    }

    #[test]
    fn matchup_ids_and_lookup() {
        let db = test_db();
        let (a, b) = two_teams(&db);
        assert_eq!(db.next_matchup_id().unwrap(), 1);
        db.upsert_matchup(&Matchup::scheduled(7, 1, a, b)).unwrap();
        assert_eq!(db.next_matchup_id().unwrap(), 8);
        assert_eq!(db.load_matchup(7).unwrap().unwrap().team_b.team_id, b);
        assert!(db.load_matchup(1).unwrap().is_none());
    }
}
