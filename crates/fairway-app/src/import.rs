// CSV score import: one row per team per week, gross total or hole-by-hole.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

use fairway_core::course::{validate_scorecard, HoleScore, Side};
use fairway_core::model::WeeklyScoreEntry;
use fairway_store::Database;

use crate::config::League;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One CSV row. Columns: `team,week,gross,holes,sub,dnp`. `holes` is a
/// space-separated stroke list for the holes in play, in hole order; when
/// present it takes precedence over `gross`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoreRow {
    pub team: String,
    pub week: u32,
    #[serde(default)]
    pub gross: Option<u32>,
    #[serde(default)]
    pub holes: Option<String>,
    #[serde(default)]
    pub sub: Option<bool>,
    #[serde(default)]
    pub dnp: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub recorded: usize,
    pub skipped: usize,
}

/// Parse score rows, skipping malformed ones.
pub fn read_score_rows<R: Read>(rdr: R) -> Result<Vec<ScoreRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<ScoreRow>() {
        match result {
            Ok(row) => {
                if row.week == 0 {
                    warn!("skipping score for '{}': weeks start at 1", row.team);
                    continue;
                }
                rows.push(row);
            }
            Err(e) => {
                warn!("skipping malformed score row: {}", e);
            }
        }
    }
    Ok(rows)
}

pub fn load_score_file(path: &Path) -> Result<Vec<ScoreRow>, ImportError> {
    let file = std::fs::File::open(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    read_score_rows(file).map_err(|e| ImportError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

/// Gross total for a row, validating per-hole strokes against the side in
/// play. `None` means the row carries no usable score.
pub fn row_gross(row: &ScoreRow, side: Option<Side>, course_hole_count: usize) -> Option<u32> {
    let Some(holes) = row.holes.as_deref().filter(|h| !h.trim().is_empty()) else {
        return row.gross;
    };

    let first_hole = side.map_or(1, |s| *s.holes().start());
    let mut card = Vec::new();
    for (offset, token) in holes.split_whitespace().enumerate() {
        let Ok(strokes) = token.parse::<u32>() else {
            warn!("score for '{}' week {}: bad stroke count '{token}'", row.team, row.week);
            return None;
        };
        let Ok(hole) = u8::try_from(usize::from(first_hole) + offset) else {
            warn!("score for '{}' week {}: too many holes", row.team, row.week);
            return None;
        };
        card.push(HoleScore { hole, strokes });
    }

    match validate_scorecard(&card, side, course_hole_count) {
        Ok(total) => {
            if let Some(gross) = row.gross.filter(|&g| g != total) {
                warn!(
                    "score for '{}' week {}: gross {gross} disagrees with hole total {total}, using holes",
                    row.team, row.week
                );
            }
            Some(total)
        }
        Err(e) => {
            warn!("score for '{}' week {}: {e}", row.team, row.week);
            None
        }
    }
}

/// Record parsed rows for existing teams. Each entry uses the team's current
/// handicap. Rows for unknown teams, finalized weeks, or without a score are
/// skipped.
pub fn import_rows(
    db: &Database,
    league: &League,
    rows: &[ScoreRow],
) -> anyhow::Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for row in rows {
        let Some(team) = db.find_team_by_name(&row.team)? else {
            warn!("skipping score for unknown team '{}'", row.team);
            summary.skipped += 1;
            continue;
        };
        if db.is_week_finalized(row.week)? {
            warn!("skipping score for '{}': week {} is finalized", row.team, row.week);
            summary.skipped += 1;
            continue;
        }

        let entry = if row.dnp.unwrap_or(false) {
            WeeklyScoreEntry::did_not_play(team.id, row.week)
        } else {
            let side = league.side_for_week(row.week);
            let Some(gross) = row_gross(row, side, league.course_hole_count) else {
                warn!("skipping '{}' week {}: no usable score", row.team, row.week);
                summary.skipped += 1;
                continue;
            };
            WeeklyScoreEntry {
                is_sub: row.sub.unwrap_or(false),
                ..WeeklyScoreEntry::played(team.id, row.week, gross, team.handicap)
            }
        };

        db.record_score(&entry)
            .with_context(|| format!("failed to record score for '{}'", row.team))?;
        summary.recorded += 1;
    }

    info!(
        "Imported {} scores ({} skipped)",
        summary.recorded, summary.skipped
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
