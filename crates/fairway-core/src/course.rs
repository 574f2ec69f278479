// Course-side resolution: which holes are in play for a given week.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ScorecardError;

/// Highest hole number on the front nine.
const FRONT_NINE_LAST: u8 = 9;
/// Highest hole number on a full course.
const BACK_NINE_LAST: u8 = 18;
/// Holes played when a league plays a single side.
const NINE_HOLES: usize = 9;

// ---------------------------------------------------------------------------
// Side and play mode
// ---------------------------------------------------------------------------

/// One nine of an 18-hole course. A week with no side plays all holes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Front => Side::Back,
            Side::Back => Side::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
        }
    }

    pub fn from_str_side(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Some(Side::Front),
            "back" => Some(Side::Back),
            _ => None,
        }
    }

    /// Hole numbers belonging to this side.
    pub fn holes(&self) -> std::ops::RangeInclusive<u8> {
        match self {
            Side::Front => 1..=FRONT_NINE_LAST,
            Side::Back => (FRONT_NINE_LAST + 1)..=BACK_NINE_LAST,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a league uses the course each week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayMode {
    #[serde(rename = "full_18")]
    Full18,
    #[serde(rename = "nine_hole_front")]
    NineHoleFront,
    #[serde(rename = "nine_hole_back")]
    NineHoleBack,
    #[serde(rename = "nine_hole_alternating")]
    NineHoleAlternating,
}

impl PlayMode {
    pub fn from_str_mode(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full_18" => Some(PlayMode::Full18),
            "nine_hole_front" => Some(PlayMode::NineHoleFront),
            "nine_hole_back" => Some(PlayMode::NineHoleBack),
            "nine_hole_alternating" => Some(PlayMode::NineHoleAlternating),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayMode::Full18 => "full_18",
            PlayMode::NineHoleFront => "nine_hole_front",
            PlayMode::NineHoleBack => "nine_hole_back",
            PlayMode::NineHoleAlternating => "nine_hole_alternating",
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Side resolution
// ---------------------------------------------------------------------------

/// Side in play for `week` (1-based). `None` means the full course.
///
/// Alternating leagues play `first_week_side` on odd weeks and the opposite
/// side on even weeks.
pub fn resolve_side(week: u32, mode: PlayMode, first_week_side: Side) -> Option<Side> {
    match mode {
        PlayMode::Full18 => None,
        PlayMode::NineHoleFront => Some(Side::Front),
        PlayMode::NineHoleBack => Some(Side::Back),
        PlayMode::NineHoleAlternating => {
            if week % 2 == 1 {
                Some(first_week_side)
            } else {
                Some(first_week_side.opposite())
            }
        }
    }
}

/// String-typed form of [`resolve_side`] for values read from stored
/// configuration. An unknown play mode resolves to the full course and an
/// unknown first-week side falls back to the front nine.
pub fn resolve_side_named(week: u32, play_mode: &str, first_week_side: &str) -> Option<Side> {
    let Some(mode) = PlayMode::from_str_mode(play_mode) else {
        warn!("unknown play mode '{play_mode}', treating week {week} as full 18");
        return None;
    };
    let first = Side::from_str_side(first_week_side).unwrap_or_else(|| {
        warn!("unknown first week side '{first_week_side}', defaulting to front");
        Side::Front
    });
    resolve_side(week, mode, first)
}

// ---------------------------------------------------------------------------
// Hole filtering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hole {
    pub number: u8,
    pub par: u8,
}

/// Whether `hole_number` is played when `side` is in play.
pub fn is_hole_in_play(hole_number: u8, side: Option<Side>) -> bool {
    match side {
        Some(s) => s.holes().contains(&hole_number),
        None => true,
    }
}

/// Holes in play for `side`, preserving input order.
pub fn filter_holes(holes: &[Hole], side: Option<Side>) -> Vec<Hole> {
    holes
        .iter()
        .filter(|h| is_hole_in_play(h.number, side))
        .copied()
        .collect()
}

/// String-typed form of [`filter_holes`]. Blank, `full` and `none` mean the
/// full course; any other unrecognized side keeps every hole and is logged as
/// a configuration anomaly.
pub fn filter_holes_named(holes: &[Hole], side: &str) -> Vec<Hole> {
    let trimmed = side.trim();
    let parsed = match trimmed.to_ascii_lowercase().as_str() {
        "" | "full" | "none" | "null" => None,
        _ => {
            let parsed = Side::from_str_side(trimmed);
            if parsed.is_none() {
                warn!("unrecognized course side '{side}', keeping all holes");
            }
            parsed
        }
    };
    filter_holes(holes, parsed)
}

/// Number of holes a complete scorecard must contain.
pub fn expected_hole_count(course_hole_count: usize, side: Option<Side>) -> usize {
    match side {
        Some(_) => NINE_HOLES,
        None => course_hole_count,
    }
}

// ---------------------------------------------------------------------------
// Scorecards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoleScore {
    pub hole: u8,
    pub strokes: u32,
}

/// Check a scorecard against the holes in play and return its gross total.
pub fn validate_scorecard(
    scores: &[HoleScore],
    side: Option<Side>,
    course_hole_count: usize,
) -> Result<u32, ScorecardError> {
    let mut seen: HashSet<u8> = HashSet::with_capacity(scores.len());

    for score in scores {
        let on_course = score.hole >= 1 && usize::from(score.hole) <= course_hole_count;
        if !on_course || !is_hole_in_play(score.hole, side) {
            return Err(ScorecardError::HoleNotInPlay { hole: score.hole });
        }
        if !seen.insert(score.hole) {
            return Err(ScorecardError::DuplicateHole { hole: score.hole });
        }
        if score.strokes == 0 {
            return Err(ScorecardError::ZeroStrokes { hole: score.hole });
        }
    }

    let expected = expected_hole_count(course_hole_count, side);
    if scores.len() != expected {
        return Err(ScorecardError::Incomplete {
            expected,
            found: scores.len(),
        });
    }

    scores.iter().try_fold(0u32, |total, s| {
        total
            .checked_add(s.strokes)
            .ok_or(ScorecardError::StrokesOverflow { hole: s.hole })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn course(count: u8) -> Vec<Hole> {
        (1..=count).map(|n| Hole { number: n, par: 4 }).collect()
    }

    fn card(holes: std::ops::RangeInclusive<u8>) -> Vec<HoleScore> {
        holes.map(|hole| HoleScore { hole, strokes: 5 }).collect()
    }

    #[test]
    fn full_18_never_has_a_side() {
        for week in 1..=6 {
            assert_eq!(resolve_side(week, PlayMode::Full18, Side::Back), None);
        }
    }

    #[test]
    fn fixed_nine_modes_ignore_week_and_first_side() {
        assert_eq!(resolve_side(1, PlayMode::NineHoleFront, Side::Back), Some(Side::Front));
        assert_eq!(resolve_side(2, PlayMode::NineHoleFront, Side::Back), Some(Side::Front));
        assert_eq!(resolve_side(1, PlayMode::NineHoleBack, Side::Front), Some(Side::Back));
        assert_eq!(resolve_side(4, PlayMode::NineHoleBack, Side::Front), Some(Side::Back));
    }

    #[test]
    fn alternating_starts_on_first_week_side() {
        let mode = PlayMode::NineHoleAlternating;
        assert_eq!(resolve_side(1, mode, Side::Back), Some(Side::Back));
        assert_eq!(resolve_side(2, mode, Side::Back), Some(Side::Front));
        assert_eq!(resolve_side(3, mode, Side::Back), Some(Side::Back));
        assert_eq!(resolve_side(1, mode, Side::Front), Some(Side::Front));
        assert_eq!(resolve_side(2, mode, Side::Front), Some(Side::Back));
    }

    #[test]
    fn unknown_play_mode_fails_open_to_full_course() {
        assert_eq!(resolve_side_named(3, "scramble", "front"), None);
    }

    #[test]
    fn unknown_first_side_defaults_to_front() {
        assert_eq!(
            resolve_side_named(1, "nine_hole_alternating", "middle"),
            Some(Side::Front)
        );
        assert_eq!(
            resolve_side_named(2, "nine_hole_alternating", "middle"),
            Some(Side::Back)
        );
    }

    #[test]
    fn named_resolution_is_case_insensitive() {
        assert_eq!(
            resolve_side_named(2, "NINE_HOLE_ALTERNATING", "Back"),
            Some(Side::Front)
        );
    }

    #[test]
    fn filter_front_and_back() {
        let holes = course(18);
        let front = filter_holes(&holes, Some(Side::Front));
        let back = filter_holes(&holes, Some(Side::Back));
        assert_eq!(front.iter().map(|h| h.number).collect::<Vec<_>>(), (1..=9).collect::<Vec<_>>());
        assert_eq!(back.iter().map(|h| h.number).collect::<Vec<_>>(), (10..=18).collect::<Vec<_>>());
        assert_eq!(filter_holes(&holes, None).len(), 18);
    }

    #[test]
    fn filter_unrecognized_side_keeps_all_holes() {
        let holes = course(18);
        assert_eq!(filter_holes_named(&holes, "sideways").len(), 18);
        assert_eq!(filter_holes_named(&holes, "").len(), 18);
        assert_eq!(filter_holes_named(&holes, "back").len(), 9);
    }

    #[test]
    fn hole_in_play_boundaries() {
        assert!(is_hole_in_play(9, Some(Side::Front)));
        assert!(!is_hole_in_play(10, Some(Side::Front)));
        assert!(is_hole_in_play(10, Some(Side::Back)));
        assert!(!is_hole_in_play(9, Some(Side::Back)));
        assert!(is_hole_in_play(14, None));
    }

    #[test]
    fn expected_count_is_nine_for_any_side() {
        assert_eq!(expected_hole_count(18, Some(Side::Front)), 9);
        assert_eq!(expected_hole_count(27, Some(Side::Back)), 9);
        assert_eq!(expected_hole_count(9, Some(Side::Front)), 9);
        assert_eq!(expected_hole_count(18, None), 18);
        assert_eq!(expected_hole_count(9, None), 9);
    }

    #[test]
    fn complete_front_card_totals_strokes() {
        let gross = validate_scorecard(&card(1..=9), Some(Side::Front), 18).unwrap();
        assert_eq!(gross, 45);
    }

    #[test]
    fn card_with_back_hole_on_front_week_is_rejected() {
        let mut scores = card(1..=8);
        scores.push(HoleScore { hole: 12, strokes: 4 });
        let err = validate_scorecard(&scores, Some(Side::Front), 18).unwrap_err();
        assert_eq!(err, ScorecardError::HoleNotInPlay { hole: 12 });
    }

    #[test]
    fn incomplete_and_duplicate_cards_are_rejected() {
        let err = validate_scorecard(&card(10..=17), Some(Side::Back), 18).unwrap_err();
        assert_eq!(err, ScorecardError::Incomplete { expected: 9, found: 8 });

        let mut scores = card(1..=9);
        scores[8] = HoleScore { hole: 3, strokes: 4 };
        let err = validate_scorecard(&scores, Some(Side::Front), 18).unwrap_err();
        assert_eq!(err, ScorecardError::DuplicateHole { hole: 3 });
    }

    #[test]
    fn zero_strokes_and_off_course_holes_are_rejected() {
        let mut scores = card(1..=9);
        scores[0].strokes = 0;
        assert_eq!(
            validate_scorecard(&scores, Some(Side::Front), 18).unwrap_err(),
            ScorecardError::ZeroStrokes { hole: 1 }
        );

        let mut scores = card(1..=9);
        scores.push(HoleScore { hole: 10, strokes: 4 });
        assert_eq!(
            validate_scorecard(&scores, None, 9).unwrap_err(),
            ScorecardError::HoleNotInPlay { hole: 10 }
        );
    }

    #[test]
    fn stroke_total_that_overflows_is_rejected() {
        let mut scores = card(10..=18);
        scores[0].strokes = u32::MAX;
        assert_eq!(
            validate_scorecard(&scores, Some(Side::Back), 18).unwrap_err(),
            ScorecardError::StrokesOverflow { hole: 11 }
        );

        scores[0].strokes = u32::MAX - 40;
        assert_eq!(validate_scorecard(&scores, Some(Side::Back), 18), Ok(u32::MAX));
    }

    #[test]
    fn play_mode_serde_uses_snake_names() {
        let json = serde_json::to_string(&PlayMode::Full18).unwrap();
        assert_eq!(json, "\"full_18\"");
        let mode: PlayMode = serde_json::from_str("\"nine_hole_alternating\"").unwrap();
        assert_eq!(mode, PlayMode::NineHoleAlternating);
    }
}
