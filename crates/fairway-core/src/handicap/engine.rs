// Handicap computation from a team's weekly history.
//
// Pipeline, in order:
//  1. window    non-DNP entries before the target week (or the freeze week)
//  2. provisional fallback for teams with too few weeks
//  3. selection all / last N / best-of-last
//  4. capping   gross above the exceptional cap is clamped
//  5. drop      highest and lowest nets removed
//  6. average   simple or recency-weighted mean net
//  7. formula   (base_score - average) * multiplier
//  8. trend     optional nudge toward the latest trajectory
//  9. rounding
// 10. bounds    clamp after rounding

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::handicap::settings::{DropRule, HandicapSettings, ScoreSelection, Trend, Weighting};
use crate::model::WeeklyScoreEntry;

/// Total weight below which a weighted average falls back to a plain mean.
const WEIGHT_EPSILON: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// How a handicap value was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandicapBasis {
    /// Team has fewer weeks than the provisional threshold.
    Provisional,
    /// No qualifying scores survived selection and drops.
    Default,
    /// Derived from the qualifying scores.
    Computed,
}

/// Full result of a handicap computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandicapComputation {
    /// Final rounded and clamped handicap.
    pub value: f64,
    pub basis: HandicapBasis,
    /// Distinct weeks in the history window.
    pub window_weeks: usize,
    /// Scores that reached the average.
    pub scores_used: usize,
    /// Formula result after trend, before rounding. `None` unless computed.
    pub raw: Option<f64>,
    /// Whether the league holds new values for admin approval.
    pub requires_approval: bool,
}

/// A score in the pipeline after selection. `gross` becomes fractional only
/// through capping.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Qualifying {
    week: u32,
    gross: f64,
    net: f64,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Handicap for the week `as_of_week`, from one team's history.
pub fn compute_handicap(
    history: &[WeeklyScoreEntry],
    settings: &HandicapSettings,
    as_of_week: u32,
) -> f64 {
    compute_handicap_detail(history, settings, as_of_week).value
}

/// Like [`compute_handicap`] but reports how the value was reached.
pub fn compute_handicap_detail(
    history: &[WeeklyScoreEntry],
    settings: &HandicapSettings,
    as_of_week: u32,
) -> HandicapComputation {
    let effective_week = match settings.freeze_week {
        Some(freeze) if as_of_week > freeze => freeze,
        _ => as_of_week,
    };

    let window = history_window(history, effective_week);
    let window_weeks = distinct_weeks(&window);

    let finish = |value: f64, basis: HandicapBasis, scores_used: usize, raw: Option<f64>| {
        let value = settings.bounds.clamp(settings.rounding.apply(value));
        HandicapComputation {
            value,
            basis,
            window_weeks,
            scores_used,
            raw,
            requires_approval: settings.require_approval,
        }
    };

    if let Some(prov) = settings.provisional {
        if window_weeks < prov.weeks as usize {
            debug!(
                "provisional handicap: {window_weeks} of {} weeks as of week {as_of_week}",
                prov.weeks
            );
            return finish(
                settings.default_handicap * prov.multiplier,
                HandicapBasis::Provisional,
                0,
                None,
            );
        }
    }

    let selected = select_scores(&window, settings.selection);
    let capped = cap_scores(selected, settings.exceptional_cap);
    let kept = drop_scores(capped, settings.drop);

    let Some(average) = average_net(&kept, settings.weighting) else {
        debug!("no qualifying scores as of week {as_of_week}, using default handicap");
        return finish(settings.default_handicap, HandicapBasis::Default, 0, None);
    };

    let mut raw = (settings.base_score - average) * settings.multiplier;
    if let Some(trend) = settings.trend {
        raw = apply_trend(raw, &kept, trend, settings.multiplier);
    }

    finish(raw, HandicapBasis::Computed, kept.len(), Some(raw))
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

/// Played entries strictly before `week`, oldest first.
fn history_window(history: &[WeeklyScoreEntry], week: u32) -> Vec<Qualifying> {
    let mut window: Vec<Qualifying> = history
        .iter()
        .filter(|e| !e.is_dnp && e.week < week)
        .map(|e| Qualifying {
            week: e.week,
            gross: f64::from(e.gross),
            net: e.net,
        })
        .collect();
    window.sort_by_key(|q| q.week);
    window
}

fn distinct_weeks(window: &[Qualifying]) -> usize {
    window.iter().map(|q| q.week).collect::<BTreeSet<_>>().len()
}

fn by_net(a: &Qualifying, b: &Qualifying) -> Ordering {
    a.net.partial_cmp(&b.net).unwrap_or(Ordering::Equal)
}

/// Narrow the window to the scores that count. Counts larger than the
/// window simply take the whole window.
fn select_scores(window: &[Qualifying], selection: ScoreSelection) -> Vec<Qualifying> {
    let most_recent = |n: u32| {
        let n = (n as usize).min(window.len());
        window[window.len() - n..].to_vec()
    };

    match selection {
        ScoreSelection::All => window.to_vec(),
        ScoreSelection::LastN { count } => most_recent(count),
        ScoreSelection::BestOfLast { best_of, last_of } => {
            let recent = most_recent(last_of);
            let mut order: Vec<usize> = (0..recent.len()).collect();
            order.sort_by(|&i, &j| by_net(&recent[i], &recent[j]));
            order.truncate(best_of as usize);
            // Back to chronological order for weighting and trend.
            order.sort_unstable();
            order.into_iter().map(|i| recent[i]).collect()
        }
    }
}

/// Clamp gross scores above `cap`, lowering the net by the same amount.
fn cap_scores(mut scores: Vec<Qualifying>, cap: Option<f64>) -> Vec<Qualifying> {
    if let Some(cap) = cap {
        for score in scores.iter_mut().filter(|s| s.gross > cap) {
            score.net -= score.gross - cap;
            score.gross = cap;
        }
    }
    scores
}

/// Remove the `highest` highest and `lowest` lowest nets, keeping the
/// survivors in chronological order.
fn drop_scores(scores: Vec<Qualifying>, drop: DropRule) -> Vec<Qualifying> {
    let total_drops = drop.highest.saturating_add(drop.lowest) as usize;
    if total_drops == 0 {
        return scores;
    }
    if total_drops >= scores.len() {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&i, &j| by_net(&scores[i], &scores[j]));
    let keep_end = order.len() - drop.highest as usize;
    let mut kept: Vec<usize> = order[drop.lowest as usize..keep_end].to_vec();
    kept.sort_unstable();
    kept.into_iter().map(|i| scores[i]).collect()
}

/// Mean net of `scores` (oldest first). Weighted when a weighting block is
/// configured. `None` when there is nothing to average.
fn average_net(scores: &[Qualifying], weighting: Option<Weighting>) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let plain = || scores.iter().map(|s| s.net).sum::<f64>() / scores.len() as f64;

    let Some(w) = weighting else {
        return Some(plain());
    };

    let mut weight = w.recent;
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for score in scores.iter().rev() {
        weighted_sum += score.net * weight;
        weight_total += weight;
        weight *= 1.0 - w.decay;
    }

    if weight_total.abs() < WEIGHT_EPSILON || !weight_total.is_finite() {
        Some(plain())
    } else {
        Some(weighted_sum / weight_total)
    }
}

/// Nudge the raw handicap by the latest-minus-earliest change in net score.
/// Rising scores lower the handicap the same way a higher average would.
fn apply_trend(raw: f64, scores: &[Qualifying], trend: Trend, multiplier: f64) -> f64 {
    match (scores.first(), scores.last()) {
        (Some(first), Some(last)) if scores.len() >= 2 => {
            let slope = last.net - first.net;
            raw - trend.weight * slope * multiplier
        }
        _ => raw,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
