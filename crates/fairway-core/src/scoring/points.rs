// Match points: fixed-sum allocation, forfeits, and write-path validation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{MatchupError, SettingsError};
use crate::model::{Matchup, MatchupSide, MatchupStatus, TeamId};
use crate::scoring::net::{compare_nets, net_score};
use crate::TOTAL_POINTS;

/// Each side's share of a half-split.
const HALF_POINTS: u32 = TOTAL_POINTS / 2;

// ---------------------------------------------------------------------------
// Points rule
// ---------------------------------------------------------------------------

/// A margin threshold in a league's points table. The winner of a match
/// decided by at least `min_margin` net strokes receives `winner_points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginTier {
    pub min_margin: f64,
    pub winner_points: u32,
}

/// How many of the [`TOTAL_POINTS`] the winner of a decided match takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointsRule {
    /// The winner always takes the same share.
    Fixed { winner_points: u32 },
    /// The winner's share grows with the margin of victory. Tiers are sorted
    /// by ascending `min_margin`; margins below the first tier use it.
    MarginTable { tiers: Vec<MarginTier> },
}

impl Default for PointsRule {
    fn default() -> Self {
        PointsRule::Fixed { winner_points: 12 }
    }
}

impl PointsRule {
    /// Reject rules that could break the fixed-sum invariant or award a
    /// "win" that is indistinguishable from a tie.
    pub fn validate(&self) -> Result<(), SettingsError> {
        match self {
            PointsRule::Fixed { winner_points } => {
                check_winner_share("points.winner_points", *winner_points)
            }
            PointsRule::MarginTable { tiers } => {
                if tiers.is_empty() {
                    return Err(SettingsError::invalid(
                        "points.tiers",
                        "margin table needs at least one tier",
                    ));
                }
                let mut prev: Option<&MarginTier> = None;
                for tier in tiers {
                    check_winner_share("points.tiers.winner_points", tier.winner_points)?;
                    if !tier.min_margin.is_finite() || tier.min_margin < 0.0 {
                        return Err(SettingsError::invalid(
                            "points.tiers.min_margin",
                            format!("must be a finite value >= 0, got {}", tier.min_margin),
                        ));
                    }
                    if let Some(p) = prev {
                        if tier.min_margin <= p.min_margin {
                            return Err(SettingsError::invalid(
                                "points.tiers.min_margin",
                                "tiers must be sorted by strictly ascending margin",
                            ));
                        }
                        if tier.winner_points < p.winner_points {
                            return Err(SettingsError::invalid(
                                "points.tiers.winner_points",
                                "a larger margin cannot award fewer points",
                            ));
                        }
                    }
                    prev = Some(tier);
                }
                Ok(())
            }
        }
    }

    /// Winner's share for a decided match won by `margin` net strokes.
    pub fn winner_points(&self, margin: f64) -> u32 {
        let share = match self {
            PointsRule::Fixed { winner_points } => *winner_points,
            PointsRule::MarginTable { tiers } => tiers
                .iter()
                .rev()
                .find(|t| margin >= t.min_margin)
                .or_else(|| tiers.first())
                .map_or(HALF_POINTS + 1, |t| t.winner_points),
        };
        share.min(TOTAL_POINTS)
    }
}

fn check_winner_share(field: &str, winner_points: u32) -> Result<(), SettingsError> {
    if winner_points <= HALF_POINTS || winner_points > TOTAL_POINTS {
        return Err(SettingsError::invalid(
            field,
            format!(
                "winner share must be above {HALF_POINTS} and at most {TOTAL_POINTS}, got {winner_points}"
            ),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Points for the two sides of a matchup. `a + b == TOTAL_POINTS` unless
/// produced from a forfeit, where it is simply `TOTAL_POINTS` and 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointSplit {
    pub a: u32,
    pub b: u32,
}

impl PointSplit {
    /// Combined points, or `None` if the sides overflow `u32`.
    pub fn total(&self) -> Option<u32> {
        self.a.checked_add(self.b)
    }
}

/// Suggest a split from two net scores. Lower net wins; a tie halves.
pub fn allocate_points(net_a: f64, net_b: f64, rule: &PointsRule) -> PointSplit {
    match compare_nets(net_a, net_b) {
        Ordering::Equal => PointSplit {
            a: HALF_POINTS,
            b: HALF_POINTS,
        },
        Ordering::Less => {
            let winner = rule.winner_points((net_b - net_a).abs());
            PointSplit {
                a: winner,
                b: TOTAL_POINTS - winner,
            }
        }
        Ordering::Greater => {
            let winner = rule.winner_points((net_a - net_b).abs());
            PointSplit {
                a: TOTAL_POINTS - winner,
                b: winner,
            }
        }
    }
}

/// Split for a forfeit: the forfeiting team gets nothing.
pub fn forfeit_split(
    matchup_id: i64,
    team_a: TeamId,
    team_b: TeamId,
    forfeiting: TeamId,
) -> Result<PointSplit, MatchupError> {
    if forfeiting == team_a {
        Ok(PointSplit {
            a: 0,
            b: TOTAL_POINTS,
        })
    } else if forfeiting == team_b {
        Ok(PointSplit {
            a: TOTAL_POINTS,
            b: 0,
        })
    } else {
        Err(MatchupError::ForfeitTeamNotInMatchup {
            matchup_id,
            team_id: forfeiting,
        })
    }
}

/// Net score for one side: recomputed from gross when present, otherwise the
/// recorded net.
fn side_net(matchup_id: i64, side: &MatchupSide) -> Result<f64, MatchupError> {
    match (side.gross, side.net) {
        (Some(gross), _) => Ok(net_score(gross, side.handicap.unwrap_or(0.0))),
        (None, Some(net)) => Ok(net),
        (None, None) => Err(MatchupError::MissingScore {
            matchup_id,
            team_id: side.team_id,
        }),
    }
}

/// Suggested split for a matchup, honoring forfeits.
pub fn suggest_matchup_points(
    matchup: &Matchup,
    rule: &PointsRule,
) -> Result<PointSplit, MatchupError> {
    if let Some(forfeiting) = matchup.forfeit {
        return forfeit_split(
            matchup.id,
            matchup.team_a.team_id,
            matchup.team_b.team_id,
            forfeiting,
        );
    }
    let net_a = side_net(matchup.id, &matchup.team_a)?;
    let net_b = side_net(matchup.id, &matchup.team_b)?;
    Ok(allocate_points(net_a, net_b, rule))
}

/// Return a completed copy of `matchup` with nets and suggested points
/// filled in. The result always passes [`validate_matchup`].
pub fn score_matchup(matchup: &Matchup, rule: &PointsRule) -> Result<Matchup, MatchupError> {
    let split = suggest_matchup_points(matchup, rule)?;
    let mut scored = matchup.clone();

    if scored.forfeit.is_none() {
        scored.team_a.net = Some(side_net(matchup.id, &matchup.team_a)?);
        scored.team_b.net = Some(side_net(matchup.id, &matchup.team_b)?);
    }
    scored.team_a.points = Some(split.a);
    scored.team_b.points = Some(split.b);
    scored.status = MatchupStatus::Completed;

    validate_matchup(&scored)?;
    Ok(scored)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check a matchup before it is written. Admin overrides may move points
/// between the sides but never change the total.
pub fn validate_matchup(matchup: &Matchup) -> Result<(), MatchupError> {
    let a = &matchup.team_a;
    let b = &matchup.team_b;

    if a.team_id == b.team_id {
        return Err(MatchupError::SameTeam {
            matchup_id: matchup.id,
            team_id: a.team_id,
        });
    }

    let completed = matchup.status == MatchupStatus::Completed;

    if let Some(forfeiting) = matchup.forfeit {
        let expected = forfeit_split(matchup.id, a.team_id, b.team_id, forfeiting)?;
        return match (a.points, b.points) {
            (Some(pa), Some(pb)) if pa == expected.a && pb == expected.b => Ok(()),
            (None, None) if !completed => Ok(()),
            (None, _) | (_, None) if completed => Err(MatchupError::MissingPoints {
                matchup_id: matchup.id,
            }),
            _ => {
                let winner = if forfeiting == a.team_id { b.team_id } else { a.team_id };
                Err(MatchupError::ForfeitPoints {
                    matchup_id: matchup.id,
                    winner,
                    forfeiting,
                    expected: TOTAL_POINTS,
                })
            }
        };
    }

    match (a.points, b.points) {
        (Some(pa), Some(pb)) => {
            if (PointSplit { a: pa, b: pb }).total() != Some(TOTAL_POINTS) {
                return Err(MatchupError::PointsTotal {
                    matchup_id: matchup.id,
                    points_a: pa,
                    points_b: pb,
                    expected: TOTAL_POINTS,
                });
            }
            Ok(())
        }
        _ if completed => Err(MatchupError::MissingPoints {
            matchup_id: matchup.id,
        }),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PointsRule {
        PointsRule::MarginTable {
            tiers: vec![
                MarginTier { min_margin: 0.0, winner_points: 12 },
                MarginTier { min_margin: 3.0, winner_points: 14 },
                MarginTier { min_margin: 6.0, winner_points: 16 },
            ],
        }
    }

    fn played(gross_a: u32, hcp_a: f64, gross_b: u32, hcp_b: f64) -> Matchup {
        let mut m = Matchup::scheduled(7, 2, 1, 2);
        m.team_a.gross = Some(gross_a);
        m.team_a.handicap = Some(hcp_a);
        m.team_b.gross = Some(gross_b);
        m.team_b.handicap = Some(hcp_b);
        m
    }

    #[test]
    fn lower_net_wins_fixed_share() {
        let split = allocate_points(34.0, 36.0, &PointsRule::default());
        assert_eq!(split, PointSplit { a: 12, b: 8 });
        let split = allocate_points(38.0, 36.0, &PointsRule::default());
        assert_eq!(split, PointSplit { a: 8, b: 12 });
    }

    #[test]
    fn tie_splits_evenly() {
        let split = allocate_points(36.5, 36.5, &table());
        assert_eq!(split, PointSplit { a: 10, b: 10 });
    }

    #[test]
    fn margin_table_picks_highest_reached_tier() {
        assert_eq!(allocate_points(35.0, 36.0, &table()), PointSplit { a: 12, b: 8 });
        assert_eq!(allocate_points(33.0, 36.0, &table()), PointSplit { a: 14, b: 6 });
        assert_eq!(allocate_points(36.0, 46.0, &table()), PointSplit { a: 16, b: 4 });
        assert_eq!(allocate_points(40.0, 36.5, &table()), PointSplit { a: 6, b: 14 });
    }

    #[test]
    fn margin_below_first_tier_uses_first_tier() {
        let rule = PointsRule::MarginTable {
            tiers: vec![MarginTier { min_margin: 2.0, winner_points: 13 }],
        };
        assert_eq!(allocate_points(35.0, 36.0, &rule), PointSplit { a: 13, b: 7 });
    }

    #[test]
    fn fractional_nets_decide_close_matches() {
        let m = played(45, 12.3, 45, 12.0);
        let split = suggest_matchup_points(&m, &PointsRule::default()).unwrap();
        assert_eq!(split, PointSplit { a: 12, b: 8 });
    }

    #[test]
    fn forfeit_awards_everything_to_opponent() {
        let mut m = Matchup::scheduled(3, 1, 10, 20);
        m.forfeit = Some(10);
        let split = suggest_matchup_points(&m, &table()).unwrap();
        assert_eq!(split, PointSplit { a: 0, b: 20 });

        m.forfeit = Some(20);
        let split = suggest_matchup_points(&m, &table()).unwrap();
        assert_eq!(split, PointSplit { a: 20, b: 0 });
    }

    #[test]
    fn forfeit_by_outsider_is_rejected() {
        let mut m = Matchup::scheduled(3, 1, 10, 20);
        m.forfeit = Some(99);
        let err = suggest_matchup_points(&m, &table()).unwrap_err();
        assert_eq!(
            err,
            MatchupError::ForfeitTeamNotInMatchup { matchup_id: 3, team_id: 99 }
        );
    }

    #[test]
    fn missing_gross_cannot_be_suggested() {
        let mut m = played(40, 2.0, 41, 2.0);
        m.team_b.gross = None;
        let err = suggest_matchup_points(&m, &table()).unwrap_err();
        assert_eq!(err, MatchupError::MissingScore { matchup_id: 7, team_id: 2 });
    }

    #[test]
    fn recorded_net_used_without_gross() {
        let mut m = Matchup::scheduled(1, 1, 1, 2);
        m.team_a.net = Some(33.0);
        m.team_b.net = Some(34.0);
        let split = suggest_matchup_points(&m, &PointsRule::default()).unwrap();
        assert_eq!(split.a, 12);
    }

    #[test]
    fn score_matchup_completes_and_validates() {
        let scored = score_matchup(&played(40, 3.0, 42, 3.0), &table()).unwrap();
        assert_eq!(scored.status, MatchupStatus::Completed);
        assert_eq!(scored.team_a.net, Some(37.0));
        assert_eq!(scored.team_b.net, Some(39.0));
        assert_eq!(scored.team_a.points, Some(12));
        assert_eq!(scored.team_b.points, Some(8));
    }

    #[test]
    fn admin_override_preserving_total_is_accepted() {
        let mut m = score_matchup(&played(40, 3.0, 42, 3.0), &table()).unwrap();
        m.team_a.points = Some(15);
        m.team_b.points = Some(5);
        assert!(validate_matchup(&m).is_ok());
    }

    #[test]
    fn admin_override_breaking_total_is_rejected() {
        let mut m = score_matchup(&played(40, 3.0, 42, 3.0), &table()).unwrap();
        m.team_a.points = Some(15);
        let err = validate_matchup(&m).unwrap_err();
        assert_eq!(
            err,
            MatchupError::PointsTotal { matchup_id: 7, points_a: 15, points_b: 8, expected: 20 }
        );
    }

    #[test]
    fn override_that_overflows_is_rejected() {
        let mut m = score_matchup(&played(40, 3.0, 42, 3.0), &table()).unwrap();
        m.team_a.points = Some(u32::MAX);
        m.team_b.points = Some(21);
        assert_eq!(
            validate_matchup(&m).unwrap_err(),
            MatchupError::PointsTotal {
                matchup_id: 7,
                points_a: u32::MAX,
                points_b: 21,
                expected: 20
            }
        );
        assert_eq!(PointSplit { a: u32::MAX, b: 21 }.total(), None);
        assert_eq!(PointSplit { a: 12, b: 8 }.total(), Some(TOTAL_POINTS));
    }

    #[test]
    fn completed_without_points_is_rejected() {
        let mut m = played(40, 3.0, 42, 3.0);
        m.status = MatchupStatus::Completed;
        assert_eq!(
            validate_matchup(&m).unwrap_err(),
            MatchupError::MissingPoints { matchup_id: 7 }
        );
    }

    #[test]
    fn scheduled_without_points_is_fine() {
        assert!(validate_matchup(&Matchup::scheduled(1, 1, 1, 2)).is_ok());
    }

    #[test]
    fn scheduled_with_bad_total_is_still_rejected() {
        let mut m = Matchup::scheduled(1, 1, 1, 2);
        m.team_a.points = Some(11);
        m.team_b.points = Some(11);
        assert!(matches!(
            validate_matchup(&m),
            Err(MatchupError::PointsTotal { .. })
        ));
    }

    #[test]
    fn forfeit_with_wrong_split_is_rejected() {
        let mut m = Matchup::scheduled(5, 1, 1, 2);
        m.forfeit = Some(1);
        m.status = MatchupStatus::Completed;
        m.team_a.points = Some(10);
        m.team_b.points = Some(10);
        assert_eq!(
            validate_matchup(&m).unwrap_err(),
            MatchupError::ForfeitPoints { matchup_id: 5, winner: 2, forfeiting: 1, expected: 20 }
        );

        m.team_a.points = Some(0);
        m.team_b.points = Some(20);
        assert!(validate_matchup(&m).is_ok());
    }

    #[test]
    fn team_cannot_play_itself() {
        let m = Matchup::scheduled(9, 1, 4, 4);
        assert_eq!(
            validate_matchup(&m).unwrap_err(),
            MatchupError::SameTeam { matchup_id: 9, team_id: 4 }
        );
    }

    #[test]
    fn rule_validation() {
        assert!(PointsRule::default().validate().is_ok());
        assert!(table().validate().is_ok());
        assert!(PointsRule::Fixed { winner_points: 10 }.validate().is_err());
        assert!(PointsRule::Fixed { winner_points: 21 }.validate().is_err());
        assert!(PointsRule::MarginTable { tiers: vec![] }.validate().is_err());

        let unsorted = PointsRule::MarginTable {
            tiers: vec![
                MarginTier { min_margin: 3.0, winner_points: 14 },
                MarginTier { min_margin: 1.0, winner_points: 12 },
            ],
        };
        assert_eq!(unsorted.validate().unwrap_err().field(), "points.tiers.min_margin");

        let shrinking = PointsRule::MarginTable {
            tiers: vec![
                MarginTier { min_margin: 0.0, winner_points: 14 },
                MarginTier { min_margin: 3.0, winner_points: 12 },
            ],
        };
        assert_eq!(shrinking.validate().unwrap_err().field(), "points.tiers.winner_points");
    }

    #[test]
    fn rule_deserializes_from_tagged_toml_shape() {
        let rule: PointsRule = serde_json::from_str(
            r#"{"kind":"margin_table","tiers":[{"min_margin":0.0,"winner_points":12}]}"#,
        )
        .unwrap();
        assert_eq!(
            rule,
            PointsRule::MarginTable {
                tiers: vec![MarginTier { min_margin: 0.0, winner_points: 12 }]
            }
        );
    }
}
