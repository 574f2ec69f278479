// Net-score calculation and weekly finishing positions.

use std::cmp::Ordering;

use crate::model::{TeamId, WeeklyScoreEntry};

/// Two net scores closer than this are treated as a tie.
pub const NET_EPSILON: f64 = 1e-9;

/// `gross - handicap`, kept unrounded so fractional handicaps survive into
/// tie detection and points suggestion.
pub fn net_score(gross: u32, handicap: f64) -> f64 {
    f64::from(gross) - handicap
}

/// Compare two net scores, lower first, with [`NET_EPSILON`] tolerance.
pub fn compare_nets(a: f64, b: f64) -> Ordering {
    if (a - b).abs() < NET_EPSILON {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Weekly finishing positions by ascending net score.
///
/// DNP entries are skipped. Tied nets share a position and the next
/// position skips accordingly (1, 2, 2, 4). Output is in finishing order,
/// ties ordered by team id.
pub fn finishing_positions(entries: &[WeeklyScoreEntry]) -> Vec<(TeamId, u32)> {
    let mut played: Vec<&WeeklyScoreEntry> = entries.iter().filter(|e| !e.is_dnp).collect();
    played.sort_by(|a, b| compare_nets(a.net, b.net).then(a.team_id.cmp(&b.team_id)));

    let mut positions = Vec::with_capacity(played.len());
    let mut current = 0u32;
    let mut prev_net: Option<f64> = None;

    for (idx, entry) in played.iter().enumerate() {
        let tied = prev_net.is_some_and(|p| compare_nets(p, entry.net) == Ordering::Equal);
        if !tied {
            current = idx as u32 + 1;
        }
        positions.push((entry.team_id, current));
        prev_net = Some(entry.net);
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_subtracts_handicap() {
        assert_eq!(net_score(42, 6.0), 36.0);
        assert_eq!(net_score(40, 0.0), 40.0);
    }

    #[test]
    fn fractional_handicap_is_not_rounded() {
        let net = net_score(45, 12.3);
        assert!((net - 32.7).abs() < 1e-12);
    }

    #[test]
    fn negative_handicap_adds_strokes() {
        assert_eq!(net_score(36, -2.0), 38.0);
    }

    #[test]
    fn compare_nets_tolerates_float_noise() {
        assert_eq!(compare_nets(0.1 + 0.2, 0.3), Ordering::Equal);
        assert_eq!(compare_nets(35.0, 36.0), Ordering::Less);
        assert_eq!(compare_nets(37.5, 36.0), Ordering::Greater);
    }

    #[test]
    fn positions_use_competition_ranking() {
        let entries = vec![
            WeeklyScoreEntry::played(1, 3, 40, 4.0), // 36
            WeeklyScoreEntry::played(2, 3, 38, 4.0), // 34
            WeeklyScoreEntry::played(3, 3, 39, 3.0), // 36
            WeeklyScoreEntry::played(4, 3, 41, 2.0), // 39
            WeeklyScoreEntry::did_not_play(5, 3),
        ];
        let positions = finishing_positions(&entries);
        assert_eq!(positions, vec![(2, 1), (1, 2), (3, 2), (4, 4)]);
    }

    #[test]
    fn positions_empty_when_nobody_played() {
        let entries = vec![WeeklyScoreEntry::did_not_play(1, 1)];
        assert!(finishing_positions(&entries).is_empty());
    }
}
