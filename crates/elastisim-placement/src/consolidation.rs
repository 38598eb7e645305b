//! Correlation-based consolidation selector.
//!
//! Picks the unit whose utilization history moves most closely with the
//! host-level history. Reclaiming that unit removes the capacity that is
//! most redundant with the fleet's aggregate behaviour.
//!
//! Scores are Pearson coefficients in `[-1, 1]`. A degenerate score (too
//! little overlap, or a flat series) is NaN and always ranks last.

use std::cmp::Ordering;

use elastisim_core::UnitId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A unit offered to the selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub unit: UnitId,
    /// Utilization history, oldest first.
    pub history: Vec<f64>,
    /// Latest utilization estimate; used when `history` is empty.
    pub utilization: f64,
}

impl Candidate {
    /// Most recent known utilization.
    pub fn latest(&self) -> f64 {
        self.history.last().copied().unwrap_or(self.utilization)
    }
}

/// A scored candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub unit: UnitId,
    /// Pearson coefficient, or NaN when undefined.
    pub score: f64,
    pub latest: f64,
}

/// Pearson correlation of two series aligned at their most recent sample.
///
/// The longer series is truncated from the front to the common length.
/// Returns NaN when fewer than two points overlap or either side is flat.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let x = &x[x.len() - n..];
    let y = &y[y.len() - n..];

    let len = n as f64;
    let mean_x = x.iter().sum::<f64>() / len;
    let mean_y = y.iter().sum::<f64>() / len;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }

    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

/// Score every candidate against `reference` and sort best first.
///
/// Order: highest correlation, NaN last; ties go to the lower latest
/// utilization, then the lower id.
pub fn rank(candidates: &[Candidate], reference: &[f64]) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .iter()
        .map(|c| RankedCandidate {
            unit: c.unit,
            score: pearson(reference, &c.history),
            latest: c.latest(),
        })
        .collect();

    ranked.sort_by(compare_ranked);
    ranked
}

/// The best-ranked candidate, `None` when there are none.
pub fn select(candidates: &[Candidate], reference: &[f64]) -> Option<UnitId> {
    let ranked = rank(candidates, reference);
    let best = ranked.first()?;
    debug!(
        unit = %best.unit,
        score = best.score,
        latest = best.latest,
        candidates = ranked.len(),
        reference_len = reference.len(),
        "consolidation candidate selected"
    );
    Some(best.unit)
}

fn compare_ranked(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    let by_score = match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.score.total_cmp(&a.score),
    };
    by_score
        .then_with(|| a.latest.total_cmp(&b.latest))
        .then_with(|| a.unit.cmp(&b.unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u64, history: &[f64]) -> Candidate {
        Candidate {
            unit: UnitId(id),
            history: history.to_vec(),
            utilization: 0.0,
        }
    }

    #[test]
    fn picks_positively_correlated_unit() {
        let reference = [0.5, 0.6, 0.7];
        let candidates = vec![candidate(1, &[0.5, 0.6, 0.7]), candidate(2, &[0.7, 0.6, 0.5])];

        let ranked = rank(&candidates, &reference);
        assert!((ranked[0].score - 1.0).abs() < 1e-9);
        assert!((ranked[1].score + 1.0).abs() < 1e-9);
        assert_eq!(select(&candidates, &reference), Some(UnitId(1)));
    }

    #[test]
    fn empty_candidate_list_selects_nothing() {
        assert_eq!(select(&[], &[0.1, 0.2]), None);
    }

    #[test]
    fn degenerate_scores_are_nan() {
        assert!(pearson(&[0.5], &[0.5]).is_nan());
        assert!(pearson(&[], &[0.1, 0.2]).is_nan());
        assert!(pearson(&[0.3, 0.3, 0.3], &[0.1, 0.2, 0.3]).is_nan());
        assert!(pearson(&[0.1, 0.2, 0.3], &[0.0, 0.0, 0.0]).is_nan());
    }

    #[test]
    fn series_align_at_most_recent_sample() {
        // Only the last three reference points overlap the candidate.
        let reference = [0.9, 0.1, 0.2, 0.3];
        let r = pearson(&reference, &[0.4, 0.5, 0.6]);
        assert!((r - 1.0).abs() < 1e-9, "got {r}");
    }

    #[test]
    fn nan_ranks_below_negative_correlation() {
        let reference = [0.2, 0.4, 0.6];
        let candidates = vec![
            candidate(1, &[0.5, 0.5, 0.5]),
            candidate(2, &[0.6, 0.4, 0.2]),
            candidate(3, &[0.1]),
        ];

        let ranked = rank(&candidates, &reference);
        let order: Vec<u64> = ranked.iter().map(|r| r.unit.0).collect();
        // 2 is perfectly anti-correlated but still beats both degenerate ones;
        // 1 and 3 tie on NaN and split on latest utilization.
        assert_eq!(order, vec![2, 3, 1]);
        assert!(ranked[1].score.is_nan());
        assert!(ranked[2].score.is_nan());
    }

    #[test]
    fn ties_prefer_lower_latest_utilization_then_lower_id() {
        let reference = [0.1, 0.2, 0.3];
        let candidates = vec![
            candidate(7, &[0.2, 0.4, 0.6]),
            candidate(3, &[0.1, 0.2, 0.3]),
            candidate(5, &[0.1, 0.2, 0.3]),
        ];

        let order: Vec<u64> = rank(&candidates, &reference).iter().map(|r| r.unit.0).collect();
        assert_eq!(order, vec![3, 5, 7]);
    }

    #[test]
    fn latest_falls_back_to_current_utilization() {
        let mut c = candidate(1, &[]);
        c.utilization = 0.42;
        assert_eq!(c.latest(), 0.42);

        c.history.push(0.1);
        assert_eq!(c.latest(), 0.1);
    }

    #[test]
    fn ranking_is_deterministic() {
        let reference = [0.3, 0.5, 0.4, 0.8, 0.6];
        let candidates = vec![
            candidate(4, &[0.2, 0.6, 0.4, 0.9, 0.5]),
            candidate(2, &[0.9, 0.1, 0.4, 0.2, 0.3]),
            candidate(9, &[0.5, 0.5]),
            candidate(1, &[0.3, 0.5, 0.4, 0.8, 0.6]),
        ];

        let first: Vec<UnitId> = rank(&candidates, &reference).iter().map(|r| r.unit).collect();
        for _ in 0..10 {
            let again: Vec<UnitId> = rank(&candidates, &reference).iter().map(|r| r.unit).collect();
            assert_eq!(first, again);
        }
        assert_eq!(first[0], UnitId(1));
        assert_eq!(*first.last().unwrap(), UnitId(9));
    }
}
