//! Renewable share per timestamp and mean-of-ratios tallies
//!
//! Averages over a series are the arithmetic mean of the per-point ratios, not
//! the ratio of summed volumes. The same convention is used for today's share
//! and for the yearly average so the two stay comparable.

use crate::filter::{FilteredPoint, FilteredSeries};
use crate::series::Timestamp;
use serde::{Deserialize, Serialize};

/// Share of renewable generation in consumption, clamped to `[0, 1]`.
///
/// Returns `None` when consumption is not positive.
pub fn compute_share(point: &FilteredPoint) -> Option<f64> {
    if !(point.consumption.is_finite() && point.consumption > 0.0)
        || !point.generation.is_finite()
    {
        return None;
    }
    Some((point.generation / point.consumption).clamp(0.0, 1.0))
}

/// Share for a single timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredPoint {
    pub timestamp: Timestamp,
    pub share: f64,
}

/// Score every point of a filtered series, skipping undefined ratios
pub fn score(series: &FilteredSeries) -> Vec<ScoredPoint> {
    series
        .points()
        .iter()
        .filter_map(|p| {
            compute_share(p).map(|share| ScoredPoint {
                timestamp: p.timestamp,
                share,
            })
        })
        .collect()
}

/// Running sum and count of per-point shares
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShareTally {
    pub sum: f64,
    pub count: u64,
}

impl ShareTally {
    pub fn add(&mut self, share: f64) {
        self.sum += share;
        self.count += 1;
    }

    pub fn merge(&mut self, other: ShareTally) {
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn combined(self, other: ShareTally) -> ShareTally {
        let mut out = self;
        out.merge(other);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean share, `None` when nothing was tallied
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

impl FromIterator<f64> for ShareTally {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut tally = ShareTally::default();
        for share in iter {
            tally.add(share);
        }
        tally
    }
}

/// Mean share over a filtered series
pub fn mean_share(series: &FilteredSeries) -> Option<f64> {
    score(series)
        .into_iter()
        .map(|p| p.share)
        .collect::<ShareTally>()
        .mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn point(generation: f64, consumption: f64) -> FilteredPoint {
        FilteredPoint {
            timestamp: Utc::now(),
            generation,
            consumption,
        }
    }

    #[test]
    fn export_scenario_clamps_to_one() {
        assert_eq!(compute_share(&point(120.0, 100.0)), Some(1.0));
    }

    #[test]
    fn zero_consumption_has_no_share() {
        assert_eq!(compute_share(&point(10.0, 0.0)), None);
    }

    #[test]
    fn negative_generation_clamps_to_zero() {
        assert_eq!(compute_share(&point(-5.0, 100.0)), Some(0.0));
    }

    #[test]
    fn ordinary_ratio() {
        let share = compute_share(&point(45.0, 100.0)).unwrap();
        assert!((share - 0.45).abs() < 1e-12);
    }

    #[test]
    fn tally_is_mean_of_ratios() {
        let tally: ShareTally = [0.2, 0.4, 0.9].into_iter().collect();
        assert_eq!(tally.count, 3);
        assert!((tally.mean().unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(ShareTally::default().mean(), None);
    }

    #[test]
    fn tallies_merge() {
        let a: ShareTally = [0.5].into_iter().collect();
        let b: ShareTally = [1.0, 0.0].into_iter().collect();
        let c = a.combined(b);
        assert_eq!(c.count, 3);
        assert!((c.sum - 1.5).abs() < 1e-12);
    }
}
