//! Bottleneck filtering of generation against consumption
//!
//! Both inputs are brought onto the coarser of their two grids, then only the
//! timestamps present in both survive. Missing data is a policy outcome here,
//! never an error.

use crate::series::{AlignedSeries, Resolution, Timestamp};
use serde::Serialize;

/// One timestamp where both generation and consumption are known (MWh)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilteredPoint {
    pub timestamp: Timestamp,
    pub generation: f64,
    pub consumption: f64,
}

/// Points restricted to the intersection of both input domains
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredSeries {
    resolution: Resolution,
    points: Vec<FilteredPoint>,
}

impl FilteredSeries {
    pub fn empty(resolution: Resolution) -> Self {
        Self {
            resolution,
            points: Vec::new(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn points(&self) -> &[FilteredPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.points.iter().map(|p| p.timestamp)
    }

    /// Latest timestamp where both sources had data
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.points.last().map(|p| p.timestamp)
    }
}

fn is_defined_consumption(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Restrict generation and consumption to the timestamps both define.
///
/// Consumption that is zero, negative or non-finite counts as missing.
pub fn filter(generation: &AlignedSeries, consumption: &AlignedSeries) -> FilteredSeries {
    let grid = generation.resolution().max(consumption.resolution());
    let (Ok(gen_grid), Ok(cons_grid)) =
        (generation.aggregate_to(grid), consumption.aggregate_to(grid))
    else {
        return FilteredSeries::empty(grid);
    };

    let gen_points = gen_grid.points();
    let cons_points = cons_grid.points();
    let mut out = Vec::with_capacity(gen_points.len().min(cons_points.len()));
    let (mut i, mut j) = (0, 0);
    while i < gen_points.len() && j < cons_points.len() {
        let g = gen_points[i];
        let c = cons_points[j];
        match g.timestamp.cmp(&c.timestamp) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                if g.value.is_finite() && is_defined_consumption(c.value) {
                    out.push(FilteredPoint {
                        timestamp: g.timestamp,
                        generation: g.value,
                        consumption: c.value,
                    });
                }
                i += 1;
                j += 1;
            }
        }
    }

    FilteredSeries {
        resolution: grid,
        points: out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn hour(h: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn hourly(hours: &[i64], value: f64) -> AlignedSeries {
        AlignedSeries::accumulate(Resolution::Hour, hours.iter().map(|h| (hour(*h), value)))
    }

    #[test]
    fn keeps_only_common_timestamps() {
        let generation = hourly(&[0, 1, 2, 4], 10.0);
        let consumption = hourly(&[1, 2, 3, 4], 20.0);
        let f = filter(&generation, &consumption);
        let got: Vec<_> = f.timestamps().collect();
        assert_eq!(got, vec![hour(1), hour(2), hour(4)]);
        assert_eq!(f.last_timestamp(), Some(hour(4)));
    }

    #[test]
    fn zero_consumption_is_excluded() {
        let generation = hourly(&[0, 1], 10.0);
        let consumption =
            AlignedSeries::accumulate(Resolution::Hour, vec![(hour(0), 0.0), (hour(1), 50.0)]);
        let f = filter(&generation, &consumption);
        assert_eq!(f.len(), 1);
        assert_eq!(f.points()[0].timestamp, hour(1));
    }

    #[test]
    fn quarter_hour_generation_is_lifted_to_hours() {
        let quarters = (0..8).map(|q| (hour(0) + Duration::minutes(15 * q), 2.5));
        let generation = AlignedSeries::accumulate(Resolution::QuarterHour, quarters);
        let consumption = hourly(&[0, 1, 2], 20.0);
        let f = filter(&generation, &consumption);
        assert_eq!(f.resolution(), Resolution::Hour);
        assert_eq!(f.len(), 2);
        assert!((f.points()[0].generation - 10.0).abs() < 1e-9);
    }

    #[test]
    fn empty_inputs_yield_empty_output() {
        let f = filter(
            &AlignedSeries::empty(Resolution::QuarterHour),
            &AlignedSeries::empty(Resolution::Hour),
        );
        assert!(f.is_empty());
        assert_eq!(f.last_timestamp(), None);
    }
}
