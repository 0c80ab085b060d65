//! Time-series primitives shared by the source adapters and the calculators
//!
//! Every series lives on a fixed resolution grid. Values are energy volumes in
//! MWh per interval unless a caller states otherwise.

use crate::error::{Result, WendeError};
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Instant type used across the crate
pub type Timestamp = DateTime<Utc>;

/// A single observation on a grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl TimePoint {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Grid resolution of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    QuarterHour,
    Hour,
    Day,
}

impl Resolution {
    /// Length of one grid interval
    pub fn duration(self) -> Duration {
        match self {
            Self::QuarterHour => Duration::minutes(15),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
        }
    }

    /// Interval length in hours (MW -> MWh factor)
    pub fn hours(self) -> f64 {
        match self {
            Self::QuarterHour => 0.25,
            Self::Hour => 1.0,
            Self::Day => 24.0,
        }
    }

    /// Parse an ISO-8601 duration as used by ENTSO-E (`PT15M`, `PT60M`, `P1D`)
    pub fn from_iso8601(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "PT15M" => Some(Self::QuarterHour),
            "PT60M" | "PT1H" => Some(Self::Hour),
            "P1D" | "PT1440M" | "PT24H" => Some(Self::Day),
            _ => None,
        }
    }

    /// Align a timestamp down onto this grid (UTC based)
    pub fn floor(self, ts: Timestamp) -> Timestamp {
        ts.duration_trunc(self.duration()).unwrap_or(ts)
    }

    /// Whether a timestamp sits exactly on this grid
    pub fn is_aligned(self, ts: Timestamp) -> bool {
        self.floor(ts) == ts
    }

    /// How many `finer` intervals make up one interval of `self`
    pub fn subdivisions(self, finer: Resolution) -> Option<u32> {
        if finer > self {
            return None;
        }
        let ratio = self.duration().num_minutes() / finer.duration().num_minutes();
        u32::try_from(ratio).ok()
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::QuarterHour => "15min",
            Self::Hour => "1h",
            Self::Day => "1d",
        };
        f.write_str(label)
    }
}

/// Ordered points on one grid with strictly increasing, unique timestamps
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedSeries {
    resolution: Resolution,
    points: Vec<TimePoint>,
}

impl AlignedSeries {
    /// Build a series from already ordered points, validating the invariants
    pub fn new(resolution: Resolution, points: Vec<TimePoint>) -> Result<Self> {
        for pair in points.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(WendeError::validation(
                    "series.timestamps",
                    "timestamps must be strictly increasing",
                ));
            }
        }
        if let Some(p) = points.iter().find(|p| !resolution.is_aligned(p.timestamp)) {
            return Err(WendeError::validation(
                "series.timestamps".to_string(),
                format!("{} is not aligned to the {} grid", p.timestamp, resolution),
            ));
        }
        if points.iter().any(|p| !p.value.is_finite()) {
            return Err(WendeError::validation(
                "series.values",
                "values must be finite",
            ));
        }
        Ok(Self { resolution, points })
    }

    /// Empty series on a grid
    pub fn empty(resolution: Resolution) -> Self {
        Self {
            resolution,
            points: Vec::new(),
        }
    }

    /// Build a series from unordered observations, summing values that land on
    /// the same grid slot. Non-finite values are treated as missing.
    pub fn accumulate<I>(resolution: Resolution, observations: I) -> Self
    where
        I: IntoIterator<Item = (Timestamp, f64)>,
    {
        let mut slots: BTreeMap<Timestamp, f64> = BTreeMap::new();
        for (ts, value) in observations {
            if !value.is_finite() {
                continue;
            }
            *slots.entry(resolution.floor(ts)).or_insert(0.0) += value;
        }
        Self {
            resolution,
            points: slots
                .into_iter()
                .map(|(timestamp, value)| TimePoint { timestamp, value })
                .collect(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.points.last().map(|p| p.timestamp)
    }

    /// Value at an exact grid timestamp
    pub fn get(&self, ts: Timestamp) -> Option<f64> {
        self.points
            .binary_search_by_key(&ts, |p| p.timestamp)
            .ok()
            .map(|idx| self.points[idx].value)
    }

    /// Points with `start <= timestamp < end`
    pub fn between(&self, start: Timestamp, end: Timestamp) -> &[TimePoint] {
        let lo = self.points.partition_point(|p| p.timestamp < start);
        let hi = self.points.partition_point(|p| p.timestamp < end);
        if lo >= hi { &[] } else { &self.points[lo..hi] }
    }

    /// Copy of the points inside `range`
    pub fn clipped(&self, range: TimeRange) -> Self {
        Self {
            resolution: self.resolution,
            points: self.between(range.start, range.end).to_vec(),
        }
    }

    /// Drop every point after `cutoff` (inclusive bound)
    pub fn truncate_after(&mut self, cutoff: Timestamp) {
        let keep = self.points.partition_point(|p| p.timestamp <= cutoff);
        self.points.truncate(keep);
    }

    /// Sum values onto a coarser grid. A coarse slot is only emitted when all
    /// of its finer sub-slots are present, so partially reported intervals are
    /// missing rather than under-counted.
    pub fn aggregate_to(&self, target: Resolution) -> Result<Self> {
        if target == self.resolution {
            return Ok(self.clone());
        }
        let Some(parts) = target.subdivisions(self.resolution) else {
            return Err(WendeError::validation(
                "series.resolution".to_string(),
                format!("cannot aggregate {} onto finer {}", self.resolution, target),
            ));
        };

        let mut out = Vec::new();
        let mut current: Option<(Timestamp, f64, u32)> = None;
        for p in &self.points {
            let slot = target.floor(p.timestamp);
            match current.as_mut() {
                Some((ts, sum, count)) if *ts == slot => {
                    *sum += p.value;
                    *count += 1;
                }
                _ => {
                    if let Some((ts, sum, count)) = current.take()
                        && count == parts
                    {
                        out.push(TimePoint::new(ts, sum));
                    }
                    current = Some((slot, p.value, 1));
                }
            }
        }
        if let Some((ts, sum, count)) = current
            && count == parts
        {
            out.push(TimePoint::new(ts, sum));
        }

        Ok(Self {
            resolution: target,
            points: out,
        })
    }
}

impl<'a> IntoIterator for &'a AlignedSeries {
    type Item = &'a TimePoint;
    type IntoIter = std::slice::Iter<'a, TimePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Half-open interval `[start, end)` of instants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    /// Create a range; an inverted range collapses to an empty one at `start`
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Consecutive sub-ranges no longer than `max`, covering `self` exactly
    pub fn chunks(&self, max: Duration) -> Vec<TimeRange> {
        if self.is_empty() || max <= Duration::zero() {
            return vec![*self];
        }
        let mut out = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = (cursor + max).min(self.end);
            out.push(TimeRange::new(cursor, next));
            cursor = next;
        }
        out
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32, m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn new_rejects_unordered_points() {
        let pts = vec![TimePoint::new(ts(1, 0), 1.0), TimePoint::new(ts(0, 0), 1.0)];
        assert!(AlignedSeries::new(Resolution::Hour, pts).is_err());
    }

    #[test]
    fn new_rejects_off_grid_points() {
        let pts = vec![TimePoint::new(ts(1, 10), 1.0)];
        assert!(AlignedSeries::new(Resolution::QuarterHour, pts).is_err());
    }

    #[test]
    fn accumulate_sums_duplicates_and_sorts() {
        let s = AlignedSeries::accumulate(
            Resolution::QuarterHour,
            vec![(ts(0, 15), 2.0), (ts(0, 0), 1.0), (ts(0, 15), 3.0), (ts(0, 30), f64::NAN)],
        );
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(ts(0, 0)), Some(1.0));
        assert_eq!(s.get(ts(0, 15)), Some(5.0));
    }

    #[test]
    fn aggregate_drops_incomplete_hours() {
        let obs = (0..7).map(|i| (ts(0, 0) + Duration::minutes(15 * i), 1.0));
        let s = AlignedSeries::accumulate(Resolution::QuarterHour, obs);
        let hourly = s.aggregate_to(Resolution::Hour).unwrap();
        assert_eq!(hourly.len(), 1);
        assert_eq!(hourly.get(ts(0, 0)), Some(4.0));
        assert_eq!(hourly.get(ts(1, 0)), None);
    }

    #[test]
    fn aggregate_to_finer_grid_fails() {
        let s = AlignedSeries::empty(Resolution::Hour);
        assert!(s.aggregate_to(Resolution::QuarterHour).is_err());
    }

    #[test]
    fn between_is_half_open() {
        let s = AlignedSeries::accumulate(
            Resolution::Hour,
            (0..5).map(|h| (ts(h, 0), f64::from(h))),
        );
        let slice = s.between(ts(1, 0), ts(3, 0));
        assert_eq!(slice.len(), 2);
        assert_eq!(slice[0].timestamp, ts(1, 0));
    }

    #[test]
    fn resolution_parsing_and_subdivisions() {
        assert_eq!(Resolution::from_iso8601("PT15M"), Some(Resolution::QuarterHour));
        assert_eq!(Resolution::from_iso8601("pt60m"), Some(Resolution::Hour));
        assert_eq!(Resolution::from_iso8601("PT30M"), None);
        assert_eq!(Resolution::Hour.subdivisions(Resolution::QuarterHour), Some(4));
        assert_eq!(Resolution::QuarterHour.subdivisions(Resolution::Hour), None);
    }

    #[test]
    fn inverted_range_is_empty() {
        let r = TimeRange::new(ts(5, 0), ts(1, 0));
        assert!(r.is_empty());
        assert_eq!(r.duration(), Duration::zero());
    }

    #[test]
    fn chunks_cover_range_exactly() {
        let r = TimeRange::new(ts(0, 0), ts(10, 0));
        let parts = r.chunks(Duration::hours(4));
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].start, ts(0, 0));
        assert_eq!(parts[2].end, ts(10, 0));
        assert_eq!(parts[2].duration(), Duration::hours(2));
    }
}
