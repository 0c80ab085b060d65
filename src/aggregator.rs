//! Incremental yearly renewable-share average
//!
//! The year is split at a staleness horizon. Everything before it is
//! finalized: scored once, folded into a running [`ShareTally`] and never
//! fetched again. Everything after it is volatile and re-fetched on every
//! update. Each update therefore only pulls `[last_finalized, now)`, which
//! stays about one horizon long no matter how far into the year we are.
//!
//! An update works on a copy of the aggregate and only commits it once every
//! fetch succeeded, so a failure never leaves a half-folded tally behind.

use crate::config::Config;
use crate::error::{Result, WendeError};
use crate::logging::{StructuredLogger, get_logger};
use crate::series::{Resolution, TimeRange, Timestamp};
use crate::share::{ShareTally, score};
use crate::sources::Sources;
use chrono::{Datelike, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;

/// Tunables of the incremental aggregation
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Age after which data is treated as final
    pub staleness_horizon: Duration,
    /// Averages below this are rejected as incomplete upstream data
    pub min_plausible_share: f64,
    /// Timezone deciding where a calendar year starts
    pub timezone: Tz,
    /// Grid the horizon is aligned to
    pub grid: Resolution,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            staleness_horizon: Duration::days(14),
            min_plausible_share: 0.10,
            timezone: chrono_tz::Europe::Berlin,
            grid: Resolution::Hour,
        }
    }
}

impl AggregatorSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let days = config.aggregation.staleness_horizon_days;
        let staleness_horizon = Duration::try_days(days).ok_or_else(|| {
            WendeError::validation(
                "aggregation.staleness_horizon_days",
                "Out of range",
            )
        })?;
        Ok(Self {
            staleness_horizon,
            min_plausible_share: config.aggregation.min_plausible_share,
            timezone: config.tz()?,
            grid: Resolution::Hour,
        })
    }

    /// Calendar year `ts` falls into, in the configured timezone
    pub fn year_of(&self, ts: Timestamp) -> i32 {
        ts.with_timezone(&self.timezone).year()
    }

    /// `[Jan 1, Jan 1 of the next year)` in local time, as UTC instants
    pub fn year_window(&self, year: i32) -> Result<TimeRange> {
        let start = self.local_new_year(year)?;
        let end = self.local_new_year(year + 1)?;
        Ok(TimeRange::new(start, end))
    }

    fn local_new_year(&self, year: i32) -> Result<Timestamp> {
        self.timezone
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| WendeError::generic(format!("no local midnight on {}-01-01", year)))
    }
}

/// Finalized running state for one calendar year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyAggregate {
    pub year: i32,
    pub finalized: ShareTally,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    /// Everything before this instant is folded into `finalized`
    pub last_finalized: Option<Timestamp>,
}

impl YearlyAggregate {
    pub fn new(year: i32, window: TimeRange) -> Self {
        Self {
            year,
            finalized: ShareTally::default(),
            window_start: window.start,
            window_end: window.end,
            last_finalized: None,
        }
    }
}

/// Outcome of one update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyAverage {
    pub year: i32,
    /// Mean share over the year so far; `None` when nothing could be scored
    pub average: Option<f64>,
    pub finalized: ShareTally,
    pub volatile: ShareTally,
    pub last_finalized: Timestamp,
    /// Volatile window fetched by this update
    pub fetched: TimeRange,
    /// Whether this update had to build the finalized segment from scratch
    pub cold_start: bool,
    pub computed_at: Timestamp,
}

/// Year-keyed incremental aggregator
#[derive(Debug)]
pub struct IncrementalAggregator {
    settings: AggregatorSettings,
    aggregates: BTreeMap<i32, YearlyAggregate>,
    last_average: Option<YearlyAverage>,
    logger: StructuredLogger,
}

impl IncrementalAggregator {
    pub fn new(settings: AggregatorSettings) -> Self {
        Self {
            settings,
            aggregates: BTreeMap::new(),
            last_average: None,
            logger: get_logger("aggregator"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Committed aggregate for `year`
    pub fn aggregate(&self, year: i32) -> Option<&YearlyAggregate> {
        self.aggregates.get(&year)
    }

    /// Result of the last successful update
    pub fn last_average(&self) -> Option<&YearlyAverage> {
        self.last_average.as_ref()
    }

    /// Forget all state; the next update is a cold start
    pub fn reset(&mut self) {
        self.aggregates.clear();
        self.last_average = None;
    }

    /// Finalization boundary for `now`: aligned down to the grid and never
    /// before the start of the year window
    pub fn horizon(&self, now: Timestamp, aggregate: &YearlyAggregate) -> Timestamp {
        let raw = self.settings.grid.floor(now - self.settings.staleness_horizon);
        raw.max(aggregate.window_start)
    }

    /// Bring the running average up to `now`.
    ///
    /// Errors leave the committed state untouched. A `now` before the last
    /// finalized instant, or in a year older than the newest aggregate, is
    /// [`WendeError::ClockSkew`].
    pub async fn update(&mut self, sources: &Sources, now: Timestamp) -> Result<YearlyAverage> {
        let year = self.settings.year_of(now);

        if let Some((&newest, aggregate)) = self.aggregates.iter().next_back()
            && year < newest
        {
            return Err(WendeError::clock_skew(
                now,
                aggregate.last_finalized.unwrap_or(aggregate.window_start),
            ));
        }

        let mut working = match self.aggregates.get(&year) {
            Some(existing) => existing.clone(),
            None => {
                self.logger
                    .info(&format!("starting aggregate for {}", year));
                YearlyAggregate::new(year, self.settings.year_window(year)?)
            }
        };

        if let Some(last) = working.last_finalized
            && now < last
        {
            return Err(WendeError::clock_skew(now, last));
        }

        let horizon = self.horizon(now, &working);
        let mut cold_start = false;

        let last_finalized = match working.last_finalized {
            Some(last) => last,
            None => {
                cold_start = true;
                let cold = TimeRange::new(working.window_start, horizon);
                self.logger
                    .info(&format!("cold start: fetching finalized segment {}", cold));
                let filtered = sources.fetch_filtered(cold).await?;
                let tally: ShareTally = score(&filtered).into_iter().map(|p| p.share).collect();
                working.finalized.merge(tally);
                working.last_finalized = Some(horizon);
                horizon
            }
        };

        let fetched = TimeRange::new(last_finalized, now);
        let filtered = sources.fetch_filtered(fetched).await?;

        let mut promoted = ShareTally::default();
        let mut volatile = ShareTally::default();
        for point in score(&filtered) {
            if point.timestamp < horizon {
                promoted.add(point.share);
            } else {
                volatile.add(point.share);
            }
        }
        working.finalized.merge(promoted);
        if horizon > last_finalized {
            working.last_finalized = Some(horizon);
        }

        let average = working.finalized.combined(volatile).mean();
        if let Some(avg) = average
            && avg < self.settings.min_plausible_share
        {
            return Err(WendeError::fetch(
                "aggregator",
                format!(
                    "data incomplete: yearly average {:.3} below plausible minimum {:.3}",
                    avg, self.settings.min_plausible_share
                ),
            ));
        }

        let result = YearlyAverage {
            year,
            average,
            finalized: working.finalized,
            volatile,
            last_finalized: working.last_finalized.unwrap_or(horizon),
            fetched,
            cold_start,
            computed_at: now,
        };

        if promoted.count > 0 {
            self.logger.debug(&format!(
                "promoted {} points, finalized up to {}",
                promoted.count, result.last_finalized
            ));
        }

        // Commit; only the current year is kept
        self.aggregates.retain(|y, _| *y >= year);
        self.aggregates.insert(year, working);
        self.last_average = Some(result.clone());
        Ok(result)
    }
}
