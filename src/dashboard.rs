//! Presentation driver
//!
//! [`Dashboard::update`] refreshes today's share, the weather and the yearly
//! average, recording per-component failures instead of failing as a whole.
//! The remaining accessors only read what earlier updates left behind.

use crate::aggregator::{AggregatorSettings, IncrementalAggregator, YearlyAverage};
use crate::cache::{CacheEntry, CacheStore, Ttl};
use crate::calendar::DayType;
use crate::config::{BaselineConfig, Config, TargetConfig};
use crate::error::{Result, WendeError};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::series::{TimeRange, Timestamp};
use crate::share::mean_share;
use crate::sources::{Sources, Weather};
use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

mod types;

pub use types::{
    Comparison, DashboardSnapshot, DashboardUpdate, RefreshFailure, SessionInfo, TargetProgress,
    TodayShare, YearlyReading,
};

/// Static knobs of the dashboard
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub timezone: Tz,
    pub today_ttl: Ttl,
    pub baseline: BaselineConfig,
    pub target: TargetConfig,
    pub aggregator: AggregatorSettings,
}

impl DashboardSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let today_ttl = Duration::try_seconds(config.cache.today_ttl_secs)
            .map(Ttl::For)
            .ok_or_else(|| WendeError::validation("cache.today_ttl_secs", "Out of range"))?;
        Ok(Self {
            timezone: config.tz()?,
            today_ttl,
            baseline: config.baseline.clone(),
            target: config.target.clone(),
            aggregator: AggregatorSettings::from_config(config)?,
        })
    }
}

/// Per-session state: caches and the running aggregate
#[derive(Debug)]
pub struct DashboardSession {
    id: Uuid,
    started_at: Timestamp,
    today: CacheStore<NaiveDate, TodayShare>,
    weather: CacheStore<NaiveDate, Weather>,
    aggregator: IncrementalAggregator,
    last_update: Option<DashboardUpdate>,
    logger: StructuredLogger,
}

impl DashboardSession {
    fn new(settings: &DashboardSettings, now: Timestamp) -> Self {
        let id = Uuid::new_v4();
        let logger = get_logger_with_context(
            LogContext::new("dashboard").with_session_id(id.to_string()),
        );
        let aggregator = IncrementalAggregator::new(settings.aggregator.clone()).with_logger(
            get_logger_with_context(
                LogContext::new("aggregator").with_session_id(id.to_string()),
            ),
        );
        Self {
            id,
            started_at: now,
            today: CacheStore::new("today"),
            weather: CacheStore::new("weather"),
            aggregator,
            last_update: None,
            logger,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    fn info(&self) -> SessionInfo {
        let last = self.aggregator.last_average();
        SessionInfo {
            session_id: self.id,
            started_at: self.started_at,
            last_update: self.last_update.as_ref().map(|u| u.updated_at),
            cached_days: self.today.len(),
            aggregate_year: last.map(|a| a.year),
            last_finalized: last.map(|a| a.last_finalized),
        }
    }

    fn snapshot(&self) -> Arc<DashboardSnapshot> {
        Arc::new(DashboardSnapshot {
            last_update: self.last_update.clone(),
            session: self.info(),
        })
    }
}

/// Local midnight of `date` as a UTC instant
fn local_midnight(tz: Tz, date: NaiveDate) -> Result<Timestamp> {
    tz.with_ymd_and_hms(date.year(), date.month(), date.day(), 0, 0, 0)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| WendeError::generic(format!("no local midnight on {}", date)))
}

async fn compute_today(
    sources: &Sources,
    tz: Tz,
    date: NaiveDate,
    now: Timestamp,
) -> Result<TodayShare> {
    let start = local_midnight(tz, date)?;
    let filtered = sources.fetch_filtered(TimeRange::new(start, now)).await?;
    if filtered.is_empty() {
        return Err(WendeError::empty_window(start, now));
    }
    Ok(TodayShare {
        date,
        share: mean_share(&filtered),
        last_data_at: filtered.last_timestamp(),
        points: filtered.len(),
    })
}

/// Renewable-share dashboard driven by explicit `update(now)` calls.
///
/// Every state change is also published as a [`DashboardSnapshot`] so readers
/// never have to wait for an update in flight.
#[derive(Debug)]
pub struct Dashboard {
    settings: DashboardSettings,
    sources: Sources,
    session: DashboardSession,
    snapshot_tx: watch::Sender<Arc<DashboardSnapshot>>,
}

impl Dashboard {
    pub fn new(config: &Config, sources: Sources) -> Result<Self> {
        Ok(Self::with_settings(
            DashboardSettings::from_config(config)?,
            sources,
            Utc::now(),
        ))
    }

    pub fn with_settings(settings: DashboardSettings, sources: Sources, now: Timestamp) -> Self {
        let session = DashboardSession::new(&settings, now);
        session.logger.info("session started");
        let (snapshot_tx, _) = watch::channel(session.snapshot());
        Self {
            settings,
            sources,
            session,
            snapshot_tx,
        }
    }

    /// Receiver of the snapshot published after each update or session change
    pub fn subscribe_snapshot(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.session.snapshot());
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    /// Refresh every component for `now`. Never fails as a whole.
    pub async fn update(&mut self, now: Timestamp) -> DashboardUpdate {
        let tz = self.settings.timezone;
        let date = now.with_timezone(&tz).date_naive();
        let mut failures = Vec::new();
        let sources = &self.sources;
        let logger = self.session.logger.clone();

        // Earlier days are never read again
        self.session.today.retain_keys(|d| *d >= date);
        self.session.weather.retain_keys(|d| *d >= date);

        let today = match self
            .session
            .today
            .get_or_fetch(date, self.settings.today_ttl, now, || {
                compute_today(sources, tz, date, now)
            })
            .await
        {
            Ok(lookup) => {
                if lookup.is_stale() {
                    failures.push(RefreshFailure {
                        component: "today",
                        message: format!(
                            "refresh failed, serving value from {}",
                            lookup.produced_at
                        ),
                    });
                }
                Some(lookup)
            }
            Err(e) => {
                logger.warn(&format!("today's share unavailable: {}", e));
                failures.push(RefreshFailure {
                    component: "today",
                    message: e.to_string(),
                });
                None
            }
        };

        let weather = match self
            .session
            .weather
            .get_or_fetch(date, Ttl::Session, now, || sources.fetch_weather(date))
            .await
        {
            Ok(lookup) => Some(lookup),
            Err(e) => {
                logger.warn(&format!("weather unavailable: {}", e));
                failures.push(RefreshFailure {
                    component: "weather",
                    message: e.to_string(),
                });
                None
            }
        };

        let yearly = match self.session.aggregator.update(sources, now).await {
            Ok(average) => Some(YearlyReading {
                average,
                stale: false,
            }),
            Err(e) => {
                logger.warn(&format!("yearly average not updated: {}", e));
                failures.push(RefreshFailure {
                    component: "yearly",
                    message: e.to_string(),
                });
                self.session
                    .aggregator
                    .last_average()
                    .cloned()
                    .map(|average| YearlyReading {
                        average,
                        stale: true,
                    })
            }
        };

        let day_type = DayType::classify(date);
        let yearly_share = yearly.as_ref().and_then(|y| y.average.average);
        let today_share = today.as_ref().and_then(|t| t.value.share);
        let weather_now = weather.as_ref().map(|w| w.value);

        let update = DashboardUpdate {
            session_id: self.session.id,
            updated_at: now,
            date,
            comparison: self.compare(today_share, yearly_share, weather_now),
            target: self.progress(yearly_share, date.year()),
            today,
            yearly,
            weather,
            day_type,
            day_label: day_type.label(),
            demand_hint: day_type.demand_hint(),
            failures,
        };

        if update.is_complete() {
            logger.info(&format!(
                "update complete: today {:?}, year {:?}",
                today_share, yearly_share
            ));
        }
        self.session.last_update = Some(update.clone());
        self.publish();
        update
    }

    fn compare(
        &self,
        today: Option<f64>,
        yearly: Option<f64>,
        weather: Option<Weather>,
    ) -> Comparison {
        let baseline = &self.settings.baseline;
        let (reference_share, reference_is_baseline) = match yearly {
            Some(avg) => (avg, false),
            None => (baseline.renewable_share, true),
        };
        Comparison {
            reference_share,
            reference_is_baseline,
            share_diff: today.map(|t| t - reference_share),
            sun_hours_diff: weather.map(|w| w.sun_hours - baseline.sun_hours),
            wind_speed_diff: weather.map(|w| w.wind_speed_kmh - baseline.wind_speed_kmh),
        }
    }

    fn progress(&self, current: Option<f64>, year: i32) -> TargetProgress {
        let target = &self.settings.target;
        TargetProgress {
            target_share: target.share,
            target_year: target.year,
            current_share: current,
            remaining: current.map(|c| (target.share - c).max(0.0)),
            years_left: (target.year - year).max(0),
        }
    }

    /// Today's entry if still within its TTL
    pub fn cached_today(&self, now: Timestamp) -> Option<&CacheEntry<TodayShare>> {
        let date = now.with_timezone(&self.settings.timezone).date_naive();
        self.session.today.peek(&date, now)
    }

    /// Weather cached for `date` during this session
    pub fn cached_weather(&self, date: NaiveDate) -> Option<Weather> {
        self.session.weather.last_known(&date).map(|e| e.value)
    }

    /// Last successfully computed yearly average
    pub fn yearly_average(&self) -> Option<&YearlyAverage> {
        self.session.aggregator.last_average()
    }

    pub fn last_update(&self) -> Option<&DashboardUpdate> {
        self.session.last_update.as_ref()
    }

    pub fn session_id(&self) -> Uuid {
        self.session.id
    }

    pub fn session_info(&self) -> SessionInfo {
        self.session.info()
    }

    /// Drop today's cached share so the next update refetches it
    pub fn invalidate_today(&mut self, now: Timestamp) -> bool {
        let date = now.with_timezone(&self.settings.timezone).date_naive();
        let dropped = self.session.today.invalidate(&date);
        self.publish();
        dropped
    }

    /// Start a fresh session; caches and the aggregate are discarded
    pub fn reset_session(&mut self, now: Timestamp) -> Uuid {
        self.session.logger.info("session reset");
        self.session = DashboardSession::new(&self.settings, now);
        self.session.logger.info("session started");
        self.publish();
        self.session.id
    }
}
