#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wende::error::{Result, WendeError};
use wende::series::{AlignedSeries, Resolution, TimeRange, Timestamp};
use wende::sources::{ConsumptionSource, GenerationSource, Sources, Weather, WeatherSource};

pub type ShareFn = Box<dyn Fn(Timestamp) -> f64 + Send + Sync>;

/// Consumption in every hour
pub const LOAD_MWH: f64 = 50_000.0;

/// In-memory upstream with hourly data everywhere before `now`.
///
/// Records every generation window it is asked for.
pub struct FakeGrid {
    share: ShareFn,
    pub generation_calls: Mutex<Vec<TimeRange>>,
    pub weather_calls: AtomicUsize,
    pub fail: AtomicBool,
    pub empty: AtomicBool,
}

impl FakeGrid {
    pub fn constant(share: f64) -> Arc<Self> {
        Self::with_share(move |_| share)
    }

    /// 0.3 at even hours, 0.7 at odd hours
    pub fn alternating() -> Arc<Self> {
        Self::with_share(|ts| if ts.timestamp() / 3600 % 2 == 0 { 0.3 } else { 0.7 })
    }

    pub fn with_share<F>(share: F) -> Arc<Self>
    where
        F: Fn(Timestamp) -> f64 + Send + Sync + 'static,
    {
        Arc::new(Self {
            share: Box::new(share),
            generation_calls: Mutex::new(Vec::new()),
            weather_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            empty: AtomicBool::new(false),
        })
    }

    pub fn sources(self: &Arc<Self>) -> Sources {
        Sources::new(self.clone(), self.clone(), self.clone())
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_empty(&self, empty: bool) {
        self.empty.store(empty, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<TimeRange> {
        self.generation_calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.generation_calls.lock().unwrap().clear();
    }

    pub fn share_at(&self, ts: Timestamp) -> f64 {
        (self.share)(ts)
    }

    fn guard(&self, range: TimeRange) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(WendeError::fetch("fake", "upstream down"));
        }
        if self.empty.load(Ordering::SeqCst) {
            return Err(WendeError::empty_window(range.start, range.end));
        }
        Ok(())
    }
}

/// Grid hours `h` with `range.start <= h < range.end`
pub fn hours_in(range: TimeRange) -> Vec<Timestamp> {
    let mut h = Resolution::Hour.floor(range.start);
    if h < range.start {
        h += Duration::hours(1);
    }
    let mut out = Vec::new();
    while h < range.end {
        out.push(h);
        h += Duration::hours(1);
    }
    out
}

/// Mean share over every hour of `range`, computed from scratch
pub fn expected_mean(grid: &FakeGrid, range: TimeRange) -> Option<f64> {
    let hours = hours_in(range);
    if hours.is_empty() {
        return None;
    }
    Some(hours.iter().map(|h| grid.share_at(*h)).sum::<f64>() / hours.len() as f64)
}

#[async_trait]
impl GenerationSource for FakeGrid {
    fn name(&self) -> &'static str {
        "fake-generation"
    }

    async fn fetch_generation(&self, range: TimeRange) -> Result<AlignedSeries> {
        self.generation_calls.lock().unwrap().push(range);
        self.guard(range)?;
        Ok(AlignedSeries::accumulate(
            Resolution::Hour,
            hours_in(range)
                .into_iter()
                .map(|h| (h, (self.share)(h) * LOAD_MWH)),
        ))
    }
}

#[async_trait]
impl ConsumptionSource for FakeGrid {
    fn name(&self) -> &'static str {
        "fake-consumption"
    }

    async fn fetch_consumption(&self, range: TimeRange) -> Result<AlignedSeries> {
        self.guard(range)?;
        Ok(AlignedSeries::accumulate(
            Resolution::Hour,
            hours_in(range).into_iter().map(|h| (h, LOAD_MWH)),
        ))
    }
}

#[async_trait]
impl WeatherSource for FakeGrid {
    fn name(&self) -> &'static str {
        "fake-weather"
    }

    async fn fetch_weather(&self, _date: NaiveDate) -> Result<Weather> {
        self.weather_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(WendeError::fetch("fake", "weather down"));
        }
        Ok(Weather {
            sun_hours: 6.2,
            wind_speed_kmh: 10.0,
        })
    }
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> Timestamp {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// Start of 2025 in Berlin
pub fn berlin_2025() -> Timestamp {
    utc(2024, 12, 31, 23, 0)
}
