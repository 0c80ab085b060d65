//! Upstream data sources
//!
//! Each upstream sits behind a small async trait so the aggregator and the
//! dashboard can be driven by in-memory fakes. [`Sources`] bundles one
//! implementation of each and performs the bottleneck filtering of a window.

use crate::config::Config;
use crate::error::{Result, WendeError};
use crate::filter::{FilteredSeries, filter};
use crate::logging::{StructuredLogger, get_logger};
use crate::series::{AlignedSeries, Resolution, TimeRange};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod entsoe;
pub mod http;
pub mod open_meteo;
pub mod smard;

pub use entsoe::EntsoeClient;
pub use http::HttpClient;
pub use open_meteo::OpenMeteoClient;
pub use smard::SmardClient;

/// National daily weather indicators
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub sun_hours: f64,
    pub wind_speed_kmh: f64,
}

/// Renewable generation in MWh per interval
#[async_trait]
pub trait GenerationSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Generation inside `range`. No data at all is [`WendeError::EmptyWindow`].
    async fn fetch_generation(&self, range: TimeRange) -> Result<AlignedSeries>;
}

/// Total consumption in MWh per interval
#[async_trait]
pub trait ConsumptionSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Consumption inside `range`. No data at all is [`WendeError::EmptyWindow`].
    async fn fetch_consumption(&self, range: TimeRange) -> Result<AlignedSeries>;
}

/// Daily weather
#[async_trait]
pub trait WeatherSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_weather(&self, date: NaiveDate) -> Result<Weather>;
}

/// One implementation per upstream
#[derive(Clone)]
pub struct Sources {
    generation: Arc<dyn GenerationSource>,
    consumption: Arc<dyn ConsumptionSource>,
    weather: Arc<dyn WeatherSource>,
    logger: StructuredLogger,
}

impl std::fmt::Debug for Sources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sources")
            .field("generation", &self.generation.name())
            .field("consumption", &self.consumption.name())
            .field("weather", &self.weather.name())
            .finish()
    }
}

impl Sources {
    pub fn new(
        generation: Arc<dyn GenerationSource>,
        consumption: Arc<dyn ConsumptionSource>,
        weather: Arc<dyn WeatherSource>,
    ) -> Self {
        Self {
            generation,
            consumption,
            weather,
            logger: get_logger("sources"),
        }
    }

    /// Production adapters: ENTSO-E, SMARD and Open-Meteo
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = &config.sources;
        let entsoe = EntsoeClient::new(&settings.entsoe, HttpClient::new("entsoe", settings)?);
        let smard = SmardClient::new(&settings.smard, HttpClient::new("smard", settings)?)?;
        let weather = OpenMeteoClient::new(
            &settings.open_meteo,
            &config.timezone,
            HttpClient::new("open_meteo", settings)?,
        );
        Ok(Self::new(Arc::new(entsoe), Arc::new(smard), Arc::new(weather)))
    }

    /// Fetch generation and consumption for `range` concurrently and keep
    /// only the timestamps both define.
    ///
    /// A source reporting an empty window contributes nothing; any other
    /// failure fails the whole call so no partial window leaks out.
    pub async fn fetch_filtered(&self, range: TimeRange) -> Result<FilteredSeries> {
        if range.is_empty() {
            return Ok(FilteredSeries::empty(Resolution::Hour));
        }

        let (generation, consumption) = tokio::try_join!(
            async {
                empty_on_no_data(
                    self.generation.fetch_generation(range).await,
                    Resolution::QuarterHour,
                )
            },
            async {
                empty_on_no_data(
                    self.consumption.fetch_consumption(range).await,
                    Resolution::Hour,
                )
            },
        )
        .map_err(|e| self.tag(e))?;

        let filtered = filter(&generation.clipped(range), &consumption.clipped(range));
        self.logger.debug(&format!(
            "window {}: {} generation, {} consumption, {} common points",
            range,
            generation.len(),
            consumption.len(),
            filtered.len()
        ));
        Ok(filtered)
    }

    pub async fn fetch_weather(&self, date: NaiveDate) -> Result<Weather> {
        self.weather.fetch_weather(date).await
    }

    // Untyped transport errors are attributed to the upstream pair
    fn tag(&self, err: WendeError) -> WendeError {
        match err {
            WendeError::Timeout { message } | WendeError::Network { message } => WendeError::fetch(
                format!("{}+{}", self.generation.name(), self.consumption.name()),
                message,
            ),
            other => other,
        }
    }
}

fn empty_on_no_data(
    result: Result<AlignedSeries>,
    resolution: Resolution,
) -> Result<AlignedSeries> {
    match result {
        Err(e) if e.is_empty_window() => Ok(AlignedSeries::empty(resolution)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Timestamp;
    use chrono::{Duration, TimeZone, Utc};

    struct Fixed(AlignedSeries);
    struct NoData;
    struct Broken;

    #[async_trait]
    impl GenerationSource for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn fetch_generation(&self, _range: TimeRange) -> Result<AlignedSeries> {
            Ok(self.0.clone())
        }
    }

    #[async_trait]
    impl ConsumptionSource for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn fetch_consumption(&self, _range: TimeRange) -> Result<AlignedSeries> {
            Ok(self.0.clone())
        }
    }

    #[async_trait]
    impl ConsumptionSource for NoData {
        fn name(&self) -> &'static str {
            "none"
        }
        async fn fetch_consumption(&self, range: TimeRange) -> Result<AlignedSeries> {
            Err(WendeError::empty_window(range.start, range.end))
        }
    }

    #[async_trait]
    impl ConsumptionSource for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn fetch_consumption(&self, _range: TimeRange) -> Result<AlignedSeries> {
            Err(WendeError::network("connection reset"))
        }
    }

    #[async_trait]
    impl WeatherSource for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn fetch_weather(&self, _date: NaiveDate) -> Result<Weather> {
            Err(WendeError::fetch("broken", "down"))
        }
    }

    fn hour(h: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn hourly(values: &[f64]) -> AlignedSeries {
        AlignedSeries::accumulate(
            Resolution::Hour,
            values.iter().enumerate().map(|(i, v)| (hour(i as i64), *v)),
        )
    }

    #[tokio::test]
    async fn filtered_window_is_clipped_to_range() {
        let sources = Sources::new(
            Arc::new(Fixed(hourly(&[10.0, 20.0, 30.0, 40.0]))),
            Arc::new(Fixed(hourly(&[100.0, 100.0, 100.0, 100.0]))),
            Arc::new(Broken),
        );
        let got = sources
            .fetch_filtered(TimeRange::new(hour(1), hour(3)))
            .await
            .unwrap();
        let ts: Vec<_> = got.timestamps().collect();
        assert_eq!(ts, vec![hour(1), hour(2)]);
    }

    #[tokio::test]
    async fn empty_window_contributes_nothing() {
        let sources = Sources::new(
            Arc::new(Fixed(hourly(&[10.0]))),
            Arc::new(NoData),
            Arc::new(Broken),
        );
        let got = sources
            .fetch_filtered(TimeRange::new(hour(0), hour(1)))
            .await
            .unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_fails_the_window() {
        let sources = Sources::new(
            Arc::new(Fixed(hourly(&[10.0]))),
            Arc::new(Broken),
            Arc::new(Broken),
        );
        let err = sources
            .fetch_filtered(TimeRange::new(hour(0), hour(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, WendeError::Fetch { .. }));
        assert!(sources.fetch_weather(hour(0).date_naive()).await.is_err());
    }
}
