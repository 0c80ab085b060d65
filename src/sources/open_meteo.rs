//! Open-Meteo daily weather, averaged over reference locations

use super::http::HttpClient;
use super::{Weather, WeatherSource};
use crate::config::{LocationConfig, OpenMeteoConfig};
use crate::error::{Result, WendeError};
use crate::logging::{StructuredLogger, get_logger};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

const SOURCE: &str = "open_meteo";

#[derive(Debug, Deserialize)]
struct Forecast {
    daily: Option<Daily>,
}

#[derive(Debug, Deserialize)]
struct Daily {
    #[serde(default)]
    sunshine_duration: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
}

/// First day of a daily forecast, sunshine converted to hours.
///
/// `None` when the response carries no complete daily values.
pub fn parse_daily(json: &str) -> Result<Option<Weather>> {
    let forecast: Forecast = serde_json::from_str(json)?;
    let Some(daily) = forecast.daily else {
        return Ok(None);
    };
    let sun = daily.sunshine_duration.first().copied().flatten();
    let wind = daily.wind_speed_10m_max.first().copied().flatten();
    Ok(match (sun, wind) {
        (Some(sun_seconds), Some(wind_speed_kmh)) => Some(Weather {
            sun_hours: sun_seconds / 3600.0,
            wind_speed_kmh,
        }),
        _ => None,
    })
}

/// Arithmetic mean over the locations that answered
pub fn average(samples: &[Weather]) -> Option<Weather> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    Some(Weather {
        sun_hours: samples.iter().map(|w| w.sun_hours).sum::<f64>() / n,
        wind_speed_kmh: samples.iter().map(|w| w.wind_speed_kmh).sum::<f64>() / n,
    })
}

/// Open-Meteo forecast client
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: HttpClient,
    base_url: String,
    locations: Vec<LocationConfig>,
    timezone: String,
    logger: StructuredLogger,
}

impl OpenMeteoClient {
    pub fn new(config: &OpenMeteoConfig, timezone: &str, http: HttpClient) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            locations: config.locations.clone(),
            timezone: timezone.to_string(),
            logger: get_logger(SOURCE),
        }
    }

    async fn fetch_location(
        &self,
        loc: &LocationConfig,
        date: NaiveDate,
    ) -> Result<Option<Weather>> {
        let day = date.format("%Y-%m-%d").to_string();
        let query = [
            ("latitude", loc.latitude.to_string()),
            ("longitude", loc.longitude.to_string()),
            ("daily", "sunshine_duration,wind_speed_10m_max".to_string()),
            ("timezone", self.timezone.clone()),
            ("start_date", day.clone()),
            ("end_date", day),
        ];
        let body = self.http.get_ok_text(&self.base_url, &query).await?;
        parse_daily(&body)
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_weather(&self, date: NaiveDate) -> Result<Weather> {
        let mut samples = Vec::with_capacity(self.locations.len());
        let mut last_error = None;
        for loc in &self.locations {
            match self.fetch_location(loc, date).await {
                Ok(Some(w)) => samples.push(w),
                Ok(None) => self
                    .logger
                    .warn(&format!("no daily weather for {} on {}", loc.name, date)),
                Err(e) => {
                    self.logger
                        .warn(&format!("weather for {} failed: {}", loc.name, e));
                    last_error = Some(e);
                }
            }
        }
        match average(&samples) {
            Some(w) => Ok(w),
            None => Err(last_error.unwrap_or_else(|| {
                WendeError::fetch(SOURCE, format!("no location reported weather for {}", date))
            })),
        }
    }
}
