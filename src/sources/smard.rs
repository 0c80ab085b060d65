//! SMARD chart data: total grid load for Germany
//!
//! SMARD publishes weekly blocks. `index_<resolution>.json` lists block start
//! times in epoch milliseconds and each block holds `[ms, MWh | null]` pairs.

use super::ConsumptionSource;
use super::http::HttpClient;
use crate::config::SmardConfig;
use crate::error::{Result, WendeError};
use crate::logging::{StructuredLogger, get_logger};
use crate::series::{AlignedSeries, Resolution, TimeRange, Timestamp};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

const SOURCE: &str = "smard";

#[derive(Debug, Deserialize)]
struct BlockIndex {
    timestamps: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct Block {
    series: Vec<(i64, Option<f64>)>,
}

fn from_millis(ms: i64) -> Result<Timestamp> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| WendeError::fetch(SOURCE, format!("timestamp {} out of range", ms)))
}

/// Map a SMARD resolution path segment onto a grid
pub fn resolution_from_name(name: &str) -> Option<Resolution> {
    match name {
        "quarterhour" => Some(Resolution::QuarterHour),
        "hour" => Some(Resolution::Hour),
        "day" => Some(Resolution::Day),
        _ => None,
    }
}

/// Block start times from an index document, ascending
pub fn parse_index(json: &str) -> Result<Vec<i64>> {
    let mut index: BlockIndex = serde_json::from_str(json)?;
    index.timestamps.sort_unstable();
    index.timestamps.dedup();
    Ok(index.timestamps)
}

/// Starts of the blocks that may hold data inside `range`.
///
/// A block runs until the next block starts; the newest block is open ended.
pub fn blocks_overlapping(starts: &[i64], range: TimeRange) -> Vec<i64> {
    let from = range.start.timestamp_millis();
    let to = range.end.timestamp_millis();
    starts
        .iter()
        .enumerate()
        .filter(|(i, start)| {
            let next = starts.get(i + 1).copied().unwrap_or(i64::MAX);
            **start < to && next > from
        })
        .map(|(_, start)| *start)
        .collect()
}

/// Observations of one block that fall inside `range`; nulls are dropped
pub fn parse_block(json: &str, range: TimeRange) -> Result<Vec<(Timestamp, f64)>> {
    let block: Block = serde_json::from_str(json)?;
    let mut out = Vec::new();
    for (ms, value) in block.series {
        let Some(value) = value else { continue };
        let ts = from_millis(ms)?;
        if range.contains(ts) {
            out.push((ts, value));
        }
    }
    Ok(out)
}

/// SMARD client for one filter and region
#[derive(Debug, Clone)]
pub struct SmardClient {
    http: HttpClient,
    base_url: String,
    filter: u32,
    region: String,
    resolution_name: String,
    resolution: Resolution,
    logger: StructuredLogger,
}

impl SmardClient {
    pub fn new(config: &SmardConfig, http: HttpClient) -> Result<Self> {
        let resolution = resolution_from_name(&config.resolution).ok_or_else(|| {
            WendeError::validation("sources.smard.resolution", "Unknown SMARD resolution")
        })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            filter: config.filter,
            region: config.region.clone(),
            resolution_name: config.resolution.clone(),
            resolution,
            logger: get_logger(SOURCE),
        })
    }

    fn index_url(&self) -> String {
        format!(
            "{}/{}/{}/index_{}.json",
            self.base_url, self.filter, self.region, self.resolution_name
        )
    }

    fn block_url(&self, start_ms: i64) -> String {
        format!(
            "{base}/{f}/{r}/{f}_{r}_{res}_{start_ms}.json",
            base = self.base_url,
            f = self.filter,
            r = self.region,
            res = self.resolution_name,
        )
    }
}

#[async_trait]
impl ConsumptionSource for SmardClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_consumption(&self, range: TimeRange) -> Result<AlignedSeries> {
        if range.is_empty() {
            return Ok(AlignedSeries::empty(self.resolution));
        }

        let index = parse_index(&self.http.get_ok_text(&self.index_url(), &[]).await?)?;
        let blocks = blocks_overlapping(&index, range);
        if blocks.is_empty() {
            return Err(WendeError::empty_window(range.start, range.end));
        }

        let mut observations = Vec::new();
        for start in &blocks {
            let body = self.http.get_ok_text(&self.block_url(*start), &[]).await?;
            observations.extend(parse_block(&body, range)?);
        }
        if observations.is_empty() {
            return Err(WendeError::empty_window(range.start, range.end));
        }

        let series = AlignedSeries::accumulate(self.resolution, observations);
        self.logger.debug(&format!(
            "fetched {} points of consumption from {} blocks for {}",
            series.len(),
            blocks.len(),
            range
        ));
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ms(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn index_is_sorted() {
        let idx = parse_index(r#"{"timestamps":[300,100,200,200]}"#).unwrap();
        assert_eq!(idx, vec![100, 200, 300]);
    }

    #[test]
    fn selects_only_overlapping_blocks() {
        let starts = vec![
            ms(2025, 1, 6, 0),
            ms(2025, 1, 13, 0),
            ms(2025, 1, 20, 0),
            ms(2025, 1, 27, 0),
        ];
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2025, 1, 14, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 21, 0, 0, 0).unwrap(),
        );
        assert_eq!(blocks_overlapping(&starts, range), vec![starts[1], starts[2]]);

        let future = TimeRange::new(
            Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 11, 0, 0, 0).unwrap(),
        );
        assert_eq!(blocks_overlapping(&starts, future), vec![starts[3]]);
    }

    #[test]
    fn block_nulls_and_out_of_range_points_are_dropped() {
        let body = format!(
            r#"{{"meta_data":{{"version":1}},"series":[[{},100.5],[{},null],[{},90.0],[{},80.0]]}}"#,
            ms(2025, 1, 13, 22),
            ms(2025, 1, 13, 23),
            ms(2025, 1, 14, 0),
            ms(2025, 1, 15, 0),
        );
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2025, 1, 13, 23, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap(),
        );
        let points = parse_block(&body, range).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].1, 90.0);
    }

    #[test]
    fn malformed_block_is_an_error() {
        let range = TimeRange::new(Utc::now(), Utc::now());
        assert!(parse_block(r#"{"series": "nope"}"#, range).is_err());
    }
}
