//! ENTSO-E transparency platform: actual generation per production type
//!
//! Responses are `GL_MarketDocument` XML. Only production types listed in the
//! configuration are summed; MW averages are turned into MWh per quarter hour.

use super::GenerationSource;
use super::http::{HttpClient, snippet};
use crate::config::EntsoeConfig;
use crate::error::{Result, WendeError};
use crate::logging::{StructuredLogger, get_logger};
use crate::series::{AlignedSeries, Resolution, TimeRange, Timestamp};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use quick_xml::events::Event;
use serde::Deserialize;
use std::collections::HashMap;

const SOURCE: &str = "entsoe";

/// Reason code the platform uses for "no matching data found"
const NO_DATA_REASON: &str = "999";

/// Longest window requested in one call
const MAX_REQUEST_SPAN_DAYS: i64 = 31;

/// Periods are at most a year long
const MAX_PERIOD_DAYS: i64 = 370;

#[derive(Debug, Deserialize)]
struct MarketDocument {
    #[serde(rename = "TimeSeries", default)]
    time_series: Vec<XmlTimeSeries>,
}

#[derive(Debug, Deserialize)]
struct XmlTimeSeries {
    #[serde(rename = "curveType", default)]
    curve_type: Option<String>,
    #[serde(rename = "MktPSRType", default)]
    psr: Option<XmlPsrType>,
    #[serde(rename = "Period", default)]
    periods: Vec<XmlPeriod>,
}

#[derive(Debug, Deserialize)]
struct XmlPsrType {
    #[serde(rename = "psrType")]
    psr_type: String,
}

#[derive(Debug, Deserialize)]
struct XmlPeriod {
    #[serde(rename = "timeInterval")]
    time_interval: XmlInterval,
    resolution: String,
    #[serde(rename = "Point", default)]
    points: Vec<XmlPoint>,
}

#[derive(Debug, Deserialize)]
struct XmlInterval {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct XmlPoint {
    position: u32,
    quantity: f64,
}

#[derive(Debug, Deserialize)]
struct Acknowledgement {
    #[serde(rename = "Reason", default)]
    reasons: Vec<XmlReason>,
}

#[derive(Debug, Deserialize)]
struct XmlReason {
    code: String,
    #[serde(default)]
    text: Option<String>,
}

/// Name of the document's root element, without namespace prefix
fn root_element(xml: &str) -> Option<String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// ENTSO-E timestamps come as `2025-01-01T00:00Z`, occasionally with seconds
fn parse_time(raw: &str) -> Result<Timestamp> {
    let raw = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ") {
        return Ok(naive.and_utc());
    }
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

/// Format used for `periodStart` / `periodEnd`
pub fn format_period(ts: Timestamp) -> String {
    ts.format("%Y%m%d%H%M").to_string()
}

fn ceil_hour(ts: Timestamp) -> Timestamp {
    let floor = Resolution::Hour.floor(ts);
    if floor == ts { ts } else { floor + Duration::hours(1) }
}

/// Quarter-hour MWh values of one period, as `(slot, mwh)` pairs
fn expand_period(period: &XmlPeriod, fill_forward: bool) -> Result<Vec<(Timestamp, f64)>> {
    let resolution = Resolution::from_iso8601(&period.resolution).ok_or_else(|| {
        WendeError::fetch(
            SOURCE,
            format!("unsupported resolution {}", period.resolution),
        )
    })?;
    let start = parse_time(&period.time_interval.start)?;
    let end = parse_time(&period.time_interval.end)?;
    if end - start > Duration::days(MAX_PERIOD_DAYS) {
        return Err(WendeError::fetch(
            SOURCE,
            format!("period {} .. {} is implausibly long", start, end),
        ));
    }
    let step = resolution.duration();
    let slots = u32::try_from(((end - start).num_minutes() / step.num_minutes()).max(0))
        .unwrap_or(0);
    let parts = resolution
        .subdivisions(Resolution::QuarterHour)
        .unwrap_or(1);

    let mut points: Vec<&XmlPoint> = period
        .points
        .iter()
        .filter(|p| p.position >= 1 && p.position <= slots && p.quantity.is_finite())
        .collect();
    points.sort_by_key(|p| p.position);

    // Position n covers [start + (n-1) * step, start + n * step)
    let mut by_slot: Vec<(u32, f64)> = Vec::with_capacity(slots as usize);
    if fill_forward {
        let mut iter = points.iter().peekable();
        let mut current: Option<f64> = None;
        for pos in 1..=slots {
            while let Some(p) = iter.peek() {
                if p.position <= pos {
                    current = Some(p.quantity);
                    iter.next();
                } else {
                    break;
                }
            }
            if let Some(mw) = current {
                by_slot.push((pos, mw));
            }
        }
    } else {
        by_slot.extend(points.iter().map(|p| (p.position, p.quantity)));
    }

    let quarter_mwh = Resolution::QuarterHour.hours();
    let mut out = Vec::with_capacity(by_slot.len() * parts as usize);
    for (pos, mw) in by_slot {
        let Some(slot_start) = start.checked_add_signed(step * (pos as i32 - 1)) else {
            continue;
        };
        for q in 0..parts {
            if let Some(ts) =
                slot_start.checked_add_signed(Resolution::QuarterHour.duration() * q as i32)
            {
                out.push((ts, mw * quarter_mwh));
            }
        }
    }
    Ok(out)
}

/// Parse a generation document into renewable MWh per quarter hour.
///
/// The result is clipped to `range` and truncated to the earliest last slot
/// reported across production types, so a lagging type never leaves a
/// partially summed tail. An acknowledgement with reason `999` is
/// [`WendeError::EmptyWindow`].
pub fn parse_generation(
    xml: &str,
    psr_types: &[String],
    range: TimeRange,
) -> Result<AlignedSeries> {
    match root_element(xml).as_deref() {
        Some("GL_MarketDocument") => {}
        Some("Acknowledgement_MarketDocument") => {
            let ack: Acknowledgement = quick_xml::de::from_str(xml)?;
            if ack.reasons.iter().any(|r| r.code.trim() == NO_DATA_REASON) {
                return Err(WendeError::empty_window(range.start, range.end));
            }
            let text = ack
                .reasons
                .iter()
                .map(|r| format!("{}: {}", r.code, r.text.as_deref().unwrap_or("")))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(WendeError::fetch(SOURCE, format!("request rejected: {}", text)));
        }
        Some(other) => {
            return Err(WendeError::fetch(
                SOURCE,
                format!("unexpected document {}", other),
            ));
        }
        None => {
            return Err(WendeError::fetch(
                SOURCE,
                format!("response is not XML: {}", snippet(xml)),
            ));
        }
    }

    let doc: MarketDocument = quick_xml::de::from_str(xml)?;
    let mut observations = Vec::new();
    let mut last_by_type: HashMap<String, Timestamp> = HashMap::new();

    for ts in &doc.time_series {
        let Some(psr) = ts.psr.as_ref() else { continue };
        let psr_type = psr.psr_type.trim();
        if !psr_types.iter().any(|t| t == psr_type) {
            continue;
        }
        let fill_forward = ts.curve_type.as_deref().map(str::trim) == Some("A03");
        for period in &ts.periods {
            let slots = expand_period(period, fill_forward)?;
            if let Some(&(last, _)) = slots.last() {
                let entry = last_by_type.entry(psr_type.to_string()).or_insert(last);
                *entry = (*entry).max(last);
            }
            observations.extend(slots);
        }
    }

    let mut series = AlignedSeries::accumulate(Resolution::QuarterHour, observations);
    if let Some(cutoff) = last_by_type.values().min() {
        series.truncate_after(*cutoff);
    }
    Ok(series.clipped(range))
}

/// ENTSO-E client for renewable generation in one bidding zone
#[derive(Debug, Clone)]
pub struct EntsoeClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    domain: String,
    psr_types: Vec<String>,
    logger: StructuredLogger,
}

impl EntsoeClient {
    pub fn new(config: &EntsoeConfig, http: HttpClient) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            domain: config.domain.clone(),
            psr_types: config.psr_types.clone(),
            logger: get_logger(SOURCE),
        }
    }

    async fn fetch_chunk(&self, chunk: TimeRange) -> Result<AlignedSeries> {
        let query = [
            ("securityToken", self.api_key.clone()),
            ("documentType", "A75".to_string()),
            ("processType", "A16".to_string()),
            ("in_Domain", self.domain.clone()),
            ("out_Domain", self.domain.clone()),
            ("periodStart", format_period(Resolution::Hour.floor(chunk.start))),
            ("periodEnd", format_period(ceil_hour(chunk.end))),
        ];
        let (status, body) = self.http.get_text(&self.base_url, &query).await?;
        // Acknowledgements may arrive with an error status
        if !status.is_success() && !body.contains("Acknowledgement_MarketDocument") {
            return Err(WendeError::fetch(
                SOURCE,
                format!("HTTP {}: {}", status, snippet(&body)),
            ));
        }
        parse_generation(&body, &self.psr_types, chunk)
    }
}

#[async_trait]
impl GenerationSource for EntsoeClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_generation(&self, range: TimeRange) -> Result<AlignedSeries> {
        if self.api_key.trim().is_empty() {
            return Err(WendeError::fetch(
                SOURCE,
                "no security token configured (set ENTSOE_API_KEY)",
            ));
        }
        if range.is_empty() {
            return Ok(AlignedSeries::empty(Resolution::QuarterHour));
        }

        let mut observations = Vec::new();
        let mut any_data = false;
        for chunk in range.chunks(Duration::days(MAX_REQUEST_SPAN_DAYS)) {
            match self.fetch_chunk(chunk).await {
                Ok(series) => {
                    any_data = true;
                    observations.extend(series.points().iter().map(|p| (p.timestamp, p.value)));
                }
                Err(e) if e.is_empty_window() => {
                    self.logger.debug(&format!("no generation data for {}", chunk));
                }
                Err(e) => return Err(e),
            }
        }
        if !any_data {
            return Err(WendeError::empty_window(range.start, range.end));
        }

        let series = AlignedSeries::accumulate(Resolution::QuarterHour, observations);
        self.logger.debug(&format!(
            "fetched {} quarter hours of generation for {}",
            series.len(),
            range
        ));
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn renewables() -> Vec<String> {
        EntsoeConfig::default().psr_types
    }

    fn day() -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap(),
        )
    }

    fn doc(series: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<GL_MarketDocument xmlns="urn:iec62325.351:tc57wg16:451-6:generationloaddocument:3:0">
  <mRID>abc</mRID>
  <type>A75</type>
  {series}
</GL_MarketDocument>"#
        )
    }

    fn time_series(
        psr: &str,
        curve: &str,
        resolution: &str,
        start: &str,
        end: &str,
        points: &[(u32, f64)],
    ) -> String {
        let pts: String = points
            .iter()
            .map(|(p, q)| {
                format!("<Point><position>{p}</position><quantity>{q}</quantity></Point>")
            })
            .collect();
        format!(
            r#"<TimeSeries>
    <mRID>1</mRID>
    <businessType>A01</businessType>
    <inBiddingZone_Domain.mRID codingScheme="A01">10Y1001A1001A83F</inBiddingZone_Domain.mRID>
    <quantity_Measure_Unit.name>MAW</quantity_Measure_Unit.name>
    <curveType>{curve}</curveType>
    <MktPSRType><psrType>{psr}</psrType></MktPSRType>
    <Period>
      <timeInterval><start>{start}</start><end>{end}</end></timeInterval>
      <resolution>{resolution}</resolution>
      {pts}
    </Period>
  </TimeSeries>"#
        )
    }

    /// Quarter-hour series from midnight, one point per value
    fn quarters(psr: &str, end: &str, mw: &[f64]) -> String {
        let points: Vec<(u32, f64)> = (1..).zip(mw.iter().copied()).collect();
        time_series(psr, "A01", "PT15M", "2025-03-01T00:00Z", end, &points)
    }

    #[test]
    fn sums_renewables_and_skips_fossil() {
        let xml = doc(&[
            quarters("B16", "2025-03-01T01:00Z", &[400.0; 4]),
            quarters("B19", "2025-03-01T01:00Z", &[100.0; 4]),
            quarters("B04", "2025-03-01T01:00Z", &[9999.0; 4]),
        ]
        .concat());
        let series = parse_generation(&xml, &renewables(), day()).unwrap();
        assert_eq!(series.len(), 4);
        // 500 MW over a quarter hour
        assert!((series.points()[0].value - 125.0).abs() < 1e-9);
    }

    #[test]
    fn curve_a03_forward_fills_missing_positions() {
        let xml = doc(&time_series(
            "B16",
            "A03",
            "PT15M",
            "2025-03-01T00:00Z",
            "2025-03-01T01:00Z",
            &[(1, 40.0), (3, 80.0)],
        ));
        let series = parse_generation(&xml, &renewables(), day()).unwrap();
        let values: Vec<f64> = series.points().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![10.0, 10.0, 20.0, 20.0]);
    }

    #[test]
    fn hourly_periods_are_spread_onto_quarters() {
        let xml = doc(&time_series(
            "B12",
            "A01",
            "PT60M",
            "2025-03-01T00:00Z",
            "2025-03-01T02:00Z",
            &[(1, 100.0), (2, 200.0)],
        ));
        let series = parse_generation(&xml, &renewables(), day()).unwrap();
        assert_eq!(series.len(), 8);
        assert!((series.points()[4].value - 50.0).abs() < 1e-9);
    }

    #[test]
    fn lagging_type_truncates_the_tail() {
        let xml = doc(&[
            quarters("B16", "2025-03-01T01:00Z", &[4.0; 4]),
            quarters("B18", "2025-03-01T00:30Z", &[4.0; 2]),
        ]
        .concat());
        let series = parse_generation(&xml, &renewables(), day()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(
            series.last_timestamp(),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 15, 0).unwrap())
        );
    }

    #[test]
    fn no_data_acknowledgement_is_empty_window() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Acknowledgement_MarketDocument xmlns="urn:iec62325.351:tc57wg16:451-1:acknowledgementdocument:7:0">
  <mRID>x</mRID>
  <Reason><code>999</code><text>No matching data found for Data item ACTUAL_GENERATION</text></Reason>
</Acknowledgement_MarketDocument>"#;
        let err = parse_generation(xml, &renewables(), day()).unwrap_err();
        assert!(err.is_empty_window());
    }

    #[test]
    fn other_acknowledgements_are_fetch_errors() {
        let xml = r#"<Acknowledgement_MarketDocument>
  <Reason><code>401</code><text>Unauthorized</text></Reason>
</Acknowledgement_MarketDocument>"#;
        let err = parse_generation(xml, &renewables(), day()).unwrap_err();
        assert!(matches!(err, WendeError::Fetch { .. }));
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_generation("not xml at all", &renewables(), day()).is_err());
        assert!(parse_generation("<html><body/></html>", &renewables(), day()).is_err());
    }

    #[test]
    fn period_format_is_compact_utc() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 7, 0, 0).unwrap();
        assert_eq!(format_period(ts), "202503010700");
        assert_eq!(
            ceil_hour(Utc.with_ymd_and_hms(2025, 3, 1, 7, 20, 0).unwrap()),
            Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
        );
    }
}
