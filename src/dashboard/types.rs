use crate::aggregator::YearlyAverage;
use crate::cache::Lookup;
use crate::calendar::DayType;
use crate::series::Timestamp;
use crate::sources::Weather;
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// Renewable share of the current local day so far
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodayShare {
    pub date: NaiveDate,
    pub share: Option<f64>,
    /// Latest timestamp where both generation and consumption were known
    pub last_data_at: Option<Timestamp>,
    /// Number of scored intervals
    pub points: usize,
}

/// Yearly average, possibly carried over from an earlier update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyReading {
    #[serde(flatten)]
    pub average: YearlyAverage,
    pub stale: bool,
}

/// Today against long-term references. Positive = above reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub reference_share: f64,
    /// `true` when the configured baseline stood in for the yearly average
    pub reference_is_baseline: bool,
    pub share_diff: Option<f64>,
    pub sun_hours_diff: Option<f64>,
    pub wind_speed_diff: Option<f64>,
}

/// Progress toward the expansion target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetProgress {
    pub target_share: f64,
    pub target_year: i32,
    pub current_share: Option<f64>,
    /// Share still missing, zero once the target is met
    pub remaining: Option<f64>,
    pub years_left: i32,
}

/// A component that could not be refreshed during an update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshFailure {
    pub component: &'static str,
    pub message: String,
}

/// Everything one update produced
#[derive(Debug, Clone, Serialize)]
pub struct DashboardUpdate {
    pub session_id: Uuid,
    pub updated_at: Timestamp,
    pub date: NaiveDate,
    pub today: Option<Lookup<TodayShare>>,
    pub yearly: Option<YearlyReading>,
    pub weather: Option<Lookup<Weather>>,
    pub day_type: DayType,
    pub day_label: &'static str,
    pub demand_hint: &'static str,
    pub comparison: Comparison,
    pub target: TargetProgress,
    pub failures: Vec<RefreshFailure>,
}

impl DashboardUpdate {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Read-only view published after every update and session change
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub last_update: Option<DashboardUpdate>,
    pub session: SessionInfo,
}

/// Session summary for the API
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub started_at: Timestamp,
    pub last_update: Option<Timestamp>,
    pub cached_days: usize,
    pub aggregate_year: Option<i32>,
    pub last_finalized: Option<Timestamp>,
}
