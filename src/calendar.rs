//! Day classification for the demand hint
//!
//! Public holidays follow the Berlin (BE) calendar. Movable feasts are derived
//! from Easter Sunday.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

/// Kind of day, as far as electricity demand is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    Holiday,
    Weekend,
    WorkingDay,
}

impl DayType {
    pub fn classify(date: NaiveDate) -> Self {
        if is_berlin_holiday(date) {
            Self::Holiday
        } else if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            Self::Weekend
        } else {
            Self::WorkingDay
        }
    }

    /// Human-readable name shown next to today's share
    pub fn label(self) -> &'static str {
        match self {
            Self::Holiday => "Holiday",
            Self::Weekend => "Weekend",
            Self::WorkingDay => "Working Day",
        }
    }

    /// Lower demand lifts the renewable share
    pub fn demand_hint(self) -> &'static str {
        match self {
            Self::Holiday | Self::Weekend => "lower demand",
            Self::WorkingDay => "higher demand",
        }
    }
}

/// Easter Sunday (Gregorian), anonymous computus
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Public holidays observed in Berlin for `year`, ascending
pub fn berlin_holidays(year: i32) -> Vec<NaiveDate> {
    let fixed: &[(u32, u32)] = &[(1, 1), (5, 1), (10, 3), (12, 25), (12, 26)];
    let mut days: Vec<NaiveDate> = fixed
        .iter()
        .filter_map(|&(m, d)| NaiveDate::from_ymd_opt(year, m, d))
        .collect();

    // International Women's Day since 2019
    if year >= 2019
        && let Some(d) = NaiveDate::from_ymd_opt(year, 3, 8)
    {
        days.push(d);
    }
    // Liberation Day, proclaimed for the 75th and 80th anniversaries only
    if (year == 2020 || year == 2025)
        && let Some(d) = NaiveDate::from_ymd_opt(year, 5, 8)
    {
        days.push(d);
    }

    if let Some(easter) = easter_sunday(year) {
        for offset in [-2, 1, 39, 50] {
            days.push(easter + Duration::days(offset));
        }
    }

    days.sort_unstable();
    days
}

pub fn is_berlin_holiday(date: NaiveDate) -> bool {
    berlin_holidays(date.year()).contains(&date)
}
