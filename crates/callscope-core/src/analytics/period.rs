//! Period buckets and their keys.
//!
//! Keys are part of the stored data and must stay stable:
//!
//! - daily: `YYYY-MM-DD`
//! - weekly: `YYYY-Www`, weeks start on Sunday,
//!   `ww = ceil((days_since_jan1 + weekday(jan1) + 1) / 7)` with Sunday = 0
//! - monthly: `YYYY-MM`
//! - quarterly: `YYYY-Qn`, `n = month0 / 3 + 1`

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl PeriodType {
    pub const ALL: [PeriodType; 4] = [
        PeriodType::Daily,
        PeriodType::Weekly,
        PeriodType::Monthly,
        PeriodType::Quarterly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
            PeriodType::Quarterly => "quarterly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(PeriodType::Daily),
            "weekly" => Some(PeriodType::Weekly),
            "monthly" => Some(PeriodType::Monthly),
            "quarterly" => Some(PeriodType::Quarterly),
            _ => None,
        }
    }
}

/// A calendar period containing a given date. `end` is inclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Period {
    pub period_type: PeriodType,
    pub key: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Calendar date of `ts` as seen from `offset`.
pub fn local_date(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

pub fn period_for(period_type: PeriodType, date: NaiveDate) -> Period {
    let (key, start, end) = match period_type {
        PeriodType::Daily => (date.format("%Y-%m-%d").to_string(), date, date),
        PeriodType::Weekly => {
            let start = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
            (
                format!("{}-W{:02}", date.year(), week_number(date)),
                start,
                start + Duration::days(6),
            )
        }
        PeriodType::Monthly => {
            let start = first_of_month(date.year(), date.month());
            (
                format!("{}-{:02}", date.year(), date.month()),
                start,
                last_day_before(next_month(date.year(), date.month())),
            )
        }
        PeriodType::Quarterly => {
            let quarter = date.month0() / 3 + 1;
            let first_month = (quarter - 1) * 3 + 1;
            let start = first_of_month(date.year(), first_month);
            let end = last_day_before(next_month(date.year(), first_month + 2));
            (format!("{}-Q{}", date.year(), quarter), start, end)
        }
    };
    Period {
        period_type,
        key,
        start,
        end,
    }
}

/// All four periods containing `date`, in [`PeriodType::ALL`] order.
pub fn periods_for(date: NaiveDate) -> Vec<Period> {
    PeriodType::ALL
        .iter()
        .map(|pt| period_for(*pt, date))
        .collect()
}

/// Sunday-based week of the year, starting at 1.
pub fn week_number(date: NaiveDate) -> u32 {
    let jan1 = first_of_month(date.year(), 1);
    let days_since = date.ordinal0();
    let offset = jan1.weekday().num_days_from_sunday() + 1;
    (days_since + offset).div_ceil(7)
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn next_month(year: i32, month: u32) -> NaiveDate {
    if month == 12 {
        first_of_month(year + 1, 1)
    } else {
        first_of_month(year, month + 1)
    }
}

fn last_day_before(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}
