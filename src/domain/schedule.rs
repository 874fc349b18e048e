//! Calendar intervals and the evaluation-date schedule.
//!
//! Rebalancing cadences are whole numbers of calendar months. The theoretical
//! calendar is a run of month-ends starting at the start date's month; each
//! theoretical date is snapped forward to the first label of the monthly
//! price table at or after it.

use chrono::{Datelike, Days, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntervalError {
    #[error("empty interval")]
    Empty,

    #[error("invalid interval count in {0:?}")]
    InvalidCount(String),

    #[error("unknown interval unit in {0:?} (expected M, Q or Y)")]
    UnknownUnit(String),
}

/// A fixed calendar step, stored as a number of months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalendarInterval {
    months: u32,
}

impl CalendarInterval {
    pub fn months(months: u32) -> Option<Self> {
        (months > 0).then_some(CalendarInterval { months })
    }

    pub fn monthly() -> Self {
        CalendarInterval { months: 1 }
    }

    pub fn yearly() -> Self {
        CalendarInterval { months: 12 }
    }

    pub fn as_months(&self) -> u32 {
        self.months
    }
}

impl Default for CalendarInterval {
    fn default() -> Self {
        CalendarInterval::monthly()
    }
}

impl fmt::Display for CalendarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.months % 12 == 0 {
            write!(f, "{}Y", self.months / 12)
        } else {
            write!(f, "{}M", self.months)
        }
    }
}

/// Accepts `1M`, `3M`, `1Q`, `1Y`, `1A`, `3 months`, `1 quarter`, `2 years`.
impl FromStr for CalendarInterval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IntervalError::Empty);
        }

        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (count_str, unit_str) = trimmed.split_at(split);

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| IntervalError::InvalidCount(trimmed.to_string()))?
        };
        if count == 0 {
            return Err(IntervalError::InvalidCount(trimmed.to_string()));
        }

        let per_unit = match unit_str.trim().to_lowercase().as_str() {
            "m" | "me" | "month" | "months" => 1,
            "q" | "qe" | "quarter" | "quarters" => 3,
            "y" | "a" | "ye" | "year" | "years" => 12,
            _ => return Err(IntervalError::UnknownUnit(trimmed.to_string())),
        };

        count
            .checked_mul(per_unit)
            .and_then(CalendarInterval::months)
            .ok_or_else(|| IntervalError::InvalidCount(trimmed.to_string()))
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(date.day0() as u64)
}

/// Last calendar day of `date`'s month.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    first_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Month-ends from `start`'s month through `end`, every `interval` months.
pub fn theoretical_dates(
    start: NaiveDate,
    end: NaiveDate,
    interval: CalendarInterval,
) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut month = first_of_month(start);

    loop {
        let candidate = month_end(month);
        if candidate > end {
            break;
        }
        if candidate >= start {
            dates.push(candidate);
        }
        month = match month.checked_add_months(Months::new(interval.as_months())) {
            Some(m) => m,
            None => break,
        };
    }

    dates
}

/// Snap each theoretical date to the first `labels` entry at or after it,
/// drop snaps past the end of `labels`, dedupe, and clip to `[start, end]`.
///
/// `labels` must be sorted ascending.
pub fn evaluation_dates(
    labels: &[NaiveDate],
    start: NaiveDate,
    end: Option<NaiveDate>,
    interval: CalendarInterval,
) -> Vec<NaiveDate> {
    let Some(&last_label) = labels.last() else {
        return Vec::new();
    };
    let end = end.unwrap_or(last_label);

    let mut indices: Vec<usize> = theoretical_dates(start, end, interval)
        .into_iter()
        .map(|t| labels.partition_point(|d| *d < t))
        .filter(|&i| i < labels.len())
        .collect();
    indices.sort_unstable();
    indices.dedup();

    indices
        .into_iter()
        .map(|i| labels[i])
        .filter(|d| *d >= start && *d <= end)
        .collect()
}

pub fn years_between(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days() as f64 / 365.25
}

pub(crate) fn quarter_end(date: NaiveDate) -> NaiveDate {
    let offset = 2 - date.month0() % 3;
    month_end(
        first_of_month(date)
            .checked_add_months(Months::new(offset))
            .unwrap_or(NaiveDate::MAX),
    )
}

pub(crate) fn year_end(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(NaiveDate::MAX)
}
