//! Summary statistics over the portfolio-value series.

use chrono::{Months, NaiveDate};
use serde::Serialize;

use super::portfolio::Snapshot;
use super::schedule::{month_end, quarter_end, year_end, years_between, CalendarInterval};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drawdown {
    /// Signed fraction: -0.5 is a 50% decline.
    pub percentage: f64,
    pub peak_date: NaiveDate,
    pub trough_date: NaiveDate,
    pub peak_value: f64,
    pub trough_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub cagr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingReturns {
    pub average_cagr: f64,
    pub min_cagr: f64,
    pub max_cagr: f64,
    /// Population standard deviation.
    pub stdev_cagr: f64,
    pub periods: Vec<RollingPeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub final_portfolio_value: f64,
    pub total_investment: f64,
    pub final_roi: f64,
    pub mdd: Drawdown,
    pub rolling_returns: Option<RollingReturns>,
}

impl Summary {
    /// `None` for an empty run.
    pub fn compute(
        snapshots: &[Snapshot],
        rolling_window: Option<u32>,
        rolling_step: CalendarInterval,
    ) -> Option<Self> {
        let last = snapshots.last()?;
        let series = value_series(snapshots);
        let mdd = max_drawdown(&series)?;
        let rolling_returns =
            rolling_window.and_then(|years| rolling_returns(&series, years, rolling_step));

        Some(Summary {
            final_portfolio_value: last.portfolio_value,
            total_investment: last.total_investment,
            final_roi: last.roi,
            mdd,
            rolling_returns,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartDatasets {
    pub portfolio_value: Vec<f64>,
    pub total_investment: Vec<f64>,
    pub roi: Vec<f64>,
}

/// Parallel arrays for plotting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<NaiveDate>,
    pub datasets: ChartDatasets,
}

impl ChartData {
    pub fn from_snapshots(snapshots: &[Snapshot]) -> Self {
        ChartData {
            labels: snapshots.iter().map(|s| s.date).collect(),
            datasets: ChartDatasets {
                portfolio_value: snapshots.iter().map(|s| s.portfolio_value).collect(),
                total_investment: snapshots.iter().map(|s| s.total_investment).collect(),
                roi: snapshots.iter().map(|s| s.roi).collect(),
            },
        }
    }
}

pub fn value_series(snapshots: &[Snapshot]) -> Vec<(NaiveDate, f64)> {
    snapshots.iter().map(|s| (s.date, s.portfolio_value)).collect()
}

/// Deepest decline from a running peak.
///
/// The trough is the first date of the deepest drawdown. The peak is the
/// first date on which the running peak reached the level it holds at the
/// trough.
pub fn max_drawdown(series: &[(NaiveDate, f64)]) -> Option<Drawdown> {
    let first = series.first()?;

    let mut running_peaks = Vec::with_capacity(series.len());
    let mut peak = first.1;
    let mut worst = 0.0_f64;
    let mut trough_idx = 0;

    for (i, &(_, value)) in series.iter().enumerate() {
        peak = peak.max(value);
        running_peaks.push(peak);
        let dd = if peak > 0.0 { (value - peak) / peak } else { 0.0 };
        if dd < worst {
            worst = dd;
            trough_idx = i;
        }
    }

    let level = running_peaks[trough_idx];
    let peak_idx = running_peaks[..=trough_idx]
        .iter()
        .position(|p| *p == level)
        .unwrap_or(trough_idx);

    Some(Drawdown {
        percentage: worst,
        peak_date: series[peak_idx].0,
        trough_date: series[trough_idx].0,
        peak_value: series[peak_idx].1,
        trough_value: series[trough_idx].1,
    })
}

/// Period-end labels covering `first..=last` at `step`. Whole-year steps
/// anchor on December, whole-quarter steps on quarter ends, anything else
/// on month ends.
fn period_end_labels(first: NaiveDate, last: NaiveDate, step: CalendarInterval) -> Vec<NaiveDate> {
    let months = step.as_months();
    let anchor = if months % 12 == 0 {
        year_end(first)
    } else if months % 3 == 0 {
        quarter_end(first)
    } else {
        month_end(first)
    };

    let mut labels = Vec::new();
    let mut label = anchor;
    loop {
        labels.push(label);
        if label >= last {
            break;
        }
        label = match label.checked_add_months(Months::new(months)) {
            Some(next) => month_end(next),
            None => break,
        };
    }
    labels
}

/// CAGR over every `window_years` window starting at each step label.
///
/// Start and end are snapped forward to the first series date at or after
/// them. Windows ending past the last date are skipped. `None` when no
/// window qualifies.
pub fn rolling_returns(
    series: &[(NaiveDate, f64)],
    window_years: u32,
    step: CalendarInterval,
) -> Option<RollingReturns> {
    let (first, last) = (series.first()?.0, series.last()?.0);
    let snap = |date: NaiveDate| series.get(series.partition_point(|(d, _)| *d < date));

    let mut periods = Vec::new();
    for start in period_end_labels(first, last, step) {
        let Some(end) = start.checked_add_months(Months::new(window_years.saturating_mul(12)))
        else {
            continue;
        };
        if end > last {
            continue;
        }
        let (Some(&(start_date, start_value)), Some(&(end_date, end_value))) =
            (snap(start), snap(end))
        else {
            continue;
        };

        let years = years_between(start_date, end_date);
        if start_value > 0.0 && years > 0.0 {
            periods.push(RollingPeriod {
                start: start_date,
                end: end_date,
                cagr: (end_value / start_value).powf(1.0 / years) - 1.0,
            });
        }
    }

    if periods.is_empty() {
        return None;
    }

    let n = periods.len() as f64;
    let cagrs = periods.iter().map(|p| p.cagr);
    let mean = cagrs.clone().sum::<f64>() / n;
    let variance = cagrs.clone().map(|c| (c - mean).powi(2)).sum::<f64>() / n;

    Some(RollingReturns {
        average_cagr: mean,
        min_cagr: cagrs.clone().fold(f64::INFINITY, f64::min),
        max_cagr: cagrs.fold(f64::NEG_INFINITY, f64::max),
        stdev_cagr: variance.sqrt(),
        periods,
    })
}
