//! Ticker lists and data-coverage checks.
//!
//! Parses ticker lists from configuration and reports, for each ticker a
//! strategy needs, whether the data source can cover the requested window.

use crate::domain::error::AllocsimError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("invalid ticker {0:?}")]
    InvalidTicker(String),

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Comma-separated, upper-cased, order kept.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        if trimmed.contains(char::is_whitespace) {
            return Err(UniverseError::InvalidTicker(trimmed.to_string()));
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerCoverage {
    pub ticker: String,
    pub first: NaiveDate,
    pub last: NaiveDate,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoverageIssue {
    NoData,
    /// History begins after the lookback start, so early indicators are
    /// undefined.
    StartsLate { first: NaiveDate },
    /// History ends before the simulation start.
    EndsEarly { last: NaiveDate },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub issue: CoverageIssue,
}

#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    pub covered: Vec<TickerCoverage>,
    pub issues: Vec<SkippedTicker>,
}

impl CoverageReport {
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check every ticker against the window `[lookback_start, start_date]`.
/// A late start is reported but the ticker still counts as covered; only
/// missing data is fatal, and only when it applies to every ticker.
pub fn check_coverage(
    data_port: &dyn DataPort,
    tickers: &BTreeSet<String>,
    lookback_start: NaiveDate,
    start_date: NaiveDate,
) -> Result<CoverageReport, AllocsimError> {
    let mut report = CoverageReport::default();

    for ticker in tickers {
        let Some((first, last, rows)) = data_port.get_data_range(ticker)? else {
            log::warn!("{ticker}: no data");
            report.issues.push(SkippedTicker {
                ticker: ticker.clone(),
                issue: CoverageIssue::NoData,
            });
            continue;
        };

        if last < start_date {
            log::warn!("{ticker}: data ends {last}, before start {start_date}");
            report.issues.push(SkippedTicker {
                ticker: ticker.clone(),
                issue: CoverageIssue::EndsEarly { last },
            });
        } else if first > lookback_start {
            log::warn!("{ticker}: data starts {first}, after lookback start {lookback_start}");
            report.issues.push(SkippedTicker {
                ticker: ticker.clone(),
                issue: CoverageIssue::StartsLate { first },
            });
        }

        log::debug!("{ticker}: {rows} rows {first}..{last}");
        report.covered.push(TickerCoverage {
            ticker: ticker.clone(),
            first,
            last,
            rows,
        });
    }

    if report.covered.is_empty() {
        return Err(AllocsimError::NoData {
            tickers: tickers.iter().cloned().collect(),
        });
    }

    Ok(report)
}
