//! Date-indexed, ticker-columned value tables.
//!
//! `PriceTable` holds daily closes pivoted out of long-format [`PriceRecord`]s
//! and forward-filled per ticker. The same shape carries derived indicator
//! tables (monthly prices, rate of change, moving averages), so every lookup
//! the engine performs goes through one as-of policy: binary search for the
//! rightmost row at or before the query date, undefined if the query predates
//! the first row.

use chrono::{Months, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::error::AllocsimError;
use super::schedule::{first_of_month, month_end};
use crate::ports::data_port::DataPort;

/// Current tradable prices keyed by ticker. Absent means undefined.
pub type PriceMap = HashMap<String, f64>;

/// A single daily close as delivered by a data source.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub close: f64,
}

impl PriceRecord {
    pub fn new(date: NaiveDate, ticker: impl Into<String>, close: f64) -> Self {
        PriceRecord {
            date,
            ticker: ticker.into(),
            close,
        }
    }
}

/// Positive, finite price or nothing.
pub fn tradable_price(prices: &PriceMap, ticker: &str) -> Option<f64> {
    prices
        .get(ticker)
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl PriceTable {
    /// Build from parts. Every column must have one entry per date and dates
    /// must be strictly increasing.
    pub fn new(dates: Vec<NaiveDate>, columns: BTreeMap<String, Vec<Option<f64>>>) -> Self {
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(columns.values().all(|c| c.len() == dates.len()));
        PriceTable { dates, columns }
    }

    /// Pivot long-format records into a table and forward-fill each column.
    ///
    /// Non-finite closes are treated as missing. When the same (date, ticker)
    /// appears more than once the last record wins.
    pub fn from_records(records: &[PriceRecord]) -> Self {
        let dates: Vec<NaiveDate> = records
            .iter()
            .map(|r| r.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_of: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut columns: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        for record in records {
            let column = columns
                .entry(record.ticker.clone())
                .or_insert_with(|| vec![None; dates.len()]);
            if record.close.is_finite() {
                column[row_of[&record.date]] = Some(record.close);
            }
        }

        PriceTable { dates, columns }.forward_filled()
    }

    /// Carry each column's last defined value forward over gaps. Leading
    /// gaps stay undefined.
    pub fn forward_filled(mut self) -> Self {
        for column in self.columns.values_mut() {
            let mut last = None;
            for value in column.iter_mut() {
                match value {
                    Some(v) => last = Some(*v),
                    None => *value = last,
                }
            }
        }
        self
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_ticker(&self, ticker: &str) -> bool {
        self.columns.contains_key(ticker)
    }

    pub fn column(&self, ticker: &str) -> Option<&[Option<f64>]> {
        self.columns.get(ticker).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Index of the rightmost row dated at or before `date`.
    pub fn asof_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.partition_point(|d| *d <= date).checked_sub(1)
    }

    /// Value in the as-of row. Undefined cells stay undefined.
    pub fn value_asof(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let row = self.asof_index(date)?;
        self.columns.get(ticker)?[row]
    }

    /// Most recent defined value at or before `date`.
    pub fn last_valid_asof(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let row = self.asof_index(date)?;
        self.columns.get(ticker)?[..=row]
            .iter()
            .rev()
            .find_map(|v| *v)
    }

    /// Every defined value in the as-of row.
    pub fn prices_asof(&self, date: NaiveDate) -> PriceMap {
        let Some(row) = self.asof_index(date) else {
            return PriceMap::new();
        };
        self.columns
            .iter()
            .filter_map(|(ticker, column)| column[row].map(|v| (ticker.clone(), v)))
            .collect()
    }

    /// One row per calendar month from the first to the last month covered,
    /// labelled with the month-end date, holding the month's last row.
    /// Months without rows are undefined.
    pub fn resample_monthly(&self) -> PriceTable {
        let (Some(first), Some(last)) = (self.first_date(), self.last_date()) else {
            return PriceTable::default();
        };

        let mut labels = Vec::new();
        let mut source_rows = Vec::new();
        let mut month = first_of_month(first);
        let mut consumed = 0;

        while month <= last {
            let label = month_end(month);
            let upto = self.dates.partition_point(|d| *d <= label);
            source_rows.push((upto > consumed).then(|| upto - 1));
            labels.push(label);
            consumed = upto;
            month = match month.checked_add_months(Months::new(1)) {
                Some(m) => m,
                None => break,
            };
        }

        let columns = self
            .columns
            .iter()
            .map(|(ticker, column)| {
                let values = source_rows
                    .iter()
                    .map(|row| row.and_then(|r| column[r]))
                    .collect();
                (ticker.clone(), values)
            })
            .collect();

        PriceTable::new(labels, columns)
    }

    /// Apply `f` to every column, keeping the date index.
    pub fn map_columns<F>(&self, f: F) -> PriceTable
    where
        F: Fn(&[Option<f64>]) -> Vec<Option<f64>>,
    {
        let columns = self
            .columns
            .iter()
            .map(|(ticker, column)| (ticker.clone(), f(column)))
            .collect();
        PriceTable::new(self.dates.clone(), columns)
    }

    /// Combine two tables on the same date index cell by cell. Tickers
    /// missing from `other` produce undefined cells.
    pub fn zip_with<F>(&self, other: &PriceTable, f: F) -> PriceTable
    where
        F: Fn(Option<f64>, Option<f64>) -> Option<f64>,
    {
        debug_assert_eq!(self.dates, other.dates);
        let columns = self
            .columns
            .iter()
            .map(|(ticker, column)| {
                let values = match other.columns.get(ticker) {
                    Some(rhs) => column.iter().zip(rhs).map(|(a, b)| f(*a, *b)).collect(),
                    None => vec![None; column.len()],
                };
                (ticker.clone(), values)
            })
            .collect();
        PriceTable::new(self.dates.clone(), columns)
    }
}

/// Load closes for `tickers` from `lookback_months` before `start_date`
/// onward and build the forward-filled table.
pub fn load_price_table(
    port: &dyn DataPort,
    tickers: &BTreeSet<String>,
    start_date: NaiveDate,
    lookback_months: u32,
) -> Result<PriceTable, AllocsimError> {
    let since = start_date
        .checked_sub_months(Months::new(lookback_months))
        .unwrap_or(NaiveDate::MIN);
    let requested: Vec<String> = tickers.iter().cloned().collect();

    log::info!(
        "loading closes for {} tickers since {}",
        requested.len(),
        since
    );
    let records = port.fetch_closes(&requested, since)?;
    if records.is_empty() {
        return Err(AllocsimError::NoData { tickers: requested });
    }

    let table = PriceTable::from_records(&records);
    for ticker in &requested {
        if !table.has_ticker(ticker) {
            log::warn!("no price rows for {ticker}; it will be treated as untradeable");
        }
    }
    log::debug!(
        "price table: {} rows from {:?} to {:?}",
        table.len(),
        table.first_date(),
        table.last_date()
    );

    Ok(table)
}
