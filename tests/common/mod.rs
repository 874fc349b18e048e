#![allow(dead_code)]

use chrono::{Months, NaiveDate};
use allocsim::domain::error::AllocsimError;
use allocsim::domain::indicator::Indicators;
pub use allocsim::domain::price_table::{PriceRecord, PriceTable};
use allocsim::domain::schedule::month_end;
use allocsim::domain::weights::TargetWeights;
use allocsim::ports::data_port::DataPort;
use std::collections::BTreeMap;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn weights(pairs: &[(&str, f64)]) -> TargetWeights {
    pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
}

/// One close per calendar month-end, starting at `first`'s month.
pub fn monthly_records(ticker: &str, first: NaiveDate, closes: &[f64]) -> Vec<PriceRecord> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            PriceRecord::new(
                month_end(first + Months::new(i as u32)),
                ticker,
                close,
            )
        })
        .collect()
}

/// One close per calendar day starting at `first`.
pub fn daily_records(ticker: &str, first: NaiveDate, closes: &[f64]) -> Vec<PriceRecord> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceRecord::new(first + chrono::Days::new(i as u64), ticker, close))
        .collect()
}

pub fn indicators_from(records: &[PriceRecord]) -> Indicators {
    Indicators::compute(&PriceTable::from_records(records))
}

/// In-memory data source. Records are filtered the way a real store would.
#[derive(Default)]
pub struct MockDataPort {
    pub records: Vec<PriceRecord>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, records: Vec<PriceRecord>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn with_monthly(self, ticker: &str, first: NaiveDate, closes: &[f64]) -> Self {
        self.with_records(monthly_records(ticker, first, closes))
    }

    pub fn with_constant(self, ticker: &str, first: NaiveDate, months: usize, close: f64) -> Self {
        self.with_monthly(ticker, first, &vec![close; months])
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    fn check(&self) -> Result<(), AllocsimError> {
        match &self.error {
            Some(reason) => Err(AllocsimError::Database {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_closes(
        &self,
        tickers: &[String],
        since: NaiveDate,
    ) -> Result<Vec<PriceRecord>, AllocsimError> {
        self.check()?;
        Ok(self
            .records
            .iter()
            .filter(|r| r.date >= since && tickers.contains(&r.ticker))
            .cloned()
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, AllocsimError> {
        self.check()?;
        let mut symbols: Vec<String> = self.records.iter().map(|r| r.ticker.clone()).collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AllocsimError> {
        self.check()?;
        let dates: BTreeMap<NaiveDate, ()> = self
            .records
            .iter()
            .filter(|r| r.ticker == ticker)
            .map(|r| (r.date, ()))
            .collect();
        Ok(match (dates.keys().next(), dates.keys().next_back()) {
            (Some(&first), Some(&last)) => Some((first, last, dates.len())),
            _ => None,
        })
    }
}
