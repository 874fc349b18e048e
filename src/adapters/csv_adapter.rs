//! CSV price data adapter.
//!
//! Reads a single long-format file with a `date,symbol,close` header
//! (column order free, names case-insensitive). An empty close cell is a
//! missing observation.

use crate::domain::error::AllocsimError;
use crate::domain::price_table::PriceRecord;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    path: PathBuf,
}

struct Columns {
    date: usize,
    symbol: usize,
    close: usize,
}

fn csv_error(reason: impl Into<String>) -> AllocsimError {
    AllocsimError::Database {
        reason: reason.into(),
    }
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AllocsimError> {
        let path = config
            .get_string("csv", "path")
            .ok_or_else(|| AllocsimError::missing("csv", "path"))?;
        Ok(Self::new(PathBuf::from(path)))
    }

    /// Every row in the file, in file order.
    pub fn records(&self) -> Result<Vec<PriceRecord>, AllocsimError> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| csv_error(format!("failed to read {}: {}", self.path.display(), e)))?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| csv_error(format!("CSV parse error: {}", e)))?
            .clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| csv_error(format!("missing {} column", name)))
        };
        let cols = Columns {
            date: find("date")?,
            symbol: find("symbol")?,
            close: find("close")?,
        };

        let mut records = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| csv_error(format!("CSV parse error: {}", e)))?;

            let date_str = record.get(cols.date).unwrap_or_default();
            let day = date_str.get(..10).unwrap_or(date_str);
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map_err(|e| csv_error(format!("invalid date {:?}: {}", date_str, e)))?;

            let symbol = record.get(cols.symbol).unwrap_or_default();
            if symbol.is_empty() {
                return Err(csv_error(format!("missing symbol on {}", date)));
            }

            let close = match record.get(cols.close).unwrap_or_default() {
                "" => f64::NAN,
                raw => raw
                    .parse::<f64>()
                    .map_err(|e| csv_error(format!("invalid close value {:?}: {}", raw, e)))?,
            };

            records.push(PriceRecord::new(date, symbol, close));
        }

        Ok(records)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_closes(
        &self,
        tickers: &[String],
        since: NaiveDate,
    ) -> Result<Vec<PriceRecord>, AllocsimError> {
        let wanted: HashSet<&str> = tickers.iter().map(String::as_str).collect();
        let mut records: Vec<PriceRecord> = self
            .records()?
            .into_iter()
            .filter(|r| r.date >= since && wanted.contains(r.ticker.as_str()))
            .collect();

        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    fn list_symbols(&self) -> Result<Vec<String>, AllocsimError> {
        let mut symbols: Vec<String> = self.records()?.into_iter().map(|r| r.ticker).collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AllocsimError> {
        // Keyed by date so duplicate rows count once, matching the sqlite key.
        let dates: BTreeMap<NaiveDate, ()> = self
            .records()?
            .into_iter()
            .filter(|r| r.ticker == ticker)
            .map(|r| (r.date, ()))
            .collect();

        match (dates.keys().next(), dates.keys().next_back()) {
            (Some(&first), Some(&last)) => Ok(Some((first, last, dates.len()))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const SAMPLE: &str = "date,symbol,close
2024-01-03,SPY,468.0
2024-01-02,SPY,470.0
2024-01-02,AGG,98.5
2023-12-29,QQQ,409.0
2024-01-03,AGG,
";

    #[test]
    fn fetch_filters_and_sorts() {
        let file = write_csv(SAMPLE);
        let adapter = CsvAdapter::new(file.path().to_path_buf());

        let records = adapter
            .fetch_closes(&["SPY".to_string(), "QQQ".to_string()], d(2024, 1, 1))
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, d(2024, 1, 2));
        assert_eq!(records[0].close, 470.0);
        assert_eq!(records[1].close, 468.0);
    }

    #[test]
    fn empty_close_is_missing() {
        let file = write_csv(SAMPLE);
        let adapter = CsvAdapter::new(file.path().to_path_buf());

        let records = adapter
            .fetch_closes(&["AGG".to_string()], d(2024, 1, 1))
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].close.is_nan());
    }

    #[test]
    fn header_order_is_free() {
        let file = write_csv("Symbol,Close,Date\nSPY,1.5,2024-01-02\n");
        let adapter = CsvAdapter::new(file.path().to_path_buf());

        let records = adapter
            .fetch_closes(&["SPY".to_string()], d(2024, 1, 1))
            .unwrap();
        assert_eq!(records, vec![PriceRecord::new(d(2024, 1, 2), "SPY", 1.5)]);
    }

    #[test]
    fn list_symbols_dedups() {
        let file = write_csv(SAMPLE);
        let adapter = CsvAdapter::new(file.path().to_path_buf());
        assert_eq!(adapter.list_symbols().unwrap(), vec!["AGG", "QQQ", "SPY"]);
    }

    #[test]
    fn data_range() {
        let file = write_csv(SAMPLE);
        let adapter = CsvAdapter::new(file.path().to_path_buf());
        assert_eq!(
            adapter.get_data_range("SPY").unwrap(),
            Some((d(2024, 1, 2), d(2024, 1, 3), 2))
        );
        assert_eq!(adapter.get_data_range("XYZ").unwrap(), None);
    }

    #[test]
    fn missing_file_is_database_error() {
        let adapter = CsvAdapter::new(PathBuf::from("/nonexistent/prices.csv"));
        let result = adapter.fetch_closes(&["SPY".to_string()], d(2024, 1, 1));
        assert!(matches!(result, Err(AllocsimError::Database { .. })));
    }

    #[test]
    fn missing_column_is_error() {
        let file = write_csv("date,ticker,close\n2024-01-02,SPY,1.0\n");
        let adapter = CsvAdapter::new(file.path().to_path_buf());
        let err = adapter.list_symbols().unwrap_err();
        assert!(err.to_string().contains("symbol"));
    }

    #[test]
    fn invalid_close_is_error() {
        let file = write_csv("date,symbol,close\n2024-01-02,SPY,abc\n");
        let adapter = CsvAdapter::new(file.path().to_path_buf());
        assert!(adapter.fetch_closes(&["SPY".to_string()], d(2024, 1, 1)).is_err());
    }
}
