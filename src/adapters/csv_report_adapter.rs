//! CSV report adapter.
//!
//! One row per evaluation date. Fixed columns come first, then four columns
//! per ticker: `{T}_holdings`, `{T}_price`, `{T}_value`, `{T}_weight`.
//! Tickers missing from a snapshot leave their cells empty.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::AllocsimError;
use crate::ports::report_port::ReportPort;

const ASSET_FIELDS: [&str; 4] = ["holdings", "price", "value", "weight"];

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn report_error(e: csv::Error) -> AllocsimError {
    AllocsimError::Report {
        reason: e.to_string(),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), AllocsimError> {
        let tickers: BTreeSet<&str> = result
            .results
            .iter()
            .flat_map(|s| s.assets.keys().map(String::as_str))
            .collect();

        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path).map_err(report_error)?;

        let mut header: Vec<String> = ["date", "portfolio_value", "total_investment", "roi", "cash"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        for ticker in &tickers {
            header.extend(ASSET_FIELDS.iter().map(|f| format!("{ticker}_{f}")));
        }
        writer.write_record(&header).map_err(report_error)?;

        for snapshot in &result.results {
            let mut row = vec![
                snapshot.date.format("%Y-%m-%d").to_string(),
                snapshot.portfolio_value.to_string(),
                snapshot.total_investment.to_string(),
                snapshot.roi.to_string(),
                snapshot.cash.to_string(),
            ];
            for ticker in &tickers {
                match snapshot.assets.get(*ticker) {
                    Some(asset) => row.extend([
                        asset.holdings.to_string(),
                        asset.price.to_string(),
                        asset.value.to_string(),
                        asset.weight.to_string(),
                    ]),
                    None => row.extend(std::iter::repeat_n(String::new(), ASSET_FIELDS.len())),
                }
            }
            writer.write_record(&row).map_err(report_error)?;
        }

        writer.flush()?;
        log::info!("wrote {} rows to {output_path}", result.results.len());
        Ok(())
    }
}
