//! JSON report adapter.
//!
//! Writes the whole `BacktestResult` (summary, ledger, per-date snapshots
//! and chart series) as one pretty-printed document.

use std::fs;
use std::io::BufWriter;
use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::AllocsimError;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), AllocsimError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), result)?;
        log::info!("wrote JSON report to {output_path}");
        Ok(())
    }
}
