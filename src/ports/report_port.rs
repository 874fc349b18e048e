//! Report output port.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::AllocsimError;

/// Port for writing a finished run somewhere.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), AllocsimError>;
}
