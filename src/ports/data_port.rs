//! Price data access port.

use crate::domain::error::AllocsimError;
use crate::domain::price_table::PriceRecord;
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily closes for `tickers` dated on or after `since`, in any order.
    /// Tickers with no rows are simply absent from the result.
    fn fetch_closes(
        &self,
        tickers: &[String],
        since: NaiveDate,
    ) -> Result<Vec<PriceRecord>, AllocsimError>;

    fn list_symbols(&self) -> Result<Vec<String>, AllocsimError>;

    /// First date, last date and row count for `ticker`.
    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AllocsimError>;
}
