//! Precomputed indicator tables.
//!
//! - `IndicatorType`: indicator identity + parameters (serves as HashMap key)
//! - `Indicators`: the monthly price table and every derived table, built
//!   once from the daily `PriceTable` and read-only afterwards

pub mod momentum;
pub mod roc;
pub mod sma;

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

use crate::domain::price_table::PriceTable;

/// Monthly ROC horizons every run needs.
pub const ROC_PERIODS: [usize; 4] = [1, 3, 6, 12];
pub const MONTHLY_SMA_PERIOD: usize = 12;
pub const DAILY_SMA_PERIOD: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    /// Rate of change over n monthly rows.
    Roc(usize),
    /// Blended 1/3/6/12-month momentum.
    Momentum,
    MonthlySma(usize),
    DailySma(usize),
}

impl IndicatorType {
    pub fn is_daily(&self) -> bool {
        matches!(self, IndicatorType::DailySma(_))
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Roc(period) => write!(f, "ROC({})", period),
            IndicatorType::Momentum => write!(f, "MOMENTUM"),
            IndicatorType::MonthlySma(period) => write!(f, "SMA_{}M", period),
            IndicatorType::DailySma(period) => write!(f, "SMA_{}D", period),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Indicators {
    daily: PriceTable,
    monthly: PriceTable,
    tables: HashMap<IndicatorType, PriceTable>,
}

impl Indicators {
    /// Resample `daily` to month-ends and compute the full indicator set.
    pub fn compute(daily: &PriceTable) -> Self {
        let monthly = daily.resample_monthly();
        let mut tables = HashMap::new();

        for period in ROC_PERIODS {
            tables.insert(
                IndicatorType::Roc(period),
                monthly.map_columns(|c| roc::calculate_roc(c, period)),
            );
        }
        tables.insert(
            IndicatorType::Momentum,
            monthly.map_columns(momentum::calculate_momentum),
        );
        tables.insert(
            IndicatorType::MonthlySma(MONTHLY_SMA_PERIOD),
            monthly.map_columns(|c| sma::calculate_sma(c, MONTHLY_SMA_PERIOD)),
        );
        tables.insert(
            IndicatorType::DailySma(DAILY_SMA_PERIOD),
            daily.map_columns(|c| sma::calculate_sma(c, DAILY_SMA_PERIOD)),
        );

        Indicators {
            daily: daily.clone(),
            monthly,
            tables,
        }
    }

    pub fn daily(&self) -> &PriceTable {
        &self.daily
    }

    pub fn monthly(&self) -> &PriceTable {
        &self.monthly
    }

    pub fn table(&self, indicator: IndicatorType) -> Option<&PriceTable> {
        self.tables.get(&indicator)
    }

    /// Indicator value in the row at or before `date`.
    pub fn value_asof(
        &self,
        indicator: IndicatorType,
        ticker: &str,
        date: NaiveDate,
    ) -> Option<f64> {
        self.table(indicator)?.value_asof(ticker, date)
    }

    /// Most recent defined indicator value at or before `date`.
    pub fn last_valid_asof(
        &self,
        indicator: IndicatorType,
        ticker: &str,
        date: NaiveDate,
    ) -> Option<f64> {
        self.table(indicator)?.last_valid_asof(ticker, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_table::PriceRecord;
    use crate::domain::schedule::month_end;
    use chrono::Months;

    fn month_end_series(ticker: &str, months: usize, start: f64, step: f64) -> Vec<PriceRecord> {
        let first = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..months)
            .map(|i| {
                let date = month_end(first + Months::new(i as u32));
                PriceRecord::new(date, ticker, start + step * i as f64)
            })
            .collect()
    }

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Roc(6).to_string(), "ROC(6)");
        assert_eq!(IndicatorType::Momentum.to_string(), "MOMENTUM");
        assert_eq!(IndicatorType::MonthlySma(12).to_string(), "SMA_12M");
        assert_eq!(IndicatorType::DailySma(200).to_string(), "SMA_200D");
    }

    #[test]
    fn indicator_type_daily_flag() {
        assert!(IndicatorType::DailySma(200).is_daily());
        assert!(!IndicatorType::Roc(1).is_daily());
    }

    #[test]
    fn compute_builds_every_table() {
        let daily = PriceTable::from_records(&month_end_series("SPY", 14, 100.0, 1.0));
        let ind = Indicators::compute(&daily);

        for period in ROC_PERIODS {
            assert!(ind.table(IndicatorType::Roc(period)).is_some());
        }
        assert!(ind.table(IndicatorType::Momentum).is_some());
        assert!(ind.table(IndicatorType::MonthlySma(12)).is_some());
        assert!(ind.table(IndicatorType::DailySma(200)).is_some());
        assert_eq!(ind.monthly().len(), 14);
    }

    #[test]
    fn monthly_lookups_use_month_end_rows() {
        let daily = PriceTable::from_records(&month_end_series("SPY", 14, 100.0, 1.0));
        let ind = Indicators::compute(&daily);
        let label = NaiveDate::from_ymd_opt(2021, 1, 31).unwrap();

        let roc1 = ind.value_asof(IndicatorType::Roc(1), "SPY", label).unwrap();
        assert!((roc1 - (112.0 / 111.0 - 1.0)).abs() < 1e-12);

        let sma = ind
            .value_asof(IndicatorType::MonthlySma(12), "SPY", label)
            .unwrap();
        let expected = (101..=112).map(f64::from).sum::<f64>() / 12.0;
        assert!((sma - expected).abs() < 1e-9);

        assert!(ind.value_asof(IndicatorType::Momentum, "SPY", label).is_some());
        let before = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
        assert!(ind.value_asof(IndicatorType::Momentum, "SPY", before).is_none());
        assert!(ind.value_asof(IndicatorType::Roc(1), "QQQ", label).is_none());
    }
}
