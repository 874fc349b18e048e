//! Account state and the portfolio evaluator.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::price_table::{tradable_price, PriceMap};

/// Holdings and cash. Passed by value through the executor so each
/// evaluation step works on its own copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub holdings: BTreeMap<String, u64>,
    pub cash: f64,
}

impl Account {
    pub fn new(cash: f64) -> Self {
        Account {
            holdings: BTreeMap::new(),
            cash,
        }
    }

    pub fn shares(&self, ticker: &str) -> u64 {
        self.holdings.get(ticker).copied().unwrap_or(0)
    }

    /// Cash plus the value of every holding with a tradable price.
    pub fn market_value(&self, prices: &PriceMap) -> f64 {
        let invested: f64 = self
            .holdings
            .iter()
            .filter_map(|(ticker, &shares)| {
                tradable_price(prices, ticker).map(|p| shares as f64 * p)
            })
            .sum();
        self.cash + invested
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetState {
    pub holdings: u64,
    /// Zero when undefined.
    pub price: f64,
    pub value: f64,
    pub weight: f64,
}

/// Portfolio state stamped at one evaluation date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub portfolio_value: f64,
    pub total_investment: f64,
    pub roi: f64,
    pub cash: f64,
    pub assets: BTreeMap<String, AssetState>,
}

/// Value every ticker in `universe` at `date`.
///
/// Weights are relative to the summed value of positions that have both
/// shares and a positive price; cash is excluded from the weight base.
pub fn evaluate(
    date: NaiveDate,
    account: &Account,
    prices: &PriceMap,
    universe: &BTreeSet<String>,
    total_investment: f64,
) -> Snapshot {
    let mut assets = BTreeMap::new();
    let mut valid_asset_value = 0.0;

    for ticker in universe {
        let holdings = account.shares(ticker);
        let price = prices.get(ticker).copied().filter(|p| p.is_finite()).unwrap_or(0.0);
        let value = holdings as f64 * price;
        if holdings > 0 && price > 0.0 {
            valid_asset_value += value;
        }
        assets.insert(
            ticker.clone(),
            AssetState {
                holdings,
                price,
                value,
                weight: 0.0,
            },
        );
    }

    if valid_asset_value > 0.0 {
        for state in assets.values_mut() {
            state.weight = state.value / valid_asset_value;
        }
    }

    let portfolio_value = assets.values().map(|a| a.value).sum::<f64>() + account.cash;
    let roi = if total_investment > 0.0 {
        (portfolio_value - total_investment) / total_investment
    } else {
        0.0
    };

    Snapshot {
        date,
        portfolio_value,
        total_investment,
        roi,
        cash: account.cash,
        assets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 28).unwrap()
    }

    fn universe(tickers: &[&str]) -> BTreeSet<String> {
        tickers.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn new_account() {
        let account = Account::new(10000.0);
        assert!((account.cash - 10000.0).abs() < f64::EPSILON);
        assert!(account.holdings.is_empty());
        assert_eq!(account.shares("SPY"), 0);
    }

    #[test]
    fn market_value_skips_unpriced() {
        let mut account = Account::new(100.0);
        account.holdings.insert("A".into(), 10);
        account.holdings.insert("B".into(), 5);
        let prices = PriceMap::from([("A".to_string(), 20.0)]);
        assert!((account.market_value(&prices) - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn evaluate_includes_zero_holding_tickers() {
        let mut account = Account::new(50.0);
        account.holdings.insert("A".into(), 10);
        let prices = PriceMap::from([("A".to_string(), 10.0), ("B".to_string(), 5.0)]);

        let snap = evaluate(d(), &account, &prices, &universe(&["A", "B"]), 100.0);

        assert_eq!(snap.assets.len(), 2);
        assert_eq!(snap.assets["B"].holdings, 0);
        assert!((snap.assets["B"].value).abs() < f64::EPSILON);
        assert!((snap.assets["A"].weight - 1.0).abs() < f64::EPSILON);
        assert!((snap.portfolio_value - 150.0).abs() < f64::EPSILON);
        assert!((snap.roi - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn evaluate_undefined_price_counts_as_zero() {
        let mut account = Account::new(0.0);
        account.holdings.insert("A".into(), 10);
        account.holdings.insert("B".into(), 10);
        let prices = PriceMap::from([("A".to_string(), 10.0)]);

        let snap = evaluate(d(), &account, &prices, &universe(&["A", "B"]), 100.0);

        assert!((snap.assets["B"].price).abs() < f64::EPSILON);
        assert!((snap.assets["A"].weight - 1.0).abs() < f64::EPSILON);
        assert!((snap.assets["B"].weight).abs() < f64::EPSILON);
        assert!((snap.portfolio_value - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn evaluate_all_cash_has_zero_weights() {
        let account = Account::new(1000.0);
        let prices = PriceMap::from([("A".to_string(), 10.0)]);
        let snap = evaluate(d(), &account, &prices, &universe(&["A"]), 1000.0);
        assert!((snap.assets["A"].weight).abs() < f64::EPSILON);
        assert!((snap.roi).abs() < f64::EPSILON);
    }
}
