//! Target-allocation strategies.
//!
//! Each variant maps an evaluation date, the current prices and the
//! precomputed indicators to a `TargetWeights`. An empty mapping means no
//! decision could be made and the account is held as is.
//!
//! Ranking is by score descending, ties to the alphabetically first ticker.
//! Undefined scores never rank.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::indicator::{IndicatorType, Indicators, MONTHLY_SMA_PERIOD, DAILY_SMA_PERIOD};
use super::price_table::{tradable_price, PriceMap};
use super::weights::{active_weights, TargetWeights};

/// Number of offensive tickers DAA holds when risk-on.
pub const DAA_TOP_N: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Fixed,
    Haa,
    Daa,
    Laa,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy {0:?} (expected default, haa, daa or laa)")]
pub struct StrategyParseError(pub String);

impl FromStr for StrategyKind {
    type Err = StrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "fixed" => Ok(StrategyKind::Fixed),
            "haa" => Ok(StrategyKind::Haa),
            "daa" => Ok(StrategyKind::Daa),
            "laa" => Ok(StrategyKind::Laa),
            _ => Err(StrategyParseError(s.to_string())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::Fixed => "default",
            StrategyKind::Haa => "haa",
            StrategyKind::Daa => "daa",
            StrategyKind::Laa => "laa",
        };
        f.write_str(s)
    }
}

fn tickers(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct HaaAssets {
    pub offensive: Vec<String>,
    pub defensive: Vec<String>,
    pub canary: String,
}

impl Default for HaaAssets {
    fn default() -> Self {
        HaaAssets {
            offensive: tickers(&["SPY", "QQQ"]),
            defensive: tickers(&["IEF", "BIL"]),
            canary: "SPY".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaaAssets {
    pub offensive: Vec<String>,
    pub defensive: Vec<String>,
    pub canary: Vec<String>,
}

impl Default for DaaAssets {
    fn default() -> Self {
        DaaAssets {
            offensive: tickers(&[
                "SPY", "IWM", "QQQ", "VGK", "EWJ", "VWO", "VNQ", "GSG", "GLD", "TLT", "HYG",
                "LQD",
            ]),
            defensive: tickers(&["IEF", "LQD", "TLT"]),
            canary: tickers(&["SPY", "EEM", "EFA", "AGG"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaaAssets {
    pub core: Vec<String>,
    pub offensive: String,
    pub defensive: String,
    pub canary: String,
}

impl Default for LaaAssets {
    fn default() -> Self {
        LaaAssets {
            core: tickers(&["IWD", "GLD", "IEF"]),
            offensive: "SPY".into(),
            defensive: "SHY".into(),
            canary: "SPY".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Fixed(TargetWeights),
    Haa(HaaAssets),
    Daa(DaaAssets),
    Laa(LaaAssets),
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Fixed(_) => StrategyKind::Fixed,
            Strategy::Haa(_) => StrategyKind::Haa,
            Strategy::Daa(_) => StrategyKind::Daa,
            Strategy::Laa(_) => StrategyKind::Laa,
        }
    }

    /// Every ticker the strategy can price, rank or hold.
    pub fn universe(&self) -> BTreeSet<String> {
        match self {
            Strategy::Fixed(weights) => weights.keys().cloned().collect(),
            Strategy::Haa(a) => a
                .offensive
                .iter()
                .chain(&a.defensive)
                .chain(std::iter::once(&a.canary))
                .cloned()
                .collect(),
            Strategy::Daa(a) => a
                .offensive
                .iter()
                .chain(&a.defensive)
                .chain(&a.canary)
                .cloned()
                .collect(),
            Strategy::Laa(a) => a
                .core
                .iter()
                .chain([&a.offensive, &a.defensive, &a.canary])
                .cloned()
                .collect(),
        }
    }

    pub fn decide(&self, date: NaiveDate, prices: &PriceMap, indicators: &Indicators) -> TargetWeights {
        match self {
            Strategy::Fixed(weights) => active_weights(weights, prices),
            Strategy::Haa(assets) => decide_haa(date, indicators, assets),
            Strategy::Daa(assets) => decide_daa(date, indicators, assets),
            Strategy::Laa(assets) => decide_laa(date, prices, indicators, assets),
        }
    }
}

/// Defined scores for `pool`, best first, ties by ticker.
fn ranked<'a>(
    pool: &'a [String],
    indicators: &Indicators,
    indicator: IndicatorType,
    date: NaiveDate,
) -> Vec<(&'a str, f64)> {
    let mut scored: Vec<(&str, f64)> = pool
        .iter()
        .filter_map(|t| {
            indicators
                .value_asof(indicator, t, date)
                .filter(|v| v.is_finite())
                .map(|v| (t.as_str(), v))
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored.dedup_by(|a, b| a.0 == b.0);
    scored
}

fn all_in(ticker: &str) -> TargetWeights {
    TargetWeights::from([(ticker.to_string(), 1.0)])
}

/// Canary above its 12-month SMA → best 6-month ROC offensive ticker,
/// otherwise best 6-month ROC defensive ticker.
pub fn decide_haa(date: NaiveDate, indicators: &Indicators, assets: &HaaAssets) -> TargetWeights {
    let canary_price = indicators.monthly().value_asof(&assets.canary, date);
    let canary_sma = indicators.value_asof(
        IndicatorType::MonthlySma(MONTHLY_SMA_PERIOD),
        &assets.canary,
        date,
    );
    let (Some(price), Some(sma)) = (canary_price, canary_sma) else {
        return TargetWeights::new();
    };

    let pool = if price > sma {
        &assets.offensive
    } else {
        &assets.defensive
    };
    match ranked(pool, indicators, IndicatorType::Roc(6), date).first() {
        Some((ticker, _)) => all_in(ticker),
        None => TargetWeights::new(),
    }
}

/// Mean canary momentum below zero, or no canary momentum at all → best
/// defensive ticker. Otherwise the top offensive tickers, equal-weighted.
pub fn decide_daa(date: NaiveDate, indicators: &Indicators, assets: &DaaAssets) -> TargetWeights {
    let canary: Vec<f64> = assets
        .canary
        .iter()
        .filter_map(|t| indicators.value_asof(IndicatorType::Momentum, t, date))
        .filter(|v| v.is_finite())
        .collect();

    let risk_off =
        canary.is_empty() || canary.iter().sum::<f64>() / (canary.len() as f64) < 0.0;

    if risk_off {
        return match ranked(&assets.defensive, indicators, IndicatorType::Momentum, date).first()
        {
            Some((ticker, _)) => all_in(ticker),
            None => TargetWeights::new(),
        };
    }

    let picks: Vec<&str> = ranked(&assets.offensive, indicators, IndicatorType::Momentum, date)
        .into_iter()
        .take(DAA_TOP_N)
        .map(|(t, _)| t)
        .collect();
    if picks.is_empty() {
        return TargetWeights::new();
    }
    let weight = 1.0 / picks.len() as f64;
    picks.into_iter().map(|t| (t.to_string(), weight)).collect()
}

/// A quarter to each core ticker; the last quarter goes offensive when the
/// canary's daily price is above its 200-day SMA, defensive otherwise.
/// A tactical pick that is also core holds one slice, not two, and the
/// unassigned slice is left to the cash sweep.
pub fn decide_laa(
    date: NaiveDate,
    prices: &PriceMap,
    indicators: &Indicators,
    assets: &LaaAssets,
) -> TargetWeights {
    let price = tradable_price(prices, &assets.canary);
    let sma = indicators.last_valid_asof(
        IndicatorType::DailySma(DAILY_SMA_PERIOD),
        &assets.canary,
        date,
    );
    let (Some(price), Some(sma)) = (price, sma) else {
        return TargetWeights::new();
    };

    let slice = 1.0 / (assets.core.len() + 1) as f64;
    let mut target: TargetWeights = assets.core.iter().map(|t| (t.clone(), slice)).collect();
    let tactical = if price > sma {
        &assets.offensive
    } else {
        &assets.defensive
    };
    target.insert(tactical.clone(), slice);
    target
}
