//! Configuration validation and run-parameter assembly.
//!
//! Every check runs before any price data is loaded. The same parsers back
//! both `validate_backtest_config` and the builders, so a config that
//! validates always builds.

use crate::domain::backtest::{BacktestConfig, MIN_LOOKBACK_MONTHS};
use crate::domain::error::AllocsimError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::schedule::CalendarInterval;
use crate::domain::strategy::{DaaAssets, HaaAssets, LaaAssets, Strategy, StrategyKind};
use crate::domain::universe::parse_tickers;
use crate::domain::weights::parse_weight_pairs;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), AllocsimError> {
    build_backtest_config(config)?;
    build_strategy(config)?;
    Ok(())
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, AllocsimError> {
    let initial_capital = validate_initial_capital(config)?;
    let (start_date, end_date) = validate_dates(config)?;

    let no_rebalance = config.get_bool("backtest", "no_rebalance", false);
    if no_rebalance && strategy_kind(config)? != StrategyKind::Fixed {
        return Err(AllocsimError::invalid(
            "backtest",
            "no_rebalance",
            "no_rebalance is only supported by the default strategy",
        ));
    }

    Ok(BacktestConfig {
        start_date,
        end_date,
        initial_capital,
        periodic_investment: non_negative(config, "backtest", "periodic_investment", 0.0)?,
        interval: interval(config, "interval", CalendarInterval::monthly())?,
        no_rebalance,
        lookback_months: validate_lookback(config)?,
        rolling_window: validate_rolling_window(config)?,
        rolling_step: interval(config, "rolling_step", CalendarInterval::yearly())?,
        execution: execution_config(config)?,
    })
}

pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, AllocsimError> {
    match strategy_kind(config)? {
        StrategyKind::Fixed => {
            let tokens = config.get_tokens("backtest", "stocks");
            if tokens.is_empty() {
                return Err(AllocsimError::missing("backtest", "stocks"));
            }
            parse_weight_pairs(&tokens)
                .map(Strategy::Fixed)
                .map_err(|e| AllocsimError::invalid("backtest", "stocks", e.to_string()))
        }
        StrategyKind::Haa => {
            let defaults = HaaAssets::default();
            Ok(Strategy::Haa(HaaAssets {
                offensive: ticker_list(config, "haa", "offensive", defaults.offensive)?,
                defensive: ticker_list(config, "haa", "defensive", defaults.defensive)?,
                canary: single_ticker(config, "haa", "canary", defaults.canary)?,
            }))
        }
        StrategyKind::Daa => {
            let defaults = DaaAssets::default();
            Ok(Strategy::Daa(DaaAssets {
                offensive: ticker_list(config, "daa", "offensive", defaults.offensive)?,
                defensive: ticker_list(config, "daa", "defensive", defaults.defensive)?,
                canary: ticker_list(config, "daa", "canary", defaults.canary)?,
            }))
        }
        StrategyKind::Laa => {
            let defaults = LaaAssets::default();
            Ok(Strategy::Laa(LaaAssets {
                core: ticker_list(config, "laa", "core", defaults.core)?,
                offensive: single_ticker(config, "laa", "offensive", defaults.offensive)?,
                defensive: single_ticker(config, "laa", "defensive", defaults.defensive)?,
                canary: single_ticker(config, "laa", "canary", defaults.canary)?,
            }))
        }
    }
}

fn strategy_kind(config: &dyn ConfigPort) -> Result<StrategyKind, AllocsimError> {
    match config.get_string("backtest", "strategy") {
        None => Ok(StrategyKind::Fixed),
        Some(s) => s
            .parse()
            .map_err(|e: crate::domain::strategy::StrategyParseError| {
                AllocsimError::invalid("backtest", "strategy", e.to_string())
            }),
    }
}

/// Numeric value that must parse if present.
fn number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, AllocsimError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| {
                AllocsimError::invalid(section, key, format!("{raw:?} is not a number"))
            }),
    }
}

fn non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, AllocsimError> {
    let value = number(config, section, key)?.unwrap_or(default);
    if value < 0.0 {
        return Err(AllocsimError::invalid(
            section,
            key,
            format!("{key} must be non-negative"),
        ));
    }
    Ok(value)
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<f64, AllocsimError> {
    let value = number(config, "backtest", "initial_capital")?
        .ok_or_else(|| AllocsimError::missing("backtest", "initial_capital"))?;
    if value <= 0.0 {
        return Err(AllocsimError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(value)
}

fn execution_config(config: &dyn ConfigPort) -> Result<ExecutionConfig, AllocsimError> {
    let defaults = ExecutionConfig::default();
    Ok(ExecutionConfig {
        buy_commission_rate: non_negative(
            config,
            "costs",
            "buy_commission_rate",
            defaults.buy_commission_rate,
        )?,
        sell_tax_rate: non_negative(config, "costs", "sell_tax_rate", defaults.sell_tax_rate)?,
        sweep_buffer: non_negative(config, "costs", "sweep_buffer", defaults.sweep_buffer)?,
    })
}

fn validate_dates(
    config: &dyn ConfigPort,
) -> Result<(NaiveDate, Option<NaiveDate>), AllocsimError> {
    let start_date = match config.get_string("backtest", "start_date") {
        None => return Err(AllocsimError::missing("backtest", "start_date")),
        Some(s) => parse_date(&s, "start_date")?,
    };
    let end_date = config
        .get_string("backtest", "end_date")
        .map(|s| parse_date(&s, "end_date"))
        .transpose()?;

    if let Some(end) = end_date {
        if start_date > end {
            return Err(AllocsimError::invalid(
                "backtest",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
    }
    Ok((start_date, end_date))
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, AllocsimError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        AllocsimError::invalid(
            "backtest",
            field,
            format!("invalid {} format, expected YYYY-MM-DD", field),
        )
    })
}

fn interval(
    config: &dyn ConfigPort,
    key: &str,
    default: CalendarInterval,
) -> Result<CalendarInterval, AllocsimError> {
    match config.get_string("backtest", key) {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|e: crate::domain::schedule::IntervalError| {
                AllocsimError::invalid("backtest", key, e.to_string())
            }),
    }
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<u32, AllocsimError> {
    let Some(raw) = config.get_string("backtest", "lookback_months") else {
        return Ok(MIN_LOOKBACK_MONTHS);
    };
    match raw.trim().parse::<u32>() {
        Ok(months) if months >= MIN_LOOKBACK_MONTHS => Ok(months),
        _ => Err(AllocsimError::invalid(
            "backtest",
            "lookback_months",
            format!("lookback_months must be an integer of at least {MIN_LOOKBACK_MONTHS}"),
        )),
    }
}

fn validate_rolling_window(config: &dyn ConfigPort) -> Result<Option<u32>, AllocsimError> {
    let Some(raw) = config.get_string("backtest", "rolling_window") else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(years) if years > 0 => Ok(Some(years)),
        _ => Err(AllocsimError::invalid(
            "backtest",
            "rolling_window",
            "rolling_window must be a positive number of years",
        )),
    }
}

fn ticker_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Vec<String>,
) -> Result<Vec<String>, AllocsimError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => {
            parse_tickers(&raw).map_err(|e| AllocsimError::invalid(section, key, e.to_string()))
        }
    }
}

fn single_ticker(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: String,
) -> Result<String, AllocsimError> {
    let mut list = ticker_list(config, section, key, vec![default])?;
    match (list.pop(), list.is_empty()) {
        (Some(ticker), true) => Ok(ticker),
        _ => Err(AllocsimError::invalid(
            section,
            key,
            "exactly one ticker expected",
        )),
    }
}
