//! Trade execution: rebalance, periodic buy, initial purchase, cash sweep.
//!
//! Share counts are whole numbers sized with `floor`, commission applies to
//! buys only and tax to sells only. Every buy is gated on the cash it would
//! consume, so an account never goes negative; an unaffordable lot is
//! skipped, never partially filled.

use chrono::NaiveDate;

use super::ledger::{Fill, TradeAction, TransactionLog};
use super::portfolio::Account;
use super::price_table::{tradable_price, PriceMap};
use super::weights::{active_weights, TargetWeights};

/// Cost parameters threaded into every trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionConfig {
    /// Fraction of gross cost charged on every buy.
    pub buy_commission_rate: f64,
    /// Fraction of gross proceeds withheld on every sell.
    pub sell_tax_rate: f64,
    /// Cash held back from the sweep so rounding cannot overdraw.
    pub sweep_buffer: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            buy_commission_rate: 0.0025,
            sell_tax_rate: 0.0025,
            sweep_buffer: 1.0,
        }
    }
}

impl ExecutionConfig {
    /// No commission, no tax, default sweep buffer.
    pub fn frictionless() -> Self {
        ExecutionConfig {
            buy_commission_rate: 0.0,
            sell_tax_rate: 0.0,
            ..Default::default()
        }
    }
}

pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    trade_value * config.buy_commission_rate
}

pub fn calculate_tax(trade_value: f64, config: &ExecutionConfig) -> f64 {
    trade_value * config.sell_tax_rate
}

/// Whole shares `budget` buys at `price` once commission is included.
pub fn affordable_shares(budget: f64, price: f64, config: &ExecutionConfig) -> u64 {
    if budget <= 0.0 || price <= 0.0 {
        return 0;
    }
    (budget / (price * (1.0 + config.buy_commission_rate))).floor() as u64
}

/// Result of a buy attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum BuyResult {
    Filled(Fill),
    ZeroShares,
    InsufficientCash,
}

/// Buy as many whole shares as `budget` allows.
///
/// 1. Size the lot with commission included
/// 2. If the lot is empty, return ZeroShares
/// 3. If cost + commission exceeds cash, return InsufficientCash
/// 4. Add shares, deduct cash, log the fill
#[allow(clippy::too_many_arguments)]
pub fn buy_lot(
    account: &mut Account,
    ticker: &str,
    budget: f64,
    price: f64,
    action: TradeAction,
    config: &ExecutionConfig,
    log: &mut TransactionLog,
    date: NaiveDate,
) -> BuyResult {
    let shares = affordable_shares(budget, price, config);
    if shares == 0 {
        return BuyResult::ZeroShares;
    }

    let cost = shares as f64 * price;
    let commission = calculate_commission(cost, config);
    if account.cash < cost + commission {
        return BuyResult::InsufficientCash;
    }

    *account.holdings.entry(ticker.to_string()).or_insert(0) += shares;
    account.cash -= cost + commission;

    let fill = Fill {
        action,
        ticker: ticker.to_string(),
        shares,
        price,
        amount: cost,
        fee: commission,
    };
    log.trade(date, fill.clone());
    BuyResult::Filled(fill)
}

/// Sell `shares` of `ticker`. Returns `None` without touching the account if
/// the position is smaller than `shares`.
#[allow(clippy::too_many_arguments)]
pub fn sell_shares(
    account: &mut Account,
    ticker: &str,
    shares: u64,
    price: f64,
    action: TradeAction,
    config: &ExecutionConfig,
    log: &mut TransactionLog,
    date: NaiveDate,
) -> Option<Fill> {
    let held = account.shares(ticker);
    if shares == 0 || held < shares {
        return None;
    }

    let proceeds = shares as f64 * price;
    let tax = calculate_tax(proceeds, config);
    account.holdings.insert(ticker.to_string(), held - shares);
    account.cash += proceeds - tax;

    let fill = Fill {
        action,
        ticker: ticker.to_string(),
        shares,
        price,
        amount: proceeds,
        fee: tax,
    };
    log.trade(date, fill.clone());
    Some(fill)
}

/// Move `account` toward `target`.
///
/// 1. Value the account at current prices (unpriced holdings count zero)
/// 2. Sell every held ticker absent from `target` outright
/// 3. For each target ticker with a tradable price, buy or sell the
///    difference between its target value and its current value
/// 4. Sweep leftover cash back into the target
pub fn rebalance(
    mut account: Account,
    target: &TargetWeights,
    prices: &PriceMap,
    config: &ExecutionConfig,
    log: &mut TransactionLog,
    date: NaiveDate,
) -> Account {
    let portfolio_value = account.market_value(prices);

    let to_liquidate: Vec<(String, u64)> = account
        .holdings
        .iter()
        .filter(|&(ticker, &shares)| shares > 0 && !target.contains_key(ticker))
        .map(|(ticker, &shares)| (ticker.clone(), shares))
        .collect();

    for (ticker, shares) in to_liquidate {
        match tradable_price(prices, &ticker) {
            Some(price) => {
                sell_shares(
                    &mut account,
                    &ticker,
                    shares,
                    price,
                    TradeAction::SellAll,
                    config,
                    log,
                    date,
                );
            }
            None => log::warn!("{date}: cannot liquidate {ticker}, no price"),
        }
    }

    for (ticker, &weight) in target {
        let Some(price) = tradable_price(prices, ticker) else {
            continue;
        };
        let delta = portfolio_value * weight - account.shares(ticker) as f64 * price;

        if delta > 0.0 {
            buy_lot(
                &mut account,
                ticker,
                delta,
                price,
                TradeAction::Buy,
                config,
                log,
                date,
            );
        } else if delta < 0.0 {
            let shares = (-delta / price).floor() as u64;
            sell_shares(
                &mut account,
                ticker,
                shares,
                price,
                TradeAction::SellAdjust,
                config,
                log,
                date,
            );
        }
    }

    sweep_cash(account, target, prices, config, log, date)
}

/// Reinvest residual cash across `target` in proportion to its weights.
///
/// Does nothing unless cash exceeds the cheapest tradable target price.
/// The amount reinvested is cash less `sweep_buffer`.
pub fn sweep_cash(
    mut account: Account,
    target: &TargetWeights,
    prices: &PriceMap,
    config: &ExecutionConfig,
    log: &mut TransactionLog,
    date: NaiveDate,
) -> Account {
    let priced: Vec<(&String, f64, f64)> = target
        .iter()
        .filter_map(|(ticker, &weight)| {
            tradable_price(prices, ticker).map(|price| (ticker, weight, price))
        })
        .collect();

    let Some(cheapest) = priced.iter().map(|(_, _, p)| *p).reduce(f64::min) else {
        return account;
    };
    if account.cash <= cheapest {
        return account;
    }

    log.info(date, format!("sweeping residual cash {:.2}", account.cash));
    let reinvest = account.cash - config.sweep_buffer;
    for (ticker, weight, price) in priced {
        buy_lot(
            &mut account,
            ticker,
            reinvest * weight,
            price,
            TradeAction::SweepBuy,
            config,
            log,
            date,
        );
    }

    account
}

/// Buy-only allocation of available cash for a fixed-weight portfolio that
/// never sells. `original` is re-filtered against current prices first.
pub fn periodic_buy(
    mut account: Account,
    original: &TargetWeights,
    prices: &PriceMap,
    config: &ExecutionConfig,
    log: &mut TransactionLog,
    date: NaiveDate,
) -> Account {
    log.info(date, "periodic buy without rebalancing");
    let active = active_weights(original, prices);

    let available = account.cash;
    for (ticker, &weight) in &active {
        let Some(price) = tradable_price(prices, ticker) else {
            continue;
        };
        buy_lot(
            &mut account,
            ticker,
            available * weight,
            price,
            TradeAction::PeriodicBuy,
            config,
            log,
            date,
        );
    }

    sweep_cash(account, &active, prices, config, log, date)
}

/// First-date lump-sum allocation of all cash. No sweep follows.
pub fn initial_purchase(
    mut account: Account,
    target: &TargetWeights,
    prices: &PriceMap,
    config: &ExecutionConfig,
    log: &mut TransactionLog,
    date: NaiveDate,
) -> Account {
    let available = account.cash;
    for (ticker, &weight) in target {
        let Some(price) = tradable_price(prices, ticker) else {
            continue;
        };
        buy_lot(
            &mut account,
            ticker,
            available * weight,
            price,
            TradeAction::Buy,
            config,
            log,
            date,
        );
    }
    account
}
