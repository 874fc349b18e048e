//! Property tests for the execution layer: no overdraft, no shorts, cost
//! accounting, weight normalization.

mod common;

use allocsim::domain::execution::{initial_purchase, periodic_buy, rebalance, ExecutionConfig};
use allocsim::domain::ledger::TransactionLog;
use allocsim::domain::portfolio::Account;
use allocsim::domain::price_table::PriceMap;
use allocsim::domain::weights::{normalize, TargetWeights};
use common::d;
use proptest::prelude::*;

const TICKERS: [&str; 4] = ["AAA", "BBB", "CCC", "DDD"];

fn prices_strategy() -> impl Strategy<Value = PriceMap> {
    prop::collection::vec(1.0f64..500.0, TICKERS.len()).prop_map(|ps| {
        TICKERS
            .iter()
            .zip(ps)
            .map(|(t, p)| (t.to_string(), p))
            .collect()
    })
}

fn target_strategy() -> impl Strategy<Value = TargetWeights> {
    prop::collection::btree_map(
        prop::sample::select(TICKERS.to_vec()).prop_map(str::to_string),
        0.0f64..1.0,
        1..=TICKERS.len(),
    )
    .prop_map(|w| normalize(&w))
}

fn holdings_strategy() -> impl Strategy<Value = Account> {
    (
        0.0f64..50_000.0,
        prop::collection::vec(0u64..200, TICKERS.len()),
    )
        .prop_map(|(cash, shares)| {
            let mut account = Account::new(cash);
            for (t, n) in TICKERS.iter().zip(shares) {
                if n > 0 {
                    account.holdings.insert(t.to_string(), n);
                }
            }
            account
        })
}

fn costs_strategy() -> impl Strategy<Value = ExecutionConfig> {
    (0.0f64..0.01, 0.0f64..0.01, 0.0f64..5.0).prop_map(|(buy, sell, buffer)| ExecutionConfig {
        buy_commission_rate: buy,
        sell_tax_rate: sell,
        sweep_buffer: buffer,
    })
}

/// Cash as it stood after each fill, replayed from the log.
fn replayed_cash(start: f64, log: &TransactionLog) -> Vec<f64> {
    log.fills()
        .scan(start, |cash, (_, fill)| {
            *cash += fill.cash_delta();
            Some(*cash)
        })
        .collect()
}

proptest! {
    #[test]
    fn rebalance_never_overdraws_or_shorts(
        account in holdings_strategy(),
        target in target_strategy(),
        prices in prices_strategy(),
        costs in costs_strategy(),
    ) {
        let start_cash = account.cash;
        let mut log = TransactionLog::new();
        let after = rebalance(account, &target, &prices, &costs, &mut log, d(2024, 1, 31));

        prop_assert!(after.cash >= -1e-6, "cash went negative: {}", after.cash);
        for cash in replayed_cash(start_cash, &log) {
            prop_assert!(cash >= -1e-6);
        }
        for ticker in after.holdings.keys() {
            prop_assert!(target.contains_key(ticker) || after.shares(ticker) == 0);
        }
    }

    #[test]
    fn trading_costs_account_for_value_lost(
        account in holdings_strategy(),
        target in target_strategy(),
        prices in prices_strategy(),
        costs in costs_strategy(),
    ) {
        let before = account.market_value(&prices);
        let mut log = TransactionLog::new();
        let after = rebalance(account, &target, &prices, &costs, &mut log, d(2024, 1, 31));
        let after_value = after.market_value(&prices);

        let lost = before - after_value;
        prop_assert!((lost - log.total_fees()).abs() < 1e-6 * before.max(1.0));
    }

    #[test]
    fn initial_purchase_stays_within_capital(
        cash in 0.0f64..1_000_000.0,
        target in target_strategy(),
        prices in prices_strategy(),
        costs in costs_strategy(),
    ) {
        let mut log = TransactionLog::new();
        let after = initial_purchase(Account::new(cash), &target, &prices, &costs, &mut log, d(2024, 1, 31));

        prop_assert!(after.cash >= -1e-6);
        prop_assert!(log.fills().all(|(_, f)| !f.action.is_sell()));
    }

    #[test]
    fn periodic_buy_only_adds_shares(
        account in holdings_strategy(),
        target in target_strategy(),
        prices in prices_strategy(),
        costs in costs_strategy(),
    ) {
        let before = account.clone();
        let mut log = TransactionLog::new();
        let after = periodic_buy(account, &target, &prices, &costs, &mut log, d(2024, 1, 31));

        prop_assert!(after.cash >= -1e-6);
        for (ticker, &shares) in &before.holdings {
            prop_assert!(after.shares(ticker) >= shares);
        }
    }

    #[test]
    fn normalize_sums_to_one_and_is_idempotent(
        weights in prop::collection::btree_map("[A-Z]{1,4}", 0.0f64..10.0, 1..8),
    ) {
        let once = normalize(&weights);
        let total: f64 = once.values().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);

        let twice = normalize(&once);
        for (ticker, w) in &once {
            prop_assert!((twice[ticker] - w).abs() < 1e-12);
        }
    }
}
