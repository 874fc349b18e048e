//! Shared fixtures for report adapter tests.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::domain::backtest::BacktestResult;
use crate::domain::ledger::{EventKind, Fill, TradeAction, TransactionLog};
use crate::domain::metrics::{ChartData, Summary};
use crate::domain::portfolio::{evaluate, Account};
use crate::domain::schedule::CalendarInterval;

pub(crate) fn sample_result() -> BacktestResult {
    let universe: BTreeSet<String> = ["SPY", "AGG"].iter().map(|t| t.to_string()).collect();
    let mut account = Account::new(100.0);
    account.holdings.insert("SPY".to_string(), 60);
    account.holdings.insert("AGG".to_string(), 80);

    let snapshots: Vec<_> = [(31, 100.0, 50.0), (29, 110.0, 49.0), (31, 95.0, 51.0)]
        .iter()
        .enumerate()
        .map(|(i, &(day, spy, agg))| {
            let date = NaiveDate::from_ymd_opt(2024, i as u32 + 1, day).unwrap();
            let prices = HashMap::from([("SPY".to_string(), spy), ("AGG".to_string(), agg)]);
            evaluate(date, &account, &prices, &universe, 10_000.0)
        })
        .collect();

    let first = snapshots[0].date;
    let mut logs = TransactionLog::new();
    logs.push(first, EventKind::EvaluationStart);
    logs.trade(
        first,
        Fill {
            action: TradeAction::Buy,
            ticker: "SPY".to_string(),
            shares: 60,
            price: 100.0,
            amount: 6_000.0,
            fee: 15.0,
        },
    );

    BacktestResult {
        summary: Summary::compute(&snapshots, None, CalendarInterval::yearly()).unwrap(),
        logs,
        chart_data: ChartData::from_snapshots(&snapshots),
        results: snapshots,
    }
}
