//! Simulation driver.
//!
//! BacktestConfig carries every run parameter. `Simulation` walks the
//! evaluation schedule one date at a time: deposit, resolve prices, decide a
//! target, trade, evaluate.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

use super::error::AllocsimError;
use super::execution::{initial_purchase, periodic_buy, rebalance, ExecutionConfig};
use super::indicator::Indicators;
use super::ledger::{EventKind, TransactionLog};
use super::metrics::{ChartData, Summary};
use super::portfolio::{evaluate, Account, Snapshot};
use super::price_table::load_price_table;
use super::schedule::{evaluation_dates, CalendarInterval};
use super::strategy::Strategy;
use crate::ports::data_port::DataPort;

/// Months of history needed before the first evaluation date for a
/// 12-month ROC.
pub const MIN_LOOKBACK_MONTHS: u32 = 13;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub initial_capital: f64,
    pub periodic_investment: f64,
    pub interval: CalendarInterval,
    /// Buy-only mode for the fixed-weight strategy.
    pub no_rebalance: bool,
    pub lookback_months: u32,
    /// Rolling CAGR window in years.
    pub rolling_window: Option<u32>,
    pub rolling_step: CalendarInterval,
    pub execution: ExecutionConfig,
}

impl BacktestConfig {
    pub fn new(start_date: NaiveDate, initial_capital: f64) -> Self {
        BacktestConfig {
            start_date,
            end_date: None,
            initial_capital,
            periodic_investment: 0.0,
            interval: CalendarInterval::monthly(),
            no_rebalance: false,
            lookback_months: MIN_LOOKBACK_MONTHS,
            rolling_window: None,
            rolling_step: CalendarInterval::yearly(),
            execution: ExecutionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub summary: Summary,
    pub logs: TransactionLog,
    pub results: Vec<Snapshot>,
    pub chart_data: ChartData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    NotStarted,
    Running,
    Complete,
}

pub struct Simulation<'a> {
    config: &'a BacktestConfig,
    strategy: &'a Strategy,
    indicators: &'a Indicators,
    universe: BTreeSet<String>,
    dates: Vec<NaiveDate>,
    cursor: usize,
    state: SimulationState,
    account: Account,
    total_investment: f64,
    log: TransactionLog,
    snapshots: Vec<Snapshot>,
}

impl<'a> Simulation<'a> {
    /// Build the schedule. Fails if it is empty.
    pub fn new(
        config: &'a BacktestConfig,
        strategy: &'a Strategy,
        indicators: &'a Indicators,
    ) -> Result<Self, AllocsimError> {
        let labels = indicators.monthly().dates();
        let dates = evaluation_dates(labels, config.start_date, config.end_date, config.interval);
        if dates.is_empty() {
            let end = config
                .end_date
                .or_else(|| labels.last().copied())
                .unwrap_or(config.start_date);
            return Err(AllocsimError::NoEvaluationDates {
                start: config.start_date,
                end,
            });
        }

        Ok(Simulation {
            config,
            strategy,
            indicators,
            universe: strategy.universe(),
            dates,
            cursor: 0,
            state: SimulationState::NotStarted,
            account: Account::new(config.initial_capital),
            total_investment: config.initial_capital,
            log: TransactionLog::new(),
            snapshots: Vec::new(),
        })
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn evaluation_dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// Process the next evaluation date. `None` once complete.
    pub fn step(&mut self) -> Option<&Snapshot> {
        let &date = self.dates.get(self.cursor)?;
        self.state = SimulationState::Running;
        let first = self.cursor == 0;
        let execution = &self.config.execution;

        self.log.push(date, EventKind::EvaluationStart);

        if !first && self.config.periodic_investment > 0.0 {
            let amount = self.config.periodic_investment;
            self.account.cash += amount;
            self.total_investment += amount;
            self.log.push(date, EventKind::Deposit { amount });
        }

        let prices = self.indicators.daily().prices_asof(date);
        let target = self.strategy.decide(date, &prices, self.indicators);
        log::debug!("{date}: target {:?}", target);

        let account = std::mem::take(&mut self.account);
        self.account = if target.is_empty() {
            self.log
                .info(date, "target allocation undecidable; holding current state");
            account
        } else if first {
            initial_purchase(account, &target, &prices, execution, &mut self.log, date)
        } else {
            match self.strategy {
                Strategy::Fixed(original) if self.config.no_rebalance => {
                    periodic_buy(account, original, &prices, execution, &mut self.log, date)
                }
                _ => rebalance(account, &target, &prices, execution, &mut self.log, date),
            }
        };

        let snapshot = evaluate(
            date,
            &self.account,
            &prices,
            &self.universe,
            self.total_investment,
        );
        log::debug!(
            "{date}: value {:.2}, cash {:.2}",
            snapshot.portfolio_value,
            snapshot.cash
        );
        self.snapshots.push(snapshot);

        self.cursor += 1;
        if self.cursor == self.dates.len() {
            self.state = SimulationState::Complete;
        }
        self.snapshots.last()
    }

    /// Step through every remaining date and assemble the result.
    pub fn run(mut self) -> Result<BacktestResult, AllocsimError> {
        while self.step().is_some() {}
        self.finish()
    }

    fn finish(self) -> Result<BacktestResult, AllocsimError> {
        let summary = Summary::compute(
            &self.snapshots,
            self.config.rolling_window,
            self.config.rolling_step,
        )
        .ok_or(AllocsimError::NoEvaluationDates {
            start: self.config.start_date,
            end: self.config.end_date.unwrap_or(self.config.start_date),
        })?;
        let chart_data = ChartData::from_snapshots(&self.snapshots);

        Ok(BacktestResult {
            summary,
            logs: self.log,
            results: self.snapshots,
            chart_data,
        })
    }
}

/// Run a strategy over precomputed indicators.
pub fn run_with_indicators(
    config: &BacktestConfig,
    strategy: &Strategy,
    indicators: &Indicators,
) -> Result<BacktestResult, AllocsimError> {
    let simulation = Simulation::new(config, strategy, indicators)?;
    log::info!(
        "running {} strategy over {} evaluation dates ({} to {})",
        strategy.kind(),
        simulation.evaluation_dates().len(),
        simulation.evaluation_dates()[0],
        simulation.evaluation_dates()[simulation.evaluation_dates().len() - 1],
    );
    simulation.run()
}

/// Load prices for the strategy's universe, compute indicators and run.
pub fn run_backtest(
    data_port: &dyn DataPort,
    config: &BacktestConfig,
    strategy: &Strategy,
) -> Result<BacktestResult, AllocsimError> {
    let universe = strategy.universe();
    log::info!("universe: {}", universe.iter().cloned().collect::<Vec<_>>().join(", "));

    let table = load_price_table(
        data_port,
        &universe,
        config.start_date,
        config.lookback_months.max(MIN_LOOKBACK_MONTHS),
    )?;
    let indicators = Indicators::compute(&table);
    run_with_indicators(config, strategy, &indicators)
}

/// Run independent jobs over one set of indicators in parallel. Each job
/// has private account state.
#[cfg(feature = "parallel")]
pub fn run_batch(
    indicators: &Indicators,
    jobs: &[(BacktestConfig, Strategy)],
) -> Vec<Result<BacktestResult, AllocsimError>> {
    use rayon::prelude::*;

    jobs.par_iter()
        .map(|(config, strategy)| run_with_indicators(config, strategy, indicators))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_table::{PriceRecord, PriceTable};
    use crate::domain::schedule::month_end;
    use crate::domain::weights::TargetWeights;
    use chrono::Months;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn indicators(series: &[(&str, Vec<f64>)]) -> Indicators {
        let records: Vec<PriceRecord> = series
            .iter()
            .flat_map(|(ticker, closes)| {
                closes.iter().enumerate().map(move |(i, c)| {
                    PriceRecord::new(month_end(d(2020, 1, 1) + Months::new(i as u32)), *ticker, *c)
                })
            })
            .collect();
        Indicators::compute(&PriceTable::from_records(&records))
    }

    fn fixed(pairs: &[(&str, f64)]) -> Strategy {
        Strategy::Fixed(pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect::<TargetWeights>())
    }

    fn frictionless(start: NaiveDate, capital: f64) -> BacktestConfig {
        BacktestConfig {
            execution: ExecutionConfig::frictionless(),
            ..BacktestConfig::new(start, capital)
        }
    }

    #[test]
    fn config_defaults() {
        let c = BacktestConfig::new(d(2020, 1, 1), 10000.0);
        assert_eq!(c.end_date, None);
        assert_eq!(c.interval.as_months(), 1);
        assert_eq!(c.rolling_step.as_months(), 12);
        assert_eq!(c.lookback_months, 13);
        assert!(!c.no_rebalance);
    }

    #[test]
    fn state_machine_transitions() {
        let ind = indicators(&[("A", vec![100.0; 3]), ("B", vec![50.0; 3])]);
        let strategy = fixed(&[("A", 0.6), ("B", 0.4)]);
        let config = frictionless(d(2020, 1, 1), 10000.0);
        let mut sim = Simulation::new(&config, &strategy, &ind).unwrap();

        assert_eq!(sim.state(), SimulationState::NotStarted);
        assert_eq!(sim.evaluation_dates().len(), 3);

        let first = sim.step().unwrap();
        assert_eq!(first.assets["A"].holdings, 60);
        assert_eq!(first.assets["B"].holdings, 80);
        assert_eq!(sim.state(), SimulationState::Running);

        sim.step();
        sim.step();
        assert_eq!(sim.state(), SimulationState::Complete);
        assert!(sim.step().is_none());
        assert_eq!(sim.snapshots().len(), 3);
    }

    #[test]
    fn deposits_start_on_second_date() {
        let ind = indicators(&[("A", vec![10.0; 3]), ("B", vec![10.0; 3])]);
        let strategy = fixed(&[("A", 0.5), ("B", 0.5)]);
        let config = BacktestConfig {
            periodic_investment: 100.0,
            ..frictionless(d(2020, 1, 1), 1000.0)
        };

        let result = Simulation::new(&config, &strategy, &ind).unwrap().run().unwrap();

        let investments: Vec<f64> = result.results.iter().map(|s| s.total_investment).collect();
        assert_eq!(investments, vec![1000.0, 1100.0, 1200.0]);
        let deposits = result
            .logs
            .events()
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Deposit { .. }))
            .count();
        assert_eq!(deposits, 2);
        assert!((result.summary.total_investment - 1200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn every_date_opens_with_evaluation_start() {
        let ind = indicators(&[("A", vec![10.0; 2]), ("B", vec![10.0; 2])]);
        let strategy = fixed(&[("A", 0.5), ("B", 0.5)]);
        let config = frictionless(d(2020, 1, 1), 1000.0);
        let result = Simulation::new(&config, &strategy, &ind).unwrap().run().unwrap();

        assert_eq!(result.logs.events()[0].kind, EventKind::EvaluationStart);
        let starts = result
            .logs
            .events()
            .iter()
            .filter(|e| e.kind == EventKind::EvaluationStart)
            .count();
        assert_eq!(starts, 2);
    }

    #[test]
    fn undecidable_target_holds() {
        let ind = indicators(&[("SPY", vec![100.0; 3])]);
        let strategy = Strategy::Haa(Default::default());
        let config = frictionless(d(2020, 1, 1), 1000.0);
        let result = Simulation::new(&config, &strategy, &ind).unwrap().run().unwrap();

        assert!(result.results.iter().all(|s| (s.cash - 1000.0).abs() < f64::EPSILON));
        assert_eq!(result.logs.fills().count(), 0);
    }

    #[test]
    fn no_rebalance_never_sells() {
        let ind = indicators(&[("A", vec![10.0, 20.0, 40.0]), ("B", vec![10.0, 10.0, 10.0])]);
        let strategy = fixed(&[("A", 0.5), ("B", 0.5)]);
        let config = BacktestConfig {
            no_rebalance: true,
            periodic_investment: 100.0,
            ..frictionless(d(2020, 1, 1), 1000.0)
        };
        let result = Simulation::new(&config, &strategy, &ind).unwrap().run().unwrap();
        assert!(result.logs.fills().all(|(_, f)| !f.action.is_sell()));
    }

    #[test]
    fn rebalance_sells_winner() {
        let ind = indicators(&[("A", vec![10.0, 20.0]), ("B", vec![10.0, 10.0])]);
        let strategy = fixed(&[("A", 0.5), ("B", 0.5)]);
        let config = frictionless(d(2020, 1, 1), 1000.0);
        let result = Simulation::new(&config, &strategy, &ind).unwrap().run().unwrap();
        assert!(result.logs.fills().any(|(_, f)| f.action.is_sell() && f.ticker == "A"));
    }

    #[test]
    fn empty_schedule_is_an_error() {
        let ind = indicators(&[("A", vec![10.0; 2])]);
        let strategy = fixed(&[("A", 0.5), ("B", 0.5)]);
        let config = BacktestConfig {
            end_date: Some(d(2019, 12, 31)),
            ..frictionless(d(2020, 1, 1), 1000.0)
        };
        let err = Simulation::new(&config, &strategy, &ind).err().unwrap();
        assert!(matches!(err, AllocsimError::NoEvaluationDates { .. }));
    }
}
