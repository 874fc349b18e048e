//! CLI definition and dispatch.
//!
//! `execute` dispatches a parsed command; `run` prints any error and maps
//! it to a process exit code. Progress goes to stderr, data to
//! stdout.

use chrono::{Months, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{build_backtest_config, build_strategy};
use crate::domain::error::AllocsimError;
use crate::domain::strategy::Strategy;
use crate::domain::universe::{check_coverage, CoverageIssue};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "allocsim", about = "Portfolio rebalancing simulator", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy name, overriding [backtest] strategy
        #[arg(short, long)]
        strategy: Option<String>,
        /// Write the full result as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Write per-date snapshots as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Validate and print the plan without loading data
        #[arg(long)]
        dry_run: bool,
        /// Fixed-weight pairs, e.g. `SPY 0.6 AGG 0.4`
        #[arg(num_args = 0.., allow_negative_numbers = true)]
        stocks: Vec<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in the configured data source
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data ranges for one ticker or the configured strategy's universe
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
    },
    /// Load a long-format CSV into the sqlite store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(cli: Cli) -> Result<(), AllocsimError> {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            json,
            csv,
            dry_run,
            stocks,
        } => {
            let overrides = Overrides {
                strategy: strategy.as_deref(),
                stocks: &stocks,
            };
            if dry_run {
                run_dry_run(&config, &overrides)
            } else {
                run_backtest(&config, &overrides, json.as_deref(), csv.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Info { config, ticker } => run_info(&config, ticker.as_deref()),
        Command::Import { config, csv } => run_import(&config, &csv),
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides<'a> {
    pub strategy: Option<&'a str>,
    pub stocks: &'a [String],
}

pub fn load_config(path: &Path, overrides: &Overrides<'_>) -> Result<FileConfigAdapter, AllocsimError> {
    eprintln!("Loading config from {}", path.display());
    let mut adapter = FileConfigAdapter::from_file(path)?;
    if let Some(strategy) = overrides.strategy {
        adapter.set("backtest", "strategy", strategy);
    }
    if !overrides.stocks.is_empty() {
        adapter.set("backtest", "stocks", &overrides.stocks.join(" "));
    }
    Ok(adapter)
}

/// Open the data source named by `[data] source`.
pub fn open_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, AllocsimError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "sqlite".to_string());

    match source.trim().to_lowercase().as_str() {
        "csv" => Ok(Box::new(CsvAdapter::from_config(config)?)),
        "sqlite" => open_sqlite(config),
        other => Err(AllocsimError::invalid(
            "data",
            "source",
            format!("unknown data source {other:?} (expected sqlite or csv)"),
        )),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, AllocsimError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    Ok(Box::new(SqliteAdapter::from_config(config)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, AllocsimError> {
    Err(AllocsimError::invalid(
        "data",
        "source",
        "sqlite support is not compiled in (enable the sqlite feature)",
    ))
}

fn load_run(
    config_path: &Path,
    overrides: &Overrides<'_>,
) -> Result<(FileConfigAdapter, BacktestConfig, Strategy), AllocsimError> {
    let adapter = load_config(config_path, overrides)?;
    let bt_config = build_backtest_config(&adapter)?;
    let strategy = build_strategy(&adapter)?;
    Ok((adapter, bt_config, strategy))
}

fn lookback_start(config: &BacktestConfig) -> NaiveDate {
    config
        .start_date
        .checked_sub_months(Months::new(config.lookback_months))
        .unwrap_or(NaiveDate::MIN)
}

fn run_backtest(
    config_path: &Path,
    overrides: &Overrides<'_>,
    json_path: Option<&Path>,
    csv_path: Option<&Path>,
) -> Result<(), AllocsimError> {
    let (adapter, bt_config, strategy) = load_run(config_path, overrides)?;
    let data_port = open_data_port(&adapter)?;

    eprintln!(
        "Running {} strategy from {} ({} universe tickers)",
        strategy.kind(),
        bt_config.start_date,
        strategy.universe().len()
    );
    let result = backtest_engine::run_backtest(data_port.as_ref(), &bt_config, &strategy)?;

    print_summary(&result);

    let json_path = json_path
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_string("report", "json_path").map(PathBuf::from));
    let csv_path = csv_path
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_string("report", "csv_path").map(PathBuf::from));

    if let Some(path) = json_path {
        write_report(&JsonReportAdapter::new(), &result, &path)?;
    }
    if let Some(path) = csv_path {
        write_report(&CsvReportAdapter::new(), &result, &path)?;
    }
    Ok(())
}

fn write_report(
    port: &dyn ReportPort,
    result: &BacktestResult,
    path: &Path,
) -> Result<(), AllocsimError> {
    let output = path.to_str().ok_or_else(|| AllocsimError::Report {
        reason: format!("output path is not valid UTF-8: {}", path.display()),
    })?;
    port.write(result, output)?;
    eprintln!("Report written to: {output}");
    Ok(())
}

pub fn print_summary(result: &BacktestResult) {
    let summary = &result.summary;
    let mdd = &summary.mdd;
    let first = result.results.first().map(|s| s.date);
    let last = result.results.last().map(|s| s.date);

    eprintln!("\n=== Results ===");
    if let (Some(first), Some(last)) = (first, last) {
        eprintln!("Period:           {first} to {last} ({} evaluations)", result.results.len());
    }
    eprintln!("Final Value:      {:.2}", summary.final_portfolio_value);
    eprintln!("Total Investment: {:.2}", summary.total_investment);
    eprintln!("ROI:              {:.2}%", summary.final_roi * 100.0);
    eprintln!(
        "Max Drawdown:     {:.2}% ({} to {})",
        mdd.percentage * 100.0,
        mdd.peak_date,
        mdd.trough_date
    );
    eprintln!("Trades:           {}", result.logs.fills().count());
    eprintln!("Fees Paid:        {:.2}", result.logs.total_fees());

    if let Some(rolling) = &summary.rolling_returns {
        eprintln!("\n=== Rolling CAGR ({} windows) ===", rolling.periods.len());
        eprintln!("Average:          {:.2}%", rolling.average_cagr * 100.0);
        eprintln!("Min:              {:.2}%", rolling.min_cagr * 100.0);
        eprintln!("Max:              {:.2}%", rolling.max_cagr * 100.0);
        eprintln!("Std Dev:          {:.2}%", rolling.stdev_cagr * 100.0);
    }
}

fn describe_strategy(strategy: &Strategy) {
    match strategy {
        Strategy::Fixed(weights) => {
            for (ticker, weight) in weights {
                eprintln!("  {ticker}: {weight}");
            }
        }
        Strategy::Haa(a) => {
            eprintln!("  offensive: {}", a.offensive.join(", "));
            eprintln!("  defensive: {}", a.defensive.join(", "));
            eprintln!("  canary:    {}", a.canary);
        }
        Strategy::Daa(a) => {
            eprintln!("  offensive: {}", a.offensive.join(", "));
            eprintln!("  defensive: {}", a.defensive.join(", "));
            eprintln!("  canary:    {}", a.canary.join(", "));
        }
        Strategy::Laa(a) => {
            eprintln!("  core:      {}", a.core.join(", "));
            eprintln!("  offensive: {}", a.offensive);
            eprintln!("  defensive: {}", a.defensive);
            eprintln!("  canary:    {}", a.canary);
        }
    }
}

fn run_dry_run(config_path: &Path, overrides: &Overrides<'_>) -> Result<(), AllocsimError> {
    let (_, bt_config, strategy) = load_run(config_path, overrides)?;
    eprintln!("Config validated successfully");

    eprintln!("\nStrategy: {}", strategy.kind());
    describe_strategy(&strategy);

    eprintln!("\nSchedule:");
    eprintln!("  start:     {}", bt_config.start_date);
    match bt_config.end_date {
        Some(end) => eprintln!("  end:       {end}"),
        None => eprintln!("  end:       last available date"),
    }
    eprintln!("  interval:  {}", bt_config.interval);
    eprintln!("  data from: {}", lookback_start(&bt_config));
    eprintln!(
        "  mode:      {}",
        if bt_config.no_rebalance { "buy only" } else { "rebalance" }
    );

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), AllocsimError> {
    let (_, _, strategy) = load_run(config_path, &Overrides::default())?;
    eprintln!("\nStrategy: {}", strategy.kind());
    describe_strategy(&strategy);
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_list_symbols(config_path: &Path) -> Result<(), AllocsimError> {
    let config = load_config(config_path, &Overrides::default())?;
    let symbols = open_data_port(&config)?.list_symbols()?;

    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn run_info(config_path: &Path, ticker: Option<&str>) -> Result<(), AllocsimError> {
    let config = load_config(config_path, &Overrides::default())?;
    let data_port = open_data_port(&config)?;

    if let Some(ticker) = ticker {
        let ticker = ticker.trim().to_uppercase();
        match data_port.get_data_range(&ticker)? {
            Some((first, last, rows)) => println!("{ticker}: {rows} rows, {first} to {last}"),
            None => eprintln!("{ticker}: no data found"),
        }
        return Ok(());
    }

    let bt_config = build_backtest_config(&config)?;
    let strategy = build_strategy(&config)?;
    let report = check_coverage(
        data_port.as_ref(),
        &strategy.universe(),
        lookback_start(&bt_config),
        bt_config.start_date,
    )?;

    for c in &report.covered {
        println!("{}: {} rows, {} to {}", c.ticker, c.rows, c.first, c.last);
    }
    for skipped in &report.issues {
        let reason = match &skipped.issue {
            CoverageIssue::NoData => "no data found".to_string(),
            CoverageIssue::StartsLate { first } => format!("history starts {first}"),
            CoverageIssue::EndsEarly { last } => format!("history ends {last}"),
        };
        eprintln!("warning: {}: {}", skipped.ticker, reason);
    }
    if report.is_complete() {
        eprintln!("All {} tickers covered from {}", report.covered.len(), lookback_start(&bt_config));
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
fn run_import(config_path: &Path, csv_path: &Path) -> Result<(), AllocsimError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let config = load_config(config_path, &Overrides::default())?;
    let store = SqliteAdapter::from_config(&config)?;
    store.initialize_schema()?;

    eprintln!("Reading {}", csv_path.display());
    let records: Vec<_> = CsvAdapter::new(csv_path.to_path_buf())
        .records()?
        .into_iter()
        .filter(|r| r.close.is_finite())
        .collect();
    let inserted = store.insert_records(&records)?;

    eprintln!(
        "Imported {} new rows ({} already present)",
        inserted,
        records.len() - inserted
    );
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn run_import(_config_path: &Path, _csv_path: &Path) -> Result<(), AllocsimError> {
    Err(AllocsimError::invalid(
        "data",
        "source",
        "sqlite support is not compiled in (enable the sqlite feature)",
    ))
}
