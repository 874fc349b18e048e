//! Core domain types and the simulation engine.

pub mod error;
pub mod schedule;
pub mod price_table;
pub mod indicator;
pub mod weights;
pub mod ledger;
pub mod portfolio;
pub mod execution;
pub mod strategy;
pub mod metrics;
pub mod backtest;
pub mod config_validation;
pub mod universe;
