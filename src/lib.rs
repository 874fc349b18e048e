//! allocsim: portfolio rebalancing simulator.
//!
//! Replays a target-allocation strategy (fixed weights or a tactical
//! HAA/DAA/LAA variant) over historical daily closes, trading whole shares
//! with commission and tax, and reports the value trajectory, drawdown and
//! rolling returns.
//!
//! Hexagonal architecture: the engine lives in [`domain`], port traits in
//! [`ports`], concrete I/O in [`adapters`], and the command line in [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
