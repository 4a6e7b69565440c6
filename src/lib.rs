//! stepwise: streaming strategy-execution core for backtests.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], and the command-line shell in
//! [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
