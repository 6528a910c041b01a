//! papertrader: a simulated stock-trading ledger.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], and the operator CLI in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
