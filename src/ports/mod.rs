//! Port traits the domain consumes. Adapters implement them.

pub mod account_port;
pub mod config_port;
pub mod iso_port;
pub mod ledger_port;
pub mod portfolio_port;
pub mod quote_port;
