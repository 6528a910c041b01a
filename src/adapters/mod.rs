//! Concrete adapter implementations for ports.

pub mod bounded_quote_adapter;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod sqlite_adapter;
