//! Core domain types and logic.

pub mod account;
pub mod account_service;
pub mod config_validation;
pub mod error;
pub mod fees;
pub mod iso;
pub mod order;
pub mod outcome;
pub mod portfolio;
pub mod portfolio_manager;
pub mod position;
pub mod pricing;
pub mod quote;
pub mod reset;
pub mod sell_policy;
pub mod transaction;
