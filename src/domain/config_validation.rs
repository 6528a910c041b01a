//! Configuration validation.
//!
//! Validates config fields before any command touches the store or the
//! quote provider.

use std::time::Duration;

use crate::domain::error::PapertraderError;
use crate::domain::sell_policy::SellPolicyKind;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_POOL_SIZE: i64 = 4;
pub const DEFAULT_QUOTE_TIMEOUT_MS: i64 = 2000;

/// Checks needed by every command: the store.
pub fn validate_store_config(config: &dyn ConfigPort) -> Result<(), PapertraderError> {
    validate_sqlite_path(config)?;
    validate_pool_size(config)?;
    Ok(())
}

/// Checks needed by commands that price orders or value portfolios.
pub fn validate_trading_config(config: &dyn ConfigPort) -> Result<(), PapertraderError> {
    validate_store_config(config)?;
    validate_quotes_path(config)?;
    quote_timeout(config)?;
    sell_policy_kind(config)?;
    Ok(())
}

fn validate_sqlite_path(config: &dyn ConfigPort) -> Result<(), PapertraderError> {
    match config.get_string("sqlite", "path") {
        Some(p) if !p.trim().is_empty() => Ok(()),
        _ => Err(PapertraderError::ConfigMissing {
            section: "sqlite".to_string(),
            key: "path".to_string(),
        }),
    }
}

fn validate_pool_size(config: &dyn ConfigPort) -> Result<(), PapertraderError> {
    let value = config.get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE);
    if !(1..=64).contains(&value) {
        return Err(PapertraderError::ConfigInvalid {
            section: "sqlite".to_string(),
            key: "pool_size".to_string(),
            reason: "pool_size must be between 1 and 64".to_string(),
        });
    }
    Ok(())
}

fn validate_quotes_path(config: &dyn ConfigPort) -> Result<(), PapertraderError> {
    match config.get_string("quotes", "path") {
        Some(p) if !p.trim().is_empty() => Ok(()),
        _ => Err(PapertraderError::ConfigMissing {
            section: "quotes".to_string(),
            key: "path".to_string(),
        }),
    }
}

pub fn quote_timeout(config: &dyn ConfigPort) -> Result<Duration, PapertraderError> {
    let value = config.get_int("quotes", "timeout_ms", DEFAULT_QUOTE_TIMEOUT_MS);
    if value <= 0 {
        return Err(PapertraderError::ConfigInvalid {
            section: "quotes".to_string(),
            key: "timeout_ms".to_string(),
            reason: "timeout_ms must be positive".to_string(),
        });
    }
    Ok(Duration::from_millis(value as u64))
}

pub fn sell_policy_kind(config: &dyn ConfigPort) -> Result<SellPolicyKind, PapertraderError> {
    match config.get_string("trading", "sell_policy") {
        None => Ok(SellPolicyKind::default()),
        Some(value) => value
            .parse::<SellPolicyKind>()
            .map_err(|reason| PapertraderError::ConfigInvalid {
                section: "trading".to_string(),
                key: "sell_policy".to_string(),
                reason,
            }),
    }
}
