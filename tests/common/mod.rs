#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;

use papertrader::adapters::file_config_adapter::FileConfigAdapter;
use papertrader::adapters::sqlite_adapter::SqliteAdapter;
use papertrader::domain::error::PapertraderError;
use papertrader::domain::iso::{IsoCurrency, IsoRegistry};
use papertrader::domain::outcome::Outcome;
use papertrader::domain::quote::Quote;
use papertrader::ports::account_port::AccountPort;
use papertrader::ports::quote_port::QuotePort;
use rust_decimal::Decimal;

pub const TRADER: &str = "alice@example.com";

pub struct MockQuotePort {
    pub quotes: HashMap<String, Quote>,
    pub errors: HashMap<String, String>,
}

impl MockQuotePort {
    pub fn new() -> Self {
        Self {
            quotes: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_quote(mut self, symbol: &str, price: Decimal, currency: &str) -> Self {
        self.quotes.insert(
            symbol.to_string(),
            make_quote(symbol, price, currency, false),
        );
        self
    }

    pub fn with_index(mut self, symbol: &str, price: Decimal, currency: &str) -> Self {
        self.quotes
            .insert(symbol.to_string(), make_quote(symbol, price, currency, true));
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl QuotePort for MockQuotePort {
    fn lookup_quote(&self, symbol: &str) -> Result<Option<Quote>, PapertraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(PapertraderError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.quotes.get(symbol).cloned())
    }

    fn search(&self, term: &str) -> Result<Vec<Quote>, PapertraderError> {
        let mut found: Vec<Quote> = self
            .quotes
            .values()
            .filter(|q| q.matches_term(term))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(found)
    }
}

pub trait ExpectChanged<T> {
    fn expect_changed(self) -> T;
}

impl<T> ExpectChanged<T> for Outcome<T> {
    fn expect_changed(self) -> T {
        match self {
            Outcome::Changed(value) => value,
            Outcome::Unchanged => panic!("expected a change, got Unchanged"),
        }
    }
}

pub fn make_quote(symbol: &str, price: Decimal, currency: &str, is_index: bool) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        name: format!("{symbol} Holdings"),
        price,
        currency: currency.to_string(),
        is_index,
    }
}

pub fn iso_record(country: &str, currency: &str, minor_units: u32, active: bool) -> IsoCurrency {
    IsoCurrency {
        country_code: country.to_string(),
        country_name: format!("{country} country"),
        currency_code: currency.to_string(),
        currency_name: format!("{currency} currency"),
        minor_units,
        active,
    }
}

/// In-memory store with USD and HKD active.
pub fn seeded_store() -> SqliteAdapter {
    let store = SqliteAdapter::in_memory().unwrap();
    store.initialize_schema().unwrap();
    let registry = IsoRegistry::new(&store);
    registry.register(iso_record("US", "USD", 2, true)).unwrap();
    registry.register(iso_record("HK", "HKD", 2, true)).unwrap();
    store
}

/// Seeded store where `TRADER` holds `amount` USD of non-trading cash.
pub fn funded_store(amount: Decimal) -> SqliteAdapter {
    let store = seeded_store();
    store.deposit(TRADER, "USD", amount).unwrap();
    store
}

/// File-backed store under `dir`, pooled over `pool_size` connections, with
/// USD active.
pub fn file_store(dir: &Path, pool_size: u32) -> SqliteAdapter {
    let db_path = dir.join("papertrader.db");
    let content = format!(
        "[sqlite]\npath = {}\npool_size = {pool_size}\n",
        db_path.display()
    );
    let config = FileConfigAdapter::from_string(&content).unwrap();
    let store = SqliteAdapter::from_config(&config).unwrap();
    store.initialize_schema().unwrap();
    IsoRegistry::new(&store)
        .register(iso_record("US", "USD", 2, true))
        .unwrap();
    store
}
