//! SQLite store adapter.
//!
//! One adapter implements every store port. Reads take a pooled connection;
//! every write runs inside a `BEGIN IMMEDIATE` transaction so that the
//! checks it makes and the rows it writes cannot interleave with another
//! writer.

mod accounts;
mod iso;
mod ledger;
mod portfolios;

use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Row, Transaction, TransactionBehavior};
use rust_decimal::Decimal;

use crate::domain::config_validation::DEFAULT_POOL_SIZE;
use crate::domain::error::PapertraderError;
use crate::ports::config_port::ConfigPort;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug)]
pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| PapertraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE) as u32;

        let manager = SqliteConnectionManager::file(&db_path).with_init(|c| {
            c.busy_timeout(Duration::from_secs(5))?;
            c.execute_batch("PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    /// A private in-memory database. The pool holds a single connection, so
    /// every caller sees the same data.
    pub fn in_memory() -> Result<Self, PapertraderError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), PapertraderError> {
        let conn = self.connection()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS iso_currencies (
                country_code TEXT NOT NULL,
                country_name TEXT NOT NULL,
                currency_code TEXT NOT NULL,
                currency_name TEXT NOT NULL,
                minor_units INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (country_code, currency_code)
            );
            CREATE INDEX IF NOT EXISTS idx_iso_currency ON iso_currencies(currency_code);

            CREATE TABLE IF NOT EXISTS account_balances (
                trader_id TEXT NOT NULL,
                currency TEXT NOT NULL,
                trading_amount TEXT NOT NULL,
                non_trading_amount TEXT NOT NULL,
                PRIMARY KEY (trader_id, currency)
            );

            CREATE TABLE IF NOT EXISTS portfolios (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trader_id TEXT NOT NULL,
                name TEXT NOT NULL,
                currency TEXT NOT NULL,
                invested_amount TEXT NOT NULL,
                current_amount TEXT NOT NULL,
                profit_loss_amount TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_portfolios_trader ON portfolios(trader_id, currency);

            CREATE TABLE IF NOT EXISTS trading_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trader_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                symbol_name TEXT NOT NULL,
                transaction_date TEXT NOT NULL,
                deed TEXT NOT NULL CHECK (deed IN ('BUY', 'SELL')),
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                currency TEXT NOT NULL,
                price TEXT NOT NULL,
                cost TEXT NOT NULL,
                portfolio_id INTEGER REFERENCES portfolios(id)
            );
            CREATE INDEX IF NOT EXISTS idx_txn_trader_symbol ON trading_transactions(trader_id, symbol);
            CREATE INDEX IF NOT EXISTS idx_txn_portfolio ON trading_transactions(portfolio_id);

            CREATE TABLE IF NOT EXISTS bank_accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trader_id TEXT NOT NULL,
                currency TEXT NOT NULL,
                bank_name TEXT NOT NULL,
                account_number TEXT NOT NULL,
                in_use INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS account_activity (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trader_id TEXT NOT NULL,
                currency TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS bank_activity (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trader_id TEXT NOT NULL,
                currency TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )
        .map_err(query_err)?;

        Ok(())
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, PapertraderError> {
        self.pool.get().map_err(pool_err)
    }

    /// Run `work` inside an immediate transaction. Any error rolls back.
    fn write_unit<T>(
        &self,
        work: impl FnOnce(&Transaction<'_>) -> Result<T, PapertraderError>,
    ) -> Result<T, PapertraderError> {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;
        let value = work(&tx)?;
        tx.commit().map_err(query_err)?;
        Ok(value)
    }
}

fn pool_err(e: r2d2::Error) -> PapertraderError {
    PapertraderError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> PapertraderError {
    PapertraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_failure(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| conversion_failure(idx, e))
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| conversion_failure(idx, e))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT)
        .map_err(|e| conversion_failure(idx, e))
}

fn quantity_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn quantity_param(quantity: u64) -> Result<i64, PapertraderError> {
    i64::try_from(quantity).map_err(|_| PapertraderError::validation("quantity", "too large"))
}

/// Collect mapped rows, surfacing the first row error.
fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, PapertraderError> {
    rows.map(|row| row.map_err(query_err)).collect()
}
