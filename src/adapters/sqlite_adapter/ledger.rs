use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::accounts::{
    append_activity, load_balance, load_bank_account, store_balance, ActivityLog,
};
use super::{
    collect_rows, conversion_failure, date_column, decimal_column, quantity_column,
    quantity_param, query_err, SqliteAdapter, DATE_FORMAT,
};
use crate::domain::account::check_bank_destination;
use crate::domain::error::PapertraderError;
use crate::domain::order::{settle_trade, TradeOrder, TradeReceipt};
use crate::domain::position::outstanding_quantity;
use crate::domain::pricing::Deed;
use crate::domain::transaction::{NewTradingTransaction, TradingTransaction};
use crate::ports::ledger_port::LedgerPort;

pub(super) const TXN_COLUMNS: &str = "id, trader_id, symbol, symbol_name, transaction_date, deed, \
     quantity, currency, price, cost, portfolio_id";

pub(super) fn txn_row(row: &Row<'_>) -> rusqlite::Result<TradingTransaction> {
    let deed_str: String = row.get(5)?;
    let deed = Deed::from_str(&deed_str).map_err(|e| conversion_failure(5, e))?;
    Ok(TradingTransaction {
        id: row.get(0)?,
        trader_id: row.get(1)?,
        symbol: row.get(2)?,
        symbol_name: row.get(3)?,
        transaction_date: date_column(row, 4)?,
        deed,
        quantity: quantity_column(row, 6)?,
        currency: row.get(7)?,
        price: decimal_column(row, 8)?,
        cost: decimal_column(row, 9)?,
        portfolio_id: row.get(10)?,
    })
}

pub(super) fn load_transaction(
    conn: &Connection,
    id: i64,
) -> Result<Option<TradingTransaction>, PapertraderError> {
    conn.query_row(
        &format!("SELECT {TXN_COLUMNS} FROM trading_transactions WHERE id = ?1"),
        params![id],
        txn_row,
    )
    .optional()
    .map_err(query_err)
}

fn symbol_history(
    conn: &Connection,
    trader_id: &str,
    symbol: &str,
) -> Result<Vec<TradingTransaction>, PapertraderError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM trading_transactions
             WHERE trader_id = ?1 AND symbol = ?2
             ORDER BY id ASC"
        ))
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![trader_id, symbol], txn_row)
        .map_err(query_err)?;
    collect_rows(rows)
}

fn insert_transaction(
    conn: &Connection,
    txn: &NewTradingTransaction,
) -> Result<TradingTransaction, PapertraderError> {
    conn.execute(
        "INSERT INTO trading_transactions
            (trader_id, symbol, symbol_name, transaction_date, deed, quantity, currency, price, cost)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            txn.trader_id,
            txn.symbol,
            txn.symbol_name,
            txn.transaction_date.format(DATE_FORMAT).to_string(),
            txn.deed.as_str(),
            quantity_param(txn.quantity)?,
            txn.currency,
            txn.price.to_string(),
            txn.cost.to_string()
        ],
    )
    .map_err(query_err)?;
    Ok(txn.clone().with_id(conn.last_insert_rowid()))
}

impl LedgerPort for SqliteAdapter {
    fn transaction(&self, id: i64) -> Result<Option<TradingTransaction>, PapertraderError> {
        let conn = self.connection()?;
        load_transaction(&conn, id)
    }

    fn transactions_for_symbol(
        &self,
        trader_id: &str,
        symbol: &str,
    ) -> Result<Vec<TradingTransaction>, PapertraderError> {
        let conn = self.connection()?;
        symbol_history(&conn, trader_id, symbol)
    }

    fn transactions(
        &self,
        trader_id: &str,
        currency: Option<&str>,
    ) -> Result<Vec<TradingTransaction>, PapertraderError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TXN_COLUMNS} FROM trading_transactions
                 WHERE trader_id = ?1 AND (?2 IS NULL OR currency = ?2)
                 ORDER BY id ASC"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![trader_id, currency], txn_row)
            .map_err(query_err)?;
        collect_rows(rows)
    }

    fn commit_trade(&self, order: &TradeOrder) -> Result<TradeReceipt, PapertraderError> {
        let new = &order.transaction;
        self.write_unit(|tx| {
            let outstanding = match new.deed {
                Deed::Buy => 0,
                Deed::Sell => {
                    outstanding_quantity(&symbol_history(tx, &new.trader_id, &new.symbol)?)
                }
            };

            let balance = load_balance(tx, &new.trader_id, &new.currency)?.ok_or_else(|| {
                PapertraderError::BalanceNotFound {
                    trader: new.trader_id.clone(),
                    currency: new.currency.clone(),
                }
            })?;

            if let Some(bank) = &order.transfer_to {
                let current = load_bank_account(tx, bank.id)?
                    .ok_or(PapertraderError::BankAccountNotFound { id: bank.id })?;
                check_bank_destination(&current, &new.trader_id, &new.currency)?;
            }

            let settlement = settle_trade(order, &balance, outstanding)?;

            let transaction = insert_transaction(tx, new)?;
            store_balance(tx, &settlement.balance)?;
            for line in &settlement.activity {
                append_activity(tx, ActivityLog::Account, &new.trader_id, &new.currency, line)?;
            }
            if let Some(line) = &settlement.bank_activity {
                append_activity(tx, ActivityLog::Bank, &new.trader_id, &new.currency, line)?;
            }

            Ok(TradeReceipt {
                transaction,
                balance: settlement.balance,
                estimate: order.estimate.clone(),
                transferred_to: order.transfer_to.clone(),
            })
        })
    }
}
