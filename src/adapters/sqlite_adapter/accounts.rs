use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{
    collect_rows, decimal_column, query_err, timestamp_column, SqliteAdapter, TIMESTAMP_FORMAT,
};
use crate::domain::account::{
    apply_deposit, apply_withdrawal, check_bank_destination, format_amount, transfer_description,
    AccountBalance, ActivityEntry, BankAccount, NewBankAccount, DEFAULT_DECIMAL_PLACES,
};
use crate::domain::error::PapertraderError;
use crate::ports::account_port::AccountPort;

/// Minor units come from any ISO record for the currency.
const BALANCE_SELECT: &str = "SELECT b.trader_id, b.currency, b.trading_amount, b.non_trading_amount,
        (SELECT MAX(i.minor_units) FROM iso_currencies i WHERE i.currency_code = b.currency)
     FROM account_balances b";

const BANK_COLUMNS: &str = "id, trader_id, currency, bank_name, account_number, in_use";

#[derive(Debug, Clone, Copy)]
pub(super) enum ActivityLog {
    Account,
    Bank,
}

impl ActivityLog {
    fn table(self) -> &'static str {
        match self {
            ActivityLog::Account => "account_activity",
            ActivityLog::Bank => "bank_activity",
        }
    }
}

fn balance_row(row: &Row<'_>) -> rusqlite::Result<AccountBalance> {
    let decimal_places: Option<u32> = row.get(4)?;
    Ok(AccountBalance {
        trader_id: row.get(0)?,
        currency: row.get(1)?,
        trading_amount: decimal_column(row, 2)?,
        non_trading_amount: decimal_column(row, 3)?,
        decimal_places: decimal_places.unwrap_or(DEFAULT_DECIMAL_PLACES),
    })
}

fn bank_row(row: &Row<'_>) -> rusqlite::Result<BankAccount> {
    Ok(BankAccount {
        id: row.get(0)?,
        trader_id: row.get(1)?,
        currency: row.get(2)?,
        bank_name: row.get(3)?,
        account_number: row.get(4)?,
        in_use: row.get(5)?,
    })
}

fn activity_row(row: &Row<'_>) -> rusqlite::Result<ActivityEntry> {
    Ok(ActivityEntry {
        id: row.get(0)?,
        trader_id: row.get(1)?,
        currency: row.get(2)?,
        description: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

pub(super) fn load_balance(
    conn: &Connection,
    trader_id: &str,
    currency: &str,
) -> Result<Option<AccountBalance>, PapertraderError> {
    conn.query_row(
        &format!("{BALANCE_SELECT} WHERE b.trader_id = ?1 AND b.currency = ?2"),
        params![trader_id, currency],
        balance_row,
    )
    .optional()
    .map_err(query_err)
}

pub(super) fn store_balance(
    conn: &Connection,
    balance: &AccountBalance,
) -> Result<(), PapertraderError> {
    conn.execute(
        "INSERT INTO account_balances (trader_id, currency, trading_amount, non_trading_amount)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (trader_id, currency) DO UPDATE SET
            trading_amount = excluded.trading_amount,
            non_trading_amount = excluded.non_trading_amount",
        params![
            balance.trader_id,
            balance.currency,
            balance.trading_amount.to_string(),
            balance.non_trading_amount.to_string()
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

pub(super) fn load_bank_account(
    conn: &Connection,
    id: i64,
) -> Result<Option<BankAccount>, PapertraderError> {
    conn.query_row(
        &format!("SELECT {BANK_COLUMNS} FROM bank_accounts WHERE id = ?1"),
        params![id],
        bank_row,
    )
    .optional()
    .map_err(query_err)
}

pub(super) fn append_activity(
    conn: &Connection,
    log: ActivityLog,
    trader_id: &str,
    currency: &str,
    description: &str,
) -> Result<(), PapertraderError> {
    conn.execute(
        &format!(
            "INSERT INTO {} (trader_id, currency, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            log.table()
        ),
        params![
            trader_id,
            currency,
            description,
            Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

fn minor_units(conn: &Connection, currency: &str) -> Result<u32, PapertraderError> {
    let units: Option<u32> = conn
        .query_row(
            "SELECT MAX(minor_units) FROM iso_currencies WHERE currency_code = ?1",
            params![currency],
            |row| row.get(0),
        )
        .map_err(query_err)?;
    Ok(units.unwrap_or(DEFAULT_DECIMAL_PLACES))
}

impl AccountPort for SqliteAdapter {
    fn balance(
        &self,
        trader_id: &str,
        currency: &str,
    ) -> Result<Option<AccountBalance>, PapertraderError> {
        let conn = self.connection()?;
        load_balance(&conn, trader_id, currency)
    }

    fn balances(&self, trader_id: &str) -> Result<Vec<AccountBalance>, PapertraderError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "{BALANCE_SELECT} WHERE b.trader_id = ?1 ORDER BY b.currency"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![trader_id], balance_row)
            .map_err(query_err)?;
        collect_rows(rows)
    }

    fn deposit(
        &self,
        trader_id: &str,
        currency: &str,
        amount: Decimal,
    ) -> Result<AccountBalance, PapertraderError> {
        self.write_unit(|tx| {
            let current = match load_balance(tx, trader_id, currency)? {
                Some(balance) => balance,
                None => AccountBalance::empty(trader_id, currency, minor_units(tx, currency)?),
            };
            let next = apply_deposit(&current, amount)?;
            store_balance(tx, &next)?;
            append_activity(
                tx,
                ActivityLog::Account,
                trader_id,
                currency,
                &format!("Deposited {} {}", currency, format_amount(amount)),
            )?;
            Ok(next)
        })
    }

    fn add_bank_account(&self, account: &NewBankAccount) -> Result<BankAccount, PapertraderError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO bank_accounts (trader_id, currency, bank_name, account_number, in_use)
             VALUES (?1, ?2, ?3, ?4, 1)",
            params![
                account.trader_id,
                account.currency,
                account.bank_name,
                account.account_number
            ],
        )
        .map_err(query_err)?;
        Ok(BankAccount {
            id: conn.last_insert_rowid(),
            trader_id: account.trader_id.clone(),
            currency: account.currency.clone(),
            bank_name: account.bank_name.clone(),
            account_number: account.account_number.clone(),
            in_use: true,
        })
    }

    fn bank_account(&self, id: i64) -> Result<Option<BankAccount>, PapertraderError> {
        let conn = self.connection()?;
        load_bank_account(&conn, id)
    }

    fn bank_accounts(&self, trader_id: &str) -> Result<Vec<BankAccount>, PapertraderError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {BANK_COLUMNS} FROM bank_accounts WHERE trader_id = ?1 ORDER BY id"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![trader_id], bank_row)
            .map_err(query_err)?;
        collect_rows(rows)
    }

    fn transfer_to_bank(
        &self,
        bank: &BankAccount,
        amount: Decimal,
    ) -> Result<AccountBalance, PapertraderError> {
        self.write_unit(|tx| {
            let current_bank = load_bank_account(tx, bank.id)?
                .ok_or(PapertraderError::BankAccountNotFound { id: bank.id })?;
            check_bank_destination(&current_bank, &bank.trader_id, &bank.currency)?;

            let current = load_balance(tx, &bank.trader_id, &bank.currency)?.ok_or_else(|| {
                PapertraderError::BalanceNotFound {
                    trader: bank.trader_id.clone(),
                    currency: bank.currency.clone(),
                }
            })?;
            let next = apply_withdrawal(&current, amount)?;
            store_balance(tx, &next)?;

            let line = transfer_description(&bank.currency, amount, &current_bank);
            append_activity(tx, ActivityLog::Account, &bank.trader_id, &bank.currency, &line)?;
            append_activity(tx, ActivityLog::Bank, &bank.trader_id, &bank.currency, &line)?;
            Ok(next)
        })
    }

    fn activity(
        &self,
        trader_id: &str,
        currency: Option<&str>,
    ) -> Result<Vec<ActivityEntry>, PapertraderError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, trader_id, currency, description, created_at FROM account_activity
                 WHERE trader_id = ?1 AND (?2 IS NULL OR currency = ?2)
                 ORDER BY id",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![trader_id, currency], activity_row)
            .map_err(query_err)?;
        collect_rows(rows)
    }

    fn bank_activity(&self, trader_id: &str) -> Result<Vec<ActivityEntry>, PapertraderError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, trader_id, currency, description, created_at FROM bank_activity
                 WHERE trader_id = ?1
                 ORDER BY id",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![trader_id], activity_row)
            .map_err(query_err)?;
        collect_rows(rows)
    }
}
