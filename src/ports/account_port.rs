//! Account balance, bank account and activity log port.

use rust_decimal::Decimal;

use crate::domain::account::{AccountBalance, ActivityEntry, BankAccount, NewBankAccount};
use crate::domain::error::PapertraderError;

pub trait AccountPort {
    fn balance(
        &self,
        trader_id: &str,
        currency: &str,
    ) -> Result<Option<AccountBalance>, PapertraderError>;

    fn balances(&self, trader_id: &str) -> Result<Vec<AccountBalance>, PapertraderError>;

    /// Credit the non-trading amount, creating the balance if absent, and
    /// log the deposit. Atomic.
    fn deposit(
        &self,
        trader_id: &str,
        currency: &str,
        amount: Decimal,
    ) -> Result<AccountBalance, PapertraderError>;

    fn add_bank_account(&self, account: &NewBankAccount) -> Result<BankAccount, PapertraderError>;

    fn bank_account(&self, id: i64) -> Result<Option<BankAccount>, PapertraderError>;

    fn bank_accounts(&self, trader_id: &str) -> Result<Vec<BankAccount>, PapertraderError>;

    /// Debit the non-trading amount and log the transfer on both the
    /// account and the bank side. Atomic.
    fn transfer_to_bank(
        &self,
        bank: &BankAccount,
        amount: Decimal,
    ) -> Result<AccountBalance, PapertraderError>;

    fn activity(
        &self,
        trader_id: &str,
        currency: Option<&str>,
    ) -> Result<Vec<ActivityEntry>, PapertraderError>;

    fn bank_activity(&self, trader_id: &str) -> Result<Vec<ActivityEntry>, PapertraderError>;
}
