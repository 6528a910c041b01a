//! Deposits, bank accounts and transfers out of the non-trading balance.

use log::info;
use rust_decimal::Decimal;

use super::account::{
    check_bank_destination, validate_amount, AccountBalance, ActivityEntry, BankAccount,
    NewBankAccount,
};
use super::error::PapertraderError;
use super::iso::{currency_code, IsoRegistry};
use crate::ports::account_port::AccountPort;
use crate::ports::iso_port::IsoPort;

pub struct AccountService<'a> {
    accounts: &'a dyn AccountPort,
    iso: &'a dyn IsoPort,
}

impl<'a> AccountService<'a> {
    pub fn new(accounts: &'a dyn AccountPort, iso: &'a dyn IsoPort) -> Self {
        Self { accounts, iso }
    }

    pub fn deposit(
        &self,
        trader_id: &str,
        currency: &str,
        amount: Decimal,
    ) -> Result<AccountBalance, PapertraderError> {
        require_trader(trader_id)?;
        validate_amount("amount", amount)?;
        let record = IsoRegistry::new(self.iso).require_active(currency)?;

        let balance = self
            .accounts
            .deposit(trader_id, &record.currency_code, amount)?;
        info!(
            "{} deposited {} {}; non-trading balance now {}",
            trader_id, record.currency_code, amount, balance.non_trading_amount
        );
        Ok(balance)
    }

    pub fn add_bank_account(
        &self,
        trader_id: &str,
        currency: &str,
        bank_name: &str,
        account_number: &str,
    ) -> Result<BankAccount, PapertraderError> {
        require_trader(trader_id)?;
        if bank_name.trim().is_empty() {
            return Err(PapertraderError::validation("bank_name", "must not be blank"));
        }
        if account_number.trim().is_empty() {
            return Err(PapertraderError::validation(
                "account_number",
                "must not be blank",
            ));
        }
        let record = IsoRegistry::new(self.iso).require_active(currency)?;

        let account = self.accounts.add_bank_account(&NewBankAccount {
            trader_id: trader_id.to_string(),
            currency: record.currency_code,
            bank_name: bank_name.trim().to_string(),
            account_number: account_number.trim().to_string(),
        })?;
        info!(
            "bank account {} ({} {}) registered for {}",
            account.id, account.bank_name, account.currency, trader_id
        );
        Ok(account)
    }

    pub fn transfer_to_bank(
        &self,
        trader_id: &str,
        currency: &str,
        bank_account_id: i64,
        amount: Decimal,
    ) -> Result<AccountBalance, PapertraderError> {
        require_trader(trader_id)?;
        validate_amount("amount", amount)?;
        let currency = currency_code(currency)?;

        let bank = self
            .accounts
            .bank_account(bank_account_id)?
            .ok_or(PapertraderError::BankAccountNotFound {
                id: bank_account_id,
            })?;
        check_bank_destination(&bank, trader_id, &currency)?;

        let balance = self.accounts.transfer_to_bank(&bank, amount)?;
        info!(
            "{} transferred {} {} to bank account {}",
            trader_id, currency, amount, bank.id
        );
        Ok(balance)
    }

    pub fn balances(&self, trader_id: &str) -> Result<Vec<AccountBalance>, PapertraderError> {
        self.accounts.balances(trader_id)
    }

    pub fn bank_accounts(&self, trader_id: &str) -> Result<Vec<BankAccount>, PapertraderError> {
        self.accounts.bank_accounts(trader_id)
    }

    pub fn activity(
        &self,
        trader_id: &str,
        currency: Option<&str>,
    ) -> Result<Vec<ActivityEntry>, PapertraderError> {
        let currency = currency.map(currency_code).transpose()?;
        self.accounts.activity(trader_id, currency.as_deref())
    }

    pub fn bank_activity(&self, trader_id: &str) -> Result<Vec<ActivityEntry>, PapertraderError> {
        self.accounts.bank_activity(trader_id)
    }
}

fn require_trader(trader_id: &str) -> Result<(), PapertraderError> {
    if trader_id.trim().is_empty() {
        return Err(PapertraderError::validation("trader", "must not be blank"));
    }
    Ok(())
}
