//! Per-currency account balances, bank accounts and the activity log.
//!
//! Each trader holds one balance per currency split into a non-trading
//! amount (deposited cash available to spend) and a trading amount (cash
//! committed to buys). Amounts are kept at full precision; the decimal
//! places from the ISO registry only apply when displaying them.

use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::error::PapertraderError;

/// No balance may reach one trillion units of its currency.
pub const AMOUNT_LIMIT: Decimal = dec!(1000000000000);

/// Used when a balance's currency has no ISO record.
pub const DEFAULT_DECIMAL_PLACES: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct AccountBalance {
    pub trader_id: String,
    pub currency: String,
    pub trading_amount: Decimal,
    pub non_trading_amount: Decimal,
    pub decimal_places: u32,
}

impl AccountBalance {
    pub fn empty(trader_id: &str, currency: &str, decimal_places: u32) -> Self {
        AccountBalance {
            trader_id: trader_id.to_string(),
            currency: currency.to_string(),
            trading_amount: Decimal::ZERO,
            non_trading_amount: Decimal::ZERO,
            decimal_places,
        }
    }

    pub fn display_trading(&self) -> Decimal {
        scale_for_display(self.trading_amount, self.decimal_places)
    }

    pub fn display_non_trading(&self) -> Decimal {
        scale_for_display(self.non_trading_amount, self.decimal_places)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BankAccount {
    pub id: i64,
    pub trader_id: String,
    pub currency: String,
    pub bank_name: String,
    pub account_number: String,
    pub in_use: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBankAccount {
    pub trader_id: String,
    pub currency: String,
    pub bank_name: String,
    pub account_number: String,
}

/// One line of the human-readable account or bank activity log.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub id: i64,
    pub trader_id: String,
    pub currency: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}

pub fn scale_for_display(amount: Decimal, decimal_places: u32) -> Decimal {
    let mut scaled =
        amount.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero);
    scaled.rescale(decimal_places);
    scaled
}

/// Format with thousands separators and four decimal places, e.g.
/// `1,001.6200`. Used in activity descriptions.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(4);
    let text = rounded.abs().to_string();
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "0000"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

/// A deposit or transfer amount must be positive and below the ceiling.
pub fn validate_amount(field: &str, amount: Decimal) -> Result<(), PapertraderError> {
    if amount <= Decimal::ZERO {
        return Err(PapertraderError::validation(field, "must be positive"));
    }
    if amount >= AMOUNT_LIMIT {
        return Err(PapertraderError::validation(
            field,
            format!("must be below {AMOUNT_LIMIT}"),
        ));
    }
    Ok(())
}

pub fn apply_deposit(
    balance: &AccountBalance,
    amount: Decimal,
) -> Result<AccountBalance, PapertraderError> {
    validate_amount("amount", amount)?;
    let non_trading_amount = balance.non_trading_amount + amount;
    if non_trading_amount >= AMOUNT_LIMIT {
        return Err(PapertraderError::CeilingExceeded {
            currency: balance.currency.clone(),
            limit: AMOUNT_LIMIT,
        });
    }
    Ok(AccountBalance {
        non_trading_amount,
        ..balance.clone()
    })
}

pub fn apply_withdrawal(
    balance: &AccountBalance,
    amount: Decimal,
) -> Result<AccountBalance, PapertraderError> {
    validate_amount("amount", amount)?;
    if balance.non_trading_amount < amount {
        return Err(PapertraderError::InsufficientFunds {
            currency: balance.currency.clone(),
            required: amount,
            available: balance.non_trading_amount,
        });
    }
    Ok(AccountBalance {
        non_trading_amount: balance.non_trading_amount - amount,
        ..balance.clone()
    })
}

/// A bank account can receive funds only if the trader owns it, it is in
/// use, and it is denominated in the currency being sent.
pub fn check_bank_destination(
    bank: &BankAccount,
    trader_id: &str,
    currency: &str,
) -> Result<(), PapertraderError> {
    if bank.trader_id != trader_id {
        return Err(PapertraderError::NotOwner {
            resource: format!("bank account {}", bank.id),
            trader: trader_id.to_string(),
        });
    }
    if !bank.in_use {
        return Err(PapertraderError::BankAccountUnusable {
            id: bank.id,
            reason: "not in use".into(),
        });
    }
    if !bank.currency.eq_ignore_ascii_case(currency) {
        return Err(PapertraderError::BankAccountUnusable {
            id: bank.id,
            reason: format!("holds {}, funds are in {}", bank.currency, currency),
        });
    }
    Ok(())
}

pub fn transfer_description(currency: &str, amount: Decimal, bank: &BankAccount) -> String {
    format!(
        "Transferred {} {} to bank {} with account number {} for currency {}",
        currency,
        format_amount(amount),
        bank.bank_name,
        bank.account_number,
        bank.currency
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(amount: Decimal) -> AccountBalance {
        AccountBalance {
            non_trading_amount: amount,
            ..AccountBalance::empty("alice@example.com", "USD", 2)
        }
    }

    fn bank() -> BankAccount {
        BankAccount {
            id: 3,
            trader_id: "alice@example.com".into(),
            currency: "USD".into(),
            bank_name: "First Bank".into(),
            account_number: "001-234".into(),
            in_use: true,
        }
    }

    #[test]
    fn deposit_adds_to_non_trading_amount() {
        let b = apply_deposit(&funded(dec!(100)), dec!(2000.00)).unwrap();
        assert_eq!(b.non_trading_amount, dec!(2100.00));
        assert_eq!(b.trading_amount, Decimal::ZERO);
    }

    #[test]
    fn deposit_rejects_non_positive_amounts() {
        let err = apply_deposit(&funded(dec!(0)), dec!(0)).unwrap_err();
        assert!(matches!(err, PapertraderError::Validation { .. }));
        let err = apply_deposit(&funded(dec!(0)), dec!(-5)).unwrap_err();
        assert!(matches!(err, PapertraderError::Validation { .. }));
    }

    #[test]
    fn deposit_rejects_amount_at_ceiling() {
        let err = apply_deposit(&funded(dec!(0)), AMOUNT_LIMIT).unwrap_err();
        assert!(matches!(err, PapertraderError::Validation { .. }));
    }

    #[test]
    fn deposit_rejects_balance_reaching_ceiling() {
        let start = funded(AMOUNT_LIMIT - dec!(10));
        let err = apply_deposit(&start, dec!(10)).unwrap_err();
        assert!(matches!(err, PapertraderError::CeilingExceeded { .. }));
        assert!(apply_deposit(&start, dec!(9.99)).is_ok());
    }

    #[test]
    fn withdrawal_requires_funds() {
        let err = apply_withdrawal(&funded(dec!(50)), dec!(50.01)).unwrap_err();
        assert!(matches!(err, PapertraderError::InsufficientFunds { .. }));
        let b = apply_withdrawal(&funded(dec!(50)), dec!(50)).unwrap();
        assert_eq!(b.non_trading_amount, Decimal::ZERO);
    }

    #[test]
    fn display_scales_to_minor_units() {
        let mut b = funded(dec!(998.38));
        b.trading_amount = dec!(1197.356);
        assert_eq!(b.display_trading().to_string(), "1197.36");
        assert_eq!(b.display_non_trading().to_string(), "998.38");

        b.decimal_places = 0;
        assert_eq!(b.display_non_trading().to_string(), "998");
    }

    #[test]
    fn format_amount_groups_thousands() {
        assert_eq!(format_amount(dec!(1001.62)), "1,001.6200");
        assert_eq!(format_amount(dec!(999)), "999.0000");
        assert_eq!(format_amount(dec!(1234567.89125)), "1,234,567.8913");
        assert_eq!(format_amount(dec!(0)), "0.0000");
        assert_eq!(format_amount(dec!(-2500)), "-2,500.0000");
    }

    #[test]
    fn bank_destination_checks() {
        assert!(check_bank_destination(&bank(), "alice@example.com", "USD").is_ok());

        let err = check_bank_destination(&bank(), "bob@example.com", "USD").unwrap_err();
        assert!(matches!(err, PapertraderError::NotOwner { .. }));

        let mut closed = bank();
        closed.in_use = false;
        let err = check_bank_destination(&closed, "alice@example.com", "USD").unwrap_err();
        assert!(matches!(err, PapertraderError::BankAccountUnusable { .. }));

        let err = check_bank_destination(&bank(), "alice@example.com", "HKD").unwrap_err();
        assert!(matches!(err, PapertraderError::BankAccountUnusable { .. }));
    }

    #[test]
    fn transfer_description_names_bank() {
        let text = transfer_description("USD", dec!(1197.356), &bank());
        assert_eq!(
            text,
            "Transferred USD 1,197.3560 to bank First Bank with account number 001-234 for currency USD"
        );
    }
}
