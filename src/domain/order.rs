//! Order execution: quote, cost, validate, then settle atomically.
//!
//! Everything that can be decided from the order alone (input checks, quote
//! resolution, the sell policy, the transfer destination) is decided here
//! before the ledger is touched. Decisions that depend on stored state
//! (funds, holdings) are made by [`settle_trade`], which the ledger adapter
//! calls inside its commit unit.

use chrono::{NaiveDate, Utc};
use log::{info, warn};
use rust_decimal::Decimal;

use super::account::{
    check_bank_destination, format_amount, transfer_description, AccountBalance, BankAccount,
    AMOUNT_LIMIT,
};
use super::error::PapertraderError;
use super::position::outstanding_quantity;
use super::pricing::{estimate_cost, CostEstimate, Deed};
use super::quote::Quote;
use super::sell_policy::SellPolicy;
use super::transaction::{NewTradingTransaction, TradingTransaction};
use crate::ports::account_port::AccountPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::quote_port::QuotePort;

/// A priced, validated order ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOrder {
    pub transaction: NewTradingTransaction,
    pub estimate: CostEstimate,
    /// Sell proceeds go straight on to this account when set.
    pub transfer_to: Option<BankAccount>,
}

/// The balance and log lines an order produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub balance: AccountBalance,
    pub activity: Vec<String>,
    pub bank_activity: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeReceipt {
    pub transaction: TradingTransaction,
    pub balance: AccountBalance,
    pub estimate: CostEstimate,
    pub transferred_to: Option<BankAccount>,
}

/// Apply an order to the balance it settles against.
///
/// `outstanding` is the trader's current quantity in the symbol; it is only
/// consulted for sells.
pub fn settle_trade(
    order: &TradeOrder,
    balance: &AccountBalance,
    outstanding: u64,
) -> Result<Settlement, PapertraderError> {
    let txn = &order.transaction;
    let total = order.estimate.total;
    let mut next = balance.clone();
    let mut activity = Vec::new();
    let mut bank_activity = None;

    match txn.deed {
        Deed::Buy => {
            if balance.non_trading_amount < total {
                return Err(PapertraderError::InsufficientFunds {
                    currency: txn.currency.clone(),
                    required: total,
                    available: balance.non_trading_amount,
                });
            }
            next.non_trading_amount -= total;
            next.trading_amount += total;
            activity.push(format!(
                "Bought {} shares of {} at {} {}, total cost {} {}",
                txn.quantity,
                txn.symbol,
                txn.currency,
                txn.price,
                txn.currency,
                format_amount(total)
            ));
        }
        Deed::Sell => {
            if txn.quantity > outstanding {
                return Err(PapertraderError::InsufficientHoldings {
                    symbol: txn.symbol.clone(),
                    requested: txn.quantity,
                    outstanding,
                });
            }
            next.non_trading_amount += total;
            next.trading_amount = (next.trading_amount - total).max(Decimal::ZERO);
            activity.push(format!(
                "Sold {} shares of {} at {} {}, total proceeds {} {}",
                txn.quantity,
                txn.symbol,
                txn.currency,
                txn.price,
                txn.currency,
                format_amount(total)
            ));

            if let Some(bank) = &order.transfer_to {
                next.non_trading_amount -= total;
                let line = transfer_description(&txn.currency, total, bank);
                activity.push(line.clone());
                bank_activity = Some(line);
            }
        }
    }

    if next.non_trading_amount >= AMOUNT_LIMIT {
        return Err(PapertraderError::CeilingExceeded {
            currency: txn.currency.clone(),
            limit: AMOUNT_LIMIT,
        });
    }

    Ok(Settlement {
        balance: next,
        activity,
        bank_activity,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct SellRequest {
    pub trader_id: String,
    pub symbol: String,
    pub quantity: u64,
    pub auto_transfer_to_bank: bool,
    pub bank_account_id: Option<i64>,
}

/// Read-only view of what an order would cost right now.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPreview {
    pub quote: Quote,
    pub estimate: CostEstimate,
    /// The trader's current holding, reported for sells only.
    pub outstanding: Option<u64>,
    /// Name of the sell policy that would refuse this sell, if any.
    pub refused_by: Option<&'static str>,
}

impl OrderPreview {
    pub fn nothing_to_sell(&self) -> bool {
        self.outstanding == Some(0)
    }
}

pub struct OrderExecutor<'a> {
    quotes: &'a dyn QuotePort,
    ledger: &'a dyn LedgerPort,
    accounts: &'a dyn AccountPort,
    policy: &'a dyn SellPolicy,
}

impl<'a> OrderExecutor<'a> {
    pub fn new(
        quotes: &'a dyn QuotePort,
        ledger: &'a dyn LedgerPort,
        accounts: &'a dyn AccountPort,
        policy: &'a dyn SellPolicy,
    ) -> Self {
        Self {
            quotes,
            ledger,
            accounts,
            policy,
        }
    }

    pub fn preview(
        &self,
        trader_id: &str,
        deed: Deed,
        symbol: &str,
        quantity: u64,
    ) -> Result<OrderPreview, PapertraderError> {
        validate_order(trader_id, symbol, quantity)?;
        let quote = self.tradeable_quote(symbol)?;
        let estimate = estimate_cost(deed, quote.price, quantity)?;
        let (outstanding, refused_by) = match deed {
            Deed::Buy => (None, None),
            Deed::Sell => {
                let history = self.ledger.transactions_for_symbol(trader_id, &quote.symbol)?;
                let refused_by = if self.policy.permits(trader_id, &quote, self.ledger)? {
                    None
                } else {
                    Some(self.policy.name())
                };
                (Some(outstanding_quantity(&history)), refused_by)
            }
        };
        Ok(OrderPreview {
            quote,
            estimate,
            outstanding,
            refused_by,
        })
    }

    pub fn buy(
        &self,
        trader_id: &str,
        symbol: &str,
        quantity: u64,
    ) -> Result<TradeReceipt, PapertraderError> {
        self.execute_buy(trader_id, symbol, quantity)
            .inspect_err(|e| warn!("buy of {quantity} {symbol} for {trader_id} rejected: {e}"))
    }

    pub fn sell(&self, request: &SellRequest) -> Result<TradeReceipt, PapertraderError> {
        self.execute_sell(request).inspect_err(|e| {
            warn!(
                "sell of {} {} for {} rejected: {e}",
                request.quantity, request.symbol, request.trader_id
            )
        })
    }

    fn execute_buy(
        &self,
        trader_id: &str,
        symbol: &str,
        quantity: u64,
    ) -> Result<TradeReceipt, PapertraderError> {
        validate_order(trader_id, symbol, quantity)?;
        let quote = self.tradeable_quote(symbol)?;
        let estimate = estimate_cost(Deed::Buy, quote.price, quantity)?;

        let order = TradeOrder {
            transaction: new_transaction(trader_id, &quote, &estimate, today()),
            estimate,
            transfer_to: None,
        };
        let receipt = self.ledger.commit_trade(&order)?;
        info!(
            "transaction {} recorded: {trader_id} bought {quantity} {} for {} {}",
            receipt.transaction.id, quote.symbol, quote.currency, receipt.estimate.total
        );
        Ok(receipt)
    }

    fn execute_sell(&self, request: &SellRequest) -> Result<TradeReceipt, PapertraderError> {
        validate_order(&request.trader_id, &request.symbol, request.quantity)?;
        if request.auto_transfer_to_bank && request.bank_account_id.is_none() {
            return Err(PapertraderError::validation(
                "bank_account_id",
                "required when transferring proceeds to a bank",
            ));
        }

        let quote = self.tradeable_quote(&request.symbol)?;

        if !self.policy.permits(&request.trader_id, &quote, self.ledger)? {
            return Err(PapertraderError::SellRefused {
                symbol: quote.symbol.clone(),
                policy: self.policy.name().to_string(),
            });
        }

        let transfer_to = match (request.auto_transfer_to_bank, request.bank_account_id) {
            (true, Some(id)) => {
                let bank = self
                    .accounts
                    .bank_account(id)?
                    .ok_or(PapertraderError::BankAccountNotFound { id })?;
                check_bank_destination(&bank, &request.trader_id, &quote.currency)?;
                Some(bank)
            }
            _ => None,
        };

        let estimate = estimate_cost(Deed::Sell, quote.price, request.quantity)?;
        if estimate.clamped {
            warn!(
                "fees exceed notional selling {} {}; proceeds floored at zero",
                request.quantity, quote.symbol
            );
        }

        let order = TradeOrder {
            transaction: new_transaction(&request.trader_id, &quote, &estimate, today()),
            estimate,
            transfer_to,
        };
        let receipt = self.ledger.commit_trade(&order)?;
        info!(
            "transaction {} recorded: {} sold {} {} for {} {}",
            receipt.transaction.id,
            request.trader_id,
            request.quantity,
            quote.symbol,
            quote.currency,
            receipt.estimate.total
        );
        Ok(receipt)
    }

    fn tradeable_quote(&self, symbol: &str) -> Result<Quote, PapertraderError> {
        let symbol = symbol.trim();
        let quote = self
            .quotes
            .lookup_quote(symbol)?
            .ok_or_else(|| PapertraderError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;
        if quote.is_index {
            return Err(PapertraderError::NotTradeable {
                symbol: quote.symbol,
            });
        }
        Ok(quote)
    }
}

fn validate_order(trader_id: &str, symbol: &str, quantity: u64) -> Result<(), PapertraderError> {
    if trader_id.trim().is_empty() {
        return Err(PapertraderError::validation("trader", "must not be blank"));
    }
    if symbol.trim().is_empty() {
        return Err(PapertraderError::validation("symbol", "must not be blank"));
    }
    if quantity == 0 {
        return Err(PapertraderError::validation("quantity", "must be positive"));
    }
    Ok(())
}

fn new_transaction(
    trader_id: &str,
    quote: &Quote,
    estimate: &CostEstimate,
    date: NaiveDate,
) -> NewTradingTransaction {
    NewTradingTransaction {
        trader_id: trader_id.to_string(),
        symbol: quote.symbol.clone(),
        symbol_name: quote.name.clone(),
        transaction_date: date,
        deed: estimate.deed,
        quantity: estimate.quantity,
        currency: quote.currency.clone(),
        price: quote.price,
        cost: estimate.total,
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(deed: Deed, price: Decimal, quantity: u64, bank: Option<BankAccount>) -> TradeOrder {
        let quote = Quote {
            symbol: "XYZ".into(),
            name: "XYZ Holdings".into(),
            price,
            currency: "USD".into(),
            is_index: false,
        };
        let estimate = estimate_cost(deed, price, quantity).unwrap();
        TradeOrder {
            transaction: new_transaction(
                "alice@example.com",
                &quote,
                &estimate,
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ),
            estimate,
            transfer_to: bank,
        }
    }

    fn balance(trading: Decimal, non_trading: Decimal) -> AccountBalance {
        AccountBalance {
            trading_amount: trading,
            non_trading_amount: non_trading,
            ..AccountBalance::empty("alice@example.com", "USD", 2)
        }
    }

    fn bank() -> BankAccount {
        BankAccount {
            id: 1,
            trader_id: "alice@example.com".into(),
            currency: "USD".into(),
            bank_name: "First Bank".into(),
            account_number: "001-234".into(),
            in_use: true,
        }
    }

    #[test]
    fn buy_moves_cost_from_non_trading_to_trading() {
        let s = settle_trade(
            &order(Deed::Buy, dec!(10.00), 100, None),
            &balance(dec!(0), dec!(2000.00)),
            0,
        )
        .unwrap();
        assert_eq!(s.balance.non_trading_amount, dec!(998.38));
        assert_eq!(s.balance.trading_amount, dec!(1001.62));
        assert_eq!(
            s.activity,
            vec!["Bought 100 shares of XYZ at USD 10.00, total cost USD 1,001.6200".to_string()]
        );
        assert!(s.bank_activity.is_none());
    }

    #[test]
    fn buy_without_funds_is_rejected() {
        let err = settle_trade(
            &order(Deed::Buy, dec!(10.00), 100, None),
            &balance(dec!(0), dec!(1001.61)),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, PapertraderError::InsufficientFunds { .. }));
    }

    #[test]
    fn sell_beyond_holdings_is_rejected() {
        let err = settle_trade(
            &order(Deed::Sell, dec!(12.00), 150, None),
            &balance(dec!(1001.62), dec!(998.38)),
            100,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PapertraderError::InsufficientHoldings { requested: 150, outstanding: 100, .. }
        ));
    }

    #[test]
    fn sell_credits_proceeds_and_floors_trading() {
        let s = settle_trade(
            &order(Deed::Sell, dec!(12.00), 100, None),
            &balance(dec!(1001.62), dec!(998.38)),
            100,
        )
        .unwrap();
        assert_eq!(s.balance.non_trading_amount, dec!(2195.736));
        assert_eq!(s.balance.trading_amount, Decimal::ZERO);
    }

    #[test]
    fn sell_with_transfer_routes_proceeds_out() {
        let s = settle_trade(
            &order(Deed::Sell, dec!(12.00), 100, Some(bank())),
            &balance(dec!(1001.62), dec!(998.38)),
            100,
        )
        .unwrap();
        assert_eq!(s.balance.non_trading_amount, dec!(998.38));
        assert_eq!(s.activity.len(), 2);
        assert_eq!(
            s.bank_activity.as_deref(),
            Some("Transferred USD 1,197.3560 to bank First Bank with account number 001-234 for currency USD")
        );
    }

    #[test]
    fn sell_proceeds_may_not_breach_ceiling() {
        let err = settle_trade(
            &order(Deed::Sell, dec!(12.00), 100, None),
            &balance(dec!(0), AMOUNT_LIMIT - dec!(1)),
            100,
        )
        .unwrap_err();
        assert!(matches!(err, PapertraderError::CeilingExceeded { .. }));
    }

    #[test]
    fn order_validation() {
        assert!(validate_order("alice@example.com", "XYZ", 1).is_ok());
        assert!(validate_order("", "XYZ", 1).is_err());
        assert!(validate_order("alice@example.com", "  ", 1).is_err());
        assert!(validate_order("alice@example.com", "XYZ", 0).is_err());
    }

    #[test]
    fn preview_flags_nothing_to_sell() {
        let p = OrderPreview {
            quote: Quote {
                symbol: "XYZ".into(),
                name: "XYZ".into(),
                price: dec!(1),
                currency: "USD".into(),
                is_index: false,
            },
            estimate: estimate_cost(Deed::Sell, dec!(1), 1).unwrap(),
            outstanding: Some(0),
            refused_by: None,
        };
        assert!(p.nothing_to_sell());
    }
}
