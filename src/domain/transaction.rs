//! Trading ledger records.

use std::borrow::Borrow;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::pricing::Deed;

/// A recorded buy or sell. Only `portfolio_id` changes after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingTransaction {
    /// Monotonic; later transactions always carry larger ids.
    pub id: i64,
    pub trader_id: String,
    pub symbol: String,
    pub symbol_name: String,
    pub transaction_date: NaiveDate,
    pub deed: Deed,
    pub quantity: u64,
    pub currency: String,
    pub price: Decimal,
    /// Notional plus fees for a buy, notional minus fees for a sell.
    pub cost: Decimal,
    pub portfolio_id: Option<i64>,
}

impl TradingTransaction {
    /// Signed quantity: positive for a buy, negative for a sell.
    pub fn signed_quantity(&self) -> i128 {
        match self.deed {
            Deed::Buy => i128::from(self.quantity),
            Deed::Sell => -i128::from(self.quantity),
        }
    }
}

/// A transaction that has not yet been assigned an id by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTradingTransaction {
    pub trader_id: String,
    pub symbol: String,
    pub symbol_name: String,
    pub transaction_date: NaiveDate,
    pub deed: Deed,
    pub quantity: u64,
    pub currency: String,
    pub price: Decimal,
    pub cost: Decimal,
}

impl NewTradingTransaction {
    pub fn with_id(self, id: i64) -> TradingTransaction {
        TradingTransaction {
            id,
            trader_id: self.trader_id,
            symbol: self.symbol,
            symbol_name: self.symbol_name,
            transaction_date: self.transaction_date,
            deed: self.deed,
            quantity: self.quantity,
            currency: self.currency,
            price: self.price,
            cost: self.cost,
            portfolio_id: None,
        }
    }
}

/// Sort a batch into ledger order (ascending id).
pub fn sort_by_sequence<T: Borrow<TradingTransaction>>(transactions: &mut [T]) {
    transactions.sort_by_key(|t| Borrow::<TradingTransaction>::borrow(t).id);
}
