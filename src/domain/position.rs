//! Outstanding positions derived from the trading ledger.

use std::collections::BTreeMap;

use log::warn;
use rust_decimal::Decimal;

use super::error::PapertraderError;
use super::transaction::{TradingTransaction, sort_by_sequence};
use crate::ports::ledger_port::LedgerPort;
use crate::ports::quote_port::QuotePort;

/// Net quantity (buys minus sells) over a trader's history in one symbol.
///
/// Transactions are folded in id order. A history whose running total ever
/// dips below zero breaks the ledger invariant; it is reported and the
/// position is treated as flat.
pub fn outstanding_quantity(history: &[TradingTransaction]) -> u64 {
    let mut ordered: Vec<&TradingTransaction> = history.iter().collect();
    sort_by_sequence(&mut ordered);

    let mut running: i128 = 0;
    for txn in ordered {
        running += txn.signed_quantity();
        if running < 0 {
            warn!(
                "ledger for {} in {} goes negative at transaction {}",
                txn.trader_id, txn.symbol, txn.id
            );
            return 0;
        }
    }
    u64::try_from(running).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutstandingHolding {
    pub symbol: String,
    pub symbol_name: String,
    pub currency: String,
    pub quantity: u64,
    pub current_price: Decimal,
    pub current_amount: Decimal,
}

pub struct PositionTracker<'a> {
    ledger: &'a dyn LedgerPort,
    quotes: &'a dyn QuotePort,
}

impl<'a> PositionTracker<'a> {
    pub fn new(ledger: &'a dyn LedgerPort, quotes: &'a dyn QuotePort) -> Self {
        Self { ledger, quotes }
    }

    pub fn outstanding_quantity(
        &self,
        trader_id: &str,
        symbol: &str,
    ) -> Result<u64, PapertraderError> {
        let history = self.ledger.transactions_for_symbol(trader_id, symbol)?;
        Ok(outstanding_quantity(&history))
    }

    /// Symbols the trader still holds, with their latest market value,
    /// sorted by symbol.
    pub fn outstanding_holdings(
        &self,
        trader_id: &str,
        currency: Option<&str>,
    ) -> Result<Vec<OutstandingHolding>, PapertraderError> {
        let mut by_symbol: BTreeMap<String, Vec<TradingTransaction>> = BTreeMap::new();
        for txn in self.ledger.transactions(trader_id, currency)? {
            by_symbol.entry(txn.symbol.clone()).or_default().push(txn);
        }

        let mut holdings = Vec::new();
        for (symbol, history) in by_symbol {
            let quantity = outstanding_quantity(&history);
            if quantity == 0 {
                continue;
            }
            let quote = self.quotes.lookup_quote(&symbol)?.ok_or_else(|| {
                PapertraderError::QuoteUnavailable {
                    symbol: symbol.clone(),
                    reason: "no longer listed".into(),
                }
            })?;
            // history is non-empty here: a zero-length group has no quantity
            let first = &history[0];
            holdings.push(OutstandingHolding {
                symbol_name: first.symbol_name.clone(),
                currency: first.currency.clone(),
                current_amount: quote.price * Decimal::from(quantity),
                current_price: quote.price,
                quantity,
                symbol,
            });
        }
        Ok(holdings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::Deed;
    use crate::domain::transaction::NewTradingTransaction;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn txn(id: i64, deed: Deed, quantity: u64) -> TradingTransaction {
        NewTradingTransaction {
            trader_id: "alice@example.com".into(),
            symbol: "XYZ".into(),
            symbol_name: "XYZ Holdings".into(),
            transaction_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            deed,
            quantity,
            currency: "USD".into(),
            price: dec!(10),
            cost: dec!(0),
        }
        .with_id(id)
    }

    #[test]
    fn empty_history_is_flat() {
        assert_eq!(outstanding_quantity(&[]), 0);
    }

    #[test]
    fn buys_minus_sells() {
        let history = vec![
            txn(1, Deed::Buy, 100),
            txn(2, Deed::Sell, 40),
            txn(3, Deed::Buy, 15),
        ];
        assert_eq!(outstanding_quantity(&history), 75);
    }

    #[test]
    fn order_of_input_does_not_matter() {
        let history = vec![txn(3, Deed::Sell, 100), txn(1, Deed::Buy, 100)];
        assert_eq!(outstanding_quantity(&history), 0);
    }

    #[test]
    fn corrupt_history_is_flat() {
        let history = vec![txn(1, Deed::Sell, 10), txn(2, Deed::Buy, 5)];
        assert_eq!(outstanding_quantity(&history), 0);
    }

    proptest! {
        #[test]
        fn never_negative_and_matches_sum(
            steps in prop::collection::vec((any::<bool>(), 1u64..500), 0..40)
        ) {
            // Build a valid history: a sell never exceeds what is held.
            let mut held: u64 = 0;
            let mut history = Vec::new();
            for (i, (is_buy, qty)) in steps.into_iter().enumerate() {
                let id = i as i64 + 1;
                if is_buy {
                    held += qty;
                    history.push(txn(id, Deed::Buy, qty));
                } else if held > 0 {
                    let q = qty.min(held);
                    held -= q;
                    history.push(txn(id, Deed::Sell, q));
                }
            }
            prop_assert_eq!(outstanding_quantity(&history), held);
        }
    }
}
