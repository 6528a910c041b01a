//! Trading ledger port.

use crate::domain::error::PapertraderError;
use crate::domain::order::{TradeOrder, TradeReceipt};
use crate::domain::transaction::TradingTransaction;

pub trait LedgerPort {
    fn transaction(&self, id: i64) -> Result<Option<TradingTransaction>, PapertraderError>;

    /// The trader's transactions in `symbol`, ascending by id.
    fn transactions_for_symbol(
        &self,
        trader_id: &str,
        symbol: &str,
    ) -> Result<Vec<TradingTransaction>, PapertraderError>;

    /// The trader's transactions, optionally in one currency, ascending by id.
    fn transactions(
        &self,
        trader_id: &str,
        currency: Option<&str>,
    ) -> Result<Vec<TradingTransaction>, PapertraderError>;

    /// Settle and record an order in one atomic unit.
    ///
    /// The implementation must load the balance (and, for a sell, the
    /// outstanding quantity) inside the same unit that writes the result,
    /// and apply [`crate::domain::order::settle_trade`] to decide it.
    fn commit_trade(&self, order: &TradeOrder) -> Result<TradeReceipt, PapertraderError>;
}
