//! Portfolios: named single-currency groupings of trading transactions.
//!
//! A portfolio's amounts are derived entirely from the transactions linked
//! to it. Linked buys form lots per symbol; linked sells consume those lots
//! first-in first-out in transaction id order. The surviving lots are what
//! the portfolio is invested in.

use std::collections::{BTreeMap, HashMap, VecDeque};

use rust_decimal::Decimal;

use super::error::PapertraderError;
use super::pricing::Deed;
use super::transaction::{TradingTransaction, sort_by_sequence};

/// Latest quoted price per symbol.
pub type PriceMap = HashMap<String, Decimal>;

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub id: i64,
    pub trader_id: String,
    pub name: String,
    pub currency: String,
    pub invested_amount: Decimal,
    pub current_amount: Decimal,
    pub profit_loss_amount: Decimal,
}

impl Portfolio {
    pub fn with_aggregates(self, aggregates: Aggregates) -> Self {
        Portfolio {
            invested_amount: aggregates.invested,
            current_amount: aggregates.current,
            profit_loss_amount: aggregates.profit_loss,
            ..self
        }
    }

    pub fn check_owner(&self, trader_id: &str) -> Result<(), PapertraderError> {
        if self.trader_id != trader_id {
            return Err(PapertraderError::NotOwner {
                resource: format!("portfolio {}", self.id),
                trader: trader_id.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPortfolio {
    pub trader_id: String,
    pub name: String,
    pub currency: String,
}

impl NewPortfolio {
    pub fn validate(&self) -> Result<(), PapertraderError> {
        if self.trader_id.trim().is_empty() {
            return Err(PapertraderError::validation("trader", "must not be blank"));
        }
        if self.name.trim().is_empty() {
            return Err(PapertraderError::validation("name", "must not be blank"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aggregates {
    pub invested: Decimal,
    pub current: Decimal,
    pub profit_loss: Decimal,
}

/// Where a batch of transactions is linked to.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    Existing(i64),
    New(NewPortfolio),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkRequest {
    pub trader_id: String,
    pub target: LinkTarget,
    pub transaction_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnlinkRequest {
    pub trader_id: String,
    pub portfolio_id: i64,
    pub transaction_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSummary {
    pub portfolios_removed: usize,
    pub transactions_unlinked: usize,
}

struct Lot {
    remaining: u64,
    quantity: u64,
    cost: Decimal,
}

impl Lot {
    fn invested(&self) -> Decimal {
        if self.remaining == self.quantity {
            self.cost
        } else {
            self.cost * Decimal::from(self.remaining) / Decimal::from(self.quantity)
        }
    }
}

/// Value the linked transactions of one portfolio.
///
/// `prices` must hold a price for every symbol with surviving quantity;
/// a missing one is reported as `QuoteUnavailable`.
pub fn compute_aggregates(
    linked: &[TradingTransaction],
    prices: &PriceMap,
) -> Result<Aggregates, PapertraderError> {
    let mut ordered: Vec<&TradingTransaction> = linked.iter().collect();
    sort_by_sequence(&mut ordered);

    let mut lots: BTreeMap<&str, VecDeque<Lot>> = BTreeMap::new();
    for txn in ordered {
        let queue = lots.entry(txn.symbol.as_str()).or_default();
        match txn.deed {
            Deed::Buy => queue.push_back(Lot {
                remaining: txn.quantity,
                quantity: txn.quantity,
                cost: txn.cost,
            }),
            Deed::Sell => {
                let mut to_match = txn.quantity;
                while to_match > 0 {
                    let Some(front) = queue.front_mut() else {
                        break;
                    };
                    let taken = front.remaining.min(to_match);
                    front.remaining -= taken;
                    to_match -= taken;
                    if front.remaining == 0 {
                        queue.pop_front();
                    }
                }
            }
        }
    }

    let mut invested = Decimal::ZERO;
    let mut current = Decimal::ZERO;
    for (symbol, queue) in &lots {
        let surviving: u64 = queue.iter().map(|lot| lot.remaining).sum();
        if surviving == 0 {
            continue;
        }
        let price = prices
            .get(*symbol)
            .ok_or_else(|| PapertraderError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: "no price available for portfolio valuation".into(),
            })?;
        invested += queue.iter().map(Lot::invested).sum::<Decimal>();
        current += *price * Decimal::from(surviving);
    }

    Ok(Aggregates {
        invested,
        current,
        profit_loss: current - invested,
    })
}

/// A transaction may join a portfolio when it belongs to the portfolio's
/// trader, is not linked anywhere, and is in the portfolio's currency.
pub fn check_linkable(
    portfolio: &Portfolio,
    txn: &TradingTransaction,
) -> Result<(), PapertraderError> {
    if txn.trader_id != portfolio.trader_id {
        return Err(PapertraderError::NotOwner {
            resource: format!("trading transaction {}", txn.id),
            trader: portfolio.trader_id.clone(),
        });
    }
    if let Some(portfolio_id) = txn.portfolio_id {
        return Err(PapertraderError::AlreadyLinked {
            transaction_id: txn.id,
            portfolio_id,
        });
    }
    if txn.currency != portfolio.currency {
        return Err(PapertraderError::CurrencyMismatch {
            transaction_id: txn.id,
            expected: portfolio.currency.clone(),
            actual: txn.currency.clone(),
        });
    }
    Ok(())
}

pub fn check_unlinkable(
    portfolio: &Portfolio,
    txn: &TradingTransaction,
) -> Result<(), PapertraderError> {
    if txn.portfolio_id != Some(portfolio.id) {
        return Err(PapertraderError::NotInPortfolio {
            transaction_id: txn.id,
            portfolio_id: portfolio.id,
        });
    }
    Ok(())
}

/// Drop duplicate ids, keeping first-seen order.
pub fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::NewTradingTransaction;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn txn(id: i64, symbol: &str, deed: Deed, quantity: u64, cost: Decimal) -> TradingTransaction {
        NewTradingTransaction {
            trader_id: "alice@example.com".into(),
            symbol: symbol.into(),
            symbol_name: format!("{symbol} Holdings"),
            transaction_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            deed,
            quantity,
            currency: "USD".into(),
            price: dec!(10),
            cost,
        }
        .with_id(id)
    }

    fn portfolio() -> Portfolio {
        Portfolio {
            id: 7,
            trader_id: "alice@example.com".into(),
            name: "Growth".into(),
            currency: "USD".into(),
            invested_amount: Decimal::ZERO,
            current_amount: Decimal::ZERO,
            profit_loss_amount: Decimal::ZERO,
        }
    }

    fn prices(entries: &[(&str, Decimal)]) -> PriceMap {
        entries.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[test]
    fn empty_portfolio_is_zero() {
        let agg = compute_aggregates(&[], &PriceMap::new()).unwrap();
        assert_eq!(agg, Aggregates::default());
    }

    #[test]
    fn single_buy_uses_full_cost() {
        let linked = vec![txn(1, "XYZ", Deed::Buy, 100, dec!(1001.62))];
        let agg = compute_aggregates(&linked, &prices(&[("XYZ", dec!(12))])).unwrap();
        assert_eq!(agg.invested, dec!(1001.62));
        assert_eq!(agg.current, dec!(1200));
        assert_eq!(agg.profit_loss, dec!(198.38));
    }

    #[test]
    fn sells_consume_oldest_lots_first() {
        let linked = vec![
            txn(1, "XYZ", Deed::Buy, 100, dec!(1000)),
            txn(2, "XYZ", Deed::Buy, 100, dec!(2000)),
            txn(3, "XYZ", Deed::Sell, 150, dec!(0)),
        ];
        let agg = compute_aggregates(&linked, &prices(&[("XYZ", dec!(25))])).unwrap();
        // first lot gone, half the second survives
        assert_eq!(agg.invested, dec!(1000));
        assert_eq!(agg.current, dec!(1250));
    }

    #[test]
    fn matching_follows_id_not_input_order() {
        let linked = vec![
            txn(5, "XYZ", Deed::Sell, 100, dec!(0)),
            txn(4, "XYZ", Deed::Buy, 100, dec!(3000)),
            txn(2, "XYZ", Deed::Buy, 100, dec!(1000)),
        ];
        let agg = compute_aggregates(&linked, &prices(&[("XYZ", dec!(10))])).unwrap();
        assert_eq!(agg.invested, dec!(3000));
    }

    #[test]
    fn excess_sell_is_ignored() {
        let linked = vec![
            txn(1, "XYZ", Deed::Sell, 50, dec!(0)),
            txn(2, "ABC", Deed::Buy, 10, dec!(100)),
        ];
        let agg = compute_aggregates(&linked, &prices(&[("ABC", dec!(11))])).unwrap();
        assert_eq!(agg.invested, dec!(100));
        assert_eq!(agg.current, dec!(110));
    }

    #[test]
    fn symbols_are_matched_separately() {
        let linked = vec![
            txn(1, "XYZ", Deed::Buy, 10, dec!(100)),
            txn(2, "ABC", Deed::Buy, 10, dec!(200)),
            txn(3, "ABC", Deed::Sell, 10, dec!(0)),
        ];
        let agg = compute_aggregates(&linked, &prices(&[("XYZ", dec!(9))])).unwrap();
        assert_eq!(agg.invested, dec!(100));
        assert_eq!(agg.current, dec!(90));
        assert_eq!(agg.profit_loss, dec!(-10));
    }

    #[test]
    fn missing_price_for_held_symbol_fails() {
        let linked = vec![txn(1, "XYZ", Deed::Buy, 10, dec!(100))];
        let err = compute_aggregates(&linked, &PriceMap::new()).unwrap_err();
        assert!(matches!(err, PapertraderError::QuoteUnavailable { .. }));
    }

    #[test]
    fn linkable_checks() {
        let p = portfolio();
        let fresh = txn(1, "XYZ", Deed::Buy, 10, dec!(100));
        assert!(check_linkable(&p, &fresh).is_ok());

        let mut linked = fresh.clone();
        linked.portfolio_id = Some(3);
        assert!(matches!(
            check_linkable(&p, &linked).unwrap_err(),
            PapertraderError::AlreadyLinked { transaction_id: 1, portfolio_id: 3 }
        ));

        let mut foreign = fresh.clone();
        foreign.currency = "HKD".into();
        assert!(matches!(
            check_linkable(&p, &foreign).unwrap_err(),
            PapertraderError::CurrencyMismatch { transaction_id: 1, .. }
        ));

        let mut other = fresh;
        other.trader_id = "bob@example.com".into();
        assert!(matches!(
            check_linkable(&p, &other).unwrap_err(),
            PapertraderError::NotOwner { .. }
        ));
    }

    #[test]
    fn unlinkable_requires_membership() {
        let p = portfolio();
        let mut t = txn(1, "XYZ", Deed::Buy, 10, dec!(100));
        assert!(check_unlinkable(&p, &t).is_err());
        t.portfolio_id = Some(7);
        assert!(check_unlinkable(&p, &t).is_ok());
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        assert_eq!(dedup_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
