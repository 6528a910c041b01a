use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::ledger::{load_transaction, txn_row, TXN_COLUMNS};
use super::{collect_rows, decimal_column, query_err, SqliteAdapter};
use crate::domain::error::PapertraderError;
use crate::domain::portfolio::{
    check_linkable, check_unlinkable, compute_aggregates, LinkRequest, LinkTarget, NewPortfolio,
    Portfolio, PriceMap, ResetSummary, UnlinkRequest,
};
use crate::domain::transaction::TradingTransaction;
use crate::ports::portfolio_port::PortfolioPort;

const PORTFOLIO_COLUMNS: &str =
    "id, trader_id, name, currency, invested_amount, current_amount, profit_loss_amount";

fn portfolio_row(row: &Row<'_>) -> rusqlite::Result<Portfolio> {
    Ok(Portfolio {
        id: row.get(0)?,
        trader_id: row.get(1)?,
        name: row.get(2)?,
        currency: row.get(3)?,
        invested_amount: decimal_column(row, 4)?,
        current_amount: decimal_column(row, 5)?,
        profit_loss_amount: decimal_column(row, 6)?,
    })
}

fn load_portfolio(conn: &Connection, id: i64) -> Result<Option<Portfolio>, PapertraderError> {
    conn.query_row(
        &format!("SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE id = ?1"),
        params![id],
        portfolio_row,
    )
    .optional()
    .map_err(query_err)
}

fn insert_portfolio(conn: &Connection, spec: &NewPortfolio) -> Result<Portfolio, PapertraderError> {
    let zero = Decimal::ZERO.to_string();
    conn.execute(
        "INSERT INTO portfolios
            (trader_id, name, currency, invested_amount, current_amount, profit_loss_amount)
         VALUES (?1, ?2, ?3, ?4, ?4, ?4)",
        params![spec.trader_id, spec.name, spec.currency, zero],
    )
    .map_err(query_err)?;
    Ok(Portfolio {
        id: conn.last_insert_rowid(),
        trader_id: spec.trader_id.clone(),
        name: spec.name.clone(),
        currency: spec.currency.clone(),
        invested_amount: Decimal::ZERO,
        current_amount: Decimal::ZERO,
        profit_loss_amount: Decimal::ZERO,
    })
}

fn linked_in(
    conn: &Connection,
    portfolio_id: i64,
) -> Result<Vec<TradingTransaction>, PapertraderError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM trading_transactions WHERE portfolio_id = ?1 ORDER BY id ASC"
        ))
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![portfolio_id], txn_row)
        .map_err(query_err)?;
    collect_rows(rows)
}

fn set_portfolio_id(
    conn: &Connection,
    transaction_id: i64,
    portfolio_id: Option<i64>,
) -> Result<(), PapertraderError> {
    conn.execute(
        "UPDATE trading_transactions SET portfolio_id = ?1 WHERE id = ?2",
        params![portfolio_id, transaction_id],
    )
    .map_err(query_err)?;
    Ok(())
}

/// Revalue the portfolio from its currently linked transactions.
fn recompute(
    conn: &Connection,
    portfolio: Portfolio,
    prices: &PriceMap,
) -> Result<Portfolio, PapertraderError> {
    let aggregates = compute_aggregates(&linked_in(conn, portfolio.id)?, prices)?;
    conn.execute(
        "UPDATE portfolios SET invested_amount = ?1, current_amount = ?2, profit_loss_amount = ?3
         WHERE id = ?4",
        params![
            aggregates.invested.to_string(),
            aggregates.current.to_string(),
            aggregates.profit_loss.to_string(),
            portfolio.id
        ],
    )
    .map_err(query_err)?;
    Ok(portfolio.with_aggregates(aggregates))
}

impl PortfolioPort for SqliteAdapter {
    fn create_portfolio(&self, portfolio: &NewPortfolio) -> Result<Portfolio, PapertraderError> {
        self.write_unit(|tx| insert_portfolio(tx, portfolio))
    }

    fn portfolio(&self, id: i64) -> Result<Option<Portfolio>, PapertraderError> {
        let conn = self.connection()?;
        load_portfolio(&conn, id)
    }

    fn portfolios(
        &self,
        trader_id: &str,
        currency: Option<&str>,
    ) -> Result<Vec<Portfolio>, PapertraderError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PORTFOLIO_COLUMNS} FROM portfolios
                 WHERE trader_id = ?1 AND (?2 IS NULL OR currency = ?2)
                 ORDER BY id"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![trader_id, currency], portfolio_row)
            .map_err(query_err)?;
        collect_rows(rows)
    }

    fn linked_transactions(
        &self,
        portfolio_id: i64,
    ) -> Result<Vec<TradingTransaction>, PapertraderError> {
        let conn = self.connection()?;
        linked_in(&conn, portfolio_id)
    }

    fn link_transactions(
        &self,
        request: &LinkRequest,
        prices: &PriceMap,
    ) -> Result<Portfolio, PapertraderError> {
        self.write_unit(|tx| {
            let portfolio = match &request.target {
                LinkTarget::Existing(id) => load_portfolio(tx, *id)?
                    .ok_or(PapertraderError::PortfolioNotFound { id: *id })?,
                LinkTarget::New(spec) => insert_portfolio(tx, spec)?,
            };
            portfolio.check_owner(&request.trader_id)?;

            for &id in &request.transaction_ids {
                let txn = load_transaction(tx, id)?
                    .ok_or(PapertraderError::TransactionNotFound { id })?;
                check_linkable(&portfolio, &txn)?;
                set_portfolio_id(tx, id, Some(portfolio.id))?;
            }

            recompute(tx, portfolio, prices)
        })
    }

    fn unlink_transactions(
        &self,
        request: &UnlinkRequest,
        prices: &PriceMap,
    ) -> Result<Portfolio, PapertraderError> {
        self.write_unit(|tx| {
            let portfolio = load_portfolio(tx, request.portfolio_id)?.ok_or(
                PapertraderError::PortfolioNotFound {
                    id: request.portfolio_id,
                },
            )?;
            portfolio.check_owner(&request.trader_id)?;

            for &id in &request.transaction_ids {
                let txn = load_transaction(tx, id)?
                    .ok_or(PapertraderError::TransactionNotFound { id })?;
                check_unlinkable(&portfolio, &txn)?;
                set_portfolio_id(tx, id, None)?;
            }

            recompute(tx, portfolio, prices)
        })
    }

    fn reset_portfolios(
        &self,
        trader_id: &str,
        currencies: &[String],
    ) -> Result<ResetSummary, PapertraderError> {
        self.write_unit(|tx| {
            let mut summary = ResetSummary {
                portfolios_removed: 0,
                transactions_unlinked: 0,
            };
            for currency in currencies {
                summary.transactions_unlinked += tx
                    .execute(
                        "UPDATE trading_transactions SET portfolio_id = NULL
                         WHERE portfolio_id IN
                            (SELECT id FROM portfolios WHERE trader_id = ?1 AND currency = ?2)",
                        params![trader_id, currency],
                    )
                    .map_err(query_err)?;
                summary.portfolios_removed += tx
                    .execute(
                        "DELETE FROM portfolios WHERE trader_id = ?1 AND currency = ?2",
                        params![trader_id, currency],
                    )
                    .map_err(query_err)?;
            }
            Ok(summary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::Deed;
    use crate::domain::transaction::NewTradingTransaction;
    use crate::ports::ledger_port::LedgerPort;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn record(adapter: &SqliteAdapter, trader: &str, currency: &str) -> TradingTransaction {
        let conn = adapter.connection().unwrap();
        conn.execute(
            "INSERT INTO trading_transactions
                (trader_id, symbol, symbol_name, transaction_date, deed, quantity, currency, price, cost)
             VALUES (?1, 'XYZ', 'XYZ Holdings', '2024-03-01', 'BUY', 100, ?2, '10.00', '1001.62')",
            params![trader, currency],
        )
        .unwrap();
        NewTradingTransaction {
            trader_id: trader.into(),
            symbol: "XYZ".into(),
            symbol_name: "XYZ Holdings".into(),
            transaction_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            deed: Deed::Buy,
            quantity: 100,
            currency: currency.into(),
            price: dec!(10.00),
            cost: dec!(1001.62),
        }
        .with_id(conn.last_insert_rowid())
    }

    fn new_portfolio(trader: &str, currency: &str) -> NewPortfolio {
        NewPortfolio {
            trader_id: trader.into(),
            name: "Growth".into(),
            currency: currency.into(),
        }
    }

    fn prices() -> PriceMap {
        PriceMap::from([("XYZ".to_string(), dec!(12))])
    }

    #[test]
    fn link_to_new_portfolio_creates_and_values_it() {
        let adapter = adapter();
        let t = record(&adapter, "alice", "USD");

        let p = adapter
            .link_transactions(
                &LinkRequest {
                    trader_id: "alice".into(),
                    target: LinkTarget::New(new_portfolio("alice", "USD")),
                    transaction_ids: vec![t.id],
                },
                &prices(),
            )
            .unwrap();
        assert_eq!(p.invested_amount, dec!(1001.62));
        assert_eq!(p.current_amount, dec!(1200));

        let stored = adapter.portfolio(p.id).unwrap().unwrap();
        assert_eq!(stored, p);
        let linked = adapter.linked_transactions(p.id).unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].portfolio_id, Some(p.id));
    }

    #[test]
    fn failed_batch_links_nothing() {
        let adapter = adapter();
        let usd = record(&adapter, "alice", "USD");
        let hkd = record(&adapter, "alice", "HKD");
        let p = adapter.create_portfolio(&new_portfolio("alice", "USD")).unwrap();

        let err = adapter
            .link_transactions(
                &LinkRequest {
                    trader_id: "alice".into(),
                    target: LinkTarget::Existing(p.id),
                    transaction_ids: vec![usd.id, hkd.id],
                },
                &prices(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            PapertraderError::CurrencyMismatch { transaction_id, .. } if transaction_id == hkd.id
        ));
        assert!(adapter.linked_transactions(p.id).unwrap().is_empty());
    }

    #[test]
    fn failed_new_portfolio_batch_is_not_created() {
        let adapter = adapter();
        let err = adapter
            .link_transactions(
                &LinkRequest {
                    trader_id: "alice".into(),
                    target: LinkTarget::New(new_portfolio("alice", "USD")),
                    transaction_ids: vec![999],
                },
                &prices(),
            )
            .unwrap_err();
        assert!(matches!(err, PapertraderError::TransactionNotFound { id: 999 }));
        assert!(adapter.portfolios("alice", None).unwrap().is_empty());
    }

    #[test]
    fn other_traders_transactions_cannot_be_linked() {
        let adapter = adapter();
        let t = record(&adapter, "bob", "USD");
        let p = adapter.create_portfolio(&new_portfolio("alice", "USD")).unwrap();
        let err = adapter
            .link_transactions(
                &LinkRequest {
                    trader_id: "alice".into(),
                    target: LinkTarget::Existing(p.id),
                    transaction_ids: vec![t.id],
                },
                &prices(),
            )
            .unwrap_err();
        assert!(matches!(err, PapertraderError::NotOwner { .. }));
    }

    #[test]
    fn reset_unlinks_and_deletes_in_scope_only() {
        let adapter = adapter();
        let usd = record(&adapter, "alice", "USD");
        let hkd = record(&adapter, "alice", "HKD");
        for (t, ccy) in [(&usd, "USD"), (&hkd, "HKD")] {
            adapter
                .link_transactions(
                    &LinkRequest {
                        trader_id: "alice".into(),
                        target: LinkTarget::New(new_portfolio("alice", ccy)),
                        transaction_ids: vec![t.id],
                    },
                    &prices(),
                )
                .unwrap();
        }

        let summary = adapter
            .reset_portfolios("alice", &["USD".to_string()])
            .unwrap();
        assert_eq!(summary.portfolios_removed, 1);
        assert_eq!(summary.transactions_unlinked, 1);

        let remaining = adapter.portfolios("alice", None).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].currency, "HKD");

        assert_eq!(adapter.transaction(usd.id).unwrap().unwrap().portfolio_id, None);
        assert!(adapter.transaction(hkd.id).unwrap().unwrap().portfolio_id.is_some());
    }
}
