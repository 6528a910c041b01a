//! Portfolio creation, linking and unlinking.

use std::collections::BTreeSet;

use log::{debug, info};

use super::error::PapertraderError;
use super::iso::IsoRegistry;
use super::outcome::Outcome;
use super::portfolio::{
    dedup_ids, LinkRequest, LinkTarget, NewPortfolio, Portfolio, PriceMap, UnlinkRequest,
};
use super::transaction::TradingTransaction;
use crate::ports::iso_port::IsoPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::portfolio_port::PortfolioPort;
use crate::ports::quote_port::QuotePort;

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioDetails {
    pub portfolio: Portfolio,
    pub transactions: Vec<TradingTransaction>,
}

pub struct PortfolioManager<'a> {
    portfolios: &'a dyn PortfolioPort,
    ledger: &'a dyn LedgerPort,
    quotes: &'a dyn QuotePort,
    iso: &'a dyn IsoPort,
}

impl<'a> PortfolioManager<'a> {
    pub fn new(
        portfolios: &'a dyn PortfolioPort,
        ledger: &'a dyn LedgerPort,
        quotes: &'a dyn QuotePort,
        iso: &'a dyn IsoPort,
    ) -> Self {
        Self {
            portfolios,
            ledger,
            quotes,
            iso,
        }
    }

    pub fn create_portfolio(
        &self,
        trader_id: &str,
        name: &str,
        currency: &str,
    ) -> Result<Portfolio, PapertraderError> {
        let spec = self.new_portfolio(trader_id, name, currency)?;
        let portfolio = self.portfolios.create_portfolio(&spec)?;
        info!(
            "portfolio {} ({}, {}) created for {}",
            portfolio.id, portfolio.name, portfolio.currency, trader_id
        );
        Ok(portfolio)
    }

    /// Link transactions to an existing or new portfolio. All-or-nothing:
    /// one unlinkable id rejects the batch.
    pub fn link_transactions(
        &self,
        trader_id: &str,
        target: LinkTarget,
        transaction_ids: &[i64],
    ) -> Result<Outcome<Portfolio>, PapertraderError> {
        let ids = dedup_ids(transaction_ids);
        if ids.is_empty() {
            return Ok(Outcome::Unchanged);
        }

        let (target, mut symbols) = match target {
            LinkTarget::Existing(id) => {
                let portfolio = self.owned_portfolio(trader_id, id)?;
                (LinkTarget::Existing(portfolio.id), self.linked_symbols(id)?)
            }
            LinkTarget::New(spec) => {
                let spec = self.new_portfolio(trader_id, &spec.name, &spec.currency)?;
                (LinkTarget::New(spec), BTreeSet::new())
            }
        };

        for id in &ids {
            let txn = self
                .ledger
                .transaction(*id)?
                .ok_or(PapertraderError::TransactionNotFound { id: *id })?;
            symbols.insert(txn.symbol);
        }

        let request = LinkRequest {
            trader_id: trader_id.to_string(),
            target,
            transaction_ids: ids,
        };
        let portfolio = self
            .portfolios
            .link_transactions(&request, &self.price_map(&symbols)?)?;
        info!(
            "linked {} transaction(s) to portfolio {}: invested {}, current {}",
            request.transaction_ids.len(),
            portfolio.id,
            portfolio.invested_amount,
            portfolio.current_amount
        );
        Ok(Outcome::Changed(portfolio))
    }

    pub fn unlink_transactions(
        &self,
        trader_id: &str,
        portfolio_id: i64,
        transaction_ids: &[i64],
    ) -> Result<Outcome<Portfolio>, PapertraderError> {
        let ids = dedup_ids(transaction_ids);
        if ids.is_empty() {
            return Ok(Outcome::Unchanged);
        }
        self.owned_portfolio(trader_id, portfolio_id)?;

        let symbols = self.linked_symbols(portfolio_id)?;
        let request = UnlinkRequest {
            trader_id: trader_id.to_string(),
            portfolio_id,
            transaction_ids: ids,
        };
        let portfolio = self
            .portfolios
            .unlink_transactions(&request, &self.price_map(&symbols)?)?;
        info!(
            "unlinked {} transaction(s) from portfolio {}: invested {}, current {}",
            request.transaction_ids.len(),
            portfolio.id,
            portfolio.invested_amount,
            portfolio.current_amount
        );
        Ok(Outcome::Changed(portfolio))
    }

    pub fn list_portfolios(
        &self,
        trader_id: &str,
        currency: Option<&str>,
    ) -> Result<Vec<Portfolio>, PapertraderError> {
        let currency = currency.map(str::to_ascii_uppercase);
        self.portfolios.portfolios(trader_id, currency.as_deref())
    }

    pub fn portfolio_details(
        &self,
        trader_id: &str,
        portfolio_id: i64,
    ) -> Result<PortfolioDetails, PapertraderError> {
        let portfolio = self.owned_portfolio(trader_id, portfolio_id)?;
        let transactions = self.portfolios.linked_transactions(portfolio_id)?;
        Ok(PortfolioDetails {
            portfolio,
            transactions,
        })
    }

    fn new_portfolio(
        &self,
        trader_id: &str,
        name: &str,
        currency: &str,
    ) -> Result<NewPortfolio, PapertraderError> {
        let spec = NewPortfolio {
            trader_id: trader_id.to_string(),
            name: name.trim().to_string(),
            currency: currency.trim().to_ascii_uppercase(),
        };
        spec.validate()?;
        let record = IsoRegistry::new(self.iso).require_active(&spec.currency)?;
        Ok(NewPortfolio {
            currency: record.currency_code,
            ..spec
        })
    }

    fn owned_portfolio(
        &self,
        trader_id: &str,
        portfolio_id: i64,
    ) -> Result<Portfolio, PapertraderError> {
        let portfolio = self
            .portfolios
            .portfolio(portfolio_id)?
            .ok_or(PapertraderError::PortfolioNotFound { id: portfolio_id })?;
        portfolio.check_owner(trader_id)?;
        Ok(portfolio)
    }

    fn linked_symbols(&self, portfolio_id: i64) -> Result<BTreeSet<String>, PapertraderError> {
        Ok(self
            .portfolios
            .linked_transactions(portfolio_id)?
            .into_iter()
            .map(|t| t.symbol)
            .collect())
    }

    /// Latest prices for the symbols. Delisted symbols are left out; the
    /// valuation fails only if one of them is still held.
    fn price_map(&self, symbols: &BTreeSet<String>) -> Result<PriceMap, PapertraderError> {
        let mut prices = PriceMap::new();
        for symbol in symbols {
            match self.quotes.lookup_quote(symbol)? {
                Some(quote) => {
                    prices.insert(symbol.clone(), quote.price);
                }
                None => debug!("no quote for {symbol} while valuing portfolio"),
            }
        }
        Ok(prices)
    }
}
