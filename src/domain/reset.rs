//! Portfolio reset: return a trader's groupings to the empty baseline.
//!
//! Resetting unlinks and deletes portfolios only. Ledger rows survive, so
//! outstanding quantities and balances are unaffected.

use std::collections::BTreeSet;

use log::info;

use super::error::PapertraderError;
use super::iso::IsoRegistry;
use super::outcome::Outcome;
use super::portfolio::ResetSummary;
use crate::ports::iso_port::IsoPort;
use crate::ports::portfolio_port::PortfolioPort;

pub struct ResetEngine<'a> {
    portfolios: &'a dyn PortfolioPort,
    iso: &'a dyn IsoPort,
}

impl<'a> ResetEngine<'a> {
    pub fn new(portfolios: &'a dyn PortfolioPort, iso: &'a dyn IsoPort) -> Self {
        Self { portfolios, iso }
    }

    /// Reset one currency, or every currency the trader has portfolios in
    /// when `reset_all` is set. Resetting an empty scope is `Unchanged`.
    pub fn reset_portfolios(
        &self,
        trader_id: &str,
        reset_all: bool,
        currency: Option<&str>,
    ) -> Result<Outcome<ResetSummary>, PapertraderError> {
        if trader_id.trim().is_empty() {
            return Err(PapertraderError::validation("trader", "must not be blank"));
        }

        let currencies: Vec<String> = if reset_all {
            self.portfolios
                .portfolios(trader_id, None)?
                .into_iter()
                .map(|p| p.currency)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        } else {
            let currency = currency
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| {
                    PapertraderError::validation("currency", "required unless resetting all")
                })?;
            let record = IsoRegistry::new(self.iso).require_active(currency)?;
            vec![record.currency_code]
        };

        if currencies.is_empty() {
            return Ok(Outcome::Unchanged);
        }

        let summary = self.portfolios.reset_portfolios(trader_id, &currencies)?;
        if summary.portfolios_removed == 0 {
            return Ok(Outcome::Unchanged);
        }

        info!(
            "reset {} portfolio(s) for {} in {}: {} transaction(s) unlinked",
            summary.portfolios_removed,
            trader_id,
            currencies.join(","),
            summary.transactions_unlinked
        );
        Ok(Outcome::Changed(summary))
    }
}
