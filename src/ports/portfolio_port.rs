//! Portfolio store port.

use crate::domain::error::PapertraderError;
use crate::domain::portfolio::{
    LinkRequest, NewPortfolio, Portfolio, PriceMap, ResetSummary, UnlinkRequest,
};
use crate::domain::transaction::TradingTransaction;

pub trait PortfolioPort {
    fn create_portfolio(&self, portfolio: &NewPortfolio) -> Result<Portfolio, PapertraderError>;

    fn portfolio(&self, id: i64) -> Result<Option<Portfolio>, PapertraderError>;

    fn portfolios(
        &self,
        trader_id: &str,
        currency: Option<&str>,
    ) -> Result<Vec<Portfolio>, PapertraderError>;

    /// Transactions linked to the portfolio, ascending by id.
    fn linked_transactions(
        &self,
        portfolio_id: i64,
    ) -> Result<Vec<TradingTransaction>, PapertraderError>;

    /// Validate, link and recompute aggregates in one atomic unit. A
    /// `LinkTarget::New` portfolio is created inside the same unit.
    fn link_transactions(
        &self,
        request: &LinkRequest,
        prices: &PriceMap,
    ) -> Result<Portfolio, PapertraderError>;

    /// Validate, unlink and recompute aggregates in one atomic unit.
    fn unlink_transactions(
        &self,
        request: &UnlinkRequest,
        prices: &PriceMap,
    ) -> Result<Portfolio, PapertraderError>;

    /// Unlink every transaction of the trader's portfolios in the given
    /// currencies and delete those portfolios, atomically.
    fn reset_portfolios(
        &self,
        trader_id: &str,
        currencies: &[String],
    ) -> Result<ResetSummary, PapertraderError>;
}
