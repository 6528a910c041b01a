//! Market quote provider port.

use crate::domain::error::PapertraderError;
use crate::domain::quote::Quote;

pub trait QuotePort {
    /// `Ok(None)` when the provider does not list the symbol.
    fn lookup_quote(&self, symbol: &str) -> Result<Option<Quote>, PapertraderError>;

    fn search(&self, term: &str) -> Result<Vec<Quote>, PapertraderError>;
}
