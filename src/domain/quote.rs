//! Market quotes as supplied by the quote provider.

use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    /// Indices can be searched but never traded.
    pub is_index: bool,
}

impl Quote {
    pub fn matches_symbol(&self, symbol: &str) -> bool {
        self.symbol.eq_ignore_ascii_case(symbol.trim())
    }

    /// Case-insensitive substring match on symbol or name.
    pub fn matches_term(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        !term.is_empty()
            && (self.symbol.to_lowercase().contains(&term)
                || self.name.to_lowercase().contains(&term))
    }
}
