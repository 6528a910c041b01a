//! Order costing: gross notional plus or minus fees depending on direction.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::error::PapertraderError;
use super::fees::calculate_fees;

/// Direction of a trading transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deed {
    Buy,
    Sell,
}

impl Deed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Deed::Buy => "BUY",
            Deed::Sell => "SELL",
        }
    }
}

impl fmt::Display for Deed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Deed {
    type Err = PapertraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Deed::Buy),
            "SELL" => Ok(Deed::Sell),
            other => Err(PapertraderError::validation(
                "deed",
                format!("expected BUY or SELL, got {other:?}"),
            )),
        }
    }
}

/// The costed result of a prospective or executed order.
#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    pub deed: Deed,
    pub unit_price: Decimal,
    pub quantity: u64,
    pub notional: Decimal,
    pub fees: Decimal,
    /// Cash required for a buy, cash received for a sell.
    pub total: Decimal,
    /// Set when sell fees exceeded the notional and the proceeds were
    /// floored at zero.
    pub clamped: bool,
}

/// Cost an order. Validation when the amounts exceed what a `Decimal` can
/// represent.
pub fn estimate_cost(
    deed: Deed,
    unit_price: Decimal,
    quantity: u64,
) -> Result<CostEstimate, PapertraderError> {
    let too_large = || PapertraderError::validation("quantity", "order value is too large");
    let notional = unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(too_large)?;
    let fees = calculate_fees(notional);

    let (total, clamped) = match deed {
        Deed::Buy => (notional.checked_add(fees).ok_or_else(too_large)?, false),
        Deed::Sell => {
            let proceeds = notional - fees;
            if proceeds.is_sign_negative() {
                (Decimal::ZERO, true)
            } else {
                (proceeds, false)
            }
        }
    };

    Ok(CostEstimate {
        deed,
        unit_price,
        quantity,
        notional,
        fees,
        total,
        clamped,
    })
}
