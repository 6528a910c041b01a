//! Sell eligibility policies.

use std::fmt;
use std::str::FromStr;

use super::error::PapertraderError;
use super::pricing::Deed;
use super::quote::Quote;
use crate::ports::ledger_port::LedgerPort;

/// Decides, before any cost is computed, whether a trader may sell a quote.
pub trait SellPolicy {
    fn name(&self) -> &'static str;

    fn permits(
        &self,
        trader_id: &str,
        quote: &Quote,
        ledger: &dyn LedgerPort,
    ) -> Result<bool, PapertraderError>;
}

/// Every sell passes; holdings are still checked at commit.
pub struct PermitAll;

impl SellPolicy for PermitAll {
    fn name(&self) -> &'static str {
        "permit_all"
    }

    fn permits(&self, _: &str, _: &Quote, _: &dyn LedgerPort) -> Result<bool, PapertraderError> {
        Ok(true)
    }
}

/// Refuses a sell while the trader has buys recorded under a symbol equal
/// to the quote's currency code.
pub struct HoldingGuard;

impl SellPolicy for HoldingGuard {
    fn name(&self) -> &'static str {
        "holding_guard"
    }

    fn permits(
        &self,
        trader_id: &str,
        quote: &Quote,
        ledger: &dyn LedgerPort,
    ) -> Result<bool, PapertraderError> {
        let guarded = ledger.transactions_for_symbol(trader_id, &quote.currency)?;
        Ok(!guarded.iter().any(|t| t.deed == Deed::Buy))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SellPolicyKind {
    #[default]
    PermitAll,
    HoldingGuard,
}

impl SellPolicyKind {
    pub fn build(self) -> Box<dyn SellPolicy> {
        match self {
            SellPolicyKind::PermitAll => Box::new(PermitAll),
            SellPolicyKind::HoldingGuard => Box::new(HoldingGuard),
        }
    }
}

impl fmt::Display for SellPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.build().name())
    }
}

impl FromStr for SellPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permit_all" => Ok(SellPolicyKind::PermitAll),
            "holding_guard" => Ok(SellPolicyKind::HoldingGuard),
            other => Err(format!(
                "unknown sell policy {other:?} (expected permit_all or holding_guard)"
            )),
        }
    }
}
