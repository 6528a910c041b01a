//! ISO country/currency registry.
//!
//! A currency is usable for balances, bank accounts and portfolios only
//! while at least one of its country records is active.

use log::info;

use super::error::PapertraderError;
use super::outcome::Outcome;
use crate::ports::iso_port::IsoPort;

#[derive(Debug, Clone, PartialEq)]
pub struct IsoCurrency {
    /// ISO 3166 alpha-2.
    pub country_code: String,
    pub country_name: String,
    /// ISO 4217 alpha-3.
    pub currency_code: String,
    pub currency_name: String,
    pub minor_units: u32,
    pub active: bool,
}

impl IsoCurrency {
    /// Uppercase the codes and trim the names.
    pub fn normalized(self) -> Self {
        IsoCurrency {
            country_code: self.country_code.trim().to_ascii_uppercase(),
            country_name: self.country_name.trim().to_string(),
            currency_code: self.currency_code.trim().to_ascii_uppercase(),
            currency_name: self.currency_name.trim().to_string(),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), PapertraderError> {
        if !is_alpha_code(&self.country_code, 2) {
            return Err(PapertraderError::validation(
                "country_code",
                "must be two letters",
            ));
        }
        if !is_alpha_code(&self.currency_code, 3) {
            return Err(PapertraderError::validation(
                "currency_code",
                "must be three letters",
            ));
        }
        if self.country_name.trim().is_empty() {
            return Err(PapertraderError::validation("country_name", "must not be blank"));
        }
        if self.currency_name.trim().is_empty() {
            return Err(PapertraderError::validation("currency_name", "must not be blank"));
        }
        if self.minor_units > 4 {
            return Err(PapertraderError::validation(
                "minor_units",
                "must be between 0 and 4",
            ));
        }
        Ok(())
    }
}

fn is_alpha_code(code: &str, len: usize) -> bool {
    code.len() == len && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Normalize a user-supplied currency code; Validation when malformed.
pub fn currency_code(raw: &str) -> Result<String, PapertraderError> {
    let code = raw.trim().to_ascii_uppercase();
    if !is_alpha_code(&code, 3) {
        return Err(PapertraderError::validation(
            "currency",
            format!("{raw:?} is not a three-letter currency code"),
        ));
    }
    Ok(code)
}

pub struct IsoRegistry<'a> {
    iso: &'a dyn IsoPort,
}

impl<'a> IsoRegistry<'a> {
    pub fn new(iso: &'a dyn IsoPort) -> Self {
        Self { iso }
    }

    pub fn register(&self, record: IsoCurrency) -> Result<IsoCurrency, PapertraderError> {
        let record = record.normalized();
        record.validate()?;
        self.iso.upsert_currency(&record)?;
        info!(
            "registered {}/{} (active: {})",
            record.country_code, record.currency_code, record.active
        );
        Ok(record)
    }

    pub fn activate(
        &self,
        country_code: &str,
        currency_code: &str,
    ) -> Result<Outcome<IsoCurrency>, PapertraderError> {
        self.set_active(country_code, currency_code, true)
    }

    pub fn deactivate(
        &self,
        country_code: &str,
        currency_code: &str,
    ) -> Result<Outcome<IsoCurrency>, PapertraderError> {
        self.set_active(country_code, currency_code, false)
    }

    fn set_active(
        &self,
        country_code: &str,
        currency_code: &str,
        active: bool,
    ) -> Result<Outcome<IsoCurrency>, PapertraderError> {
        let country = country_code.trim().to_ascii_uppercase();
        let currency = currency_code.trim().to_ascii_uppercase();

        let record = self
            .iso
            .currency_record(&country, &currency)?
            .ok_or_else(|| PapertraderError::IsoRecordNotFound {
                country: country.clone(),
                currency: currency.clone(),
            })?;

        if record.active == active {
            return Ok(Outcome::Unchanged);
        }

        self.iso.set_currency_active(&country, &currency, active)?;
        info!(
            "{} {}/{}",
            if active { "activated" } else { "deactivated" },
            country,
            currency
        );
        Ok(Outcome::Changed(IsoCurrency { active, ..record }))
    }

    /// The active record for `currency`, or NotFound.
    pub fn require_active(&self, currency: &str) -> Result<IsoCurrency, PapertraderError> {
        let code = currency_code(currency)?;
        self.iso
            .active_currency(&code)?
            .ok_or(PapertraderError::CurrencyNotFound { currency: code })
    }

    pub fn list(&self, active_only: bool) -> Result<Vec<IsoCurrency>, PapertraderError> {
        self.iso.currencies(active_only)
    }
}
