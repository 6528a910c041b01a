//! ISO country/currency registry port.

use crate::domain::error::PapertraderError;
use crate::domain::iso::IsoCurrency;

pub trait IsoPort {
    /// Insert or replace the record keyed by country and currency code.
    fn upsert_currency(&self, record: &IsoCurrency) -> Result<(), PapertraderError>;

    fn currency_record(
        &self,
        country_code: &str,
        currency_code: &str,
    ) -> Result<Option<IsoCurrency>, PapertraderError>;

    fn set_currency_active(
        &self,
        country_code: &str,
        currency_code: &str,
        active: bool,
    ) -> Result<(), PapertraderError>;

    /// Any active record carrying the currency code.
    fn active_currency(&self, currency_code: &str) -> Result<Option<IsoCurrency>, PapertraderError>;

    fn currencies(&self, active_only: bool) -> Result<Vec<IsoCurrency>, PapertraderError>;
}
