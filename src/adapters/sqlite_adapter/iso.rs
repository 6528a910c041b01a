use rusqlite::{params, OptionalExtension, Row};

use super::{collect_rows, query_err, SqliteAdapter};
use crate::domain::error::PapertraderError;
use crate::domain::iso::IsoCurrency;
use crate::ports::iso_port::IsoPort;

const ISO_COLUMNS: &str =
    "country_code, country_name, currency_code, currency_name, minor_units, active";

fn iso_row(row: &Row<'_>) -> rusqlite::Result<IsoCurrency> {
    Ok(IsoCurrency {
        country_code: row.get(0)?,
        country_name: row.get(1)?,
        currency_code: row.get(2)?,
        currency_name: row.get(3)?,
        minor_units: row.get(4)?,
        active: row.get(5)?,
    })
}

impl IsoPort for SqliteAdapter {
    fn upsert_currency(&self, record: &IsoCurrency) -> Result<(), PapertraderError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO iso_currencies (country_code, country_name, currency_code, currency_name, minor_units, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (country_code, currency_code) DO UPDATE SET
                country_name = excluded.country_name,
                currency_name = excluded.currency_name,
                minor_units = excluded.minor_units,
                active = excluded.active",
            params![
                record.country_code,
                record.country_name,
                record.currency_code,
                record.currency_name,
                record.minor_units,
                record.active
            ],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn currency_record(
        &self,
        country_code: &str,
        currency_code: &str,
    ) -> Result<Option<IsoCurrency>, PapertraderError> {
        let conn = self.connection()?;
        conn.query_row(
            &format!(
                "SELECT {ISO_COLUMNS} FROM iso_currencies WHERE country_code = ?1 AND currency_code = ?2"
            ),
            params![country_code, currency_code],
            iso_row,
        )
        .optional()
        .map_err(query_err)
    }

    fn set_currency_active(
        &self,
        country_code: &str,
        currency_code: &str,
        active: bool,
    ) -> Result<(), PapertraderError> {
        let conn = self.connection()?;
        let changed = conn
            .execute(
                "UPDATE iso_currencies SET active = ?3 WHERE country_code = ?1 AND currency_code = ?2",
                params![country_code, currency_code, active],
            )
            .map_err(query_err)?;
        if changed == 0 {
            return Err(PapertraderError::IsoRecordNotFound {
                country: country_code.to_string(),
                currency: currency_code.to_string(),
            });
        }
        Ok(())
    }

    fn active_currency(&self, currency_code: &str) -> Result<Option<IsoCurrency>, PapertraderError> {
        let conn = self.connection()?;
        conn.query_row(
            &format!(
                "SELECT {ISO_COLUMNS} FROM iso_currencies
                 WHERE currency_code = ?1 AND active = 1
                 ORDER BY country_code LIMIT 1"
            ),
            params![currency_code],
            iso_row,
        )
        .optional()
        .map_err(query_err)
    }

    fn currencies(&self, active_only: bool) -> Result<Vec<IsoCurrency>, PapertraderError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ISO_COLUMNS} FROM iso_currencies
                 WHERE active = 1 OR ?1 = 0
                 ORDER BY country_code, currency_code"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![active_only], iso_row)
            .map_err(query_err)?;
        collect_rows(rows)
    }
}
