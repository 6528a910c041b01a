//! CSV quote snapshot adapter.
//!
//! The snapshot is a headed CSV file with columns
//! `symbol,name,price,currency,is_index`. It is re-read on every call so an
//! external process can refresh it between commands.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::error::PapertraderError;
use crate::domain::quote::Quote;
use crate::ports::quote_port::QuotePort;

pub struct CsvQuoteAdapter {
    path: PathBuf,
}

impl CsvQuoteAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self, context: &str) -> Result<Vec<Quote>, PapertraderError> {
        let unavailable = |reason: String| PapertraderError::QuoteUnavailable {
            symbol: context.to_string(),
            reason,
        };

        let content = fs::read_to_string(&self.path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", self.path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut quotes = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| unavailable(format!("CSV parse error: {}", e)))?;

            let column = |idx: usize, name: &str| {
                record
                    .get(idx)
                    .map(str::trim)
                    .ok_or_else(|| unavailable(format!("missing {} column", name)))
            };

            let price_str = column(2, "price")?;
            let price = Decimal::from_str(price_str)
                .map_err(|e| unavailable(format!("invalid price {:?}: {}", price_str, e)))?;
            if price.is_sign_negative() {
                return Err(unavailable(format!("negative price {}", price)));
            }

            let is_index = match column(4, "is_index")?.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => true,
                "false" | "no" | "0" | "" => false,
                other => return Err(unavailable(format!("invalid is_index value {:?}", other))),
            };

            quotes.push(Quote {
                symbol: column(0, "symbol")?.to_string(),
                name: column(1, "name")?.to_string(),
                price,
                currency: column(3, "currency")?.to_ascii_uppercase(),
                is_index,
            });
        }

        Ok(quotes)
    }
}

impl QuotePort for CsvQuoteAdapter {
    fn lookup_quote(&self, symbol: &str) -> Result<Option<Quote>, PapertraderError> {
        Ok(self
            .load(symbol)?
            .into_iter()
            .find(|q| q.matches_symbol(symbol)))
    }

    fn search(&self, term: &str) -> Result<Vec<Quote>, PapertraderError> {
        let mut found: Vec<Quote> = self
            .load(term)?
            .into_iter()
            .filter(|q| q.matches_term(term))
            .collect();
        found.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn snapshot(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const QUOTES: &str = "symbol,name,price,currency,is_index
XYZ,XYZ Holdings,10.00,usd,false
0005.HK,HSBC Holdings plc,62.35,HKD,false
^HSI,Hang Seng Index,17500.12,HKD,true
";

    #[test]
    fn lookup_finds_symbol_case_insensitively() {
        let file = snapshot(QUOTES);
        let adapter = CsvQuoteAdapter::new(file.path().to_path_buf());

        let quote = adapter.lookup_quote("xyz").unwrap().unwrap();
        assert_eq!(quote.symbol, "XYZ");
        assert_eq!(quote.price, dec!(10.00));
        assert_eq!(quote.currency, "USD");
        assert!(!quote.is_index);

        assert!(adapter.lookup_quote("^HSI").unwrap().unwrap().is_index);
        assert!(adapter.lookup_quote("NOPE").unwrap().is_none());
    }

    #[test]
    fn search_matches_name_and_sorts() {
        let file = snapshot(QUOTES);
        let adapter = CsvQuoteAdapter::new(file.path().to_path_buf());

        let found = adapter.search("holdings").unwrap();
        let symbols: Vec<&str> = found.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["0005.HK", "XYZ"]);
        assert!(adapter.search("").unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let adapter = CsvQuoteAdapter::new(PathBuf::from("/nonexistent/quotes.csv"));
        let err = adapter.lookup_quote("XYZ").unwrap_err();
        assert!(matches!(err, PapertraderError::QuoteUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn bad_price_is_unavailable() {
        let file = snapshot("symbol,name,price,currency,is_index\nXYZ,XYZ,ten,USD,false\n");
        let adapter = CsvQuoteAdapter::new(file.path().to_path_buf());
        let err = adapter.lookup_quote("XYZ").unwrap_err();
        assert!(matches!(err, PapertraderError::QuoteUnavailable { .. }));
    }
}
