//! Domain error types.

use rust_decimal::Decimal;

/// Broad classification of a [`PapertraderError`].
///
/// Callers branch on the class rather than on individual variants: a
/// `Validation` failure means the request was malformed, `NotFound` means a
/// referenced thing does not exist, `Conflict` is a business-rule rejection,
/// and `Dependency` is a store or quote-provider outage that may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    NotFound,
    Conflict,
    Dependency,
    Config,
    Io,
}

/// Top-level error type for papertrader.
#[derive(Debug, thiserror::Error)]
pub enum PapertraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("quote unavailable for {symbol}: {reason}")]
    QuoteUnavailable { symbol: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("trading symbol {symbol} not found")]
    SymbolNotFound { symbol: String },

    #[error("trading symbol {symbol} is an index rather than an equity")]
    NotTradeable { symbol: String },

    #[error("currency {currency} not found")]
    CurrencyNotFound { currency: String },

    #[error("ISO record {country}/{currency} not found")]
    IsoRecordNotFound { country: String, currency: String },

    #[error("account balance for {trader} in {currency} not found")]
    BalanceNotFound { trader: String, currency: String },

    #[error("portfolio {id} not found")]
    PortfolioNotFound { id: i64 },

    #[error("trading transaction {id} not found")]
    TransactionNotFound { id: i64 },

    #[error("bank account {id} not found")]
    BankAccountNotFound { id: i64 },

    #[error("insufficient funds in {currency}: required {required}, available {available}")]
    InsufficientFunds {
        currency: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient holdings of {symbol}: requested {requested}, outstanding {outstanding}")]
    InsufficientHoldings {
        symbol: String,
        requested: u64,
        outstanding: u64,
    },

    #[error("trading transaction {transaction_id} is in {actual}, portfolio currency is {expected}")]
    CurrencyMismatch {
        transaction_id: i64,
        expected: String,
        actual: String,
    },

    #[error("trading transaction {transaction_id} is already linked to portfolio {portfolio_id}")]
    AlreadyLinked {
        transaction_id: i64,
        portfolio_id: i64,
    },

    #[error("trading transaction {transaction_id} is not linked to portfolio {portfolio_id}")]
    NotInPortfolio {
        transaction_id: i64,
        portfolio_id: i64,
    },

    #[error("{resource} does not belong to {trader}")]
    NotOwner { resource: String, trader: String },

    #[error("selling {symbol} refused by {policy} policy")]
    SellRefused { symbol: String, policy: String },

    #[error("new balance would reach the {currency} {limit} ceiling")]
    CeilingExceeded { currency: String, limit: Decimal },

    #[error("bank account {id} cannot receive funds: {reason}")]
    BankAccountUnusable { id: i64, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PapertraderError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        PapertraderError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            PapertraderError::Database { .. }
            | PapertraderError::DatabaseQuery { .. }
            | PapertraderError::QuoteUnavailable { .. } => ErrorClass::Dependency,
            PapertraderError::ConfigParse { .. }
            | PapertraderError::ConfigMissing { .. }
            | PapertraderError::ConfigInvalid { .. } => ErrorClass::Config,
            PapertraderError::Validation { .. } => ErrorClass::Validation,
            PapertraderError::SymbolNotFound { .. }
            | PapertraderError::NotTradeable { .. }
            | PapertraderError::CurrencyNotFound { .. }
            | PapertraderError::IsoRecordNotFound { .. }
            | PapertraderError::BalanceNotFound { .. }
            | PapertraderError::PortfolioNotFound { .. }
            | PapertraderError::TransactionNotFound { .. }
            | PapertraderError::BankAccountNotFound { .. } => ErrorClass::NotFound,
            PapertraderError::InsufficientFunds { .. }
            | PapertraderError::InsufficientHoldings { .. }
            | PapertraderError::CurrencyMismatch { .. }
            | PapertraderError::AlreadyLinked { .. }
            | PapertraderError::NotInPortfolio { .. }
            | PapertraderError::NotOwner { .. }
            | PapertraderError::SellRefused { .. }
            | PapertraderError::CeilingExceeded { .. }
            | PapertraderError::BankAccountUnusable { .. } => ErrorClass::Conflict,
            PapertraderError::Io(_) => ErrorClass::Io,
        }
    }

    /// Store and quote-provider failures may succeed on a later attempt;
    /// every other class is final for the given input.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Dependency
    }
}

impl From<&PapertraderError> for std::process::ExitCode {
    fn from(err: &PapertraderError) -> Self {
        let code: u8 = match err.class() {
            ErrorClass::Io => 1,
            ErrorClass::Config => 2,
            ErrorClass::Dependency => 3,
            ErrorClass::Validation => 4,
            ErrorClass::NotFound => 5,
            ErrorClass::Conflict => 6,
        };
        std::process::ExitCode::from(code)
    }
}
