//! Domain error types.

use rust_decimal::Decimal;

/// Coarse classification of a [`FolioError`], used by the adapters to pick an
/// HTTP status or process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Conflict,
    InsufficientData,
    Infrastructure,
}

/// Top-level error type for stockfolio.
#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    #[error("invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("invalid share count: {reason}")]
    InvalidShareCount { reason: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing or malformed caller identity")]
    MissingIdentity,

    #[error("portfolio {portfolio_id} does not belong to user {user_id}")]
    Unauthorized { user_id: i64, portfolio_id: i64 },

    #[error("portfolio {portfolio_id} not found")]
    PortfolioNotFound { portfolio_id: i64 },

    #[error("stock symbol {symbol} not found")]
    UnknownSymbol { symbol: String },

    #[error("no price data for {symbol}")]
    NoPriceData { symbol: String },

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient shares of {symbol}: requested {requested}, held {held}")]
    InsufficientShares {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },

    #[error("insufficient history for {symbol}: have {points} prices, need {minimum}")]
    InsufficientHistory {
        symbol: String,
        points: usize,
        minimum: usize,
    },

    #[error("duplicate price entry for {symbol} on {date}")]
    DuplicatePrice { symbol: String, date: String },

    #[error("listing conflict: {reason}")]
    ListingConflict { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FolioError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FolioError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FolioError::InvalidAmount { .. }
            | FolioError::InvalidShareCount { .. }
            | FolioError::Validation { .. } => ErrorKind::Validation,
            FolioError::MissingIdentity | FolioError::Unauthorized { .. } => {
                ErrorKind::Authorization
            }
            FolioError::PortfolioNotFound { .. }
            | FolioError::UnknownSymbol { .. }
            | FolioError::NoPriceData { .. } => ErrorKind::NotFound,
            FolioError::InsufficientFunds { .. }
            | FolioError::InsufficientShares { .. }
            | FolioError::DuplicatePrice { .. }
            | FolioError::ListingConflict { .. } => ErrorKind::Conflict,
            FolioError::InsufficientHistory { .. } => ErrorKind::InsufficientData,
            FolioError::Database { .. }
            | FolioError::DatabaseQuery { .. }
            | FolioError::ConfigParse { .. }
            | FolioError::ConfigMissing { .. }
            | FolioError::ConfigInvalid { .. }
            | FolioError::Io(_) => ErrorKind::Infrastructure,
        }
    }
}

impl From<&FolioError> for std::process::ExitCode {
    fn from(err: &FolioError) -> Self {
        let code: u8 = match err {
            FolioError::Io(_) => 1,
            FolioError::ConfigParse { .. }
            | FolioError::ConfigMissing { .. }
            | FolioError::ConfigInvalid { .. } => 2,
            FolioError::Database { .. } | FolioError::DatabaseQuery { .. } => 3,
            _ => match err.kind() {
                ErrorKind::Validation => 4,
                ErrorKind::NotFound | ErrorKind::InsufficientData => 5,
                ErrorKind::Authorization => 6,
                ErrorKind::Conflict => 7,
                ErrorKind::Infrastructure => 1,
            },
        };
        std::process::ExitCode::from(code)
    }
}
