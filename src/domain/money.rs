//! Validated input values for ledger operations.
//!
//! The web and CLI adapters parse raw input into these types; ledger
//! operations accept nothing else.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;

use super::error::FolioError;

/// Round a monetary value to cents, half away from zero.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a stored float price into a decimal for ledger arithmetic.
pub fn price_to_decimal(symbol: &str, price: f64) -> Result<Decimal, FolioError> {
    match Decimal::from_f64(price) {
        Some(d) if d > Decimal::ZERO => Ok(d),
        _ => Err(FolioError::NoPriceData {
            symbol: symbol.to_string(),
        }),
    }
}

/// A strictly positive cash amount in whole cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositiveAmount(Decimal);

impl PositiveAmount {
    pub fn new(amount: Decimal) -> Result<Self, FolioError> {
        if amount <= Decimal::ZERO {
            return Err(FolioError::InvalidAmount {
                reason: "amount must be greater than 0".into(),
            });
        }
        if amount.normalize().scale() > 2 {
            return Err(FolioError::InvalidAmount {
                reason: format!("amount {amount} has more than 2 decimal places"),
            });
        }
        Ok(Self(amount))
    }

    /// Accepts a float from loosely typed input; NaN and infinities are rejected.
    pub fn from_f64(amount: f64) -> Result<Self, FolioError> {
        if !amount.is_finite() {
            return Err(FolioError::InvalidAmount {
                reason: "amount must be a finite number".into(),
            });
        }
        let decimal = Decimal::from_f64(amount).ok_or_else(|| FolioError::InvalidAmount {
            reason: format!("amount {amount} is out of range"),
        })?;
        Self::new(decimal)
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for PositiveAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A strictly positive number of shares. Fractional shares are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShareCount(Decimal);

impl ShareCount {
    pub fn new(shares: Decimal) -> Result<Self, FolioError> {
        if shares <= Decimal::ZERO {
            return Err(FolioError::InvalidShareCount {
                reason: "number of shares must be greater than 0".into(),
            });
        }
        Ok(Self(shares))
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for ShareCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// A registered ticker symbol, trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(raw: &str) -> Result<Self, FolioError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FolioError::validation("symbol", "symbol is required"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(FolioError::validation(
                "symbol",
                "symbol must not contain whitespace",
            ));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
