//! Presentation-safe numeric results.
//!
//! Analytics never hand a raw `f64` to the output layer. A value that cannot
//! be computed is carried as [`Statistic::Undefined`] and serializes as
//! `null`; defined values serialize as strings with four decimals.

use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndefinedReason {
    ZeroMean,
    ZeroMarketVariance,
    NonFinite,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UndefinedReason::ZeroMean => "mean is zero",
            UndefinedReason::ZeroMarketVariance => "market variance is zero",
            UndefinedReason::NonFinite => "result is not finite",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Value(f64),
    Undefined(UndefinedReason),
}

impl Statistic {
    /// Wraps `value`, demoting NaN and infinities to `Undefined`.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Statistic::Value(value)
        } else {
            Statistic::Undefined(UndefinedReason::NonFinite)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Statistic::Value(v) => Some(*v),
            Statistic::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Statistic::Value(_))
    }
}

pub fn format_4dp(value: f64) -> String {
    let text = format!("{value:.4}");
    if text == "-0.0000" {
        "0.0000".to_string()
    } else {
        text
    }
}

impl Serialize for Statistic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Statistic::Value(v) => serializer.serialize_str(&format_4dp(*v)),
            Statistic::Undefined(_) => serializer.serialize_none(),
        }
    }
}

/// One cell of the price-level correlation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrelationCell {
    Value(f64),
    NotEnoughData,
}

pub const NOT_ENOUGH_DATA: &str = "Not Enough Data";

impl fmt::Display for CorrelationCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationCell::Value(v) => f.write_str(&format_4dp(*v)),
            CorrelationCell::NotEnoughData => f.write_str(NOT_ENOUGH_DATA),
        }
    }
}

impl Serialize for CorrelationCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
