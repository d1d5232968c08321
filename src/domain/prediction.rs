//! Linear-regression price projection.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use super::error::FolioError;
use super::money::Symbol;
use super::price::{known_closes, ClosePoint};
use crate::ports::price_port::PricePort;

pub const MIN_POINTS: usize = 2;
pub const DEFAULT_HORIZON_DAYS: u32 = 30;
pub const MAX_HORIZON_DAYS: u32 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectedClose {
    pub date: NaiveDate,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub symbol: String,
    pub predicted: Vec<ProjectedClose>,
}

/// Fitted `close = intercept + slope * x`, with `x` in days since the first close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

/// Limits for the horizon parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizonLimits {
    pub default_days: u32,
    pub max_days: u32,
}

impl Default for HorizonLimits {
    fn default() -> Self {
        Self {
            default_days: DEFAULT_HORIZON_DAYS,
            max_days: MAX_HORIZON_DAYS,
        }
    }
}

impl HorizonLimits {
    /// Parse an optional raw `days` value. Blank or absent uses the default.
    pub fn parse(&self, raw: Option<&str>) -> Result<u32, FolioError> {
        let days = match raw.map(str::trim) {
            None | Some("") => self.default_days,
            Some(text) => text
                .parse::<u32>()
                .map_err(|_| FolioError::validation("days", "days must be a positive integer"))?,
        };
        if days == 0 || days > self.max_days {
            return Err(FolioError::validation(
                "days",
                format!("days must be between 1 and {}", self.max_days),
            ));
        }
        Ok(days)
    }
}

fn offset_days(first: NaiveDate, date: NaiveDate) -> f64 {
    (date - first).num_days() as f64
}

/// Ordinary least squares over `(day offset, close)`.
///
/// Returns `None` when every point shares the same offset.
pub fn fit(closes: &[ClosePoint]) -> Option<LinearFit> {
    let first = closes.first()?.date;
    let n = closes.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0);
    for point in closes {
        let x = offset_days(first, point.date);
        sx += x;
        sy += point.close;
        sxy += x * point.close;
        sxx += x * x;
    }
    let denominator = n * sxx - sx * sx;
    if denominator == 0.0 {
        return None;
    }
    let slope = (n * sxy - sx * sy) / denominator;
    let intercept = (sy - slope * sx) / n;
    if !slope.is_finite() || !intercept.is_finite() {
        return None;
    }
    Some(LinearFit { slope, intercept })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Project `days` closes past the last known one.
///
/// A degenerate fit projects the last close unchanged.
pub fn project(
    symbol: &str,
    closes: &[ClosePoint],
    days: u32,
) -> Result<Vec<ProjectedClose>, FolioError> {
    let (Some(first), Some(last)) = (closes.first(), closes.last()) else {
        return Err(insufficient(symbol, closes.len()));
    };
    if closes.len() < MIN_POINTS {
        return Err(insufficient(symbol, closes.len()));
    }

    let fitted = fit(closes);
    if fitted.is_none() {
        tracing::debug!(symbol, "degenerate regression, projecting flat");
    }
    let last_x = (last.date - first.date).num_days();

    let mut projected = Vec::with_capacity(days as usize);
    for i in 1..=i64::from(days) {
        let future_x = last_x + i;
        let close = match fitted {
            Some(line) => line.intercept + line.slope * future_x as f64,
            None => last.close,
        };
        let date = first
            .date
            .checked_add_days(Days::new(future_x as u64))
            .ok_or_else(|| FolioError::validation("days", "projection runs past the calendar"))?;
        projected.push(ProjectedClose {
            date,
            close: round2(close),
        });
    }
    Ok(projected)
}

fn insufficient(symbol: &str, points: usize) -> FolioError {
    FolioError::InsufficientHistory {
        symbol: symbol.to_string(),
        points,
        minimum: MIN_POINTS,
    }
}

pub fn predict(prices: &dyn PricePort, symbol: &Symbol, days: u32) -> Result<Prediction, FolioError> {
    let rows = prices.history_ascending(symbol.as_str(), None)?;
    let closes = known_closes(&rows);
    let predicted = project(symbol.as_str(), &closes, days)?;
    Ok(Prediction {
        symbol: symbol.to_string(),
        predicted,
    })
}
