//! Daily price row representation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One OHLCV row for a symbol. At most one exists per `(symbol, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    /// Missing in some imported rows; such rows never contribute to analytics.
    pub close: Option<f64>,
    pub volume: i64,
}

/// A `(date, close)` pair with the close known to be present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClosePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn close_point(&self) -> Option<ClosePoint> {
        self.close.map(|close| ClosePoint {
            date: self.date,
            close,
        })
    }
}

/// Keep only rows with a close, preserving order.
pub fn known_closes(points: &[PricePoint]) -> Vec<ClosePoint> {
    points.iter().filter_map(PricePoint::close_point).collect()
}
