//! Closing-price history over a named interval.
//!
//! The window is anchored on the symbol's latest recorded date rather than
//! on the wall clock, so a static dataset keeps returning data.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::error::FolioError;
use super::money::Symbol;
use crate::ports::price_port::PricePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    OneWeek,
    OneMonth,
    ThreeMonths,
    OneYear,
    FiveYears,
}

impl Interval {
    pub fn days(self) -> u64 {
        match self {
            Interval::OneWeek => 7,
            Interval::OneMonth => 30,
            Interval::ThreeMonths => 90,
            Interval::OneYear => 365,
            Interval::FiveYears => 1825,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneWeek => "1week",
            Interval::OneMonth => "1month",
            Interval::ThreeMonths => "3months",
            Interval::OneYear => "1year",
            Interval::FiveYears => "5years",
        }
    }
}

impl FromStr for Interval {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1week" => Ok(Interval::OneWeek),
            "1month" => Ok(Interval::OneMonth),
            "3months" => Ok(Interval::ThreeMonths),
            "1year" => Ok(Interval::OneYear),
            "5years" => Ok(Interval::FiveYears),
            other => Err(FolioError::validation(
                "interval",
                format!("unknown interval '{other}', expected one of 1week, 1month, 3months, 1year, 5years"),
            )),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Interval {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub close: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistory {
    pub symbol: String,
    pub interval: Interval,
    pub as_of: NaiveDate,
    pub data: Vec<HistoryRow>,
}

/// First date included in a window of `interval` ending at `as_of`.
pub fn window_start(as_of: NaiveDate, interval: Interval) -> NaiveDate {
    as_of
        .checked_sub_days(Days::new(interval.days()))
        .unwrap_or(NaiveDate::MIN)
}

pub fn price_history(
    prices: &dyn PricePort,
    symbol: &Symbol,
    interval: Interval,
) -> Result<PriceHistory, FolioError> {
    let as_of = prices
        .latest_date(symbol.as_str())?
        .ok_or_else(|| FolioError::NoPriceData {
            symbol: symbol.to_string(),
        })?;
    let since = window_start(as_of, interval);
    let data = prices
        .history_ascending(symbol.as_str(), Some(since))?
        .into_iter()
        .map(|p| HistoryRow {
            date: p.date,
            close: p.close,
        })
        .collect();
    Ok(PriceHistory {
        symbol: symbol.to_string(),
        interval,
        as_of,
        data,
    })
}
