//! Log-return series and the synthetic market index.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::price::ClosePoint;

/// `ln(close[date] / close[prev_date])` for one adjacent pair of closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnPoint {
    pub prev_date: NaiveDate,
    pub date: NaiveDate,
    pub log_return: f64,
}

/// Cross-sectional mean close per date.
pub type MarketIndex = BTreeMap<NaiveDate, f64>;

/// `ln(curr / prev)` for each adjacent pair of closes, dated at `curr`.
///
/// Input must be ascending by date and already stripped of missing closes.
/// Pairs with a non-positive close produce no point.
pub fn compute_returns(closes: &[ClosePoint]) -> Vec<ReturnPoint> {
    closes
        .windows(2)
        .filter_map(|pair| {
            let (prev, curr) = (pair[0], pair[1]);
            log_return(prev.close, curr.close).map(|log_return| ReturnPoint {
                prev_date: prev.date,
                date: curr.date,
                log_return,
            })
        })
        .collect()
}

/// Mean of all closes on each date present in `closes`.
pub fn compute_market_index(closes: &[ClosePoint]) -> MarketIndex {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for point in closes {
        let entry = sums.entry(point.date).or_insert((0.0, 0));
        entry.0 += point.close;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(date, (sum, count))| (date, sum / count as f64))
        .collect()
}

fn log_return(prev: f64, curr: f64) -> Option<f64> {
    if prev > 0.0 && curr > 0.0 {
        Some((curr / prev).ln())
    } else {
        None
    }
}
