//! Read-only access to historical price rows.

use crate::domain::error::FolioError;
use crate::domain::price::{ClosePoint, PricePoint};
use chrono::NaiveDate;

pub trait PricePort {
    /// Close of the most recent row with a non-null close.
    fn latest_price(&self, symbol: &str) -> Result<Option<f64>, FolioError>;

    /// All rows for `symbol` on or after `since` (all rows when `None`),
    /// ascending by date.
    fn history_ascending(
        &self,
        symbol: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, FolioError>;

    /// Every non-null close in the price table, used to build the market index.
    fn all_closes(&self) -> Result<Vec<ClosePoint>, FolioError>;

    /// Most recent date with any row for `symbol`.
    fn latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, FolioError>;
}
