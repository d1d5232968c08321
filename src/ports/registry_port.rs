//! Stock registry port trait.

use crate::domain::error::FolioError;
use crate::domain::price::PricePoint;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Listing {
    pub symbol: String,
    pub company_name: String,
}

pub trait StockRegistryPort {
    fn exists(&self, symbol: &str) -> Result<bool, FolioError>;

    fn company_name(&self, symbol: &str) -> Result<Option<String>, FolioError>;

    /// Symbol registered under `company_name`, compared case-insensitively.
    fn symbol_for_company(&self, company_name: &str) -> Result<Option<String>, FolioError>;

    fn list_symbols(&self) -> Result<Vec<String>, FolioError>;

    /// Insert the stock row when `register` is set, then the price row, in one
    /// transaction. Fails with `DuplicatePrice` if `(symbol, date)` exists.
    fn add_listing(
        &self,
        listing: &Listing,
        register: bool,
        price: &PricePoint,
    ) -> Result<(), FolioError>;

    /// Insert one price row for an already registered symbol.
    fn add_price(&self, price: &PricePoint) -> Result<(), FolioError>;
}
