//! Entry of new listings and price rows.

use chrono::NaiveDate;
use serde::Deserialize;

use super::error::FolioError;
use super::money::Symbol;
use super::price::PricePoint;
use crate::ports::registry_port::{Listing, StockRegistryPort};

/// Raw price row as submitted. Every field is required.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PriceEntry {
    pub symbol: Option<String>,
    pub date: Option<String>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

/// Raw listing: a company plus its first price row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListingEntry {
    pub symbol: Option<String>,
    pub company_name: Option<String>,
    pub date: Option<String>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

impl ListingEntry {
    fn price_entry(&self) -> PriceEntry {
        PriceEntry {
            symbol: self.symbol.clone(),
            date: self.date.clone(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

fn required<T: Copy>(value: Option<T>, field: &str) -> Result<T, FolioError> {
    value.ok_or_else(|| FolioError::validation(field, format!("{field} is required")))
}

fn positive_price(value: Option<f64>, field: &str) -> Result<f64, FolioError> {
    let price = required(value, field)?;
    if !price.is_finite() || price <= 0.0 {
        return Err(FolioError::validation(
            field,
            format!("{field} must be a positive number"),
        ));
    }
    Ok(price)
}

impl PriceEntry {
    pub fn validate(&self) -> Result<PricePoint, FolioError> {
        let symbol = Symbol::parse(self.symbol.as_deref().unwrap_or(""))?;
        let raw_date = self.date.as_deref().map(str::trim).unwrap_or("");
        if raw_date.is_empty() {
            return Err(FolioError::validation("date", "date is required"));
        }
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            FolioError::validation("date", format!("invalid date '{raw_date}', expected YYYY-MM-DD"))
        })?;
        let open = positive_price(self.open, "open")?;
        let high = positive_price(self.high, "high")?;
        let low = positive_price(self.low, "low")?;
        let close = positive_price(self.close, "close")?;
        if low > high {
            return Err(FolioError::validation("low", "low must not exceed high"));
        }
        let volume = required(self.volume, "volume")?;
        if volume < 0 {
            return Err(FolioError::validation("volume", "volume must not be negative"));
        }
        Ok(PricePoint {
            symbol: symbol.as_str().to_string(),
            date,
            open,
            high,
            low,
            close: Some(close),
            volume,
        })
    }
}

/// Record a price row for an already registered symbol.
pub fn add_price(
    registry: &dyn StockRegistryPort,
    entry: &PriceEntry,
) -> Result<PricePoint, FolioError> {
    let point = entry.validate()?;
    if !registry.exists(&point.symbol)? {
        return Err(FolioError::UnknownSymbol {
            symbol: point.symbol,
        });
    }
    registry.add_price(&point)?;
    tracing::info!(symbol = %point.symbol, date = %point.date, "price row added");
    Ok(point)
}

/// Register a company (if new) together with a price row.
///
/// A company name already held by another symbol, or a symbol already held
/// by another company, is a conflict. Names compare case-insensitively.
pub fn add_listing(
    registry: &dyn StockRegistryPort,
    entry: &ListingEntry,
) -> Result<PricePoint, FolioError> {
    let point = entry.price_entry().validate()?;
    let company_name = entry
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| FolioError::validation("company_name", "company_name is required"))?;

    if let Some(existing) = registry.symbol_for_company(company_name)? {
        if existing != point.symbol {
            return Err(FolioError::ListingConflict {
                reason: format!(
                    "company '{company_name}' is already registered under the symbol '{existing}'"
                ),
            });
        }
    }

    let registered = registry.company_name(&point.symbol)?;
    if let Some(existing) = &registered {
        if existing.to_lowercase() != company_name.to_lowercase() {
            return Err(FolioError::ListingConflict {
                reason: format!(
                    "symbol '{}' is already registered to '{existing}', not '{company_name}'",
                    point.symbol
                ),
            });
        }
    }

    let listing = Listing {
        symbol: point.symbol.clone(),
        company_name: company_name.to_string(),
    };
    registry.add_listing(&listing, registered.is_none(), &point)?;
    tracing::info!(
        symbol = %point.symbol,
        company = company_name,
        new_listing = registered.is_none(),
        "listing price added"
    );
    Ok(point)
}
