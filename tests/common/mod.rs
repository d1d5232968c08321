#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Mutex;
use stockfolio::domain::error::FolioError;
use stockfolio::domain::portfolio::{
    Holding, Portfolio, PortfolioAccount, PortfolioId, UserId,
};
use stockfolio::domain::price::{ClosePoint, PricePoint};
use stockfolio::ports::portfolio_port::{AccountMutation, PortfolioPort};
use stockfolio::ports::price_port::PricePort;
use stockfolio::ports::registry_port::{Listing, StockRegistryPort};

#[derive(Default)]
struct MockState {
    companies: BTreeMap<String, String>,
    prices: BTreeMap<(String, NaiveDate), PricePoint>,
    portfolios: BTreeMap<PortfolioId, Portfolio>,
    holdings: BTreeMap<PortfolioId, BTreeMap<String, Decimal>>,
    next_id: PortfolioId,
}

/// In-memory store implementing every port, for tests that do not need SQL.
#[derive(Default)]
pub struct MockStore {
    state: Mutex<MockState>,
    pub fail_with: Option<String>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails with a database error.
    pub fn failing(reason: &str) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            fail_with: Some(reason.to_string()),
        }
    }

    pub fn with_listing(self, symbol: &str, company: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .companies
            .insert(symbol.to_string(), company.to_string());
        self
    }

    pub fn with_closes(self, symbol: &str, start: &str, closes: &[f64]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .companies
                .entry(symbol.to_string())
                .or_insert_with(|| format!("{symbol} Inc"));
            let start = date(start);
            for (i, close) in closes.iter().enumerate() {
                let point = make_price(symbol, start + chrono::Days::new(i as u64), Some(*close));
                state.prices.insert((symbol.to_string(), point.date), point);
            }
        }
        self
    }

    pub fn with_portfolio(self, user_id: UserId, name: &str, cash: Decimal) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let portfolio_id = state.next_id;
            state.portfolios.insert(
                portfolio_id,
                Portfolio {
                    portfolio_id,
                    user_id,
                    name: name.to_string(),
                    cash_balance: cash,
                },
            );
        }
        self
    }

    pub fn with_holding(self, portfolio_id: PortfolioId, symbol: &str, shares: Decimal) -> Self {
        self.state
            .lock()
            .unwrap()
            .holdings
            .entry(portfolio_id)
            .or_default()
            .insert(symbol.to_string(), shares);
        self
    }

    fn check(&self) -> Result<(), FolioError> {
        match &self.fail_with {
            Some(reason) => Err(FolioError::Database {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl PricePort for MockStore {
    fn latest_price(&self, symbol: &str) -> Result<Option<f64>, FolioError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .prices
            .values()
            .filter(|p| p.symbol == symbol)
            .filter_map(|p| p.close)
            .last())
    }

    fn history_ascending(
        &self,
        symbol: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, FolioError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .prices
            .values()
            .filter(|p| p.symbol == symbol && since.is_none_or(|s| p.date >= s))
            .cloned()
            .collect())
    }

    fn all_closes(&self) -> Result<Vec<ClosePoint>, FolioError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state.prices.values().filter_map(PricePoint::close_point).collect())
    }

    fn latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, FolioError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .prices
            .values()
            .filter(|p| p.symbol == symbol)
            .map(|p| p.date)
            .max())
    }
}

impl StockRegistryPort for MockStore {
    fn exists(&self, symbol: &str) -> Result<bool, FolioError> {
        self.check()?;
        Ok(self.state.lock().unwrap().companies.contains_key(symbol))
    }

    fn company_name(&self, symbol: &str) -> Result<Option<String>, FolioError> {
        self.check()?;
        Ok(self.state.lock().unwrap().companies.get(symbol).cloned())
    }

    fn symbol_for_company(&self, company_name: &str) -> Result<Option<String>, FolioError> {
        self.check()?;
        let wanted = company_name.to_lowercase();
        Ok(self
            .state
            .lock()
            .unwrap()
            .companies
            .iter()
            .find(|(_, name)| name.to_lowercase() == wanted)
            .map(|(symbol, _)| symbol.clone()))
    }

    fn list_symbols(&self) -> Result<Vec<String>, FolioError> {
        self.check()?;
        Ok(self.state.lock().unwrap().companies.keys().cloned().collect())
    }

    fn add_listing(
        &self,
        listing: &Listing,
        register: bool,
        price: &PricePoint,
    ) -> Result<(), FolioError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        let key = (price.symbol.clone(), price.date);
        if state.prices.contains_key(&key) {
            return Err(FolioError::DuplicatePrice {
                symbol: price.symbol.clone(),
                date: price.date.to_string(),
            });
        }
        if register {
            state
                .companies
                .insert(listing.symbol.clone(), listing.company_name.clone());
        }
        state.prices.insert(key, price.clone());
        Ok(())
    }

    fn add_price(&self, price: &PricePoint) -> Result<(), FolioError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        let key = (price.symbol.clone(), price.date);
        if state.prices.contains_key(&key) {
            return Err(FolioError::DuplicatePrice {
                symbol: price.symbol.clone(),
                date: price.date.to_string(),
            });
        }
        state.prices.insert(key, price.clone());
        Ok(())
    }
}

impl PortfolioPort for MockStore {
    fn create_portfolio(&self, user_id: UserId, name: &str) -> Result<PortfolioId, FolioError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let portfolio_id = state.next_id;
        state.portfolios.insert(
            portfolio_id,
            Portfolio {
                portfolio_id,
                user_id,
                name: name.to_string(),
                cash_balance: Decimal::ZERO,
            },
        );
        Ok(portfolio_id)
    }

    fn get_portfolio(&self, portfolio_id: PortfolioId) -> Result<Option<Portfolio>, FolioError> {
        self.check()?;
        Ok(self.state.lock().unwrap().portfolios.get(&portfolio_id).cloned())
    }

    fn list_portfolios(&self, user_id: UserId) -> Result<Vec<Portfolio>, FolioError> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .portfolios
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    fn holdings(&self, portfolio_id: PortfolioId) -> Result<Vec<Holding>, FolioError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .holdings
            .get(&portfolio_id)
            .map(|h| {
                h.iter()
                    .filter(|(_, shares)| **shares > Decimal::ZERO)
                    .map(|(symbol, shares)| Holding {
                        symbol: symbol.clone(),
                        num_shares: *shares,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn with_locked_portfolio(
        &self,
        portfolio_id: PortfolioId,
        mutation: &mut AccountMutation<'_>,
    ) -> Result<(), FolioError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        let portfolio = state
            .portfolios
            .get(&portfolio_id)
            .cloned()
            .ok_or(FolioError::PortfolioNotFound { portfolio_id })?;
        let holdings = state
            .holdings
            .get(&portfolio_id)
            .map(|h| {
                h.iter()
                    .map(|(symbol, shares)| Holding {
                        symbol: symbol.clone(),
                        num_shares: *shares,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let mut account = PortfolioAccount::new(portfolio, holdings);
        mutation(&mut account)?;
        state
            .portfolios
            .insert(portfolio_id, account.portfolio.clone());
        state.holdings.insert(portfolio_id, account.holdings);
        Ok(())
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_price(symbol: &str, date: NaiveDate, close: Option<f64>) -> PricePoint {
    let level = close.unwrap_or(10.0);
    PricePoint {
        symbol: symbol.to_string(),
        date,
        open: level,
        high: level + 1.0,
        low: level - 1.0,
        close,
        volume: 1_000,
    }
}

/// Seed consecutive daily closes through the listing path.
pub fn seed_closes(registry: &dyn StockRegistryPort, symbol: &str, start: &str, closes: &[f64]) {
    let start = date(start);
    for (i, close) in closes.iter().enumerate() {
        let point = make_price(symbol, start + chrono::Days::new(i as u64), Some(*close));
        let registered = registry.exists(symbol).unwrap();
        let listing = Listing {
            symbol: symbol.to_string(),
            company_name: format!("{symbol} Inc"),
        };
        registry.add_listing(&listing, !registered, &point).unwrap();
    }
}

#[cfg(feature = "sqlite")]
pub fn sqlite_store() -> stockfolio::adapters::sqlite_adapter::SqliteAdapter {
    let store = stockfolio::adapters::sqlite_adapter::SqliteAdapter::in_memory().unwrap();
    store.initialize_schema().unwrap();
    store
}
