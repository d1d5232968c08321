//! PostgreSQL storage adapter.
//!
//! Portfolio mutations lock the portfolio row with `SELECT ... FOR UPDATE`,
//! so writers to different portfolios do not block each other.

use crate::domain::error::FolioError;
use crate::domain::portfolio::{
    holding_changes, Holding, HoldingChange, Portfolio, PortfolioAccount, PortfolioId, UserId,
};
use crate::domain::price::{ClosePoint, PricePoint};
use crate::ports::config_port::ConfigPort;
use crate::ports::portfolio_port::{AccountMutation, PortfolioPort};
use crate::ports::price_port::PricePort;
use crate::ports::registry_port::{Listing, StockRegistryPort};
use chrono::NaiveDate;
use postgres::error::SqlState;
use postgres::{GenericClient, NoTls, Row};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use rust_decimal::Decimal;

type Manager = PostgresConnectionManager<NoTls>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS stock (
    symbol TEXT PRIMARY KEY,
    company_name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS stock_price (
    symbol TEXT NOT NULL REFERENCES stock(symbol),
    date DATE NOT NULL,
    open DOUBLE PRECISION NOT NULL,
    high DOUBLE PRECISION NOT NULL,
    low DOUBLE PRECISION NOT NULL,
    close DOUBLE PRECISION,
    volume BIGINT NOT NULL,
    PRIMARY KEY (symbol, date)
);
CREATE INDEX IF NOT EXISTS idx_stock_price_date ON stock_price(date);
CREATE TABLE IF NOT EXISTS portfolio (
    portfolio_id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    name TEXT NOT NULL,
    cash_balance NUMERIC(18, 2) NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_portfolio_user ON portfolio(user_id);
CREATE TABLE IF NOT EXISTS portfolio_holding (
    portfolio_id BIGINT NOT NULL REFERENCES portfolio(portfolio_id),
    symbol TEXT NOT NULL,
    num_shares NUMERIC NOT NULL,
    PRIMARY KEY (portfolio_id, symbol)
);";

pub struct PostgresAdapter {
    pool: Pool<Manager>,
}

fn pool_err(e: r2d2::Error) -> FolioError {
    FolioError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: postgres::Error) -> FolioError {
    FolioError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn violates(e: &postgres::Error, state: &SqlState) -> bool {
    e.code() == Some(state)
}

fn portfolio_from_row(row: &Row) -> Portfolio {
    Portfolio {
        portfolio_id: row.get(0),
        user_id: row.get(1),
        name: row.get(2),
        cash_balance: row.get(3),
    }
}

fn load_holdings(
    client: &mut impl GenericClient,
    portfolio_id: PortfolioId,
) -> Result<Vec<Holding>, FolioError> {
    let rows = client
        .query(
            "SELECT symbol, num_shares FROM portfolio_holding
             WHERE portfolio_id = $1 AND num_shares > 0 ORDER BY symbol",
            &[&portfolio_id],
        )
        .map_err(query_err)?;
    Ok(rows
        .iter()
        .map(|row| Holding {
            symbol: row.get(0),
            num_shares: row.get(1),
        })
        .collect())
}

fn insert_price(client: &mut impl GenericClient, price: &PricePoint) -> Result<(), FolioError> {
    client
        .execute(
            "INSERT INTO stock_price (symbol, date, open, high, low, close, volume)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &price.symbol,
                &price.date,
                &price.open,
                &price.high,
                &price.low,
                &price.close,
                &price.volume,
            ],
        )
        .map_err(|e| {
            if violates(&e, &SqlState::UNIQUE_VIOLATION) {
                FolioError::DuplicatePrice {
                    symbol: price.symbol.clone(),
                    date: price.date.to_string(),
                }
            } else if violates(&e, &SqlState::FOREIGN_KEY_VIOLATION) {
                FolioError::UnknownSymbol {
                    symbol: price.symbol.clone(),
                }
            } else {
                query_err(e)
            }
        })?;
    Ok(())
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FolioError> {
        let connection_string = config
            .get_string("postgres", "connection_string")
            .ok_or_else(|| FolioError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            })?;

        let pg_config = connection_string
            .parse::<postgres::Config>()
            .map_err(|e| FolioError::ConfigInvalid {
                section: "postgres".into(),
                key: "connection_string".into(),
                reason: e.to_string(),
            })?;
        let pool_size = config.get_int("postgres", "pool_size", 4) as u32;

        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        tracing::debug!(pool_size, "opened postgres pool");
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<Manager>, FolioError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), FolioError> {
        self.conn()?.batch_execute(SCHEMA).map_err(query_err)
    }
}

impl PricePort for PostgresAdapter {
    fn latest_price(&self, symbol: &str) -> Result<Option<f64>, FolioError> {
        let row = self
            .conn()?
            .query_opt(
                "SELECT close FROM stock_price
                 WHERE symbol = $1 AND close IS NOT NULL
                 ORDER BY date DESC LIMIT 1",
                &[&symbol],
            )
            .map_err(query_err)?;
        Ok(row.map(|r| r.get(0)))
    }

    fn history_ascending(
        &self,
        symbol: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, FolioError> {
        let rows = self
            .conn()?
            .query(
                "SELECT symbol, date, open, high, low, close, volume
                 FROM stock_price
                 WHERE symbol = $1 AND ($2::date IS NULL OR date >= $2)
                 ORDER BY date ASC",
                &[&symbol, &since],
            )
            .map_err(query_err)?;

        Ok(rows
            .iter()
            .map(|row| PricePoint {
                symbol: row.get(0),
                date: row.get(1),
                open: row.get(2),
                high: row.get(3),
                low: row.get(4),
                close: row.get(5),
                volume: row.get(6),
            })
            .collect())
    }

    fn all_closes(&self) -> Result<Vec<ClosePoint>, FolioError> {
        let rows = self
            .conn()?
            .query(
                "SELECT date, close FROM stock_price WHERE close IS NOT NULL",
                &[],
            )
            .map_err(query_err)?;
        Ok(rows
            .iter()
            .map(|row| ClosePoint {
                date: row.get(0),
                close: row.get(1),
            })
            .collect())
    }

    fn latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, FolioError> {
        let row = self
            .conn()?
            .query_one(
                "SELECT MAX(date) FROM stock_price WHERE symbol = $1",
                &[&symbol],
            )
            .map_err(query_err)?;
        Ok(row.get(0))
    }
}

impl StockRegistryPort for PostgresAdapter {
    fn exists(&self, symbol: &str) -> Result<bool, FolioError> {
        let row = self
            .conn()?
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM stock WHERE symbol = $1)",
                &[&symbol],
            )
            .map_err(query_err)?;
        Ok(row.get(0))
    }

    fn company_name(&self, symbol: &str) -> Result<Option<String>, FolioError> {
        let row = self
            .conn()?
            .query_opt(
                "SELECT company_name FROM stock WHERE symbol = $1",
                &[&symbol],
            )
            .map_err(query_err)?;
        Ok(row.map(|r| r.get(0)))
    }

    fn symbol_for_company(&self, company_name: &str) -> Result<Option<String>, FolioError> {
        let row = self
            .conn()?
            .query_opt(
                "SELECT symbol FROM stock WHERE LOWER(company_name) = LOWER($1)
                 ORDER BY symbol LIMIT 1",
                &[&company_name],
            )
            .map_err(query_err)?;
        Ok(row.map(|r| r.get(0)))
    }

    fn list_symbols(&self) -> Result<Vec<String>, FolioError> {
        let rows = self
            .conn()?
            .query("SELECT symbol FROM stock ORDER BY symbol", &[])
            .map_err(query_err)?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    fn add_listing(
        &self,
        listing: &Listing,
        register: bool,
        price: &PricePoint,
    ) -> Result<(), FolioError> {
        let mut client = self.conn()?;
        let mut tx = client.transaction().map_err(query_err)?;

        if register {
            tx.execute(
                "INSERT INTO stock (symbol, company_name) VALUES ($1, $2)",
                &[&listing.symbol, &listing.company_name],
            )
            .map_err(|e| {
                if violates(&e, &SqlState::UNIQUE_VIOLATION) {
                    FolioError::ListingConflict {
                        reason: format!("symbol '{}' is already registered", listing.symbol),
                    }
                } else {
                    query_err(e)
                }
            })?;
        }
        insert_price(&mut tx, price)?;

        tx.commit().map_err(query_err)
    }

    fn add_price(&self, price: &PricePoint) -> Result<(), FolioError> {
        let mut client = self.conn()?;
        insert_price(&mut *client, price)
    }
}

impl PortfolioPort for PostgresAdapter {
    fn create_portfolio(&self, user_id: UserId, name: &str) -> Result<PortfolioId, FolioError> {
        let row = self
            .conn()?
            .query_one(
                "INSERT INTO portfolio (user_id, name, cash_balance)
                 VALUES ($1, $2, $3) RETURNING portfolio_id",
                &[&user_id, &name, &Decimal::ZERO],
            )
            .map_err(query_err)?;
        Ok(row.get(0))
    }

    fn get_portfolio(&self, portfolio_id: PortfolioId) -> Result<Option<Portfolio>, FolioError> {
        let row = self
            .conn()?
            .query_opt(
                "SELECT portfolio_id, user_id, name, cash_balance
                 FROM portfolio WHERE portfolio_id = $1",
                &[&portfolio_id],
            )
            .map_err(query_err)?;
        Ok(row.as_ref().map(portfolio_from_row))
    }

    fn list_portfolios(&self, user_id: UserId) -> Result<Vec<Portfolio>, FolioError> {
        let rows = self
            .conn()?
            .query(
                "SELECT portfolio_id, user_id, name, cash_balance
                 FROM portfolio WHERE user_id = $1 ORDER BY portfolio_id",
                &[&user_id],
            )
            .map_err(query_err)?;
        Ok(rows.iter().map(portfolio_from_row).collect())
    }

    fn holdings(&self, portfolio_id: PortfolioId) -> Result<Vec<Holding>, FolioError> {
        let mut client = self.conn()?;
        load_holdings(&mut *client, portfolio_id)
    }

    fn with_locked_portfolio(
        &self,
        portfolio_id: PortfolioId,
        mutation: &mut AccountMutation<'_>,
    ) -> Result<(), FolioError> {
        let mut client = self.conn()?;
        let mut tx = client.transaction().map_err(query_err)?;

        let row = tx
            .query_opt(
                "SELECT portfolio_id, user_id, name, cash_balance
                 FROM portfolio WHERE portfolio_id = $1 FOR UPDATE",
                &[&portfolio_id],
            )
            .map_err(query_err)?
            .ok_or(FolioError::PortfolioNotFound { portfolio_id })?;
        let holdings = load_holdings(&mut tx, portfolio_id)?;
        let before = PortfolioAccount::new(portfolio_from_row(&row), holdings);
        let mut after = before.clone();
        // Dropping `tx` on error rolls back and releases the row lock.
        mutation(&mut after)?;

        tx.execute(
            "UPDATE portfolio SET cash_balance = $1 WHERE portfolio_id = $2",
            &[&after.cash(), &portfolio_id],
        )
        .map_err(query_err)?;

        for change in holding_changes(&before, &after) {
            let written = match change {
                HoldingChange::Upsert { symbol, num_shares } => tx.execute(
                    "INSERT INTO portfolio_holding (portfolio_id, symbol, num_shares)
                     VALUES ($1, $2, $3)
                     ON CONFLICT (portfolio_id, symbol) DO UPDATE SET num_shares = EXCLUDED.num_shares",
                    &[&portfolio_id, &symbol, &num_shares],
                ),
                HoldingChange::Remove { symbol } => tx.execute(
                    "DELETE FROM portfolio_holding WHERE portfolio_id = $1 AND symbol = $2",
                    &[&portfolio_id, &symbol],
                ),
            };
            written.map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }
}
