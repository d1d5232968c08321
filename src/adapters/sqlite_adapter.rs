//! SQLite storage adapter.
//!
//! Money and share counts are stored as TEXT and parsed back into `Decimal`.
//! Portfolio mutations run in `BEGIN IMMEDIATE` transactions, which take the
//! database write lock up front.

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
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS stock (
    symbol TEXT PRIMARY KEY,
    company_name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS stock_price (
    symbol TEXT NOT NULL REFERENCES stock(symbol),
    date TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL,
    volume INTEGER NOT NULL,
    PRIMARY KEY (symbol, date)
);
CREATE INDEX IF NOT EXISTS idx_stock_price_date ON stock_price(date);
CREATE TABLE IF NOT EXISTS portfolio (
    portfolio_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    cash_balance TEXT NOT NULL DEFAULT '0.00'
);
CREATE INDEX IF NOT EXISTS idx_portfolio_user ON portfolio(user_id);
CREATE TABLE IF NOT EXISTS portfolio_holding (
    portfolio_id INTEGER NOT NULL REFERENCES portfolio(portfolio_id),
    symbol TEXT NOT NULL,
    num_shares TEXT NOT NULL,
    PRIMARY KEY (portfolio_id, symbol)
);";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> FolioError {
    FolioError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> FolioError {
    FolioError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn is_constraint(e: &rusqlite::Error, extended: i32) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(f, _) if f.extended_code == extended)
}

fn conversion_err(len: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(len, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_date(text: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| conversion_err(text.len(), e))
}

fn parse_decimal(text: String) -> rusqlite::Result<Decimal> {
    Decimal::from_str(&text).map_err(|e| conversion_err(text.len(), e))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn portfolio_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Portfolio> {
    Ok(Portfolio {
        portfolio_id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        cash_balance: parse_decimal(row.get(3)?)?,
    })
}

fn load_portfolio(conn: &Connection, portfolio_id: PortfolioId) -> Result<Option<Portfolio>, FolioError> {
    conn.query_row(
        "SELECT portfolio_id, user_id, name, cash_balance FROM portfolio WHERE portfolio_id = ?1",
        params![portfolio_id],
        portfolio_from_row,
    )
    .optional()
    .map_err(query_err)
}

fn load_holdings(conn: &Connection, portfolio_id: PortfolioId) -> Result<Vec<Holding>, FolioError> {
    let mut stmt = conn
        .prepare(
            "SELECT symbol, num_shares FROM portfolio_holding
             WHERE portfolio_id = ?1 ORDER BY symbol",
        )
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![portfolio_id], |row| {
            Ok(Holding {
                symbol: row.get(0)?,
                num_shares: parse_decimal(row.get(1)?)?,
            })
        })
        .map_err(query_err)?;

    let mut holdings = Vec::new();
    for row in rows {
        let holding = row.map_err(query_err)?;
        if holding.num_shares > Decimal::ZERO {
            holdings.push(holding);
        }
    }
    Ok(holdings)
}

fn insert_price(conn: &Connection, price: &PricePoint) -> Result<(), FolioError> {
    conn.execute(
        "INSERT INTO stock_price (symbol, date, open, high, low, close, volume)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            price.symbol,
            format_date(price.date),
            price.open,
            price.high,
            price.low,
            price.close,
            price.volume
        ],
    )
    .map_err(|e| {
        if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) {
            FolioError::DuplicatePrice {
                symbol: price.symbol.clone(),
                date: format_date(price.date),
            }
        } else if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) {
            FolioError::UnknownSymbol {
                symbol: price.symbol.clone(),
            }
        } else {
            query_err(e)
        }
    })?;
    Ok(())
}

fn configure(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FolioError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| FolioError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path).with_init(configure);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        tracing::debug!(path = %db_path, pool_size, "opened sqlite pool");
        Ok(Self { pool })
    }

    /// Single-connection in-memory database, used by tests and dry runs.
    pub fn in_memory() -> Result<Self, FolioError> {
        let manager = SqliteConnectionManager::memory().with_init(configure);
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, FolioError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), FolioError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }
}

impl PricePort for SqliteAdapter {
    fn latest_price(&self, symbol: &str) -> Result<Option<f64>, FolioError> {
        self.conn()?
            .query_row(
                "SELECT close FROM stock_price
                 WHERE symbol = ?1 AND close IS NOT NULL
                 ORDER BY date DESC LIMIT 1",
                params![symbol],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)
    }

    fn history_ascending(
        &self,
        symbol: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, FolioError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, open, high, low, close, volume
                 FROM stock_price
                 WHERE symbol = ?1 AND (?2 IS NULL OR date >= ?2)
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![symbol, since.map(format_date)], |row| {
                Ok(PricePoint {
                    symbol: row.get(0)?,
                    date: parse_date(row.get(1)?)?,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                })
            })
            .map_err(query_err)?;

        let mut points = Vec::new();
        for row in rows {
            points.push(row.map_err(query_err)?);
        }
        Ok(points)
    }

    fn all_closes(&self) -> Result<Vec<ClosePoint>, FolioError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT date, close FROM stock_price WHERE close IS NOT NULL")
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ClosePoint {
                    date: parse_date(row.get(0)?)?,
                    close: row.get(1)?,
                })
            })
            .map_err(query_err)?;

        let mut closes = Vec::new();
        for row in rows {
            closes.push(row.map_err(query_err)?);
        }
        Ok(closes)
    }

    fn latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, FolioError> {
        let max: Option<String> = self
            .conn()?
            .query_row(
                "SELECT MAX(date) FROM stock_price WHERE symbol = ?1",
                params![symbol],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        max.map(parse_date).transpose().map_err(query_err)
    }
}

impl StockRegistryPort for SqliteAdapter {
    fn exists(&self, symbol: &str) -> Result<bool, FolioError> {
        self.conn()?
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM stock WHERE symbol = ?1)",
                params![symbol],
                |row| row.get(0),
            )
            .map_err(query_err)
    }

    fn company_name(&self, symbol: &str) -> Result<Option<String>, FolioError> {
        self.conn()?
            .query_row(
                "SELECT company_name FROM stock WHERE symbol = ?1",
                params![symbol],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)
    }

    fn symbol_for_company(&self, company_name: &str) -> Result<Option<String>, FolioError> {
        self.conn()?
            .query_row(
                "SELECT symbol FROM stock WHERE LOWER(company_name) = LOWER(?1)
                 ORDER BY symbol LIMIT 1",
                params![company_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)
    }

    fn list_symbols(&self) -> Result<Vec<String>, FolioError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT symbol FROM stock ORDER BY symbol")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(query_err)?);
        }
        Ok(symbols)
    }

    fn add_listing(
        &self,
        listing: &Listing,
        register: bool,
        price: &PricePoint,
    ) -> Result<(), FolioError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        if register {
            tx.execute(
                "INSERT INTO stock (symbol, company_name) VALUES (?1, ?2)",
                params![listing.symbol, listing.company_name],
            )
            .map_err(|e| {
                if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) {
                    FolioError::ListingConflict {
                        reason: format!("symbol '{}' is already registered", listing.symbol),
                    }
                } else {
                    query_err(e)
                }
            })?;
        }
        insert_price(&tx, price)?;

        tx.commit().map_err(query_err)
    }

    fn add_price(&self, price: &PricePoint) -> Result<(), FolioError> {
        let conn = self.conn()?;
        insert_price(&conn, price)
    }
}

impl PortfolioPort for SqliteAdapter {
    fn create_portfolio(&self, user_id: UserId, name: &str) -> Result<PortfolioId, FolioError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO portfolio (user_id, name, cash_balance) VALUES (?1, ?2, ?3)",
            params![user_id, name, Decimal::new(0, 2).to_string()],
        )
        .map_err(query_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn get_portfolio(&self, portfolio_id: PortfolioId) -> Result<Option<Portfolio>, FolioError> {
        let conn = self.conn()?;
        load_portfolio(&conn, portfolio_id)
    }

    fn list_portfolios(&self, user_id: UserId) -> Result<Vec<Portfolio>, FolioError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT portfolio_id, user_id, name, cash_balance FROM portfolio
                 WHERE user_id = ?1 ORDER BY portfolio_id",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id], portfolio_from_row)
            .map_err(query_err)?;

        let mut portfolios = Vec::new();
        for row in rows {
            portfolios.push(row.map_err(query_err)?);
        }
        Ok(portfolios)
    }

    fn holdings(&self, portfolio_id: PortfolioId) -> Result<Vec<Holding>, FolioError> {
        let conn = self.conn()?;
        load_holdings(&conn, portfolio_id)
    }

    fn with_locked_portfolio(
        &self,
        portfolio_id: PortfolioId,
        mutation: &mut AccountMutation<'_>,
    ) -> Result<(), FolioError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;

        let portfolio =
            load_portfolio(&tx, portfolio_id)?.ok_or(FolioError::PortfolioNotFound { portfolio_id })?;
        let before = PortfolioAccount::new(portfolio, load_holdings(&tx, portfolio_id)?);
        let mut after = before.clone();
        // Dropping `tx` on error rolls back.
        mutation(&mut after)?;

        tx.execute(
            "UPDATE portfolio SET cash_balance = ?1 WHERE portfolio_id = ?2",
            params![after.cash().to_string(), portfolio_id],
        )
        .map_err(query_err)?;

        for change in holding_changes(&before, &after) {
            let written = match change {
                HoldingChange::Upsert { symbol, num_shares } => tx.execute(
                    "INSERT INTO portfolio_holding (portfolio_id, symbol, num_shares)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (portfolio_id, symbol) DO UPDATE SET num_shares = excluded.num_shares",
                    params![portfolio_id, symbol, num_shares.to_string()],
                ),
                HoldingChange::Remove { symbol } => tx.execute(
                    "DELETE FROM portfolio_holding WHERE portfolio_id = ?1 AND symbol = ?2",
                    params![portfolio_id, symbol],
                ),
            };
            written.map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }
}
