//! Portfolio ledger: cash and holdings mutations.
//!
//! Each mutation resolves its inputs (ownership, symbol, price) and then
//! applies a pure [`PortfolioAccount`] change inside
//! [`PortfolioPort::with_locked_portfolio`], so the check and the write
//! happen under the same lock.

use rust_decimal::Decimal;
use serde::Serialize;

use super::error::FolioError;
use super::money::{price_to_decimal, PositiveAmount, ShareCount, Symbol};
use super::portfolio::{PortfolioAccount, PortfolioId, UserId};
use crate::ports::portfolio_port::PortfolioPort;
use crate::ports::price_port::PricePort;
use crate::ports::registry_port::StockRegistryPort;

/// Outcome of an accepted buy or sell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeReceipt {
    pub symbol: String,
    pub num_shares: Decimal,
    pub price: Decimal,
    /// Cost for a buy, proceeds for a sell.
    pub total: Decimal,
    pub cash_balance: Decimal,
}

pub struct Ledger<'a> {
    portfolios: &'a dyn PortfolioPort,
    prices: &'a dyn PricePort,
    registry: &'a dyn StockRegistryPort,
}

impl<'a> Ledger<'a> {
    pub fn new(
        portfolios: &'a dyn PortfolioPort,
        prices: &'a dyn PricePort,
        registry: &'a dyn StockRegistryPort,
    ) -> Self {
        Self {
            portfolios,
            prices,
            registry,
        }
    }

    pub fn create_portfolio(&self, user_id: UserId, name: &str) -> Result<PortfolioId, FolioError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FolioError::validation("name", "portfolio name is required"));
        }
        let portfolio_id = self.portfolios.create_portfolio(user_id, name)?;
        tracing::info!(user_id, portfolio_id, name, "portfolio created");
        Ok(portfolio_id)
    }

    pub fn deposit(
        &self,
        user_id: UserId,
        portfolio_id: PortfolioId,
        amount: PositiveAmount,
    ) -> Result<Decimal, FolioError> {
        let mut balance = Decimal::ZERO;
        let result = self.locked(user_id, portfolio_id, &mut |account| {
            balance = account.deposit(amount);
            Ok(())
        });
        self.log_outcome("deposit", user_id, portfolio_id, &result, || {
            tracing::info!(user_id, portfolio_id, %amount, %balance, "deposit accepted");
        });
        result.map(|()| balance)
    }

    pub fn withdraw(
        &self,
        user_id: UserId,
        portfolio_id: PortfolioId,
        amount: PositiveAmount,
    ) -> Result<Decimal, FolioError> {
        let mut balance = Decimal::ZERO;
        let result = self.locked(user_id, portfolio_id, &mut |account| {
            balance = account.withdraw(amount)?;
            Ok(())
        });
        self.log_outcome("withdraw", user_id, portfolio_id, &result, || {
            tracing::info!(user_id, portfolio_id, %amount, %balance, "withdraw accepted");
        });
        result.map(|()| balance)
    }

    pub fn buy_stock(
        &self,
        user_id: UserId,
        portfolio_id: PortfolioId,
        symbol: &Symbol,
        shares: ShareCount,
    ) -> Result<TradeReceipt, FolioError> {
        let result = self.buy_inner(user_id, portfolio_id, symbol, shares);
        self.log_outcome("buy", user_id, portfolio_id, &result, || {
            if let Ok(receipt) = &result {
                tracing::info!(
                    user_id,
                    portfolio_id,
                    symbol = %symbol,
                    shares = %shares,
                    cost = %receipt.total,
                    balance = %receipt.cash_balance,
                    "buy accepted"
                );
            }
        });
        result
    }

    fn buy_inner(
        &self,
        user_id: UserId,
        portfolio_id: PortfolioId,
        symbol: &Symbol,
        shares: ShareCount,
    ) -> Result<TradeReceipt, FolioError> {
        self.ensure_owned(user_id, portfolio_id)?;
        if !self.registry.exists(symbol.as_str())? {
            return Err(FolioError::UnknownSymbol {
                symbol: symbol.to_string(),
            });
        }
        let price = self.latest_price(symbol)?;

        let mut receipt = None;
        self.locked(user_id, portfolio_id, &mut |account| {
            let total = account.buy(symbol, shares, price)?;
            receipt = Some(receipt_for(account, symbol, shares, price, total));
            Ok(())
        })?;
        receipt.ok_or_else(|| FolioError::Database {
            reason: "portfolio mutation did not run".into(),
        })
    }

    pub fn sell_stock(
        &self,
        user_id: UserId,
        portfolio_id: PortfolioId,
        symbol: &Symbol,
        shares: ShareCount,
    ) -> Result<TradeReceipt, FolioError> {
        let result = self.sell_inner(user_id, portfolio_id, symbol, shares);
        self.log_outcome("sell", user_id, portfolio_id, &result, || {
            if let Ok(receipt) = &result {
                tracing::info!(
                    user_id,
                    portfolio_id,
                    symbol = %symbol,
                    shares = %shares,
                    proceeds = %receipt.total,
                    balance = %receipt.cash_balance,
                    "sell accepted"
                );
            }
        });
        result
    }

    fn sell_inner(
        &self,
        user_id: UserId,
        portfolio_id: PortfolioId,
        symbol: &Symbol,
        shares: ShareCount,
    ) -> Result<TradeReceipt, FolioError> {
        // Holding is checked before the price so a missing position reports
        // InsufficientShares even for symbols without prices.
        self.ensure_owned(user_id, portfolio_id)?;
        let held = self
            .portfolios
            .holdings(portfolio_id)?
            .iter()
            .find(|h| h.symbol == symbol.as_str())
            .map(|h| h.num_shares)
            .unwrap_or(Decimal::ZERO);
        if held < shares.value() {
            return Err(FolioError::InsufficientShares {
                symbol: symbol.to_string(),
                requested: shares.value(),
                held,
            });
        }
        let price = self.latest_price(symbol)?;

        let mut receipt = None;
        self.locked(user_id, portfolio_id, &mut |account| {
            let proceeds = account.sell(symbol, shares, price)?;
            receipt = Some(receipt_for(account, symbol, shares, price, proceeds));
            Ok(())
        })?;
        receipt.ok_or_else(|| FolioError::Database {
            reason: "portfolio mutation did not run".into(),
        })
    }

    fn latest_price(&self, symbol: &Symbol) -> Result<Decimal, FolioError> {
        match self.prices.latest_price(symbol.as_str())? {
            Some(close) => price_to_decimal(symbol.as_str(), close),
            None => Err(FolioError::NoPriceData {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn ensure_owned(&self, user_id: UserId, portfolio_id: PortfolioId) -> Result<(), FolioError> {
        let portfolio = self
            .portfolios
            .get_portfolio(portfolio_id)?
            .ok_or(FolioError::PortfolioNotFound { portfolio_id })?;
        if portfolio.user_id != user_id {
            return Err(FolioError::Unauthorized {
                user_id,
                portfolio_id,
            });
        }
        Ok(())
    }

    /// Re-checks ownership under the lock before running `mutation`.
    fn locked(
        &self,
        user_id: UserId,
        portfolio_id: PortfolioId,
        mutation: &mut dyn FnMut(&mut PortfolioAccount) -> Result<(), FolioError>,
    ) -> Result<(), FolioError> {
        self.portfolios
            .with_locked_portfolio(portfolio_id, &mut |account| {
                account.ensure_owner(user_id)?;
                mutation(account)
            })
    }

    fn log_outcome<T>(
        &self,
        operation: &str,
        user_id: UserId,
        portfolio_id: PortfolioId,
        result: &Result<T, FolioError>,
        on_success: impl FnOnce(),
    ) {
        match result {
            Ok(_) => on_success(),
            Err(e) => tracing::warn!(user_id, portfolio_id, operation, error = %e, "rejected"),
        }
    }
}

fn receipt_for(
    account: &PortfolioAccount,
    symbol: &Symbol,
    shares: ShareCount,
    price: Decimal,
    total: Decimal,
) -> TradeReceipt {
    TradeReceipt {
        symbol: symbol.to_string(),
        num_shares: shares.value(),
        price,
        total,
        cash_balance: account.cash(),
    }
}
