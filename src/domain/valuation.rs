//! Market value of a user's portfolios.

use rust_decimal::Decimal;
use serde::Serialize;

use super::error::FolioError;
use super::money::{price_to_decimal, round_cents};
use super::portfolio::{PortfolioId, UserId};
use crate::ports::portfolio_port::PortfolioPort;
use crate::ports::price_port::PricePort;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuedHolding {
    pub symbol: String,
    pub num_shares: Decimal,
    /// `None` when the symbol has no close on record.
    pub latest_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioValuation {
    pub portfolio_id: PortfolioId,
    pub name: String,
    pub cash: Decimal,
    pub holdings: Vec<ValuedHolding>,
    pub market_value: Decimal,
    /// Market value plus cash.
    pub total_market_value: Decimal,
}

pub fn view_portfolios(
    portfolios: &dyn PortfolioPort,
    prices: &dyn PricePort,
    user_id: UserId,
) -> Result<Vec<PortfolioValuation>, FolioError> {
    let mut views = Vec::new();
    for portfolio in portfolios.list_portfolios(user_id)? {
        let mut holdings = Vec::new();
        let mut market_value = Decimal::ZERO;
        for holding in portfolios.holdings(portfolio.portfolio_id)? {
            let latest_price = match prices.latest_price(&holding.symbol)? {
                Some(close) => price_to_decimal(&holding.symbol, close).ok(),
                None => None,
            };
            if let Some(price) = latest_price {
                market_value += price * holding.num_shares;
            }
            holdings.push(ValuedHolding {
                symbol: holding.symbol,
                num_shares: holding.num_shares,
                latest_price,
            });
        }
        let market_value = round_cents(market_value);
        views.push(PortfolioValuation {
            portfolio_id: portfolio.portfolio_id,
            name: portfolio.name,
            cash: portfolio.cash_balance,
            holdings,
            market_value,
            total_market_value: market_value + portfolio.cash_balance,
        });
    }
    Ok(views)
}
