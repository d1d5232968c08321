//! Per-symbol return statistics, beta, and the price correlation matrix.
//!
//! Two correlation measures live here and are deliberately distinct:
//!
//! * the return-based correlation against the market index, which only
//!   feeds `beta`;
//! * the price-level Pearson correlation between pairs of symbols, which is
//!   what the correlation matrix shows.

use serde::Serialize;
use std::collections::BTreeMap;

use super::error::FolioError;
use super::portfolio::{PortfolioId, UserId};
use super::price::{known_closes, ClosePoint};
use super::returns::{compute_market_index, compute_returns, MarketIndex, ReturnPoint};
use super::statistic::{CorrelationCell, Statistic, UndefinedReason};
use crate::ports::portfolio_port::PortfolioPort;
use crate::ports::price_port::PricePort;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolStats {
    pub average: Statistic,
    pub stddev: Statistic,
    pub cov: Statistic,
    pub beta: Statistic,
}

pub type CorrelationMatrix = BTreeMap<String, BTreeMap<String, CorrelationCell>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub portfolio_id: PortfolioId,
    pub stats: BTreeMap<String, SymbolStats>,
    pub correlation_matrix: CorrelationMatrix,
}

/// Stock and market log-returns over the same date pairs.
///
/// A stock return contributes only when the market index is positive on
/// both of its dates.
fn aligned_returns(closes: &[ClosePoint], market: &MarketIndex) -> (Vec<f64>, Vec<f64>) {
    let market_closes = |point: &ReturnPoint| -> Option<[ClosePoint; 2]> {
        let prev = *market.get(&point.prev_date)?;
        let curr = *market.get(&point.date)?;
        Some([
            ClosePoint {
                date: point.prev_date,
                close: prev,
            },
            ClosePoint {
                date: point.date,
                close: curr,
            },
        ])
    };

    compute_returns(closes)
        .iter()
        .filter_map(|point| {
            let pair = market_closes(point)?;
            let market_return = compute_returns(&pair).first()?.log_return;
            Some((point.log_return, market_return))
        })
        .unzip()
}

/// Mean and population standard deviation; both 0 for an empty slice.
fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Statistics for one symbol from its ascending closes and the market index.
pub fn symbol_stats(closes: &[ClosePoint], market: &MarketIndex) -> SymbolStats {
    let (stock, index) = aligned_returns(closes, market);
    let (average, stddev) = mean_and_stddev(&stock);
    let (market_mean, market_stddev) = mean_and_stddev(&index);

    let cov = if average != 0.0 {
        Statistic::from_f64(stddev / average)
    } else {
        Statistic::Undefined(UndefinedReason::ZeroMean)
    };

    let n = stock.len();
    let mut corr = 0.0;
    if n > 1 {
        let numerator: f64 = stock
            .iter()
            .zip(&index)
            .map(|(r, m)| (r - average) * (m - market_mean))
            .sum();
        let denominator = n as f64 * stddev * market_stddev;
        if denominator != 0.0 {
            corr = numerator / denominator;
        }
    }

    let beta = if market_stddev > 0.0 {
        Statistic::from_f64(corr * (stddev / market_stddev))
    } else {
        Statistic::Undefined(UndefinedReason::ZeroMarketVariance)
    };

    SymbolStats {
        average: Statistic::from_f64(average),
        stddev: Statistic::from_f64(stddev),
        cov,
        beta,
    }
}

/// Pearson correlation of close levels on the dates both series share.
pub fn price_correlation(a: &[ClosePoint], b: &[ClosePoint]) -> CorrelationCell {
    let b_by_date: BTreeMap<_, _> = b.iter().map(|p| (p.date, p.close)).collect();
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .filter_map(|p| b_by_date.get(&p.date).map(|&other| (p.close, other)))
        .collect();
    if pairs.is_empty() {
        return CorrelationCell::NotEnoughData;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let (dx, dy) = (x - mean_a, y - mean_b);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denominator = (sxx * syy).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return CorrelationCell::NotEnoughData;
    }
    let r = sxy / denominator;
    if r.is_finite() {
        CorrelationCell::Value(r)
    } else {
        CorrelationCell::NotEnoughData
    }
}

/// Square matrix over the keys of `histories`. The diagonal is always 1.
pub fn correlation_matrix(histories: &BTreeMap<String, Vec<ClosePoint>>) -> CorrelationMatrix {
    let mut matrix = CorrelationMatrix::new();
    for (a, a_closes) in histories {
        let row = histories
            .iter()
            .map(|(b, b_closes)| {
                let cell = if a == b {
                    CorrelationCell::Value(1.0)
                } else {
                    price_correlation(a_closes, b_closes)
                };
                (b.clone(), cell)
            })
            .collect();
        matrix.insert(a.clone(), row);
    }
    matrix
}

/// Statistics and correlation matrix for every holding of a portfolio.
pub fn portfolio_stats(
    portfolios: &dyn PortfolioPort,
    prices: &dyn PricePort,
    user_id: UserId,
    portfolio_id: PortfolioId,
) -> Result<PortfolioStats, FolioError> {
    let portfolio = portfolios
        .get_portfolio(portfolio_id)?
        .ok_or(FolioError::PortfolioNotFound { portfolio_id })?;
    if portfolio.user_id != user_id {
        return Err(FolioError::Unauthorized {
            user_id,
            portfolio_id,
        });
    }

    let holdings = portfolios.holdings(portfolio_id)?;
    let market = if holdings.is_empty() {
        MarketIndex::new()
    } else {
        compute_market_index(&prices.all_closes()?)
    };

    let mut histories = BTreeMap::new();
    for holding in &holdings {
        let rows = prices.history_ascending(&holding.symbol, None)?;
        histories.insert(holding.symbol.clone(), known_closes(&rows));
    }

    let stats = histories
        .iter()
        .map(|(symbol, closes)| (symbol.clone(), symbol_stats(closes, &market)))
        .collect();
    let correlation_matrix = correlation_matrix(&histories);

    tracing::debug!(portfolio_id, symbols = histories.len(), "computed portfolio stats");
    Ok(PortfolioStats {
        portfolio_id,
        stats,
        correlation_matrix,
    })
}
