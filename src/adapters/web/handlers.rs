//! HTTP request handlers for the web adapter.
//!
//! Handlers parse raw input into domain types and run the blocking port calls
//! on the blocking thread pool.

use axum::{
    Json,
    extract::{FromRequestParts, Query, State, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::domain::error::FolioError;
use crate::domain::history::{price_history, Interval};
use crate::domain::market_data::{self, ListingEntry, PriceEntry};
use crate::domain::money::{PositiveAmount, ShareCount, Symbol};
use crate::domain::portfolio::{PortfolioId, UserId};
use crate::domain::prediction::predict as predict_prices;
use crate::domain::statistics::portfolio_stats;
use crate::domain::valuation::view_portfolios;

use super::{AppState, WebError};

pub const USER_HEADER: &str = "x-user-id";

/// Caller identity taken from the `x-user-id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|text| text.trim().parse::<UserId>().ok())
            .map(CurrentUser)
            .ok_or_else(|| FolioError::MissingIdentity.into())
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, WebError>
where
    F: FnOnce() -> Result<T, FolioError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| WebError::internal(format!("worker task failed: {e}")))?
        .map_err(WebError::from)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, WebError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| WebError::bad_request(rejection.body_text()))
}

/// Merge `message` into the serialized body, as `{message, ...body}`.
fn with_message(message: &str, body: &impl Serialize) -> Result<Value, WebError> {
    let mut value = serde_json::to_value(body)
        .map_err(|e| WebError::internal(format!("response encoding failed: {e}")))?;
    if let Value::Object(map) = &mut value {
        map.insert("message".to_string(), Value::String(message.to_string()));
    }
    Ok(value)
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, FolioError> {
    value.ok_or_else(|| FolioError::validation(field, format!("{field} is required")))
}

fn parse_portfolio_id(raw: Option<&str>) -> Result<PortfolioId, FolioError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FolioError::validation("portfolioId", "portfolioId is required"))?
        .parse::<PortfolioId>()
        .map_err(|_| FolioError::validation("portfolioId", "portfolioId must be an integer"))
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn not_found() -> WebError {
    WebError::not_found("no such route")
}

pub async fn list_symbols(State(state): State<Arc<AppState>>) -> Result<Response, WebError> {
    let symbols = run_blocking(move || state.registry.list_symbols()).await?;
    Ok(Json(symbols).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub name: Option<String>,
}

pub async fn create_portfolio(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let request = json_body(payload)?;
    let name = request.name.unwrap_or_default();
    let portfolio_id =
        run_blocking(move || state.ledger().create_portfolio(user_id, &name)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Portfolio created", "portfolioId": portfolio_id })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashRequest {
    pub portfolio_id: Option<PortfolioId>,
    pub amount: Option<Decimal>,
}

impl CashRequest {
    fn parse(self) -> Result<(PortfolioId, PositiveAmount), FolioError> {
        let amount = PositiveAmount::new(require(self.amount, "amount")?)?;
        let portfolio_id = require(self.portfolio_id, "portfolioId")?;
        Ok((portfolio_id, amount))
    }
}

pub async fn deposit(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<CashRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let (portfolio_id, amount) = json_body(payload)?.parse()?;
    let balance =
        run_blocking(move || state.ledger().deposit(user_id, portfolio_id, amount)).await?;
    Ok(Json(json!({
        "message": format!("Deposited ${amount}"),
        "cashBalance": balance,
    }))
    .into_response())
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<CashRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let (portfolio_id, amount) = json_body(payload)?.parse()?;
    let balance =
        run_blocking(move || state.ledger().withdraw(user_id, portfolio_id, amount)).await?;
    Ok(Json(json!({
        "message": format!("Withdrew ${amount}"),
        "cashBalance": balance,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub portfolio_id: Option<PortfolioId>,
    pub symbol: Option<String>,
    pub num_shares: Option<Decimal>,
}

impl TradeRequest {
    fn parse(self) -> Result<(PortfolioId, Symbol, ShareCount), FolioError> {
        let shares = ShareCount::new(require(self.num_shares, "numShares")?)?;
        let portfolio_id = require(self.portfolio_id, "portfolioId")?;
        let symbol = Symbol::parse(self.symbol.as_deref().unwrap_or(""))?;
        Ok((portfolio_id, symbol, shares))
    }
}

pub async fn add_stock(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let (portfolio_id, symbol, shares) = json_body(payload)?.parse()?;
    let receipt = run_blocking(move || {
        state
            .ledger()
            .buy_stock(user_id, portfolio_id, &symbol, shares)
    })
    .await?;
    Ok(Json(with_message("Stock purchased successfully", &receipt)?).into_response())
}

pub async fn sell_stock(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let (portfolio_id, symbol, shares) = json_body(payload)?.parse()?;
    let receipt = run_blocking(move || {
        state
            .ledger()
            .sell_stock(user_id, portfolio_id, &symbol, shares)
    })
    .await?;
    let mut body = with_message("Stock sold successfully", &receipt)?;
    if let Value::Object(map) = &mut body {
        map.insert(
            "proceeds".to_string(),
            Value::String(format!("{:.2}", receipt.total)),
        );
    }
    Ok(Json(body).into_response())
}

pub async fn view(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Response, WebError> {
    let portfolios =
        run_blocking(move || view_portfolios(&*state.portfolios, &*state.prices, user_id)).await?;
    Ok(Json(json!({ "portfolios": portfolios })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(rename = "portfolioId")]
    pub portfolio_id: Option<String>,
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<StatsQuery>,
) -> Result<Response, WebError> {
    let portfolio_id = parse_portfolio_id(query.portfolio_id.as_deref())?;
    let stats = run_blocking(move || {
        portfolio_stats(&*state.portfolios, &*state.prices, user_id, portfolio_id)
    })
    .await?;
    Ok(Json(stats).into_response())
}

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub symbol: Option<String>,
    pub days: Option<String>,
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PredictQuery>,
) -> Result<Response, WebError> {
    let symbol = Symbol::parse(query.symbol.as_deref().unwrap_or(""))?;
    let days = state.horizon.parse(query.days.as_deref())?;
    let prediction = run_blocking(move || predict_prices(&*state.prices, &symbol, days)).await?;
    Ok(Json(prediction).into_response())
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub symbol: Option<String>,
    pub interval: Option<String>,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, WebError> {
    let symbol = Symbol::parse(query.symbol.as_deref().unwrap_or(""))?;
    let interval: Interval = query.interval.as_deref().unwrap_or("").parse()?;
    let history = run_blocking(move || price_history(&*state.prices, &symbol, interval)).await?;
    Ok(Json(history).into_response())
}

pub async fn add_stock_price(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PriceEntry>, JsonRejection>,
) -> Result<Response, WebError> {
    let entry = json_body(payload)?;
    run_blocking(move || market_data::add_price(&*state.registry, &entry)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Stock data added" })),
    )
        .into_response())
}

pub async fn add_listing(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ListingEntry>, JsonRejection>,
) -> Result<Response, WebError> {
    let entry = json_body(payload)?;
    run_blocking(move || market_data::add_listing(&*state.registry, &entry)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Stock and price data added" })),
    )
        .into_response())
}
