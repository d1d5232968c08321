//! JSON REST adapter.
//!
//! Mounts the portfolio API under `/api/portfolio`, plus `/symbols` and
//! `/api/health`. Callers are identified by the `x-user-id` header, which an
//! upstream authenticating proxy is expected to set.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::{CurrentUser, USER_HEADER};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::domain::ledger::Ledger;
use crate::domain::prediction::HorizonLimits;
use crate::ports::portfolio_port::PortfolioPort;
use crate::ports::price_port::PricePort;
use crate::ports::registry_port::StockRegistryPort;

pub struct AppState {
    pub portfolios: Arc<dyn PortfolioPort + Send + Sync>,
    pub prices: Arc<dyn PricePort + Send + Sync>,
    pub registry: Arc<dyn StockRegistryPort + Send + Sync>,
    pub horizon: HorizonLimits,
}

impl AppState {
    /// State backed by a single store implementing every port.
    pub fn from_store<S>(store: Arc<S>, horizon: HorizonLimits) -> Self
    where
        S: PortfolioPort + PricePort + StockRegistryPort + Send + Sync + 'static,
    {
        Self {
            portfolios: store.clone(),
            prices: store.clone(),
            registry: store,
            horizon,
        }
    }

    pub fn ledger(&self) -> Ledger<'_> {
        Ledger::new(&*self.portfolios, &*self.prices, &*self.registry)
    }
}

fn portfolio_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(handlers::create_portfolio))
        .route("/deposit", post(handlers::deposit))
        .route("/withdraw", post(handlers::withdraw))
        .route("/add-stock", post(handlers::add_stock))
        .route("/sell-stock", post(handlers::sell_stock))
        .route("/view", get(handlers::view))
        .route("/stats", get(handlers::stats))
        .route("/predict", get(handlers::predict))
        .route("/history", get(handlers::history))
        .route("/stockprice/add", post(handlers::add_stock_price))
        .route("/stock/user-add", post(handlers::add_listing))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/symbols", get(handlers::list_symbols))
        .nest("/api/portfolio", portfolio_routes())
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}
