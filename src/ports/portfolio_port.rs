//! Portfolio persistence port trait.

use crate::domain::error::FolioError;
use crate::domain::portfolio::{Holding, Portfolio, PortfolioAccount, PortfolioId, UserId};

/// Mutation run while the store holds the portfolio's write lock.
pub type AccountMutation<'a> = dyn FnMut(&mut PortfolioAccount) -> Result<(), FolioError> + 'a;

pub trait PortfolioPort {
    fn create_portfolio(&self, user_id: UserId, name: &str) -> Result<PortfolioId, FolioError>;

    fn get_portfolio(&self, portfolio_id: PortfolioId) -> Result<Option<Portfolio>, FolioError>;

    /// The user's portfolios ordered by id.
    fn list_portfolios(&self, user_id: UserId) -> Result<Vec<Portfolio>, FolioError>;

    /// Holdings with a positive share count, ordered by symbol.
    fn holdings(&self, portfolio_id: PortfolioId) -> Result<Vec<Holding>, FolioError>;

    /// Load the portfolio and its holdings under a write lock, apply
    /// `mutation`, and persist the resulting cash balance and holding changes
    /// atomically. Nothing is written if `mutation` fails.
    ///
    /// `mutation` must not call back into the store.
    fn with_locked_portfolio(
        &self,
        portfolio_id: PortfolioId,
        mutation: &mut AccountMutation<'_>,
    ) -> Result<(), FolioError>;
}
